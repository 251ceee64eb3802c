mod support {
    pub mod counting_engine;
}

use std::sync::Arc;

use gputt::{
    DType, DeviceBuffer, DevicePtr, DeviceStream, EngineStage, EngineStatus, ErrorKind, Plan,
    StreamHandle, TransposeError,
};
use gputt_host::{HostArray, HostStream};
use support::counting_engine::CountingEngine;

/// A stream object the engine does not recognize.
#[derive(Debug)]
struct ForeignStream;

impl DeviceStream for ForeignStream {
    fn native_handle(&self) -> Option<StreamHandle> {
        None
    }
}

/// A host-only array: has a dtype but no device memory.
#[derive(Debug)]
struct HostOnly(Vec<f64>);

unsafe impl DeviceBuffer for HostOnly {
    fn device_ptr(&self) -> Option<DevicePtr> {
        None
    }
    fn item_size(&self) -> usize {
        8
    }
    fn dtype(&self) -> DType {
        DType::F64
    }
    fn len(&self) -> usize {
        self.0.len()
    }
}

fn engine() -> Arc<CountingEngine> {
    Arc::new(CountingEngine::new())
}

fn iota(dims: &[usize]) -> HostArray<f64> {
    let mut k = 0.0;
    HostArray::from_fn(dims, |_| {
        k += 1.0;
        k
    })
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_valid_shapes_construct_deferred() {
    let engine = engine();
    let cases: &[(&[usize], &[usize])] = &[
        (&[7], &[0]),
        (&[3, 4], &[1, 0]),
        (&[3, 4], &[0, 1]),
        (&[2, 3, 4], &[2, 0, 1]),
        (&[2, 1, 3, 5], &[3, 2, 1, 0]),
    ];
    for (dims, perm) in cases {
        let plan = Plan::new(engine.clone(), dims.len(), dims, perm, None).unwrap();
        assert!(!plan.is_bound());
        assert_eq!(plan.dims(), *dims);
        assert_eq!(plan.permutation(), *perm);
        assert_eq!(plan.stream(), StreamHandle::DEFAULT);
    }
    assert_eq!(engine.plan_calls(), 0);
    assert_eq!(engine.destroy_calls(), 0);
}

#[test]
fn test_invalid_permutations_rejected() {
    let engine = engine();
    let cases: &[(usize, &[usize], &[usize])] = &[
        (2, &[3, 4], &[0, 0]),
        (2, &[3, 4], &[1, 2]),
        (2, &[3, 4], &[0]),
        (3, &[3, 4], &[0, 1]),
        (2, &[3, 4], &[0, 1, 2]),
        (0, &[], &[]),
        (2, &[3, 0], &[1, 0]),
    ];
    for (rank, dims, perm) in cases {
        let err = Plan::new(engine.clone(), *rank, dims, perm, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{dims:?} {perm:?}");

        let input = HostArray::<f64>::zeros(&[12]);
        let mut output = HostArray::<f64>::zeros(&[12]);
        let err = Plan::new_measured(
            engine.clone(),
            *rank,
            dims,
            perm,
            None,
            &input,
            &mut output,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(engine.plan_calls() + engine.measure_calls(), 0);
}

#[test]
fn test_unrecognized_stream_rejected() {
    let engine = engine();
    let err = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], Some(&ForeignStream)).unwrap_err();
    assert_eq!(
        err,
        TransposeError::NotAStream {
            value: "ForeignStream".into()
        }
    );
    assert_eq!(
        err.to_string(),
        "Stream argument must be a device stream, got: ForeignStream"
    );

    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let err = Plan::new_measured(
        engine.clone(),
        2,
        &[3, 4],
        &[1, 0],
        Some(&ForeignStream),
        &input,
        &mut output,
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(engine.measure_calls(), 0);
}

#[test]
fn test_explicit_stream_is_kept() {
    let stream = HostStream::new();
    let plan = Plan::new(engine(), 2, &[3, 4], &[1, 0], Some(&stream)).unwrap();
    assert_eq!(plan.stream(), stream.handle());
}

#[test]
fn test_measured_plan_rejects_mismatched_dtypes() {
    let engine = engine();
    let input = HostArray::<f32>::zeros(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let err = Plan::new_measured(
        engine.clone(),
        2,
        &[3, 4],
        &[1, 0],
        None,
        &input,
        &mut output,
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Input and output array must have the same type, got: float32 and float64"
    );
    assert_eq!(engine.measure_calls(), 0);
    assert!(output.data().iter().all(|&x| x == 0.0));
}

#[test]
fn test_measured_plan_rejects_host_only_buffers() {
    let engine = engine();
    let input = HostOnly(vec![0.0; 12]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let err = Plan::new_measured(
        engine.clone(),
        2,
        &[3, 4],
        &[1, 0],
        None,
        &input,
        &mut output,
        None,
        None,
    )
    .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Input array must be a device buffer, got: HostOnly("));
    assert_eq!(engine.measure_calls(), 0);
}

#[test]
fn test_measured_plan_binds_immediately() {
    let engine = engine();
    let input = HostArray::<f32>::from_fn(&[8, 6], |idx| (idx[0] + 8 * idx[1]) as f32);
    let mut output = HostArray::<f32>::zeros(&[6, 8]);
    let mut plan = Plan::new_measured(
        engine.clone(),
        2,
        &[8, 6],
        &[1, 0],
        None,
        &input,
        &mut output,
        None,
        None,
    )
    .unwrap();
    assert!(plan.is_bound());
    assert_eq!(plan.element_size(), Some(4));
    assert_eq!(plan.planning_status(), Some(EngineStatus::SUCCESS));
    assert_eq!(engine.measure_calls(), 1);

    output.data_mut().fill(-1.0);
    plan.execute(&input, &mut output, None, None).unwrap();
    for i in 0..8 {
        for j in 0..6 {
            assert_eq!(output.get(&[j, i]), input.get(&[i, j]));
        }
    }
    // The measured plan is reused; no heuristic planning happens.
    assert_eq!(engine.plan_calls(), 0);
    assert_eq!(engine.execute_calls(), 1);
}

#[test]
fn test_measured_failure_yields_plan_bound_to_failure() {
    let engine = Arc::new(CountingEngine::new().failing_measure(EngineStatus::INTERNAL_ERROR));
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let mut plan = Plan::new_measured(
        engine.clone(),
        2,
        &[3, 4],
        &[1, 0],
        None,
        &input,
        &mut output,
        Some(1.0),
        Some(0.0),
    )
    .unwrap();
    assert!(plan.is_bound());
    assert_eq!(plan.element_size(), Some(8));
    assert_eq!(plan.planning_status(), Some(EngineStatus::INTERNAL_ERROR));
    assert_eq!(engine.measure_calls(), 1);

    for _ in 0..3 {
        let err = plan.execute(&input, &mut output, None, None).unwrap_err();
        assert_eq!(
            err,
            TransposeError::PlanNotBound {
                status: EngineStatus::INTERNAL_ERROR
            }
        );
        assert_eq!(err.to_string(), "Internal error");
        assert_eq!(err.kind(), ErrorKind::Engine);
    }
    // Neither retried nor replanned heuristically, and never executed.
    assert_eq!(engine.measure_calls(), 1);
    assert_eq!(engine.plan_calls(), 0);
    assert_eq!(engine.execute_calls(), 0);

    // No handle was produced, so nothing is released.
    plan.destroy();
    assert_eq!(engine.destroy_calls(), 0);
    assert_eq!(engine.live_plans(), 0);
}

#[test]
fn test_overflowing_shape_rejected() {
    let engine = engine();
    let err = Plan::new(engine.clone(), 2, &[usize::MAX, 2], &[1, 0], None).unwrap_err();
    assert_eq!(
        err,
        TransposeError::ShapeTooLarge {
            dims: vec![usize::MAX, 2]
        }
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let input = HostArray::<f64>::zeros(&[4]);
    let mut output = HostArray::<f64>::zeros(&[4]);
    let err = Plan::new_measured(
        engine.clone(),
        3,
        &[usize::MAX / 2 + 1, 1, 2],
        &[2, 1, 0],
        None,
        &input,
        &mut output,
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(engine.measure_calls(), 0);
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn test_binding_happens_once() {
    let engine = engine();
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);

    plan.execute(&input, &mut output, None, None).unwrap();
    assert_eq!(plan.element_size(), Some(8));
    assert_eq!(engine.plan_calls(), 1);

    plan.execute(&input, &mut output, None, None).unwrap();
    plan.execute(&input, &mut output, Some(2.0), None).unwrap();
    assert_eq!(engine.plan_calls(), 1);
    assert_eq!(engine.execute_calls(), 3);
}

#[test]
fn test_element_size_drift_rejected() {
    let engine = engine();
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    plan.execute(&input, &mut output, None, None).unwrap();

    let input32 = HostArray::<f32>::zeros(&[3, 4]);
    let mut output32 = HostArray::<f32>::zeros(&[4, 3]);
    let err = plan
        .execute(&input32, &mut output32, None, None)
        .unwrap_err();
    assert_eq!(err, TransposeError::ElementSizeMismatch { bound: 8, got: 4 });
    assert_eq!(engine.plan_calls(), 1);
    assert_eq!(engine.execute_calls(), 1);
}

#[test]
fn test_execute_rejects_mismatched_dtypes_without_binding() {
    let engine = engine();
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = HostArray::<i64>::filled(&[3, 4], 5);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let err = plan.execute(&input, &mut output, None, None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Input and output array must have the same type, got: int64 and float64"
    );
    assert!(!plan.is_bound());
    assert_eq!(engine.plan_calls(), 0);
    assert_eq!(engine.execute_calls(), 0);
}

#[test]
fn test_execute_rejects_wrong_length() {
    let engine = engine();
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 4]);
    let err = plan.execute(&input, &mut output, None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(engine.execute_calls(), 0);
}

#[test]
fn test_failed_planning_is_sticky() {
    let engine = Arc::new(CountingEngine::new().failing_plan(EngineStatus::INTERNAL_ERROR));
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);

    for _ in 0..3 {
        let err = plan.execute(&input, &mut output, None, None).unwrap_err();
        assert_eq!(err.to_string(), EngineStatus::INTERNAL_ERROR.message());
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(
            err,
            TransposeError::PlanNotBound {
                status: EngineStatus::INTERNAL_ERROR
            }
        );
    }
    assert!(plan.is_bound());
    assert_eq!(plan.planning_status(), Some(EngineStatus::INTERNAL_ERROR));
    assert_eq!(engine.plan_calls(), 1);
    assert_eq!(engine.execute_calls(), 0);

    drop(plan);
    assert_eq!(engine.destroy_calls(), 0);
}

#[test]
fn test_execute_failure_maps_status() {
    let engine = Arc::new(CountingEngine::new().failing_execute(EngineStatus(77)));
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    let err = plan.execute(&input, &mut output, None, None).unwrap_err();
    assert_eq!(
        err,
        TransposeError::Engine {
            stage: EngineStage::Execute,
            status: EngineStatus(77)
        }
    );
    assert_eq!(err.to_string(), "Unknown error");
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[test]
fn test_destroy_releases_bound_handle_once() {
    let engine = engine();
    let mut plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    let input = iota(&[3, 4]);
    let mut output = HostArray::<f64>::zeros(&[4, 3]);
    plan.execute(&input, &mut output, None, None).unwrap();
    assert_eq!(engine.live_plans(), 1);

    plan.destroy();
    assert_eq!(engine.destroy_calls(), 1);
    assert_eq!(engine.live_plans(), 0);
}

#[test]
fn test_drop_releases_bound_handle() {
    let engine = engine();
    {
        let mut plan = Plan::new(engine.clone(), 1, &[5], &[0], None).unwrap();
        let input = iota(&[5]);
        let mut output = HostArray::<f64>::zeros(&[5]);
        plan.execute(&input, &mut output, None, None).unwrap();
    }
    assert_eq!(engine.destroy_calls(), 1);
    assert_eq!(engine.live_plans(), 0);
}

#[test]
fn test_deferred_destroy_is_noop() {
    let engine = engine();
    let plan = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap();
    plan.destroy();
    assert_eq!(engine.destroy_calls(), 0);
}

#[test]
fn test_failed_release_does_not_panic() {
    let engine = Arc::new(CountingEngine::new().failing_destroy(EngineStatus::INVALID_DEVICE));
    let mut plan = Plan::new(engine.clone(), 1, &[5], &[0], None).unwrap();
    let input = iota(&[5]);
    let mut output = HostArray::<f64>::zeros(&[5]);
    plan.execute(&input, &mut output, None, None).unwrap();
    drop(plan);
    assert_eq!(engine.destroy_calls(), 1);
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_construction_initializes_once() {
    let engine = Arc::new(CountingEngine::new().slow_init());
    let threads: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let plan = Plan::new(engine, 2, &[3, 4 + i], &[1, 0], None).unwrap();
                assert!(!plan.is_bound());
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(engine.init_calls(), 1);
}

#[test]
fn test_failed_initialization_is_fatal_and_not_retried() {
    let engine = Arc::new(CountingEngine::new().failing_init(EngineStatus::UNDEFINED_ERROR));
    for _ in 0..3 {
        let err = Plan::new(engine.clone(), 2, &[3, 4], &[1, 0], None).unwrap_err();
        assert_eq!(
            err,
            TransposeError::Engine {
                stage: EngineStage::Initialize,
                status: EngineStatus::UNDEFINED_ERROR
            }
        );
        assert_eq!(err.to_string(), "Undefined error");
    }
    assert_eq!(engine.init_calls(), 1);
}

#[test]
fn test_plan_over_trait_object() {
    let engine: Arc<dyn gputt::TransposeEngine> = Arc::new(CountingEngine::new());
    let mut plan: Plan = Plan::new(engine, 2, &[2, 2], &[1, 0], None).unwrap();
    let input = HostArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut output = HostArray::<f64>::zeros(&[2, 2]);
    plan.execute(&input, &mut output, None, None).unwrap();
    assert_eq!(output.data(), &[1.0, 3.0, 2.0, 4.0]);
}
