//! Host-side buffer and stream types accepted by [`HostEngine`](crate::HostEngine).

use std::sync::atomic::{AtomicUsize, Ordering};

use gputt_traits::{col_major_strides, volume, DType, DeviceBuffer, DevicePtr, DeviceStream, StreamHandle};

/// Rust element types with a known [`DType`].
pub trait HostElement: Copy + Send + Sync + 'static {
    const DTYPE: DType;
}

macro_rules! impl_host_element {
    ($($t:ty => $d:ident),* $(,)?) => {
        $(impl HostElement for $t {
            const DTYPE: DType = DType::$d;
        })*
    };
}

impl_host_element! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// Owned column-major array in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray<T> {
    data: Vec<T>,
    dims: Vec<usize>,
}

impl<T: HostElement> HostArray<T> {
    /// Wrap `data` with the given extents.
    ///
    /// # Panics
    /// Panics if `data.len()` differs from the product of `dims`.
    pub fn from_vec(data: Vec<T>, dims: &[usize]) -> Self {
        assert_eq!(
            data.len(),
            volume(dims),
            "data length does not match dims {dims:?}"
        );
        Self {
            data,
            dims: dims.to_vec(),
        }
    }

    /// Build an array by evaluating `f` at every multi-index (column-major order).
    pub fn from_fn(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let len = volume(dims);
        let mut data = Vec::with_capacity(len);
        let mut idx = vec![0usize; dims.len()];
        for _ in 0..len {
            data.push(f(&idx));
            for (i, d) in idx.iter_mut().zip(dims) {
                *i += 1;
                if *i < *d {
                    break;
                }
                *i = 0;
            }
        }
        Self {
            data,
            dims: dims.to_vec(),
        }
    }

    pub fn filled(dims: &[usize], value: T) -> Self {
        Self {
            data: vec![value; volume(dims)],
            dims: dims.to_vec(),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a column-major multi-index.
    pub fn get(&self, idx: &[usize]) -> T {
        assert_eq!(idx.len(), self.dims.len(), "index rank mismatch");
        let offset: isize = idx
            .iter()
            .zip(col_major_strides(&self.dims))
            .map(|(&i, s)| i as isize * s)
            .sum();
        self.data[offset as usize]
    }
}

impl<T: HostElement + num_traits::Zero> HostArray<T> {
    pub fn zeros(dims: &[usize]) -> Self {
        Self::filled(dims, T::zero())
    }
}

unsafe impl<T: HostElement + std::fmt::Debug> DeviceBuffer for HostArray<T> {
    fn device_ptr(&self) -> Option<DevicePtr> {
        Some(DevicePtr::from_ptr(self.data.as_ptr()))
    }

    fn device_ptr_mut(&mut self) -> Option<DevicePtr> {
        Some(DevicePtr::from_ptr(self.data.as_mut_ptr()))
    }

    fn item_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// A named host "stream". Work on it runs synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStream {
    handle: StreamHandle,
}

impl HostStream {
    /// Allocate a new, distinct stream id.
    pub fn new() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        Self {
            handle: StreamHandle(NEXT.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }
}

impl Default for HostStream {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStream for HostStream {
    fn native_handle(&self) -> Option<StreamHandle> {
        Some(self.handle)
    }
}
