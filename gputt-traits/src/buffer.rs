//! Device buffer capability.

use std::fmt;

/// Raw address of device memory.
///
/// Kept as an integer so plans and engines stay `Send`/`Sync`; it is only
/// turned back into a pointer inside the engine that owns the memory model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(pub usize);

impl DevicePtr {
    /// Null device address.
    pub const NULL: DevicePtr = DevicePtr(0);

    /// Wrap a host-visible pointer.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        DevicePtr(ptr as usize)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

/// Logical element type tag of a buffer.
///
/// Two buffers are type-compatible when their tags compare equal. The
/// byte width is reported separately by [`DeviceBuffer::item_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    BF16,
    F32,
    F64,
    Complex64,
    Complex128,
}

impl DType {
    /// Canonical name, matching the spelling array libraries print.
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::U8 => "uint8",
            DType::I16 => "int16",
            DType::U16 => "uint16",
            DType::I32 => "int32",
            DType::U32 => "uint32",
            DType::I64 => "int64",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        }
    }

    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A buffer living in memory the transpose engine can address.
///
/// `device_ptr` returns `None` when the value is not backed by engine
/// addressable memory (for example a host-only array handed to a GPU
/// engine). The plan layer reports that as an invalid argument.
///
/// # Safety
///
/// When `device_ptr` returns `Some(p)`, `p` must be valid for reads and
/// writes of `len() * item_size()` bytes for as long as the buffer is
/// borrowed, and `item_size` must be the width of `dtype`.
pub unsafe trait DeviceBuffer: fmt::Debug {
    /// Address of element 0, or `None` if this is not a device buffer.
    fn device_ptr(&self) -> Option<DevicePtr>;

    /// Address used when the engine writes into this buffer.
    fn device_ptr_mut(&mut self) -> Option<DevicePtr> {
        self.device_ptr()
    }

    /// Size of one element in bytes.
    fn item_size(&self) -> usize;

    /// Logical element type.
    fn dtype(&self) -> DType;

    /// Number of elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
