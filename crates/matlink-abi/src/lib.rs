//! C ABI types for talking to the MATLAB matrix library.
//!
//! This crate defines the vocabulary shared between `matlink-mx` (the
//! foreign-array collaborator) and the crates layered on top of it: the
//! opaque `mxArray` type, the handle wrapper used to pass it around, and the
//! class and complexity tags of the C API.

use std::fmt;
use std::ptr::NonNull;

/// Size type used for dimensions (`mwSize`).
pub type MwSize = usize;

/// Index type used for linear element indices (`mwIndex`).
pub type MwIndex = usize;

/// One logical element (`mxLogical`), one byte wide.
pub type MxLogical = u8;

/// One character element (`mxChar`), a UTF-16 code unit.
pub type MxChar = u16;

/// Opaque foreign array.
///
/// Only ever seen behind a pointer; the layout belongs to the library that
/// allocated it.
#[repr(C)]
pub struct MxArray {
    _private: [u8; 0],
}

/// Non-null pointer to a foreign array.
///
/// A handle carries no ownership. Whoever allocated the array (the engine
/// session or a `create_*` call) decides when it is destroyed.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct MxHandle(NonNull<MxArray>);

impl MxHandle {
    /// Wrap a raw pointer, returning `None` for null.
    pub fn from_raw(ptr: *mut MxArray) -> Option<Self> {
        NonNull::new(ptr).map(MxHandle)
    }

    pub fn as_ptr(self) -> *mut MxArray {
        self.0.as_ptr()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for MxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MxHandle({:#x})", self.addr())
    }
}

// The handle is just an address; thread-safety of the pointee is the
// responsibility of whoever serialises access to the array.
unsafe impl Send for MxHandle {}

/// Class tag of a foreign array (`mxClassID`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MxClassId {
    Unknown,
    Cell,
    Struct,
    Logical,
    Char,
    Void,
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Function,
    /// Any tag outside the documented range (objects, opaque types).
    Other(i32),
}

impl MxClassId {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => MxClassId::Unknown,
            1 => MxClassId::Cell,
            2 => MxClassId::Struct,
            3 => MxClassId::Logical,
            4 => MxClassId::Char,
            5 => MxClassId::Void,
            6 => MxClassId::Double,
            7 => MxClassId::Single,
            8 => MxClassId::Int8,
            9 => MxClassId::UInt8,
            10 => MxClassId::Int16,
            11 => MxClassId::UInt16,
            12 => MxClassId::Int32,
            13 => MxClassId::UInt32,
            14 => MxClassId::Int64,
            15 => MxClassId::UInt64,
            16 => MxClassId::Function,
            other => MxClassId::Other(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            MxClassId::Unknown => 0,
            MxClassId::Cell => 1,
            MxClassId::Struct => 2,
            MxClassId::Logical => 3,
            MxClassId::Char => 4,
            MxClassId::Void => 5,
            MxClassId::Double => 6,
            MxClassId::Single => 7,
            MxClassId::Int8 => 8,
            MxClassId::UInt8 => 9,
            MxClassId::Int16 => 10,
            MxClassId::UInt16 => 11,
            MxClassId::Int32 => 12,
            MxClassId::UInt32 => 13,
            MxClassId::Int64 => 14,
            MxClassId::UInt64 => 15,
            MxClassId::Function => 16,
            MxClassId::Other(raw) => raw,
        }
    }

    /// True for the ten classes `mxIsNumeric` reports.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            MxClassId::Double
                | MxClassId::Single
                | MxClassId::Int8
                | MxClassId::UInt8
                | MxClassId::Int16
                | MxClassId::UInt16
                | MxClassId::Int32
                | MxClassId::UInt32
                | MxClassId::Int64
                | MxClassId::UInt64
        )
    }

    /// Bytes per element for classes with a dense element buffer.
    pub fn element_width(self) -> Option<usize> {
        match self {
            MxClassId::Logical | MxClassId::Int8 | MxClassId::UInt8 => Some(1),
            MxClassId::Char | MxClassId::Int16 | MxClassId::UInt16 => Some(2),
            MxClassId::Single | MxClassId::Int32 | MxClassId::UInt32 => Some(4),
            MxClassId::Double | MxClassId::Int64 | MxClassId::UInt64 => Some(8),
            _ => None,
        }
    }

    /// MATLAB class name, as `class(x)` would print it.
    pub fn name(self) -> &'static str {
        match self {
            MxClassId::Unknown => "unknown",
            MxClassId::Cell => "cell",
            MxClassId::Struct => "struct",
            MxClassId::Logical => "logical",
            MxClassId::Char => "char",
            MxClassId::Void => "void",
            MxClassId::Double => "double",
            MxClassId::Single => "single",
            MxClassId::Int8 => "int8",
            MxClassId::UInt8 => "uint8",
            MxClassId::Int16 => "int16",
            MxClassId::UInt16 => "uint16",
            MxClassId::Int32 => "int32",
            MxClassId::UInt32 => "uint32",
            MxClassId::Int64 => "int64",
            MxClassId::UInt64 => "uint64",
            MxClassId::Function => "function_handle",
            MxClassId::Other(_) => "opaque",
        }
    }
}

/// Complexity flag for numeric array creation (`mxComplexity`).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MxComplexity {
    Real = 0,
    Complex = 1,
}

/// How a library exposes the imaginary part of complex arrays.
///
/// Releases before R2018a keep real and imaginary parts in two separate
/// buffers (`mxGetPr`/`mxGetPi`, `mxGetImagData`). The interleaved API stores
/// `re, im` pairs in one buffer reachable through `mxGetComplex<Type>s`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComplexLayout {
    Split,
    Interleaved,
}
