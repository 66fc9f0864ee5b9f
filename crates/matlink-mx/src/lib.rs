//! Access to MATLAB `mxArray` values.
//!
//! The marshaling layer talks to foreign arrays only through the two traits
//! defined here: [`MxQuery`] reads attributes and buffers of an existing
//! array, [`MxAlloc`] creates and populates new ones. Two implementations
//! are provided:
//!
//! * [`LibMx`] binds the matrix library of a MATLAB installation at runtime.
//! * [`HeapMx`] implements the same surface with Rust-owned arrays, so code
//!   built on the traits runs without MATLAB.
//!
//! # Buffers
//!
//! Data pointers returned by the traits point into storage owned by the
//! array. They stay valid until the array is destroyed or reshaped, and hold
//! `element_count * element_size` bytes in column-major order.
//!
//! # Ownership
//!
//! `set_cell` and `set_field` transfer ownership of the value handle to the
//! container: destroying the container destroys its elements.

mod error;
mod heap;
mod libmx;
mod library;

pub use error::MxError;
pub use heap::HeapMx;
pub use libmx::{LibMx, LIBMX_SUFFIXES};
pub use library::NativeLibrary;

pub use matlink_abi::{ComplexLayout, MxArray, MxClassId, MxComplexity, MxHandle};

use matlink_abi::MxChar;

/// Character units for `create_string`: UTF-8 text is re-encoded as UTF-16,
/// anything else is stored one character per byte.
pub(crate) fn text_units(text: &[u8]) -> Vec<MxChar> {
    match std::str::from_utf8(text) {
        Ok(utf8) => utf8.encode_utf16().collect(),
        Err(_) => text.iter().map(|&b| MxChar::from(b)).collect(),
    }
}

/// Attribute and buffer access on existing arrays.
pub trait MxQuery {
    fn class_id(&self, array: MxHandle) -> Result<MxClassId, MxError>;

    /// Dimension vector, always at least two entries.
    fn dimensions(&self, array: MxHandle) -> Result<Vec<usize>, MxError>;

    fn element_count(&self, array: MxHandle) -> Result<usize, MxError>;

    /// Bytes per element as reported by the library.
    fn element_size(&self, array: MxHandle) -> Result<usize, MxError>;

    fn is_complex(&self, array: MxHandle) -> Result<bool, MxError>;

    /// Complex storage convention of this library, fixed at load time.
    fn complex_layout(&self) -> ComplexLayout;

    /// Real-part buffer (`mxGetData`).
    fn real_data(&self, array: MxHandle) -> Result<*const u8, MxError>;

    /// Imaginary-part buffer of a complex array in split layout
    /// (`mxGetImagData`). Fails for real arrays.
    fn imag_data(&self, array: MxHandle) -> Result<*const u8, MxError>;

    /// Interleaved `re, im` buffer of a complex array in interleaved layout
    /// (`mxGetComplex<Type>s`). Fails for real arrays.
    fn complex_data(&self, array: MxHandle) -> Result<*const u8, MxError>;

    /// Character data as UTF-8 bytes (`mxArrayToUTF8String`).
    fn decode_text(&self, array: MxHandle) -> Result<Vec<u8>, MxError>;

    /// Cell element at a column-major linear index; `None` if never set.
    fn cell(&self, array: MxHandle, index: usize) -> Result<Option<MxHandle>, MxError>;

    fn field_count(&self, array: MxHandle) -> Result<usize, MxError>;

    fn field_name(&self, array: MxHandle, field: usize) -> Result<String, MxError>;

    /// Field value of one struct element; `None` if never set.
    fn field(
        &self,
        array: MxHandle,
        element: usize,
        field: usize,
    ) -> Result<Option<MxHandle>, MxError>;
}

/// Creation and population of new arrays.
///
/// Every handle returned by a `create_*` method is owned by the caller.
pub trait MxAlloc {
    fn create_numeric(
        &self,
        dims: &[usize],
        class: MxClassId,
        complexity: MxComplexity,
    ) -> Result<MxHandle, MxError>;

    fn create_logical(&self, dims: &[usize]) -> Result<MxHandle, MxError>;

    /// Row of characters from text bytes. Valid UTF-8 is stored code point
    /// for code point; other bytes are stored one character per byte.
    fn create_string(&self, text: &[u8]) -> Result<MxHandle, MxError>;

    fn create_cell(&self, dims: &[usize]) -> Result<MxHandle, MxError>;

    fn set_cell(&self, array: MxHandle, index: usize, value: MxHandle) -> Result<(), MxError>;

    fn create_struct(&self, dims: &[usize], fields: &[&str]) -> Result<MxHandle, MxError>;

    /// Add a field to every element, returning its number.
    fn add_field(&self, array: MxHandle, name: &str) -> Result<usize, MxError>;

    fn set_field(
        &self,
        array: MxHandle,
        element: usize,
        name: &str,
        value: MxHandle,
    ) -> Result<(), MxError>;

    fn real_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError>;

    fn imag_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError>;

    fn complex_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError>;

    /// Deep copy of an array and everything it contains
    /// (`mxDuplicateArray`).
    fn duplicate(&self, array: MxHandle) -> Result<MxHandle, MxError>;

    /// Free an array and everything it contains.
    fn destroy(&self, array: MxHandle);
}

/// Full collaborator surface.
pub trait MxApi: MxQuery + MxAlloc {}

impl<T: MxQuery + MxAlloc + ?Sized> MxApi for T {}
