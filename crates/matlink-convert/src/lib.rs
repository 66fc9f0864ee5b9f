//! Marshaling between MATLAB `mxArray` handles and host [`Value`]s.
//!
//! ```no_run
//! use matlink_convert::{to_foreign, to_host};
//! use matlink_mx::HeapMx;
//! use matlink_value::{StructValue, Value};
//!
//! # fn main() -> Result<(), matlink_convert::MarshalError> {
//! let mx = HeapMx::default();
//! let record = StructValue::new()
//!     .with("name", "John Doe")
//!     .with("billing", 127.0);
//! let handle = to_foreign(&mx, &Value::from(record.clone()))?;
//! assert_eq!(to_host(&mx, handle)?, Value::Struct(record));
//! # Ok(())
//! # }
//! ```

mod buffers;
pub mod complex;
mod converter;
mod error;
pub mod layout;
pub mod normalize;
pub mod registry;

pub use complex::{ComplexBufferReader, ComplexBufferWriter, InterleavedComplex, SplitComplex};
pub use converter::Converter;
pub use error::MarshalError;
pub use registry::{class_id_for, element_type_for, ElementType};

use matlink_abi::MxHandle;
use matlink_mx::MxApi;
use matlink_value::Value;

/// Convert a foreign array with a one-off [`Converter`].
pub fn to_host<M: MxApi + ?Sized>(mx: &M, array: MxHandle) -> Result<Value, MarshalError> {
    Converter::new(mx).to_host(array)
}

/// Build a foreign array with a one-off [`Converter`].
pub fn to_foreign<M: MxApi + ?Sized>(mx: &M, value: &Value) -> Result<MxHandle, MarshalError> {
    Converter::new(mx).to_foreign(value)
}
