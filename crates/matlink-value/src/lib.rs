//! Host-side representation of MATLAB data.
//!
//! Arrays are `ndarray` arrays indexed in MATLAB order: the first index is
//! the row. Values coming from the foreign side are usually stored in
//! Fortran layout, but equality and indexing do not depend on layout.

use std::fmt;

use ndarray::{Array1, ArrayD, Axis, IxDyn, ShapeBuilder};

pub use matlink_abi::MxHandle;
pub use ndarray;
pub use num_complex::Complex;

mod numeric;
mod structs;

pub use numeric::{Dense, Element, Number, NumericArray, NumericClass, Scalar};
pub use structs::{StructArray, StructValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric scalar, real or complex.
    Scalar(Scalar),
    /// Logical scalar.
    Bool(bool),
    /// Decoded character data.
    Text(String),
    /// Character data that is not valid UTF-8, passed through untouched.
    Bytes(Vec<u8>),
    Numeric(NumericArray),
    Logical(ArrayD<bool>),
    Cell(ArrayD<Value>),
    Struct(StructValue),
    StructArray(StructArray),
    /// A foreign array that was not converted. The handle is the caller's.
    Foreign(MxHandle),
}

impl Value {
    /// MATLAB's empty matrix: a 0x0 real double array.
    pub fn empty() -> Self {
        Value::Numeric(NumericArray::F64(Dense::Real(ArrayD::zeros(IxDyn(&[0, 0]).f()))))
    }

    pub fn is_empty_sentinel(&self) -> bool {
        match self {
            Value::Numeric(NumericArray::F64(Dense::Real(a))) => a.shape() == [0, 0],
            _ => false,
        }
    }

    /// Cell array from elements listed in column-major order.
    pub fn cell(shape: &[usize], elements: Vec<Value>) -> Result<Self, String> {
        let expected: usize = shape.iter().product();
        if expected != elements.len() {
            return Err(format!(
                "Cell data length {} doesn't match dimensions {shape:?}",
                elements.len()
            ));
        }
        ArrayD::from_shape_vec(IxDyn(shape).f(), elements)
            .map(Value::Cell)
            .map_err(|e| e.to_string())
    }

    /// 1xN cell row.
    pub fn cell_row(elements: Vec<Value>) -> Self {
        Value::Cell(Array1::from_vec(elements).insert_axis(Axis(0)).into_dyn())
    }

    /// Real double array from data listed in column-major order.
    pub fn matrix(shape: &[usize], data: Vec<f64>) -> Result<Self, String> {
        ArrayD::from_shape_vec(IxDyn(shape).f(), data)
            .map(Value::from)
            .map_err(|e| e.to_string())
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Apply `f` to every foreign handle in the value, nested ones included.
    pub fn try_for_each_foreign<E>(
        &mut self,
        f: &mut impl FnMut(&mut MxHandle) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Value::Foreign(handle) => f(handle),
            Value::Cell(items) => items.iter_mut().try_for_each(|v| v.try_for_each_foreign(f)),
            Value::Struct(s) => s
                .fields
                .values_mut()
                .try_for_each(|v| v.try_for_each_foreign(f)),
            Value::StructArray(s) => s.values_mut().try_for_each(|v| v.try_for_each_foreign(f)),
            _ => Ok(()),
        }
    }

    /// MATLAB class name of the value.
    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.class().name(),
            Value::Numeric(a) => a.class().name(),
            Value::Bool(_) | Value::Logical(_) => "logical",
            Value::Text(_) | Value::Bytes(_) => "char",
            Value::Cell(_) => "cell",
            Value::Struct(_) | Value::StructArray(_) => "struct",
            Value::Foreign(_) => "foreign",
        }
    }

    /// Dimensions as MATLAB reports them, or `None` for foreign handles.
    pub fn dims(&self) -> Option<Vec<usize>> {
        Some(match self {
            Value::Scalar(_) | Value::Bool(_) | Value::Struct(_) => vec![1, 1],
            Value::Text(s) => vec![1, s.chars().count()],
            Value::Bytes(b) => vec![1, b.len()],
            Value::Numeric(a) => a.shape().to_vec(),
            Value::Logical(a) => a.shape().to_vec(),
            Value::Cell(a) => a.shape().to_vec(),
            Value::StructArray(s) => s.shape().to_vec(),
            Value::Foreign(_) => return None,
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ArrayD<bool>> for Value {
    fn from(a: ArrayD<bool>) -> Self {
        Value::Logical(a)
    }
}

impl From<ArrayD<Value>> for Value {
    fn from(a: ArrayD<Value>) -> Self {
        Value::Cell(a)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<StructArray> for Value {
    fn from(s: StructArray) -> Self {
        Value::StructArray(s)
    }
}

impl From<MxHandle> for Value {
    fn from(h: MxHandle) -> Self {
        Value::Foreign(h)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Foreign(h) => write!(f, "<mxArray {h:?}>"),
            Value::Struct(s) => write!(f, "struct(fields={})", s.len()),
            _ => {
                let dims = self.dims().unwrap_or_default();
                let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "[{} {}]", dims.join("x"), self.class_name())
            }
        }
    }
}
