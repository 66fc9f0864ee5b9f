//! Axis order between foreign (column-major) storage and host arrays.
//!
//! Everything that turns a linear foreign index into a host position, or
//! back, goes through this module.

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::MarshalError;

/// Wrap data stored in column-major order as a host array of `shape`.
pub fn from_column_major<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>, MarshalError> {
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(shape).f(), data).map_err(|e| {
        MarshalError::malformed(format!("{len} elements do not fit shape {shape:?}: {e}"))
    })
}

/// Data of `array` in column-major order.
pub fn to_column_major<T: Clone>(array: &ArrayD<T>) -> Vec<T> {
    let transposed = array.t();
    match transposed.as_slice() {
        Some(contiguous) => contiguous.to_vec(),
        None => transposed.iter().cloned().collect(),
    }
}

/// Column-major linear offset of `index` (first index varies fastest).
pub fn linear_index(shape: &[usize], index: &[usize]) -> usize {
    let mut linear = 0;
    let mut stride = 1;
    for (i, n) in index.iter().zip(shape) {
        linear += i * stride;
        stride *= n;
    }
    linear
}

/// Inverse of [`linear_index`].
pub fn multi_index(shape: &[usize], mut linear: usize) -> Vec<usize> {
    let mut index = Vec::with_capacity(shape.len());
    for &n in shape {
        if n == 0 {
            index.push(0);
            continue;
        }
        index.push(linear % n);
        linear /= n;
    }
    index
}
