//! Scalar collapse on read and rank promotion on write.

use matlink_value::{Dense, Element, Number, StructArray, Value};
use ndarray::ArrayD;

/// Shape as the foreign side needs it: at least two dimensions, with
/// missing leading dimensions filled by 1 (`[]` is 1x1, `[n]` is 1xn).
pub fn at_least_2d(shape: &[usize]) -> Vec<usize> {
    match shape.len() {
        0 => vec![1, 1],
        1 => vec![1, shape[0]],
        _ => shape.to_vec(),
    }
}

/// Numeric data read from the foreign side; one element becomes a scalar.
pub fn numeric_value<T: Element>(dense: Dense<T>) -> Value {
    if dense.len() == 1 {
        let number = match &dense {
            Dense::Real(a) => a.iter().next().copied().map(Number::Real),
            Dense::Complex(a) => a.iter().next().copied().map(Number::Complex),
        };
        if let Some(number) = number {
            return Value::Scalar(T::into_scalar(number));
        }
    }
    Value::Numeric(T::into_array(dense))
}

/// Logical data read from the foreign side; one element becomes a `Bool`.
pub fn logical_value(array: ArrayD<bool>) -> Value {
    match (array.len(), array.iter().next()) {
        (1, Some(&b)) => Value::Bool(b),
        _ => Value::Logical(array),
    }
}

/// Struct data read from the foreign side; one element becomes a mapping.
pub fn struct_value(array: StructArray) -> Value {
    if array.len() == 1 {
        let origin = vec![0; array.shape().len()];
        if let Some(record) = array.record(&origin) {
            return Value::Struct(record);
        }
    }
    Value::StructArray(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matlink_value::{Complex, NumericArray, Scalar};
    use ndarray::IxDyn;

    #[test]
    fn promotes_rank() {
        assert_eq!(at_least_2d(&[]), vec![1, 1]);
        assert_eq!(at_least_2d(&[4]), vec![1, 4]);
        assert_eq!(at_least_2d(&[0]), vec![1, 0]);
        assert_eq!(at_least_2d(&[2, 3, 4]), vec![2, 3, 4]);
    }

    #[test]
    fn single_element_collapses() {
        let one = ArrayD::from_elem(IxDyn(&[1, 1]), 42i32);
        assert_eq!(
            numeric_value(Dense::Real(one)),
            Value::Scalar(Scalar::I32(Number::Real(42)))
        );
        let c = ArrayD::from_elem(IxDyn(&[1, 1, 1]), Complex::new(4.0f32, 2.0));
        assert_eq!(
            numeric_value(Dense::Complex(c)),
            Value::Scalar(Scalar::F32(Number::Complex(Complex::new(4.0, 2.0))))
        );
    }

    #[test]
    fn empty_and_larger_arrays_stay_arrays() {
        let empty = ArrayD::<f64>::zeros(IxDyn(&[0, 0]));
        assert!(numeric_value(Dense::Real(empty)).is_empty_sentinel());
        let row = ArrayD::from_elem(IxDyn(&[1, 2]), 1u8);
        assert!(matches!(
            numeric_value(Dense::Real(row)),
            Value::Numeric(NumericArray::U8(_))
        ));
        let flags = ArrayD::from_elem(IxDyn(&[2, 1]), true);
        assert!(matches!(logical_value(flags), Value::Logical(_)));
        assert_eq!(logical_value(ArrayD::from_elem(IxDyn(&[1, 1]), false)), Value::Bool(false));
    }

    #[test]
    fn one_element_struct_array_collapses() {
        let mut array = StructArray::new(&[1, 1], ["a", "b"]);
        array.set(&[0, 0], "a", 1.0).unwrap();
        let Value::Struct(s) = struct_value(array) else {
            panic!("expected scalar struct");
        };
        let names: Vec<_> = s.field_names().collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(s.get("a"), Some(&Value::from(1.0)));
        assert!(s.get("b").unwrap().is_empty_sentinel());

        let pair = StructArray::new(&[1, 2], ["a"]);
        assert!(matches!(struct_value(pair), Value::StructArray(_)));
    }
}
