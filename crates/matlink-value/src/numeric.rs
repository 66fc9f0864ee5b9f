use std::fmt;

use ndarray::ArrayD;
use num_complex::Complex;

use crate::Value;

/// Element type of a numeric array, one per MATLAB numeric class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericClass {
    F64,
    F32,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl NumericClass {
    pub const ALL: [NumericClass; 10] = [
        NumericClass::F64,
        NumericClass::F32,
        NumericClass::I8,
        NumericClass::U8,
        NumericClass::I16,
        NumericClass::U16,
        NumericClass::I32,
        NumericClass::U32,
        NumericClass::I64,
        NumericClass::U64,
    ];

    /// Bytes per real element.
    pub fn width(self) -> usize {
        match self {
            NumericClass::I8 | NumericClass::U8 => 1,
            NumericClass::I16 | NumericClass::U16 => 2,
            NumericClass::F32 | NumericClass::I32 | NumericClass::U32 => 4,
            NumericClass::F64 | NumericClass::I64 | NumericClass::U64 => 8,
        }
    }

    /// MATLAB class name.
    pub fn name(self) -> &'static str {
        match self {
            NumericClass::F64 => "double",
            NumericClass::F32 => "single",
            NumericClass::I8 => "int8",
            NumericClass::U8 => "uint8",
            NumericClass::I16 => "int16",
            NumericClass::U16 => "uint16",
            NumericClass::I32 => "int32",
            NumericClass::U32 => "uint32",
            NumericClass::I64 => "int64",
            NumericClass::U64 => "uint64",
        }
    }
}

impl fmt::Display for NumericClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive that can be the element of a numeric array.
pub trait Element:
    bytemuck::Pod + Default + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const CLASS: NumericClass;

    fn into_scalar(number: Number<Self>) -> Scalar;

    fn into_array(dense: Dense<Self>) -> NumericArray;

    fn from_scalar(scalar: &Scalar) -> Option<Number<Self>>;

    fn from_array(array: &NumericArray) -> Option<&Dense<Self>>;
}

/// A single number, real or complex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number<T> {
    Real(T),
    Complex(Complex<T>),
}

impl<T> Number<T> {
    pub fn is_complex(&self) -> bool {
        matches!(self, Number::Complex(_))
    }
}

/// Dense array data, real or complex.
///
/// Complex data keeps both parts together, so the real and imaginary
/// parts always share one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Dense<T> {
    Real(ArrayD<T>),
    Complex(ArrayD<Complex<T>>),
}

impl<T> Dense<T> {
    pub fn is_complex(&self) -> bool {
        matches!(self, Dense::Complex(_))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Dense::Real(a) => a.shape(),
            Dense::Complex(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dispatch on a [`NumericClass`], binding the matching primitive to a type
/// alias inside the body.
///
/// ```
/// use matlink_value::{with_element_type, NumericClass};
///
/// let width = with_element_type!(NumericClass::I16, T => std::mem::size_of::<T>());
/// assert_eq!(width, 2);
/// ```
#[macro_export]
macro_rules! with_element_type {
    ($class:expr, $T:ident => $body:expr) => {
        match $class {
            $crate::NumericClass::F64 => {
                type $T = f64;
                $body
            }
            $crate::NumericClass::F32 => {
                type $T = f32;
                $body
            }
            $crate::NumericClass::I8 => {
                type $T = i8;
                $body
            }
            $crate::NumericClass::U8 => {
                type $T = u8;
                $body
            }
            $crate::NumericClass::I16 => {
                type $T = i16;
                $body
            }
            $crate::NumericClass::U16 => {
                type $T = u16;
                $body
            }
            $crate::NumericClass::I32 => {
                type $T = i32;
                $body
            }
            $crate::NumericClass::U32 => {
                type $T = u32;
                $body
            }
            $crate::NumericClass::I64 => {
                type $T = i64;
                $body
            }
            $crate::NumericClass::U64 => {
                type $T = u64;
                $body
            }
        }
    };
}

/// Match every variant of [`Scalar`] or [`NumericArray`] with one arm.
#[macro_export]
macro_rules! match_numeric {
    ($value:expr, $kind:ident, $binding:ident => $body:expr) => {
        match $value {
            $crate::$kind::F64($binding) => $body,
            $crate::$kind::F32($binding) => $body,
            $crate::$kind::I8($binding) => $body,
            $crate::$kind::U8($binding) => $body,
            $crate::$kind::I16($binding) => $body,
            $crate::$kind::U16($binding) => $body,
            $crate::$kind::I32($binding) => $body,
            $crate::$kind::U32($binding) => $body,
            $crate::$kind::I64($binding) => $body,
            $crate::$kind::U64($binding) => $body,
        }
    };
}

macro_rules! numeric_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// Numeric scalar of any class, real or complex.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Scalar {
            $($variant(Number<$ty>),)*
        }

        /// Dense numeric array of any class, real or complex.
        #[derive(Debug, Clone, PartialEq)]
        pub enum NumericArray {
            $($variant(Dense<$ty>),)*
        }

        impl Scalar {
            pub fn class(&self) -> NumericClass {
                match self {
                    $(Scalar::$variant(_) => NumericClass::$variant,)*
                }
            }

            /// Value widened to a complex double.
            pub fn to_complex_f64(&self) -> Complex<f64> {
                match self {
                    $(
                        Scalar::$variant(Number::Real(v)) => Complex::new(*v as f64, 0.0),
                        Scalar::$variant(Number::Complex(c)) => {
                            Complex::new(c.re as f64, c.im as f64)
                        }
                    )*
                }
            }
        }

        $(
            impl Element for $ty {
                const CLASS: NumericClass = NumericClass::$variant;

                fn into_scalar(number: Number<Self>) -> Scalar {
                    Scalar::$variant(number)
                }

                fn into_array(dense: Dense<Self>) -> NumericArray {
                    NumericArray::$variant(dense)
                }

                fn from_scalar(scalar: &Scalar) -> Option<Number<Self>> {
                    match scalar {
                        Scalar::$variant(n) => Some(*n),
                        _ => None,
                    }
                }

                fn from_array(array: &NumericArray) -> Option<&Dense<Self>> {
                    match array {
                        NumericArray::$variant(d) => Some(d),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(Scalar::$variant(Number::Real(v)))
                }
            }

            impl From<Complex<$ty>> for Value {
                fn from(v: Complex<$ty>) -> Self {
                    Value::Scalar(Scalar::$variant(Number::Complex(v)))
                }
            }

            impl From<ArrayD<$ty>> for Value {
                fn from(a: ArrayD<$ty>) -> Self {
                    Value::Numeric(NumericArray::$variant(Dense::Real(a)))
                }
            }

            impl From<ArrayD<Complex<$ty>>> for Value {
                fn from(a: ArrayD<Complex<$ty>>) -> Self {
                    Value::Numeric(NumericArray::$variant(Dense::Complex(a)))
                }
            }

            /// A vector becomes a rank-1 array; it is written as a 1xN row.
            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Self {
                    Value::from(ndarray::Array1::from_vec(v).into_dyn())
                }
            }
        )*
    };
}

numeric_kinds! {
    F64 => f64,
    F32 => f32,
    I8 => i8,
    U8 => u8,
    I16 => i16,
    U16 => u16,
    I32 => i32,
    U32 => u32,
    I64 => i64,
    U64 => u64,
}

impl Scalar {
    pub fn is_complex(&self) -> bool {
        match_numeric!(self, Scalar, n => n.is_complex())
    }
}

impl NumericArray {
    pub fn class(&self) -> NumericClass {
        match_numeric!(self, NumericArray, d => element_class(d))
    }

    pub fn is_complex(&self) -> bool {
        match_numeric!(self, NumericArray, d => d.is_complex())
    }

    pub fn shape(&self) -> &[usize] {
        match_numeric!(self, NumericArray, d => d.shape())
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view of the data, if the class is `T`.
    pub fn as_dense<T: Element>(&self) -> Option<&Dense<T>> {
        T::from_array(self)
    }
}

fn element_class<T: Element>(_: &Dense<T>) -> NumericClass {
    T::CLASS
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match_numeric!(self, Scalar, n => match n {
            Number::Real(v) => write!(f, "{v}"),
            Number::Complex(c) => write!(f, "{} + {}i", c.re, c.im),
        })
    }
}
