use log::{debug, trace};
use matlink_abi::{ComplexLayout, MxComplexity, MxHandle, MxLogical};
use matlink_mx::{MxAlloc, MxApi};
use matlink_value::{
    match_numeric, with_element_type, Complex, Dense, Element, Number, StructArray, StructValue,
    Value,
};
use ndarray::{ArrayD, Dimension, IxDyn, ShapeBuilder};

use crate::buffers::{check_element_size, read_real, write_real, zeroed};
use crate::complex::{ComplexBufferReader, ComplexBufferWriter, InterleavedComplex, SplitComplex};
use crate::layout::{from_column_major, linear_index, multi_index, to_column_major};
use crate::normalize::{at_least_2d, logical_value, numeric_value, struct_value};
use crate::registry::{class_id_for, element_type_for, ElementType};
use crate::MarshalError;

/// Converts between foreign arrays and host values through one matrix
/// library.
///
/// The complex storage strategy is chosen from the library's
/// [`complex_layout`](matlink_mx::MxQuery::complex_layout) when the
/// converter is built.
///
/// Ownership: [`to_host`](Self::to_host) never destroys the handle it is
/// given, and every handle returned by [`to_foreign`](Self::to_foreign) is
/// owned by the caller.
pub struct Converter<'a, M: MxApi + ?Sized> {
    mx: &'a M,
    layout: ComplexLayout,
    reader: Box<dyn ComplexBufferReader<M> + 'a>,
    writer: Box<dyn ComplexBufferWriter<M> + 'a>,
}

impl<'a, M: MxApi + ?Sized> Converter<'a, M> {
    pub fn new(mx: &'a M) -> Self {
        let layout = mx.complex_layout();
        let (reader, writer): (
            Box<dyn ComplexBufferReader<M> + 'a>,
            Box<dyn ComplexBufferWriter<M> + 'a>,
        ) = match layout {
            ComplexLayout::Split => (Box::new(SplitComplex), Box::new(SplitComplex)),
            ComplexLayout::Interleaved => {
                (Box::new(InterleavedComplex), Box::new(InterleavedComplex))
            }
        };
        Self {
            mx,
            layout,
            reader,
            writer,
        }
    }

    pub fn layout(&self) -> ComplexLayout {
        self.layout
    }

    /// Convert a foreign array into a host value.
    ///
    /// Arrays whose class has no host counterpart come back as
    /// [`Value::Foreign`] holding the same handle.
    pub fn to_host(&self, array: MxHandle) -> Result<Value, MarshalError> {
        let class = self.mx.class_id(array)?;
        let Some(kind) = element_type_for(class) else {
            debug!("declining conversion of {} array {:?}", class.name(), array);
            return Ok(Value::Foreign(array));
        };
        let shape = self.mx.dimensions(array)?;
        let count = self.mx.element_count(array)?;
        if count != shape.iter().product::<usize>() {
            return Err(MarshalError::malformed(format!(
                "{} array reports {count} elements for shape {shape:?}",
                class.name()
            )));
        }
        trace!("to_host {} {:?}", class.name(), shape);
        match kind {
            ElementType::Numeric(numeric) => {
                with_element_type!(numeric, T => self.read_numeric::<T>(array, &shape, count))
            }
            ElementType::Logical => self.read_logical(array, &shape, count),
            ElementType::Char => self.read_text(array),
            ElementType::Cell => self.read_cell(array, &shape, count),
            ElementType::Struct => self.read_struct(array, &shape, count),
        }
    }

    /// Build a new foreign array from a host value.
    ///
    /// [`Value::Foreign`] is passed back unchanged at the top level. Nested
    /// inside a cell or struct it is duplicated, since the container takes
    /// ownership of its elements.
    pub fn to_foreign(&self, value: &Value) -> Result<MxHandle, MarshalError> {
        match value {
            Value::Foreign(handle) => Ok(*handle),
            other => self.write(other),
        }
    }

    fn read_numeric<T: Element>(
        &self,
        array: MxHandle,
        shape: &[usize],
        count: usize,
    ) -> Result<Value, MarshalError> {
        let width = T::CLASS.width();
        let complex = self.mx.is_complex(array)?;
        if count > 0 {
            let expected = if complex {
                self.reader.element_size(width)
            } else {
                width
            };
            check_element_size(T::CLASS.name(), self.mx.element_size(array)?, expected)?;
        }
        let dense = if complex {
            let mut re = zeroed::<T>(count);
            let mut im = zeroed::<T>(count);
            self.reader.read(
                self.mx,
                array,
                width,
                bytemuck::cast_slice_mut(&mut re),
                bytemuck::cast_slice_mut(&mut im),
            )?;
            let data: Vec<Complex<T>> = re
                .into_iter()
                .zip(im)
                .map(|(re, im)| Complex::new(re, im))
                .collect();
            Dense::Complex(from_column_major(shape, data)?)
        } else {
            Dense::Real(from_column_major(shape, read_real(self.mx, array, count)?)?)
        };
        Ok(numeric_value(dense))
    }

    fn read_logical(
        &self,
        array: MxHandle,
        shape: &[usize],
        count: usize,
    ) -> Result<Value, MarshalError> {
        if count > 0 {
            check_element_size("logical", self.mx.element_size(array)?, 1)?;
        }
        let bytes: Vec<MxLogical> = read_real(self.mx, array, count)?;
        let flags: Vec<bool> = bytes.into_iter().map(|b| b != 0).collect();
        Ok(logical_value(from_column_major(shape, flags)?))
    }

    fn read_text(&self, array: MxHandle) -> Result<Value, MarshalError> {
        let bytes = self.mx.decode_text(array)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        })
    }

    /// Unset slots read as the empty value.
    fn read_element(&self, item: Option<MxHandle>) -> Result<Value, MarshalError> {
        match item {
            Some(item) => self.to_host(item),
            None => Ok(Value::empty()),
        }
    }

    fn read_cell(
        &self,
        array: MxHandle,
        shape: &[usize],
        count: usize,
    ) -> Result<Value, MarshalError> {
        let mut cells = ArrayD::from_elem(IxDyn(shape).f(), Value::empty());
        for element in 0..count {
            let value = self.read_element(self.mx.cell(array, element)?)?;
            let index = multi_index(shape, element);
            let slot = cells.get_mut(index.as_slice()).ok_or_else(|| {
                MarshalError::malformed(format!("cell element {element} outside shape {shape:?}"))
            })?;
            *slot = value;
        }
        Ok(Value::Cell(cells))
    }

    fn read_struct(
        &self,
        array: MxHandle,
        shape: &[usize],
        count: usize,
    ) -> Result<Value, MarshalError> {
        let field_count = self.mx.field_count(array)?;
        let mut names: Vec<String> = Vec::with_capacity(field_count);
        for field in 0..field_count {
            let name = self.mx.field_name(array, field).map_err(|e| {
                MarshalError::malformed(format!("field {field} has no readable name: {e}"))
            })?;
            if names.contains(&name) {
                return Err(MarshalError::malformed(format!(
                    "field '{name}' appears twice"
                )));
            }
            names.push(name);
        }
        let mut out = StructArray::new(shape, names.iter().map(String::as_str));
        for element in 0..count {
            let index = multi_index(shape, element);
            for (field, name) in names.iter().enumerate() {
                let value = self.read_element(self.mx.field(array, element, field)?)?;
                out.set(&index, name, value)
                    .map_err(MarshalError::MalformedContainer)?;
            }
        }
        Ok(struct_value(out))
    }

    fn write(&self, value: &Value) -> Result<MxHandle, MarshalError> {
        match value {
            Value::Scalar(scalar) => match_numeric!(scalar, Scalar, n => self.write_scalar(n)),
            Value::Numeric(array) => {
                match_numeric!(array, NumericArray, dense => self.write_dense(dense))
            }
            Value::Bool(flag) => self.write_logical(&[1, 1], &[MxLogical::from(*flag)]),
            Value::Logical(flags) => {
                let bytes: Vec<MxLogical> =
                    to_column_major(flags).into_iter().map(MxLogical::from).collect();
                self.write_logical(&at_least_2d(flags.shape()), &bytes)
            }
            Value::Text(text) => Ok(self.mx.create_string(text.as_bytes())?),
            Value::Bytes(bytes) => Ok(self.mx.create_string(bytes)?),
            Value::Cell(cells) => self.write_cell(cells),
            Value::Struct(fields) => self.write_struct(fields),
            Value::StructArray(array) => self.write_struct_array(array),
            Value::Foreign(handle) => Ok(self.mx.duplicate(*handle)?),
        }
    }

    fn write_scalar<T: Element>(&self, number: &Number<T>) -> Result<MxHandle, MarshalError> {
        match number {
            Number::Real(v) => self.write_real_data(&[1, 1], std::slice::from_ref(v)),
            Number::Complex(c) => self.write_complex_data(&[1, 1], std::slice::from_ref(c)),
        }
    }

    fn write_dense<T: Element>(&self, dense: &Dense<T>) -> Result<MxHandle, MarshalError> {
        match dense {
            Dense::Real(a) => self.write_real_data(&at_least_2d(a.shape()), &to_column_major(a)),
            Dense::Complex(a) => {
                self.write_complex_data(&at_least_2d(a.shape()), &to_column_major(a))
            }
        }
    }

    fn write_real_data<T: Element>(
        &self,
        shape: &[usize],
        data: &[T],
    ) -> Result<MxHandle, MarshalError> {
        let array = self.allocate(self.mx.create_numeric(
            shape,
            class_id_for(T::CLASS),
            MxComplexity::Real,
        )?);
        write_real(self.mx, array.handle(), data)?;
        Ok(array.release())
    }

    fn write_complex_data<T: Element>(
        &self,
        shape: &[usize],
        data: &[Complex<T>],
    ) -> Result<MxHandle, MarshalError> {
        let array = self.allocate(self.mx.create_numeric(
            shape,
            class_id_for(T::CLASS),
            MxComplexity::Complex,
        )?);
        let re: Vec<T> = data.iter().map(|c| c.re).collect();
        let im: Vec<T> = data.iter().map(|c| c.im).collect();
        self.writer.write(
            self.mx,
            array.handle(),
            T::CLASS.width(),
            bytemuck::cast_slice(&re),
            bytemuck::cast_slice(&im),
        )?;
        Ok(array.release())
    }

    fn write_logical(
        &self,
        shape: &[usize],
        bytes: &[MxLogical],
    ) -> Result<MxHandle, MarshalError> {
        let array = self.allocate(self.mx.create_logical(shape)?);
        write_real(self.mx, array.handle(), bytes)?;
        Ok(array.release())
    }

    fn write_cell(&self, cells: &ArrayD<Value>) -> Result<MxHandle, MarshalError> {
        let array = self.allocate(self.mx.create_cell(&at_least_2d(cells.shape()))?);
        for (index, value) in cells.indexed_iter() {
            let linear = linear_index(cells.shape(), index.slice());
            let item = self.allocate(self.write(value)?);
            self.mx.set_cell(array.handle(), linear, item.handle())?;
            item.release();
        }
        Ok(array.release())
    }

    fn write_struct(&self, fields: &StructValue) -> Result<MxHandle, MarshalError> {
        let array = self.allocate(self.mx.create_struct(&[1, 1], &[])?);
        for (name, value) in &fields.fields {
            check_field_name(name)?;
            self.mx.add_field(array.handle(), name)?;
            let item = self.allocate(self.write(value)?);
            self.mx.set_field(array.handle(), 0, name, item.handle())?;
            item.release();
        }
        Ok(array.release())
    }

    fn write_struct_array(&self, structs: &StructArray) -> Result<MxHandle, MarshalError> {
        let shape = structs.shape();
        let array = self.allocate(self.mx.create_struct(&at_least_2d(shape), &[])?);
        for (name, values) in structs.fields() {
            check_field_name(name)?;
            if values.shape() != shape {
                return Err(MarshalError::malformed(format!(
                    "field '{name}' has shape {:?}, struct array has shape {shape:?}",
                    values.shape()
                )));
            }
            self.mx.add_field(array.handle(), name)?;
            for (index, value) in values.indexed_iter() {
                let linear = linear_index(shape, index.slice());
                let item = self.allocate(self.write(value)?);
                self.mx.set_field(array.handle(), linear, name, item.handle())?;
                item.release();
            }
        }
        Ok(array.release())
    }

    fn allocate(&self, handle: MxHandle) -> AllocGuard<'a, M> {
        AllocGuard {
            mx: self.mx,
            handle,
            armed: true,
        }
    }
}

/// Field names follow MATLAB identifier rules.
fn check_field_name(name: &str) -> Result<(), MarshalError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MarshalError::UnsupportedType(format!(
            "'{name}' is not a valid struct field name"
        )))
    }
}

/// Destroys a freshly allocated array unless it is released to the caller.
struct AllocGuard<'m, M: MxAlloc + ?Sized> {
    mx: &'m M,
    handle: MxHandle,
    armed: bool,
}

impl<M: MxAlloc + ?Sized> AllocGuard<'_, M> {
    fn handle(&self) -> MxHandle {
        self.handle
    }

    fn release(mut self) -> MxHandle {
        self.armed = false;
        self.handle
    }
}

impl<M: MxAlloc + ?Sized> Drop for AllocGuard<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            debug!("destroying partially built array {:?}", self.handle);
            self.mx.destroy(self.handle);
        }
    }
}
