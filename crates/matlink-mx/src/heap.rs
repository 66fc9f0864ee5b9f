//! In-process implementation of the matrix API.
//!
//! Arrays are boxed on the Rust heap and handed out as raw handles, the way
//! the C API hands out `mxArray*`. A table of live addresses lets every call
//! reject handles that were never allocated here or were already destroyed.

use std::collections::HashSet;

use matlink_abi::{ComplexLayout, MxArray, MxClassId, MxComplexity, MxHandle};
use parking_lot::Mutex;

use crate::{text_units, MxAlloc, MxError, MxQuery};

#[derive(Clone)]
enum Storage {
    /// `real` holds interleaved pairs when the array is complex and the
    /// layout is interleaved; `imag` is then empty.
    Numeric {
        complex: bool,
        real: Vec<u8>,
        imag: Vec<u8>,
    },
    Logical(Vec<u8>),
    Char(Vec<u16>),
    Cell(Vec<Option<MxHandle>>),
    Struct {
        names: Vec<String>,
        /// `slots[element][field]`
        slots: Vec<Vec<Option<MxHandle>>>,
    },
    Opaque,
}

#[derive(Clone)]
struct HeapArray {
    class: MxClassId,
    dims: Vec<usize>,
    storage: Storage,
}

impl HeapArray {
    fn count(&self) -> usize {
        self.dims.iter().product()
    }

    fn children(&self) -> Vec<MxHandle> {
        match &self.storage {
            Storage::Cell(items) => items.iter().flatten().copied().collect(),
            Storage::Struct { slots, .. } => slots.iter().flatten().flatten().copied().collect(),
            _ => Vec::new(),
        }
    }
}

/// Matrix API backed by Rust-owned arrays.
///
/// Complex storage follows the layout chosen at construction, so both code
/// paths of a consumer can be exercised without a MATLAB installation.
pub struct HeapMx {
    layout: ComplexLayout,
    live: Mutex<HashSet<usize>>,
}

impl Default for HeapMx {
    fn default() -> Self {
        Self::new(ComplexLayout::Interleaved)
    }
}

impl HeapMx {
    pub fn new(layout: ComplexLayout) -> Self {
        Self {
            layout,
            live: Mutex::new(HashSet::new()),
        }
    }

    /// Number of arrays currently allocated, nested elements included.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, array: MxHandle) -> bool {
        self.live.lock().contains(&array.addr())
    }

    /// Allocate an array of a class that carries no data buffer, such as a
    /// function handle or a class instance.
    pub fn create_opaque(&self, class: MxClassId, dims: &[usize]) -> Result<MxHandle, MxError> {
        self.insert(HeapArray {
            class,
            dims: normalize_dims(dims),
            storage: Storage::Opaque,
        })
    }

    fn insert(&self, array: HeapArray) -> Result<MxHandle, MxError> {
        let raw = Box::into_raw(Box::new(array)) as *mut MxArray;
        let handle = MxHandle::from_raw(raw).ok_or(MxError::call("mxMalloc"))?;
        self.live.lock().insert(handle.addr());
        Ok(handle)
    }

    fn with<R>(
        &self,
        array: MxHandle,
        f: impl FnOnce(&HeapArray) -> Result<R, MxError>,
    ) -> Result<R, MxError> {
        let live = self.live.lock();
        if !live.contains(&array.addr()) {
            return Err(MxError::InvalidHandle(array));
        }
        let target = unsafe { &*(array.as_ptr() as *const HeapArray) };
        f(target)
    }

    fn with_mut<R>(
        &self,
        array: MxHandle,
        f: impl FnOnce(&mut HeapArray) -> Result<R, MxError>,
    ) -> Result<R, MxError> {
        let live = self.live.lock();
        if !live.contains(&array.addr()) {
            return Err(MxError::InvalidHandle(array));
        }
        let target = unsafe { &mut *(array.as_ptr() as *mut HeapArray) };
        f(target)
    }

    fn numeric_pointer(
        &self,
        array: MxHandle,
        part: Part,
        function: &'static str,
    ) -> Result<*mut u8, MxError> {
        let layout = self.layout;
        self.with_mut(array, |target| match &mut target.storage {
            Storage::Numeric { complex, real, imag } => {
                let buffer = match part {
                    Part::Real => real,
                    Part::Imag if *complex && layout == ComplexLayout::Split => imag,
                    Part::Interleaved if *complex && layout == ComplexLayout::Interleaved => real,
                    _ => return Err(MxError::call(function)),
                };
                data_pointer(buffer, function)
            }
            Storage::Logical(bytes) if part == Part::Real => data_pointer(bytes, function),
            Storage::Char(units) if part == Part::Real => {
                if units.is_empty() {
                    Err(MxError::call(function))
                } else {
                    Ok(units.as_mut_ptr().cast())
                }
            }
            _ => Err(MxError::call(function)),
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Part {
    Real,
    Imag,
    Interleaved,
}

/// The C API returns null for the data of an empty array.
fn data_pointer(buffer: &mut [u8], function: &'static str) -> Result<*mut u8, MxError> {
    if buffer.is_empty() {
        Err(MxError::call(function))
    } else {
        Ok(buffer.as_mut_ptr())
    }
}

/// Fewer than two dimensions are padded, trailing singletons beyond the
/// second are dropped, as the C API does.
fn normalize_dims(dims: &[usize]) -> Vec<usize> {
    let mut out = match dims.len() {
        0 => vec![0, 0],
        1 => vec![dims[0], 1],
        _ => dims.to_vec(),
    };
    while out.len() > 2 && out.last() == Some(&1) {
        out.pop();
    }
    out
}

impl Drop for HeapMx {
    fn drop(&mut self) {
        let live: Vec<usize> = self.live.get_mut().drain().collect();
        for addr in live {
            // Children are in the table too, so every box is freed exactly once.
            drop(unsafe { Box::from_raw(addr as *mut HeapArray) });
        }
    }
}

impl MxQuery for HeapMx {
    fn class_id(&self, array: MxHandle) -> Result<MxClassId, MxError> {
        self.with(array, |a| Ok(a.class))
    }

    fn dimensions(&self, array: MxHandle) -> Result<Vec<usize>, MxError> {
        self.with(array, |a| Ok(a.dims.clone()))
    }

    fn element_count(&self, array: MxHandle) -> Result<usize, MxError> {
        self.with(array, |a| Ok(a.count()))
    }

    fn element_size(&self, array: MxHandle) -> Result<usize, MxError> {
        let layout = self.layout;
        self.with(array, |a| {
            let width = match a.storage {
                Storage::Cell(_) | Storage::Struct { .. } | Storage::Opaque => {
                    std::mem::size_of::<usize>()
                }
                _ => a.class.element_width().unwrap_or(0),
            };
            Ok(match a.storage {
                Storage::Numeric { complex: true, .. } if layout == ComplexLayout::Interleaved => {
                    width * 2
                }
                _ => width,
            })
        })
    }

    fn is_complex(&self, array: MxHandle) -> Result<bool, MxError> {
        self.with(array, |a| {
            Ok(matches!(a.storage, Storage::Numeric { complex: true, .. }))
        })
    }

    fn complex_layout(&self) -> ComplexLayout {
        self.layout
    }

    fn real_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        self.numeric_pointer(array, Part::Real, "mxGetData")
            .map(|p| p as *const u8)
    }

    fn imag_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        self.numeric_pointer(array, Part::Imag, "mxGetImagData")
            .map(|p| p as *const u8)
    }

    fn complex_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        self.numeric_pointer(array, Part::Interleaved, "mxGetComplexData")
            .map(|p| p as *const u8)
    }

    fn decode_text(&self, array: MxHandle) -> Result<Vec<u8>, MxError> {
        self.with(array, |a| match &a.storage {
            Storage::Char(units) => Ok(String::from_utf16_lossy(units).into_bytes()),
            _ => Err(MxError::call("mxArrayToUTF8String")),
        })
    }

    fn cell(&self, array: MxHandle, index: usize) -> Result<Option<MxHandle>, MxError> {
        self.with(array, |a| match &a.storage {
            Storage::Cell(items) => items
                .get(index)
                .copied()
                .ok_or(MxError::call("mxGetCell")),
            _ => Err(MxError::call("mxGetCell")),
        })
    }

    fn field_count(&self, array: MxHandle) -> Result<usize, MxError> {
        self.with(array, |a| match &a.storage {
            Storage::Struct { names, .. } => Ok(names.len()),
            _ => Ok(0),
        })
    }

    fn field_name(&self, array: MxHandle, field: usize) -> Result<String, MxError> {
        self.with(array, |a| match &a.storage {
            Storage::Struct { names, .. } => names
                .get(field)
                .cloned()
                .ok_or(MxError::call("mxGetFieldNameByNumber")),
            _ => Err(MxError::call("mxGetFieldNameByNumber")),
        })
    }

    fn field(
        &self,
        array: MxHandle,
        element: usize,
        field: usize,
    ) -> Result<Option<MxHandle>, MxError> {
        self.with(array, |a| match &a.storage {
            Storage::Struct { slots, .. } => slots
                .get(element)
                .and_then(|row| row.get(field))
                .copied()
                .ok_or(MxError::call("mxGetFieldByNumber")),
            _ => Err(MxError::call("mxGetFieldByNumber")),
        })
    }
}

impl MxAlloc for HeapMx {
    fn create_numeric(
        &self,
        dims: &[usize],
        class: MxClassId,
        complexity: MxComplexity,
    ) -> Result<MxHandle, MxError> {
        if !class.is_numeric() {
            return Err(MxError::call("mxCreateNumericArray"));
        }
        let width = class
            .element_width()
            .ok_or(MxError::call("mxCreateNumericArray"))?;
        let dims = normalize_dims(dims);
        let bytes = dims.iter().product::<usize>() * width;
        let complex = complexity == MxComplexity::Complex;
        let (real, imag) = match (complex, self.layout) {
            (false, _) => (vec![0; bytes], Vec::new()),
            (true, ComplexLayout::Split) => (vec![0; bytes], vec![0; bytes]),
            (true, ComplexLayout::Interleaved) => (vec![0; bytes * 2], Vec::new()),
        };
        self.insert(HeapArray {
            class,
            dims,
            storage: Storage::Numeric {
                complex,
                real,
                imag,
            },
        })
    }

    fn create_logical(&self, dims: &[usize]) -> Result<MxHandle, MxError> {
        let dims = normalize_dims(dims);
        let count = dims.iter().product();
        self.insert(HeapArray {
            class: MxClassId::Logical,
            dims,
            storage: Storage::Logical(vec![0; count]),
        })
    }

    fn create_string(&self, text: &[u8]) -> Result<MxHandle, MxError> {
        let units = text_units(text);
        let dims = if units.is_empty() {
            vec![0, 0]
        } else {
            vec![1, units.len()]
        };
        self.insert(HeapArray {
            class: MxClassId::Char,
            dims,
            storage: Storage::Char(units),
        })
    }

    fn create_cell(&self, dims: &[usize]) -> Result<MxHandle, MxError> {
        let dims = normalize_dims(dims);
        let count = dims.iter().product();
        self.insert(HeapArray {
            class: MxClassId::Cell,
            dims,
            storage: Storage::Cell(vec![None; count]),
        })
    }

    fn set_cell(&self, array: MxHandle, index: usize, value: MxHandle) -> Result<(), MxError> {
        let previous = self.with_mut(array, |a| match &mut a.storage {
            Storage::Cell(items) => {
                let slot = items.get_mut(index).ok_or(MxError::call("mxSetCell"))?;
                Ok(slot.replace(value))
            }
            _ => Err(MxError::call("mxSetCell")),
        })?;
        if let Some(old) = previous.filter(|old| *old != value) {
            self.destroy(old);
        }
        Ok(())
    }

    fn create_struct(&self, dims: &[usize], fields: &[&str]) -> Result<MxHandle, MxError> {
        let dims = normalize_dims(dims);
        let count = dims.iter().product();
        let mut names: Vec<String> = Vec::with_capacity(fields.len());
        for name in fields {
            if names.iter().any(|n| n == name) {
                return Err(MxError::call("mxCreateStructArray"));
            }
            names.push(name.to_string());
        }
        let slots = vec![vec![None; names.len()]; count];
        self.insert(HeapArray {
            class: MxClassId::Struct,
            dims,
            storage: Storage::Struct { names, slots },
        })
    }

    fn add_field(&self, array: MxHandle, name: &str) -> Result<usize, MxError> {
        self.with_mut(array, |a| match &mut a.storage {
            Storage::Struct { names, slots } => {
                if let Some(existing) = names.iter().position(|n| n == name) {
                    return Ok(existing);
                }
                names.push(name.to_string());
                for row in slots.iter_mut() {
                    row.push(None);
                }
                Ok(names.len() - 1)
            }
            _ => Err(MxError::call("mxAddField")),
        })
    }

    fn set_field(
        &self,
        array: MxHandle,
        element: usize,
        name: &str,
        value: MxHandle,
    ) -> Result<(), MxError> {
        let previous = self.with_mut(array, |a| match &mut a.storage {
            Storage::Struct { names, slots } => {
                let field = names
                    .iter()
                    .position(|n| n == name)
                    .ok_or(MxError::call("mxSetField"))?;
                let slot = slots
                    .get_mut(element)
                    .and_then(|row| row.get_mut(field))
                    .ok_or(MxError::call("mxSetField"))?;
                Ok(slot.replace(value))
            }
            _ => Err(MxError::call("mxSetField")),
        })?;
        if let Some(old) = previous.filter(|old| *old != value) {
            self.destroy(old);
        }
        Ok(())
    }

    fn real_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        self.numeric_pointer(array, Part::Real, "mxGetData")
    }

    fn imag_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        self.numeric_pointer(array, Part::Imag, "mxGetImagData")
    }

    fn complex_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        self.numeric_pointer(array, Part::Interleaved, "mxGetComplexData")
    }

    fn duplicate(&self, array: MxHandle) -> Result<MxHandle, MxError> {
        let mut copy = self.with(array, |a| Ok(a.clone()))?;
        match &mut copy.storage {
            Storage::Cell(items) => {
                for slot in items.iter_mut().flatten() {
                    *slot = self.duplicate(*slot)?;
                }
            }
            Storage::Struct { slots, .. } => {
                for slot in slots.iter_mut().flatten().flatten() {
                    *slot = self.duplicate(*slot)?;
                }
            }
            _ => {}
        }
        self.insert(copy)
    }

    fn destroy(&self, array: MxHandle) {
        let mut pending = vec![array];
        let mut live = self.live.lock();
        while let Some(next) = pending.pop() {
            if !live.remove(&next.addr()) {
                log::warn!("destroy of unknown array {:?}", next);
                continue;
            }
            let boxed = unsafe { Box::from_raw(next.as_ptr() as *mut HeapArray) };
            pending.extend(boxed.children());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_query_numeric() {
        let mx = HeapMx::default();
        let arr = mx
            .create_numeric(&[3, 4], MxClassId::Double, MxComplexity::Real)
            .unwrap();
        assert_eq!(mx.class_id(arr).unwrap(), MxClassId::Double);
        assert_eq!(mx.dimensions(arr).unwrap(), vec![3, 4]);
        assert_eq!(mx.element_count(arr).unwrap(), 12);
        assert_eq!(mx.element_size(arr).unwrap(), 8);
        assert!(!mx.is_complex(arr).unwrap());
        assert!(mx.imag_data(arr).is_err());
        mx.destroy(arr);
        assert_eq!(mx.live_count(), 0);
    }

    #[test]
    fn trailing_singletons_are_dropped() {
        let mx = HeapMx::default();
        let arr = mx.create_logical(&[2, 3, 1, 1]).unwrap();
        assert_eq!(mx.dimensions(arr).unwrap(), vec![2, 3]);
        let arr = mx.create_cell(&[4]).unwrap();
        assert_eq!(mx.dimensions(arr).unwrap(), vec![4, 1]);
    }

    #[test]
    fn split_layout_has_separate_imaginary_buffer() {
        let mx = HeapMx::new(ComplexLayout::Split);
        let arr = mx
            .create_numeric(&[2, 2], MxClassId::Single, MxComplexity::Complex)
            .unwrap();
        assert_eq!(mx.element_size(arr).unwrap(), 4);
        assert!(mx.imag_data(arr).is_ok());
        assert!(mx.complex_data(arr).is_err());
    }

    #[test]
    fn interleaved_layout_doubles_element_size() {
        let mx = HeapMx::new(ComplexLayout::Interleaved);
        let arr = mx
            .create_numeric(&[2, 2], MxClassId::Single, MxComplexity::Complex)
            .unwrap();
        assert_eq!(mx.element_size(arr).unwrap(), 8);
        assert!(mx.imag_data(arr).is_err());
        assert!(mx.complex_data(arr).is_ok());
    }

    #[test]
    fn empty_array_has_no_data_pointer() {
        let mx = HeapMx::default();
        let arr = mx
            .create_numeric(&[0, 0], MxClassId::Double, MxComplexity::Real)
            .unwrap();
        assert!(mx.real_data(arr).is_err());
    }

    #[test]
    fn text_is_stored_as_utf16() {
        let mx = HeapMx::default();
        let arr = mx.create_string("h\u{eb}llo".as_bytes()).unwrap();
        assert_eq!(mx.class_id(arr).unwrap(), MxClassId::Char);
        assert_eq!(mx.dimensions(arr).unwrap(), vec![1, 5]);
        assert_eq!(mx.decode_text(arr).unwrap(), "h\u{eb}llo".as_bytes());
    }

    #[test]
    fn raw_bytes_are_stored_one_character_each() {
        let mx = HeapMx::default();
        let arr = mx.create_string(&[0xe9, 0x00, b'a']).unwrap();
        assert_eq!(mx.dimensions(arr).unwrap(), vec![1, 3]);
        assert_eq!(mx.decode_text(arr).unwrap(), "\u{e9}\0a".as_bytes());
    }

    #[test]
    fn destroying_a_container_frees_its_elements() {
        let mx = HeapMx::default();
        let cell = mx.create_cell(&[1, 2]).unwrap();
        let inner = mx.create_string(b"x").unwrap();
        mx.set_cell(cell, 1, inner).unwrap();
        assert_eq!(mx.cell(cell, 0).unwrap(), None);
        assert_eq!(mx.cell(cell, 1).unwrap(), Some(inner));
        assert_eq!(mx.live_count(), 2);
        mx.destroy(cell);
        assert_eq!(mx.live_count(), 0);
        assert!(matches!(
            mx.class_id(inner),
            Err(MxError::InvalidHandle(_))
        ));
    }

    #[test]
    fn struct_fields_keep_order() {
        let mx = HeapMx::default();
        let st = mx.create_struct(&[1, 2], &["b"]).unwrap();
        assert_eq!(mx.add_field(st, "a").unwrap(), 1);
        assert_eq!(mx.add_field(st, "b").unwrap(), 0);
        assert_eq!(mx.field_count(st).unwrap(), 2);
        assert_eq!(mx.field_name(st, 1).unwrap(), "a");
        let value = mx.create_string(b"v").unwrap();
        mx.set_field(st, 1, "a", value).unwrap();
        assert_eq!(mx.field(st, 1, 1).unwrap(), Some(value));
        assert_eq!(mx.field(st, 0, 1).unwrap(), None);
        assert!(mx.set_field(st, 0, "missing", value).is_err());
    }

    #[test]
    fn duplicate_copies_nested_elements() {
        let mx = HeapMx::default();
        let cell = mx.create_cell(&[1, 1]).unwrap();
        let inner = mx.create_string(b"x").unwrap();
        mx.set_cell(cell, 0, inner).unwrap();
        let copy = mx.duplicate(cell).unwrap();
        assert_eq!(mx.live_count(), 4);
        let copied_inner = mx.cell(copy, 0).unwrap().unwrap();
        assert_ne!(copied_inner, inner);
        mx.destroy(cell);
        assert_eq!(mx.decode_text(copied_inner).unwrap(), b"x");
        mx.destroy(copy);
        assert_eq!(mx.live_count(), 0);
    }
}
