//! Runtime binding of the MATLAB matrix library (`libmx`).

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::Path;
use std::ptr;

use matlink_abi::{
    ComplexLayout, MwIndex, MwSize, MxArray, MxChar, MxClassId, MxComplexity, MxHandle,
};

use crate::library::NativeLibrary;
use crate::{text_units, MxAlloc, MxError, MxQuery};

/// Export suffixes tried for every entry point, newest API first.
pub const LIBMX_SUFFIXES: &[&str] = &["_800", "_730", ""];

const LEGACY_SUFFIXES: &[&str] = &["_730", ""];

type GetClassIdFn = unsafe extern "C" fn(*const MxArray) -> c_int;
type GetSizeFn = unsafe extern "C" fn(*const MxArray) -> MwSize;
type GetDimensionsFn = unsafe extern "C" fn(*const MxArray) -> *const MwSize;
type IsFn = unsafe extern "C" fn(*const MxArray) -> bool;
type GetDataFn = unsafe extern "C" fn(*const MxArray) -> *mut c_void;
type ToStringFn = unsafe extern "C" fn(*const MxArray) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type GetCellFn = unsafe extern "C" fn(*const MxArray, MwIndex) -> *mut MxArray;
type SetCellFn = unsafe extern "C" fn(*mut MxArray, MwIndex, *mut MxArray);
type GetNumberOfFieldsFn = unsafe extern "C" fn(*const MxArray) -> c_int;
type GetFieldNameFn = unsafe extern "C" fn(*const MxArray, c_int) -> *const c_char;
type GetFieldByNumberFn = unsafe extern "C" fn(*const MxArray, MwIndex, c_int) -> *mut MxArray;
type CreateNumericArrayFn =
    unsafe extern "C" fn(MwSize, *const MwSize, c_int, c_int) -> *mut MxArray;
type CreateDimsFn = unsafe extern "C" fn(MwSize, *const MwSize) -> *mut MxArray;
type CreateStringFn = unsafe extern "C" fn(*const c_char) -> *mut MxArray;
type GetCharsFn = unsafe extern "C" fn(*const MxArray) -> *mut MxChar;
type CreateStructArrayFn =
    unsafe extern "C" fn(MwSize, *const MwSize, c_int, *const *const c_char) -> *mut MxArray;
type AddFieldFn = unsafe extern "C" fn(*mut MxArray, *const c_char) -> c_int;
type SetFieldFn = unsafe extern "C" fn(*mut MxArray, MwIndex, *const c_char, *mut MxArray);
type DuplicateFn = unsafe extern "C" fn(*const MxArray) -> *mut MxArray;
type DestroyFn = unsafe extern "C" fn(*mut MxArray);

/// Interleaved accessors, one per numeric class, in registry order.
const COMPLEX_ACCESSORS: [(MxClassId, &str); 10] = [
    (MxClassId::Double, "mxGetComplexDoubles"),
    (MxClassId::Single, "mxGetComplexSingles"),
    (MxClassId::Int8, "mxGetComplexInt8s"),
    (MxClassId::UInt8, "mxGetComplexUint8s"),
    (MxClassId::Int16, "mxGetComplexInt16s"),
    (MxClassId::UInt16, "mxGetComplexUint16s"),
    (MxClassId::Int32, "mxGetComplexInt32s"),
    (MxClassId::UInt32, "mxGetComplexUint32s"),
    (MxClassId::Int64, "mxGetComplexInt64s"),
    (MxClassId::UInt64, "mxGetComplexUint64s"),
];

/// The matrix library of a MATLAB installation.
///
/// Entry points are resolved once at load time. Whether the library exposes
/// the interleaved complex API decides [`MxQuery::complex_layout`].
pub struct LibMx {
    library: NativeLibrary,
    layout: ComplexLayout,
    get_class_id: GetClassIdFn,
    get_number_of_dimensions: GetSizeFn,
    get_dimensions: GetDimensionsFn,
    get_number_of_elements: GetSizeFn,
    get_element_size: GetSizeFn,
    is_complex: IsFn,
    get_data: GetDataFn,
    get_imag_data: Option<GetDataFn>,
    get_complex: Vec<(MxClassId, GetDataFn)>,
    to_utf8_string: Option<ToStringFn>,
    to_string: ToStringFn,
    free: FreeFn,
    get_cell: GetCellFn,
    set_cell: SetCellFn,
    get_number_of_fields: GetNumberOfFieldsFn,
    get_field_name: GetFieldNameFn,
    get_field_by_number: GetFieldByNumberFn,
    create_numeric_array: CreateNumericArrayFn,
    create_logical_array: CreateDimsFn,
    create_string: CreateStringFn,
    create_char_array: Option<CreateDimsFn>,
    get_chars: Option<GetCharsFn>,
    create_cell_array: CreateDimsFn,
    create_struct_array: CreateStructArrayFn,
    add_field: AddFieldFn,
    set_field: SetFieldFn,
    duplicate_array: DuplicateFn,
    destroy_array: DestroyFn,
}

// Resolved function pointers are immutable after load and the library
// handle is only used to keep them mapped.
unsafe impl Send for LibMx {}
unsafe impl Sync for LibMx {}

impl LibMx {
    /// Load `libmx` from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MxError> {
        let library = NativeLibrary::load(path)?;
        let interleaved = library.has_symbol("mxGetComplexDoubles", LIBMX_SUFFIXES);
        let (layout, suffixes) = if interleaved {
            (ComplexLayout::Interleaved, LIBMX_SUFFIXES)
        } else {
            (ComplexLayout::Split, LEGACY_SUFFIXES)
        };
        log::debug!(
            "{}: complex layout {:?}",
            library.path(),
            layout
        );

        unsafe {
            let get_complex = if interleaved {
                COMPLEX_ACCESSORS
                    .iter()
                    .filter_map(|(class, name)| {
                        library
                            .resolve_optional::<GetDataFn>(name, suffixes)
                            .map(|f| (*class, f))
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Ok(Self {
                layout,
                get_class_id: library.resolve("mxGetClassID", suffixes)?,
                get_number_of_dimensions: library.resolve("mxGetNumberOfDimensions", suffixes)?,
                get_dimensions: library.resolve("mxGetDimensions", suffixes)?,
                get_number_of_elements: library.resolve("mxGetNumberOfElements", suffixes)?,
                get_element_size: library.resolve("mxGetElementSize", suffixes)?,
                is_complex: library.resolve("mxIsComplex", suffixes)?,
                get_data: library.resolve("mxGetData", suffixes)?,
                get_imag_data: if interleaved {
                    None
                } else {
                    library.resolve_optional("mxGetImagData", suffixes)
                },
                get_complex,
                to_utf8_string: library.resolve_optional("mxArrayToUTF8String", suffixes),
                to_string: library.resolve("mxArrayToString", suffixes)?,
                free: library.resolve("mxFree", suffixes)?,
                get_cell: library.resolve("mxGetCell", suffixes)?,
                set_cell: library.resolve("mxSetCell", suffixes)?,
                get_number_of_fields: library.resolve("mxGetNumberOfFields", suffixes)?,
                get_field_name: library.resolve("mxGetFieldNameByNumber", suffixes)?,
                get_field_by_number: library.resolve("mxGetFieldByNumber", suffixes)?,
                create_numeric_array: library.resolve("mxCreateNumericArray", suffixes)?,
                create_logical_array: library.resolve("mxCreateLogicalArray", suffixes)?,
                create_string: library.resolve("mxCreateString", suffixes)?,
                create_char_array: library.resolve_optional("mxCreateCharArray", suffixes),
                get_chars: library.resolve_optional("mxGetChars", suffixes),
                create_cell_array: library.resolve("mxCreateCellArray", suffixes)?,
                create_struct_array: library.resolve("mxCreateStructArray", suffixes)?,
                add_field: library.resolve("mxAddField", suffixes)?,
                set_field: library.resolve("mxSetField", suffixes)?,
                duplicate_array: library.resolve("mxDuplicateArray", suffixes)?,
                destroy_array: library.resolve("mxDestroyArray", suffixes)?,
                library,
            })
        }
    }

    pub fn path(&self) -> &str {
        self.library.path()
    }

    fn complex_accessor(&self, class: MxClassId) -> Result<GetDataFn, MxError> {
        self.get_complex
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, f)| *f)
            .ok_or(MxError::call("mxGetComplexData"))
    }

    fn interleaved_pointer(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        if self.layout != ComplexLayout::Interleaved || !self.is_complex(array)? {
            return Err(MxError::call("mxGetComplexData"));
        }
        let accessor = self.complex_accessor(self.class_id(array)?)?;
        non_null(unsafe { accessor(array.as_ptr()) }, "mxGetComplexData")
    }

    fn imag_pointer(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        let accessor = self.get_imag_data.ok_or(MxError::call("mxGetImagData"))?;
        if !self.is_complex(array)? {
            return Err(MxError::call("mxGetImagData"));
        }
        non_null(unsafe { accessor(array.as_ptr()) }, "mxGetImagData")
    }

    fn take_string(&self, raw: *mut c_char, function: &'static str) -> Result<Vec<u8>, MxError> {
        if raw.is_null() {
            return Err(MxError::call(function));
        }
        let bytes = unsafe { CStr::from_ptr(raw) }.to_bytes().to_vec();
        unsafe { (self.free)(raw.cast()) };
        Ok(bytes)
    }

    /// Character array holding `units`, or `None` when the library lacks
    /// `mxCreateCharArray`/`mxGetChars`.
    fn create_chars(&self, units: &[MxChar]) -> Option<Result<MxHandle, MxError>> {
        let (create, get_chars) = (self.create_char_array?, self.get_chars?);
        let dims: [MwSize; 2] = if units.is_empty() {
            [0, 0]
        } else {
            [1, units.len()]
        };
        let result = handle(
            unsafe { create(dims.len(), dims.as_ptr()) },
            "mxCreateCharArray",
        )
        .and_then(|array| {
            if units.is_empty() {
                return Ok(array);
            }
            let chars = unsafe { get_chars(array.as_ptr()) };
            if chars.is_null() {
                unsafe { (self.destroy_array)(array.as_ptr()) };
                return Err(MxError::call("mxGetChars"));
            }
            unsafe { ptr::copy_nonoverlapping(units.as_ptr(), chars, units.len()) };
            Ok(array)
        });
        Some(result)
    }
}

fn handle(raw: *mut MxArray, function: &'static str) -> Result<MxHandle, MxError> {
    MxHandle::from_raw(raw).ok_or(MxError::call(function))
}

fn non_null(raw: *mut c_void, function: &'static str) -> Result<*mut u8, MxError> {
    if raw.is_null() {
        Err(MxError::call(function))
    } else {
        Ok(raw.cast())
    }
}

fn c_string(text: &str, function: &'static str) -> Result<CString, MxError> {
    CString::new(text).map_err(|_| MxError::InvalidString { function })
}

impl MxQuery for LibMx {
    fn class_id(&self, array: MxHandle) -> Result<MxClassId, MxError> {
        Ok(MxClassId::from_raw(unsafe {
            (self.get_class_id)(array.as_ptr())
        }))
    }

    fn dimensions(&self, array: MxHandle) -> Result<Vec<usize>, MxError> {
        let ndim = unsafe { (self.get_number_of_dimensions)(array.as_ptr()) };
        let dims = unsafe { (self.get_dimensions)(array.as_ptr()) };
        if dims.is_null() {
            return Err(MxError::call("mxGetDimensions"));
        }
        Ok(unsafe { std::slice::from_raw_parts(dims, ndim) }.to_vec())
    }

    fn element_count(&self, array: MxHandle) -> Result<usize, MxError> {
        Ok(unsafe { (self.get_number_of_elements)(array.as_ptr()) })
    }

    fn element_size(&self, array: MxHandle) -> Result<usize, MxError> {
        Ok(unsafe { (self.get_element_size)(array.as_ptr()) })
    }

    fn is_complex(&self, array: MxHandle) -> Result<bool, MxError> {
        Ok(unsafe { (self.is_complex)(array.as_ptr()) })
    }

    fn complex_layout(&self) -> ComplexLayout {
        self.layout
    }

    fn real_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        non_null(unsafe { (self.get_data)(array.as_ptr()) }, "mxGetData").map(|p| p as *const u8)
    }

    fn imag_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        self.imag_pointer(array).map(|p| p as *const u8)
    }

    fn complex_data(&self, array: MxHandle) -> Result<*const u8, MxError> {
        self.interleaved_pointer(array).map(|p| p as *const u8)
    }

    fn decode_text(&self, array: MxHandle) -> Result<Vec<u8>, MxError> {
        match self.to_utf8_string {
            Some(to_utf8) => self.take_string(
                unsafe { to_utf8(array.as_ptr()) },
                "mxArrayToUTF8String",
            ),
            None => self.take_string(
                unsafe { (self.to_string)(array.as_ptr()) },
                "mxArrayToString",
            ),
        }
    }

    fn cell(&self, array: MxHandle, index: usize) -> Result<Option<MxHandle>, MxError> {
        Ok(MxHandle::from_raw(unsafe {
            (self.get_cell)(array.as_ptr(), index)
        }))
    }

    fn field_count(&self, array: MxHandle) -> Result<usize, MxError> {
        let count = unsafe { (self.get_number_of_fields)(array.as_ptr()) };
        usize::try_from(count).map_err(|_| MxError::call("mxGetNumberOfFields"))
    }

    fn field_name(&self, array: MxHandle, field: usize) -> Result<String, MxError> {
        let number = c_int::try_from(field).map_err(|_| MxError::call("mxGetFieldNameByNumber"))?;
        let name = unsafe { (self.get_field_name)(array.as_ptr(), number) };
        if name.is_null() {
            return Err(MxError::call("mxGetFieldNameByNumber"));
        }
        Ok(unsafe { CStr::from_ptr(name) }
            .to_string_lossy()
            .into_owned())
    }

    fn field(
        &self,
        array: MxHandle,
        element: usize,
        field: usize,
    ) -> Result<Option<MxHandle>, MxError> {
        let number = c_int::try_from(field).map_err(|_| MxError::call("mxGetFieldByNumber"))?;
        Ok(MxHandle::from_raw(unsafe {
            (self.get_field_by_number)(array.as_ptr(), element, number)
        }))
    }
}

impl MxAlloc for LibMx {
    fn create_numeric(
        &self,
        dims: &[usize],
        class: MxClassId,
        complexity: MxComplexity,
    ) -> Result<MxHandle, MxError> {
        handle(
            unsafe {
                (self.create_numeric_array)(
                    dims.len(),
                    dims.as_ptr(),
                    class.to_raw(),
                    complexity as c_int,
                )
            },
            "mxCreateNumericArray",
        )
    }

    fn create_logical(&self, dims: &[usize]) -> Result<MxHandle, MxError> {
        handle(
            unsafe { (self.create_logical_array)(dims.len(), dims.as_ptr()) },
            "mxCreateLogicalArray",
        )
    }

    fn create_string(&self, text: &[u8]) -> Result<MxHandle, MxError> {
        if let Some(result) = self.create_chars(&text_units(text)) {
            return result;
        }
        let c_text = CString::new(text).map_err(|_| MxError::InvalidString {
            function: "mxCreateString",
        })?;
        handle(
            unsafe { (self.create_string)(c_text.as_ptr()) },
            "mxCreateString",
        )
    }

    fn create_cell(&self, dims: &[usize]) -> Result<MxHandle, MxError> {
        handle(
            unsafe { (self.create_cell_array)(dims.len(), dims.as_ptr()) },
            "mxCreateCellArray",
        )
    }

    fn set_cell(&self, array: MxHandle, index: usize, value: MxHandle) -> Result<(), MxError> {
        unsafe { (self.set_cell)(array.as_ptr(), index, value.as_ptr()) };
        Ok(())
    }

    fn create_struct(&self, dims: &[usize], fields: &[&str]) -> Result<MxHandle, MxError> {
        let names = fields
            .iter()
            .map(|name| c_string(name, "mxCreateStructArray"))
            .collect::<Result<Vec<_>, _>>()?;
        let pointers: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();
        let count = c_int::try_from(pointers.len()).map_err(|_| MxError::call("mxCreateStructArray"))?;
        let names_ptr = if pointers.is_empty() {
            ptr::null()
        } else {
            pointers.as_ptr()
        };
        handle(
            unsafe { (self.create_struct_array)(dims.len(), dims.as_ptr(), count, names_ptr) },
            "mxCreateStructArray",
        )
    }

    fn add_field(&self, array: MxHandle, name: &str) -> Result<usize, MxError> {
        let c_name = c_string(name, "mxAddField")?;
        let number = unsafe { (self.add_field)(array.as_ptr(), c_name.as_ptr()) };
        usize::try_from(number).map_err(|_| MxError::call("mxAddField"))
    }

    fn set_field(
        &self,
        array: MxHandle,
        element: usize,
        name: &str,
        value: MxHandle,
    ) -> Result<(), MxError> {
        let c_name = c_string(name, "mxSetField")?;
        unsafe { (self.set_field)(array.as_ptr(), element, c_name.as_ptr(), value.as_ptr()) };
        Ok(())
    }

    fn real_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        non_null(unsafe { (self.get_data)(array.as_ptr()) }, "mxGetData")
    }

    fn imag_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        self.imag_pointer(array)
    }

    fn complex_data_mut(&self, array: MxHandle) -> Result<*mut u8, MxError> {
        self.interleaved_pointer(array)
    }

    fn duplicate(&self, array: MxHandle) -> Result<MxHandle, MxError> {
        handle(
            unsafe { (self.duplicate_array)(array.as_ptr()) },
            "mxDuplicateArray",
        )
    }

    fn destroy(&self, array: MxHandle) {
        unsafe { (self.destroy_array)(array.as_ptr()) };
    }
}
