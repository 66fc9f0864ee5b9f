//! Runtime binding of the MATLAB engine library (`libeng`).

use std::ffi::{c_char, c_int, CString};
use std::path::Path;
use std::ptr::NonNull;

use matlink_abi::{MxArray, MxHandle};
use matlink_mx::{MxError, NativeLibrary, LIBMX_SUFFIXES};

use crate::EngineError;

/// Opaque engine session (`Engine *`).
#[repr(C)]
pub struct EngineHandle {
    _private: [u8; 0],
}

type OpenFn = unsafe extern "C" fn(*const c_char) -> *mut EngineHandle;
type CloseFn = unsafe extern "C" fn(*mut EngineHandle) -> c_int;
type EvalStringFn = unsafe extern "C" fn(*mut EngineHandle, *const c_char) -> c_int;
type GetVariableFn = unsafe extern "C" fn(*mut EngineHandle, *const c_char) -> *mut MxArray;
type PutVariableFn =
    unsafe extern "C" fn(*mut EngineHandle, *const c_char, *const MxArray) -> c_int;

pub struct LibEng {
    library: NativeLibrary,
    open: OpenFn,
    close: CloseFn,
    eval_string: EvalStringFn,
    get_variable: GetVariableFn,
    put_variable: PutVariableFn,
}

unsafe impl Send for LibEng {}
unsafe impl Sync for LibEng {}

impl LibEng {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MxError> {
        let library = NativeLibrary::load(path)?;
        unsafe {
            Ok(Self {
                open: library.resolve("engOpen", LIBMX_SUFFIXES)?,
                close: library.resolve("engClose", LIBMX_SUFFIXES)?,
                eval_string: library.resolve("engEvalString", LIBMX_SUFFIXES)?,
                get_variable: library.resolve("engGetVariable", LIBMX_SUFFIXES)?,
                put_variable: library.resolve("engPutVariable", LIBMX_SUFFIXES)?,
                library,
            })
        }
    }

    pub fn path(&self) -> &str {
        self.library.path()
    }

    /// Start a session. An empty command starts MATLAB the default way.
    pub fn open(&self, command: &str) -> Result<NonNull<EngineHandle>, EngineError> {
        let raw = if command.is_empty() {
            unsafe { (self.open)(std::ptr::null()) }
        } else {
            let command = c_string(command, "engOpen")?;
            unsafe { (self.open)(command.as_ptr()) }
        };
        NonNull::new(raw).ok_or(EngineError::call("engOpen"))
    }

    pub fn close(&self, session: NonNull<EngineHandle>) -> Result<(), EngineError> {
        status(unsafe { (self.close)(session.as_ptr()) }, "engClose")
    }

    pub fn eval(&self, session: NonNull<EngineHandle>, expr: &str) -> Result<(), EngineError> {
        let expr = c_string(expr, "engEvalString")?;
        status(
            unsafe { (self.eval_string)(session.as_ptr(), expr.as_ptr()) },
            "engEvalString",
        )
    }

    /// Copy of a workspace variable; the caller owns the returned array.
    pub fn get(&self, session: NonNull<EngineHandle>, name: &str) -> Result<MxHandle, EngineError> {
        let name = c_string(name, "engGetVariable")?;
        let raw = unsafe { (self.get_variable)(session.as_ptr(), name.as_ptr()) };
        MxHandle::from_raw(raw).ok_or(EngineError::call("engGetVariable"))
    }

    /// Copy `array` into the workspace; `array` stays owned by the caller.
    pub fn put(
        &self,
        session: NonNull<EngineHandle>,
        name: &str,
        array: MxHandle,
    ) -> Result<(), EngineError> {
        let name = c_string(name, "engPutVariable")?;
        status(
            unsafe { (self.put_variable)(session.as_ptr(), name.as_ptr(), array.as_ptr()) },
            "engPutVariable",
        )
    }
}

fn c_string(text: &str, function: &'static str) -> Result<CString, EngineError> {
    CString::new(text).map_err(|_| EngineError::Library(MxError::InvalidString { function }))
}

fn status(code: c_int, function: &'static str) -> Result<(), EngineError> {
    if code == 0 {
        Ok(())
    } else {
        Err(EngineError::call(function))
    }
}
