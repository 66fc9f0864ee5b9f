//! Native library loading and versioned symbol lookup.

use libloading::Library;
use std::ffi::CString;
use std::path::Path;

use crate::MxError;

/// A loaded native library.
pub struct NativeLibrary {
    library: Library,
    path: String,
}

impl NativeLibrary {
    /// Load a native library from a path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MxError> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }.map_err(|e| MxError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        log::debug!("loaded native library {}", path.display());
        Ok(Self {
            library,
            path: path.display().to_string(),
        })
    }

    /// Platform file name for a library base name (`mx` -> `libmx.so`).
    pub fn platform_lib_name(name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            format!("lib{}.dll", name)
        }
        #[cfg(target_os = "macos")]
        {
            format!("lib{}.dylib", name)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            format!("lib{}.so", name)
        }
    }

    /// True if any of `name` + suffix is exported.
    pub fn has_symbol(&self, name: &str, suffixes: &[&str]) -> bool {
        suffixes.iter().any(|suffix| {
            let Ok(c_name) = CString::new(format!("{name}{suffix}")) else {
                return false;
            };
            unsafe {
                self.library
                    .get::<unsafe extern "C" fn()>(c_name.as_bytes_with_nul())
                    .is_ok()
            }
        })
    }

    /// Resolve a function, trying each versioned export name in order.
    ///
    /// The matrix library exports most entry points under a suffixed name
    /// (`mxGetDimensions_730`, `mxGetComplexDoubles_800`); the bare name is
    /// the last resort.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching the C signature of the
    /// export, and the returned pointer must not outlive `self`.
    pub unsafe fn resolve<F: Copy>(&self, name: &str, suffixes: &[&str]) -> Result<F, MxError> {
        for suffix in suffixes {
            let full = format!("{name}{suffix}");
            let c_name = CString::new(full.as_str()).map_err(|_| MxError::MissingSymbol {
                name: full.clone(),
                library: self.path.clone(),
            })?;
            if let Ok(symbol) = self.library.get::<F>(c_name.as_bytes_with_nul()) {
                log::trace!("resolved {full} in {}", self.path);
                return Ok(*symbol);
            }
        }
        Err(MxError::MissingSymbol {
            name: name.to_string(),
            library: self.path.clone(),
        })
    }

    /// Like [`resolve`](Self::resolve) but absent exports are `None`.
    ///
    /// # Safety
    ///
    /// Same contract as [`resolve`](Self::resolve).
    pub unsafe fn resolve_optional<F: Copy>(&self, name: &str, suffixes: &[&str]) -> Option<F> {
        self.resolve(name, suffixes).ok()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
