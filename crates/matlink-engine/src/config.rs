//! Locating a MATLAB installation.
//!
//! Sources, highest priority first:
//! 1. Fields set explicitly on [`MatlabConfig`] (or read from a JSON file)
//! 2. Environment variables (`MATLAB_ROOT`, `MATLINK_ENGINE_COMMAND`)
//! 3. The `matlab` executable found on `PATH`

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use matlink_mx::NativeLibrary;

use crate::EngineError;

/// Architecture directories under `<root>/bin`, in lookup order.
pub const ARCHES: &[&str] = &["glnxa64", "maci64", "maca64", "win64"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatlabConfig {
    /// Installation root (the directory holding `bin/`).
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Architecture directory name; probed from [`ARCHES`] when unset.
    #[serde(default)]
    pub arch: Option<String>,
    /// Explicit path to the matrix library, overriding the root.
    #[serde(default)]
    pub mx_library: Option<PathBuf>,
    /// Explicit path to the engine library, overriding the root.
    #[serde(default)]
    pub eng_library: Option<PathBuf>,
    /// Command passed to `engOpen`; empty starts the default MATLAB.
    #[serde(default)]
    pub start_command: String,
}

impl MatlabConfig {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_environment_variables();
        config
    }

    /// Read a JSON configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Discovery(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            EngineError::Discovery(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Fill unset fields from the environment, then from `PATH`.
    pub fn discover(mut self) -> Result<Self, EngineError> {
        self.apply_environment_variables();
        if self.root.is_none() && (self.mx_library.is_none() || self.eng_library.is_none()) {
            let path_var = env::var_os("PATH").unwrap_or_default();
            let executable = find_executable("matlab", &path_var).ok_or_else(|| {
                EngineError::Discovery("no matlab executable on PATH".to_string())
            })?;
            self.root = Some(root_from_executable(&executable)?);
        }
        if let Some(root) = &self.root {
            info!("using MATLAB installation at {}", root.display());
        }
        Ok(self)
    }

    fn apply_environment_variables(&mut self) {
        if self.root.is_none() {
            if let Some(root) = env::var_os("MATLAB_ROOT").filter(|v| !v.is_empty()) {
                self.root = Some(PathBuf::from(root));
            }
        }
        if self.start_command.is_empty() {
            if let Ok(command) = env::var("MATLINK_ENGINE_COMMAND") {
                self.start_command = command;
            }
        }
    }

    pub fn mx_library_path(&self) -> Result<PathBuf, EngineError> {
        self.library_path(self.mx_library.as_deref(), "mx")
    }

    pub fn eng_library_path(&self) -> Result<PathBuf, EngineError> {
        self.library_path(self.eng_library.as_deref(), "eng")
    }

    /// `<root>/bin/<arch>/lib<name>.<ext>`, using the first architecture
    /// directory that holds the library.
    fn library_path(&self, explicit: Option<&Path>, name: &str) -> Result<PathBuf, EngineError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| EngineError::Discovery("MATLAB root is not set".to_string()))?;
        let file = NativeLibrary::platform_lib_name(name);
        let arches: Vec<&str> = match &self.arch {
            Some(arch) => vec![arch.as_str()],
            None => ARCHES.to_vec(),
        };
        for arch in arches {
            let candidate = root.join("bin").join(arch).join(&file);
            debug!("probing {}", candidate.display());
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(EngineError::Discovery(format!(
            "{file} not found under {}",
            root.join("bin").display()
        )))
    }
}

/// First `name` in the directories of a `PATH`-style list.
pub fn find_executable(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    env::split_paths(path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|c| dir.join(c))
            .find(|p| p.is_file())
    })
}

/// Installation root for a `matlab` executable: `<root>/bin/matlab`.
///
/// Symlinks are resolved first, so a launcher linked into `/usr/local/bin`
/// still points at the real installation.
pub fn root_from_executable(executable: &Path) -> Result<PathBuf, EngineError> {
    let resolved = fs::canonicalize(executable).map_err(|e| {
        EngineError::Discovery(format!("cannot resolve {}: {e}", executable.display()))
    })?;
    resolved
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            EngineError::Discovery(format!("{} has no installation root", resolved.display()))
        })
}

/// The engine launcher on unix runs MATLAB through `csh`.
pub fn require_shell() -> Result<(), EngineError> {
    check_shell(Path::new("/bin/csh"))
}

fn check_shell(shell: &Path) -> Result<(), EngineError> {
    if cfg!(unix) && !shell.exists() {
        return Err(EngineError::Discovery(format!(
            "{} is required to start the engine",
            shell.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn finds_executable_in_later_path_entry() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let exe = if cfg!(windows) { "matlab.exe" } else { "matlab" };
        touch(&second.path().join(exe));

        let path_var = env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_executable("matlab", &path_var).unwrap();
        assert_eq!(found, second.path().join(exe));
        assert!(find_executable("matlab", &OsString::new()).is_none());
    }

    #[test]
    fn root_is_grandparent_of_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("R2024a").join("bin").join("matlab");
        touch(&exe);
        let root = root_from_executable(&exe).unwrap();
        assert_eq!(root, fs::canonicalize(dir.path().join("R2024a")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn root_follows_symlinks() {
        let install = tempfile::tempdir().unwrap();
        let links = tempfile::tempdir().unwrap();
        let exe = install.path().join("bin").join("matlab");
        touch(&exe);
        let link = links.path().join("matlab");
        std::os::unix::fs::symlink(&exe, &link).unwrap();
        assert_eq!(
            root_from_executable(&link).unwrap(),
            fs::canonicalize(install.path()).unwrap()
        );
    }

    #[test]
    fn library_path_probes_arch_directories() {
        let root = tempfile::tempdir().unwrap();
        let file = NativeLibrary::platform_lib_name("mx");
        touch(&root.path().join("bin").join("maca64").join(&file));

        let config = MatlabConfig::from_root(root.path());
        assert_eq!(
            config.mx_library_path().unwrap(),
            root.path().join("bin").join("maca64").join(&file)
        );
        assert!(matches!(
            config.eng_library_path(),
            Err(EngineError::Discovery(_))
        ));

        let pinned = MatlabConfig {
            arch: Some("glnxa64".to_string()),
            ..config.clone()
        };
        assert!(pinned.mx_library_path().is_err());
    }

    #[test]
    fn explicit_library_wins_over_root() {
        let config = MatlabConfig {
            mx_library: Some(PathBuf::from("/opt/custom/libmx.so")),
            ..MatlabConfig::default()
        };
        assert_eq!(
            config.mx_library_path().unwrap(),
            PathBuf::from("/opt/custom/libmx.so")
        );
        assert!(config.eng_library_path().is_err());
    }

    #[test]
    fn loads_json_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matlink.json");
        fs::write(&path, r#"{ "root": "/opt/matlab", "start_command": "matlab -nojvm" }"#)
            .unwrap();
        let config = MatlabConfig::load_from_file(&path).unwrap();
        assert_eq!(config.root, Some(PathBuf::from("/opt/matlab")));
        assert_eq!(config.start_command, "matlab -nojvm");
        assert!(config.arch.is_none());

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            MatlabConfig::load_from_file(&path),
            Err(EngineError::Discovery(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn missing_shell_is_a_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_shell(&dir.path().join("csh")).is_err());
        touch(&dir.path().join("csh"));
        assert!(check_shell(&dir.path().join("csh")).is_ok());
    }
}
