//! MATLAB engine sessions.
//!
//! [`Engine`] loads the matrix and engine libraries of a MATLAB installation,
//! starts a session and moves values in and out of its workspace through
//! `matlink-convert`.
//!
//! ```no_run
//! use matlink_engine::{Engine, MatlabConfig};
//! use matlink_value::Value;
//!
//! let mut engine = Engine::start(MatlabConfig::default().discover()?)?;
//! engine.put("x", &Value::from(vec![1.0, 2.0, 3.0]))?;
//! engine.eval("y = sum(x);")?;
//! assert_eq!(engine.get("y")?, Value::from(6.0));
//! # Ok::<(), matlink_engine::EngineError>(())
//! ```

use std::ptr::NonNull;

use log::{debug, warn};
use matlink_convert::Converter;
use matlink_mx::{LibMx, MxAlloc, MxError, MxHandle};
use matlink_value::Value;

pub mod config;
mod error;
mod libeng;

pub use config::MatlabConfig;
pub use error::EngineError;
pub use libeng::{EngineHandle, LibEng};

pub struct Engine {
    config: MatlabConfig,
    mx: LibMx,
    eng: LibEng,
    session: Option<NonNull<EngineHandle>>,
}

impl Engine {
    /// Load the libraries named by `config` without starting a session.
    pub fn load(config: MatlabConfig) -> Result<Self, EngineError> {
        let mx = LibMx::load(config.mx_library_path()?)?;
        let eng = LibEng::load(config.eng_library_path()?)?;
        debug!("engine libraries: {} and {}", mx.path(), eng.path());
        Ok(Self {
            config,
            mx,
            eng,
            session: None,
        })
    }

    /// Load the libraries and open a session with the configured command.
    pub fn start(config: MatlabConfig) -> Result<Self, EngineError> {
        let mut engine = Self::load(config)?;
        engine.open(None)?;
        Ok(engine)
    }

    pub fn config(&self) -> &MatlabConfig {
        &self.config
    }

    /// Matrix library of the session, for handles returned as
    /// [`Value::Foreign`].
    pub fn mx(&self) -> &LibMx {
        &self.mx
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session, replacing the configured start command when
    /// `command` is given. An open session is closed first.
    pub fn open(&mut self, command: Option<&str>) -> Result<(), EngineError> {
        if self.session.is_some() {
            self.close()?;
        }
        config::require_shell()?;
        let command = command.unwrap_or(self.config.start_command.as_str());
        debug!("starting engine: {command:?}");
        self.session = Some(self.eng.open(command)?);
        Ok(())
    }

    /// Close the session. Closing a closed engine does nothing.
    pub fn close(&mut self) -> Result<(), EngineError> {
        match self.session.take() {
            Some(session) => self.eng.close(session),
            None => Ok(()),
        }
    }

    pub fn eval(&self, expr: &str) -> Result<(), EngineError> {
        self.eng.eval(self.session()?, expr)
    }

    /// Fetch and convert a workspace variable.
    ///
    /// Arrays the converter declines come back as [`Value::Foreign`] handles
    /// owned by the caller; destroy them with [`Engine::mx`].
    pub fn get(&self, name: &str) -> Result<Value, EngineError> {
        let array = self.eng.get(self.session()?, name)?;
        let converted = Converter::new(&self.mx).to_host(array);
        let mut value = match converted {
            Ok(Value::Foreign(handle)) if handle == array => return Ok(Value::Foreign(handle)),
            Ok(value) => value,
            Err(err) => {
                self.mx.destroy(array);
                return Err(err.into());
            }
        };
        // nested declined arrays belong to `array`; copy them out before it goes
        let detached = detach_foreign(&self.mx, &mut value);
        self.mx.destroy(array);
        detached?;
        Ok(value)
    }

    /// Convert `value` and store it in the workspace under `name`.
    pub fn put(&self, name: &str, value: &Value) -> Result<(), EngineError> {
        let session = self.session()?;
        let array = Converter::new(&self.mx).to_foreign(value)?;
        let stored = self.eng.put(session, name, array);
        if !matches!(value, Value::Foreign(_)) {
            self.mx.destroy(array);
        }
        stored
    }

    /// [`put`](Self::put) every pair, stopping at the first failure.
    pub fn update<'v, I, S>(&self, values: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (S, &'v Value)>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .try_for_each(|(name, value)| self.put(name.as_ref(), value))
    }

    fn session(&self) -> Result<NonNull<EngineHandle>, EngineError> {
        self.session.ok_or(EngineError::Closed)
    }
}

/// Replace every [`Value::Foreign`] in `value` with a deep copy. On failure
/// the copies made so far are destroyed.
fn detach_foreign<M: MxAlloc + ?Sized>(mx: &M, value: &mut Value) -> Result<(), MxError> {
    let mut copies = Vec::new();
    let copied = value.try_for_each_foreign(&mut |handle: &mut MxHandle| {
        *handle = mx.duplicate(*handle)?;
        copies.push(*handle);
        Ok::<_, MxError>(())
    });
    if copied.is_err() {
        for copy in copies {
            mx.destroy(copy);
        }
    }
    copied
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to close engine session: {err}");
        }
    }
}
