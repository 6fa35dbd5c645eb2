//! shellvec-core
//!
//! Foundation types shared by every shellvec crate.
//! FOR AUTHORIZED PENETRATION TESTING, CTF, AND EDUCATIONAL USE ONLY.
//!
//! # Components
//! - `value` - Result shapes returned by module probes
//! - `table` - Headerless left-aligned table renderer
//! - `session` - Capabilities, verbosity and the warning log
//! - `channel` - Delivery primitive towards the remote interpreter

pub mod value;
pub mod table;
pub mod session;
pub mod channel;

pub use value::{ResultValue, Scalar};
pub use table::Table;
pub use session::{Capability, CapabilitySet, Session, Severity, Warning, WarningLog};
pub use channel::{Channel, Delivery, DeliveryLog, DryRunChannel, Payload, ReplayChannel};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Module construction failed. Never absorbed by the pipeline.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Usage mistake detected while resolving arguments.
    #[error("{0}")]
    Argument(String),

    #[error("{message}")]
    Probe {
        module: Option<String>,
        message: String,
    },

    #[error("{message}")]
    Module {
        module: Option<String>,
        message: String,
    },

    #[error("Vector '{vector}' has {slots} substitution slots but {supplied} arguments were supplied")]
    TemplateMismatch {
        vector: String,
        slots: usize,
        supplied: usize,
    },

    #[error("Vector not found: {0}")]
    VectorNotFound(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn probe(message: impl Into<String>) -> Self {
        Error::Probe {
            module: None,
            message: message.into(),
        }
    }

    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Module {
            module: Some(module.into()),
            message: message.into(),
        }
    }

    /// Errors that must cross the module boundary instead of becoming a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Initialization(_) | Error::Argument(_))
    }

    /// Module the failure is attributed to, when the error names one.
    pub fn attributed_module(&self) -> Option<&str> {
        match self {
            Error::Probe { module, .. } | Error::Module { module, .. } => module.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a pipeline stage stopped before returning normally.
#[derive(Debug)]
pub enum Halt {
    /// A definitive result is known; skip the remaining stages and format it.
    Found(ResultValue),
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(err: Error) -> Self {
        Halt::Failed(err)
    }
}

impl From<std::io::Error> for Halt {
    fn from(err: std::io::Error) -> Self {
        Halt::Failed(Error::Io(err))
    }
}

/// Return type of every module pipeline hook.
pub type Flow<T = ()> = std::result::Result<T, Halt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Initialization("bad schema".into()).is_fatal());
        assert!(Error::Argument("missing user".into()).is_fatal());
        assert!(!Error::probe("host unreachable").is_fatal());
        assert!(!Error::module("audit.sql", "boom").is_fatal());
        assert!(!Error::VectorNotFound("php".into()).is_fatal());
    }

    #[test]
    fn test_attributed_module() {
        assert_eq!(Error::module("file.read", "x").attributed_module(), Some("file.read"));
        assert_eq!(Error::probe("x").attributed_module(), None);
    }

    #[test]
    fn test_error_into_halt() {
        fn reach() -> Result<()> {
            Err(Error::probe("unreachable"))
        }
        fn stage() -> Flow {
            reach()?;
            Ok(())
        }
        assert!(matches!(stage(), Err(Halt::Failed(Error::Probe { .. }))));
    }

    #[test]
    fn test_template_mismatch_message() {
        let err = Error::TemplateMismatch {
            vector: "php_connect".into(),
            slots: 3,
            supplied: 2,
        };
        assert!(err.to_string().contains("3 substitution slots"));
    }
}
