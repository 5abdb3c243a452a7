use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("{builtin}: missing argument `{argument}`")]
    MissingArgument {
        builtin: &'static str,
        argument: String,
    },
    #[error("{builtin}: {message}")]
    InvalidArgument {
        builtin: &'static str,
        message: String,
    },
    #[error("{builtin}: no {fact} recorded for this host")]
    NoData {
        builtin: &'static str,
        fact: &'static str,
    },
    #[error("{builtin}: script is not authenticated")]
    Unauthorized { builtin: &'static str },
    #[error("Unknown built-in function `{name}`")]
    UnknownBuiltin { name: String },
}

impl RuntimeError {
    /// Errors the interpreter turns into a "no value" reply instead of aborting.
    pub fn is_decline(&self) -> bool {
        matches!(
            self,
            RuntimeError::MissingArgument { .. }
                | RuntimeError::InvalidArgument { .. }
                | RuntimeError::NoData { .. }
                | RuntimeError::Unauthorized { .. }
        )
    }

    pub fn missing(builtin: &'static str, argument: impl Into<String>) -> Self {
        RuntimeError::MissingArgument {
            builtin,
            argument: argument.into(),
        }
    }

    pub fn invalid(builtin: &'static str, message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            builtin,
            message: message.into(),
        }
    }

    pub fn no_data(builtin: &'static str, fact: &'static str) -> Self {
        RuntimeError::NoData { builtin, fact }
    }
}
