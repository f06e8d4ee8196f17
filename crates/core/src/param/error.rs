//! Error types for parameter validation and parsing.

use thiserror::Error;

/// Errors raised while validating or parsing process parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("Mandatory parameter '{0}' has no value")]
    MissingMandatory(String),

    #[error("Invalid value '{value}' for parameter '{name}'")]
    InvalidValue { name: String, value: String },

    #[error("Parameter '{0}' is not declared by this process")]
    Undeclared(String),

    #[error("Only one redirection is allowed, found '{first}' and '{second}'")]
    MultipleRedirections { first: String, second: String },

    #[error("Cannot parse option string near '{0}'")]
    Unparseable(String),
}

pub type ParamResult<T> = Result<T, ParamError>;
