use thiserror::Error;

/// Validation failure raised while composing a request.
///
/// Every variant names the public operation that was being composed and the
/// descriptor parameter at fault, so messages read like
/// ``retrieve requires the `request.collection` parameter.``
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ComposeError {
    /// A required descriptor field was not supplied
    #[error("{operation} requires the `{parameter}` parameter.")]
    MissingParameter { operation: String, parameter: String },

    /// A descriptor field was supplied with a malformed value
    #[error("{operation} requires the `{parameter}` parameter to be of type {expected}.")]
    InvalidParameter {
        operation: String,
        parameter: String,
        expected: String,
    },

    /// Two descriptor fields that cannot be combined were both supplied
    #[error(
        "Either one of `{first}` or `{second}` parameters should be used in a call to {operation}, not both."
    )]
    ConflictingParameters {
        operation: String,
        first: String,
        second: String,
    },
}

impl ComposeError {
    /// Name of the operation the error was raised for
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::MissingParameter { operation, .. }
            | Self::InvalidParameter { operation, .. }
            | Self::ConflictingParameters { operation, .. } => operation,
        }
    }

    /// Name of the offending parameter (the first one for conflicts)
    #[must_use]
    pub fn parameter(&self) -> &str {
        match self {
            Self::MissingParameter { parameter, .. } | Self::InvalidParameter { parameter, .. } => {
                parameter
            }
            Self::ConflictingParameters { first, .. } => first,
        }
    }
}
