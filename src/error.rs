//! The EngineError is an Error type used to 'wrap' every failure mode
//! the engine can surface to a caller (see spec §7: the `Policy
//! evaluation` role never reaches this far — it is caught inside the
//! Guard).
use failure::Fail;

/// Crate-wide error type. Variant names track the roles from the error
/// taxonomy: bad constructor input, duplicate/missing storage keys,
/// JSON decoding, and adapter I/O failures.
#[derive(Debug, Fail)]
pub enum EngineError {
    #[fail(display = "{}", message)]
    InvalidArgument { message: String },

    #[fail(display = "policy '{}' already exists", uid)]
    Exists { uid: String },

    #[fail(display = "no such policy '{}'", uid)]
    NotFound { uid: String },

    #[fail(display = "{}", message)]
    TypeError { message: String },

    #[fail(display = "{}", message)]
    StorageError {
        message: String,
        #[cause]
        cause: failure::Error,
    },

    #[fail(display = "{}", message)]
    JsonError {
        message: String,
        #[cause]
        cause: serde_json::Error,
    },

    #[fail(display = "{}", message)]
    RegexError {
        message: String,
        #[cause]
        cause: regex::Error,
    },

    #[fail(display = "{}", message)]
    AddrParseError {
        message: String,
        #[cause]
        cause: std::net::AddrParseError,
    },

    #[fail(display = "{}", message)]
    CidrParseError {
        message: String,
        #[cause]
        cause: ipnetwork::IpNetworkError,
    },

    /// A runtime failure while evaluating a rule against a candidate
    /// policy. The Guard catches this variant and treats the policy as
    /// "did not fit"; it is never returned from `Guard::is_allowed`.
    #[fail(display = "policy '{}' failed to evaluate: {}", uid, message)]
    PolicyEvaluationError { uid: String, message: String },
}

impl EngineError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> EngineError {
        EngineError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn exists<S: Into<String>>(uid: S) -> EngineError {
        EngineError::Exists { uid: uid.into() }
    }

    pub fn not_found<S: Into<String>>(uid: S) -> EngineError {
        EngineError::NotFound { uid: uid.into() }
    }

    pub fn type_error<S: Into<String>>(message: S) -> EngineError {
        EngineError::TypeError {
            message: message.into(),
        }
    }

    pub fn policy_evaluation<S1, S2>(uid: S1, message: S2) -> EngineError
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        EngineError::PolicyEvaluationError {
            uid: uid.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(cause: serde_json::Error) -> Self {
        EngineError::JsonError {
            message: format!("{}", cause),
            cause,
        }
    }
}

impl From<regex::Error> for EngineError {
    fn from(cause: regex::Error) -> Self {
        EngineError::RegexError {
            message: format!("{}", cause),
            cause,
        }
    }
}

impl From<std::net::AddrParseError> for EngineError {
    fn from(cause: std::net::AddrParseError) -> Self {
        EngineError::AddrParseError {
            message: format!("{}", cause),
            cause,
        }
    }
}

impl From<ipnetwork::IpNetworkError> for EngineError {
    fn from(cause: ipnetwork::IpNetworkError) -> Self {
        EngineError::CidrParseError {
            message: format!("{}", cause),
            cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
