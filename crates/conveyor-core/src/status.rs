//! Response status table.
//!
//! A [`Status`] is a response disposition, not a raw HTTP code: each member
//! of the closed set is immutably bound to an HTTP status code and a flag
//! saying whether the stored payload should be serialized into the response
//! body. Handlers record a `Status` in the exchange's scratch space and the
//! response stage resolves it through this table.
//!
//! # Example
//!
//! ```
//! use conveyor_core::Status;
//!
//! let options = Status::Created.resolve().unwrap();
//! assert_eq!(options.code.as_u16(), 201);
//! assert!(options.should_serialize);
//! ```

use http::StatusCode;
use thiserror::Error;

/// Enumerated response disposition.
///
/// The closed set covers the statuses the pipeline knows how to shape a
/// response for. [`Status::Custom`] is a typed override for codes outside
/// the closed set; unlike the closed members it must be registered with an
/// explicit serialize flag, and its code is checked when resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 200, payload is serialized.
    Ok,
    /// 201, payload is serialized.
    Created,
    /// 204, response ends with no body.
    NoContent,
    /// 400, response ends with no body.
    BadRequest,
    /// 401, response ends with no body.
    Unauthorized,
    /// 403, response ends with no body.
    Forbidden,
    /// 404, response ends with no body.
    NotFound,
    /// Ad-hoc status override for codes outside the closed set.
    Custom {
        /// The raw HTTP status code, validated at resolve time.
        code: u16,
        /// Whether the stored payload is serialized into the body.
        serialize: bool,
    },
}

/// The resolved shape of a [`Status`]: its HTTP code and serialize flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOptions {
    /// The HTTP status code to set on the response.
    pub code: StatusCode,
    /// Whether the response stage should serialize the stored payload.
    pub should_serialize: bool,
}

/// A status value that cannot be resolved against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A [`Status::Custom`] carried a code outside the valid HTTP range.
    #[error("status override carries invalid HTTP code {0}")]
    InvalidCode(u16),
}

impl Status {
    /// Resolves this status against the fixed table.
    ///
    /// Only [`Status::Custom`] can fail, when its code is not a valid HTTP
    /// status code.
    pub fn resolve(self) -> Result<StatusOptions, ConfigurationError> {
        let (code, should_serialize) = match self {
            Self::Ok => (StatusCode::OK, true),
            Self::Created => (StatusCode::CREATED, true),
            Self::NoContent => (StatusCode::NO_CONTENT, false),
            Self::BadRequest => (StatusCode::BAD_REQUEST, false),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, false),
            Self::Forbidden => (StatusCode::FORBIDDEN, false),
            Self::NotFound => (StatusCode::NOT_FOUND, false),
            Self::Custom { code, serialize } => {
                let code = StatusCode::from_u16(code)
                    .map_err(|_| ConfigurationError::InvalidCode(code))?;
                (code, serialize)
            }
        };

        Ok(StatusOptions {
            code,
            should_serialize,
        })
    }

    /// Returns the closed set in declaration order.
    #[must_use]
    pub const fn closed_set() -> [Status; 7] {
        [
            Self::Ok,
            Self::Created,
            Self::NoContent,
            Self::BadRequest,
            Self::Unauthorized,
            Self::Forbidden,
            Self::NotFound,
        ]
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Created => write!(f, "created"),
            Self::NoContent => write!(f, "no-content"),
            Self::BadRequest => write!(f, "bad-request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not-found"),
            Self::Custom { code, .. } => write!(f, "custom({code})"),
        }
    }
}
