//! Turns recoverable upstream failures into data.

use log::info;
use serde_json::{Map, Value};

use crate::error::{ErrorDescriptor, OwmError};

/// Status reported for a target date missing from a forecast window.
pub const NOT_FOUND_STATUS: u16 = 400;

/// Safe empty stand-in returned in place of a payload when a call fails.
pub trait Placeholder {
    fn placeholder() -> Self;
}

impl Placeholder for Value {
    fn placeholder() -> Self {
        Value::Object(Map::new())
    }
}

impl Placeholder for Vec<Value> {
    fn placeholder() -> Self {
        vec![Value::Object(Map::new())]
    }
}

/// A payload paired with the error that produced it, if any.
///
/// On failure `payload` is the type's [`Placeholder`], so callers can
/// iterate or index it without branching.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome<T> {
    pub payload: T,
    pub error: ErrorDescriptor,
}

impl<T> CallOutcome<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            payload,
            error: ErrorDescriptor::none(),
        }
    }
}

impl<T: Placeholder> CallOutcome<T> {
    pub fn failed(error: ErrorDescriptor) -> Self {
        Self {
            payload: T::placeholder(),
            error,
        }
    }
}

/// Run `call`, keeping provider and not-found failures as an
/// [`ErrorDescriptor`]. Authentication failures and every other error
/// propagate unchanged.
pub fn bridge<T, F>(call: F) -> Result<CallOutcome<T>, OwmError>
where
    T: Placeholder,
    F: FnOnce() -> Result<T, OwmError>,
{
    match call() {
        Ok(payload) => Ok(CallOutcome::ok(payload)),
        Err(OwmError::Provider { status: 401, text }) => Err(OwmError::Authentication { text }),
        Err(OwmError::Provider { status, text }) => {
            info!("Error in request (status code: {status})");
            info!("Response: {text}");
            Ok(CallOutcome::failed(ErrorDescriptor::new(status, text)))
        }
        Err(err @ OwmError::NotFoundInWindow { .. }) => {
            let text = serde_json::json!({"cod": "404", "message": err.to_string()}).to_string();
            Ok(CallOutcome::failed(ErrorDescriptor::new(NOT_FOUND_STATUS, text)))
        }
        Err(err) => Err(err),
    }
}
