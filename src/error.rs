use crate::consts::ResourceId;
use thiserror::Error;

/// Failures reported by a controller client. All of them are treated as
/// transient: the supervisor turns them into a reconnect request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("communication error: {0}")]
    Communication(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection is not open")]
    NotConnected,
    #[error("controller rejected request: {0}")]
    Protocol(String),
}

/// Value conversion or channel parameter problems. Only affect the single
/// channel they were raised for.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("value {value} is outside of resource range {min}..={max}")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("state {0} can't be written to this resource")]
    UnsupportedState(String),
    #[error("unknown enum value '{name}' for definition {definition}")]
    UnknownEnumValue { definition: u32, name: String },
    #[error("channel '{channel}' has invalid parameter: {reason}")]
    InvalidParameter { channel: String, reason: String },
    #[error("resource {0} value kind doesn't match the converter")]
    ValueMismatch(ResourceId),
}

/// Failure of a single command write. Logged by the handler, never fatal.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_details() {
        let err = ConversionError::OutOfRange {
            value: 120.0,
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(
            err.to_string(),
            "value 120 is outside of resource range 0..=100"
        );

        let err = ClientError::Communication("socket closed".into());
        assert!(err.to_string().contains("socket closed"));
    }
}
