use crate::clients::ClientId;

/// Why an inbound payload was refused.
#[derive(Debug, thiserror::Error)]
pub enum MalformedPayload {
    #[error("not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing `name` field")]
    MissingName,

    #[error("`name` must be a string")]
    NameNotString,

    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },
}

/// Errors that can occur while relaying
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] MalformedPayload),

    #[error("{0} is no longer connected")]
    StaleClient(ClientId),

    #[error("failed to encode outbound payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    /// True when the error means the inbound payload was dropped.
    pub fn is_malformed(&self) -> bool {
        matches!(self, RelayError::MalformedPayload(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_includes_reason() {
        let err: RelayError = MalformedPayload::MissingName.into();
        assert_eq!(err.to_string(), "malformed payload: missing `name` field");
        assert!(err.is_malformed());
    }

    #[test]
    fn too_large_display() {
        let err = MalformedPayload::TooLarge {
            len: 300,
            limit: 256,
        };
        assert_eq!(
            err.to_string(),
            "frame of 300 bytes exceeds the 256 byte limit"
        );
    }

    #[test]
    fn stale_client_display() {
        let err = RelayError::StaleClient(ClientId(7));
        assert_eq!(err.to_string(), "client-7 is no longer connected");
        assert!(!err.is_malformed());
    }
}
