// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for portal operations.
//!
//! Every failure that crosses the library boundary collapses into one of
//! three categories so callers can decide between "ask the user to fix
//! their credentials", "try again later", and "file a parser bug".

/// Errors surfaced by portal operations.
#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    /// The portal rejected the credentials, or the session never left the
    /// login page within the redirect window. Never retried.
    #[error("Authentication failed: the portal rejected the credentials")]
    Authentication,

    /// Browser or network infrastructure failed before a verdict on the
    /// data could be reached. Safe to retry later.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A captured payload was present but matched none of the known
    /// response shapes. Indicates portal-side drift, not a transient fault.
    #[error("Parse error in {dataset} payload: {detail}")]
    Parse {
        dataset: &'static str,
        detail: String,
    },
}

impl PortalError {
    /// Wrap any displayable failure as a connection-class error.
    pub fn connection(err: impl std::fmt::Display) -> Self {
        PortalError::Connection(err.to_string())
    }

    /// Collapse a parser complaint into the parse category.
    pub fn parse(dataset: &'static str, detail: impl Into<String>) -> Self {
        PortalError::Parse {
            dataset,
            detail: detail.into(),
        }
    }
}

/// Convenience result type.
pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_wraps_display() {
        let err = PortalError::connection(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(err, PortalError::Connection(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_parse_names_dataset() {
        let err = PortalError::parse("transcript", "no list under any known key");
        assert!(err.to_string().contains("transcript"));
    }

    #[test]
    fn test_authentication_message_is_stable() {
        let msg = PortalError::Authentication.to_string();
        assert!(msg.contains("credentials"));
    }
}
