//! Static bearer-key check applied to inbound requests under `/mcp`.

use std::fmt;

/// Path prefix guarded by the gate.
pub const MCP_PATH_PREFIX: &str = "/mcp";

const BEARER_PREFIX: &str = "Bearer ";

/// Reasons an inbound request is rejected.
///
/// The display strings are returned verbatim to the client as the 401 detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestAuthError {
    #[error("Missing Authorization header. Use 'Authorization: Bearer <api_key>'")]
    MissingHeader,

    #[error("Invalid Authorization header format. Use 'Authorization: Bearer <api_key>'")]
    InvalidFormat,

    #[error("Invalid API key")]
    InvalidKey,
}

/// Static-key bearer authentication for the MCP endpoint.
///
/// Authentication is only enforced when a key is configured and
/// `auth_required` was requested; a gate built without a key always allows.
#[derive(Clone)]
pub struct AuthGate {
    api_key: Option<String>,
    required: bool,
    test_mode: bool,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("required", &self.required)
            .field("test_mode", &self.test_mode)
            .finish()
    }
}

impl AuthGate {
    pub fn new(api_key: Option<String>, auth_required: bool, test_mode: bool) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        let required = auth_required && api_key.is_some();
        Self {
            api_key,
            required,
            test_mode,
        }
    }

    /// Whether requests under [`MCP_PATH_PREFIX`] must carry the key.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Decide whether a request for `path` with the given `Authorization`
    /// header value may proceed.
    pub fn check(&self, path: &str, authorization: Option<&str>) -> Result<(), RequestAuthError> {
        if self.test_mode || !self.required || !path.starts_with(MCP_PATH_PREFIX) {
            return Ok(());
        }

        let header = match authorization {
            Some(h) if !h.is_empty() => h,
            _ => return Err(RequestAuthError::MissingHeader),
        };

        let Some(provided) = header.strip_prefix(BEARER_PREFIX) else {
            return Err(RequestAuthError::InvalidFormat);
        };

        match &self.api_key {
            Some(key) if key == provided => Ok(()),
            _ => Err(RequestAuthError::InvalidKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn gate() -> AuthGate {
        AuthGate::new(Some("secret".to_string()), true, false)
    }

    #[test]
    fn test_valid_key_allowed() {
        assert_ok!(gate().check("/mcp/", Some("Bearer secret")));
    }

    #[test]
    fn test_rejections() {
        let gate = gate();
        assert_eq!(
            gate.check("/mcp/", None),
            Err(RequestAuthError::MissingHeader)
        );
        assert_eq!(
            gate.check("/mcp/", Some("")),
            Err(RequestAuthError::MissingHeader)
        );
        assert_eq!(
            gate.check("/mcp/", Some("Token secret")),
            Err(RequestAuthError::InvalidFormat)
        );
        assert_eq!(
            gate.check("/mcp", Some("Bearer wrong")),
            Err(RequestAuthError::InvalidKey)
        );
    }

    #[test]
    fn test_paths_outside_prefix_allowed() {
        assert_ok!(gate().check("/health", None));
        assert_ok!(gate().check("/", None));
    }

    #[test]
    fn test_no_key_means_not_required() {
        let gate = AuthGate::new(None, true, false);
        assert!(!gate.is_required());
        assert!(gate.check("/mcp/", None).is_ok());

        let gate = AuthGate::new(Some(String::new()), true, false);
        assert!(!gate.is_required());
    }

    #[test]
    fn test_explicitly_disabled() {
        let gate = AuthGate::new(Some("secret".to_string()), false, false);
        assert!(gate.check("/mcp/", None).is_ok());
    }

    #[test]
    fn test_test_mode_bypass() {
        let gate = AuthGate::new(Some("secret".to_string()), true, true);
        assert!(gate.is_required());
        assert_ok!(gate.check("/mcp/", Some("Bearer wrong")));
        assert_err!(AuthGate::new(Some("secret".to_string()), true, false).check("/mcp/", None));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", gate());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }
}
