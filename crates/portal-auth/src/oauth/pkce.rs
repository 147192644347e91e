//! PKCE code verifier validation (RFC 7636).
//!
//! The browser generates the verifier and challenge; the BFF only forwards the
//! verifier to the token endpoint. Malformed verifiers are rejected here so a
//! bad request never reaches the identity provider.

use crate::error::AuthError;

/// Minimum verifier length (RFC 7636 section 4.1).
pub const MIN_VERIFIER_LEN: usize = 43;

/// Maximum verifier length (RFC 7636 section 4.1).
pub const MAX_VERIFIER_LEN: usize = 128;

/// Errors produced by verifier validation.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside the unreserved set.
    #[error("Invalid verifier characters: must be [A-Za-z0-9-._~]")]
    InvalidVerifierCharacters,
}

impl PkceError {
    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        "invalid_request"
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        AuthError::invalid_request(err.to_string())
    }
}

/// Validates a PKCE code verifier.
///
/// # Errors
///
/// Returns `PkceError` if the verifier is too short, too long or contains a
/// character outside `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`.
pub fn validate_code_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&len) {
        return Err(PkceError::InvalidVerifierLength(len));
    }

    if !verifier.bytes().all(is_unreserved) {
        return Err(PkceError::InvalidVerifierCharacters);
    }

    Ok(())
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_verifier() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert!(validate_code_verifier(verifier).is_ok());
        assert!(validate_code_verifier(&"a~.-_".repeat(25)).is_ok());
    }

    #[test]
    fn test_length_bounds() {
        assert!(validate_code_verifier(&"a".repeat(43)).is_ok());
        assert!(validate_code_verifier(&"a".repeat(128)).is_ok());
        assert!(matches!(
            validate_code_verifier(&"a".repeat(42)),
            Err(PkceError::InvalidVerifierLength(42))
        ));
        assert!(matches!(
            validate_code_verifier(&"a".repeat(129)),
            Err(PkceError::InvalidVerifierLength(129))
        ));
    }

    #[test]
    fn test_invalid_characters() {
        let verifier = format!("{}+/=", "a".repeat(43));
        assert!(matches!(
            validate_code_verifier(&verifier),
            Err(PkceError::InvalidVerifierCharacters)
        ));
    }

    #[test]
    fn test_maps_to_invalid_request() {
        let err: AuthError = PkceError::InvalidVerifierCharacters.into();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
        assert_eq!(
            PkceError::InvalidVerifierLength(3).oauth_error_code(),
            "invalid_request"
        );
    }
}
