//! OAuth 2.0 client side of the portal: PKCE verifier checks, the token
//! manager talking to the identity provider and the identity mapping.

pub mod identity;
pub mod pkce;
pub mod token;

pub use identity::Identity;
pub use pkce::{PkceError, validate_code_verifier};
pub use token::{DEFAULT_EXPIRES_IN_SECS, TokenManager, TokenSet, TokenTypeHint};
