//! Canonical member identity mapped from a userinfo claim bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Claim names checked for roles, in priority order.
const ROLE_CLAIMS: [&str; 3] = ["roles", "groups", "authorities"];

/// Claims mapped onto named fields; everything else is a custom claim.
const CANONICAL_CLAIMS: [&str; 12] = [
    "sub",
    "email",
    "name",
    "given_name",
    "family_name",
    "picture",
    "locale",
    "email_verified",
    "roles",
    "groups",
    "authorities",
    "permissions",
];

/// Custom claims checked for the domain member id, in priority order.
const MEMBER_ID_CLAIMS: [&str; 2] = ["hsid", "member_id"];

/// The authenticated member as reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Subject identifier (`sub`).
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Roles from the first populated of `roles`, `groups`, `authorities`.
    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub permissions: Vec<String>,

    /// Every claim not mapped above, verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_claims: Map<String, Value>,
}

impl Identity {
    /// Maps a userinfo claim map onto the canonical identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` if the `sub` claim is missing.
    pub fn from_claims(mut claims: Map<String, Value>) -> AuthResult<Self> {
        let id = claims
            .get("sub")
            .and_then(claim_as_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::identity_provider("userinfo response has no sub claim"))?;

        let roles = ROLE_CLAIMS
            .iter()
            .find_map(|name| claims.get(*name).and_then(string_list))
            .unwrap_or_default();
        let permissions = claims
            .get("permissions")
            .and_then(string_list)
            .unwrap_or_default();

        let text = |claims: &Map<String, Value>, name: &str| {
            claims.get(name).and_then(Value::as_str).map(str::to_string)
        };

        let identity = Self {
            email: text(&claims, "email"),
            name: text(&claims, "name"),
            given_name: text(&claims, "given_name"),
            family_name: text(&claims, "family_name"),
            picture: text(&claims, "picture"),
            locale: text(&claims, "locale"),
            email_verified: claims.get("email_verified").and_then(claim_as_bool),
            roles,
            permissions,
            id,
            custom_claims: Map::new(),
        };

        for name in CANONICAL_CLAIMS {
            claims.remove(name);
        }

        Ok(Self {
            custom_claims: claims,
            ..identity
        })
    }

    /// Resolves the domain member id used by the identity gateways.
    ///
    /// Tries the `hsid` and `member_id` custom claims, then falls back to the
    /// subject. Returns `None` only when all of them are empty.
    #[must_use]
    pub fn member_id(&self) -> Option<String> {
        MEMBER_ID_CLAIMS
            .iter()
            .filter_map(|name| self.custom_claims.get(*name))
            .filter_map(claim_as_string)
            .find(|s| !s.is_empty())
            .or_else(|| {
                tracing::debug!(user_id = %self.id, "No member id claim, falling back to subject");
                Some(self.id.clone()).filter(|id| !id.is_empty())
            })
    }
}

fn claim_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn claim_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Reads a JSON array of strings or a comma-separated string.
fn string_list(value: &Value) -> Option<Vec<String>> {
    let list: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    Some(list).filter(|l| !l.is_empty())
}
