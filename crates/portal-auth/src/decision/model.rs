//! Access decision types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::gateway::{AccessLevelResponse, BiometricInfo, SupportedMember};

/// Client application the decision is computed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    /// Member-facing portal. Supporting others excludes viewing self.
    #[default]
    Consumer,
    /// Provider-facing portal. Self and supported members are both viewable.
    ProviderPortal,
}

impl ApplicationType {
    /// Wire name of the application type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::ProviderPortal => "PROVIDER_PORTAL",
        }
    }

    /// Parses the `app` query parameter. Unrecognised or missing values mean
    /// [`ApplicationType::Consumer`].
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "consumer" | "web-cl" => Ok(Self::Consumer),
            "provider-portal" | "web-hs" => Ok(Self::ProviderPortal),
            _ => Err(AuthError::invalid_request(format!(
                "Unknown application type: {s}"
            ))),
        }
    }
}

/// Five-way classification produced by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    SelfOnlyMinor,
    SelfOnlyAdult,
    SupportingOthers,
    SelfAndOthers,
    NoAccess,
}

impl AccessMode {
    /// Wire name of the access mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfOnlyMinor => "SELF_ONLY_MINOR",
            Self::SelfOnlyAdult => "SELF_ONLY_ADULT",
            Self::SupportingOthers => "SUPPORTING_OTHERS",
            Self::SelfAndOthers => "SELF_AND_OTHERS",
            Self::NoAccess => "NO_ACCESS",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persona tags on a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonaTag {
    /// Recognised representative.
    Rrp,
    /// Digital account access.
    Daa,
    /// Release of information (sensitive records).
    Roi,
}

impl PersonaTag {
    /// Case-insensitive parse; unknown tags yield `None`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("RRP") {
            Some(Self::Rrp)
        } else if tag.eq_ignore_ascii_case("DAA") {
            Some(Self::Daa)
        } else if tag.eq_ignore_ascii_case("ROI") {
            Some(Self::Roi)
        } else {
            None
        }
    }

    /// Returns `true` if `tags` contains this tag.
    #[must_use]
    pub fn is_in(self, tags: &[String]) -> bool {
        tags.iter().any(|t| Self::parse(t) == Some(self))
    }
}

/// Outcome of the access decision engine.
///
/// Immutable: a newer decision replaces a cached one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub application_type: ApplicationType,
    pub access_mode: AccessMode,
    /// Facts the decision was derived from; absent for `NO_ACCESS`.
    pub biometric_info: Option<BiometricInfo>,
    /// Relationship graph, when it was fetched.
    pub access_level: Option<AccessLevelResponse>,
    pub can_view_own_data: bool,
    pub can_view_others_data: bool,
    /// Members whose records may be viewed; self first when present.
    pub viewable_members: Vec<SupportedMember>,
    pub decision_reason: String,
    /// RFC 3339 timestamp.
    pub decided_at: String,
}

/// Operation a document consumer wants to perform on an owner's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerAccess {
    pub write: bool,
    pub sensitive: bool,
}

impl OwnerAccess {
    #[must_use]
    pub fn read() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn write() -> Self {
        Self {
            write: true,
            sensitive: false,
        }
    }

    /// Marks the target record as sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl AccessDecision {
    /// Own and others' data are never both hidden outside `NO_ACCESS`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.can_view_own_data
            || self.can_view_others_data
            || self.access_mode == AccessMode::NoAccess
    }

    /// Returns `true` if this decision may be reused for `application`.
    #[must_use]
    pub fn applies_to(&self, application: ApplicationType) -> bool {
        self.application_type == application
    }

    /// Looks up a viewable member by id.
    #[must_use]
    pub fn viewable_member(&self, member_id: &str) -> Option<&SupportedMember> {
        self.viewable_members.iter().find(|m| m.eid == member_id)
    }

    /// Checks whether records owned by `owner_id` may be accessed.
    ///
    /// `self_id` is the requesting member's id. The owner must be a viewable
    /// member. For owners other than self, writes need digital account access
    /// and sensitive records need sensitive data access.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` when any check fails.
    pub fn authorize(
        &self,
        owner_id: &str,
        access: OwnerAccess,
        self_id: &str,
    ) -> AuthResult<&SupportedMember> {
        let member = self.viewable_member(owner_id).ok_or_else(|| {
            AuthError::access_denied(format!("Member {owner_id} is not viewable"))
        })?;

        if owner_id == self_id {
            if !self.can_view_own_data {
                return Err(AuthError::access_denied(
                    "Own records are not viewable in this application",
                ));
            }
            return Ok(member);
        }

        if !self.can_view_others_data {
            return Err(AuthError::access_denied(
                "Records of other members are not viewable",
            ));
        }
        if access.write && !member.has_digital_account_access {
            return Err(AuthError::access_denied(format!(
                "No digital account access for member {owner_id}"
            )));
        }
        if access.sensitive && !member.has_sensitive_data_access {
            return Err(AuthError::access_denied(format!(
                "No sensitive data access for member {owner_id}"
            )));
        }

        Ok(member)
    }
}
