//! Second identity gateway: the supported-member relationship graph.

use serde::{Deserialize, Serialize};

use crate::clock::format_rfc3339;
use crate::gateway::client::{CachedGateway, GatewayResource};
use crate::oauth::DEFAULT_EXPIRES_IN_SECS;

/// One relationship edge from the requesting member to a supported member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedMember {
    /// Target member id.
    pub eid: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub access_level: Option<String>,
    /// Raw persona tags on the edge (`RRP`, `DAA`, `ROI`, ...).
    #[serde(default)]
    pub personas: Vec<String>,
    /// Set during eligibility filtering: tags include RRP and DAA.
    #[serde(default)]
    pub has_digital_account_access: bool,
    /// Set during eligibility filtering: RRP, DAA and ROI.
    #[serde(default)]
    pub has_sensitive_data_access: bool,
}

/// Relationship graph of one requesting member, before eligibility filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLevelResponse {
    pub member_eid: Option<String>,
    pub member_id_type: String,
    pub member_id_value: String,
    pub can_view_own_data: bool,
    pub supported_members: Vec<SupportedMember>,
    pub retrieved_at: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLevelWire {
    #[serde(default)]
    member_eid: Option<String>,
    #[serde(default)]
    member_id_type: Option<String>,
    #[serde(default)]
    member_id_value: Option<String>,
    #[serde(default)]
    can_view_own_data: Option<bool>,
    #[serde(default)]
    supported_members: Vec<SupportedMemberWire>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedMemberWire {
    #[serde(default)]
    eid: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    date_of_birth: Option<String>,
    #[serde(default)]
    relationship: Option<String>,
    #[serde(default)]
    access_level: Option<String>,
    #[serde(default)]
    personas: Vec<String>,
}

impl From<SupportedMemberWire> for SupportedMember {
    fn from(wire: SupportedMemberWire) -> Self {
        Self {
            eid: wire.eid.unwrap_or_default(),
            first_name: wire.first_name,
            last_name: wire.last_name,
            date_of_birth: wire.date_of_birth,
            relationship: wire.relationship,
            access_level: wire.access_level,
            personas: wire.personas,
            has_digital_account_access: false,
            has_sensitive_data_access: false,
        }
    }
}

/// Member identifier as understood by the relationship gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub id_type: String,
    pub id_value: String,
}

impl MemberRef {
    /// Identifier type used for portal members.
    pub const HSID: &'static str = "HSID";

    #[must_use]
    pub fn new(id_type: impl Into<String>, id_value: impl Into<String>) -> Self {
        Self {
            id_type: id_type.into(),
            id_value: id_value.into(),
        }
    }

    /// Reference by portal member id.
    #[must_use]
    pub fn hsid(id_value: impl Into<String>) -> Self {
        Self::new(Self::HSID, id_value)
    }
}

/// Resource definition for the relationship gateway.
#[derive(Debug)]
pub struct RelationshipResource;

impl GatewayResource for RelationshipResource {
    type Key = MemberRef;
    type Wire = AccessLevelWire;
    type Value = AccessLevelResponse;

    const SERVICE: &'static str = "relationships";

    fn cache_key(member: &MemberRef) -> String {
        format!("psn:access-level:{}:{}", member.id_type, member.id_value)
    }

    fn query(member: &MemberRef) -> Vec<(&'static str, String)> {
        vec![
            ("memberIdType", member.id_type.clone()),
            ("memberIdValue", member.id_value.clone()),
        ]
    }

    fn from_wire(wire: AccessLevelWire, member: &MemberRef, now_ms: i64) -> AccessLevelResponse {
        AccessLevelResponse {
            member_eid: wire.member_eid,
            member_id_type: wire.member_id_type.unwrap_or_else(|| member.id_type.clone()),
            member_id_value: wire
                .member_id_value
                .unwrap_or_else(|| member.id_value.clone()),
            can_view_own_data: wire.can_view_own_data.unwrap_or(true),
            supported_members: wire
                .supported_members
                .into_iter()
                .map(SupportedMember::from)
                .collect(),
            retrieved_at: format_rfc3339(now_ms),
            expires_in: wire.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }
    }
}

/// Cached client of the relationship gateway.
pub type RelationshipGateway = CachedGateway<RelationshipResource>;
