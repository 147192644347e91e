//! The access decision state machine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::clock::{Clock, format_rfc3339};
use crate::decision::model::{AccessDecision, AccessMode, ApplicationType, PersonaTag};
use crate::error::{AuthError, AuthResult};
use crate::gateway::{
    AccessLevelResponse, BiometricGateway, BiometricInfo, MemberRef, RelationshipGateway,
    SupportedMember,
};
use crate::session::{SessionStore, UserSession};

/// Source of biometric facts about a member.
#[async_trait]
pub trait BiometricSource: Send + Sync {
    /// Looks up the member by stable id.
    async fn biometric_info(&self, member_id: &str) -> AuthResult<BiometricInfo>;
}

/// Source of the supported-member relationship graph.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    /// Looks up the members `member` supports.
    async fn access_level(&self, member: &MemberRef) -> AuthResult<AccessLevelResponse>;
}

#[async_trait]
impl BiometricSource for BiometricGateway {
    async fn biometric_info(&self, member_id: &str) -> AuthResult<BiometricInfo> {
        self.get(member_id).await
    }
}

#[async_trait]
impl RelationshipSource for RelationshipGateway {
    async fn access_level(&self, member: &MemberRef) -> AuthResult<AccessLevelResponse> {
        self.get(member).await
    }
}

#[async_trait]
impl<T: BiometricSource + ?Sized> BiometricSource for Arc<T> {
    async fn biometric_info(&self, member_id: &str) -> AuthResult<BiometricInfo> {
        (**self).biometric_info(member_id).await
    }
}

#[async_trait]
impl<T: RelationshipSource + ?Sized> RelationshipSource for Arc<T> {
    async fn access_level(&self, member: &MemberRef) -> AuthResult<AccessLevelResponse> {
        (**self).access_level(member).await
    }
}

/// Computes what a member may see in a given application.
///
/// Evaluation order:
///
/// 1. Biometric lookup; failure means `NO_ACCESS`.
/// 2. Minors are `SELF_ONLY_MINOR`.
/// 3. Adults without the representative persona are `SELF_ONLY_ADULT`.
/// 4. Representatives get their relationship graph filtered to RRP+DAA edges.
///    A failed lookup or an empty result is `SELF_ONLY_ADULT`; otherwise
///    `SUPPORTING_OTHERS` for the consumer portal and `SELF_AND_OTHERS` for
///    the provider portal.
///
/// Every failure narrows access. The relationship gateway is only consulted
/// in step 4.
#[derive(Debug)]
pub struct AccessDecisionEngine<B, R> {
    biometric: B,
    relationships: R,
    clock: Arc<dyn Clock>,
}

impl<B: BiometricSource, R: RelationshipSource> AccessDecisionEngine<B, R> {
    pub fn new(biometric: B, relationships: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            biometric,
            relationships,
            clock,
        }
    }

    /// Runs the decision for `member_id` in `application`.
    ///
    /// Never fails: upstream failures are folded into a narrower decision.
    #[instrument(skip(self), fields(access_mode = tracing::field::Empty))]
    pub async fn decide(&self, member_id: &str, application: ApplicationType) -> AccessDecision {
        let decision = self.evaluate(member_id, application).await;
        tracing::Span::current().record("access_mode", decision.access_mode.as_str());
        tracing::debug!(reason = %decision.decision_reason, "Access decision computed");
        decision
    }

    /// Returns the session's decision for `application`, recomputing it when
    /// the cached one was made for another application.
    ///
    /// A fresh decision is written back to the session unless it is
    /// `NO_ACCESS`, which is never cached so a transient outage does not
    /// outlive itself.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if no member id can be derived from the session
    /// - `Storage` if the session store fails
    pub async fn decide_for_session(
        &self,
        store: &SessionStore,
        session: &UserSession,
        application: ApplicationType,
    ) -> AuthResult<AccessDecision> {
        if let Some(cached) = &session.access_decision
            && cached.applies_to(application)
        {
            tracing::debug!(
                session_id = %session.session_id,
                application = %application,
                "Reusing cached access decision"
            );
            return Ok(cached.clone());
        }

        let member_id = session
            .user
            .member_id()
            .ok_or_else(|| AuthError::invalid_request("No member id available for session"))?;

        let decision = self.decide(&member_id, application).await;
        if decision.access_mode == AccessMode::NoAccess {
            if session.access_decision.is_some() {
                store.clear_access_decision(&session.session_id).await?;
            }
        } else {
            store
                .update_access_decision(&session.session_id, decision.clone())
                .await?;
        }
        Ok(decision)
    }

    async fn evaluate(&self, member_id: &str, application: ApplicationType) -> AccessDecision {
        let now = self.clock.now_ms();

        let info = match self.biometric.biometric_info(member_id).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(member_id = %member_id, error = %err, "Biometric lookup failed");
                return AccessDecision {
                    application_type: application,
                    access_mode: AccessMode::NoAccess,
                    biometric_info: None,
                    access_level: None,
                    can_view_own_data: false,
                    can_view_others_data: false,
                    viewable_members: Vec::new(),
                    decision_reason: format!("Biometric lookup failed: {err}"),
                    decided_at: format_rfc3339(now),
                };
            }
        };

        if info.is_minor {
            return self_only(
                member_id,
                application,
                AccessMode::SelfOnlyMinor,
                info,
                None,
                "Member is under 18 years old",
                now,
            );
        }
        if !info.has_persona_representative {
            return self_only(
                member_id,
                application,
                AccessMode::SelfOnlyAdult,
                info,
                None,
                "Member is 18+ but has no PR persona",
                now,
            );
        }

        let member = MemberRef::hsid(member_id);
        let access_level = match self.relationships.access_level(&member).await {
            Ok(access_level) => access_level,
            Err(err) => {
                tracing::warn!(member_id = %member_id, error = %err, "Relationship lookup failed");
                return self_only(
                    member_id,
                    application,
                    AccessMode::SelfOnlyAdult,
                    info,
                    None,
                    &format!("Relationship lookup failed: {err}"),
                    now,
                );
            }
        };

        let eligible = eligible_members(&access_level.supported_members);
        if eligible.is_empty() {
            return self_only(
                member_id,
                application,
                AccessMode::SelfOnlyAdult,
                info,
                Some(access_level),
                "No supported members with RRP+DAA",
                now,
            );
        }

        let count = eligible.len();
        let (access_mode, can_view_own_data, viewable_members, reason) = match application {
            ApplicationType::Consumer => (
                AccessMode::SupportingOthers,
                false,
                eligible,
                format!(
                    "Consumer: member has PR persona and {count} supported members with RRP+DAA"
                ),
            ),
            ApplicationType::ProviderPortal => {
                let mut members = Vec::with_capacity(count + 1);
                members.push(self_member(member_id, &info));
                members.extend(eligible);
                (
                    AccessMode::SelfAndOthers,
                    true,
                    members,
                    format!(
                        "Provider portal: member has PR persona and {count} supported members \
                         with RRP+DAA"
                    ),
                )
            }
        };

        AccessDecision {
            application_type: application,
            access_mode,
            biometric_info: Some(info),
            access_level: Some(access_level),
            can_view_own_data,
            can_view_others_data: true,
            viewable_members,
            decision_reason: reason,
            decided_at: format_rfc3339(now),
        }
    }
}

fn self_only(
    member_id: &str,
    application: ApplicationType,
    access_mode: AccessMode,
    info: BiometricInfo,
    access_level: Option<AccessLevelResponse>,
    reason: &str,
    now_ms: i64,
) -> AccessDecision {
    AccessDecision {
        application_type: application,
        access_mode,
        viewable_members: vec![self_member(member_id, &info)],
        biometric_info: Some(info),
        access_level,
        can_view_own_data: true,
        can_view_others_data: false,
        decision_reason: reason.to_string(),
        decided_at: format_rfc3339(now_ms),
    }
}

/// The requesting member as an entry of the viewable list, keyed by the id
/// the caller asked about.
fn self_member(member_id: &str, info: &BiometricInfo) -> SupportedMember {
    SupportedMember {
        eid: member_id.to_string(),
        first_name: info.first_name.clone(),
        last_name: info.last_name.clone(),
        date_of_birth: info.date_of_birth.clone(),
        relationship: Some("self".to_string()),
        access_level: Some("full".to_string()),
        ..SupportedMember::default()
    }
}

/// Keeps edges carrying both RRP and DAA and derives their capabilities.
fn eligible_members(members: &[SupportedMember]) -> Vec<SupportedMember> {
    members
        .iter()
        .filter(|m| PersonaTag::Rrp.is_in(&m.personas) && PersonaTag::Daa.is_in(&m.personas))
        .map(|m| SupportedMember {
            has_digital_account_access: true,
            has_sensitive_data_access: PersonaTag::Roi.is_in(&m.personas),
            ..m.clone()
        })
        .collect()
}
