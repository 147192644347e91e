//! Access decisions: what a member may see in each client application.
//!
//! The [`AccessDecisionEngine`] turns biometric and relationship facts into an
//! [`AccessDecision`]. Document services consult the decision through
//! [`AccessDecision::authorize`] before touching another member's records.

mod engine;
mod model;

pub use engine::{AccessDecisionEngine, BiometricSource, RelationshipSource};
pub use model::{AccessDecision, AccessMode, ApplicationType, OwnerAccess, PersonaTag};
