//! Identity gateways.
//!
//! Both gateways are instances of [`CachedGateway`]: a TTL cache in front of a
//! machine-credential authenticated, retried and circuit-broken upstream call,
//! with stale-cache fallback when the upstream fails.
//!
//! - [`BiometricGateway`] answers age and persona questions about one member.
//! - [`RelationshipGateway`] returns the members a representative supports.

pub mod biometric;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod relationships;

pub use biometric::{BiometricGateway, BiometricInfo, BiometricResource};
pub use cache::TtlCache;
pub use client::{CachedGateway, GatewayResource};
pub use credentials::MachineTokenCache;
pub use relationships::{
    AccessLevelResponse, MemberRef, RelationshipGateway, RelationshipResource, SupportedMember,
};
