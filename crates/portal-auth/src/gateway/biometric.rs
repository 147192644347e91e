//! First identity gateway: date of birth, age and persona of one member.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, macros::format_description};

use crate::clock::format_rfc3339;
use crate::gateway::client::{CachedGateway, GatewayResource};
use crate::oauth::DEFAULT_EXPIRES_IN_SECS;

/// Age below which a member is a minor.
pub const ADULT_AGE: u32 = 18;

/// Persona marking a potential representative of other members.
pub const REPRESENTATIVE_PERSONA: &str = "PR";

/// Biometric and persona facts about one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricInfo {
    /// Stable member id.
    pub hsid: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// ISO date of birth as reported upstream.
    pub date_of_birth: Option<String>,
    /// Whole years since birth; `None` when the date is missing or invalid.
    pub age: Option<u32>,
    pub is_minor: bool,
    pub persona: Option<String>,
    pub has_persona_representative: bool,
    pub retrieved_at: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricWire {
    #[serde(default)]
    hsid: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    date_of_birth: Option<String>,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl BiometricInfo {
    /// Builds the facts from an upstream record retrieved at `now_ms`.
    ///
    /// `requested_id` stands in for the member id when upstream omits it.
    #[must_use]
    pub fn from_wire(wire: BiometricWire, requested_id: &str, now_ms: i64) -> Self {
        let age = wire
            .date_of_birth
            .as_deref()
            .and_then(|dob| age_on(dob, now_ms));
        let has_persona_representative = wire
            .persona
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(REPRESENTATIVE_PERSONA));

        Self {
            hsid: wire
                .hsid
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| requested_id.to_string()),
            first_name: wire.first_name,
            last_name: wire.last_name,
            date_of_birth: wire.date_of_birth,
            age,
            is_minor: age.is_some_and(|age| age < ADULT_AGE),
            persona: wire.persona,
            has_persona_representative,
            retrieved_at: format_rfc3339(now_ms),
            expires_in: wire.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }
    }
}

/// Whole years between `date_of_birth` and the UTC date of `now_ms`.
///
/// Returns `None` for unparseable or future dates.
fn age_on(date_of_birth: &str, now_ms: i64) -> Option<u32> {
    let format = format_description!("[year]-[month]-[day]");
    let dob = Date::parse(date_of_birth.get(..10)?, format).ok()?;
    let today = OffsetDateTime::from_unix_timestamp(now_ms.div_euclid(1000))
        .ok()?
        .date();
    if dob > today {
        return None;
    }

    let mut years = today.year() - dob.year();
    let birthday_passed =
        (u8::from(today.month()), today.day()) >= (u8::from(dob.month()), dob.day());
    if !birthday_passed {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Resource definition for the biometric gateway.
#[derive(Debug)]
pub struct BiometricResource;

impl GatewayResource for BiometricResource {
    type Key = str;
    type Wire = BiometricWire;
    type Value = BiometricInfo;

    const SERVICE: &'static str = "biometric";

    fn cache_key(member_id: &str) -> String {
        format!("us:biometric:{member_id}")
    }

    fn query(member_id: &str) -> Vec<(&'static str, String)> {
        vec![("hsid", member_id.to_string())]
    }

    fn from_wire(wire: BiometricWire, member_id: &str, now_ms: i64) -> BiometricInfo {
        BiometricInfo::from_wire(wire, member_id, now_ms)
    }
}

/// Cached client of the biometric gateway.
pub type BiometricGateway = CachedGateway<BiometricResource>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2024-06-15T12:00:00Z
    const NOW_MS: i64 = 1_718_452_800_000;

    fn parse(value: serde_json::Value) -> BiometricInfo {
        let wire: BiometricWire = serde_json::from_value(value).unwrap();
        BiometricInfo::from_wire(wire, "HS-1", NOW_MS)
    }

    #[test]
    fn test_age_boundaries() {
        assert_eq!(age_on("2006-06-15", NOW_MS), Some(18));
        assert_eq!(age_on("2006-06-16", NOW_MS), Some(17));
        assert_eq!(age_on("1980-01-01", NOW_MS), Some(44));
        assert_eq!(age_on("2024-06-15", NOW_MS), Some(0));
        assert_eq!(age_on("2030-01-01", NOW_MS), None);
        assert_eq!(age_on("not-a-date", NOW_MS), None);
        assert_eq!(age_on("1990-05-12T00:00:00Z", NOW_MS), Some(34));
    }

    #[test]
    fn test_minor() {
        let info = parse(json!({
            "hsid": "HS-1",
            "dateOfBirth": "2010-03-01",
            "persona": "PR"
        }));
        assert_eq!(info.age, Some(14));
        assert!(info.is_minor);
        assert!(info.has_persona_representative);
    }

    #[test]
    fn test_adult_with_persona_case_insensitive() {
        let info = parse(json!({
            "hsid": "HS-1",
            "firstName": "Jane",
            "dateOfBirth": "1980-01-01",
            "persona": "pr",
            "expiresIn": 900
        }));
        assert!(!info.is_minor);
        assert!(info.has_persona_representative);
        assert_eq!(info.first_name.as_deref(), Some("Jane"));
        assert_eq!(info.expires_in, 900);
        assert_eq!(info.retrieved_at, "2024-06-15T12:00:00Z");
    }

    #[test]
    fn test_unparseable_dob_is_not_minor() {
        let info = parse(json!({ "dateOfBirth": "12/01/2012" }));
        assert_eq!(info.age, None);
        assert!(!info.is_minor);
        assert!(!info.has_persona_representative);
        assert_eq!(info.hsid, "HS-1");
        assert_eq!(info.expires_in, 3600);
    }

    #[test]
    fn test_cache_key_and_query() {
        assert_eq!(BiometricResource::cache_key("HS-1"), "us:biometric:HS-1");
        assert_eq!(
            BiometricResource::query("HS-1"),
            vec![("hsid", "HS-1".to_string())]
        );
    }
}
