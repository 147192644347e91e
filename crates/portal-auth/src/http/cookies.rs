//! Session cookie construction and lookup.

use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};

use crate::config::{CookieConfig, SameSitePolicy};

/// Builds the cookie carrying the session id.
///
/// The cookie is HTTP-only and carries nothing but the opaque id.
#[must_use]
pub fn session_cookie(
    config: &CookieConfig,
    session_id: &str,
    max_age: Duration,
) -> Cookie<'static> {
    let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    let max_age = cookie::time::Duration::seconds(secs);

    Cookie::build((config.name.clone(), session_id.to_string()))
        .http_only(true)
        .secure(config.secure)
        .same_site(same_site(config.same_site))
        .path(config.path.clone())
        .max_age(max_age)
        .build()
}

/// Builds the cookie that clears the session id in the browser.
#[must_use]
pub fn clear_session_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((config.name.clone(), String::new()))
        .http_only(true)
        .secure(config.secure)
        .same_site(same_site(config.same_site))
        .path(config.path.clone())
        .max_age(cookie::time::Duration::ZERO)
        .build()
}

/// Reads the session id from the request's `Cookie` headers.
#[must_use]
pub fn session_id_from_headers(headers: &HeaderMap, config: &CookieConfig) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(&config.name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::COOKIE};

    #[test]
    fn test_session_cookie_attributes() {
        let config = CookieConfig::default();
        let cookie = session_cookie(&config, "abc-123", Duration::from_secs(1800));
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("SESSION_ID=abc-123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=1800"));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = clear_session_cookie(&CookieConfig::default());
        let rendered = cookie.to_string();
        assert!(rendered.starts_with("SESSION_ID=;"));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn test_session_id_from_headers() {
        let config = CookieConfig::default();
        let mut headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers, &config).is_none());

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; SESSION_ID=s-1"));
        assert_eq!(session_id_from_headers(&headers, &config).as_deref(), Some("s-1"));

        headers.insert(COOKIE, HeaderValue::from_static("SESSION_ID="));
        assert!(session_id_from_headers(&headers, &config).is_none());
    }
}
