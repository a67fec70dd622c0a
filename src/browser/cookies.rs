//! Conversions between cached cookies and CDP cookie types.

use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, DeleteCookiesParams, TimeSinceEpoch,
};

use crate::driver::SessionCookie;
use crate::error::DriverError;

pub(crate) fn from_cdp(cookie: &Cookie) -> SessionCookie {
    SessionCookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        // CDP reports session cookies with a negative expiry
        expiry: (!cookie.session && cookie.expires > 0.0).then(|| cookie.expires as i64),
        secure: cookie.secure,
        http_only: cookie.http_only,
        same_site: cookie.same_site.as_ref().map(|s| s.as_ref().to_string()),
    }
}

pub(crate) fn to_param(cookie: &SessionCookie) -> Result<CookieParam, DriverError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);

    if let Some(expiry) = cookie.expiry {
        builder = builder.expires(TimeSinceEpoch::new(expiry as f64));
    }
    if let Some(same_site) = cookie.same_site.as_deref().and_then(parse_same_site) {
        builder = builder.same_site(same_site);
    }

    builder
        .build()
        .map_err(|e| DriverError::Cookie(format!("Invalid cookie {}: {}", cookie.name, e)))
}

pub(crate) fn delete_param(cookie: &SessionCookie) -> DeleteCookiesParams {
    DeleteCookiesParams::builder()
        .name(cookie.name.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .build()
        .unwrap_or_else(|_| DeleteCookiesParams::new(cookie.name.clone()))
}

fn parse_same_site(value: &str) -> Option<CookieSameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some(CookieSameSite::Strict),
        "lax" => Some(CookieSameSite::Lax),
        "none" => Some(CookieSameSite::None),
        _ => None,
    }
}
