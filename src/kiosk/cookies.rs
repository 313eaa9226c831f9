use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::types::TabId;

/// Create the tab cookie.
///
/// No max-age: it lives as long as the browser session. `Lax` so that it still
/// accompanies the top-level redirect back from the identity provider.
pub(super) fn tab_cookie(name: &str, tab_id: TabId, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), tab_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .build()
}

/// Get the tab id from cookies; a tampered or stale value reads as absent.
pub(super) fn get_tab_id(jar: &PrivateCookieJar, name: &str) -> Option<TabId> {
    jar.get(name).and_then(|c| c.value().parse().ok())
}
