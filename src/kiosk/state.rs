use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::config::KioskSettings;
use super::cookies;
use super::tabs::{Tab, Tabs};
use crate::config::Config;
use crate::gateway::ApiGateway;

/// Shared state for kiosk route handlers.
pub(super) struct KioskState<G> {
    pub(super) gateway: Arc<G>,
    pub(super) config: Arc<Config>,
    pub(super) tabs: Arc<Tabs<G>>,
    pub(super) settings: KioskSettings,
}

// Manual Clone: avoid derive adding a `G: Clone` bound.
impl<G> Clone for KioskState<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            config: self.config.clone(),
            tabs: self.tabs.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<G: ApiGateway> FromRef<KioskState<G>> for Key {
    fn from_ref(state: &KioskState<G>) -> Self {
        state.settings.cookie_key.clone()
    }
}

impl<G: ApiGateway> KioskState<G> {
    /// The requesting tab, if its cookie names one still open. Never creates.
    pub(super) fn find_tab(&self, jar: &PrivateCookieJar) -> Option<Arc<Tab<G>>> {
        self.tabs
            .find(cookies::get_tab_id(jar, &self.settings.tab_cookie_name))
    }

    /// Resolve the requesting tab, opening one (and running its page-load work)
    /// when the cookie is missing or points at a forgotten tab.
    pub(super) async fn open_tab(&self, jar: PrivateCookieJar) -> (PrivateCookieJar, Arc<Tab<G>>) {
        let known = cookies::get_tab_id(&jar, &self.settings.tab_cookie_name);
        let (id, tab, created) = self.tabs.open(known, &self.gateway, &self.config);
        if !created {
            return (jar, tab);
        }

        let banners = tab.checkin.start().await;
        tab.checkin_flash.push_banners(banners);
        let cookie = cookies::tab_cookie(
            &self.settings.tab_cookie_name,
            id,
            self.settings.secure_cookies,
        );
        (jar.add(cookie), tab)
    }
}
