use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::error::KioskError;
use super::types::TabId;
use crate::banner::Banner;
use crate::config::Config;
use crate::error::{Error, FieldError};
use crate::gateway::ApiGateway;
use crate::session::MemoryStorage;
use crate::workflow::{CheckInController, CheckOutController, WorkflowError};

/// Messages produced by one request and shown by the next page load.
#[derive(Debug, Default)]
pub(super) struct Messages {
    pub(super) banners: Vec<Banner>,
    pub(super) field_errors: Vec<FieldError>,
}

/// Pending messages of one workflow view.
#[derive(Debug, Default)]
pub(super) struct Flash(Mutex<Messages>);

impl Flash {
    fn lock(&self) -> MutexGuard<'_, Messages> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn push_banners(&self, banners: impl IntoIterator<Item = Banner>) {
        self.lock().banners.extend(banners);
    }

    pub(super) fn take(&self) -> Messages {
        std::mem::take(&mut *self.lock())
    }

    /// Turn the outcome of a workflow action into what the next page load shows.
    ///
    /// Only a concurrent action and internal failures escape as errors; everything
    /// else is for the operator to read.
    pub(super) fn settle<T>(&self, result: Result<T, WorkflowError>) -> Result<(), KioskError> {
        let mut messages = self.lock();
        messages.field_errors.clear();
        let Err(failure) = result else {
            return Ok(());
        };
        match failure.error {
            Error::Busy => Err(KioskError::Busy),
            Error::Superseded => Ok(()),
            Error::Storage(msg) | Error::Config(msg) => Err(KioskError::Internal(msg)),
            error => {
                messages.field_errors = error.field_errors().to_vec();
                messages.banners.extend(failure.banner);
                Ok(())
            }
        }
    }
}

/// Everything one operator tab owns. Its [`MemoryStorage`] is the tab-scoped
/// home of the pending OIDC session, so forgetting the tab destroys it.
pub(super) struct Tab<G> {
    pub(super) checkin: CheckInController<G, MemoryStorage>,
    pub(super) checkout: CheckOutController<G>,
    pub(super) checkin_flash: Flash,
    pub(super) checkout_flash: Flash,
    last_seen: Mutex<Instant>,
}

impl<G: ApiGateway> Tab<G> {
    fn new(gateway: &Arc<G>, config: &Config) -> Self {
        Self {
            checkin: CheckInController::new(gateway.clone(), Arc::new(MemoryStorage::new()), config),
            checkout: CheckOutController::new(gateway.clone(), config),
            checkin_flash: Flash::default(),
            checkout_flash: Flash::default(),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn last_seen(&self) -> Instant {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, now: Instant) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    fn idle_since(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen())
    }
}

/// Open operator tabs, forgotten after `idle` without a request. At most
/// `max_tabs` are kept; opening one more forgets the least recently used.
pub(super) struct Tabs<G> {
    tabs: Mutex<HashMap<TabId, Arc<Tab<G>>>>,
    idle: Duration,
    max_tabs: usize,
}

impl<G: ApiGateway> Tabs<G> {
    pub(super) fn new(idle: Duration, max_tabs: usize) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            idle,
            max_tabs: max_tabs.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TabId, Arc<Tab<G>>>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live tab without creating one.
    pub(super) fn find(&self, id: Option<TabId>) -> Option<Arc<Tab<G>>> {
        let id = id?;
        let now = Instant::now();
        let tabs = self.lock();
        let tab = tabs.get(&id).filter(|tab| tab.idle_since(now) < self.idle)?;
        tab.touch(now);
        Some(Arc::clone(tab))
    }

    /// Look up the tab, creating a fresh one if the id is unknown or expired.
    ///
    /// The flag is `true` when the tab was just created.
    pub(super) fn open(
        &self,
        id: Option<TabId>,
        gateway: &Arc<G>,
        config: &Config,
    ) -> (TabId, Arc<Tab<G>>, bool) {
        let now = Instant::now();
        let mut tabs = self.lock();

        let before = tabs.len();
        tabs.retain(|_, tab| tab.idle_since(now) < self.idle);
        if tabs.len() < before {
            tracing::debug!(evicted = before - tabs.len(), "idle tabs forgotten");
        }

        if let Some((id, tab)) = id.and_then(|id| tabs.get(&id).map(|tab| (id, Arc::clone(tab)))) {
            tab.touch(now);
            return (id, tab, false);
        }

        if tabs.len() >= self.max_tabs {
            let oldest = tabs
                .iter()
                .min_by_key(|(_, tab)| tab.last_seen())
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                tabs.remove(&oldest);
                tracing::debug!(tab = %oldest, "tab limit reached, least recent tab forgotten");
            }
        }

        let id = TabId::generate();
        let tab = Arc::new(Tab::new(gateway, config));
        tabs.insert(id, tab.clone());
        tracing::debug!(tab = %id, "tab opened");
        (id, tab, true)
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use super::*;
    use crate::gateway::AuthorizationRedirect;
    use crate::types::{
        CheckinReceipt, CheckoutReceipt, FaydaId, Host, NewCheckin, VisitId, VisitRecord,
        VisitorIdentity,
    };

    struct Offline;

    fn offline<T: Send>() -> impl Future<Output = Result<T, Error>> + Send {
        async { Err(Error::Network("offline".into())) }
    }

    impl ApiGateway for Offline {
        fn test_connection(&self) -> impl Future<Output = Result<bool, Error>> + Send {
            offline()
        }
        fn list_hosts(&self) -> impl Future<Output = Result<Vec<Host>, Error>> + Send {
            offline()
        }
        fn initiate_oidc(
            &self,
            _: &FaydaId,
        ) -> impl Future<Output = Result<AuthorizationRedirect, Error>> + Send {
            offline()
        }
        fn exchange_code(
            &self,
            _: &str,
            _: &str,
        ) -> impl Future<Output = Result<VisitorIdentity, Error>> + Send {
            offline()
        }
        fn create_checkin(
            &self,
            _: &NewCheckin,
        ) -> impl Future<Output = Result<CheckinReceipt, Error>> + Send {
            offline()
        }
        fn find_active_visit(
            &self,
            _: &FaydaId,
        ) -> impl Future<Output = Result<VisitRecord, Error>> + Send {
            offline()
        }
        fn checkout(
            &self,
            _: VisitId,
            _: &str,
        ) -> impl Future<Output = Result<CheckoutReceipt, Error>> + Send {
            offline()
        }
    }

    fn config() -> Config {
        Config::new("http://backend.test/api/".parse().unwrap())
    }

    #[test]
    fn known_tab_is_reused() {
        let tabs = Tabs::<Offline>::new(Duration::from_secs(60), 8);
        let gateway = Arc::new(Offline);
        let (id, first, created) = tabs.open(None, &gateway, &config());
        assert!(created);
        let (same, second, created) = tabs.open(Some(id), &gateway, &config());
        assert!(!created);
        assert_eq!(same, id);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_tab_gets_a_fresh_id() {
        let tabs = Tabs::<Offline>::new(Duration::from_secs(60), 8);
        let gateway = Arc::new(Offline);
        let stale = TabId::generate();
        let (id, _, created) = tabs.open(Some(stale), &gateway, &config());
        assert!(created);
        assert_ne!(id, stale);
    }

    #[test]
    fn idle_tabs_are_forgotten() {
        let tabs = Tabs::<Offline>::new(Duration::ZERO, 8);
        let gateway = Arc::new(Offline);
        let (first, _, _) = tabs.open(None, &gateway, &config());
        let (second, _, created) = tabs.open(Some(first), &gateway, &config());
        assert!(created);
        assert_ne!(first, second);
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn settle_routes_errors_to_the_flash() {
        let tab = Tab::new(&Arc::new(Offline), &config());
        let failure = WorkflowError::with_banner(
            Error::field(crate::error::Field::Reason, "too short"),
            Banner::error("Check the form", Duration::from_secs(8)),
        );
        tab.checkin_flash.settle::<()>(Err(failure)).unwrap();
        assert!(tab.checkout_flash.take().banners.is_empty());
        let messages = tab.checkin_flash.take();
        assert_eq!(messages.banners.len(), 1);
        assert_eq!(messages.field_errors[0].message, "too short");
        assert!(tab.checkin_flash.take().banners.is_empty());
    }

    #[test]
    fn busy_and_internal_errors_escape() {
        let flash = Flash::default();
        let busy = flash.settle::<()>(Err(Error::Busy.into()));
        assert!(matches!(busy, Err(KioskError::Busy)));
        let storage = flash.settle::<()>(Err(Error::Storage("poisoned".into()).into()));
        assert!(matches!(storage, Err(KioskError::Internal(_))));
        assert!(flash.settle::<()>(Err(Error::Superseded.into())).is_ok());
        assert!(flash.take().banners.is_empty());
    }

    #[test]
    fn find_never_creates() {
        let tabs = Tabs::<Offline>::new(Duration::from_secs(60), 8);
        assert!(tabs.find(None).is_none());
        assert!(tabs.find(Some(TabId::generate())).is_none());
        assert_eq!(tabs.len(), 0);

        let (id, opened, _) = tabs.open(None, &Arc::new(Offline), &config());
        let found = tabs.find(Some(id)).unwrap();
        assert!(Arc::ptr_eq(&opened, &found));
    }

    #[test]
    fn tab_limit_forgets_the_least_recent() {
        let tabs = Tabs::<Offline>::new(Duration::from_secs(60), 2);
        let gateway = Arc::new(Offline);
        let (first, _, _) = tabs.open(None, &gateway, &config());
        std::thread::sleep(Duration::from_millis(2));
        let (second, _, _) = tabs.open(None, &gateway, &config());
        std::thread::sleep(Duration::from_millis(2));
        tabs.find(Some(first));
        tabs.open(None, &gateway, &config());

        assert_eq!(tabs.len(), 2);
        assert!(tabs.find(Some(first)).is_some());
        assert!(tabs.find(Some(second)).is_none());
    }
}
