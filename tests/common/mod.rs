//! Shared fixtures for workflow and kiosk tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fayda_visitor::{
    ApiGateway, AuthorizationRedirect, CheckinReceipt, CheckoutReceipt, Config, Error, FaydaId,
    Host, HostId, NewCheckin, VisitId, VisitRecord, VisitorIdentity,
};
use tokio::sync::Notify;

pub const FAYDA_ID: &str = "123456789012";
pub const AUTH_URL: &str = "https://auth.fayda.test/authorize?client_id=kiosk&state=abc";

pub fn config() -> Config {
    Config::new("http://backend.test/api/".parse().unwrap())
}

pub fn identity() -> VisitorIdentity {
    VisitorIdentity::new(FAYDA_ID, "Abebe Kebede")
        .with_picture_url("https://cdn.fayda.test/p/1.jpg")
        .with_gender("Male")
}

pub fn hosts() -> Vec<Host> {
    vec![
        Host {
            id: HostId(1),
            name: "Dawit Alemu".into(),
            department: "Finance".into(),
        },
        Host {
            id: HostId(2),
            name: "Sara Tesfaye".into(),
            department: "Legal".into(),
        },
    ]
}

pub fn active_visit() -> VisitRecord {
    serde_json::from_value(serde_json::json!({
        "id": 42,
        "fayda_id": FAYDA_ID,
        "name": "Abebe Kebede",
        "host_id": 1,
        "host_name": "Dawit Alemu",
        "reason": "Contract signing",
        "checkin_time": "2024-03-01T08:00:00Z",
        "checkout_time": null
    }))
    .unwrap()
}

/// Number of calls per backend endpoint.
#[derive(Default)]
pub struct Calls {
    pub test_connection: AtomicUsize,
    pub list_hosts: AtomicUsize,
    pub initiate: AtomicUsize,
    pub exchange: AtomicUsize,
    pub checkin: AtomicUsize,
    pub find_active: AtomicUsize,
    pub checkout: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory backend with scripted answers.
///
/// `initiate_oidc` answers with state `"abc"`; `exchange_code` returns
/// [`identity()`]. Set a `fail_*` flag to make the matching call fail with a
/// server error. While `hold` is set, `initiate_oidc`, `exchange_code`,
/// `create_checkin` and `checkout` wait for [`FakeGateway::release`].
pub struct FakeGateway {
    pub calls: Calls,
    pub unreachable: AtomicBool,
    pub fail_initiate: AtomicBool,
    pub fail_exchange: AtomicBool,
    pub fail_checkin: AtomicBool,
    pub fail_checkout: AtomicBool,
    pub no_active_visit: AtomicBool,
    pub hold: AtomicBool,
    pub last_checkin: Mutex<Option<NewCheckin>>,
    pub last_checkout: Mutex<Option<(VisitId, String)>>,
    gate: Notify,
    entered: Notify,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            calls: Calls::default(),
            unreachable: AtomicBool::new(false),
            fail_initiate: AtomicBool::new(false),
            fail_exchange: AtomicBool::new(false),
            fail_checkin: AtomicBool::new(false),
            fail_checkout: AtomicBool::new(false),
            no_active_visit: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            last_checkin: Mutex::new(None),
            last_checkout: Mutex::new(None),
            gate: Notify::new(),
            entered: Notify::new(),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn unset(flag: &AtomicBool) {
        flag.store(false, Ordering::SeqCst);
    }

    /// Wait until a held call has reached the backend.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let a held call complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn maybe_hold(&self) {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), Error> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Server("Internal server error".into()))
        } else {
            Ok(())
        }
    }
}

impl ApiGateway for FakeGateway {
    async fn test_connection(&self) -> Result<bool, Error> {
        self.calls.test_connection.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        Ok(true)
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, Error> {
        self.calls.list_hosts.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        Ok(hosts())
    }

    async fn initiate_oidc(&self, _fayda_id: &FaydaId) -> Result<AuthorizationRedirect, Error> {
        self.calls.initiate.fetch_add(1, Ordering::SeqCst);
        self.maybe_hold().await;
        Self::check(&self.fail_initiate)?;
        Ok(AuthorizationRedirect::new("abc", AUTH_URL.parse().unwrap()))
    }

    async fn exchange_code(&self, _code: &str, _state: &str) -> Result<VisitorIdentity, Error> {
        self.calls.exchange.fetch_add(1, Ordering::SeqCst);
        self.maybe_hold().await;
        Self::check(&self.fail_exchange)?;
        Ok(identity())
    }

    async fn create_checkin(&self, checkin: &NewCheckin) -> Result<CheckinReceipt, Error> {
        self.calls.checkin.fetch_add(1, Ordering::SeqCst);
        *self.last_checkin.lock().unwrap() = Some(checkin.clone());
        self.maybe_hold().await;
        Self::check(&self.fail_checkin)?;
        Ok(CheckinReceipt {
            id: VisitId(7),
            checkin_time: None,
        })
    }

    async fn find_active_visit(&self, _fayda_id: &FaydaId) -> Result<VisitRecord, Error> {
        self.calls.find_active.fetch_add(1, Ordering::SeqCst);
        if self.no_active_visit.load(Ordering::SeqCst) {
            return Err(Error::NotFound(
                "No active visit found for this Fayda ID".into(),
            ));
        }
        Ok(active_visit())
    }

    async fn checkout(&self, visit_id: VisitId, fayda_id: &str) -> Result<CheckoutReceipt, Error> {
        self.calls.checkout.fetch_add(1, Ordering::SeqCst);
        *self.last_checkout.lock().unwrap() = Some((visit_id, fayda_id.to_owned()));
        self.maybe_hold().await;
        Self::check(&self.fail_checkout)?;
        Ok(CheckoutReceipt {
            id: visit_id,
            checkout_time: time::macros::datetime!(2024-03-01 10:15:00 UTC),
        })
    }
}
