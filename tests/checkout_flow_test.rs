//! Integration tests for the checkout workflow against an in-memory backend.

mod common;

use std::sync::Arc;

use common::{Calls, FAYDA_ID, FakeGateway, active_visit, config};
use fayda_visitor::{CheckOutController, CheckOutState, Error, Field, VisitId};

fn setup() -> (Arc<FakeGateway>, Arc<CheckOutController<FakeGateway>>) {
    let gateway = FakeGateway::new();
    let checkout = Arc::new(CheckOutController::new(gateway.clone(), &config()));
    (gateway, checkout)
}

#[tokio::test]
async fn active_visit_is_checked_out_with_duration() {
    let (gateway, checkout) = setup();

    let visit = checkout.lookup("1234 5678 9012").await.unwrap();
    assert_eq!(visit.id, VisitId(42));
    assert!(visit.is_active());
    assert_eq!(
        checkout.state(),
        CheckOutState::Confirmation {
            visit: active_visit()
        }
    );

    let receipt = checkout.confirm().await.unwrap();
    assert_eq!(receipt.id, VisitId(42));
    assert_eq!(
        *gateway.last_checkout.lock().unwrap(),
        Some((VisitId(42), FAYDA_ID.to_owned()))
    );

    let CheckOutState::Success {
        duration, message, ..
    } = checkout.state()
    else {
        panic!("expected success, got {:?}", checkout.state());
    };
    assert_eq!(duration, "2h 15m");
    assert_eq!(message, "Abebe Kebede has been successfully checked out.");

    checkout.new_checkout().unwrap();
    assert_eq!(checkout.state(), CheckOutState::IdInput);
}

#[tokio::test]
async fn unknown_visitor_gets_a_banner() {
    let (gateway, checkout) = setup();
    FakeGateway::set(&gateway.no_active_visit);

    let err = checkout.lookup(FAYDA_ID).await.unwrap_err();
    assert!(matches!(err.error, Error::NotFound(_)));
    assert_eq!(
        err.banner.unwrap().message,
        "No active visit found for this Fayda ID. Please verify the Fayda ID and try again."
    );
    assert_eq!(checkout.state(), CheckOutState::IdInput);
}

#[tokio::test]
async fn malformed_fayda_id_is_a_field_error() {
    let (gateway, checkout) = setup();

    let err = checkout.lookup("1234").await.unwrap_err();
    assert_eq!(err.error.field_errors()[0].field, Field::FaydaId);
    assert_eq!(Calls::get(&gateway.calls.find_active), 0);
}

#[tokio::test]
async fn cancel_forgets_the_visit_without_backend_call() {
    let (gateway, checkout) = setup();
    checkout.lookup(FAYDA_ID).await.unwrap();

    checkout.cancel().unwrap();
    assert_eq!(checkout.state(), CheckOutState::IdInput);
    assert_eq!(Calls::get(&gateway.calls.checkout), 0);
}

#[tokio::test]
async fn failed_checkout_stays_on_confirmation() {
    let (gateway, checkout) = setup();
    checkout.lookup(FAYDA_ID).await.unwrap();
    FakeGateway::set(&gateway.fail_checkout);

    let err = checkout.confirm().await.unwrap_err();
    assert_eq!(
        err.banner.unwrap().message,
        "Failed to complete checkout: Internal server error. Please try again."
    );
    assert!(matches!(checkout.state(), CheckOutState::Confirmation { .. }));
}

#[tokio::test]
async fn confirm_outside_confirmation_is_refused() {
    let (gateway, checkout) = setup();

    let err = checkout.confirm().await.unwrap_err();
    assert!(matches!(err.error, Error::InvalidTransition { .. }));
    assert_eq!(Calls::get(&gateway.calls.checkout), 0);
    assert!(!checkout.is_busy());
}

#[tokio::test]
async fn double_confirm_checks_out_once() {
    let (gateway, checkout) = setup();
    checkout.lookup(FAYDA_ID).await.unwrap();
    FakeGateway::set(&gateway.hold);

    let pending = tokio::spawn({
        let checkout = checkout.clone();
        async move { checkout.confirm().await }
    });
    gateway.entered().await;

    let err = checkout.confirm().await.unwrap_err();
    assert!(matches!(err.error, Error::Busy));
    assert!(matches!(checkout.cancel().unwrap_err().error, Error::Busy));

    gateway.release();
    pending.await.unwrap().unwrap();
    assert_eq!(Calls::get(&gateway.calls.checkout), 1);
}

#[tokio::test]
async fn reset_discards_a_late_checkout_result() {
    let (gateway, checkout) = setup();
    checkout.lookup(FAYDA_ID).await.unwrap();
    FakeGateway::set(&gateway.hold);

    let pending = tokio::spawn({
        let checkout = checkout.clone();
        async move { checkout.confirm().await }
    });
    gateway.entered().await;
    checkout.reset();

    gateway.release();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err.error, Error::Superseded));
    assert_eq!(checkout.state(), CheckOutState::IdInput);
}
