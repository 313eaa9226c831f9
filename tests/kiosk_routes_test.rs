//! Integration tests for the kiosk router, driven through `oneshot`.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use common::{AUTH_URL, Calls, FakeGateway, config};
use fayda_visitor::kiosk::{KioskConfig, kiosk_routes};
use serde_json::Value;
use tower::ServiceExt;

/// One operator tab: the router plus whatever tab cookie it was handed.
struct Tab {
    app: Router,
    cookie: Option<String>,
}

impl Tab {
    fn open(gateway: &Arc<FakeGateway>) -> Self {
        let config = KioskConfig::new(config()).with_secure_cookies(false);
        Self {
            app: kiosk_routes(config, gateway.clone()),
            cookie: None,
        }
    }

    /// A second tab on the same kiosk, without a cookie yet.
    fn sibling(&self) -> Self {
        Self {
            app: self.app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, request: axum::http::request::Builder, body: Body) -> Response<Body> {
        let request = match &self.cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        if let Some(set) = response.headers().get(header::SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri), Body::empty()).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(form.to_owned())).await
    }

    async fn view(&mut self, uri: &str) -> Value {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await
    }
}

async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn checkin_through_the_kiosk() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);

    let view = tab.view("/checkin").await;
    assert_eq!(view["step"], "id_input");
    assert_eq!(view["busy"], false);
    assert_eq!(view["hosts"][0]["label"], "Dawit Alemu - Finance");
    assert!(tab.cookie.is_some());

    let response = tab.post("/checkin/fayda-id", "fayda_id=1234+5678+9012").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), AUTH_URL);

    let response = tab.get("/checkin?code=xyz&state=abc").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkin");

    let view = tab.view("/checkin").await;
    assert_eq!(view["step"], "identity_verification");
    assert_eq!(view["identity"]["name"], "Abebe Kebede");

    let response = tab.post("/checkin/confirm", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    tab.post("/checkin/visit", "host_id=1&reason=ok").await;
    let view = tab.view("/checkin").await;
    assert_eq!(view["step"], "visit_details");
    assert_eq!(view["field_errors"][0]["field"], "reason");
    assert_eq!(Calls::get(&gateway.calls.checkin), 0);

    tab.post("/checkin/visit", "host_id=1&reason=Contract+signing")
        .await;
    let view = tab.view("/checkin").await;
    assert_eq!(view["step"], "success");
    assert_eq!(view["field_errors"].as_array().unwrap().len(), 0);
    assert_eq!(Calls::get(&gateway.calls.checkin), 1);

    tab.post("/checkin/new", "").await;
    assert_eq!(tab.view("/checkin").await["step"], "id_input");
}

#[tokio::test]
async fn callback_in_another_tab_is_refused() {
    let gateway = FakeGateway::new();
    let mut first = Tab::open(&gateway);
    first.view("/checkin").await;
    first.post("/checkin/fayda-id", "fayda_id=123456789012").await;

    let mut second = first.sibling();
    let response = second.get("/checkin?code=xyz&state=abc").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let view = second.view("/checkin").await;
    assert_eq!(view["step"], "id_input");
    let banners = view["banners"].as_array().unwrap();
    assert_eq!(banners.len(), 1);
    assert_eq!(banners[0]["kind"], "error");
    assert_eq!(Calls::get(&gateway.calls.exchange), 0);
}

#[tokio::test]
async fn banners_are_shown_once() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);
    tab.view("/checkin").await;

    tab.post("/checkin/fayda-id", "fayda_id=123456789012").await;
    tab.get("/checkin?error=access_denied").await;

    let view = tab.view("/checkin").await;
    assert_eq!(
        view["banners"][0]["message"],
        "Authentication failed: access_denied. Please try again."
    );
    assert!(view["banners"][0]["dismiss_after_ms"].is_number());

    let view = tab.view("/checkin").await;
    assert_eq!(view["banners"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn bad_fayda_id_stays_on_input_with_field_error() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);
    tab.view("/checkin").await;

    let response = tab.post("/checkin/fayda-id", "fayda_id=1234").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkin");

    let view = tab.view("/checkin").await;
    assert_eq!(view["field_errors"][0]["field"], "fayda_id");
    assert_eq!(
        view["field_errors"][0]["message"],
        "Fayda ID must be exactly 12 digits"
    );
    assert_eq!(Calls::get(&gateway.calls.initiate), 0);
}

#[tokio::test]
async fn live_feedback_cleans_input() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);

    let view = tab.view("/checkin/fayda-id/feedback?value=12-34").await;
    assert_eq!(view["cleaned"], "1234");
    assert_eq!(view["valid"], false);
    assert_eq!(view["error"]["message"], "Fayda ID must be exactly 12 digits");

    let view = tab.view("/checkin/fayda-id/feedback?value=").await;
    assert!(view["error"].is_null());
}

#[tokio::test]
async fn checkout_through_the_kiosk() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);
    assert_eq!(tab.view("/checkout").await["step"], "id_input");

    let response = tab.post("/checkout/lookup", "fayda_id=123456789012").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");

    let view = tab.view("/checkout").await;
    assert_eq!(view["step"], "confirmation");
    assert_eq!(view["visit"]["id"], 42);

    tab.post("/checkout/confirm", "").await;
    let view = tab.view("/checkout").await;
    assert_eq!(view["step"], "success");
    assert_eq!(view["duration"], "2h 15m");
}

#[tokio::test]
async fn unreachable_backend_warns_on_first_load() {
    let gateway = FakeGateway::new();
    FakeGateway::set(&gateway.unreachable);
    let mut tab = Tab::open(&gateway);

    let view = tab.view("/checkin").await;
    assert_eq!(view["banners"].as_array().unwrap().len(), 2);
    assert_eq!(view["hosts"].as_array().unwrap().len(), 0);
    assert_eq!(Calls::get(&gateway.calls.test_connection), 1);
}

#[tokio::test]
async fn actions_without_a_tab_only_redirect() {
    let gateway = FakeGateway::new();
    let mut tab = Tab::open(&gateway);

    let response = tab.post("/checkin/fayda-id", "fayda_id=123456789012").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkin");

    let response = tab.post("/checkout/lookup", "fayda_id=123456789012").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");

    let response = tab.get("/hosts").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkin");

    assert!(tab.cookie.is_none());
    assert_eq!(Calls::get(&gateway.calls.initiate), 0);
    assert_eq!(Calls::get(&gateway.calls.find_active), 0);
    assert_eq!(Calls::get(&gateway.calls.test_connection), 0);
}

#[tokio::test]
async fn messages_stay_with_their_workflow() {
    let gateway = FakeGateway::new();
    FakeGateway::set(&gateway.no_active_visit);
    let mut tab = Tab::open(&gateway);
    tab.view("/checkout").await;

    tab.post("/checkout/lookup", "fayda_id=123456789012").await;

    let view = tab.view("/checkin").await;
    assert_eq!(view["banners"].as_array().unwrap().len(), 0);

    let view = tab.view("/checkout").await;
    assert_eq!(view["step"], "id_input");
    assert_eq!(view["banners"].as_array().unwrap().len(), 1);
    assert_eq!(view["banners"][0]["kind"], "error");
}
