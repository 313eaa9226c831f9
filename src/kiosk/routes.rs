use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use super::config::KioskConfig;
use super::error::KioskError;
use super::state::KioskState;
use super::tabs::{Flash, Tabs};
use super::types::HostOption;
use crate::banner::Banner;
use crate::error::FieldError;
use crate::fayda_id::live_feedback;
use crate::gateway::ApiGateway;
use crate::types::HostId;
use crate::verification::CallbackQuery;
use crate::workflow::{CheckInState, CheckOutState, WorkflowError};

const CHECKIN: &str = "/checkin";
const CHECKOUT: &str = "/checkout";

type Navigate = Result<(PrivateCookieJar, Redirect), KioskError>;

/// Create the front-desk kiosk router.
///
/// Every `POST` answers with `303 See Other`: to the identity provider when
/// verification starts, otherwise back to the workflow's view, whose next load
/// carries any banner or field error the action produced.
///
/// Only the two views open a tab. Any other request without a live tab is sent
/// to the view without acting.
pub fn kiosk_routes<G: ApiGateway>(config: KioskConfig, gateway: G) -> Router {
    let state = KioskState {
        gateway: Arc::new(gateway),
        config: Arc::new(config.core),
        tabs: Arc::new(Tabs::new(config.settings.tab_idle, config.settings.max_tabs)),
        settings: config.settings,
    };

    Router::new()
        .route("/hosts", get(hosts::<G>))
        .route(CHECKIN, get(checkin_view::<G>))
        .route("/checkin/fayda-id", post(submit_fayda_id::<G>))
        .route("/checkin/fayda-id/feedback", get(fayda_id_feedback))
        .route("/checkin/qr", get(scan_qr::<G>))
        .route("/checkin/confirm", post(confirm_identity::<G>))
        .route("/checkin/reject", post(reject_identity::<G>))
        .route("/checkin/back", post(back_to_verification::<G>))
        .route("/checkin/visit", post(submit_visit::<G>))
        .route("/checkin/new", post(new_checkin::<G>))
        .route("/checkin/reset", post(reset_checkin::<G>))
        .route(CHECKOUT, get(checkout_view::<G>))
        .route("/checkout/lookup", post(lookup_visit::<G>))
        .route("/checkout/confirm", post(confirm_checkout::<G>))
        .route("/checkout/cancel", post(cancel_checkout::<G>))
        .route("/checkout/new", post(new_checkout::<G>))
        .route("/checkout/reset", post(reset_checkout::<G>))
        .with_state(state)
}

fn settle_and_go<T>(
    jar: PrivateCookieJar,
    flash: &Flash,
    result: Result<T, WorkflowError>,
    to: &str,
) -> Navigate {
    flash.settle(result)?;
    Ok((jar, Redirect::to(to)))
}

// ── Hosts ──────────────────────────────────────────────────────────

async fn hosts<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Result<Response, KioskError> {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok(Redirect::to(CHECKIN).into_response());
    };
    let result = tab.checkin.load_hosts().await;
    let options: Vec<HostOption> = result
        .as_ref()
        .map(|hosts| hosts.iter().map(HostOption::from).collect())
        .unwrap_or_default();
    tab.checkin_flash.settle(result)?;
    Ok(Json(options).into_response())
}

// ── Check-in ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct CheckInView {
    #[serde(flatten)]
    state: CheckInState,
    busy: bool,
    hosts: Vec<HostOption>,
    banners: Vec<Banner>,
    field_errors: Vec<FieldError>,
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl From<CallbackParams> for CallbackQuery {
    fn from(params: CallbackParams) -> Self {
        let present = |v: Option<String>| v.filter(|v| !v.is_empty());
        Self {
            code: present(params.code),
            state: present(params.state),
            error: present(params.error),
            error_description: present(params.error_description),
        }
    }
}

async fn checkin_view<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, KioskError> {
    let (jar, tab) = state.open_tab(jar).await;

    let query = CallbackQuery::from(params);
    if query.is_callback() {
        let result = tab.checkin.resume(&query).await;
        // Reload the page without code/state so a refresh cannot replay them.
        return settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
            .map(IntoResponse::into_response);
    }

    let flash = tab.checkin_flash.take();
    let view = CheckInView {
        state: tab.checkin.state(),
        busy: tab.checkin.is_busy(),
        hosts: tab.checkin.hosts().iter().map(HostOption::from).collect(),
        banners: flash.banners,
        field_errors: flash.field_errors,
    };
    Ok((jar, Json(view)).into_response())
}

#[derive(Deserialize)]
struct FaydaIdForm {
    #[serde(default)]
    fayda_id: String,
}

async fn submit_fayda_id<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
    Form(form): Form<FaydaIdForm>,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.submit_fayda_id(&form.fayda_id).await;
    let target = result
        .as_ref()
        .map_or_else(|_| CHECKIN.to_owned(), |nav| nav.url.to_string());
    settle_and_go(jar, &tab.checkin_flash, result, &target)
}

#[derive(Deserialize)]
struct FeedbackParams {
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
struct FeedbackView {
    cleaned: String,
    valid: bool,
    error: Option<FieldError>,
}

async fn fayda_id_feedback(Query(params): Query<FeedbackParams>) -> Json<FeedbackView> {
    let feedback = live_feedback(&params.value);
    Json(FeedbackView {
        valid: feedback.is_valid(),
        cleaned: feedback.cleaned,
        error: feedback.error,
    })
}

async fn scan_qr<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Response {
    match state.find_tab(&jar) {
        Some(tab) => Json(tab.checkin.scan_qr()).into_response(),
        None => Redirect::to(CHECKIN).into_response(),
    }
}

async fn confirm_identity<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.confirm();
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

async fn reject_identity<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.reject().map(|banner| tab.checkin_flash.push_banners([banner]));
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

async fn back_to_verification<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.back();
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

#[derive(Deserialize)]
struct VisitForm {
    /// Empty when nothing is selected in the dropdown.
    #[serde(default)]
    host_id: String,
    #[serde(default)]
    reason: String,
}

async fn submit_visit<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
    Form(form): Form<VisitForm>,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let host_id = form.host_id.trim().parse::<HostId>().ok();
    let result = tab.checkin.submit_visit(host_id, &form.reason).await;
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

async fn new_checkin<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.new_checkin();
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

async fn reset_checkin<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKIN)));
    };
    let result = tab.checkin.reset();
    settle_and_go(jar, &tab.checkin_flash, result, CHECKIN)
}

// ── Check-out ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct CheckOutView {
    #[serde(flatten)]
    state: CheckOutState,
    busy: bool,
    banners: Vec<Banner>,
    field_errors: Vec<FieldError>,
}

async fn checkout_view<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<CheckOutView>) {
    let (jar, tab) = state.open_tab(jar).await;
    let flash = tab.checkout_flash.take();
    let view = CheckOutView {
        state: tab.checkout.state(),
        busy: tab.checkout.is_busy(),
        banners: flash.banners,
        field_errors: flash.field_errors,
    };
    (jar, Json(view))
}

async fn lookup_visit<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
    Form(form): Form<FaydaIdForm>,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKOUT)));
    };
    let result = tab.checkout.lookup(&form.fayda_id).await;
    settle_and_go(jar, &tab.checkout_flash, result, CHECKOUT)
}

async fn confirm_checkout<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKOUT)));
    };
    let result = tab.checkout.confirm().await;
    settle_and_go(jar, &tab.checkout_flash, result, CHECKOUT)
}

async fn cancel_checkout<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKOUT)));
    };
    let result = tab.checkout.cancel();
    settle_and_go(jar, &tab.checkout_flash, result, CHECKOUT)
}

async fn new_checkout<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKOUT)));
    };
    let result = tab.checkout.new_checkout();
    settle_and_go(jar, &tab.checkout_flash, result, CHECKOUT)
}

async fn reset_checkout<G: ApiGateway>(
    State(state): State<KioskState<G>>,
    jar: PrivateCookieJar,
) -> Navigate {
    let Some(tab) = state.find_tab(&jar) else {
        return Ok((jar, Redirect::to(CHECKOUT)));
    };
    tab.checkout.reset();
    settle_and_go(jar, &tab.checkout_flash, Ok::<_, WorkflowError>(()), CHECKOUT)
}
