use crate::infra::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use estate_hub::access::Actor;
use estate_hub::error::{AppError, ValidationError};
use estate_hub::listings::{
    ListingFilter, ListingPatch, ListingStatus, ListingSubmission, PageRequest, PropertyType,
    SortOrder, DEFAULT_PAGE_SIZE,
};
use estate_hub::ops::{Operation, OperationOutput};
use estate_hub::users::UserContact;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

pub(crate) const ACTOR_HEADER: &str = "x-actor-id";
pub(crate) const CLIENT_HEADER: &str = "x-client-id";

/// Actor used for unauthenticated reads. No administrator or owner has id 0.
const ANONYMOUS: Actor = Actor::new(0);

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/listings", post(create_listing).get(browse_listings))
        .route(
            "/api/v1/listings/:id",
            patch(update_listing).delete(delete_listing),
        )
        .route("/api/v1/search", get(search_listings))
        .route(
            "/api/v1/moderation/listings/:id/approve",
            post(approve_listing),
        )
        .route("/api/v1/moderation/listings/:id/reject", post(reject_listing))
        .route("/api/v1/users/:id", put(touch_user))
        .route("/api/v1/users/:id/block", post(block_user))
        .route("/api/v1/users/:id/unblock", post(unblock_user))
        .route("/api/v1/users/:id/notifications", get(user_notifications))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BrowseParams {
    pub(crate) status: Option<ListingStatus>,
    pub(crate) property_type: Option<PropertyType>,
    pub(crate) owner_id: Option<u64>,
    pub(crate) location: Option<String>,
    pub(crate) min_price: Option<f64>,
    pub(crate) max_price: Option<f64>,
    pub(crate) min_rooms: Option<u32>,
    #[serde(default)]
    pub(crate) sort: SortOrder,
    pub(crate) page: Option<u32>,
    pub(crate) limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    pub(crate) q: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileBody {
    pub(crate) display_name: String,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) handle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectBody {
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.metrics.render();
    let degraded = state.marketplace.store().degraded_reads();
    body.push_str("# HELP estate_store_degraded_reads_total Table reads that fell back to an empty collection.\n");
    body.push_str("# TYPE estate_store_degraded_reads_total counter\n");
    body.push_str(&format!("estate_store_degraded_reads_total {degraded}\n"));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

pub(crate) async fn create_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<ListingSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let actor = required_actor(&headers)?;
    let output = execute(&state, actor, Operation::ListCreate { submission }).await?;
    Ok((StatusCode::CREATED, Json(output)))
}

/// Anonymous callers only see active listings unless they ask for a status explicitly as an
/// administrator or filter on their own listings.
pub(crate) async fn browse_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<BrowseParams>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = optional_actor(&headers)?;
    let privileged = actor.is_some_and(|actor| {
        state.marketplace.access().is_admin(actor) || params.owner_id == Some(actor.user_id)
    });
    let status = if privileged {
        params.status
    } else {
        Some(ListingStatus::Active)
    };

    let filter = ListingFilter {
        status,
        property_type: params.property_type,
        owner_id: params.owner_id,
        location: params.location,
        min_price: params.min_price,
        max_price: params.max_price,
        min_rooms: params.min_rooms,
    };
    let page = PageRequest::new(
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    let operation = Operation::ListRead {
        filter,
        sort: params.sort,
        page,
    };
    execute(&state, actor.unwrap_or(ANONYMOUS), operation)
        .await
        .map(Json)
}

pub(crate) async fn update_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(patch): Json<ListingPatch>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::ListUpdate { id, patch })
        .await
        .map(Json)
}

pub(crate) async fn delete_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::ListDelete { id })
        .await
        .map(Json)
}

pub(crate) async fn search_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = optional_actor(&headers)?;
    let client = client_identifier(&headers, actor);
    let limit = state.search_limit;

    let check = Operation::RateLimitCheck {
        identifier: client.clone(),
        limit: limit.limit,
        window: limit.window,
    };
    if let OperationOutput::RateLimit(decision) =
        execute(&state, actor.unwrap_or(ANONYMOUS), check).await?
    {
        if !decision.allowed {
            return Err(AppError::RateLimited { identifier: client });
        }
    }

    let operation = Operation::Search {
        query: params.q,
        client,
    };
    execute(&state, actor.unwrap_or(ANONYMOUS), operation)
        .await
        .map(Json)
}

pub(crate) async fn approve_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::ModerationApprove { id })
        .await
        .map(Json)
}

pub(crate) async fn reject_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    let reason = body.and_then(|Json(body)| body.reason);
    execute(&state, actor, Operation::ModerationReject { id, reason })
        .await
        .map(Json)
}

pub(crate) async fn block_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::UserBlock { user_id })
        .await
        .map(Json)
}

pub(crate) async fn unblock_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::UserUnblock { user_id })
        .await
        .map(Json)
}

pub(crate) async fn touch_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(profile): Json<ProfileBody>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    let contact = UserContact {
        id,
        display_name: profile.display_name,
        phone: profile.phone,
        handle: profile.handle,
    };
    execute(&state, actor, Operation::UserTouch { contact })
        .await
        .map(Json)
}

pub(crate) async fn user_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Json<OperationOutput>, AppError> {
    let actor = required_actor(&headers)?;
    execute(&state, actor, Operation::NotificationsFetch { user_id })
        .await
        .map(Json)
}

/// Runs the operation on the blocking pool; the core does synchronous file and network I/O.
async fn execute(
    state: &AppState,
    actor: Actor,
    operation: Operation,
) -> Result<OperationOutput, AppError> {
    let marketplace = Arc::clone(&state.marketplace);
    let name = operation.name();
    let output = tokio::task::spawn_blocking(move || marketplace.execute(actor, operation))
        .await
        .map_err(|err| AppError::Server(axum::Error::new(err)))??;
    debug!(operation = name, actor = actor.user_id, "operation completed");
    Ok(output)
}

fn optional_actor(headers: &HeaderMap) -> Result<Option<Actor>, AppError> {
    let Some(value) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|id| Some(Actor::new(id)))
        .ok_or_else(|| ValidationError::new(ACTOR_HEADER, "must be a numeric user id").into())
}

fn required_actor(headers: &HeaderMap) -> Result<Actor, AppError> {
    optional_actor(headers)?
        .ok_or_else(|| ValidationError::new(ACTOR_HEADER, "header is required").into())
}

fn client_identifier(headers: &HeaderMap, actor: Option<Actor>) -> String {
    headers
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| actor.map(|actor| actor.user_id.to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{ApiMarketplace, TracingNotifier};
    use axum::body::Body;
    use axum::http::Request;
    use estate_hub::access::AccessPolicy;
    use estate_hub::clock::SystemClock;
    use estate_hub::config::RateLimitConfig;
    use estate_hub::moderation::DeadlineNotifier;
    use estate_hub::store::RecordStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tower::ServiceExt;

    const ADMIN: &str = "1";
    const SELLER: &str = "77";

    fn state(search_limit: u32) -> AppState {
        let store = Arc::new(RecordStore::in_memory(Arc::new(SystemClock)));
        let notifier = DeadlineNotifier::new(Arc::new(TracingNotifier), Duration::from_secs(1));
        let marketplace: ApiMarketplace =
            ApiMarketplace::new(store, AccessPolicy::new([1]), Arc::new(notifier));
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            marketplace: Arc::new(marketplace),
            search_limit: RateLimitConfig {
                limit: search_limit,
                window: Duration::from_secs(60),
            },
        }
    }

    fn request(method: &str, uri: &str, actor: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_HEADER, actor);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("request builds")
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn submission() -> Value {
        json!({
            "title": "2 xonali kvartira Chilonzor",
            "description": "Metro yaqinida",
            "price": 64000,
            "location": "Chilonzor",
            "property_type": "kvartira",
            "rooms": 2,
            "area": 54,
            "phone": "+998 90 123 45 67"
        })
    }

    #[tokio::test]
    async fn approved_listing_shows_up_in_search() {
        let state = state(30);
        let (status, created) = send(
            &state,
            request("POST", "/api/v1/listings", Some(SELLER), Some(submission())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_u64().expect("id assigned");

        let (_, before) = send(&state, request("GET", "/api/v1/search?q=kvartira", None, None)).await;
        assert_eq!(before["results"].as_array().map(Vec::len), Some(0));

        let (status, approved) = send(
            &state,
            request(
                "POST",
                &format!("/api/v1/moderation/listings/{id}/approve"),
                Some(ADMIN),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["outcome"], "applied");
        assert_eq!(approved["listing"]["status"], "active");

        let (status, after) = send(&state, request("GET", "/api/v1/search?q=kvartira", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after["results"][0]["listing"]["id"].as_u64(), Some(id));
        assert_eq!(after["facets"]["property_types"]["apartment"], 1);
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let state = state(30);
        let (status, body) =
            send(&state, request("POST", "/api/v1/listings", None, Some(submission()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|msg| msg.contains(ACTOR_HEADER)));

        let (status, _) = send(
            &state,
            request("POST", "/api/v1/listings", Some(SELLER), Some(submission())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &state,
            request("POST", "/api/v1/moderation/listings/1/approve", Some(SELLER), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &state,
            request("POST", "/api/v1/moderation/listings/42/reject", Some(ADMIN), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &state,
            request(
                "POST",
                "/api/v1/moderation/listings/1/reject",
                Some(ADMIN),
                Some(json!({ "reason": "blurry photos" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &state,
            request("POST", "/api/v1/moderation/listings/1/approve", Some(ADMIN), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&state, request("GET", "/api/v1/search?q=%20", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_is_rate_limited_per_client() {
        let state = state(2);
        for _ in 0..2 {
            let mut req = request("GET", "/api/v1/search?q=uy", None, None);
            req.headers_mut()
                .insert(CLIENT_HEADER, "kiosk-7".parse().expect("header value"));
            let (status, _) = send(&state, req).await;
            assert_eq!(status, StatusCode::OK);
        }

        let mut req = request("GET", "/api/v1/search?q=uy", None, None);
        req.headers_mut()
            .insert(CLIENT_HEADER, "kiosk-7".parse().expect("header value"));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().is_some_and(|msg| msg.contains("kiosk-7")));

        let (status, _) = send(&state, request("GET", "/api/v1/search?q=uy", Some(SELLER), None)).await;
        assert_eq!(status, StatusCode::OK, "other clients keep their own budget");
    }

    #[tokio::test]
    async fn browsing_hides_pending_listings_from_strangers() {
        let state = state(30);
        send(
            &state,
            request("POST", "/api/v1/listings", Some(SELLER), Some(submission())),
        )
        .await;

        let (_, public) = send(&state, request("GET", "/api/v1/listings", None, None)).await;
        assert_eq!(public["total"], 0);

        let (_, own) = send(
            &state,
            request("GET", "/api/v1/listings?owner_id=77", Some(SELLER), None),
        )
        .await;
        assert_eq!(own["total"], 1);
        assert_eq!(own["items"][0]["status"], "pending");
    }

    #[tokio::test]
    async fn block_and_notifications_round_trip() {
        let state = state(30);
        let (status, blocked) = send(
            &state,
            request("POST", "/api/v1/users/77/block", Some(ADMIN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(blocked["blocked"], true);
        assert_eq!(blocked["changed"], true);

        let (status, inbox) = send(
            &state,
            request("GET", "/api/v1/users/77/notifications", Some(SELLER), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox[0]["title"], "Account blocked");
        assert_eq!(inbox[0]["type"], "account_blocked");

        let (status, _) = send(
            &state,
            request("GET", "/api/v1/users/77/notifications", Some("5"), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn users_register_their_own_profile() {
        let state = state(30);
        let profile = json!({ "display_name": "Aziz", "handle": "@aziz" });
        let (status, user) = send(
            &state,
            request("PUT", "/api/v1/users/77", Some(SELLER), Some(profile.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["id"], 77);
        assert_eq!(user["handle"], "@aziz");

        let (status, _) = send(
            &state,
            request("PUT", "/api/v1/users/78", Some(SELLER), Some(profile)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn readiness_and_metrics_endpoints() {
        let state = state(30);
        state.readiness.store(false, Ordering::Release);
        let (status, body) = send(&state, request("GET", "/ready", None, None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        let response = router(state.clone())
            .oneshot(request("GET", "/metrics", None, None))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let text = String::from_utf8(bytes.to_vec()).expect("utf-8 metrics");
        assert!(text.contains("estate_store_degraded_reads_total 0"));
    }
}
