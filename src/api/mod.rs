//! HTTP API exposing the dashboard session to presentation layers
//!
//! Every route is a direct call on the session's engine or order board.
//! Confirmation prompts stay in the presentation layer: `GET /conversion/plan`
//! describes the batch, `POST /conversion/execute` submits it.

use crate::config::ApiConfig;
use crate::conversion::{ConversionBatchEngine, ConversionPlan, ConversionSummary};
use crate::domain::{
    ConversionRate, ConversionReceipt, Holder, Order, OrderAction, OrderFilter, OrderStatus,
};
use crate::error::CoreError;
use crate::lifecycle::OrderBoard;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub conversion: Arc<Mutex<ConversionBatchEngine>>,
    pub orders: Arc<OrderBoard>,
    /// Default threshold for `select-eligible`
    pub min_participation: u64,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: ConversionBatchEngine, orders: OrderBoard, min_participation: u64) -> Self {
        Self {
            conversion: Arc::new(Mutex::new(engine)),
            orders: Arc::new(orders),
            min_participation,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/holders", get(get_holders))
        .route("/holders/refresh", post(refresh_holders))
        .route("/conversion/rate", put(set_rate))
        .route("/conversion/toggle", post(toggle_holder))
        .route("/conversion/select-all", post(select_all))
        .route("/conversion/select-eligible", post(select_eligible))
        .route("/conversion/clear", post(clear_selection))
        .route("/conversion/summary", get(get_summary))
        .route("/conversion/plan", get(get_plan))
        .route("/conversion/execute", post(execute_conversion))
        .route("/orders", get(list_orders))
        .route("/orders/refresh", post(refresh_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/actions", get(get_order_actions))
        .route("/orders/:id/transition", post(transition_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

/// Error response carrying the typed failure reason
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::InvalidRate { .. }
            | CoreError::EmptySelection
            | CoreError::MissingReason
            | CoreError::UnknownAction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::IllegalTransition { .. } => StatusCode::CONFLICT,
            CoreError::OrderNotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::BackendRejected(_) => StatusCode::BAD_GATEWAY,
            CoreError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.0.code(),
            message: self.0.to_string(),
            refetch_required: self.0.requires_refetch(),
        };
        (self.status(), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Session overview
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.conversion.lock().await;
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        rate: engine.rate(),
        holders: engine.holders().len(),
        selected: engine.selection().len(),
        can_execute: engine.can_execute(),
        holders_need_refresh: engine.needs_refresh(),
        cached_orders: state.orders.len(),
    })
}

async fn get_holders(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.conversion.lock().await;
    let holders: Vec<HolderView> = engine
        .holders()
        .iter()
        .map(|h| HolderView {
            selected: engine.selection().contains(&h.address),
            holder: h.clone(),
        })
        .collect();
    Json(holders)
}

async fn refresh_holders(State(state): State<AppState>) -> ApiResult<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    engine.refresh_holders().await?;
    Ok(Json(ConversionStateResponse::from_engine(&mut engine)))
}

async fn set_rate(
    State(state): State<AppState>,
    Json(body): Json<RateRequest>,
) -> ApiResult<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    engine.set_rate(body.rate)?;
    Ok(Json(ConversionStateResponse::from_engine(&mut engine)))
}

async fn toggle_holder(
    State(state): State<AppState>,
    Json(body): Json<ToggleRequest>,
) -> Json<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    engine.toggle_holder(&body.address);
    Json(ConversionStateResponse::from_engine(&mut engine))
}

async fn select_all(
    State(state): State<AppState>,
    Json(body): Json<SelectAllRequest>,
) -> Json<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    let addresses = match body.addresses {
        Some(addresses) => addresses,
        None => engine.holders().iter().map(|h| h.address.clone()).collect(),
    };
    engine.select_all(addresses);
    Json(ConversionStateResponse::from_engine(&mut engine))
}

async fn select_eligible(
    State(state): State<AppState>,
    Json(body): Json<SelectEligibleRequest>,
) -> Json<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    engine.select_eligible(body.min_balance.unwrap_or(state.min_participation));
    Json(ConversionStateResponse::from_engine(&mut engine))
}

async fn clear_selection(State(state): State<AppState>) -> Json<ConversionStateResponse> {
    let mut engine = state.conversion.lock().await;
    engine.clear();
    Json(ConversionStateResponse::from_engine(&mut engine))
}

async fn get_summary(State(state): State<AppState>) -> Json<ConversionSummary> {
    let mut engine = state.conversion.lock().await;
    Json(engine.summary().clone())
}

async fn get_plan(State(state): State<AppState>) -> ApiResult<ConversionPlan> {
    let mut engine = state.conversion.lock().await;
    Ok(Json(engine.prepare()?))
}

async fn execute_conversion(State(state): State<AppState>) -> ApiResult<ExecuteResponse> {
    let mut engine = state.conversion.lock().await;
    let receipt = engine.execute().await?;
    Ok(Json(ExecuteResponse {
        receipt,
        holders_need_refresh: engine.needs_refresh(),
    }))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Json<Vec<OrderView>> {
    let orders = state
        .orders
        .list(&query.into_filter())
        .into_iter()
        .map(|o| OrderView::new(&state.orders, o))
        .collect();
    Json(orders)
}

async fn refresh_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<RefreshResponse> {
    let fetched = state.orders.refresh(&query.into_filter()).await?;
    Ok(Json(RefreshResponse { fetched }))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OrderView> {
    let order = match state.orders.get(&id) {
        Some(order) if !state.orders.is_stale(&id) => order,
        _ => state.orders.refresh_order(&id).await?,
    };
    Ok(Json(OrderView::new(&state.orders, order)))
}

async fn get_order_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActionsResponse> {
    let actions = state.orders.actions_for(&id)?;
    let status = state
        .orders
        .get(&id)
        .map(|o| o.status)
        .ok_or_else(|| CoreError::OrderNotFound {
            order_id: id.clone(),
        })?;
    Ok(Json(ActionsResponse {
        status,
        actions: actions.to_vec(),
    }))
}

async fn transition_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<TransitionResponse> {
    let action: OrderAction = body.action.parse()?;
    let status = state
        .orders
        .transition(&id, action, body.reason.as_deref())
        .await?;
    Ok(Json(TransitionResponse { id, status }))
}

// Request types

#[derive(Deserialize)]
struct RateRequest {
    rate: i64,
}

#[derive(Deserialize)]
struct ToggleRequest {
    address: String,
}

#[derive(Deserialize)]
struct SelectAllRequest {
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SelectEligibleRequest {
    #[serde(default)]
    min_balance: Option<u64>,
}

#[derive(Deserialize)]
struct OrderQuery {
    status: Option<OrderStatus>,
    customer: Option<String>,
}

impl OrderQuery {
    fn into_filter(self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            customer_reference: self.customer,
        }
    }
}

#[derive(Deserialize)]
struct TransitionBody {
    action: String,
    #[serde(default)]
    reason: Option<String>,
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    refetch_required: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    rate: ConversionRate,
    holders: usize,
    selected: usize,
    can_execute: bool,
    holders_need_refresh: bool,
    cached_orders: usize,
}

#[derive(Serialize)]
struct HolderView {
    #[serde(flatten)]
    holder: Holder,
    selected: bool,
}

#[derive(Serialize)]
struct ConversionStateResponse {
    rate: ConversionRate,
    selected: Vec<String>,
    can_execute: bool,
    summary: ConversionSummary,
}

impl ConversionStateResponse {
    fn from_engine(engine: &mut ConversionBatchEngine) -> Self {
        Self {
            rate: engine.rate(),
            selected: engine.selection().to_vec(),
            can_execute: engine.can_execute(),
            summary: engine.summary().clone(),
        }
    }
}

#[derive(Serialize)]
struct ExecuteResponse {
    receipt: ConversionReceipt,
    holders_need_refresh: bool,
}

#[derive(Serialize)]
struct RefreshResponse {
    fetched: usize,
}

#[derive(Serialize)]
struct OrderView {
    #[serde(flatten)]
    order: Order,
    actions: Vec<OrderAction>,
    pending: bool,
    stale: bool,
}

impl OrderView {
    fn new(board: &OrderBoard, order: Order) -> Self {
        Self {
            actions: crate::lifecycle::legal_actions(order.status).to_vec(),
            pending: board.is_pending(&order.id),
            stale: board.is_stale(&order.id),
            order,
        }
    }
}

#[derive(Serialize)]
struct ActionsResponse {
    status: OrderStatus,
    actions: Vec<OrderAction>,
}

#[derive(Serialize)]
struct TransitionResponse {
    id: String,
    status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::domain::{IssuedAmount, LineItem};

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn pending_order(id: &str) -> Order {
        Order {
            id: id.into(),
            customer_reference: "wallet1".into(),
            line_items: vec![LineItem {
                menu_item_id: "m1".into(),
                quantity: 1,
                unit_price_subunits: 1200,
            }],
            total_subunits: 1200,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            confirmed_at: None,
            cancellation_reason: None,
        }
    }

    fn app(mock: MockBackend) -> Router {
        let backend: Arc<dyn crate::backend::Backend> = Arc::new(mock);
        let mut engine = ConversionBatchEngine::new(
            backend.clone(),
            ConversionRate::new(10).unwrap(),
            Duration::from_secs(1),
        );
        engine.replace_holders(vec![Holder::new("A", 100), Holder::new("B", 250)]);
        let board = OrderBoard::new(backend, Duration::from_secs(1));
        board.insert(pending_order("o1"));
        router(AppState::new(engine, board, 1))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(app(MockBackend::new()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_invalid_rate_is_unprocessable() {
        let (status, body) = call(
            app(MockBackend::new()),
            Method::PUT,
            "/conversion/rate",
            Some(json!({ "rate": 1001 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "invalid_rate");
        assert_eq!(body["refetch_required"], false);
    }

    #[tokio::test]
    async fn test_select_all_returns_summary() {
        let (status, body) = call(
            app(MockBackend::new()),
            Method::POST,
            "/conversion/select-all",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected"], json!(["A", "B"]));
        assert_eq!(body["summary"]["total_utility_spent"], 350);
        assert_eq!(body["summary"]["total_security_issued"], 35);
        assert_eq!(body["can_execute"], true);
    }

    #[tokio::test]
    async fn test_plan_and_execute_with_empty_selection() {
        let mut mock = MockBackend::new();
        mock.expect_execute_conversion().never();
        let app = app(mock);

        let (status, body) = call(app.clone(), Method::GET, "/conversion/plan", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "empty_selection");

        let (status, _) = call(app, Method::POST, "/conversion/execute", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_execute_returns_receipt() {
        let mut mock = MockBackend::new();
        mock.expect_execute_conversion().times(1).returning(|req| {
            Ok(ConversionReceipt {
                batch_id: req.request_id,
                rate: req.rate,
                issued: vec![IssuedAmount {
                    address: "B".into(),
                    utility_spent: 250,
                    security_issued: 25,
                }],
                executed_at: Utc::now(),
            })
        });
        let app = app(mock);

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/conversion/toggle",
            Some(json!({ "address": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app.clone(), Method::POST, "/conversion/execute", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["issued"][0]["security_issued"], 25);
        assert_eq!(body["holders_need_refresh"], true);

        let (_, status_body) = call(app, Method::GET, "/status", None).await;
        assert_eq!(status_body["selected"], 0);
    }

    #[tokio::test]
    async fn test_order_actions_and_transition_errors() {
        let mut mock = MockBackend::new();
        mock.expect_transition_order().never();
        let app = app(mock);

        let (status, body) = call(app.clone(), Method::GET, "/orders/o1/actions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["actions"], json!(["confirm", "cancel"]));

        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/orders/o1/transition",
            Some(json!({ "action": "startCooking" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "illegal_transition");

        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/orders/o1/transition",
            Some(json!({ "action": "cancel", "reason": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "missing_reason");

        let (status, body) = call(
            app,
            Method::POST,
            "/orders/o1/transition",
            Some(json!({ "action": "teleport" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "unknown_action");
    }

    #[tokio::test]
    async fn test_backend_rejection_maps_to_bad_gateway() {
        let mut mock = MockBackend::new();
        mock.expect_transition_order()
            .times(1)
            .returning(|_| Err(CoreError::BackendRejected("modified concurrently".into())));
        let app = app(mock);

        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/orders/o1/transition",
            Some(json!({ "action": "confirm" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["refetch_required"], true);
        assert_eq!(body["message"], "Backend rejected request: modified concurrently");

        let (_, orders) = call(app, Method::GET, "/orders?status=pending", None).await;
        assert_eq!(orders[0]["id"], "o1");
        assert_eq!(orders[0]["stale"], true);
        assert_eq!(orders[0]["status"], "pending");
    }
}
