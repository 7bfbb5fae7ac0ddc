//! REST API for the orientation optimizer.
//!
//! Exposes the optimizer, the fleet comparison, insert design and box
//! recommendations over HTTP. Uses Axum as the web framework and supports
//! CORS.

use std::convert::Infallible;
use std::sync::OnceLock;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::fleet::{
    FleetReport, FleetSummary, compare_containers, compare_containers_with_progress,
    default_truck_catalog,
};
use crate::insert::{InsertLayout, InsertOutcome, design_insert};
use crate::model::{DimensionedBox, ItemAxis, Orientation, OrientationConstraint, ValidationError};
use crate::optimizer::{FitResult, NoFitReason, OptimizationResult, OptimizeEvent, OptimizeOutcome, PackingConfig};
use crate::recommend::{
    BoxProposal, Fragility, OrientationAnalysis, PartProfile, RecommendationClient,
};

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
    recommender: RecommendationClient,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>packfit API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({ url: "/docs/openapi.json", dom_id: "#swagger-ui" });
            };
        </script>
    </body>
</html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Orientation constraint as accepted on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrientationRequest {
    #[default]
    Any,
    Fixed,
    LengthVertical,
    WidthVertical,
    HeightVertical,
}

impl From<OrientationRequest> for OrientationConstraint {
    fn from(request: OrientationRequest) -> Self {
        match request {
            OrientationRequest::Any => OrientationConstraint::Any,
            OrientationRequest::Fixed => OrientationConstraint::Fixed,
            OrientationRequest::LengthVertical => OrientationConstraint::Vertical(ItemAxis::Length),
            OrientationRequest::WidthVertical => OrientationConstraint::Vertical(ItemAxis::Width),
            OrientationRequest::HeightVertical => OrientationConstraint::Vertical(ItemAxis::Height),
        }
    }
}

/// Request structure for the optimize endpoints.
///
/// Without `containers` the built-in truck catalog is used.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "item": { "label": "Outer Box", "length": 1100.0, "width": 900.0, "height": 460.0, "weight": 18.0 },
        "apply_payload_restriction": true,
        "quantity": 500
    })
)]
pub struct OptimizeRequest {
    pub item: DimensionedBox,
    #[serde(default)]
    pub containers: Vec<DimensionedBox>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub apply_payload_restriction: Option<bool>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub quantity: Option<u64>,
    #[serde(default)]
    pub orientation: OrientationRequest,
}

#[derive(Debug)]
struct ValidatedOptimizeRequest {
    item: DimensionedBox,
    containers: Vec<DimensionedBox>,
    apply_payload_restriction: bool,
    quantity: u64,
    config: PackingConfig,
}

impl OptimizeRequest {
    fn into_validated(
        self,
        defaults: &OptimizerConfig,
    ) -> Result<ValidatedOptimizeRequest, ValidationError> {
        self.item.validate()?;
        let containers = if self.containers.is_empty() {
            default_truck_catalog()
        } else {
            self.containers
        };
        for container in &containers {
            container.validate()?;
        }

        let config = PackingConfig {
            orientation: self.orientation.into(),
            ..defaults.packing_config()
        };

        Ok(ValidatedOptimizeRequest {
            item: self.item,
            containers,
            apply_payload_restriction: self
                .apply_payload_restriction
                .unwrap_or(defaults.apply_payload_restriction()),
            quantity: self.quantity.unwrap_or(defaults.default_quantity()),
            config,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Fitted,
    NoFit,
}

/// Verdict for one candidate container.
#[derive(Serialize, ToSchema)]
pub struct ContainerReport {
    pub index: usize,
    pub label: String,
    pub status: FitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OptimizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers_required: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response structure of the optimize endpoint.
#[derive(Serialize, ToSchema)]
pub struct OptimizeResponse {
    pub quantity: u64,
    pub apply_payload_restriction: bool,
    pub containers: Vec<ContainerReport>,
    /// Index of the recommended container, absent when nothing fits
    pub best_index: Option<usize>,
    pub summary: FleetSummary,
}

impl OptimizeResponse {
    fn from_report(report: FleetReport, quantity: u64, apply_payload_restriction: bool) -> Self {
        let summary = FleetSummary::from(&report);
        let FleetReport { evaluations, best } = report;

        let containers = evaluations
            .into_iter()
            .enumerate()
            .map(|(index, evaluation)| match evaluation.outcome {
                OptimizeOutcome::Fitted(result) => ContainerReport {
                    index,
                    label: result.container.display_name(),
                    status: FitStatus::Fitted,
                    result: Some(result),
                    containers_required: evaluation.containers_required,
                    reason_code: None,
                    message: None,
                },
                OptimizeOutcome::NoFit(no_fit) => ContainerReport {
                    index,
                    label: no_fit.container.display_name(),
                    status: FitStatus::NoFit,
                    result: None,
                    containers_required: None,
                    reason_code: Some(no_fit.reason.code().to_string()),
                    message: Some(no_fit.to_string()),
                },
            })
            .collect();

        Self {
            quantity,
            apply_payload_restriction,
            containers,
            best_index: best,
            summary,
        }
    }
}

/// Request structure for the insert endpoint.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "part": { "length": 450.0, "width": 300.0, "height": 220.0, "weight": 18.0 },
        "outer_box": { "length": 1120.0, "width": 920.0, "height": 580.0 },
        "standing": "height"
    })
)]
pub struct InsertRequest {
    pub part: DimensionedBox,
    pub outer_box: DimensionedBox,
    #[serde(default = "default_standing")]
    pub standing: ItemAxis,
}

fn default_standing() -> ItemAxis {
    ItemAxis::Height
}

#[derive(Serialize, ToSchema)]
pub struct InsertResponse {
    pub status: FitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<InsertLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<InsertOutcome> for InsertResponse {
    fn from(outcome: InsertOutcome) -> Self {
        match outcome {
            InsertOutcome::Designed(layout) => Self {
                status: FitStatus::Fitted,
                layout: Some(layout),
                reason_code: None,
                message: None,
            },
            InsertOutcome::NoFit(no_fit) => Self {
                status: FitStatus::NoFit,
                layout: None,
                reason_code: Some(no_fit.reason.code().to_string()),
                message: Some(no_fit.to_string()),
            },
        }
    }
}

/// One streamed optimizer event together with the container it belongs to.
#[derive(Serialize)]
struct StreamEnvelope<'a> {
    container_index: usize,
    container: &'a str,
    #[serde(flatten)]
    event: &'a OptimizeEvent,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum StreamVerdict {
    ComparisonFinished {
        best_index: Option<usize>,
        summary: FleetSummary,
    },
    Error {
        details: String,
    },
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn internal_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Optimization failed",
        details,
    )
}

fn parse_optimize_request(
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
    defaults: &OptimizerConfig,
) -> Result<ValidatedOptimizeRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload
        .into_validated(defaults)
        .map_err(|err| validation_error(err.to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_optimize,
        handle_optimize_stream,
        handle_insert_matrix,
        handle_recommend,
        handle_analyze_orientations,
        handle_trucks
    ),
    components(
        schemas(
            OptimizeRequest,
            OrientationRequest,
            OptimizeResponse,
            ContainerReport,
            FitStatus,
            FleetSummary,
            OptimizationResult,
            FitResult,
            Orientation,
            DimensionedBox,
            NoFitReason,
            InsertRequest,
            InsertResponse,
            InsertLayout,
            ItemAxis,
            PartProfile,
            Fragility,
            BoxProposal,
            OrientationAnalysis,
            ErrorResponse
        )
    ),
    tags(
        (name = "optimizer", description = "Orientation search and container comparison"),
        (name = "packaging", description = "Insert design and box recommendations")
    )
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/optimize", post(handle_optimize))
        .route("/optimize_stream", post(handle_optimize_stream))
        .route("/insert_matrix", post(handle_insert_matrix))
        .route("/recommend", post(handle_recommend))
        .route("/analyze_orientations", post(handle_analyze_orientations))
        .route("/trucks", get(handle_trucks))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server terminates.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer_config: OptimizerConfig,
    recommender: RecommendationClient,
) -> std::io::Result<()> {
    let app = router(ApiState {
        optimizer_config,
        recommender,
    });

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("local access: http://localhost:{}", config.port());
    }
    info!("endpoints: POST /optimize, POST /optimize_stream, POST /insert_matrix, POST /recommend, POST /analyze_orientations, GET /trucks");
    info!("documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /optimize endpoint.
///
/// Finds the best orientation of the item in every container and recommends
/// the container with the highest volume utilization.
#[utoipa::path(
    post,
    path = "/optimize",
    request_body = OptimizeRequest,
    responses(
        (status = 200, description = "Per-container verdicts and the recommendation", body = OptimizeResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid item or container",
            body = ErrorResponse
        )
    ),
    tag = "optimizer"
)]
async fn handle_optimize(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_optimize_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        item = %request.item.display_name(),
        containers = request.containers.len(),
        quantity = request.quantity,
        "optimize request"
    );

    let ValidatedOptimizeRequest {
        item,
        containers,
        apply_payload_restriction,
        quantity,
        config,
    } = request;

    let joined = tokio::task::spawn_blocking(move || {
        compare_containers(&item, &containers, apply_payload_restriction, quantity, config)
    })
    .await;

    match joined {
        Ok(Ok(report)) => {
            let response = OptimizeResponse::from_report(report, quantity, apply_payload_restriction);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(err)) => validation_error(err.to_string()),
        Err(err) => {
            error!(error = %err, "optimization task failed");
            internal_error(err.to_string())
        }
    }
}

/// Handler for POST /optimize_stream endpoint (SSE).
///
/// Streams every evaluated orientation per container, then the overall
/// verdict, as Server-Sent Events.
#[utoipa::path(
    post,
    path = "/optimize_stream",
    request_body = OptimizeRequest,
    responses(
        (
            status = 200,
            description = "Streams optimizer events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid item or container",
            body = ErrorResponse
        )
    ),
    tag = "optimizer"
)]
async fn handle_optimize_stream(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_optimize_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let ValidatedOptimizeRequest {
            item,
            containers,
            apply_payload_restriction,
            quantity,
            config,
        } = request;
        let labels: Vec<String> = containers.iter().map(DimensionedBox::display_name).collect();

        let result = compare_containers_with_progress(
            &item,
            &containers,
            apply_payload_restriction,
            quantity,
            config,
            |container_index, event| {
                let envelope = StreamEnvelope {
                    container_index,
                    container: &labels[container_index],
                    event,
                };
                if let Ok(json) = serde_json::to_string(&envelope) {
                    // A closed receiver only means the client went away.
                    let _ = tx.blocking_send(json);
                }
            },
        );

        let verdict = match result {
            Ok(report) => StreamVerdict::ComparisonFinished {
                best_index: report.best,
                summary: FleetSummary::from(&report),
            },
            Err(err) => StreamVerdict::Error {
                details: err.to_string(),
            },
        };
        if let Ok(json) = serde_json::to_string(&verdict) {
            let _ = tx.blocking_send(json);
        }
    });

    let stream = ReceiverStream::new(rx).map(|msg| Ok::<_, Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /insert_matrix endpoint.
///
/// Lays out insert trays for a part standing on the given axis.
#[utoipa::path(
    post,
    path = "/insert_matrix",
    request_body = InsertRequest,
    responses(
        (status = 200, description = "Insert layout or no-fit verdict", body = InsertResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid part or outer box",
            body = ErrorResponse
        )
    ),
    tag = "packaging"
)]
async fn handle_insert_matrix(
    State(state): State<ApiState>,
    payload: Result<Json<InsertRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    match design_insert(
        &request.part,
        &request.outer_box,
        request.standing,
        state.optimizer_config.packing_config(),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(InsertResponse::from(outcome))).into_response(),
        Err(err) => validation_error(err.to_string()),
    }
}

/// Handler for POST /recommend endpoint.
///
/// Asks the recommendation service for an outer box. Falls back to a
/// static proposal when the service is unavailable.
#[utoipa::path(
    post,
    path = "/recommend",
    request_body = PartProfile,
    responses(
        (status = 200, description = "Proposed outer box", body = BoxProposal),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid part profile",
            body = ErrorResponse
        )
    ),
    tag = "packaging"
)]
async fn handle_recommend(
    State(state): State<ApiState>,
    payload: Result<Json<PartProfile>, JsonRejection>,
) -> Response {
    let Json(profile) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if let Err(err) = profile.validate() {
        return validation_error(err.to_string());
    }

    let proposal = state.recommender.recommend_box(&profile).await;
    (StatusCode::OK, Json(proposal)).into_response()
}

/// Handler for POST /analyze_orientations endpoint.
///
/// Asks the recommendation service which standing axes suit an insert tray.
/// Every axis is allowed when the service is unavailable.
#[utoipa::path(
    post,
    path = "/analyze_orientations",
    request_body = PartProfile,
    responses(
        (status = 200, description = "Feasible standing axes", body = OrientationAnalysis),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid part profile",
            body = ErrorResponse
        )
    ),
    tag = "packaging"
)]
async fn handle_analyze_orientations(
    State(state): State<ApiState>,
    payload: Result<Json<PartProfile>, JsonRejection>,
) -> Response {
    let Json(profile) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if let Err(err) = profile.validate() {
        return validation_error(err.to_string());
    }

    let analysis = state.recommender.analyze_orientations(&profile).await;
    (StatusCode::OK, Json(analysis)).into_response()
}

/// Handler for GET /trucks endpoint.
#[utoipa::path(
    get,
    path = "/trucks",
    responses(
        (status = 200, description = "Built-in truck catalog", body = [DimensionedBox])
    ),
    tag = "optimizer"
)]
async fn handle_trucks() -> Json<Vec<DimensionedBox>> {
    Json(default_truck_catalog())
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
