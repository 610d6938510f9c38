use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use box_office::metrics::{is_server_fault, Metrics};
use box_office::shutdown::{listen_for_signals, ShutdownCoordinator, StoreShutdown};
use box_office::{
    BoxOffice, BoxOfficeError, BuyerInfo, CurrentUser, ErrorKind, Role, ServiceConfig,
    StoreBackendKind, TicketStore,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Instant};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

mod service;

use service::TicketService;

#[derive(Parser, Debug)]
#[command(name = "ticket-service")]
#[command(about = "Box office REST API: showtimes, seats, orders and refunds")]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Extra properties merged over the config file
    #[arg(long = "override-config")]
    override_config: Option<PathBuf>,

    /// State directory for the RocksDB store
    #[arg(short = 'd', long = "state-dir")]
    state_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MovieRequest {
    movie_id: Option<String>,
    title: String,
    duration_minutes: u32,
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TheaterRequest {
    theater_id: Option<String>,
    name: String,
    row_count: u32,
    col_count: u32,
    #[serde(default)]
    equipment: Vec<String>,
    #[serde(default)]
    vip_rows: Vec<u32>,
    #[serde(default)]
    couple_rows: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShowtimeRequest {
    movie_id: String,
    theater_id: String,
    start_time: String,
    end_time: String,
    prices: std::collections::BTreeMap<String, i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShowtimeQuery {
    movie_id: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderRequest {
    showtime_id: String,
    seats: Vec<String>,
    ticket_type: String,
    #[serde(default)]
    buyer: Option<BuyerInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefundRequest {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct SeatQuery {
    selected: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceQuery {
    ticket_type: String,
    seats: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RefundResponse {
    success: bool,
    message: String,
    refund_amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Box office failure rendered with a status code matching its kind.
struct ApiError(BoxOfficeError);

impl From<BoxOfficeError> for ApiError {
    fn from(error: BoxOfficeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::TransientIo => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if is_server_fault(kind) {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Identity forwarded by the upstream auth layer.
struct Caller(Option<CurrentUser>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let Some(id) = header("x-user-id") else {
            return Ok(Caller(None));
        };
        let role = match header("x-user-role") {
            Some(value) => Role::parse(&value).ok_or_else(|| {
                BoxOfficeError::InvalidArgument(format!("Unknown role: {}", value))
            })?,
            None => Role::Customer,
        };

        Ok(Caller(Some(CurrentUser {
            id,
            name: header("x-user-name").unwrap_or_default(),
            email: header("x-user-email").unwrap_or_default(),
            role,
        })))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting Ticket Service on port {}", config.http_port);
    info!("Store backend: {}", config.store_backend);

    let store = open_store(&config)?;
    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    let box_office = BoxOffice::with_system_clock(store.clone());
    let ticket_service = TicketService::new(box_office, config.booking.clone(), Arc::clone(&metrics));

    let shutdown = ShutdownCoordinator::default();
    shutdown
        .register_component(Box::new(StoreShutdown::new(store)))
        .await;
    listen_for_signals(shutdown.clone());

    let app = router(ticket_service, metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("Ticket Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
        .await
        .context("HTTP server failed")?;

    shutdown.shutdown().await.context("graceful shutdown failed")?;
    Ok(())
}

fn router(ticket_service: TicketService, metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/api/movies", get(list_movies))
        .route("/api/admin/movies", post(create_movie))
        .route("/api/admin/theaters", post(create_theater))
        .route("/api/admin/showtimes", post(schedule_showtime))
        .route("/api/showtimes", get(list_showtimes))
        .route("/api/showtimes/:showtime_id", get(get_showtime))
        .route("/api/showtimes/:showtime_id/seats", get(get_seat_grid))
        .route("/api/showtimes/:showtime_id/price", get(get_price))
        .route("/api/showtimes/:showtime_id/orders", get(list_showtime_orders))
        .route("/api/orders", get(list_my_orders).post(create_order))
        .route("/api/checkout", post(checkout))
        .route("/api/orders/:order_id", get(get_order))
        .route("/api/orders/:order_id/pay", post(confirm_payment))
        .route("/api/orders/:order_id/check-in", post(check_in))
        .route("/api/orders/:order_id/cancel", post(cancel_order))
        .route("/api/orders/:order_id/refund", post(refund_order))
        .route("/api/operations", get(list_operations))
        .route("/metrics", get(metrics_endpoint))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(metrics, track_requests)),
        )
        .with_state(ticket_service)
}

async fn track_requests(State(metrics): State<Arc<Metrics>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics.record_request(start.elapsed(), !response.status().is_server_error());
    response
}

async fn list_movies(State(service): State<TicketService>) -> ApiResult<Vec<box_office::Movie>> {
    Ok(ApiResponse::success(service.list_movies().await?))
}

async fn create_movie(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Json(request): Json<MovieRequest>,
) -> ApiResult<box_office::Movie> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.create_movie(&ctx, request)?))
}

async fn create_theater(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Json(request): Json<TheaterRequest>,
) -> ApiResult<box_office::Theater> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.create_theater(&ctx, request)?))
}

async fn schedule_showtime(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Json(request): Json<ShowtimeRequest>,
) -> ApiResult<box_office::Showtime> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.schedule_showtime(&ctx, request).await?))
}

async fn list_showtimes(
    State(service): State<TicketService>,
    Query(query): Query<ShowtimeQuery>,
) -> ApiResult<Vec<box_office::Showtime>> {
    Ok(ApiResponse::success(service.list_showtimes(query).await?))
}

async fn get_showtime(
    State(service): State<TicketService>,
    Path(showtime_id): Path<String>,
) -> ApiResult<box_office::Showtime> {
    Ok(ApiResponse::success(service.get_showtime(&showtime_id).await?))
}

async fn get_seat_grid(
    State(service): State<TicketService>,
    Path(showtime_id): Path<String>,
    Query(query): Query<SeatQuery>,
) -> ApiResult<box_office::SeatGrid> {
    let selected: Vec<String> = query
        .selected
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    Ok(ApiResponse::success(service.seat_grid(&showtime_id, &selected).await?))
}

async fn get_price(
    State(service): State<TicketService>,
    Path(showtime_id): Path<String>,
    Query(query): Query<PriceQuery>,
) -> ApiResult<box_office::pricing::PriceQuote> {
    let seats = query.seats.unwrap_or(1);
    Ok(ApiResponse::success(
        service.quote(&showtime_id, &query.ticket_type, seats).await?,
    ))
}

async fn list_showtime_orders(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(showtime_id): Path<String>,
) -> ApiResult<Vec<box_office::Order>> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.list_showtime_orders(&ctx, &showtime_id).await?))
}

async fn list_my_orders(State(service): State<TicketService>, Caller(user): Caller) -> ApiResult<Vec<box_office::Order>> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.list_my_orders(&ctx).await?))
}

async fn create_order(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Json(request): Json<OrderRequest>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.create_order(&ctx, request).await?))
}

async fn checkout(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Json(request): Json<OrderRequest>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.checkout(&ctx, request).await?))
}

async fn get_order(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.get_order(&ctx, &order_id).await?))
}

async fn confirm_payment(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.confirm_payment(&ctx, &order_id).await?))
}

async fn check_in(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.check_in(&ctx, &order_id).await?))
}

async fn cancel_order(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<box_office::Order> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.cancel_order(&ctx, &order_id).await?))
}

async fn refund_order(
    State(service): State<TicketService>,
    Caller(user): Caller,
    Path(order_id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> ApiResult<RefundResponse> {
    let ctx = service.context(user);
    let receipt = service.refund(&ctx, &order_id, &request.reason).await?;
    Ok(ApiResponse::success(RefundResponse {
        success: receipt.success,
        message: receipt.message,
        refund_amount: receipt.refund_amount,
    }))
}

async fn list_operations(
    State(service): State<TicketService>,
    Caller(user): Caller,
) -> ApiResult<Vec<box_office::StaffOperation>> {
    let ctx = service.context(user);
    Ok(ApiResponse::success(service.list_operations(&ctx).await?))
}

async fn metrics_endpoint(State(service): State<TicketService>) -> Result<String, ApiError> {
    Ok(service.metrics().export()?)
}

async fn health_check() -> Json<ApiResponse<String>> {
    ApiResponse::success("OK".to_string())
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {:?}", path);
            box_office::parse_properties_file(path, "ticket-service")
                .with_context(|| format!("failed to load {:?}", path))?
        }
        None => ServiceConfig {
            application_id: "ticket-service".to_string(),
            ..ServiceConfig::default()
        },
    };

    if let Some(path) = &args.override_config {
        info!("Loading override config from: {:?}", path);
        config = box_office::merge_properties(config, path)
            .with_context(|| format!("failed to merge {:?}", path))?;
    }

    let mut config = config
        .apply_env_overrides()
        .context("invalid BOX_OFFICE_* environment override")?;

    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(state_dir) = &args.state_dir {
        config.state_dir = state_dir.to_string_lossy().to_string();
    }
    Ok(config)
}

fn open_store(config: &ServiceConfig) -> anyhow::Result<TicketStore> {
    match config.store_backend {
        StoreBackendKind::Memory => Ok(TicketStore::in_memory()),
        #[cfg(feature = "rocksdb")]
        StoreBackendKind::Rocksdb => {
            let path = std::path::Path::new(&config.state_dir).join("box-office");
            std::fs::create_dir_all(&path)
                .with_context(|| format!("failed to create {:?}", path))?;
            let backend = box_office::StateStoreBackend::new_rocksdb(&path)
                .with_context(|| format!("failed to open RocksDB at {:?}", path))?;
            Ok(TicketStore::new(backend))
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreBackendKind::Rocksdb => {
            anyhow::bail!("store.backend=rocksdb requires building with the `rocksdb` feature")
        }
    }
}
