use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cine_booking::metrics::{metrics_endpoint, metrics_middleware};
use cine_booking::{
    BookingError, MovieDetails, NewMovie, NewShowing, Payment, ReserveRequest, SeatMap,
    SeatMapMode, Showing, ShowingSummary, TicketChanges, TicketDetails,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::service::BookingService;

pub fn router(service: BookingService) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/:id", get(get_movie))
        .route("/movies/:id/showings", get(list_movie_showings))
        .route("/showings", get(list_showings).post(create_showing))
        .route("/showings/:id", get(get_showing))
        .route("/showings/:id/seats", get(get_seat_map))
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/:id", get(get_ticket).patch(update_ticket))
        .route("/tickets/:id/pay", post(pay_ticket));

    Router::new()
        .nest("/api/v1", api)
        .route("/metrics", get(metrics_endpoint))
        .layer(middleware::from_fn_with_state(
            service.metrics.clone(),
            metrics_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(service)
}

/// Error body returned to clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug)]
pub struct ApiError(BookingError);

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            BookingError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BookingError::SeatConflict { .. } => (StatusCode::CONFLICT, "SEAT_CONFLICT"),
            BookingError::ShowingConflict { .. } => (StatusCode::CONFLICT, "SHOWING_CONFLICT"),
            BookingError::Busy { .. } => (StatusCode::CONFLICT, "BUSY"),
            BookingError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
        };

        let detail = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!(error = %self.0, "Request failed");
            "Internal server error".to_string()
        };
        let field = match &self.0 {
            BookingError::Validation { field, .. } => Some(field.to_string()),
            _ => None,
        };

        let body = ErrorBody {
            code: code.to_string(),
            detail,
            field,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;
type IdPath = std::result::Result<Path<u64>, PathRejection>;

/// Malformed or incomplete JSON is reported as a validation failure.
fn payload<T>(body: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| BookingError::validation("body", rejection.body_text()).into())
}

/// Non-numeric path ids get the same error body as any other bad input.
fn path_id(path: IdPath) -> ApiResult<u64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| BookingError::validation("id", rejection.body_text()).into())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "booking-service"
    }))
}

async fn list_movies(
    State(service): State<BookingService>,
) -> ApiResult<Json<Vec<MovieDetails>>> {
    let movies = service.catalog.list_movies().await?;
    Ok(Json(movies.into_iter().map(MovieDetails::from).collect()))
}

async fn create_movie(
    State(service): State<BookingService>,
    body: std::result::Result<Json<NewMovie>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MovieDetails>)> {
    let movie = service.catalog.create_movie(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(movie.into())))
}

async fn get_movie(
    State(service): State<BookingService>,
    id: IdPath,
) -> ApiResult<Json<MovieDetails>> {
    Ok(Json(service.catalog.get_movie(path_id(id)?).await?.into()))
}

async fn list_movie_showings(
    State(service): State<BookingService>,
    id: IdPath,
) -> ApiResult<Json<Vec<ShowingSummary>>> {
    Ok(Json(service.catalog.list_showings_for_movie(path_id(id)?).await?))
}

async fn list_showings(
    State(service): State<BookingService>,
) -> ApiResult<Json<Vec<ShowingSummary>>> {
    Ok(Json(service.catalog.list_showings().await?))
}

async fn create_showing(
    State(service): State<BookingService>,
    body: std::result::Result<Json<NewShowing>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Showing>)> {
    let showing = service.catalog.create_showing(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(showing)))
}

async fn get_showing(
    State(service): State<BookingService>,
    id: IdPath,
) -> ApiResult<Json<ShowingSummary>> {
    Ok(Json(service.catalog.get_showing(path_id(id)?).await?))
}

#[derive(Debug, Deserialize)]
struct SeatMapQuery {
    include: Option<String>,
}

async fn get_seat_map(
    State(service): State<BookingService>,
    id: IdPath,
    Query(query): Query<SeatMapQuery>,
) -> ApiResult<Json<SeatMap>> {
    let mode = match query.include.as_deref() {
        Some("status") => SeatMapMode::Detailed,
        _ => SeatMapMode::Summary,
    };
    Ok(Json(service.tickets.seat_map(path_id(id)?, mode).await?))
}

async fn list_tickets(
    State(service): State<BookingService>,
) -> ApiResult<Json<Vec<TicketDetails>>> {
    let tickets = service.tickets.list_tickets().await?;
    Ok(Json(tickets.into_iter().map(TicketDetails::from).collect()))
}

async fn create_ticket(
    State(service): State<BookingService>,
    body: std::result::Result<Json<ReserveRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TicketDetails>)> {
    let ticket = service.tickets.reserve(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

async fn get_ticket(
    State(service): State<BookingService>,
    id: IdPath,
) -> ApiResult<Json<TicketDetails>> {
    Ok(Json(service.tickets.get_ticket(path_id(id)?).await?.into()))
}

async fn update_ticket(
    State(service): State<BookingService>,
    id: IdPath,
    body: std::result::Result<Json<TicketChanges>, JsonRejection>,
) -> ApiResult<Json<TicketDetails>> {
    let id = path_id(id)?;
    Ok(Json(service.tickets.update(id, payload(body)?).await?.into()))
}

async fn pay_ticket(
    State(service): State<BookingService>,
    id: IdPath,
) -> ApiResult<Json<TicketDetails>> {
    let Payment { ticket, .. } = service.tickets.pay(path_id(id)?).await?;
    Ok(Json(ticket.into()))
}
