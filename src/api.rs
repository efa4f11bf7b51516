//! HTTP surface. Thin: parse, call the engine, render.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::{Admin, AdminKey};
use crate::calendar::{now_ms, parse_date, parse_instant, to_utc};
use crate::engine::{BookingRequest, Engine, EngineError};
use crate::model::{Availability, Booking, BookingConflict, BookingStatus, Locale, Ms, Space, TimeRange, TimeSlot};
use crate::store::BookingFilter;

type AppState = Arc<Engine>;

#[derive(Clone)]
struct ApiState {
    engine: Arc<Engine>,
    admin: AdminKey,
}

impl FromRef<ApiState> for Arc<Engine> {
    fn from_ref(state: &ApiState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<ApiState> for AdminKey {
    fn from_ref(state: &ApiState) -> Self {
        state.admin.clone()
    }
}

/// Listing bookings and confirming them need `admin`; everything else is public.
pub fn router(engine: Arc<Engine>, admin: AdminKey) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/availability/check",
            get(check_availability_query).post(check_availability_body),
        )
        .route("/api/availability/calendar", get(month_calendar))
        .route("/api/availability/slots", get(time_slots))
        .route("/api/spaces", get(list_spaces))
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/{reference}", delete(cancel_booking))
        .route("/api/bookings/{reference}/confirm", post(confirm_booking))
        .with_state(ApiState { engine, admin })
}

// ── Errors ───────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError(EngineError::Validation(format!("Invalid request body: {}", r.body_text())))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError(EngineError::Validation(format!("Invalid query: {}", r.body_text())))
    }
}

fn status_for(e: &EngineError) -> StatusCode {
    match e {
        EngineError::Validation(_)
        | EngineError::InvalidRange
        | EngineError::PastDate
        | EngineError::SpaceUnavailable(_)
        | EngineError::CapacityExceeded(_)
        | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
        EngineError::SpaceNotFound(_) | EngineError::BookingNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Conflict | EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status.is_server_error() {
            error!(code = self.0.code(), "request failed: {}", self.0);
            match &self.0 {
                EngineError::TransientStore(_) => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.0.to_string()
        };
        let body = ErrorBody {
            error: message,
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Wire shapes ──────────────────────────────────────────

fn iso(ms: Ms) -> String {
    to_utc(ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConflictDto {
    id: String,
    start_date: String,
    end_date: String,
    space_name: String,
    customer_name: String,
}

impl From<BookingConflict> for ConflictDto {
    fn from(c: BookingConflict) -> Self {
        Self {
            id: c.id.to_string(),
            start_date: iso(c.range.start),
            end_date: iso(c.range.end),
            space_name: c.space_name,
            customer_name: c.customer_name,
        }
    }
}

#[derive(Serialize)]
struct AvailabilityDto {
    available: bool,
    conflicts: Vec<ConflictDto>,
}

impl From<Availability> for AvailabilityDto {
    fn from(a: Availability) -> Self {
        Self {
            available: a.available,
            conflicts: a.conflicts.into_iter().map(ConflictDto::from).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotDto {
    start_date: String,
    end_date: String,
}

impl From<TimeSlot> for SlotDto {
    fn from(s: TimeSlot) -> Self {
        Self {
            start_date: iso(s.start),
            end_date: iso(s.end),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingDto {
    id: String,
    reference_id: String,
    space_id: String,
    start_date: String,
    end_date: String,
    number_of_people: u32,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    notes: Option<String>,
    total_price: f64,
    status: BookingStatus,
    locale: Locale,
    created_at: String,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.to_string(),
            reference_id: b.reference_id,
            space_id: b.space_id,
            start_date: iso(b.range.start),
            end_date: iso(b.range.end),
            number_of_people: b.number_of_people,
            first_name: b.first_name,
            last_name: b.last_name,
            email: b.email,
            phone: b.phone,
            company: b.company,
            notes: b.notes,
            total_price: b.total_price,
            status: b.status,
            locale: b.locale,
            created_at: iso(b.created_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingSummary {
    id: String,
    reference_id: String,
    start_date: String,
    end_date: String,
    total_price: f64,
    space_name: String,
    status: BookingStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDto {
    success: bool,
    reference_id: String,
    booking: BookingSummary,
}

// ── Handlers ─────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CheckBody {
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckQuery {
    start_date: String,
    end_date: String,
}

fn parse_range(engine: &Engine, start: &str, end: &str) -> Result<TimeRange, EngineError> {
    let tz = engine.timezone();
    let start = parse_instant(start, tz)
        .ok_or_else(|| EngineError::Validation("Invalid startDate".into()))?;
    let end =
        parse_instant(end, tz).ok_or_else(|| EngineError::Validation("Invalid endDate".into()))?;
    TimeRange::try_new(start, end)
}

async fn check_availability_body(
    State(engine): State<AppState>,
    body: Result<Json<CheckBody>, JsonRejection>,
) -> ApiResult<AvailabilityDto> {
    let Json(body) = body?;
    let range = parse_range(&engine, &body.start_date, &body.end_date)?;
    if range.start < now_ms() {
        return Err(EngineError::PastDate.into());
    }
    Ok(Json(engine.check_availability(range).await?.into()))
}

async fn check_availability_query(
    State(engine): State<AppState>,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> ApiResult<AvailabilityDto> {
    let Query(q) = query?;
    let range = parse_range(&engine, &q.start_date, &q.end_date)?;
    Ok(Json(engine.check_availability(range).await?.into()))
}

#[derive(Deserialize)]
struct CalendarQuery {
    year: i32,
    month: u32,
}

#[derive(Serialize)]
struct CalendarDto {
    year: i32,
    month: u32,
    bookings: Vec<ConflictDto>,
}

async fn month_calendar(
    State(engine): State<AppState>,
    query: Result<Query<CalendarQuery>, QueryRejection>,
) -> ApiResult<CalendarDto> {
    let Query(q) = query.map_err(|_| EngineError::Validation("Invalid year or month".into()))?;
    let bookings = engine.bookings_for_month(q.year, q.month).await?;
    Ok(Json(CalendarDto {
        year: q.year,
        month: q.month,
        bookings: bookings.into_iter().map(ConflictDto::from).collect(),
    }))
}

#[derive(Deserialize)]
struct SlotsQuery {
    date: String,
    duration: Option<u32>,
}

#[derive(Serialize)]
struct SlotsDto {
    date: String,
    duration: u32,
    slots: Vec<SlotDto>,
}

async fn time_slots(
    State(engine): State<AppState>,
    query: Result<Query<SlotsQuery>, QueryRejection>,
) -> ApiResult<SlotsDto> {
    let Query(q) = query?;
    let date = parse_date(&q.date).ok_or_else(|| EngineError::Validation("Invalid date".into()))?;
    let duration = q.duration.unwrap_or(2);
    let slots = engine.available_time_slots(date, duration).await?;
    Ok(Json(SlotsDto {
        date: date.to_string(),
        duration,
        slots: slots.into_iter().map(SlotDto::from).collect(),
    }))
}

async fn list_spaces(State(engine): State<AppState>) -> Json<Vec<Space>> {
    Json(engine.spaces())
}

async fn create_booking(
    State(engine): State<AppState>,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> ApiResult<CreatedDto> {
    let Json(req) = body?;
    let booking = engine.create_booking(req).await?;
    let space_name = engine
        .find_space(&booking.space_id)
        .map(|s| s.localized_name(booking.locale).to_string())
        .unwrap_or_else(|| booking.space_id.clone());
    Ok(Json(CreatedDto {
        success: true,
        reference_id: booking.reference_id.clone(),
        booking: BookingSummary {
            id: booking.id.to_string(),
            reference_id: booking.reference_id,
            start_date: iso(booking.range.start),
            end_date: iso(booking.range.end),
            total_price: booking.total_price,
            space_name,
            status: booking.status,
        },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingsQuery {
    from: Option<String>,
    to: Option<String>,
    /// Comma-separated statuses.
    status: Option<String>,
    space_id: Option<String>,
}

fn filter_from_query(engine: &Engine, q: BookingsQuery) -> Result<BookingFilter, EngineError> {
    let within = match (q.from.as_deref(), q.to.as_deref()) {
        (None, None) => None,
        (Some(from), Some(to)) => Some(parse_range(engine, from, to)?),
        _ => {
            return Err(EngineError::Validation(
                "from and to must be given together".into(),
            ));
        }
    };
    let statuses = match q.status.as_deref() {
        None => None,
        Some(list) => Some(
            list.split(',')
                .map(|s| {
                    BookingStatus::parse(s.trim())
                        .ok_or_else(|| EngineError::Validation(format!("Unknown status {s:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(BookingFilter {
        statuses,
        within,
        space_id: q.space_id,
        ended_by: None,
    })
}

async fn list_bookings(
    _: Admin,
    State(engine): State<AppState>,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> ApiResult<Vec<BookingDto>> {
    let Query(q) = query?;
    let filter = filter_from_query(&engine, q)?;
    let bookings = engine.find_bookings(&filter).await?;
    Ok(Json(bookings.into_iter().map(BookingDto::from).collect()))
}

async fn cancel_booking(
    State(engine): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<BookingDto> {
    Ok(Json(engine.cancel_booking(&reference).await?.into()))
}

async fn confirm_booking(
    _: Admin,
    State(engine): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<BookingDto> {
    Ok(Json(engine.confirm_booking(&reference).await?.into()))
}
