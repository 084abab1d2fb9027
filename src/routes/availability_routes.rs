use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{auth_context::AuthContext, json_body::JsonBody},
    models::{AppState, AvailabilityFilter, AvailabilityListRow, AvailabilityRow, Envelope, Role},
    repo::RepoError,
    schedule::{self, ScheduleEntry},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_availability).post(set_availability))
        .route("/bulk", post(bulk_set_availability))
        .route("/doctor/{doctor_id}", get(doctor_availability))
        .route(
            "/{id}",
            get(get_availability)
                .put(update_availability)
                .delete(delete_availability),
        )
}

fn ensure_scheduler(auth: &AuthContext) -> Result<(), ApiError> {
    auth.require_role(&[Role::Admin, Role::Doctor], "manage availability")
}

fn availability_not_found() -> ApiError {
    ApiError::not_found("Availability record not found")
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityListQuery {
    pub doctor_id: Option<i64>,
    pub day_of_week: Option<String>,
}

pub async fn list_availability(
    State(state): State<AppState>,
    Query(q): Query<AvailabilityListQuery>,
) -> Result<Json<Envelope<Vec<AvailabilityListRow>>>, ApiError> {
    let filter = AvailabilityFilter {
        doctor_id: q.doctor_id,
        day_of_week: q
            .day_of_week
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(schedule::parse_day)
            .transpose()?,
    };

    let rows = state.availability.list(&filter).await?;
    Ok(Json(Envelope::list(rows)))
}

pub async fn doctor_availability(
    State(state): State<AppState>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Envelope<Vec<AvailabilityRow>>>, ApiError> {
    if !state.doctors.exists(doctor_id).await? {
        return Err(schedule::doctor_not_found());
    }

    let rows = state.availability.list_for_doctor(doctor_id).await?;
    Ok(Json(Envelope::list(rows)))
}

pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<AvailabilityRow>>, ApiError> {
    let row = state
        .availability
        .find(id)
        .await?
        .ok_or_else(availability_not_found)?;
    Ok(Json(Envelope::data(row)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SetAvailabilityRequest {
    pub doctor_id: Option<i64>,
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
}

pub async fn set_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<SetAvailabilityRequest>,
) -> Result<(StatusCode, Json<Envelope<AvailabilityRow>>), ApiError> {
    ensure_scheduler(&auth)?;

    let (Some(doctor_id), Some(day), Some(start), Some(end)) = (
        req.doctor_id,
        req.day_of_week.as_deref().filter(|s| !s.is_empty()),
        req.start_time.as_deref().filter(|s| !s.is_empty()),
        req.end_time.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::validation(
            "Doctor ID, day of week, start time, and end time are required",
        ));
    };

    let day = schedule::parse_day(day)?;
    let window = schedule::parse_window(start, end, req.is_available)?;

    let upserted = schedule::set_availability(
        state.doctors.as_ref(),
        state.availability.as_ref(),
        doctor_id,
        day,
        &window,
    )
    .await?;

    let (status, message) = if upserted.created {
        (StatusCode::CREATED, "Availability created successfully")
    } else {
        (StatusCode::OK, "Availability updated successfully")
    };
    Ok((status, Json(Envelope::data(upserted.row).with_message(message))))
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkScheduleRequest {
    pub doctor_id: Option<i64>,
    pub schedule: Option<serde_json::Value>,
}

pub async fn bulk_set_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<BulkScheduleRequest>,
) -> Result<Json<Envelope<Vec<AvailabilityRow>>>, ApiError> {
    ensure_scheduler(&auth)?;

    let (Some(doctor_id), Some(serde_json::Value::Array(items))) = (req.doctor_id, req.schedule)
    else {
        return Err(ApiError::validation(
            "Doctor ID and schedule array are required",
        ));
    };

    let entries: Vec<ScheduleEntry> = items.into_iter().map(ScheduleEntry::from_json).collect();

    let rows = schedule::bulk_set(
        state.doctors.as_ref(),
        state.availability.as_ref(),
        doctor_id,
        &entries,
    )
    .await?;

    Ok(Json(
        Envelope::list(rows).with_message("Schedule updated successfully"),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
}

pub async fn update_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<UpdateAvailabilityRequest>,
) -> Result<Json<Envelope<AvailabilityRow>>, ApiError> {
    ensure_scheduler(&auth)?;

    let current = state
        .availability
        .find(id)
        .await?
        .ok_or_else(availability_not_found)?;

    let day = match req.day_of_week.as_deref().filter(|d| !d.is_empty()) {
        Some(d) => schedule::parse_day(d)?,
        None => current.day_of_week,
    };
    let start_time = match req.start_time.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => schedule::parse_time(t, "start_time")?,
        None => current.start_time,
    };
    let end_time = match req.end_time.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => schedule::parse_time(t, "end_time")?,
        None => current.end_time,
    };
    let window = schedule::build_window(
        start_time,
        end_time,
        req.is_available.unwrap_or(current.is_available),
    )?;

    let row = state
        .availability
        .update(id, day, &window)
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => ApiError::Conflict(
                "DUPLICATE_DAY",
                format!("Doctor already has availability on {day}"),
            ),
            other => other.into(),
        })?
        .ok_or_else(availability_not_found)?;

    Ok(Json(
        Envelope::data(row).with_message("Availability updated successfully"),
    ))
}

pub async fn delete_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, ApiError> {
    ensure_scheduler(&auth)?;

    if !state.availability.delete(id).await? {
        return Err(availability_not_found());
    }

    tracing::info!(availability_id = id, by = auth.user_id, "availability deleted");

    Ok(Json(Envelope::message("Availability deleted successfully")))
}
