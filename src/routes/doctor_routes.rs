use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{auth_context::AuthContext, json_body::JsonBody},
    models::{
        AppState, DoctorFilter, DoctorPatch, DoctorRow, DoctorStats, DoctorStatus, Envelope,
        NewDoctor, Role,
    },
    repo::RepoError,
    schedule::doctor_not_found,
};

pub fn router() -> Router<AppState> {
    Router::new()
        // reads are public, writes admin-only
        .route("/", get(list_doctors).post(create_doctor))
        .route("/stats", get(doctor_stats))
        .route(
            "/{id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    auth.require_role(&[Role::Admin], "manage doctors")
}

fn duplicate_doctor(on_update: bool) -> ApiError {
    let msg = if on_update {
        "Another doctor with this email or license number already exists"
    } else {
        "Doctor with this email or license number already exists"
    };
    ApiError::BadRequest("DUPLICATE_DOCTOR", msg.into())
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_status(raw: &str) -> Result<DoctorStatus, ApiError> {
    raw.trim()
        .parse::<DoctorStatus>()
        .map_err(|_| ApiError::validation("status must be Active or Inactive"))
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorListQuery {
    pub status: Option<String>,
    pub specialization: Option<String>,
    pub search: Option<String>,
}

pub async fn list_doctors(
    State(state): State<AppState>,
    Query(q): Query<DoctorListQuery>,
) -> Result<Json<Envelope<Vec<DoctorRow>>>, ApiError> {
    let filter = DoctorFilter {
        status: non_blank(q.status).as_deref().map(parse_status).transpose()?,
        specialization: non_blank(q.specialization),
        search: non_blank(q.search),
    };

    let doctors = state.doctors.list(&filter).await?;
    Ok(Json(Envelope::list(doctors)))
}

pub async fn doctor_stats(
    State(state): State<AppState>,
) -> Result<Json<Envelope<DoctorStats>>, ApiError> {
    let stats = state.doctors.stats().await?;
    Ok(Json(Envelope::data(stats)))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<DoctorRow>>, ApiError> {
    let doctor = state.doctors.find(id).await?.ok_or_else(doctor_not_found)?;
    Ok(Json(Envelope::data(doctor)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub status: Option<String>,
    pub primary_clinic: Option<String>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Envelope<DoctorRow>>), ApiError> {
    ensure_admin(&auth)?;

    let (Some(name), Some(email), Some(specialization), Some(license_number)) = (
        non_blank(req.name),
        non_blank(req.email),
        non_blank(req.specialization),
        non_blank(req.license_number),
    ) else {
        return Err(ApiError::validation(
            "Name, email, specialization, and license number are required",
        ));
    };

    let status = match non_blank(req.status) {
        Some(s) => parse_status(&s)?,
        None => DoctorStatus::Inactive,
    };

    if state
        .doctors
        .find_conflicting(Some(&email), Some(&license_number), None)
        .await?
        .is_some()
    {
        return Err(duplicate_doctor(false));
    }

    let doctor = state
        .doctors
        .insert(NewDoctor {
            name,
            email,
            phone: non_blank(req.phone),
            specialization,
            license_number,
            address: non_blank(req.address),
            profile_image: non_blank(req.profile_image),
            status,
            primary_clinic: non_blank(req.primary_clinic)
                .unwrap_or_else(|| state.default_primary_clinic.clone()),
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => duplicate_doctor(false),
            other => other.into(),
        })?;

    tracing::info!(doctor_id = doctor.id, by = auth.user_id, "doctor created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(doctor).with_message("Doctor created successfully")),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub status: Option<String>,
    pub primary_clinic: Option<String>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<UpdateDoctorRequest>,
) -> Result<Json<Envelope<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    if !state.doctors.exists(id).await? {
        return Err(doctor_not_found());
    }

    let patch = DoctorPatch {
        name: non_blank(req.name),
        email: non_blank(req.email),
        phone: non_blank(req.phone),
        specialization: non_blank(req.specialization),
        license_number: non_blank(req.license_number),
        address: non_blank(req.address),
        profile_image: non_blank(req.profile_image),
        status: non_blank(req.status).as_deref().map(parse_status).transpose()?,
        primary_clinic: non_blank(req.primary_clinic),
    };

    if (patch.email.is_some() || patch.license_number.is_some())
        && state
            .doctors
            .find_conflicting(patch.email.as_deref(), patch.license_number.as_deref(), Some(id))
            .await?
            .is_some()
    {
        return Err(duplicate_doctor(true));
    }

    let doctor = state
        .doctors
        .update(id, patch)
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => duplicate_doctor(true),
            other => other.into(),
        })?
        .ok_or_else(doctor_not_found)?;

    Ok(Json(
        Envelope::data(doctor).with_message("Doctor updated successfully"),
    ))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, ApiError> {
    ensure_admin(&auth)?;

    if !state.doctors.delete(id).await? {
        return Err(doctor_not_found());
    }

    tracing::info!(doctor_id = id, by = auth.user_id, "doctor deleted");

    Ok(Json(Envelope::message("Doctor deleted successfully")))
}
