//! Weekly availability scheduling: single-day upsert and whole-week bulk set.

use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::ApiError,
    models::{AvailabilityRow, DayOfWeek, TimeWindow},
    repo::{
        availability::{AvailabilityRepo, Upserted},
        doctors::DoctorsRepo,
        RepoError,
    },
};

/// One day of a bulk schedule as sent by the client. Fields stay raw JSON so
/// an entry with an unusable day is skipped instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleEntry {
    pub day_of_week: Option<Value>,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub is_available: Option<Value>,
}

impl ScheduleEntry {
    /// Never fails; anything that is not an object yields an entry with no day.
    pub fn from_json(raw: Value) -> Self {
        serde_json::from_value(raw).unwrap_or_default()
    }

    /// The entry's day, or `None` when it is missing, not a string, or not a day name.
    pub fn day(&self) -> Option<DayOfWeek> {
        self.day_of_week
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|d| d.parse::<DayOfWeek>().ok())
    }

    fn window(&self, day: DayOfWeek) -> Result<TimeWindow, ApiError> {
        let (Some(start), Some(end)) = (
            self.start_time.as_ref().and_then(Value::as_str),
            self.end_time.as_ref().and_then(Value::as_str),
        ) else {
            return Err(ApiError::validation(format!(
                "start_time and end_time are required for {day}"
            )));
        };
        let is_available = match &self.is_available {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                return Err(ApiError::validation(format!(
                    "is_available must be true or false for {day}"
                )));
            }
        };
        parse_window(start, end, is_available)
    }
}

pub fn doctor_not_found() -> ApiError {
    ApiError::not_found("Doctor not found")
}

pub fn parse_day(raw: &str) -> Result<DayOfWeek, ApiError> {
    raw.parse::<DayOfWeek>()
        .map_err(|_| ApiError::validation("Invalid day of week"))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str, field: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::validation(format!("{field} must be a time like 09:00")))
}

pub fn build_window(
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_available: bool,
) -> Result<TimeWindow, ApiError> {
    if end_time <= start_time {
        return Err(ApiError::validation("end_time must be after start_time"));
    }
    Ok(TimeWindow {
        start_time,
        end_time,
        is_available,
    })
}

pub fn parse_window(
    start_time: &str,
    end_time: &str,
    is_available: Option<bool>,
) -> Result<TimeWindow, ApiError> {
    build_window(
        parse_time(start_time, "start_time")?,
        parse_time(end_time, "end_time")?,
        is_available.unwrap_or(true),
    )
}

/// Insert or update the doctor's row for `day`. `created` tells the caller
/// whether to answer 201 or 200.
pub async fn set_availability(
    doctors: &dyn DoctorsRepo,
    availability: &dyn AvailabilityRepo,
    doctor_id: i64,
    day: DayOfWeek,
    window: &TimeWindow,
) -> Result<Upserted, ApiError> {
    if !doctors.exists(doctor_id).await? {
        return Err(doctor_not_found());
    }

    // The doctor can vanish between the check and the write.
    let upserted = availability
        .upsert(doctor_id, day, window)
        .await
        .map_err(|e| match e {
            RepoError::MissingReference(_) => doctor_not_found(),
            other => other.into(),
        })?;

    tracing::info!(
        doctor_id,
        day = %day,
        availability_id = upserted.row.id,
        created = upserted.created,
        "availability set"
    );
    Ok(upserted)
}

/// Apply a week schedule entry by entry and return the doctor's full
/// schedule, Monday first.
///
/// Entries without a usable day are skipped. Times of the remaining entries
/// are validated before anything is written; after that each entry is its own
/// write, so a storage failure midway keeps the entries already applied.
pub async fn bulk_set(
    doctors: &dyn DoctorsRepo,
    availability: &dyn AvailabilityRepo,
    doctor_id: i64,
    entries: &[ScheduleEntry],
) -> Result<Vec<AvailabilityRow>, ApiError> {
    if !doctors.exists(doctor_id).await? {
        return Err(doctor_not_found());
    }

    let mut plan: Vec<(DayOfWeek, TimeWindow)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(day) = entry.day() else {
            tracing::debug!(doctor_id, day = ?entry.day_of_week, "skipping schedule entry");
            continue;
        };
        plan.push((day, entry.window(day)?));
    }

    for (day, window) in &plan {
        set_availability(doctors, availability, doctor_id, *day, window).await?;
    }

    tracing::info!(
        doctor_id,
        applied = plan.len(),
        skipped = entries.len() - plan.len(),
        "bulk schedule applied"
    );

    Ok(availability.list_for_doctor(doctor_id).await?)
}
