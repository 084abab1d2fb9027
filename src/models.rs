use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::repo::{
    availability::AvailabilityRepo, doctors::DoctorsRepo, sessions::SessionsRepo,
    users::UsersRepo,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UsersRepo>,
    pub sessions: Arc<dyn SessionsRepo>,
    pub doctors: Arc<dyn DoctorsRepo>,
    pub availability: Arc<dyn AvailabilityRepo>,
    pub session_ttl_hours: i64,
    pub default_primary_clinic: String,
}

/* -------------------------
   Response envelope
--------------------------*/

/// `{success, message?, data?, count?}` wrapper shared by every endpoint.
/// Errors use the same shape, see `ApiError`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            count: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn list(rows: Vec<T>) -> Self {
        let count = rows.len();
        Self {
            success: true,
            message: None,
            data: Some(rows),
            count: Some(count),
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            count: None,
        }
    }
}

/* -------------------------
   Enumerations
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "doctor_status")]
pub enum DoctorStatus {
    Active,
    Inactive,
}

impl FromStr for DoctorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(DoctorStatus::Active),
            "Inactive" => Ok(DoctorStatus::Inactive),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Variant order is the schedule order (Monday first). The `day_of_week`
/// Postgres enum is declared in the same order, so `ORDER BY day_of_week`
/// and `Ord` agree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "day_of_week")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    /// Exact, case-sensitive match on the English day name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DayOfWeek::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("invalid day of week: {s}"))
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as returned to clients; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            phone: u.phone,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: uuid::Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DoctorRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub license_number: String,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub status: DoctorStatus,
    pub primary_clinic: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilityRow {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Availability joined with the owning doctor, for the admin-wide listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AvailabilityListRow {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub availability: AvailabilityRow,
    pub doctor_name: String,
    pub specialization: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DoctorStats {
    pub total_doctors: i64,
    pub active_doctors: i64,
    pub inactive_doctors: i64,
    pub total_specializations: i64,
}

/* -------------------------
   Repository inputs
--------------------------*/

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub license_number: String,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub status: DoctorStatus,
    pub primary_clinic: String,
}

#[cfg(test)]
impl NewDoctor {
    /// An active doctor at the default clinic with only the required fields.
    pub fn sample(name: &str, email: &str, specialization: &str, license_number: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            specialization: specialization.to_string(),
            license_number: license_number.to_string(),
            address: None,
            profile_image: None,
            status: DoctorStatus::Active,
            primary_clinic: "PRED CLINIC".to_string(),
        }
    }
}

/// Partial doctor update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub status: Option<DoctorStatus>,
    pub primary_clinic: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorFilter {
    pub status: Option<DoctorStatus>,
    pub specialization: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AvailabilityFilter {
    pub doctor_id: Option<i64>,
    pub day_of_week: Option<DayOfWeek>,
}

/// Validated working hours for one day; `end_time` is after `start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}
