//! In-process store backing handler and scheduling tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    availability::{AvailabilityRepo, Upserted},
    doctors::DoctorsRepo,
    sessions::{ActiveSession, SessionsRepo},
    users::UsersRepo,
    RepoError,
};
use crate::middleware::auth_context::AuthContext;
use crate::models::{
    AppState, AvailabilityFilter, AvailabilityListRow, AvailabilityRow, DayOfWeek,
    DoctorFilter, DoctorPatch, DoctorRow, DoctorStats, DoctorStatus, NewDoctor, NewUser,
    Role, SessionTokenRow, TimeWindow, UserRow,
};

struct SessionRecord {
    session_token_id: Uuid,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRow>,
    sessions: Vec<SessionRecord>,
    doctors: Vec<DoctorRow>,
    availability: Vec<AvailabilityRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn availability_count(&self) -> usize {
        self.lock().availability.len()
    }

    pub fn doctor_count(&self) -> usize {
        self.lock().doctors.len()
    }
}

/// Application state wired entirely to one in-memory store.
pub fn memory_state(store: &Arc<MemoryStore>) -> AppState {
    AppState {
        users: store.clone(),
        sessions: store.clone(),
        doctors: store.clone(),
        availability: store.clone(),
        session_ttl_hours: 24,
        default_primary_clinic: "PRED CLINIC".to_string(),
    }
}

/// Caller identity for handler tests; no session row behind it.
pub fn auth_as(role: Role) -> AuthContext {
    AuthContext {
        user_id: 0,
        role,
        session_token_id: Uuid::nil(),
    }
}

pub async fn seed_doctor(
    store: &MemoryStore,
    name: &str,
    email: &str,
    specialization: &str,
    license_number: &str,
) -> DoctorRow {
    DoctorsRepo::insert(
        store,
        NewDoctor::sample(name, email, specialization, license_number),
    )
    .await
    .expect("seed doctor")
}

fn unique(constraint: &str) -> RepoError {
    RepoError::Conflict(constraint.to_string())
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<UserRow, RepoError> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(unique("users_email_key"));
        }
        let now = Utc::now();
        let row = UserRow {
            id: t.next_id(),
            email: user.email,
            password: user.password_hash,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, RepoError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRow>, RepoError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<UserRow>, RepoError> {
        let mut t = self.lock();
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = full_name {
            user.full_name = name.to_string();
        }
        if let Some(phone) = phone {
            user.phone = Some(phone.to_string());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepoError> {
        let mut t = self.lock();
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionTokenRow, RepoError> {
        let session_token_id = Uuid::new_v4();
        self.lock().sessions.push(SessionRecord {
            session_token_id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            revoked: false,
        });
        Ok(SessionTokenRow {
            session_token_id,
            expires_at,
        })
    }

    async fn lookup_active(&self, token_hash: &str) -> Result<Option<ActiveSession>, RepoError> {
        let t = self.lock();
        let now = Utc::now();
        let Some(session) = t
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash && !s.revoked && s.expires_at > now)
        else {
            return Ok(None);
        };
        Ok(t.users
            .iter()
            .find(|u| u.id == session.user_id)
            .map(|u| ActiveSession {
                session_token_id: session.session_token_id,
                user_id: u.id,
                role: u.role,
            }))
    }

    async fn revoke(&self, session_token_id: Uuid) -> Result<bool, RepoError> {
        let mut t = self.lock();
        match t
            .sessions
            .iter_mut()
            .find(|s| s.session_token_id == session_token_id && !s.revoked)
        {
            Some(s) => {
                s.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_others(&self, user_id: i64, keep: Uuid) -> Result<u64, RepoError> {
        let mut t = self.lock();
        let mut revoked = 0;
        for s in t
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && !s.revoked && s.session_token_id != keep)
        {
            s.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl DoctorsRepo for MemoryStore {
    async fn list(&self, filter: &DoctorFilter) -> Result<Vec<DoctorRow>, RepoError> {
        let t = self.lock();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<DoctorRow> = t
            .doctors
            .iter()
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| {
                filter
                    .specialization
                    .as_deref()
                    .is_none_or(|s| d.specialization == s)
            })
            .filter(|d| {
                needle.as_deref().is_none_or(|n| {
                    d.name.to_lowercase().contains(n)
                        || d.email.to_lowercase().contains(n)
                        || d.specialization.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn find(&self, id: i64) -> Result<Option<DoctorRow>, RepoError> {
        Ok(self.lock().doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn exists(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().doctors.iter().any(|d| d.id == id))
    }

    async fn find_conflicting(
        &self,
        email: Option<&str>,
        license_number: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>, RepoError> {
        Ok(self
            .lock()
            .doctors
            .iter()
            .filter(|d| Some(d.id) != exclude_id)
            .find(|d| {
                Some(d.email.as_str()) == email
                    || Some(d.license_number.as_str()) == license_number
            })
            .map(|d| d.id))
    }

    async fn insert(&self, doctor: NewDoctor) -> Result<DoctorRow, RepoError> {
        let mut t = self.lock();
        if t.doctors.iter().any(|d| d.email == doctor.email) {
            return Err(unique("doctors_email_key"));
        }
        if t
            .doctors
            .iter()
            .any(|d| d.license_number == doctor.license_number)
        {
            return Err(unique("doctors_license_number_key"));
        }
        let now = Utc::now();
        let row = DoctorRow {
            id: t.next_id(),
            name: doctor.name,
            email: doctor.email,
            phone: doctor.phone,
            specialization: doctor.specialization,
            license_number: doctor.license_number,
            address: doctor.address,
            profile_image: doctor.profile_image,
            status: doctor.status,
            primary_clinic: doctor.primary_clinic,
            created_at: now,
            updated_at: now,
        };
        t.doctors.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, patch: DoctorPatch) -> Result<Option<DoctorRow>, RepoError> {
        let mut t = self.lock();
        let clash = t.doctors.iter().any(|d| {
            d.id != id
                && (patch.email.as_deref() == Some(d.email.as_str())
                    || patch.license_number.as_deref() == Some(d.license_number.as_str()))
        });
        if clash {
            return Err(unique("doctors_email_key"));
        }
        let Some(d) = t.doctors.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            d.name = v;
        }
        if let Some(v) = patch.email {
            d.email = v;
        }
        if let Some(v) = patch.phone {
            d.phone = Some(v);
        }
        if let Some(v) = patch.specialization {
            d.specialization = v;
        }
        if let Some(v) = patch.license_number {
            d.license_number = v;
        }
        if let Some(v) = patch.address {
            d.address = Some(v);
        }
        if let Some(v) = patch.profile_image {
            d.profile_image = Some(v);
        }
        if let Some(v) = patch.status {
            d.status = v;
        }
        if let Some(v) = patch.primary_clinic {
            d.primary_clinic = v;
        }
        d.updated_at = Utc::now();
        Ok(Some(d.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut t = self.lock();
        let before = t.doctors.len();
        t.doctors.retain(|d| d.id != id);
        if t.doctors.len() == before {
            return Ok(false);
        }
        t.availability.retain(|a| a.doctor_id != id);
        Ok(true)
    }

    async fn stats(&self) -> Result<DoctorStats, RepoError> {
        let t = self.lock();
        let mut specializations: Vec<&str> =
            t.doctors.iter().map(|d| d.specialization.as_str()).collect();
        specializations.sort_unstable();
        specializations.dedup();
        Ok(DoctorStats {
            total_doctors: t.doctors.len() as i64,
            active_doctors: t
                .doctors
                .iter()
                .filter(|d| d.status == DoctorStatus::Active)
                .count() as i64,
            inactive_doctors: t
                .doctors
                .iter()
                .filter(|d| d.status == DoctorStatus::Inactive)
                .count() as i64,
            total_specializations: specializations.len() as i64,
        })
    }
}

#[async_trait]
impl AvailabilityRepo for MemoryStore {
    async fn list_for_doctor(&self, doctor_id: i64) -> Result<Vec<AvailabilityRow>, RepoError> {
        let mut rows: Vec<AvailabilityRow> = self
            .lock()
            .availability
            .iter()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.day_of_week);
        Ok(rows)
    }

    async fn list(
        &self,
        filter: &AvailabilityFilter,
    ) -> Result<Vec<AvailabilityListRow>, RepoError> {
        let t = self.lock();
        let mut rows: Vec<AvailabilityListRow> = t
            .availability
            .iter()
            .filter(|a| filter.doctor_id.is_none_or(|id| a.doctor_id == id))
            .filter(|a| filter.day_of_week.is_none_or(|d| a.day_of_week == d))
            .filter_map(|a| {
                t.doctors
                    .iter()
                    .find(|d| d.id == a.doctor_id)
                    .map(|d| AvailabilityListRow {
                        availability: a.clone(),
                        doctor_name: d.name.clone(),
                        specialization: d.specialization.clone(),
                    })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.doctor_name
                .cmp(&b.doctor_name)
                .then(a.availability.day_of_week.cmp(&b.availability.day_of_week))
        });
        Ok(rows)
    }

    async fn find(&self, id: i64) -> Result<Option<AvailabilityRow>, RepoError> {
        Ok(self.lock().availability.iter().find(|a| a.id == id).cloned())
    }

    async fn upsert(
        &self,
        doctor_id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Upserted, RepoError> {
        let mut t = self.lock();
        if !t.doctors.iter().any(|d| d.id == doctor_id) {
            return Err(RepoError::MissingReference(
                "availability_doctor_id_fkey".to_string(),
            ));
        }
        let now = Utc::now();
        if let Some(existing) = t
            .availability
            .iter_mut()
            .find(|a| a.doctor_id == doctor_id && a.day_of_week == day)
        {
            existing.start_time = window.start_time;
            existing.end_time = window.end_time;
            existing.is_available = window.is_available;
            existing.updated_at = now;
            return Ok(Upserted {
                row: existing.clone(),
                created: false,
            });
        }
        let row = AvailabilityRow {
            id: t.next_id(),
            doctor_id,
            day_of_week: day,
            start_time: window.start_time,
            end_time: window.end_time,
            is_available: window.is_available,
            created_at: now,
            updated_at: now,
        };
        t.availability.push(row.clone());
        Ok(Upserted { row, created: true })
    }

    async fn update(
        &self,
        id: i64,
        day: DayOfWeek,
        window: &TimeWindow,
    ) -> Result<Option<AvailabilityRow>, RepoError> {
        let mut t = self.lock();
        let Some(doctor_id) = t
            .availability
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.doctor_id)
        else {
            return Ok(None);
        };
        if t
            .availability
            .iter()
            .any(|a| a.id != id && a.doctor_id == doctor_id && a.day_of_week == day)
        {
            return Err(unique("unique_doctor_day"));
        }
        let Some(row) = t.availability.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        row.day_of_week = day;
        row.start_time = window.start_time;
        row.end_time = window.end_time;
        row.is_available = window.is_available;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut t = self.lock();
        let before = t.availability.len();
        t.availability.retain(|a| a.id != id);
        Ok(t.availability.len() != before)
    }
}
