use crate::errors::AppError;
use crate::models::{NewProfile, ProfileData, UserProfile};
use chrono::Utc;
use std::path::Path;
use tokio::fs;
use tracing::error;

pub async fn load_data(path: &Path) -> ProfileData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse profile file: {err}");
                ProfileData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => ProfileData::default(),
        Err(err) => {
            error!("failed to read profile file: {err}");
            ProfileData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &ProfileData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

impl ProfileData {
    pub fn by_uid(&self, uid: &str) -> Option<&UserProfile> {
        self.users.get(uid)
    }

    pub fn by_uid_mut(&mut self, uid: &str) -> Option<&mut UserProfile> {
        self.users.get_mut(uid)
    }

    pub fn by_email(&self, email: &str) -> Option<&UserProfile> {
        self.users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    /// True when either the email or the roll number is already taken.
    pub fn conflicts(&self, email: &str, roll_number: &str) -> bool {
        self.users.values().any(|user| {
            user.email.eq_ignore_ascii_case(email)
                || user.roll_number.eq_ignore_ascii_case(roll_number)
        })
    }

    pub fn insert(&mut self, profile: NewProfile) -> UserProfile {
        self.next_id = self.next_id.saturating_add(1);
        let user = UserProfile {
            id: self.next_id,
            name: profile.name,
            email: profile.email,
            roll_number: profile.roll_number,
            hostel_room: profile.hostel_room,
            is_admin: false,
            is_active: true,
            firebase_uid: profile.firebase_uid,
            created_at: Utc::now(),
            last_login: profile.last_login,
        };
        self.users.insert(user.firebase_uid.clone(), user.clone());
        user
    }

    pub fn remove(&mut self, uid: &str) -> Option<UserProfile> {
        self.users.remove(uid)
    }

    /// Moves a profile to a new provider id, e.g. when the same email signs
    /// in through a different provider.
    /// Moves a profile to a new provider uid. Refuses, leaving the store
    /// untouched, when `new_uid` already belongs to a different profile.
    pub fn rekey(
        &mut self,
        old_uid: &str,
        new_uid: &str,
    ) -> Result<Option<&mut UserProfile>, AppError> {
        if old_uid != new_uid {
            if self.users.contains_key(new_uid) {
                return Err(uid_taken());
            }
            let Some(mut user) = self.users.remove(old_uid) else {
                return Ok(None);
            };
            user.firebase_uid = new_uid.to_string();
            self.users.insert(new_uid.to_string(), user);
        }
        Ok(self.users.get_mut(new_uid))
    }
}

pub fn uid_taken() -> AppError {
    AppError::conflict("This account is already linked to another profile")
}
