use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Doctor,
    Host,
    Admin,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    #[serde(other)]
    Unknown,
}

/// Row of the `profiles` table as seen by the matching core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub status: AccountStatus,
    #[serde(default)]
    pub is_verified: bool,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    pub push_token: Option<String>,
}

impl DoctorProfile {
    /// Exact-match eligibility for a request tagged with `specialization`.
    pub fn is_eligible_for(&self, specialization: &str) -> bool {
        self.role == UserRole::Doctor
            && self.status == AccountStatus::Active
            && self.is_verified
            && self.specialization.as_deref() == Some(specialization)
    }

    pub fn summary(&self) -> DoctorSummary {
        DoctorSummary {
            id: self.id,
            full_name: self.full_name.clone().unwrap_or_default(),
            specialization: self.specialization.clone(),
            phone: self.phone.clone(),
            profile_image_url: self.profile_image_url.clone(),
        }
    }
}

/// Display projection joined onto request listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    #[error("Specialization must not be empty")]
    EmptySpecialization,

    #[error("Doctor directory error: {0}")]
    Directory(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(status: AccountStatus, verified: bool, specialization: &str) -> DoctorProfile {
        DoctorProfile {
            id: Uuid::new_v4(),
            full_name: Some("Dr. Rao".to_string()),
            role: UserRole::Doctor,
            status,
            is_verified: verified,
            specialization: Some(specialization.to_string()),
            phone: None,
            profile_image_url: None,
            push_token: None,
        }
    }

    #[test]
    fn test_eligibility_filter() {
        assert!(profile(AccountStatus::Active, true, "Orthodontics").is_eligible_for("Orthodontics"));
        assert!(!profile(AccountStatus::Active, false, "Orthodontics").is_eligible_for("Orthodontics"));
        assert!(!profile(AccountStatus::Suspended, true, "Orthodontics").is_eligible_for("Orthodontics"));
        // exact match only
        assert!(!profile(AccountStatus::Active, true, "orthodontics").is_eligible_for("Orthodontics"));
        assert!(!profile(AccountStatus::Active, true, "Orthodontics ").is_eligible_for("Orthodontics"));

        let mut host = profile(AccountStatus::Active, true, "Orthodontics");
        host.role = UserRole::Host;
        assert!(!host.is_eligible_for("Orthodontics"));
    }

    #[test]
    fn test_unknown_enum_values_decode() {
        let row: DoctorProfile = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "full_name": null,
            "role": "receptionist",
            "status": "pending_review",
            "specialization": null,
            "phone": null,
            "profile_image_url": null,
            "push_token": null
        })).unwrap();

        assert_eq!(row.role, UserRole::Other);
        assert_eq!(row.status, AccountStatus::Unknown);
        assert!(!row.is_verified);
    }
}
