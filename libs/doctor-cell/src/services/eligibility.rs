use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{DoctorSummary, EligibilityError};
use crate::services::directory::DoctorDirectory;

/// Computes the set of doctors a new request is offered to.
pub struct EligibilityResolver {
    directory: Arc<dyn DoctorDirectory>,
}

impl EligibilityResolver {
    pub fn new(directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { directory }
    }

    /// Ids of active, verified doctors with exactly this specialization.
    ///
    /// An empty set is a valid answer; callers decide whether that is fatal.
    pub async fn resolve_eligible_doctors(
        &self,
        specialization: &str,
    ) -> Result<BTreeSet<Uuid>, EligibilityError> {
        if specialization.trim().is_empty() {
            return Err(EligibilityError::EmptySpecialization);
        }

        let candidates = self.directory.find_eligible(specialization).await
            .map_err(|e| EligibilityError::Directory(e.to_string()))?;

        let total = candidates.len();
        let eligible: BTreeSet<Uuid> = candidates.into_iter()
            .filter(|doctor| doctor.is_eligible_for(specialization))
            .map(|doctor| doctor.id)
            .collect();

        if eligible.len() < total {
            warn!("Directory returned {} rows not eligible for '{}'", total - eligible.len(), specialization);
        }

        info!("Resolved {} eligible doctors for specialization '{}'", eligible.len(), specialization);
        Ok(eligible)
    }

    /// Display attributes for a set of doctors, in the order given.
    pub async fn doctor_summaries(&self, ids: &[Uuid]) -> Result<Vec<DoctorSummary>, EligibilityError> {
        debug!("Loading {} doctor summaries", ids.len());

        let profiles = self.directory.get_profiles(ids).await
            .map_err(|e| EligibilityError::Directory(e.to_string()))?;

        Ok(ids.iter()
            .filter_map(|id| profiles.iter().find(|p| p.id == *id))
            .map(|p| p.summary())
            .collect())
    }
}
