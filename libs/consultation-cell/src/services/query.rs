// libs/consultation-cell/src/services/query.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::DoctorSummary;
use doctor_cell::services::EligibilityResolver;

use crate::models::{
    ConsultationRequest, PagedRequests, RequestError, RequestFilter, RequestListQuery,
    RequestStatus, RequestView,
};
use crate::services::clinic::ClinicDirectory;
use crate::services::store::RequestStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn from_query(query: &RequestListQuery) -> Self {
        Self {
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as usize,
            offset: query.offset.unwrap_or(0) as usize,
        }
    }

    fn slice(&self, requests: Vec<ConsultationRequest>) -> (Vec<ConsultationRequest>, usize) {
        let total = requests.len();
        let items = requests.into_iter().skip(self.offset).take(self.limit).collect();
        (items, total)
    }
}

/// Read-side views over the request store, joined with clinic and doctor
/// display attributes.
pub struct RequestQueryService {
    store: Arc<dyn RequestStore>,
    clinics: Arc<dyn ClinicDirectory>,
    eligibility: Arc<EligibilityResolver>,
}

impl RequestQueryService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        clinics: Arc<dyn ClinicDirectory>,
        eligibility: Arc<EligibilityResolver>,
    ) -> Self {
        Self { store, clinics, eligibility }
    }

    /// Open requests offered to the doctor that they have not answered yet
    /// and that are still in the future.
    pub async fn available_for_doctor(
        &self,
        doctor_id: Uuid,
        query: &RequestListQuery,
    ) -> Result<PagedRequests, RequestError> {
        let now = Utc::now();
        let requests: Vec<ConsultationRequest> = self.store.list(&RequestFilter {
            offered_to: Some(doctor_id),
            statuses: vec![RequestStatus::Pending, RequestStatus::Accepted],
            ..Default::default()
        }).await?
            .into_iter()
            .filter(|r| {
                !r.accepted_by_user_ids.contains(&doctor_id)
                    && !r.declined_by_user_ids.contains(&doctor_id)
                    && r.request_datetime > now
            })
            .collect();

        debug!("{} requests available to doctor {}", requests.len(), doctor_id);
        self.paged(requests, Page::from_query(query)).await
    }

    pub async fn accepted_by_doctor(
        &self,
        doctor_id: Uuid,
        query: &RequestListQuery,
    ) -> Result<PagedRequests, RequestError> {
        let requests = self.store.list(&RequestFilter {
            accepted_by: Some(doctor_id),
            statuses: vec![RequestStatus::Pending, RequestStatus::Accepted],
            ..Default::default()
        }).await?;

        self.paged(requests, Page::from_query(query)).await
    }

    pub async fn doctor_appointments(
        &self,
        doctor_id: Uuid,
        query: &RequestListQuery,
    ) -> Result<PagedRequests, RequestError> {
        let requests = self.store.list(&RequestFilter {
            assigned_doctor_id: Some(doctor_id),
            statuses: query.status.into_iter().collect(),
            ..Default::default()
        }).await?;

        self.paged(requests, Page::from_query(query)).await
    }

    pub async fn host_requests(
        &self,
        host_id: Uuid,
        query: &RequestListQuery,
    ) -> Result<PagedRequests, RequestError> {
        let requests = self.store.list(&RequestFilter {
            created_by: Some(host_id),
            statuses: query.status.into_iter().collect(),
            ..Default::default()
        }).await?;

        self.paged(requests, Page::from_query(query)).await
    }

    /// Doctors currently in `accepted_by`, for the creator to pick from.
    pub async fn accepted_doctors(
        &self,
        request_id: Uuid,
        host_id: Uuid,
    ) -> Result<Vec<DoctorSummary>, RequestError> {
        let request = self.store.get(request_id).await?
            .ok_or_else(|| RequestError::request_not_found(request_id))?;
        if !request.is_created_by(host_id) {
            return Err(RequestError::Unauthorized("only the request creator can do this".to_string()));
        }

        Ok(self.eligibility.doctor_summaries(&request.accepted_by_user_ids.to_vec()).await?)
    }

    async fn paged(&self, requests: Vec<ConsultationRequest>, page: Page) -> Result<PagedRequests, RequestError> {
        let (items, total) = page.slice(requests);
        let items = self.to_views(items).await?;

        Ok(PagedRequests {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn to_views(&self, requests: Vec<ConsultationRequest>) -> Result<Vec<RequestView>, RequestError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let clinic_ids: Vec<Uuid> = requests.iter()
            .map(|r| r.clinic_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let doctor_ids: Vec<Uuid> = requests.iter()
            .filter_map(|r| r.assigned_doctor_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (clinics, doctors) = futures::future::join(
            self.clinics.get_clinics(&clinic_ids),
            self.eligibility.doctor_summaries(&doctor_ids),
        ).await;

        let clinics: HashMap<Uuid, _> = clinics
            .map_err(|e| RequestError::Storage(e.to_string()))?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let doctors: HashMap<Uuid, DoctorSummary> = doctors?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        Ok(requests.into_iter()
            .map(|request| RequestView {
                clinic: clinics.get(&request.clinic_id).cloned(),
                assigned_doctor: request.assigned_doctor_id.and_then(|id| doctors.get(&id).cloned()),
                accepted_count: request.accepted_by_user_ids.len(),
                request,
            })
            .collect())
    }
}
