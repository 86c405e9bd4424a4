use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    ConsultationRequest, DoctorRequestStats, HostRequestStats, RequestError, RequestFilter,
    RequestStatus,
};
use crate::services::store::RequestStore;

pub struct RequestStatisticsService {
    store: Arc<dyn RequestStore>,
}

impl RequestStatisticsService {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    pub async fn doctor_stats(&self, doctor_id: Uuid) -> Result<DoctorRequestStats, RequestError> {
        debug!("Computing request statistics for doctor {}", doctor_id);

        let accepted = self.store.list(&RequestFilter {
            accepted_by: Some(doctor_id),
            statuses: vec![RequestStatus::Pending, RequestStatus::Accepted],
            ..Default::default()
        }).await?;
        let assigned = self.store.list(&RequestFilter {
            assigned_doctor_id: Some(doctor_id),
            ..Default::default()
        }).await?;

        Ok(aggregate_doctor(doctor_id, &accepted, &assigned))
    }

    pub async fn host_stats(&self, host_id: Uuid) -> Result<HostRequestStats, RequestError> {
        debug!("Computing request statistics for host {}", host_id);

        let created = self.store.list(&RequestFilter {
            created_by: Some(host_id),
            ..Default::default()
        }).await?;

        Ok(aggregate_host(&created))
    }
}

pub fn aggregate_doctor(
    doctor_id: Uuid,
    accepted: &[ConsultationRequest],
    assigned: &[ConsultationRequest],
) -> DoctorRequestStats {
    let mut stats = DoctorRequestStats {
        accepted_pending_confirmation: accepted.iter()
            .filter(|r| r.status.is_open() && r.accepted_by_user_ids.contains(&doctor_id))
            .count(),
        ..Default::default()
    };

    for request in assigned.iter().filter(|r| r.is_assigned_to(doctor_id)) {
        match request.status {
            RequestStatus::Confirmed => stats.upcoming += 1,
            RequestStatus::Started => stats.ongoing += 1,
            RequestStatus::Completed => {
                stats.completed += 1;
                stats.total_earnings += request.offering_rupees;
            }
            RequestStatus::Pending | RequestStatus::Accepted | RequestStatus::Cancelled => {}
        }
    }
    stats
}

pub fn aggregate_host(created: &[ConsultationRequest]) -> HostRequestStats {
    let mut stats = HostRequestStats {
        total_spend: Decimal::ZERO,
        ..Default::default()
    };

    for request in created {
        match request.status {
            RequestStatus::Pending | RequestStatus::Accepted => {
                if request.assigned_doctor_id.is_none() {
                    stats.open += 1;
                }
            }
            RequestStatus::Confirmed => stats.incoming += 1,
            RequestStatus::Started => stats.ongoing += 1,
            RequestStatus::Completed => {
                stats.completed += 1;
                stats.total_spend += request.offering_rupees;
            }
            RequestStatus::Cancelled => stats.cancelled += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::tests::sample_request;

    fn with_status(status: RequestStatus, assigned: Option<Uuid>, rupees: i64) -> ConsultationRequest {
        let mut request = sample_request(&assigned.into_iter().collect::<Vec<_>>());
        request.status = status;
        request.assigned_doctor_id = assigned;
        request.offering_rupees = Decimal::new(rupees, 0);
        request
    }

    #[test]
    fn test_doctor_earnings_only_count_completed() {
        let doctor = Uuid::new_v4();
        let assigned = vec![
            with_status(RequestStatus::Confirmed, Some(doctor), 300),
            with_status(RequestStatus::Started, Some(doctor), 400),
            with_status(RequestStatus::Completed, Some(doctor), 500),
            with_status(RequestStatus::Completed, Some(doctor), 250),
            with_status(RequestStatus::Completed, Some(Uuid::new_v4()), 9999),
        ];

        let mut open = sample_request(&[doctor]);
        open.status = RequestStatus::Accepted;
        open.accepted_by_user_ids.insert(doctor);

        let stats = aggregate_doctor(doctor, &[open], &assigned);
        assert_eq!(stats.accepted_pending_confirmation, 1);
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.ongoing, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.total_earnings, Decimal::new(750, 0));
    }

    #[test]
    fn test_host_buckets() {
        let doctor = Some(Uuid::new_v4());
        let created = vec![
            with_status(RequestStatus::Pending, None, 100),
            with_status(RequestStatus::Accepted, None, 100),
            with_status(RequestStatus::Confirmed, doctor, 200),
            with_status(RequestStatus::Started, doctor, 300),
            with_status(RequestStatus::Completed, doctor, 400),
            with_status(RequestStatus::Cancelled, None, 500),
        ];

        let stats = aggregate_host(&created);
        assert_eq!(
            stats,
            HostRequestStats {
                open: 2,
                incoming: 1,
                ongoing: 1,
                completed: 1,
                cancelled: 1,
                total_spend: Decimal::new(400, 0),
            }
        );
    }
}
