pub mod acceptance;
pub mod clinic;
pub mod lifecycle;
pub mod query;
pub mod statistics;
pub mod store;
pub mod workflow;

pub use acceptance::{AcceptanceOutcome, AcceptanceTracker, DeclineOutcome};
pub use clinic::{ClinicDirectory, InMemoryClinicDirectory, SupabaseClinicDirectory};
pub use lifecycle::{NotificationKind, PlannedNotification, RequestLifecycle, TransitionOutcome};
pub use query::RequestQueryService;
pub use statistics::RequestStatisticsService;
pub use store::{InMemoryRequestStore, RequestStore, SupabaseRequestStore, SwapOutcome};
pub use workflow::ConsultationRequestService;
