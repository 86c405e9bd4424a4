pub mod directory;
pub mod eligibility;

pub use directory::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
pub use eligibility::EligibilityResolver;
