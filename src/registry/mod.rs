/// Household registry core
///
/// Person records, the role-scoped edit policy, household propagation,
/// verification and statistics.

pub mod person;
pub mod policy;
pub mod propagation;
pub mod service;
pub mod stats;
pub mod store;
pub mod verification;

pub use person::{Person, PersonChanges};
pub use propagation::{HouseholdFields, PropagationReport};
pub use service::{DeleteOutcome, EditOutcome, EditScope, ListQuery, RegistryService};
pub use stats::{RegistryStatistics, StatisticsAggregator};
pub use verification::{VerificationStamp, VerificationState};
