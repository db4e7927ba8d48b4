//! SQL access, one repository per aggregate.
//!
//! Functions that may run inside a transaction take `impl PgExecutor`, so
//! callers pass either `&pool` or `&mut *tx`.

mod availability_repo;
mod campaign_repo;
mod lesson_repo;
mod payment_repo;
mod profile_repo;
mod user_repo;

pub use availability_repo::AvailabilityRepo;
pub use campaign_repo::CampaignRepo;
pub use lesson_repo::LessonRepo;
pub use payment_repo::PaymentRepo;
pub use profile_repo::ProfileRepo;
pub use user_repo::UserRepo;
