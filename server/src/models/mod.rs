pub mod availability;
pub mod campaign;
pub mod lesson;
pub mod payment;
pub mod profile;
pub mod user;
