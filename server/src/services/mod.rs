pub mod gateway;
pub mod lessons;
pub mod meetings;
pub mod notifications;
pub mod payments;
