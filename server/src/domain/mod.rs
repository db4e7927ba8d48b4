pub mod policy;
pub mod pricing;
pub mod scheduling;
