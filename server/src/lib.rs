pub mod auth;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
