#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod progress_service;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use config::ProgressConfig;
pub use error::{AppServicesError, ProgressServiceError};
pub use progress_service::{ProgressService, StudentDashboard};
