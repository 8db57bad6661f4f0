pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;

pub use error::{AppError, AppResult};
pub use models::{NewReport, Report, ReportStatus};
pub use response::ApiResponse;
pub use services::report::ReportService;
pub use services::store::{ReportStore, StoreError};
