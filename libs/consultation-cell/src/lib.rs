pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use services::booking::ConsultationService;
pub use services::lifecycle::ConsultationLifecycle;
pub use services::policy::CancellationPolicy;
pub use services::requests::RequestWorkflowService;
