pub mod booking;
pub mod lifecycle;
pub mod policy;
pub mod requests;
pub mod store;

pub use booking::ConsultationService;
pub use lifecycle::ConsultationLifecycle;
pub use policy::CancellationPolicy;
pub use requests::RequestWorkflowService;
