pub mod ai;
pub mod duration;
pub mod lifecycle;
pub mod notification;
pub mod prescription;

pub use ai::PrescriptionAiService;
pub use duration::normalize_duration;
pub use lifecycle::PrescriptionLifecycleService;
pub use notification::NotificationService;
pub use prescription::PrescriptionService;
