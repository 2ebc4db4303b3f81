pub mod board;
pub mod dashboard;
pub mod doctor;

pub use board::categorize;
pub use dashboard::compute_dashboard;
pub use doctor::DoctorService;
