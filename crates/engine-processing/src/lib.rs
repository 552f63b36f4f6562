pub mod error;
pub mod intake;
pub mod posting;
pub mod registration;

pub use error::ProcessingError;
pub use intake::IntakeTracker;
pub use registration::register;
