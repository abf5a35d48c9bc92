pub mod error_classifier;
pub mod hooks;
pub mod main_writer;
pub mod orchestrator;
pub mod relationships;
pub mod validator;

pub use error_classifier::*;
pub use hooks::*;
pub use main_writer::*;
pub use orchestrator::*;
pub use relationships::*;
pub use validator::*;
