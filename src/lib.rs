pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod runner;
pub mod store;

// Export error types
pub use error::{ErrorCode, ErrorResponse, SaveError};

// Export logic types
pub use logic::{
    ErrorClassifier, MainRecordWriter, NoHooks, RelationshipReconciler, SaveContext, SaveEndpoint,
    SaveHooks, SaveOrchestrator, SaveValidator, ValidatedSave,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, ModelRegistry, ModelResolver, ModelStore, Session};

pub use runner::{build_orchestrators, run_requests};
