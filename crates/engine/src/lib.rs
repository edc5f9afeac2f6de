//! `engine` crate — operation registry, request building and the batch
//! dispatcher for the LEDGERS accounting API.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod operations;
pub mod options;
pub mod transforms;

pub use dispatcher::{validate_items, DispatchConfig, Dispatcher, ValidationOutcome};
pub use error::EngineError;
pub use models::{AddressKind, InputItem, Operation, OutputItem};
pub use operations::{prepare, Prepared, RequestPlan};
pub use options::{OptionItem, OptionProvider, OptionSource};
