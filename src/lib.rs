pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod parser;
pub mod pending;
pub mod store;
pub mod timestamps;
pub mod watcher;

pub use config::Config;
pub use error::{IngestError, IngestResult};
pub use store::ActivityStore;
pub use watcher::{Orchestrator, WatchRoot};
