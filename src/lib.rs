pub mod backup;
pub mod candidate;
pub mod config;
pub mod engine;
pub mod error;
pub mod ignore;
pub mod platform;
pub mod policy;
pub mod progress;
pub mod resource;
pub mod scanner;

pub use crate::config::AppConfig;
pub use engine::{CollectionRun, RunSummary, UserDirs};
pub use error::Error;
pub use progress::{RunReporter, SilentReporter};
