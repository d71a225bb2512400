pub mod commands;
pub mod config;
pub mod error;
pub mod maven;
pub mod repo;
pub mod resolver;
pub mod util;
pub mod vault;

pub use config::LauncherConfig;
pub use error::{Error, Result};
pub use resolver::{ResolutionDriver, ResolutionOutcome};
