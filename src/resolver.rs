//! Concurrent resolution of a root artifact and the dependencies declared in its manifest

pub mod artifact_resolver;
pub mod context;
pub mod driver;
pub mod progress;
pub mod report;

pub use artifact_resolver::Resolver;
pub use context::ResolutionContext;
pub use driver::{ResolutionDriver, ResolutionOutcome};
pub use report::{ResolvedArtifact, Summary};
