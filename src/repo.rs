pub mod cache;
pub mod connector;
pub mod descriptor;
pub mod transport;

pub use connector::RepositoryConnector;
pub use descriptor::{RepositoryDescriptor, RepositoryRegistry};
