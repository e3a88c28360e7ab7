pub mod artifacts;
pub mod context;
pub mod packages;
pub mod services;

pub use artifacts::ArtifactStore;
pub use context::{ContextProvider, StaticContext};
pub use packages::{Package, PackageError, PackageRegistry};
pub use services::Services;
