//! Bundle of collaborators threaded through a conversion run.

use crate::artifacts::ArtifactStore;
use crate::context::ContextProvider;
use crate::packages::PackageRegistry;

/// Everything a sub-converter may consult or contribute to while it runs:
/// the document context, the package registry, and the auxiliary file
/// sink. One bundle lives for the duration of a conversion call.
#[derive(Debug)]
pub struct Services<'a> {
    pub context: &'a dyn ContextProvider,
    pub packages: &'a mut PackageRegistry,
    pub files: &'a mut ArtifactStore,
}

impl Services<'_> {
    /// Reborrows the bundle for a nested conversion pass.
    pub fn reborrow(&mut self) -> Services<'_> {
        Services {
            context: self.context,
            packages: &mut *self.packages,
            files: &mut *self.files,
        }
    }
}
