//! Collaborators supplied by the host application

use std::io;
use std::path::{Path, PathBuf};

/// Resolves a package bin to an executable path on disk
///
/// Implementations must be deterministic and free of side effects.
pub trait BinaryResolver: Send + Sync {
    fn resolve(&self, package: &str, bin: &str, base_path: &Path) -> io::Result<PathBuf>;
}

impl<F> BinaryResolver for F
where
    F: Fn(&str, &str, &Path) -> io::Result<PathBuf> + Send + Sync,
{
    fn resolve(&self, package: &str, bin: &str, base_path: &Path) -> io::Result<PathBuf> {
        self(package, bin, base_path)
    }
}

/// Hands out TCP ports for server-style tools before they are launched
pub trait PortAllocator: Send + Sync {
    fn allocate(&self) -> io::Result<u16>;
}
