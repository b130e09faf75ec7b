//! Host collaborators for running tools from a project directory

use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use tooldeck_process::{BinaryResolver, PortAllocator};
use tracing::debug;

/// Resolves `<base>/node_modules/.bin/<bin>`, falling back to `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeModulesResolver;

impl NodeModulesResolver {
    fn local_candidates(base_path: &Path, bin: &str) -> Vec<PathBuf> {
        let dir = base_path.join("node_modules").join(".bin");
        let mut candidates = vec![dir.join(bin)];
        if cfg!(windows) {
            candidates.push(dir.join(format!("{bin}.cmd")));
        }
        candidates
    }
}

impl BinaryResolver for NodeModulesResolver {
    fn resolve(&self, package: &str, bin: &str, base_path: &Path) -> io::Result<PathBuf> {
        if let Some(local) = Self::local_candidates(base_path, bin)
            .into_iter()
            .find(|candidate| candidate.is_file())
        {
            debug!(package, path = %local.display(), "Resolved local bin");
            return Ok(local);
        }

        which::which(bin).map_err(|e| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "{bin} not found under {} or on PATH: {e}",
                    base_path.join("node_modules").join(".bin").display()
                ),
            )
        })
    }
}

/// Allocates a free TCP port on the loopback interface
///
/// The port is released again before returning, so another process could in
/// principle grab it before the tool binds it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackPortAllocator;

impl PortAllocator for LoopbackPortAllocator {
    fn allocate(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Replace every `{port}` placeholder in `args`
pub fn substitute_port(args: &[String], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter().map(|arg| arg.replace("{port}", &port)).collect()
}
