use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ConfigError, RegistryError};
use crate::identity::CertificateRegistry;

/// One `--pfx` argument: `NAME=PATH`, or a bare `PATH` named after its file
/// stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfxSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for PfxSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPfxSpec(s.to_string());
        let s = s.trim();

        if let Some((name, path)) = s.split_once('=') {
            let (name, path) = (name.trim(), path.trim());
            if name.is_empty() || path.is_empty() {
                return Err(invalid());
            }
            return Ok(PfxSpec {
                name: name.to_string(),
                path: PathBuf::from(path),
            });
        }

        let path = PathBuf::from(s);
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        Ok(PfxSpec { name, path })
    }
}

/// Builds the registry from every configured archive. The first failure
/// aborts, naming the archive that caused it.
pub fn load_registry(specs: &[PfxSpec], password: &str) -> Result<CertificateRegistry, RegistryError> {
    let mut registry = CertificateRegistry::default();
    for spec in specs {
        registry.load(&spec.name, &spec.path, password)?;
    }
    Ok(registry)
}
