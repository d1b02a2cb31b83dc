use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{ArchiveDecoder, Certificate, Pkcs12Decoder};
use crate::error::RegistryError;
use crate::signing::DetachedSigner;

/// Named signing identities, loaded once at startup.
///
/// Registration needs `&mut self` while lookups only need `&self`, so once
/// the registry is shared behind an `Arc` it can no longer change and any
/// number of workers may resolve identities concurrently.
pub struct CertificateRegistry {
    decoder: Box<dyn ArchiveDecoder>,
    certs: HashMap<String, Arc<Certificate>>,
}

impl CertificateRegistry {
    pub fn new(decoder: impl ArchiveDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            certs: HashMap::new(),
        }
    }

    /// Reads and decodes the archive at `path`, registering it as `name`.
    pub fn load(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
        password: &str,
    ) -> Result<(), RegistryError> {
        if self.certs.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let path = path.as_ref();
        let archive = std::fs::read(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cert = self
            .decoder
            .decode(&archive, password)
            .map_err(|source| RegistryError::Decode {
                name: name.to_string(),
                source,
            })?;

        info!("loaded certificate '{}' ({}) from {}", name, cert.subject(), path.display());
        self.insert(name, cert)
    }

    /// Registers an already decoded identity.
    pub fn insert(&mut self, name: &str, cert: Certificate) -> Result<(), RegistryError> {
        match self.certs.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(cert));
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Certificate>, RegistryError> {
        self.certs
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.certs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

impl Default for CertificateRegistry {
    fn default() -> Self {
        Self::new(Pkcs12Decoder)
    }
}
