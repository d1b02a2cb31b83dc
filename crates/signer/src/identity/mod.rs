mod pkcs12;
mod registry;

pub use pkcs12::Pkcs12Decoder;
pub use registry::CertificateRegistry;

use std::fmt;

use crate::error::ArchiveError;
use crate::signing::{DetachedSigner, RSA_ALGORITHM, RsaSigner};

/// A signing identity: private key plus its certificate chain.
///
/// Immutable once decoded. The registry hands out shared references, so
/// the same identity may sign any number of documents concurrently.
#[derive(Clone)]
pub struct Certificate {
    signer: RsaSigner,
    chain: Vec<Vec<u8>>,
    subject: String,
}

impl Certificate {
    pub fn new(signer: RsaSigner, chain: Vec<Vec<u8>>, subject: impl Into<String>) -> Self {
        Self {
            signer,
            chain,
            subject: subject.into(),
        }
    }

    pub fn key(&self) -> &RsaSigner {
        &self.signer
    }
}

impl DetachedSigner for Certificate {
    fn sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.signer.sign(data))
    }

    fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn algorithm(&self) -> &str {
        RSA_ALGORITHM
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// Decodes a password-protected identity archive.
pub trait ArchiveDecoder: Send + Sync {
    fn decode(&self, archive: &[u8], password: &str) -> Result<Certificate, ArchiveError>;
}
