use p12_keystore::KeyStore;
use p12_keystore::error::Error as KeyStoreError;
use rsa::RsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use x509_parser::prelude::*;

use super::{ArchiveDecoder, Certificate};
use crate::error::ArchiveError;
use crate::signing::RsaSigner;

/// Decodes PKCS#12 (`.pfx` / `.p12`) archives holding an RSA key.
///
/// Handles the OpenSSL 3 defaults (PBES2 with AES-256-CBC, HMAC-SHA-256 MAC)
/// as well as legacy PBE-SHA1-3DES exports.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs12Decoder;

impl From<KeyStoreError> for ArchiveError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::MacError(_) => ArchiveError::Mac,
            KeyStoreError::UnsupportedEncryptionScheme
            | KeyStoreError::UnsupportedMacAlgorithm
            | KeyStoreError::UnsupportedContentType
            | KeyStoreError::UnsupportedCertificateType => ArchiveError::Unsupported(e.to_string()),
            other => ArchiveError::Parse(other.to_string()),
        }
    }
}

impl ArchiveDecoder for Pkcs12Decoder {
    fn decode(&self, archive: &[u8], password: &str) -> Result<Certificate, ArchiveError> {
        let keystore = KeyStore::from_pkcs12(archive, password)?;
        let (_, key_chain) = keystore
            .private_key_chain()
            .ok_or(ArchiveError::Missing("private key"))?;

        let private_key = RsaPrivateKey::from_pkcs8_der(key_chain.key())
            .map_err(|e| ArchiveError::Key(e.to_string()))?;
        let signer = RsaSigner::from_key(private_key);

        let mut chain: Vec<Vec<u8>> = key_chain
            .chain()
            .iter()
            .map(|cert| cert.as_der().to_vec())
            .collect();
        if chain.is_empty() {
            return Err(ArchiveError::Missing("certificate"));
        }

        // The leaf is the certificate carrying our public key; keep it first.
        let public_key = signer
            .public_key_der()
            .map_err(|e| ArchiveError::Key(e.to_string()))?;
        let mut leaf = None;
        for (index, der) in chain.iter().enumerate() {
            let (_, cert) = X509Certificate::from_der(der)
                .map_err(|e| ArchiveError::Certificate(e.to_string()))?;
            if cert.public_key().raw == public_key.as_slice() {
                leaf = Some((index, cert.subject().to_string()));
                break;
            }
        }
        let (index, subject) = leaf.ok_or(ArchiveError::Missing("certificate matching the key"))?;
        chain.swap(0, index);

        Ok(Certificate::new(signer, chain, subject))
    }
}
