//! A sealed-envelope document container.
//!
//! ```text
//! %SIGNED-ENVELOPE-1\n
//! {"protection":{...},"fields":[...]}\n
//! <payload>
//! ```
//!
//! Input without the magic line is a plain document whose content is the
//! raw bytes. Protection encrypts the payload with AES-256-GCM under a key
//! derived from a random salt and the password. Signature fields live in
//! the header; each one carries a detached signature over the plaintext
//! content followed by the field's own metadata.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Document, DocumentEngine, Permissions, SignatureField};
use crate::error::EngineError;
use crate::signing::DetachedSigner;

const MAGIC: &[u8] = b"%SIGNED-ENVELOPE-1\n";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeEngine;

impl DocumentEngine for EnvelopeEngine {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Document>, EngineError> {
        Ok(Box::new(EnvelopeDocument::parse(bytes)?))
    }

    fn media_type(&self) -> &'static str {
        "application/octet-stream"
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protection: Option<Protection>,
    #[serde(default)]
    fields: Vec<SealedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Protection {
    salt: String,
    nonce: String,
    permissions: u32,
}

/// A signature field as stored in the envelope header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedField {
    pub page: u32,
    pub field: SignatureField,
    pub subject: String,
    pub algorithm: String,
    /// Base64 DER certificates, leaf first.
    pub certificates: Vec<String>,
    /// Hex SHA-256 of the signed payload.
    pub digest: String,
    /// Base64 detached signature.
    pub signature: String,
}

impl SealedField {
    /// Bytes covered by the signature of a field on `page`.
    pub fn signed_payload(
        content: &[u8],
        page: u32,
        field: &SignatureField,
    ) -> Result<Vec<u8>, EngineError> {
        let meta = serde_json::to_vec(&(page, field))
            .map_err(|e| EngineError::Malformed(format!("encoding field metadata: {e}")))?;
        let mut payload = Vec::with_capacity(content.len() + meta.len());
        payload.extend_from_slice(content);
        payload.extend_from_slice(&meta);
        Ok(payload)
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, EngineError> {
        STANDARD
            .decode(&self.signature)
            .map_err(|e| EngineError::Malformed(format!("invalid signature encoding: {e}")))
    }
}

enum Content {
    Plain(Vec<u8>),
    Protected {
        ciphertext: Vec<u8>,
        plaintext: Option<Vec<u8>>,
    },
}

pub struct EnvelopeDocument {
    header: Header,
    content: Content,
}

impl EnvelopeDocument {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, EngineError> {
        if bytes.is_empty() {
            return Err(EngineError::Malformed("empty document".to_string()));
        }
        let Some(rest) = bytes.strip_prefix(MAGIC) else {
            return Ok(Self {
                header: Header::default(),
                content: Content::Plain(bytes),
            });
        };

        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| EngineError::Malformed("unterminated envelope header".to_string()))?;
        let header: Header = serde_json::from_slice(&rest[..end])
            .map_err(|e| EngineError::Malformed(format!("invalid envelope header: {e}")))?;
        let payload = rest[end + 1..].to_vec();

        let content = match header.protection {
            Some(_) => Content::Protected {
                ciphertext: payload,
                plaintext: None,
            },
            None => Content::Plain(payload),
        };
        Ok(Self { header, content })
    }

    pub fn fields(&self) -> &[SealedField] {
        &self.header.fields
    }

    /// Plaintext content, if the document is unprotected or unlocked.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.content {
            Content::Plain(bytes) => Some(bytes),
            Content::Protected { plaintext, .. } => plaintext.as_deref(),
        }
    }

    pub fn permissions(&self) -> Option<Permissions> {
        self.header
            .protection
            .as_ref()
            .map(|p| Permissions::from_bits_truncate(p.permissions))
    }

    fn write(header: &Header, payload: &[u8]) -> Result<Vec<u8>, EngineError> {
        let header = serde_json::to_vec(header)
            .map_err(|e| EngineError::Malformed(format!("encoding envelope header: {e}")))?;
        let mut out = Vec::with_capacity(MAGIC.len() + header.len() + 1 + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&header);
        out.push(b'\n');
        out.extend_from_slice(payload);
        Ok(out)
    }
}

fn derive_key(salt: &[u8], password: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password);
    hasher.finalize().into()
}

fn cipher(key: &[u8; 32]) -> Result<Aes256Gcm, EngineError> {
    Aes256Gcm::new_from_slice(key).map_err(|e| EngineError::Crypto(e.to_string()))
}

impl Document for EnvelopeDocument {
    fn is_protected(&self) -> bool {
        self.header.protection.is_some()
    }

    fn unlock(&mut self, password: &[u8]) -> Result<bool, EngineError> {
        let Content::Protected {
            ciphertext,
            plaintext,
        } = &mut self.content
        else {
            return Ok(true);
        };
        if plaintext.is_some() {
            return Ok(true);
        }
        let protection = self
            .header
            .protection
            .as_ref()
            .ok_or_else(|| EngineError::Malformed("missing protection header".to_string()))?;

        let salt = hex::decode(&protection.salt)
            .map_err(|e| EngineError::Malformed(format!("invalid salt: {e}")))?;
        let nonce = hex::decode(&protection.nonce)
            .map_err(|e| EngineError::Malformed(format!("invalid nonce: {e}")))?;
        if nonce.len() != NONCE_LEN {
            return Err(EngineError::Malformed(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }

        let key = derive_key(&salt, password);
        match cipher(&key)?.decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice()) {
            Ok(decrypted) => {
                *plaintext = Some(decrypted);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn build_encrypted_copy(
        &self,
        password: &[u8],
        permissions: Permissions,
    ) -> Result<Vec<u8>, EngineError> {
        let content = self.content().ok_or(EngineError::Locked)?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut salt);
        rand::rng().fill_bytes(&mut nonce);

        let key = derive_key(&salt, password);
        let ciphertext = cipher(&key)?
            .encrypt(Nonce::from_slice(&nonce), content)
            .map_err(|e| EngineError::Crypto(format!("encryption failed: {e}")))?;

        let header = Header {
            protection: Some(Protection {
                salt: hex::encode(salt),
                nonce: hex::encode(nonce),
                permissions: permissions.bits(),
            }),
            fields: self.header.fields.clone(),
        };
        Self::write(&header, &ciphertext)
    }

    fn append_signature_field(
        &mut self,
        page: u32,
        field: &SignatureField,
        signer: &dyn DetachedSigner,
    ) -> Result<(), EngineError> {
        if page == 0 {
            return Err(EngineError::InvalidPage(page));
        }
        let content = self.content().ok_or(EngineError::Locked)?;

        let payload = SealedField::signed_payload(content, page, field)?;
        let digest = hex::encode(Sha256::digest(&payload));
        let signature = signer
            .sign(&payload)
            .map_err(|e| EngineError::Signer(e.to_string()))?;

        self.header.fields.push(SealedField {
            page,
            field: field.clone(),
            subject: signer.subject().to_string(),
            algorithm: signer.algorithm().to_string(),
            certificates: signer
                .certificate_chain()
                .iter()
                .map(|der| STANDARD.encode(der))
                .collect(),
            digest,
            signature: STANDARD.encode(signature),
        });
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        match &self.content {
            // Untouched plain input round-trips byte for byte.
            Content::Plain(bytes) if self.header.fields.is_empty() => Ok(bytes.clone()),
            Content::Plain(bytes) => Self::write(&self.header, bytes),
            Content::Protected { ciphertext, .. } => Self::write(&self.header, ciphertext),
        }
    }
}
