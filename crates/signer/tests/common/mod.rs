#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use simple_signer::engine::{Document, DocumentEngine, Permissions, SignatureField};
use simple_signer::error::EngineError;
use simple_signer::props::{SignCoords, SignProps};
use simple_signer::signing::DetachedSigner;
use simple_signer::{Certificate, CertificateRegistry, RsaSigner, SignerContext};

pub const CERT_NAME: &str = "alice";
pub const SUBJECT: &str = "CN=Test Signer";

static CERT: LazyLock<Certificate> = LazyLock::new(|| {
    let key = RsaSigner::from_seed("integration-tests").unwrap();
    Certificate::new(key, vec![vec![0x30, 0x03, 0x02, 0x01, 0x01]], SUBJECT)
});

pub fn test_certificate() -> Certificate {
    CERT.clone()
}

pub fn test_registry() -> CertificateRegistry {
    let mut registry = CertificateRegistry::default();
    registry.insert(CERT_NAME, test_certificate()).unwrap();
    registry
}

/// One coordinate block spanning pages 1 and 2.
pub fn sample_props() -> SignProps {
    SignProps::from_json(
        br##"{
            "name": "Jane Doe",
            "reason": "Approved",
            "location": "Head office",
            "annotations": [{"Department": "Legal"}],
            "style": {"fontSize": 9, "bgColor": "#eee"},
            "coords": [{"pages": [1, 2], "x1": 10, "y1": 10, "x2": 210, "y2": 70}]
        }"##,
    )
    .unwrap()
}

pub fn test_context(engine: impl DocumentEngine + 'static) -> Arc<SignerContext> {
    Arc::new(SignerContext::new(test_registry(), engine, sample_props()))
}

/// Engine double driven by markers in the document bytes.
///
/// * empty input or a `MALFORMED` prefix fails to open;
/// * a `PROTECTED:<password>\n` prefix opens as a protected document;
/// * content containing `FAIL-SIGN` fails every signature field.
///
/// Signing appends one `#field <page> <subject>` line per field.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    opened: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` on every open.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl DocumentEngine for ScriptedEngine {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Document>, EngineError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if bytes.is_empty() || bytes.starts_with(b"MALFORMED") {
            return Err(EngineError::Malformed("scripted open failure".into()));
        }

        if let Some(rest) = bytes.strip_prefix(b"PROTECTED:") {
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            return Ok(Box::new(ScriptedDocument {
                password: Some(rest[..end].to_vec()),
                unlocked: false,
                content: rest.get(end + 1..).unwrap_or_default().to_vec(),
            }));
        }
        Ok(Box::new(ScriptedDocument {
            password: None,
            unlocked: true,
            content: bytes,
        }))
    }

    fn media_type(&self) -> &'static str {
        "application/x-scripted"
    }
}

struct ScriptedDocument {
    password: Option<Vec<u8>>,
    unlocked: bool,
    content: Vec<u8>,
}

impl Document for ScriptedDocument {
    fn is_protected(&self) -> bool {
        self.password.is_some()
    }

    fn unlock(&mut self, password: &[u8]) -> Result<bool, EngineError> {
        self.unlocked = self.password.as_deref().is_none_or(|p| p == password);
        Ok(self.unlocked)
    }

    fn build_encrypted_copy(
        &self,
        password: &[u8],
        _permissions: Permissions,
    ) -> Result<Vec<u8>, EngineError> {
        let mut out = b"PROTECTED:".to_vec();
        out.extend_from_slice(password);
        out.push(b'\n');
        out.extend_from_slice(&self.content);
        Ok(out)
    }

    fn append_signature_field(
        &mut self,
        page: u32,
        _field: &SignatureField,
        signer: &dyn DetachedSigner,
    ) -> Result<(), EngineError> {
        if !self.unlocked {
            return Err(EngineError::Locked);
        }
        if self.content.windows(9).any(|w| w == b"FAIL-SIGN") {
            return Err(EngineError::Signer("scripted signing failure".into()));
        }
        self.content
            .extend_from_slice(format!("\n#field {page} {}", signer.subject()).as_bytes());
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        match &self.password {
            Some(password) => {
                let mut out = b"PROTECTED:".to_vec();
                out.extend_from_slice(password);
                out.push(b'\n');
                out.extend_from_slice(&self.content);
                Ok(out)
            }
            None => Ok(self.content.clone()),
        }
    }
}
