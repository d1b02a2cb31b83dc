use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::engine::{Document, DocumentEngine, Permissions, SignatureField};
use crate::error::{EngineError, SignError};
use crate::identity::{Certificate, CertificateRegistry};
use crate::props::SignProps;

/// Runs a document through resolve → open → lock → sign → serialize.
///
/// Each stage short-circuits on failure. Nothing is shared between calls
/// except the read-only registry, so any number of pipelines may run at once.
pub struct SigningPipeline<'a> {
    registry: &'a CertificateRegistry,
    engine: &'a dyn DocumentEngine,
}

impl<'a> SigningPipeline<'a> {
    pub fn new(registry: &'a CertificateRegistry, engine: &'a dyn DocumentEngine) -> Self {
        Self { registry, engine }
    }

    pub fn resolve(&self, certificate_name: &str) -> Result<Arc<Certificate>, SignError> {
        self.registry
            .lookup(certificate_name)
            .map_err(|_| SignError::UnknownCertificate(certificate_name.to_string()))
    }

    pub fn sign(
        &self,
        certificate_name: &str,
        props: &SignProps,
        password: &[u8],
        document: Vec<u8>,
    ) -> Result<Vec<u8>, SignError> {
        let cert = self.resolve(certificate_name)?;
        self.sign_with(&cert, props, password, document)
    }

    /// Signs with an already resolved identity.
    pub fn sign_with(
        &self,
        cert: &Certificate,
        props: &SignProps,
        password: &[u8],
        document: Vec<u8>,
    ) -> Result<Vec<u8>, SignError> {
        let mut doc = self.engine.open(document).map_err(|e| {
            warn!("error opening document: {e}");
            SignError::Open(e)
        })?;

        if !password.is_empty() {
            doc = self.lock(doc.as_ref(), password)?;
        }

        embed_signatures(doc.as_mut(), cert, props).map_err(|e| {
            warn!("error signing document: {e}");
            SignError::Sign(e)
        })?;

        doc.serialize().map_err(SignError::Sign)
    }

    /// Protects the document, then re-opens and unlocks the protected bytes
    /// so signing works on exactly what a verifier will later open.
    fn lock(&self, doc: &dyn Document, password: &[u8]) -> Result<Box<dyn Document>, SignError> {
        if doc.is_protected() {
            return Err(SignError::AlreadyProtected);
        }

        let locked = doc
            .build_encrypted_copy(password, Permissions::LOCKED_DEFAULT)
            .map_err(|e| {
                warn!("error locking document with password: {e}");
                SignError::Lock(e)
            })?;
        debug!("document locked, {} bytes", locked.len());

        let mut reopened = self.engine.open(locked).map_err(|e| {
            warn!("error re-opening document after locking: {e}");
            SignError::Lock(e)
        })?;
        match reopened.unlock(password) {
            Ok(true) => Ok(reopened),
            Ok(false) => {
                warn!("password rejected while re-reading locked document");
                Err(SignError::Lock(EngineError::Crypto(
                    "password rejected after locking".to_string(),
                )))
            }
            Err(e) => {
                warn!("error re-reading document after locking: {e}");
                Err(SignError::Lock(e))
            }
        }
    }
}

/// Attaches one field per coordinate block and page. The first failure
/// aborts, and the caller drops the partially signed document.
fn embed_signatures(
    doc: &mut dyn Document,
    cert: &Certificate,
    props: &SignProps,
) -> Result<(), EngineError> {
    let signed_at = Utc::now();
    for coords in &props.coords {
        let field = SignatureField::new(props, coords, signed_at);
        for &page in &coords.pages {
            doc.append_signature_field(page, &field, cert)?;
        }
    }
    debug!("embedded {} signature fields", props.field_count());
    Ok(())
}
