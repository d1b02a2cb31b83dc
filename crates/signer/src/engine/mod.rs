//! The document engine boundary.
//!
//! The signing pipeline never looks inside a document. It drives an engine
//! through the [`DocumentEngine`] and [`Document`] traits, which expose just
//! the operations signing needs: open, protection state, building an
//! encrypted copy, appending signature fields and serialization.

mod envelope;

pub use envelope::{EnvelopeDocument, EnvelopeEngine, SealedField};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::props::{SignCoords, SignProps, SignStyle};
use crate::signing::DetachedSigner;

bitflags! {
    /// Operations a protected document still allows.
    ///
    /// Bit positions follow the PDF standard security handler `/P` entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// Bit 3: print (possibly degraded).
        const PRINT = 1 << 2;
        /// Bit 4: modify contents.
        const MODIFY = 1 << 3;
        /// Bit 5: copy or extract text and graphics.
        const EXTRACT_GRAPHICS = 1 << 4;
        /// Bit 6: add or modify annotations.
        const ANNOTATE = 1 << 5;
        /// Bit 9: fill in form fields.
        const FILL_FORMS = 1 << 8;
        /// Bit 10: extract for accessibility.
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        /// Bit 11: insert, rotate or reorder pages.
        const ASSEMBLE = 1 << 10;
        /// Bit 12: faithful, high quality print.
        const PRINT_HIGH_QUALITY = 1 << 11;

        /// Everything the lock stage grants.
        const LOCKED_DEFAULT = Self::PRINT.bits()
            | Self::PRINT_HIGH_QUALITY.bits()
            | Self::MODIFY.bits()
            | Self::ANNOTATE.bits()
            | Self::FILL_FORMS.bits()
            | Self::ASSEMBLE.bits()
            | Self::EXTRACT_GRAPHICS.bits()
            | Self::EXTRACT_ACCESSIBILITY.bits();
    }
}

/// Field rectangle in page user-space units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureLine {
    pub key: String,
    pub value: String,
}

/// Everything rendered into one signature field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureField {
    pub name: String,
    pub reason: String,
    pub location: String,
    pub rect: Rect,
    pub style: SignStyle,
    pub lines: Vec<SignatureLine>,
    pub signed_at: DateTime<Utc>,
}

impl SignatureField {
    pub fn new(props: &SignProps, coords: &SignCoords, signed_at: DateTime<Utc>) -> Self {
        Self {
            name: props.name.clone(),
            reason: props.reason.clone(),
            location: props.location.clone(),
            rect: coords.rect(),
            style: props.style.clone(),
            lines: props
                .annotation_lines()
                .map(|(key, value)| SignatureLine {
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            signed_at,
        }
    }
}

/// An open document owned by exactly one signing call.
pub trait Document: Send {
    fn is_protected(&self) -> bool;

    /// Unlocks a protected document. Returns `false` when the password is
    /// rejected. Unprotected documents are always unlocked.
    fn unlock(&mut self, password: &[u8]) -> Result<bool, EngineError>;

    /// Rebuilds the document encrypted with `password` as both owner and
    /// user secret, returning the serialized copy.
    fn build_encrypted_copy(
        &self,
        password: &[u8],
        permissions: Permissions,
    ) -> Result<Vec<u8>, EngineError>;

    /// Appends a signature field on `page` (1-based), signed by `signer`.
    fn append_signature_field(
        &mut self,
        page: u32,
        field: &SignatureField,
        signer: &dyn DetachedSigner,
    ) -> Result<(), EngineError>;

    fn serialize(&self) -> Result<Vec<u8>, EngineError>;
}

pub trait DocumentEngine: Send + Sync {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Document>, EngineError>;

    /// Media type of serialized documents.
    fn media_type(&self) -> &'static str;
}
