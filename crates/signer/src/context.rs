use crate::engine::DocumentEngine;
use crate::identity::CertificateRegistry;
use crate::pipeline::SigningPipeline;
use crate::props::SignProps;

/// Everything a signing front end needs, built once at startup.
///
/// Shared behind an `Arc` by the batch pool and the HTTP handlers. All of
/// it is read-only after construction.
pub struct SignerContext {
    registry: CertificateRegistry,
    engine: Box<dyn DocumentEngine>,
    default_props: SignProps,
}

impl SignerContext {
    pub fn new(
        registry: CertificateRegistry,
        engine: impl DocumentEngine + 'static,
        default_props: SignProps,
    ) -> Self {
        Self {
            registry,
            engine: Box::new(engine),
            default_props,
        }
    }

    pub fn pipeline(&self) -> SigningPipeline<'_> {
        SigningPipeline::new(&self.registry, self.engine.as_ref())
    }

    pub fn registry(&self) -> &CertificateRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &dyn DocumentEngine {
        self.engine.as_ref()
    }

    pub fn default_props(&self) -> &SignProps {
        &self.default_props
    }
}
