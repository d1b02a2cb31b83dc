pub mod batch;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod identity;
pub mod pipeline;
pub mod props;
pub mod server;
pub mod signing;
pub mod stats;

pub use batch::{BatchOptions, BatchReport, Job, run_batch};
pub use context::SignerContext;
pub use engine::{Document, DocumentEngine, EnvelopeEngine};
pub use error::{ServerError, SignError};
pub use handler::RequestHandler;
pub use identity::{Certificate, CertificateRegistry};
pub use pipeline::SigningPipeline;
pub use props::SignProps;
pub use server::{AppState, Envelope, run, router};
pub use signing::{DetachedSigner, RsaSigner};
pub use stats::{StatsSnapshot, StatsTracker};
