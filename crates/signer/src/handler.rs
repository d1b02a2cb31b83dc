use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::context::SignerContext;
use crate::error::ServerError;
use crate::props::SignProps;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Signs single documents on behalf of the HTTP front end.
///
/// Requests run concurrently on the blocking thread pool and do not touch
/// the batch counters.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<SignerContext>,
    deadline: Duration,
}

impl RequestHandler {
    pub fn new(context: Arc<SignerContext>, deadline: Duration) -> Self {
        Self { context, deadline }
    }

    pub fn context(&self) -> &SignerContext {
        &self.context
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn media_type(&self) -> &'static str {
        self.context.engine().media_type()
    }

    /// Signs `document` with the named certificate.
    ///
    /// `props` falls back to the startup defaults. An empty `password` skips
    /// the lock stage. Gives up with [`ServerError::TimedOut`] once the
    /// deadline passes. Blocking work cannot be cancelled, so a timed-out
    /// signing keeps its blocking-pool thread until it finishes and its
    /// result is dropped.
    pub async fn sign(
        &self,
        certificate_name: String,
        props: Option<SignProps>,
        password: Vec<u8>,
        document: Vec<u8>,
    ) -> Result<Vec<u8>, ServerError> {
        let context = Arc::clone(&self.context);
        let name = certificate_name.clone();
        let size = document.len();

        let task = tokio::task::spawn_blocking(move || {
            let props = props.as_ref().unwrap_or(context.default_props());
            context
                .pipeline()
                .sign(&certificate_name, props, &password, document)
        });

        let signed = match tokio::time::timeout(self.deadline, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                warn!("signing task for '{name}' failed: {e}");
                return Err(ServerError::Internal(format!("signing task failed: {e}")));
            }
            Err(_) => {
                warn!("signing with '{name}' timed out after {:?}", self.deadline);
                return Err(ServerError::TimedOut(self.deadline));
            }
        };

        info!("signed {size} byte document with '{name}'");
        Ok(signed)
    }
}
