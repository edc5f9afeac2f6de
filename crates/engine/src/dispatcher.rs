//! Batch dispatcher.
//!
//! `Dispatcher` is the central orchestrator:
//! 1. Logs in once; a failed login aborts the batch before any item runs.
//! 2. Iterates items strictly in input order.
//! 3. Per item: validate → build → send → record.
//! 4. On item failure either aborts (default) or records `{error}` and
//!    moves on (`continue_on_fail`).

use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use client::{login, Credentials, HttpTransport};

use crate::context::{RequestContext, DEFAULT_API_PREFIX};
use crate::models::{InputItem, OutputItem};
use crate::operations::prepare;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Record per-item failures instead of aborting the batch.
    pub continue_on_fail: bool,
    /// Versioned path segment placed before every resource path.
    pub api_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            continue_on_fail: false,
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

/// Outcome of validating one item offline.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub index: usize,
    pub operation: String,
    pub result: Result<(), EngineError>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Runs batches of [`InputItem`]s against the API.
///
/// The transport is injected, so the same dispatcher runs against the real
/// API or a mock.
pub struct Dispatcher<T> {
    transport: T,
    credentials: Credentials,
    config: DispatchConfig,
}

impl<T: HttpTransport> Dispatcher<T> {
    pub fn new(transport: T, credentials: Credentials, config: DispatchConfig) -> Self {
        Self {
            transport,
            credentials,
            config,
        }
    }

    /// Run the batch and return one output per processed item.
    ///
    /// # Errors
    /// - [`EngineError::Client`] when login fails (no item is processed).
    /// - [`EngineError::ItemFailed`] for the first failing item, unless
    ///   `continue_on_fail` is set.
    #[instrument(skip_all, fields(batch_id = %Uuid::new_v4(), items = items.len()))]
    pub async fn run(&self, items: Vec<InputItem>) -> Result<Vec<OutputItem>, EngineError> {
        let session = match login(&self.transport, &self.credentials).await {
            Ok(session) => session,
            Err(e) => {
                error!("login failed, aborting batch: {e}");
                return Err(e.into());
            }
        };

        let ctx = RequestContext {
            transport: &self.transport,
            credentials: &self.credentials,
            session: &session,
            api_prefix: &self.config.api_prefix,
        };

        let mut outputs = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            match execute_item(&ctx, item).await {
                Ok(response) => {
                    info!(index, operation = %item.operation, "item succeeded");
                    outputs.push(OutputItem::success(response));
                }
                Err(e) if self.config.continue_on_fail => {
                    warn!(index, operation = %item.operation, kind = e.kind(), "item failed, continuing: {e}");
                    outputs.push(OutputItem::error(e.to_string()));
                }
                Err(e) => {
                    error!(index, operation = %item.operation, kind = e.kind(), "item failed, aborting batch: {e}");
                    return Err(EngineError::ItemFailed {
                        index,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("batch finished with {} outputs", outputs.len());
        Ok(outputs)
    }
}

/// Validate every item without logging in or sending anything.
pub fn validate_items(items: &[InputItem]) -> Vec<ValidationOutcome> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| ValidationOutcome {
            index,
            operation: item.operation.to_string(),
            result: prepare(item).map(|_| ()),
        })
        .collect()
}

async fn execute_item(ctx: &RequestContext<'_>, item: &InputItem) -> Result<Value, EngineError> {
    let prepared = prepare(item)?;
    prepared.execute(ctx).await
}
