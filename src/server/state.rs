use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::app::AppContext;
use crate::error::Result;
use crate::server::error::ApiResult;
use crate::utils::clock::{Clock, SystemClock};

/// Shared handler state.
///
/// Handlers work on a snapshot of the context inside `spawn_blocking`.
/// Mutating handlers are serialized by `writer`, hold the source lock while
/// they run and publish the (possibly changed) context back on success.
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<RwLock<AppContext>>,
    writer: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    #[must_use]
    pub fn new(ctx: AppContext) -> Self {
        Self::with_clock(ctx, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(ctx: AppContext, clock: Arc<dyn Clock>) -> Self {
        Self {
            ctx: Arc::new(RwLock::new(ctx)),
            writer: Arc::new(Mutex::new(())),
            clock,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AppContext {
        self.ctx.read().clone()
    }

    /// Run a read-only operation off the async runtime.
    pub async fn read<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&AppContext, &dyn Clock) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ctx = self.snapshot();
        let clock = Arc::clone(&self.clock);
        let outcome = tokio::task::spawn_blocking(move || f(&ctx, clock.as_ref())).await?;
        Ok(outcome?)
    }

    /// Run a mutation under the writer mutex and the source lock, logging it
    /// to the operation log as `cmd`.
    pub async fn write<T, F>(&self, cmd: &'static str, args: serde_json::Value, f: F) -> ApiResult<T>
    where
        F: FnOnce(&mut AppContext, &dyn Clock) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.writer.lock().await;
        let mut ctx = self.snapshot();
        let clock = Arc::clone(&self.clock);
        let (ctx, outcome) = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let outcome = match ctx.lock() {
                Ok(lock) => {
                    let outcome = f(&mut ctx, clock.as_ref());
                    drop(lock);
                    outcome
                }
                Err(err) => Err(err),
            };
            ctx.record(cmd, started, args, &outcome);
            (ctx, outcome)
        })
        .await?;

        let value = outcome?;
        *self.ctx.write() = ctx;
        Ok(value)
    }
}
