//! Handler ports
//!
//! The dispatch loop calls one of these for every change event. Handlers for
//! a single condition implement [`ConditionHandler`]; the catch-all default
//! implements [`ChangeHandler`] and also receives the index.
//!
//! Any `async` closure with the matching signature is a handler:
//!
//! ```ignore
//! let handler = |_ctx: Context, index: usize, closed: bool| async move {
//!     tracing::info!(index, closed, "condition changed");
//! };
//! ```

use crate::context::Context;
use async_trait::async_trait;
use std::future::Future;

/// Catch-all handler for conditions without a dedicated handler
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_change(&self, ctx: Context, index: usize, closed: bool);
}

/// Handler bound to one condition index
#[async_trait]
pub trait ConditionHandler: Send + Sync {
    async fn on_change(&self, ctx: Context, closed: bool);
}

/// Default handler used when none is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

#[async_trait]
impl ChangeHandler for NoopHandler {
    async fn on_change(&self, _ctx: Context, _index: usize, _closed: bool) {}
}

#[async_trait]
impl<F, Fut> ChangeHandler for F
where
    F: Fn(Context, usize, bool) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_change(&self, ctx: Context, index: usize, closed: bool) {
        (self)(ctx, index, closed).await
    }
}

#[async_trait]
impl<F, Fut> ConditionHandler for F
where
    F: Fn(Context, bool) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_change(&self, ctx: Context, closed: bool) {
        (self)(ctx, closed).await
    }
}
