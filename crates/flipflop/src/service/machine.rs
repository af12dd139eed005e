//! Dispatch machine
//!
//! Couples a [`Delegate`]'s event stream to the configured handlers. The
//! handler table is frozen by [`MachineBuilder::build`]; [`Machine::run`]
//! starts the single dispatch loop that spawns one task per event.
//!
//! ## Usage
//!
//! ```ignore
//! use flipflop::{Context, MachineBuilder};
//!
//! let machine = MachineBuilder::new()
//!     .default_handler(|_ctx: Context, index: usize, closed: bool| async move {
//!         tracing::info!(index, closed, "condition changed");
//!     })
//!     .condition_handler(7, |_ctx: Context, closed: bool| async move {
//!         tracing::warn!(closed, "gate 7 changed");
//!     })
//!     .build()?;
//!
//! let ctx = Context::background().with_cancel();
//! let _loop = machine.run(ctx.clone())?;
//! machine.close(&ctx, &[7, 8, 9]).await;
//! ```

use crate::context::Context;
use crate::domain::{MachineConfig, OverflowPolicy, Register, ShutdownPolicy, CAPACITY};
use crate::error::FlipFlopError;
use crate::events::ChangeEvent;
use crate::metrics::Metrics;
use crate::ports::{ChangeHandler, ConditionHandler, NoopHandler};
use crate::service::delegate::Delegate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Resolved handlers, immutable once built
struct HandlerTable {
    default: Arc<dyn ChangeHandler>,
    by_index: HashMap<usize, Arc<dyn ConditionHandler>>,
}

impl HandlerTable {
    fn dispatch(&self, event: ChangeEvent, tasks: &mut JoinSet<()>, metrics: &Metrics) {
        let ChangeEvent {
            context,
            index,
            closed,
        } = event;

        match self.by_index.get(&index) {
            Some(handler) => {
                let handler = Arc::clone(handler);
                tasks.spawn(async move { handler.on_change(context, closed).await });
            }
            None => {
                let handler = Arc::clone(&self.default);
                tasks.spawn(async move { handler.on_change(context, index, closed).await });
            }
        }
        metrics.record_spawned();
        debug!(index, closed, "Handler spawned");
    }
}

/// Fluent builder for [`Machine`]
pub struct MachineBuilder {
    config: MachineConfig,
    default_handler: Arc<dyn ChangeHandler>,
    handlers: HashMap<usize, Arc<dyn ConditionHandler>>,
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineBuilder {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            config,
            default_handler: Arc::new(NoopHandler),
            handlers: HashMap::new(),
        }
    }

    /// Handler for every condition without a dedicated one
    pub fn default_handler<H>(mut self, handler: H) -> Self
    where
        H: ChangeHandler + 'static,
    {
        self.default_handler = Arc::new(handler);
        self
    }

    /// Dedicated handler for one condition. The last registration wins.
    pub fn condition_handler<H>(mut self, index: usize, handler: H) -> Self
    where
        H: ConditionHandler + 'static,
    {
        self.handlers.insert(index, Arc::new(handler));
        self
    }

    /// Start with every condition CLOSED
    pub fn all_closed(mut self) -> Self {
        self.config.all_closed = true;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.config.overflow = overflow;
        self
    }

    pub fn shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.config.shutdown = shutdown;
        self
    }

    pub fn build(self) -> Result<Machine, FlipFlopError> {
        self.config.validate()?;
        if let Some(&index) = self.handlers.keys().find(|&&i| i >= CAPACITY) {
            return Err(FlipFlopError::IndexOutOfRange {
                index,
                max: CAPACITY,
            });
        }

        let metrics = Arc::new(Metrics::new());
        let (delegate, receiver) = Delegate::from_config(&self.config, metrics.clone())?;

        Ok(Machine {
            delegate,
            handlers: Arc::new(HandlerTable {
                default: self.default_handler,
                by_index: self.handlers,
            }),
            receiver: Mutex::new(Some(receiver)),
            shutdown: self.config.shutdown,
            metrics,
        })
    }
}

/// Condition register with asynchronous change dispatch
pub struct Machine {
    delegate: Delegate,
    handlers: Arc<HandlerTable>,
    receiver: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
    shutdown: ShutdownPolicy,
    metrics: Arc<Metrics>,
}

impl Machine {
    /// Shorthand for [`MachineBuilder::new`]
    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    /// Start the dispatch loop, bound to `ctx`.
    ///
    /// Must be called from within a tokio runtime. The loop stops when `ctx`
    /// is done or the machine is dropped. Handlers already spawned are then
    /// detached or drained according to the configured [`ShutdownPolicy`].
    pub fn run(&self, ctx: Context) -> Result<JoinHandle<()>, FlipFlopError> {
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(FlipFlopError::AlreadyRunning)?;

        Ok(tokio::spawn(dispatch_loop(
            ctx,
            receiver,
            self.handlers.clone(),
            self.metrics.clone(),
            self.shutdown,
        )))
    }

    /// Open `indices` in order; see [`Delegate::open`]
    pub async fn open(&self, ctx: &Context, indices: &[usize]) {
        self.delegate.open(ctx, indices).await
    }

    /// Close `indices` in order; see [`Delegate::close`]
    pub async fn close(&self, ctx: &Context, indices: &[usize]) {
        self.delegate.close(ctx, indices).await
    }

    /// Flip `indices` in order; see [`Delegate::toggle`]
    pub async fn toggle(&self, ctx: &Context, indices: &[usize]) {
        self.delegate.toggle(ctx, indices).await
    }

    pub fn snapshot(&self) -> Register {
        self.delegate.snapshot()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.delegate.is_closed(index)
    }

    pub fn is_opened(&self, index: usize) -> bool {
        self.delegate.is_opened(index)
    }

    pub fn all_closed(&self, indices: &[usize]) -> bool {
        self.delegate.all_closed(indices)
    }

    pub fn any_closed(&self, indices: &[usize]) -> bool {
        self.delegate.any_closed(indices)
    }

    pub fn all_opened(&self, indices: &[usize]) -> bool {
        self.delegate.all_opened(indices)
    }

    pub fn any_opened(&self, indices: &[usize]) -> bool {
        self.delegate.any_opened(indices)
    }

    pub fn render(&self) -> String {
        self.delegate.render()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.delegate.render())
    }
}

async fn dispatch_loop(
    ctx: Context,
    mut events: mpsc::Receiver<ChangeEvent>,
    handlers: Arc<HandlerTable>,
    metrics: Arc<Metrics>,
    shutdown: ShutdownPolicy,
) {
    info!(handlers = handlers.by_index.len(), "Dispatch loop started");
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = ctx.done() => {
                debug!(reason = ?ctx.err(), "Dispatch context done");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                reap(&metrics, joined);
            }
            event = events.recv() => match event {
                Some(event) => handlers.dispatch(event, &mut tasks, &metrics),
                None => {
                    warn!("Event channel closed, shutting down");
                    break;
                }
            },
        }
    }

    // Senders must not wait on a loop that no longer reads.
    events.close();
    let mut discarded = 0usize;
    while events.try_recv().is_ok() {
        metrics.record_dropped_event();
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "Discarded buffered events");
    }
    drop(events);

    match shutdown {
        ShutdownPolicy::Detach => {
            debug!(outstanding = tasks.len(), "Detaching handlers");
            tasks.detach_all();
        }
        ShutdownPolicy::Drain => {
            debug!(outstanding = tasks.len(), "Draining handlers");
            while let Some(joined) = tasks.join_next().await {
                reap(&metrics, joined);
            }
        }
    }
    info!("Dispatch loop stopped");
}

fn reap(metrics: &Metrics, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            metrics.record_panic();
            error!(error = %e, "Handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_build_rejects_zero_capacity() {
        let result = MachineBuilder::new().channel_capacity(0).build();
        assert_eq!(result.err(), Some(FlipFlopError::ZeroChannelCapacity));
    }

    #[test]
    fn test_build_rejects_out_of_range_handler() {
        let result = MachineBuilder::new()
            .condition_handler(CAPACITY, |_ctx: Context, _closed: bool| async {})
            .build();
        assert_eq!(
            result.err(),
            Some(FlipFlopError::IndexOutOfRange {
                index: CAPACITY,
                max: CAPACITY
            })
        );
    }

    #[test]
    fn test_all_closed_preset() {
        let machine = MachineBuilder::new().all_closed().build().expect("valid");
        assert_eq!(machine.snapshot(), Register::all_closed_register());
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let machine = MachineBuilder::new().build().expect("valid");
        let ctx = Context::background().with_cancel();

        let handle = machine.run(ctx.clone()).expect("first run");
        assert_eq!(machine.run(ctx.clone()).err(), Some(FlipFlopError::AlreadyRunning));

        ctx.cancel();
        handle.await.expect("loop should exit cleanly");
    }

    #[tokio::test]
    async fn test_last_condition_handler_wins() {
        let (tx, mut rx) = unbounded_channel::<&'static str>();
        let (first, second) = (tx.clone(), tx);

        let machine = MachineBuilder::new()
            .condition_handler(3, move |_ctx: Context, _closed: bool| {
                let tx = first.clone();
                async move {
                    let _ = tx.send("first");
                }
            })
            .condition_handler(3, move |_ctx: Context, _closed: bool| {
                let tx = second.clone();
                async move {
                    let _ = tx.send("second");
                }
            })
            .build()
            .expect("valid");

        let ctx = Context::background().with_cancel();
        let _handle = machine.run(ctx.clone()).expect("run");
        machine.close(&ctx, &[3]).await;

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler should fire");
        assert_eq!(got, Some("second"));
        ctx.cancel();
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl ConditionHandler for Exploding {
        async fn on_change(&self, _ctx: Context, _closed: bool) {
            panic!("handler failure");
        }
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let (tx, mut rx) = unbounded_channel::<usize>();
        let machine = MachineBuilder::new()
            .condition_handler(0, Exploding)
            .default_handler(move |_ctx: Context, index: usize, _closed: bool| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(index);
                }
            })
            .shutdown(ShutdownPolicy::Drain)
            .build()
            .expect("valid");

        let ctx = Context::background().with_cancel();
        let handle = machine.run(ctx.clone()).expect("run");
        machine.close(&ctx, &[0]).await;
        machine.close(&ctx, &[1]).await;

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("default handler should still fire");
        assert_eq!(got, Some(1));

        ctx.cancel();
        handle.await.expect("loop survives handler panics");
        assert_eq!(machine.metrics().snapshot().handler_panics, 1);
    }

    #[test]
    fn test_debug_renders_register() {
        let machine = MachineBuilder::new().build().expect("valid");
        let rendered = format!("{machine:?}");
        assert_eq!(rendered.lines().count(), 64);
        assert_eq!(rendered, machine.render());
    }
}
