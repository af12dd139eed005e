//! Lock-guarded register owner and change-event emitter
//!
//! Every mutating call follows the same three steps:
//!
//! 1. Drop the call entirely if its context is already done.
//! 2. Apply the register transition under the lock.
//! 3. After releasing the lock, emit one [`ChangeEvent`] per index that
//!    actually changed, in the order the register reported them.
//!
//! A batch is atomic with respect to other batches: no other call can mutate
//! the register between the first and last index of a single call.

use crate::context::Context;
use crate::domain::{MachineConfig, OverflowPolicy, Register};
use crate::error::FlipFlopError;
use crate::events::ChangeEvent;
use crate::metrics::Metrics;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

/// Concurrency-safe owner of one [`Register`]
pub struct Delegate {
    register: Mutex<Register>,
    events: mpsc::Sender<ChangeEvent>,
    overflow: OverflowPolicy,
    metrics: Arc<Metrics>,
}

impl Delegate {
    /// Create a delegate starting from `initial`.
    ///
    /// Returns the delegate and the receiving end of its event channel, or
    /// [`FlipFlopError::ZeroChannelCapacity`] when `channel_capacity` is 0.
    pub fn new(
        initial: Register,
        channel_capacity: usize,
        overflow: OverflowPolicy,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>), FlipFlopError> {
        if channel_capacity == 0 {
            return Err(FlipFlopError::ZeroChannelCapacity);
        }
        let (events, receiver) = mpsc::channel(channel_capacity);
        let delegate = Self {
            register: Mutex::new(initial),
            events,
            overflow,
            metrics,
        };
        Ok((delegate, receiver))
    }

    /// Create a delegate from a machine configuration
    pub fn from_config(
        config: &MachineConfig,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>), FlipFlopError> {
        let initial = if config.all_closed {
            Register::all_closed_register()
        } else {
            Register::new()
        };
        Self::new(initial, config.channel_capacity, config.overflow, metrics)
    }

    /// Close every index in order, emitting one event per index that was open.
    ///
    /// Does nothing if `ctx` is already done.
    pub async fn close(&self, ctx: &Context, indices: &[usize]) {
        if self.dropped(ctx, "close") {
            return;
        }
        let changed = {
            let mut register = self.register.lock();
            let (next, changed) = register.close(indices);
            *register = next;
            changed
        };
        self.metrics.record_applied(changed.len());
        for index in changed {
            self.emit(ChangeEvent::new(ctx.clone(), index, true)).await;
        }
    }

    /// Open every index in order, emitting one event per index that was closed.
    ///
    /// Does nothing if `ctx` is already done.
    pub async fn open(&self, ctx: &Context, indices: &[usize]) {
        if self.dropped(ctx, "open") {
            return;
        }
        let changed = {
            let mut register = self.register.lock();
            let (next, changed) = register.open(indices);
            *register = next;
            changed
        };
        self.metrics.record_applied(changed.len());
        for index in changed {
            self.emit(ChangeEvent::new(ctx.clone(), index, false)).await;
        }
    }

    /// Flip every index in order.
    ///
    /// All closing events are emitted before all opening events.
    pub async fn toggle(&self, ctx: &Context, indices: &[usize]) {
        if self.dropped(ctx, "toggle") {
            return;
        }
        let (closed, opened) = {
            let mut register = self.register.lock();
            let (next, closed, opened) = register.toggle(indices);
            *register = next;
            (closed, opened)
        };
        self.metrics.record_applied(closed.len() + opened.len());
        for index in closed {
            self.emit(ChangeEvent::new(ctx.clone(), index, true)).await;
        }
        for index in opened {
            self.emit(ChangeEvent::new(ctx.clone(), index, false)).await;
        }
    }

    /// Restore every condition to OPEN without emitting events.
    ///
    /// Meant for reusing a delegate; no mutator may run concurrently.
    pub fn reset(&self) {
        *self.register.lock() = Register::new();
    }

    /// Copy of the current register
    pub fn snapshot(&self) -> Register {
        *self.register.lock()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.register.lock().closed(index)
    }

    pub fn is_opened(&self, index: usize) -> bool {
        self.register.lock().opened(index)
    }

    pub fn all_closed(&self, indices: &[usize]) -> bool {
        self.register.lock().all_closed(indices)
    }

    pub fn any_closed(&self, indices: &[usize]) -> bool {
        self.register.lock().any_closed(indices)
    }

    pub fn all_opened(&self, indices: &[usize]) -> bool {
        self.register.lock().all_opened(indices)
    }

    pub fn any_opened(&self, indices: &[usize]) -> bool {
        self.register.lock().any_opened(indices)
    }

    /// Diagnostic dump of the register, highest word first
    pub fn render(&self) -> String {
        self.snapshot().render()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn dropped(&self, ctx: &Context, op: &'static str) -> bool {
        match ctx.err() {
            Some(reason) => {
                debug!(op, reason = %reason, "Call dropped, context done");
                self.metrics.record_dropped_call();
                true
            }
            None => false,
        }
    }

    async fn emit(&self, event: ChangeEvent) {
        let (index, closed) = (event.index, event.closed);
        let sent = match self.overflow {
            OverflowPolicy::Block => self.events.send(event).await.is_ok(),
            OverflowPolicy::DropNewest => match self.events.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(index, closed, "Event dropped (channel full)");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            },
        };

        if sent {
            trace!(index, closed, "Event emitted");
            self.metrics.record_emitted();
        } else {
            if self.events.is_closed() {
                debug!(index, closed, "Event dropped (dispatch loop gone)");
            }
            self.metrics.record_dropped_event();
        }
    }
}
