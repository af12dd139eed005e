//! # flipflop
//!
//! An in-process condition register: up to 4096 boolean conditions, each
//! OPEN or CLOSED, mutated in batches and observed through asynchronously
//! dispatched change handlers.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure logic, no I/O
//!   - `Register`: fixed 64 × 64-bit bitset with batch transitions
//!   - `MachineConfig`: channel capacity, overflow and shutdown policies
//!
//! - **Ports Layer** (`ports/`): handler traits
//!   - `ChangeHandler`: catch-all handler receiving the index
//!   - `ConditionHandler`: handler bound to one index
//!
//! - **Service Layer** (`service/`)
//!   - `Delegate`: owns the register behind a lock, emits `ChangeEvent`s
//!   - `Machine`: runs the dispatch loop and spawns handlers
//!
//! ```text
//! caller ──close/open/toggle──▶ Delegate ──ChangeEvent──▶ dispatch loop
//!                               (lock)        (mpsc)         │
//!                                                            ▼
//!                                             spawn per-index or default handler
//! ```
//!
//! ## Contract
//!
//! - An index outside `0..4096` panics. It is a programming error.
//! - A call made under a cancelled or expired [`Context`] does nothing and
//!   reports nothing; it looks exactly like a call that changed no bits.
//! - Within one call, indices apply in order inside one critical section.
//! - One event is emitted per bit that actually flipped.
//! - Handler completion order is unspecified.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod context;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports for convenience
pub use context::Context;
pub use domain::{
    MachineConfig, OverflowPolicy, Register, ShutdownPolicy, CAPACITY, DEFAULT_CHANNEL_CAPACITY,
    WORDS, WORD_BITS,
};
pub use error::{ContextError, FlipFlopError};
pub use events::ChangeEvent;
pub use metrics::{Metrics, MetricsSnapshot};
pub use ports::{ChangeHandler, ConditionHandler, NoopHandler};
pub use service::{Delegate, Machine, MachineBuilder};
pub use telemetry::{init_tracing, LogConfig};
