//! Domain layer: pure register logic and configuration, no I/O

pub mod config;
pub mod register;

pub use config::{MachineConfig, OverflowPolicy, ShutdownPolicy, DEFAULT_CHANNEL_CAPACITY};
pub use register::{Register, CAPACITY, WORDS, WORD_BITS};
