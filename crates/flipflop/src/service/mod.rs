//! Service layer: the lock-guarded delegate and the dispatch machine

pub mod delegate;
pub mod machine;

pub use delegate::Delegate;
pub use machine::{Machine, MachineBuilder};
