//! Change events flowing from the delegate to the dispatch loop

use crate::context::Context;

/// One observed transition of one condition.
///
/// Created by the delegate when a bit actually flips, consumed exactly once
/// by the dispatch loop.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    /// Context of the call that caused the transition
    pub context: Context,
    /// Condition index
    pub index: usize,
    /// New state: `true` for CLOSED, `false` for OPEN
    pub closed: bool,
}

impl ChangeEvent {
    pub fn new(context: Context, index: usize, closed: bool) -> Self {
        Self {
            context,
            index,
            closed,
        }
    }
}
