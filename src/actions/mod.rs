pub mod manager;

pub use manager::{ActionManager, ActionOutcome, PendingAction};
