pub mod clock;
pub mod commands;
pub mod controller;
pub mod state;
pub mod store;

pub use clock::{elapsed_active_seconds, Clock, ClockSnapshot, SystemClock};
pub use controller::TimerController;
pub use state::{SessionAction, SessionPhase};
