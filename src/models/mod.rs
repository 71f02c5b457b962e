mod goal;
mod session;

pub use goal::{Goal, SubTask};
pub use session::{
    CleanupReport, GoalId, Session, SessionId, SessionQuery, SessionStatus, StartSessionRequest,
    UserId,
};
