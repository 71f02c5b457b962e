pub mod reconciler;

pub use reconciler::reconcile_once;
