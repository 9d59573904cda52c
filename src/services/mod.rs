pub mod classifier;
pub mod completion;
pub mod conversation;
pub mod metrics_manager;
pub mod persistence;
pub mod session_manager;
