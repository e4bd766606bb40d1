pub mod actions;
pub mod context;
pub mod scheduler;
