//! BDD step definitions for the AutoML client

pub mod chat_steps;
pub mod session_steps;
pub mod wake_steps;
