pub mod agent;
pub mod conversation;
