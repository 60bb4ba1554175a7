pub mod auth;
pub mod chat;
pub mod context;
pub mod memory;
pub mod session;
pub mod stats;
