pub mod auth;
pub mod config;
pub mod session_manager;
pub mod state;
