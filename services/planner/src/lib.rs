pub mod adapters;
pub mod config;
pub mod error;
pub mod realtime;
pub mod services;
pub mod state;
