pub mod config;
pub mod data;
pub mod session;
pub mod sessions;
pub mod settings;
pub mod simulated;
pub mod stats;
