pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod logging;
pub mod ports;
pub mod progress;
pub mod repos;
pub mod services;
pub mod store;
