pub mod catalog;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod export;
pub mod identity;
pub mod logging;
pub mod projector;
pub mod server;
pub mod tasks;
