pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod export;
pub mod handlers;
pub mod models;
