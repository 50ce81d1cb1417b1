pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod notify;
pub mod scanner;
pub mod session;
pub mod workflow;
