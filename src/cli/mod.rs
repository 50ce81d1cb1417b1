pub mod commands;
pub mod seed;
pub mod serve;

pub use commands::{Cli, Commands};
