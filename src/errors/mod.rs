pub mod types;

pub use types::DeskError;
