pub mod directory;
pub mod exception;

pub use directory::*;
pub use exception::*;
