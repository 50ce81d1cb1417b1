pub mod connection;
pub mod directory;
pub mod exceptions;
pub mod schema;

pub use connection::Database;
