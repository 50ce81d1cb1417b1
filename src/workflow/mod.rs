pub mod engine;
pub mod validate;

pub use engine::ExceptionWorkflow;
