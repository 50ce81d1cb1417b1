pub mod client;
pub mod reshape;

pub use client::ScannerClient;
