//! Table loading configuration

pub mod null_handling;
pub mod table_config;

pub use null_handling::*;
pub use table_config::*;
