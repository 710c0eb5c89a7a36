pub mod config;
pub mod errors;
pub mod image_ops;
pub mod store;
pub mod utils;
