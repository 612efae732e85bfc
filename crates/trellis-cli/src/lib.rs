pub mod config;
pub mod demo;
pub mod inspect;

pub use config::{Config, OutputFormat};
