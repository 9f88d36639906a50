pub mod cli;
pub mod config;
pub mod error;
pub mod market;
pub mod news;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
