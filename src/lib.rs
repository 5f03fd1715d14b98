pub mod catalog;
pub mod config;
pub mod constants;
pub mod datasets;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod resolver;
pub mod rscript;
pub mod server;
pub mod tools;
