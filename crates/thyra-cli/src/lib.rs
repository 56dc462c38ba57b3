pub mod commands;
pub mod config;
pub mod records;
pub mod server;
pub mod util;
