pub mod cli;
pub mod config;
pub mod control;
pub mod debug;
pub mod error;
pub mod identity;
pub mod logging;
pub mod manager;
pub mod paths;
pub mod platform;
pub mod quote;
pub mod registration;
pub mod runtime;
pub mod sink;
pub mod task;

#[cfg(test)]
mod testing;
