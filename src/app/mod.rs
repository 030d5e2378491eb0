pub mod cli;
pub mod config;
pub mod events;
pub mod input_handler;
pub mod keys;
pub mod remote;
pub mod state;

pub use state::*;
