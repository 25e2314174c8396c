pub mod cli;
pub mod commands;
pub mod hhga;
pub mod utils;
