pub mod cli;
pub mod client;
pub mod config;
pub mod display;
pub mod journal;
pub mod logging;
pub mod web;
