pub mod audit;
pub mod autoclean;
pub mod automod;
pub mod birthday;
pub mod commands;
pub mod config;
pub mod data;
pub mod event_handler;
pub mod linkfix;
pub mod modlog;
pub mod permissions;
pub mod roles;
mod utils;
