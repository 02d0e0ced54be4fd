pub mod app;
pub mod cli;
pub mod config;
pub mod eastmoney;
pub mod funds;
pub mod logging;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;
