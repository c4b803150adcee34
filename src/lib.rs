pub mod api;
pub mod args;
pub mod config;
pub mod database;
pub mod host;
pub mod model;
pub mod service;
pub mod session;
pub mod utils;
