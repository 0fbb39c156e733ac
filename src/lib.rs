pub mod config;
pub mod controller;
pub mod driver;
pub mod host;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod state;
