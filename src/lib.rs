pub mod config;
pub mod consumers;
pub mod controller;
pub mod overlay;
