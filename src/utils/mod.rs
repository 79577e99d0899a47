pub mod config;
pub mod natsort;
