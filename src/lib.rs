pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod galaxy;
pub mod output;
pub mod wait;
