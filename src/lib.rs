#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod formats;
pub mod logging;
pub mod render;
pub mod server;
pub mod site;
