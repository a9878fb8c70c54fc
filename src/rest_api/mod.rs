//! HTTP endpoints for health checks and metrics scraping

mod dto;
mod handlers;
mod server;

pub use server::{run_server, ApiState};
