//! HTTP API for batch jobs: config, auth middleware, routing and request/response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
