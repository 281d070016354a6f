pub mod app;
pub mod auth;
pub mod config;
pub mod error;
mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
mod shutdown;
pub mod state;
mod tracing;
pub mod webhook;
