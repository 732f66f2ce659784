//! Library crate for gatehouse-bot, exposing modules for the binary and tests.

pub mod config;
/// Persistence records and stores.
pub mod dao;
/// Payloads exchanged with the platform and the HTTP surface.
pub mod dto;
/// Service level errors.
pub mod error;
pub mod platform;
/// Keep-alive HTTP routes.
pub mod routes;
/// Bot behaviour, one module per subsystem.
pub mod services;
/// Shared runtime state.
pub mod state;
