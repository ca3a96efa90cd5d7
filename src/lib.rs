//! modelgate Library
//!
//! Core library for the modelgate inference service: model provisioning,
//! llama.cpp engine loading, and the HTTP chat surface.

pub mod api;
pub mod boot;
pub mod config;
pub mod engine;
pub mod provision;
pub mod server;
pub mod state;
