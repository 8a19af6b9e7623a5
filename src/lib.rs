//! Supplyr - an ad server with per-visitor frequency capping
//!
//! # Architecture
//! - `storage`: store interfaces and the SeaORM backend
//! - `services`: the ad decision engine and country lookup
//! - `api`: HTTP handlers and middleware
//! - `config`: configuration management
//! - `runtime`: application lifecycle and server mode
//! - `system`: logging

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
