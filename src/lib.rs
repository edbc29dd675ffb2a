//! This module contains the core logic of the OncoGate prediction gateway.
//!
//! It defines the modules for configuration, the forwarding core, and the
//! inbound HTTP service.

pub mod config;
pub mod gateway;
pub mod service;
pub(crate) mod utils;
