//! The forwarding core: the typed payloads exchanged at the gateway
//! boundary, the client that carries them to the prediction service, and
//! the error taxonomy for everything that can go wrong on the way.

pub mod client;
pub mod error;
pub mod types;

pub use client::PredictClient;
pub use error::GatewayError;
pub use types::{BiomarkerRequest, PredictionResponse};
