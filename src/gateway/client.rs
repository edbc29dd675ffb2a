use std::time::Duration;

use bytes::Bytes;
use http::Method;
use pingora_core::connectors::http::Connector;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_http::RequestHeader;

use crate::config::{Downstream, Timeout};

use super::{BiomarkerRequest, GatewayError, PredictionResponse};

/// Client for the downstream prediction service.
///
/// Constructed once at startup and shared across all in-flight requests; it
/// holds no per-call state, so concurrent use needs no coordination. Exactly
/// one downstream attempt is made per invocation: no retry, no fallback.
pub struct PredictClient {
    connector: Connector,
    config: Downstream,
}

impl PredictClient {
    pub fn new(config: Downstream) -> Self {
        Self {
            connector: Connector::new(None),
            config,
        }
    }

    /// Forward one biomarker payload and return the downstream's answer.
    ///
    /// The payload is transmitted as-is and the response body is returned
    /// as-is; this client never inspects either. The calling task suspends
    /// at the network call until the downstream responds.
    pub async fn predict(
        &self,
        request: &BiomarkerRequest,
    ) -> Result<PredictionResponse, GatewayError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| GatewayError::Internal(format!("failed to encode request payload: {e}")))?;

        let peer = self.build_peer();
        let (mut session, reused) = self.connector.get_http_session(&peer).await?;
        log::debug!("downstream session established (reused: {reused})");

        let header = self.build_request_header(body.len())?;
        session.write_request_header(Box::new(header)).await?;
        session.write_request_body(Bytes::from(body), true).await?;

        session.read_response_header().await?;
        let status = session
            .response_header()
            .map(|resp| resp.status)
            .ok_or_else(|| GatewayError::Internal("missing downstream response header".to_string()))?;

        let mut raw = Vec::new();
        while let Some(chunk) = session.read_response_body().await? {
            raw.extend_from_slice(&chunk);
        }

        // Response fully read, hand the connection back for reuse.
        self.connector
            .release_http_session(session, &peer, None)
            .await;

        if !status.is_success() {
            return Err(GatewayError::DownstreamStatus(status));
        }

        let response = serde_json::from_slice(&raw).map_err(GatewayError::InvalidResponse)?;
        Ok(response)
    }

    fn build_request_header(&self, content_length: usize) -> Result<RequestHeader, GatewayError> {
        fn invalid(e: Box<pingora_error::Error>) -> GatewayError {
            GatewayError::Internal(format!("invalid downstream request: {e}"))
        }

        let mut header = RequestHeader::build(Method::POST, self.config.path.as_bytes(), None)
            .map_err(invalid)?;
        header
            .insert_header("Host", self.config.address.to_string())
            .map_err(invalid)?;
        header
            .insert_header("Content-Type", "application/json")
            .map_err(invalid)?;
        header
            .insert_header("Content-Length", content_length.to_string())
            .map_err(invalid)?;
        Ok(header)
    }

    fn build_peer(&self) -> HttpPeer {
        let mut peer = HttpPeer::new(self.config.address, false, String::new());
        if let Some(Timeout {
            connect,
            send,
            read,
        }) = &self.config.timeout
        {
            peer.options.connection_timeout = Some(Duration::from_secs(*connect));
            peer.options.read_timeout = Some(Duration::from_secs(*read));
            peer.options.write_timeout = Some(Duration::from_secs(*send));
        }
        peer
    }
}
