use std::{
    collections::HashMap,
    error::Error,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use http::{header, Method, Response, StatusCode};
use matchit::{Match, Router};
use pingora::{apps::http_app::ServeHttp, protocols::http::ServerSession};
use serde::Serialize;

use crate::gateway::{BiomarkerRequest, PredictClient};
use crate::utils::response::{CommonErrors, ResponseBuilder};

const SERVICE_NAME: &str = "oncogate";

#[async_trait]
trait Handler {
    async fn handle(
        &self,
        client: &PredictClient,
        session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>>;
}

/// HTTP application for the gateway surface.
///
/// Routes:
/// - `POST /api/ai/predict` forwards the biomarker payload to the
///   prediction service and relays its answer.
/// - `GET /health` is a fixed liveness payload with no logic behind it.
///
/// Each request is independent: the handler suspends while the downstream
/// call is in flight instead of parking a thread, so many callers can be
/// multiplexed over the same worker pool.
pub struct GatewayHttpApp {
    client: Arc<PredictClient>,
    router: Router<HashMap<Method, Box<dyn Handler + Send + Sync>>>,
}

impl GatewayHttpApp {
    pub fn new(client: Arc<PredictClient>) -> Self {
        let mut this = Self {
            client,
            router: Router::new(),
        };

        this.route("/api/ai/predict", Method::POST, Box::new(PredictHandler {}))
            .route("/health", Method::GET, Box::new(HealthHandler {}));

        this
    }

    fn route(
        &mut self,
        path: &str,
        method: Method,
        handler: Box<dyn Handler + Send + Sync>,
    ) -> &mut Self {
        if self.router.at(path).is_err() {
            let mut handlers = HashMap::new();
            handlers.insert(method, handler);
            self.router.insert(path, handlers).unwrap();
        } else {
            let routes = self.router.at_mut(path).unwrap();
            routes.value.insert(method, handler);
        }
        self
    }
}

#[async_trait]
impl ServeHttp for GatewayHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let (path, method) = {
            let req_header = http_session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };

        match self.router.at(&path) {
            Ok(Match { value, .. }) => match value.get(&method) {
                Some(handler) => match handler.handle(&self.client, http_session).await {
                    Ok(resp) => resp,
                    Err(e) => {
                        log::warn!("request handling failed: {e}");
                        CommonErrors::bad_request(&e.to_string())
                    }
                },
                None => ResponseBuilder::error_http(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "Method Not Allowed",
                ),
            },
            Err(_) => ResponseBuilder::error_http(StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}

struct PredictHandler;

#[async_trait]
impl Handler for PredictHandler {
    async fn handle(
        &self,
        client: &PredictClient,
        session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        validate_content_type(session)?;
        let body_data = read_request_body(session).await?;
        Ok(forward_predict(client, &body_data).await)
    }
}

/// Deserialize the caller's payload, forward it, and turn the outcome into
/// an HTTP response. Downstream failures surface as error statuses; no
/// default or partial prediction body is ever synthesized.
async fn forward_predict(client: &PredictClient, body: &[u8]) -> Response<Vec<u8>> {
    let request: BiomarkerRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return CommonErrors::bad_request(&format!("invalid biomarker payload: {e}")),
    };

    match client.predict(&request).await {
        Ok(response) => ResponseBuilder::success_json(&response),
        Err(e) => {
            log::error!("forwarding to prediction service failed: {e}");
            ResponseBuilder::error_http(e.response_status(), &e.to_string())
        }
    }
}

struct HealthHandler;

#[async_trait]
impl Handler for HealthHandler {
    async fn handle(
        &self,
        _client: &PredictClient,
        _session: &mut ServerSession,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        Ok(build_health_response())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
    timestamp: u64,
}

fn build_health_response() -> Response<Vec<u8>> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    ResponseBuilder::success_json(&HealthResponse {
        service: SERVICE_NAME,
        status: "UP",
        timestamp,
    })
}

fn validate_content_type(http_session: &ServerSession) -> Result<(), Box<dyn Error>> {
    match http_session.get_header(header::CONTENT_TYPE) {
        Some(content_type) if is_json_media_type(content_type.to_str()?) => Ok(()),
        _ => Err("Content-Type must be application/json".into()),
    }
}

/// Parameters such as `charset` do not change the media type, and the type
/// itself is case-insensitive, so `application/json; charset=utf-8` must
/// pass.
fn is_json_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

async fn read_request_body(http_session: &mut ServerSession) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut body_data = Vec::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body_data.extend_from_slice(&bytes);
    }
    Ok(body_data)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use serde_json::{json, Value as JsonValue};

    use super::*;
    use crate::config::Downstream;
    use crate::utils::stub::spawn_downstream;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn client_for(addr: SocketAddr) -> PredictClient {
        PredictClient::new(Downstream {
            address: addr,
            path: "/predict".to_string(),
            timeout: None,
        })
    }

    fn app() -> GatewayHttpApp {
        let addr = SocketAddr::from(([127, 0, 0, 1], 8000));
        GatewayHttpApp::new(Arc::new(client_for(addr)))
    }

    fn body_json(response: &Response<Vec<u8>>) -> JsonValue {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_route_table() {
        init_log();
        let app = app();

        let predict = app.router.at("/api/ai/predict").unwrap();
        assert!(predict.value.contains_key(&Method::POST));
        assert!(!predict.value.contains_key(&Method::GET));

        let health = app.router.at("/health").unwrap();
        assert!(health.value.contains_key(&Method::GET));

        assert!(app.router.at("/api/ai/unknown").is_err());
    }

    #[test]
    fn test_json_media_type_matching() {
        init_log();
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("application/json; charset=utf-8"));
        assert!(is_json_media_type("application/json;charset=UTF-8"));
        assert!(is_json_media_type("Application/JSON"));
        assert!(!is_json_media_type("text/plain"));
        assert!(!is_json_media_type("application/json-seq"));
        assert!(!is_json_media_type(""));
    }

    #[test]
    fn test_health_response_shape() {
        init_log();
        let response = build_health_response();
        assert_eq!(StatusCode::OK, response.status());

        let payload = body_json(&response);
        assert_eq!("oncogate", payload["service"]);
        assert_eq!("UP", payload["status"]);
        assert!(payload["timestamp"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_forward_predict_relays_downstream_payload() {
        init_log();
        let addr =
            spawn_downstream(|_| (200, r#"{"score": 0.87, "label": "high-risk"}"#.to_string()))
                .await;
        let client = client_for(addr);

        let body = br#"{"gene_expression": [1.0, 2.5], "protein_expression": [0.3]}"#;
        let response = forward_predict(&client, body).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            json!({"score": 0.87, "label": "high-risk"}),
            body_json(&response)
        );
    }

    #[tokio::test]
    async fn test_forward_predict_rejects_malformed_payload() {
        init_log();
        let addr = spawn_downstream(|_| (200, "{}".to_string())).await;
        let client = client_for(addr);

        let response = forward_predict(&client, br#"{"gene_expression": "oops"}"#).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[tokio::test]
    async fn test_forward_predict_surfaces_downstream_error_status() {
        init_log();
        let addr = spawn_downstream(|_| (500, r#"{"detail": "boom"}"#.to_string())).await;
        let client = client_for(addr);

        let body = br#"{"gene_expression": [], "protein_expression": []}"#;
        let response = forward_predict(&client, body).await;
        assert_eq!(StatusCode::BAD_GATEWAY, response.status());
        // no synthesized prediction body on failure
        assert!(serde_json::from_slice::<JsonValue>(response.body()).is_err());
    }

    #[tokio::test]
    async fn test_forward_predict_surfaces_unreachable_downstream() {
        init_log();
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client = client_for(addr);

        let body = br#"{"gene_expression": [1.0], "protein_expression": [2.0]}"#;
        let response = forward_predict(&client, body).await;
        assert_eq!(StatusCode::BAD_GATEWAY, response.status());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_handlers_get_their_own_response() {
        init_log();
        let addr = spawn_downstream(|body| {
            (200, format!(r#"{{"echo": {}}}"#, String::from_utf8_lossy(body)))
        })
        .await;
        let client = Arc::new(client_for(addr));

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                let body =
                    format!(r#"{{"gene_expression": [{i}.0], "protein_expression": []}}"#);
                let response = forward_predict(&client, body.as_bytes()).await;
                assert_eq!(StatusCode::OK, response.status());
                let payload: JsonValue = serde_json::from_slice(response.body()).unwrap();
                assert_eq!(json!([f64::from(i)]), payload["echo"]["gene_expression"]);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
