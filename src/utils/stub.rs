//! Minimal stub downstream for tests: a raw TCP listener speaking just
//! enough HTTP/1.1 to let the forwarding client complete one exchange.

use std::net::SocketAddr;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Spawn a stub prediction service on an ephemeral port.
///
/// `respond` maps each received request body to a `(status, body)` pair.
/// Every response carries `Connection: close` so the client never pools a
/// connection the stub has already torn down.
pub async fn spawn_downstream<F>(respond: F) -> SocketAddr
where
    F: Fn(&[u8]) -> (u16, String) + Send + Sync + Clone + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let respond = respond.clone();
            tokio::spawn(async move {
                let request_body = match read_request(&mut socket).await {
                    Some(body) => body,
                    None => return,
                };
                let (status, body) = respond(&request_body);
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     \r\n\
                     {body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Read one request off the socket and return its body. Header and body may
/// arrive in separate writes, so keep reading until Content-Length is met.
async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        if let Some(pos) = find_header_end(&raw) {
            let headers = String::from_utf8_lossy(&raw[..pos]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = pos + 4;
            if raw.len() >= body_start + content_length {
                return Some(raw[body_start..body_start + content_length].to_vec());
            }
        }

        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
    }
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}
