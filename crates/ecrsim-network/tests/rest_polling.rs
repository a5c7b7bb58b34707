//! Integration tests for the REST-adapter mode against a minimal HTTP
//! stub, including the polling bound.

use ecrsim_core::TransactionType;
use ecrsim_network::{RestClient, SocketConfig, SocketError};
use ecrsim_protocol::TransactionRequest;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the stub adapter answers each endpoint.
#[derive(Clone, Copy)]
enum AdapterBehavior {
    /// Accept the submit, then 503 on every result poll.
    AlwaysProcessing,
    /// Accept the submit, then return a final result.
    Completes,
    /// Reject every request with 401.
    RejectsAuth,
    /// Accept the submit but reply with an empty JSON object.
    EmptySubmitReply,
}

struct StubCounters {
    submits: AtomicUsize,
    polls: AtomicUsize,
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn read_http_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    loop {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);

        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_string();
            let content_length = headers
                .lines()
                .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                .and_then(|l| l.split(':').nth(1))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body_read = buf.len() - (pos + 4);
            while body_read < content_length {
                let n = stream.read(&mut tmp).await.ok()?;
                if n == 0 {
                    break;
                }
                body_read += n;
            }
            return Some(headers);
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn spawn_adapter(
    behavior: AdapterBehavior,
) -> (SocketAddr, Arc<StubCounters>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counters = Arc::new(StubCounters {
        submits: AtomicUsize::new(0),
        polls: AtomicUsize::new(0),
    });

    let stub_counters = Arc::clone(&counters);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let counters = Arc::clone(&stub_counters);
            tokio::spawn(async move {
                let Some(headers) = read_http_request(&mut stream).await else {
                    return;
                };
                let first_line = headers.lines().next().unwrap_or_default().to_string();

                if let AdapterBehavior::RejectsAuth = behavior {
                    respond(&mut stream, "401 Unauthorized", "{}").await;
                    return;
                }

                if first_line.contains("/transaction/") {
                    counters.submits.fetch_add(1, Ordering::SeqCst);
                    match behavior {
                        AdapterBehavior::EmptySubmitReply => {
                            respond(&mut stream, "200 OK", "{}").await;
                        }
                        _ => {
                            respond(&mut stream, "200 OK", r#"{"trxId":"T12345"}"#).await;
                        }
                    }
                } else if first_line.contains("/result/") {
                    counters.polls.fetch_add(1, Ordering::SeqCst);
                    match behavior {
                        AdapterBehavior::Completes => {
                            respond(
                                &mut stream,
                                "200 OK",
                                r#"{"responseCode":"00","traceNo":"111111","invoiceNo":"222222","approvalCode":"OK1"}"#,
                            )
                            .await;
                        }
                        _ => {
                            respond(&mut stream, "503 Service Unavailable", "").await;
                        }
                    }
                } else {
                    respond(&mut stream, "404 Not Found", "").await;
                }
            });
        }
    });

    (addr, counters)
}

fn client_for(addr: SocketAddr, max_polls: u32) -> RestClient {
    let config = SocketConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        enable_rest_api: true,
        ..Default::default()
    };
    RestClient::with_poll_bounds(config, max_polls, Duration::from_millis(1)).unwrap()
}

fn sale_request() -> TransactionRequest {
    TransactionRequest::new(TransactionType::Sale, "1500").with_invoice("123456")
}

#[tokio::test]
async fn polling_terminates_exactly_at_the_bound() {
    let (addr, counters) = spawn_adapter(AdapterBehavior::AlwaysProcessing).await;
    let client = client_for(addr, 5);

    let result = client.send_transaction(&sale_request()).await;

    assert!(matches!(result, Err(SocketError::Timeout(_))));
    assert_eq!(counters.submits.load(Ordering::SeqCst), 1);
    assert_eq!(counters.polls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn completed_result_swaps_trace_and_invoice() {
    let (addr, _) = spawn_adapter(AdapterBehavior::Completes).await;
    let client = client_for(addr, 10);

    let parsed = client.send_transaction(&sale_request()).await.unwrap();

    // Adapter reported traceNo=111111 / invoiceNo=222222; the client
    // swaps them to match the framed-response field semantics.
    assert_eq!(parsed.trace_no, "222222");
    assert_eq!(parsed.invoice_no, "111111");
    assert_eq!(parsed.response_code, "00");
    assert!(parsed.is_success());
}

#[tokio::test]
async fn bad_credentials_surface_as_authentication_failure() {
    let (addr, _) = spawn_adapter(AdapterBehavior::RejectsAuth).await;
    let client = client_for(addr, 5);

    let result = client.send_transaction(&sale_request()).await;
    assert!(matches!(result, Err(SocketError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn submit_reply_without_id_is_malformed() {
    let (addr, _) = spawn_adapter(AdapterBehavior::EmptySubmitReply).await;
    let client = client_for(addr, 5);

    let result = client.send_transaction(&sale_request()).await;
    assert!(matches!(result, Err(SocketError::MalformedResponse(_))));
}

#[tokio::test]
async fn validation_errors_never_reach_the_adapter() {
    let (addr, counters) = spawn_adapter(AdapterBehavior::Completes).await;
    let client = client_for(addr, 5);

    let bad = TransactionRequest::new(TransactionType::Sale, "not a number");
    let result = client.send_transaction(&bad).await;

    assert!(matches!(result, Err(SocketError::Protocol(_))));
    assert_eq!(counters.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auto_detect_reports_probe_outcomes() {
    let (addr, _) = spawn_adapter(AdapterBehavior::RejectsAuth).await;
    let config = SocketConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        enable_rest_api: true,
        ..Default::default()
    };
    let client = RestClient::with_poll_bounds(config, 1, Duration::from_millis(1)).unwrap();

    let detection = client.auto_detect_serial_number().await;

    assert!(detection.working_serial.is_none());
    assert_eq!(detection.probes.len(), 4);
    assert!(detection.probes.iter().all(|p| !p.success));
}
