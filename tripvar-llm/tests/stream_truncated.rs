use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tripvar_core::{GenerationRequest, RetryPolicy, Runnable, Settings};
use tripvar_llm::TextGenerationService;

fn request_complete(received: &[u8]) -> bool {
    let Some(header_end) = received.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&received[..header_end]).to_ascii_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    received.len() >= header_end + 4 + body_len
}

/// Serves one chunked response, then closes without the terminating chunk
/// when `terminate` is false.
async fn spawn_chunked_server(chunks: Vec<&'static str>, terminate: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut received = Vec::new();
        let mut buf = [0_u8; 1024];
        loop {
            let read = socket.read(&mut buf).await.expect("read");
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buf[..read]);
            if request_complete(&received) {
                break;
            }
        }

        let headers = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "Transfer-Encoding: chunked\r\n",
            "\r\n"
        );
        socket.write_all(headers.as_bytes()).await.expect("headers");
        for chunk in chunks {
            socket
                .write_all(format!("{:X}\r\n", chunk.len()).as_bytes())
                .await
                .expect("chunk len");
            socket.write_all(chunk.as_bytes()).await.expect("chunk data");
            socket.write_all(b"\r\n").await.expect("chunk end");
        }
        if terminate {
            socket.write_all(b"0\r\n\r\n").await.expect("eof");
        }
        let _ = socket.shutdown().await;
    });

    format!("http://{}", addr)
}

fn streaming_service(base_url: String) -> TextGenerationService {
    let settings = Settings::builder()
        .base_url(base_url)
        .build()
        .expect("settings");
    TextGenerationService::from_settings(settings)
        .expect("service")
        .with_streaming(true)
        .with_retry_policy(RetryPolicy::new(1, Duration::ZERO))
}

#[tokio::test]
async fn stream_without_sentinel_returns_partial_text() {
    let base_url = spawn_chunked_server(
        vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        ],
        true,
    )
    .await;

    let result = streaming_service(base_url)
        .invoke(GenerationRequest::from_prompt("greet").expect("request"))
        .await
        .expect("partial result");

    assert_eq!(result.text, "Hello world");
    assert_eq!(result.finish_reason, "incomplete");
    assert!(result.is_estimated());
}

#[tokio::test]
async fn connection_dropped_mid_stream_keeps_received_text() {
    let base_url = spawn_chunked_server(
        vec!["data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n"],
        false,
    )
    .await;

    let result = streaming_service(base_url)
        .invoke(GenerationRequest::from_prompt("greet").expect("request"))
        .await
        .expect("partial result");

    assert_eq!(result.text, "Hello");
    assert_ne!(result.finish_reason, "stop");
}

#[tokio::test]
async fn malformed_fragments_do_not_abort_the_stream() {
    let base_url = spawn_chunked_server(
        vec![
            "data: {\"choices\":[{#}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: [DONE]\n",
        ],
        true,
    )
    .await;

    let result = streaming_service(base_url)
        .invoke(GenerationRequest::from_prompt("greet").expect("request"))
        .await
        .expect("result");

    assert_eq!(result.text, "ok");
    assert_eq!(result.finish_reason, "done");
}
