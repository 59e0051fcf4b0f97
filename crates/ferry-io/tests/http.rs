// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ferry_core::{FetchRequest, TransferProgress, Transport, TransportError};
use ferry_io::HttpTransport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serves one connection with `response`, then closes it. Returns the URL to fetch.
async fn serve_once(response: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream.write_all(response).await.unwrap();
        let _ = stream.shutdown().await;
    });
    format!("http://{addr}/bundle")
}

async fn read_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
}

fn transport() -> HttpTransport {
    HttpTransport::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn body_is_streamed_with_its_announced_length() {
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world").await;
    let progress = TransferProgress::new();
    progress.begin();

    let body = transport()
        .fetch(&FetchRequest::new(url), &progress)
        .await
        .unwrap();

    assert_eq!(body, b"hello world");
    assert_eq!(progress.expected_bytes(), 11);
    assert_eq!(progress.received_bytes(), progress.expected_bytes());
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let url = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;

    let err = transport()
        .fetch(&FetchRequest::new(url.clone()), &TransferProgress::new())
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::NotFound { url });
}

#[tokio::test]
async fn server_error_keeps_its_status() {
    let url = serve_once(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n").await;

    let err = transport()
        .fetch(&FetchRequest::new(url.clone()), &TransferProgress::new())
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Status { url, status: 500 });
}

#[tokio::test]
async fn body_beyond_the_announced_length_is_rejected() {
    // The first announced length wins, so the transfer expects 4 bytes.
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789").await;
    let progress = TransferProgress::new();
    progress.begin();
    progress.set_expected(4);

    let err = transport()
        .fetch(&FetchRequest::new(url.clone()), &progress)
        .await
        .unwrap_err();

    assert!(
        matches!(&err, TransportError::LengthExceeded { expected: 4, .. }),
        "{err:?}"
    );
    assert!(progress.received_bytes() <= 4);
}

#[tokio::test]
async fn bytes_past_content_length_are_not_delivered() {
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabcdef").await;
    let progress = TransferProgress::new();

    let body = transport()
        .fetch(&FetchRequest::new(url), &progress)
        .await
        .unwrap();

    assert_eq!(body, b"abc");
    assert_eq!(progress.received_bytes(), 3);
}

#[tokio::test]
async fn huge_content_length_fails_without_reserving_it() {
    let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 9223372036854775808\r\n\r\nabc").await;
    let progress = TransferProgress::new();
    progress.begin();

    let result = transport().fetch(&FetchRequest::new(url), &progress).await;

    assert!(result.is_err(), "{result:?}");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/bundle", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let err = HttpTransport::new(Duration::from_millis(200))
        .unwrap()
        .fetch(&FetchRequest::new(url.clone()), &TransferProgress::new())
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout { url });
}
