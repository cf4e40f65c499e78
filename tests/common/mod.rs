//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use quake_api::domain::EventRecord;

/// Start a programmable mock upstream on an ephemeral port.
///
/// `f` receives the zero-based request index and returns status and body.
/// Returns the bound address and a counter of requests served.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let index = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let (status, body) = f(index).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// A single-feature feed body.
pub fn feed_with(id: &str, magnitude: f64) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{{"id":"{id}","properties":{{"time":1700000000000,"mag":{magnitude},"place":"10km N of Somewhere"}},"geometry":{{"type":"Point","coordinates":[-120.5,35.25,8.0]}}}}]}}"#
    )
}

pub fn stored_event(id: &str, day: u32, magnitude: f64) -> EventRecord {
    EventRecord {
        event_id: id.to_string(),
        time: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
        magnitude: Some(magnitude),
        place: Some(format!("stored {id}")),
        latitude: Some(35.0),
        longitude: Some(-120.0),
        depth_km: Some(5.0),
        url: None,
    }
}
