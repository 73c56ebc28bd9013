//! Shared fixtures and a minimal HTTP responder for integration tests

#![allow(dead_code)]

use image::{ImageFormat, Rgba, RgbaImage};
use photo_booth::{PlacementRect, Raster};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Opaque template of `width x height` with a fully transparent window at `window`
pub fn windowed_template(width: u32, height: u32, window: PlacementRect) -> Raster {
    let mut image = RgbaImage::from_pixel(width, height, Rgba([30, 30, 120, 255]));
    for (x, y, px) in image.enumerate_pixels_mut() {
        let (x, y) = (i64::from(x), i64::from(y));
        if x >= window.x
            && x < window.x + i64::from(window.width)
            && y >= window.y
            && y < window.y + i64::from(window.height)
        {
            *px = Rgba([0, 0, 0, 0]);
        }
    }
    Raster::from_image(image)
}

/// Photo with a horizontal gradient so crops are distinguishable
pub fn gradient_photo(width: u32, height: u32) -> Raster {
    let mut image = RgbaImage::new(width, height);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        *px = Rgba([r, g, 90, 255]);
    }
    Raster::from_image(image)
}

/// Encode a raster in the given container format
pub fn encode(raster: &Raster, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(raster.as_image().clone())
            .to_rgb8()
            .write_to(&mut buffer, format)
            .unwrap(),
        _ => raster.as_image().write_to(&mut buffer, format).unwrap(),
    }
    buffer.into_inner()
}

/// Canned HTTP response
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl CannedResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into().into_bytes(),
            delay: Duration::ZERO,
        }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body,
            delay: Duration::ZERO,
        }
    }

    /// Hold the response back for `delay` after the request is read
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// In-process HTTP server answering each request with the next canned response.
///
/// The last response repeats once the script is exhausted.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(script: Vec<CannedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let response = script
                    .get(served)
                    .or_else(|| script.last())
                    .cloned()
                    .unwrap_or_else(|| CannedResponse::json(500, "{}"));
                served += 1;
                handle_connection(stream, &response, &recorded).await;
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            handle,
        }
    }

    /// Raw requests received so far (head and body)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    response: &CannedResponse,
    recorded: &Mutex<Vec<String>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buffer, b"\r\n\r\n") {
            break Some(pos + 4);
        }
    };

    if let Some(header_end) = header_end {
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
        let content_length = head.lines().find_map(|line| {
            line.strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        });
        let chunked = head.contains("transfer-encoding: chunked");

        loop {
            let body_len = buffer.len() - header_end;
            let complete = match content_length {
                Some(len) => body_len >= len,
                None if chunked => buffer.ends_with(b"0\r\n\r\n"),
                None => true,
            };
            if complete {
                break;
            }
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    }

    // Recorded before replying so the client never observes an unrecorded request
    recorded
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buffer).into_owned());

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len(),
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&response.body).await;
    let _ = stream.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}
