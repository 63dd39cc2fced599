//! Minimal in-process HTTP server for download tests.
//!
//! Serves one fixed body with optional range support, counts requests,
//! and can be told to fail the range starting at a given offset.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Clone)]
pub struct ServerOptions {
    pub body: Arc<Vec<u8>>,
    pub accept_ranges: bool,
    pub send_content_length: bool,
    /// Respond 500 to the range request starting at this offset.
    pub fail_range_start: Option<u64>,
}

impl ServerOptions {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            accept_ranges: true,
            send_content_length: true,
            fail_range_start: None,
        }
    }
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    range_requests: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(AtomicUsize::new(0));
        let range_requests = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_requests = Arc::clone(&requests);
        let accept_ranges_seen = Arc::clone(&range_requests);
        let accept_shutdown = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let options = options.clone();
                let requests = Arc::clone(&accept_requests);
                let range_requests = Arc::clone(&accept_ranges_seen);
                thread::spawn(move || {
                    handle_connection(stream, &options, &requests, &range_requests);
                });
            }
        });

        Self {
            addr,
            requests,
            range_requests,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/file.bin", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn range_request_count(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop.
        TcpStream::connect(self.addr).ok();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    options: &ServerOptions,
    requests: &AtomicUsize,
    range_requests: &AtomicUsize,
) {
    let Some((method, range)) = read_request(&mut stream) else {
        return;
    };
    requests.fetch_add(1, Ordering::SeqCst);

    let body = &options.body;
    let total = body.len() as u64;

    let (status_line, slice, content_range) = match range {
        Some((start, end)) if options.accept_ranges => {
            range_requests.fetch_add(1, Ordering::SeqCst);
            if options.fail_range_start == Some(start) {
                respond(
                    &mut stream,
                    "HTTP/1.1 500 Internal Server Error",
                    &[("Content-Length", "0".to_string())],
                    None,
                );
                return;
            }
            let end = end.min(total.saturating_sub(1));
            (
                "HTTP/1.1 206 Partial Content",
                &body[start as usize..=end as usize],
                Some(format!("bytes {}-{}/{}", start, end, total)),
            )
        }
        _ => ("HTTP/1.1 200 OK", &body[..], None),
    };

    let mut headers: Vec<(&str, String)> = Vec::new();
    if options.send_content_length {
        headers.push(("Content-Length", slice.len().to_string()));
    }
    if options.accept_ranges {
        headers.push(("Accept-Ranges", "bytes".to_string()));
    }
    if let Some(cr) = content_range {
        headers.push(("Content-Range", cr));
    }

    let payload = if method == "HEAD" { None } else { Some(slice) };
    respond(&mut stream, status_line, &headers, payload);
}

/// Read one request; returns the method and any parsed Range header.
fn read_request(stream: &mut TcpStream) -> Option<(String, Option<(u64, u64)>)> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        if raw.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if raw.len() > 64 * 1024 {
            return None;
        }
    }
    let text = String::from_utf8_lossy(&raw);
    let mut lines = text.lines();
    let method = lines.next()?.split_whitespace().next()?.to_string();

    let mut range = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("range") {
            let value = value.trim();
            if let Some(spec) = value.strip_prefix("bytes=") {
                if let Some((start, end)) = spec.split_once('-') {
                    if let (Ok(start), Ok(end)) = (start.parse(), end.parse()) {
                        range = Some((start, end));
                    }
                }
            }
        }
    }
    Some((method, range))
}

fn respond(stream: &mut TcpStream, status_line: &str, headers: &[(&str, String)], body: Option<&[u8]>) {
    let mut response = format!("{}\r\n", status_line);
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("Connection: close\r\n\r\n");

    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    if let Some(body) = body {
        stream.write_all(body).ok();
    }
    stream.flush().ok();
}
