//! Minimal HTTP/1.1 server for tests: serves fixed bodies per path and
//! answers 404 for anything else.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug)]
pub(crate) struct Route {
    path: String,
    status: u16,
    body: Vec<u8>,
    delay: Option<Duration>,
}

impl Route {
    pub(crate) fn ok(path: &str, body: Vec<u8>) -> Self {
        Self::status(path, 200, body)
    }

    pub(crate) fn status(path: &str, status: u16, body: Vec<u8>) -> Self {
        Self {
            path: path.to_owned(),
            status,
            body,
            delay: None,
        }
    }

    /// Accept the request but hold the response back for `delay`.
    pub(crate) fn delayed(path: &str, delay: Duration, body: Vec<u8>) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(path, body)
        }
    }
}

pub(crate) struct TestServer {
    base: String,
}

impl TestServer {
    /// Start serving `routes` on an ephemeral port. The server lives until
    /// the test process exits.
    pub(crate) fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let routes = Arc::new(routes);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}"),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

fn handle(mut stream: TcpStream, routes: &[Route]) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let route = routes.iter().find(|route| route.path == path);
    if let Some(delay) = route.and_then(|route| route.delay) {
        thread::sleep(delay);
    }
    let (status, body): (u16, &[u8]) = match route {
        Some(route) => (route.status, &route.body),
        None => (404, b"not found"),
    };
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
