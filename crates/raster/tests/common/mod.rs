//! Minimal HTTP/1.1 server for range-request tests.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as received by [`FakeServer`].
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Handler = Box<dyn Fn(&Request, usize) -> (u16, Vec<u8>) + Send + Sync>;

pub struct FakeServer {
    url: String,
    listener: Option<TcpListener>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/scene/B08.tif", listener.local_addr().unwrap());
        Self {
            url,
            listener: Some(listener),
            requests: Arc::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One scripted response per request; the last one repeats.
    pub fn respond(self, responses: Vec<(u16, Vec<u8>)>) -> Self {
        self.serve(Box::new(move |_, n| responses[n.min(responses.len() - 1)].clone()))
    }

    /// Serve `file` honouring `Range: bytes=a-b` with 206 responses.
    pub fn serve_file(self, file: Vec<u8>) -> Self {
        self.serve(Box::new(move |request, _| {
            let range = request
                .header("range")
                .and_then(|r| r.strip_prefix("bytes="))
                .and_then(|r| r.split_once('-'))
                .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));
            match range {
                Some((start, end)) if start < file.len() => {
                    let end = (end + 1).min(file.len());
                    (206, file[start..end].to_vec())
                }
                Some(_) => (416, Vec::new()),
                None => (200, file.clone()),
            }
        }))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn serve(mut self, handler: Handler) -> Self {
        let listener = self.listener.take().unwrap();
        let requests = self.requests.clone();
        tokio::spawn(async move {
            let mut served = 0usize;
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                let (status, body) = handler(&request, served);
                served += 1;
                requests.lock().unwrap().push(request);
                write_response(&mut stream, status, &body).await;
            }
        });
        self
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.split("\r\n");
    let method = lines.next()?.split(' ').next()?.to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Some(Request { method, headers })
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.shutdown().await;
}
