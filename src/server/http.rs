use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 8192;
const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

/// Read one request head (and any small body) from the connection.
pub(crate) fn read_request(stream: &mut std::net::TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    parse_request(stream)
}

pub(crate) fn parse_request<R: Read>(reader: &mut R) -> Result<HttpRequest> {
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            if data.is_empty() {
                return Err(anyhow!("empty request"));
            }
            break data.len();
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
    };

    let text = String::from_utf8_lossy(&data[..head_end]);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    // Drain a declared body so closing the socket does not reset the response.
    let declared = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if declared > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }
    let mut remaining = declared.saturating_sub(data.len() - head_end);
    while remaining > 0 {
        let n = reader.read(&mut buf[..remaining.min(1024)])?;
        if n == 0 {
            break;
        }
        remaining -= n;
    }

    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (raw_path, HashMap::new()),
    };
    Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        query,
        headers,
    })
}

/// Decode `application/x-www-form-urlencoded` pairs; later keys win.
pub(crate) fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "HTTP/1.1 200 OK",
        303 => "HTTP/1.1 303 See Other",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

pub(crate) fn write_json_response<W: Write>(out: &mut W, status: u16, body: &str) -> Result<()> {
    write_response(out, status, "application/json", body.as_bytes())
}

pub(crate) fn write_error<W: Write>(out: &mut W, status: u16, message: &str) -> Result<()> {
    let body = serde_json::json!({ "error": message }).to_string();
    write_json_response(out, status, &body)
}

pub(crate) fn write_response<W: Write>(
    out: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line(status),
        content_type = content_type,
        len = body.len()
    );
    out.write_all(header.as_bytes())?;
    out.write_all(body)?;
    out.flush()?;
    Ok(())
}

pub(crate) fn write_redirect<W: Write>(out: &mut W, location: &str) -> Result<()> {
    let header = format!(
        "{status_line}\r\nLocation: {location}\r\nContent-Length: 0\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line(303),
        location = location
    );
    out.write_all(header.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Head of an unbounded streaming response; the body ends when the
/// connection closes.
pub(crate) fn write_stream_head<W: Write>(out: &mut W, content_type: &str) -> Result<()> {
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line(200),
        content_type = content_type
    );
    out.write_all(header.as_bytes())?;
    out.flush()?;
    Ok(())
}
