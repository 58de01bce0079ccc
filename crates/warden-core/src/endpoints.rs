//! Loopback helper HTTP endpoints (§6).
//!
//! Two distinct ways a user can add a personal allow entry, each with
//! different rule-construction semantics:
//!
//! - `POST /allow-rule` — body is a filter-rule pattern the caller already
//!   wrote (e.g. picked out of a "what just got blocked" panel); used
//!   **verbatim**, with `@@` prepended, preserving whatever modifiers it
//!   already carries.
//! - `GET /unblock?host=` — caller supplies only a hostname; synthesizes
//!   the broad, host-anchored `@@||host^` with no modifiers at all.
//!
//! Both listen on `127.0.0.1` on an OS-assigned ephemeral port so nothing
//! outside the local machine can reach them.

use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tiny_http::{Header, Method, Response, Server};

use crate::error::{Result, WardenError};

/// Request bodies larger than this are rejected outright.
const MAX_ALLOW_RULE_BODY: usize = 4 * 1024;

/// A rule text produced by one of the two endpoints, ready to hand to the
/// rule store for immediate insertion into the live "user allowlist" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointRule {
    /// From `POST /allow-rule`: the caller's exact rule text, `@@` prepended.
    AllowRule(String),
    /// From `GET /unblock?host=`: synthesized `@@||host^`.
    Unblock(String),
}

impl EndpointRule {
    pub fn rule_text(&self) -> String {
        match self {
            EndpointRule::AllowRule(body) => format!("@@{body}"),
            EndpointRule::Unblock(host) => format!("@@||{host}^"),
        }
    }
}

pub struct HelperServer {
    server: Server,
}

impl HelperServer {
    /// Bind on `127.0.0.1` with an OS-assigned port.
    pub fn bind() -> Result<Self> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let server = Server::http(addr)
            .map_err(|e| WardenError::Rewrite(format!("failed to bind helper server: {e}")))?;
        Ok(Self { server })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.server.server_addr() {
            tiny_http::ListenAddr::IP(addr) => Some(addr),
            _ => None,
        }
    }

    /// Block waiting for the next request, handle it, and return the
    /// resulting [`EndpointRule`] if the request produced one.
    pub fn serve_one(&self) -> Option<EndpointRule> {
        let mut request = match self.server.recv() {
            Ok(r) => r,
            Err(_) => return None,
        };

        let outcome = match (request.method().clone(), request.url().to_string()) {
            (Method::Post, url) if url.starts_with("/allow-rule") => {
                handle_allow_rule(&mut request)
            }
            (Method::Get, url) if url.starts_with("/unblock") => handle_unblock(&url),
            (Method::Options, _) => {
                let _ = request.respond(options_response());
                return None;
            }
            _ => Err(no_store_response(404, "not found")),
        };

        match outcome {
            Ok(rule) => {
                let _ = request.respond(no_store_response(200, "ok"));
                Some(rule)
            }
            Err(response) => {
                let _ = request.respond(response);
                None
            }
        }
    }
}

fn handle_allow_rule(request: &mut tiny_http::Request) -> std::result::Result<EndpointRule, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = Vec::new();
    let mut limited = request.as_reader().take(MAX_ALLOW_RULE_BODY as u64 + 1);
    limited
        .read_to_end(&mut body)
        .map_err(|_| no_store_response(400, "failed to read body"))?;

    if body.len() > MAX_ALLOW_RULE_BODY {
        return Err(no_store_response(413, "rule text too large"));
    }

    let text = String::from_utf8(body).map_err(|_| no_store_response(400, "rule text must be utf-8"))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(no_store_response(400, "empty rule text"));
    }

    Ok(EndpointRule::AllowRule(text))
}

fn handle_unblock(url: &str) -> std::result::Result<EndpointRule, Response<std::io::Cursor<Vec<u8>>>> {
    let host = query_param(url, "host").ok_or_else(|| no_store_response(400, "missing host parameter"))?;
    if host.is_empty() || host.contains('/') {
        return Err(no_store_response(400, "invalid host"));
    }
    Ok(EndpointRule::Unblock(host.to_ascii_lowercase()))
}

fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn no_store_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(Header::from_bytes(&b"Cache-Control"[..], &b"no-store"[..]).unwrap())
        .with_header(Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..]).unwrap())
        .with_header(Header::from_bytes(&b"Access-Control-Allow-Methods"[..], &b"GET, POST, OPTIONS"[..]).unwrap())
}

/// Bare `OPTIONS` preflight response: no body, same permissive CORS headers.
fn options_response() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(String::new())
        .with_status_code(204)
        .with_header(Header::from_bytes(&b"Cache-Control"[..], &b"no-store"[..]).unwrap())
        .with_header(Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..]).unwrap())
        .with_header(Header::from_bytes(&b"Access-Control-Allow-Methods"[..], &b"GET, POST, OPTIONS"[..]).unwrap())
        .with_header(Header::from_bytes(&b"Access-Control-Allow-Headers"[..], &b"Content-Type"[..]).unwrap())
}
