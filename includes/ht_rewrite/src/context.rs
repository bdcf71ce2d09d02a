//! Request-scoped variable sources used for `%{NAME}` expansion in
//! condition inputs.
//!
//! Designed as a subset of [official](https://httpd.apache.org/docs/current/mod/mod_rewrite.html#rewritecond)
//! `RewriteCond` back-references. Fields that would require DNS work
//! (`REMOTE_HOST`, `SERVER_NAME`, `SERVER_ADDR`) are supplied by the
//! context builder up front; the engine never resolves anything while
//! evaluating.

use std::{io, net::ToSocketAddrs};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_automata::meta::Regex;

use crate::uri;

static MATCHER: Lazy<Regex> = Lazy::new(|| Regex::new(r"%\{\w+\}").expect("variable matcher"));

/// Version constant surfaced through `%{API_VERSION}`
const API_VERSION: &str = env!("CARGO_PKG_VERSION");

macro_rules! setter {
    ($key:ident, $ref:ident) => {
        #[doc = concat!("Assign value for `", stringify!($ref), "` variable")]
        pub fn $key<S: Into<String>>(mut self, $key: S) -> Self {
            self.$key = Some($key.into());
            self
        }
    };
}

/// Per-request snapshot consumed by the rewrite engine.
///
/// Holds the original uri plus every server and sender attribute the
/// variable table can expand. Never mutated by evaluation.
#[derive(Clone, Debug)]
pub struct RequestContext {
    uri: String,
    request_time: DateTime<Utc>,
    method: Option<String>,
    user_agent: Option<String>,
    cookie: Option<String>,
    remote_addr: Option<String>,
    remote_port: Option<u16>,
    remote_host: Option<String>,
    document_root: Option<String>,
    server_name: Option<String>,
    server_addr: Option<String>,
    server_port: Option<u16>,
    server_string: Option<String>,
}

impl RequestContext {
    /// Build a context around the original request uri, stamped with
    /// the current UTC time.
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: uri.into(),
            request_time: Utc::now(),
            method: None,
            user_agent: None,
            cookie: None,
            remote_addr: None,
            remote_port: None,
            remote_host: None,
            document_root: None,
            server_name: None,
            server_addr: None,
            server_port: None,
            server_string: None,
        }
    }

    setter!(method, REQUEST_METHOD);
    setter!(user_agent, HTTP_USER_AGENT);
    setter!(cookie, HTTP_COOKIE);
    setter!(remote_host, REMOTE_HOST);
    setter!(document_root, DOCUMENT_ROOT);
    setter!(server_name, SERVER_NAME);
    setter!(server_string, SERVER_SOFTWARE);

    /// Pin the request time used by the `TIME_*` variables and cookie
    /// expiry computation.
    pub fn request_time(mut self, at: DateTime<Utc>) -> Self {
        self.request_time = at;
        self
    }

    /// Assign value for `REMOTE_ADDR` and `REMOTE_PORT` variables.
    pub fn remote_addr<A: ToSocketAddrs>(mut self, remote_addr: A) -> io::Result<Self> {
        let addr = remote_addr
            .to_socket_addrs()?
            .next()
            .expect("missing socket address");
        self.remote_addr = Some(addr.ip().to_string());
        self.remote_port = Some(addr.port());
        Ok(self)
    }

    /// Assign value for `REMOTE_ADDR` and `REMOTE_PORT` variables if
    /// address is Some.
    pub fn maybe_remote_addr<A: ToSocketAddrs>(self, remote_addr: Option<A>) -> io::Result<Self> {
        match remote_addr {
            Some(addr) => self.remote_addr(addr),
            None => Ok(self),
        }
    }

    /// Assign value for `SERVER_ADDR` and `SERVER_PORT` variables.
    /// `SERVER_NAME` falls back to the address when not set explicitly.
    pub fn server_addr<A: ToSocketAddrs>(mut self, server_addr: A) -> io::Result<Self> {
        let addr = server_addr
            .to_socket_addrs()?
            .next()
            .expect("missing socket address");
        self.server_addr = Some(addr.ip().to_string());
        self.server_port = Some(addr.port());
        self.server_name = Some(
            self.server_name
                .unwrap_or_else(|| addr.ip().to_string()),
        );
        Ok(self)
    }

    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[inline]
    pub fn time(&self) -> DateTime<Utc> {
        self.request_time
    }

    /// Replace every `%{NAME}` token in `input` with its value from
    /// the variable table. Names are matched case-insensitively;
    /// unrecognised names are left textually intact. No recursive
    /// re-expansion of substituted content.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut copied = 0;
        for found in MATCHER.find_iter(input) {
            out.push_str(&input[copied..found.start()]);
            let token = &input[found.range()];
            match self.var(&token[2..token.len() - 1]) {
                Some(value) => out.push_str(&value),
                None => out.push_str(token),
            }
            copied = found.end();
        }
        out.push_str(&input[copied..]);
        out
    }

    fn var(&self, name: &str) -> Option<String> {
        let parts = uri::dissect(&self.uri);
        let time = &self.request_time;
        let value = match name.to_ascii_uppercase().as_str() {
            "HTTP_USER_AGENT" => self.user_agent.clone().unwrap_or_default(),
            "HTTP_COOKIE" => self.cookie.clone().unwrap_or_default(),
            "HTTP_HOST" => host_of(parts.head).to_owned(),
            "REMOTE_ADDR" => self.remote_addr.clone().unwrap_or_default(),
            "REMOTE_HOST" => self.remote_host.clone().unwrap_or_default(),
            "REMOTE_USER" | "REMOTE_IDENT" => self.remote_endpoint(),
            "REQUEST_METHOD" => self.method.clone().unwrap_or_default(),
            "SCRIPT_FILENAME" | "REQUEST_FILENAME" => parts.path.to_owned(),
            "QUERY_STRING" => parts.query.to_owned(),
            "DOCUMENT_ROOT" => self.document_root.clone().unwrap_or_default(),
            "SERVER_NAME" => self.server_name.clone().unwrap_or_default(),
            "SERVER_ADDR" => self.server_addr.clone().unwrap_or_default(),
            "SERVER_PORT" => self
                .server_port
                .map(|p| p.to_string())
                .unwrap_or_default(),
            "SERVER_PROTOCOL" | "SERVER_SOFTWARE" => {
                self.server_string.clone().unwrap_or_default()
            }
            "TIME_YEAR" => time.format("%Y").to_string(),
            "TIME_MON" => time.format("%m").to_string(),
            "TIME_DAY" => time.format("%d").to_string(),
            "TIME_HOUR" => time.format("%H").to_string(),
            "TIME_MIN" => time.format("%M").to_string(),
            "TIME_SEC" => time.format("%S").to_string(),
            "TIME_WDAY" => time.format("%A").to_string(),
            "TIME" => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "API_VERSION" => API_VERSION.to_owned(),
            "REQUEST_URI" => self.uri.clone(),
            _ => return None,
        };
        Some(value)
    }

    // `addr:port` of the sender, empty when unknown
    fn remote_endpoint(&self) -> String {
        match (&self.remote_addr, self.remote_port) {
            (Some(addr), Some(port)) => format!("{addr}:{port}"),
            _ => String::new(),
        }
    }
}

fn host_of(head: &str) -> &str {
    let authority = head.split_once("://").map(|(_, a)| a).unwrap_or("");
    authority
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(authority)
}
