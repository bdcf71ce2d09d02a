//! Utilities for building rewrite contexts and applying rewrite results

use std::str::FromStr;

use actix_http::{StatusCode, Uri};
use actix_web::HttpRequest;
use actix_web::body::BoxBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::{self, HeaderValue};
use chrono::{DateTime, Utc};
use ht_rewrite::{RequestContext, Rewrite};

use super::error::Error;

#[inline]
pub(crate) fn recode(uri: &str) -> Result<Uri, Error> {
    Ok(Uri::from_str(uri)?)
}

/// Build a [`RequestContext`] from [`HttpRequest`] data, stamped with
/// the given request time.
pub fn request_context(req: &HttpRequest, at: DateTime<Utc>) -> RequestContext {
    let info = req.connection_info();
    let uri = format!("{}://{}{}", info.scheme(), info.host(), req.uri());
    RequestContext::new(uri)
        .request_time(at)
        .method(req.method().as_str())
        .user_agent(header_str(req, header::USER_AGENT))
        .cookie(header_str(req, header::COOKIE))
        .maybe_remote_addr(req.peer_addr())
        .expect("invalid peer address")
        .server_addr(req.app_config().local_addr())
        .expect("invalid server address")
}

fn header_str<'a>(req: &'a HttpRequest, name: header::HeaderName) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Apply the response-side effects of a rewrite result: cookies,
/// content-type, server string and status overrides.
pub fn apply_overrides(
    res: &mut ServiceResponse<BoxBody>,
    rewrite: &Rewrite,
    at: DateTime<Utc>,
) -> Result<(), Error> {
    for (name, cookie) in &rewrite.cookies {
        let expires = cookie.expires_at(at).format("%a, %d %b %Y %H:%M:%S GMT");
        let value = format!("{name}={}; Expires={expires}", cookie.value);
        res.headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_str(&value)?);
    }
    if let Some(mime) = &rewrite.mime_type {
        res.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_str(mime)?);
    }
    if let Some(server) = &rewrite.server_string {
        res.headers_mut()
            .insert(header::SERVER, HeaderValue::from_str(server)?);
    }
    if let Some(status) = rewrite.status {
        res.response_mut().head_mut().status = StatusCode::from_u16(status)?;
    }
    Ok(())
}
