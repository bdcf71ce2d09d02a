use std::collections::HashMap;
use std::{ops::Deref, rc::Rc};

use actix_web::{
    HttpMessage,
    body::BoxBody,
    dev::{Path, Service, ServiceRequest, ServiceResponse, Url, forward_ready},
    error::Error as ActixError,
};
use chrono::Utc;
use futures_core::future::LocalBoxFuture;

use super::rewrite::Engine;
use super::util;

/// Request-scoped environment variables emitted by `E=` flags.
///
/// Downstream handlers read these from the request extensions instead
/// of the process environment.
#[derive(Clone, Debug, Default)]
pub struct RewriteEnv(pub HashMap<String, String>);

/// Assembled rewrite service
#[derive(Clone)]
pub struct RewriteService<S>(pub(crate) Rc<RewriteInner<S>>);

impl<S> Deref for RewriteService<S> {
    type Target = RewriteInner<S>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct RewriteInner<S> {
    pub(crate) service: Rc<S>,
    pub(crate) engine: Rc<Engine>,
}

impl<S> Service<ServiceRequest> for RewriteService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = ActixError> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let this = Rc::clone(&self.0);
        Box::pin(async move {
            let now = Utc::now();
            let result = this.engine.rewrite_at(req.request(), now);

            if result.changed() {
                let uri = util::recode(&result.uri)
                    .inspect_err(|err| tracing::error!("rewritten uri rejected: {err:?}"))?;
                tracing::debug!("rewrite applied: {} -> {}", result.original, result.uri);
                req.head_mut().uri = uri.clone();
                *req.match_info_mut() = Path::new(Url::new(uri));
            }
            if !result.env.is_empty() {
                req.extensions_mut().insert(RewriteEnv(result.env.clone()));
            }

            let mut res = this.service.call(req).await?;
            util::apply_overrides(&mut res, &result, now)
                .inspect_err(|err| tracing::error!("rewrite override failed: {err:?}"))?;
            Ok(res)
        })
    }
}
