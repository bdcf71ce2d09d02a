//! Actix-Web facing wrapper around the rewrite engine

use std::path::Path;

use actix_web::HttpRequest;
use chrono::{DateTime, Utc};
use ht_rewrite::{RequestContext, Rewrite, Rule};

use crate::Middleware;

use super::error::Error;
use super::util;

/// Actix-Web compatible wrapper on [`Engine`](ht_rewrite::Engine).
///
/// Carries the server-wide attributes (document root, server identity
/// string) merged into every per-request [`RequestContext`].
#[derive(Clone, Debug)]
pub struct Engine {
    engine: ht_rewrite::Engine,
    document_root: Option<String>,
    server_string: Option<String>,
}

impl Engine {
    /// Creates a new [`Engine`] instance.
    ///
    /// See [`ht_rewrite::Engine`] for more details.
    pub fn new() -> Self {
        Self {
            engine: ht_rewrite::Engine::new(),
            document_root: None,
            server_string: None,
        }
    }

    /// Seed the parser's `RewriteEngine` state for rules added later.
    ///
    /// See [`ht_rewrite::Engine::initial_state`] for more details.
    pub fn initial_state(mut self, on: bool) -> Self {
        self.engine = self.engine.initial_state(on);
        self
    }

    /// Hard ceiling on evaluation passes per request.
    ///
    /// See [`ht_rewrite::Engine::max_restarts`] for more details.
    pub fn max_restarts(mut self, limit: u32) -> Self {
        self.engine = self.engine.max_restarts(limit);
        self
    }

    /// Document root reported through `%{DOCUMENT_ROOT}`.
    pub fn document_root<S: Into<String>>(mut self, root: S) -> Self {
        self.document_root = Some(root.into());
        self
    }

    /// Server identity reported through `%{SERVER_SOFTWARE}`.
    pub fn server_string<S: Into<String>>(mut self, server: S) -> Self {
        self.server_string = Some(server.into());
        self
    }

    /// Append a programmatically constructed rule ahead of any rule
    /// document parsed later.
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.engine.add_rule(rule);
        self
    }

    /// Parse additional rewrite expressions to append to the engine.
    ///
    /// See [`ht_rewrite::Engine::add_rules`] for more details.
    pub fn add_rules(&mut self, rules: &str) -> Result<&mut Self, Error> {
        self.engine.add_rules(rules)?;
        Ok(self)
    }

    /// Parse additional rewrite expressions from a file to append to
    /// the engine.
    #[inline]
    pub fn add_rules_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self, Error> {
        self.add_rules(&std::fs::read_to_string(path)?)
    }

    /// Builder method equivalent of [`Engine::add_rules`]
    #[inline]
    pub fn rules(mut self, rules: &str) -> Result<Self, Error> {
        self.add_rules(rules)?;
        Ok(self)
    }

    /// Builder method equivalent of [`Engine::add_rules_file`]
    #[inline]
    pub fn rules_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, Error> {
        self.add_rules_file(path)?;
        Ok(self)
    }

    /// Evaluate the given [`HttpRequest`] against the engine rules.
    #[inline]
    pub fn rewrite(&self, req: &HttpRequest) -> Rewrite {
        self.rewrite_at(req, Utc::now())
    }

    /// Evaluate with a pinned request time, used for cookie expiry and
    /// the `TIME_*` variables.
    pub fn rewrite_at(&self, req: &HttpRequest, at: DateTime<Utc>) -> Rewrite {
        self.engine.rewrite(&self.context(req, at))
    }

    fn context(&self, req: &HttpRequest, at: DateTime<Utc>) -> RequestContext {
        let mut ctx = util::request_context(req, at);
        if let Some(root) = &self.document_root {
            ctx = ctx.document_root(root.clone());
        }
        if let Some(server) = &self.server_string {
            ctx = ctx.server_string(server.clone());
        }
        ctx
    }

    /// Converts the engine into Actix-Web middleware.
    ///
    /// # Examples
    ///
    /// ```
    /// use actix_web::App;
    /// use actix_htrewrite::Engine;
    ///
    /// let mut engine = Engine::new();
    /// engine.add_rules("RewriteEngine On\n").expect("failed to add rules");
    ///
    /// let app = App::new()
    ///     .wrap(engine.middleware());
    /// ```
    #[inline]
    pub fn middleware(self) -> Middleware {
        self.into()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
