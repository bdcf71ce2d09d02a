//! Framework agnostic reimplementation of HTTPD's [mod_rewrite](https://httpd.apache.org/docs/current/mod/mod_rewrite.html).
//!
//! Rules are compiled once per rule-source revision; evaluation is a
//! pure function of the compiled rules and a per-request
//! [`RequestContext`], producing a [`Rewrite`] that bundles the
//! rewritten uri with the side effects the server applies (cookies,
//! environment variables, server string, content type and status
//! overrides).
//!
//! # Example
//!
//! ```
//! use ht_rewrite::{Engine, RequestContext};
//!
//! let mut engine = Engine::default();
//! engine.add_rules(r#"
//!   RewriteRule ^file/(.*)$    /tmp/$1      [L]
//!   RewriteRule ^redirect/(.*)$ /location/$1 [R=302]
//!   RewriteRule ^blocked/(.*)$ -            [F]
//! "#).expect("failed to process rules");
//!
//! let ctx = RequestContext::new("http://localhost/file/document.txt");
//! let result = engine.rewrite(&ctx);
//! assert_eq!(result.uri, "http://localhost/tmp/document.txt");
//! ```
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

mod context;
pub mod error;
mod eval;
mod flag;
mod parse;
mod rule;
mod uri;

pub use context::RequestContext;
pub use error::{ParseError, RuleError};
pub use eval::{Rewrite, SetCookie};
pub use flag::Flag;
pub use rule::Rule;

/// Compiled rule set evaluating requests into [`Rewrite`] results.
///
/// Rules accumulate in order: programmatic rules added first are
/// evaluated before anything parsed from a rule document later, which
/// is how extra rules are prepended to a rule file. Structural
/// duplicates are dropped, first occurrence wins.
#[derive(Clone, Debug)]
pub struct Engine {
    rules: Vec<Rule>,
    initial_on: bool,
    restart_limit: Option<u32>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            initial_on: true,
            restart_limit: None,
        }
    }

    /// Seed the parser's `RewriteEngine` state for subsequent
    /// [`Engine::add_rules`] calls. Default is on.
    pub fn initial_state(mut self, on: bool) -> Self {
        self.initial_on = on;
        self
    }

    /// Hard ceiling on evaluation passes, clamping whatever `N` caps
    /// the rule set asks for.
    pub fn max_restarts(mut self, limit: u32) -> Self {
        self.restart_limit = Some(limit);
        self
    }

    /// Append a programmatically constructed [`Rule`].
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        parse::dedup(&mut self.rules);
        self
    }

    /// Parse a rule document and append its rules to the engine.
    pub fn add_rules(&mut self, rules: &str) -> Result<&mut Self, ParseError> {
        let parsed = parse::document(rules, self.initial_on)?;
        self.rules.extend(parsed);
        parse::dedup(&mut self.rules);
        Ok(self)
    }

    #[inline]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate the request against the rule set.
    ///
    /// Never fails: runtime oddities read as non-matching rules, and
    /// restart-budget exhaustion returns the state reached so far.
    #[inline]
    pub fn rewrite(&self, ctx: &RequestContext) -> Rewrite {
        eval::evaluate(&self.rules, ctx, self.restart_limit, None)
    }

    /// Like [`Engine::rewrite`], with a cancellation flag checked
    /// between rules and at restart points.
    #[inline]
    pub fn rewrite_with_cancel(&self, ctx: &RequestContext, cancel: &AtomicBool) -> Rewrite {
        eval::evaluate(&self.rules, ctx, self.restart_limit, Some(cancel))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Engine {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut engine = Self::new();
        engine.add_rules(s)?;
        Ok(engine)
    }
}

/// Atomically swapped engine handle for sharing a rule set across
/// workers.
///
/// Re-parsing a changed rule source builds a fresh [`Engine`] which is
/// published wholesale with [`SharedEngine::store`]; readers clone the
/// current [`Arc`] and keep evaluating against a consistent snapshot.
#[derive(Clone, Debug, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<Arc<Engine>>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    /// Snapshot the currently published engine.
    pub fn load(&self) -> Arc<Engine> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publish a new engine revision.
    pub fn store(&self, engine: Engine) {
        let fresh = Arc::new(engine);
        match self.inner.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_accumulates() {
        let mut engine = Engine::default();
        engine
            .add_rules("RewriteRule ^static/(.*)$ /files/$1 [L]")
            .unwrap();
        engine
            .add_rules("RewriteRule ^(.*)$ /index?page=$1")
            .unwrap();
        assert_eq!(engine.rules().len(), 2);

        let r = engine.rewrite(&RequestContext::new("http://h/static/app.css"));
        assert_eq!(r.uri, "http://h/files/app.css");

        let r = engine.rewrite(&RequestContext::new("http://h/about"));
        assert_eq!(r.uri, "http://h/index?page=about");
    }

    #[test]
    fn test_programmatic_rules_come_first() {
        let mut engine = Engine::default();
        engine.add_rule(Rule::new("^ping$", "/pong", vec![Flag::Last]).unwrap());
        engine
            .add_rules("RewriteRule ^ping$ /from-file [L]")
            .unwrap();
        let r = engine.rewrite(&RequestContext::new("http://h/ping"));
        assert_eq!(r.uri, "http://h/pong");
    }

    #[test]
    fn test_add_rules_dedups_across_calls() {
        let mut engine = Engine::default();
        engine.add_rules("RewriteRule ^a$ /b [L]").unwrap();
        engine.add_rules("RewriteRule ^a$ /b [L]").unwrap();
        assert_eq!(engine.rules().len(), 1);
    }

    #[test]
    fn test_initial_state_off() {
        let mut engine = Engine::default().initial_state(false);
        engine.add_rules("RewriteRule ^a$ /b [L]").unwrap();
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_from_str() {
        let engine = Engine::from_str("RewriteRule ^a$ /b [L]").unwrap();
        assert_eq!(engine.rules().len(), 1);
        assert!(Engine::from_str("NotADirective x y").is_err());
    }

    #[test]
    fn test_shared_engine_swap() {
        let shared = SharedEngine::new(Engine::from_str("RewriteRule ^a$ /v1 [L]").unwrap());
        let before = shared.load();

        shared.store(Engine::from_str("RewriteRule ^a$ /v2 [L]").unwrap());

        // the earlier snapshot keeps evaluating the old revision
        let ctx = RequestContext::new("http://h/a");
        assert_eq!(before.rewrite(&ctx).uri, "http://h/v1");
        assert_eq!(shared.load().rewrite(&ctx).uri, "http://h/v2");
    }
}
