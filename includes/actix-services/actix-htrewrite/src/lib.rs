//! Actix-Web Middleware designed to replicate HTTPd's [`mod_rewrite`](https://httpd.apache.org/docs/current/mod/mod_rewrite.html).
//!
//! Beyond rewriting the request uri, rules can schedule side effects
//! that this middleware applies around the wrapped service: cookies,
//! request-scoped environment variables, and content-type, server
//! string and status-code overrides on the outgoing response.
//!
//! # Example
//!
//! ```
//! use actix_web::App;
//! use actix_htrewrite::Engine;
//!
//! let mut engine = Engine::new();
//! engine.add_rules(r#"
//!     RewriteRule ^file/(.*)$     /tmp/$1      [L]
//!     RewriteRule ^redirect/(.*)$ /location/$1 [R=302]
//!     RewriteRule ^blocked/(.*)$  -            [F]
//! "#).expect("failed to process rules");
//!
//! let app = App::new()
//!   .wrap(engine.middleware());
//! ```
//!
//! # Documentation
//!
//! Information regarding the rewrite expression language can be found
//! in the [mod_rewrite manual](https://httpd.apache.org/docs/current/mod/mod_rewrite.html).
mod error;
mod factory;
mod rewrite;
mod service;
pub mod util;

pub use error::Error;
pub use factory::Middleware;
pub use rewrite::Engine;
pub use service::{RewriteEnv, RewriteService};

pub use ht_rewrite::{RequestContext, Rewrite, Rule, SetCookie};
