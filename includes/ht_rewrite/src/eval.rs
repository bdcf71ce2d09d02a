use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::context::RequestContext;
use crate::flag::{DEFAULT_NEXT_CAP, Flag};
use crate::rule::Rule;
use crate::uri;

/// Cookie payload scheduled by a `CO=` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
    pub value: String,
    /// Lifetime in seconds, counted from the request time
    pub ttl: u64,
}

impl SetCookie {
    /// Absolute expiry: `request_time + ttl`
    pub fn expires_at(&self, request_time: DateTime<Utc>) -> DateTime<Utc> {
        request_time + Duration::seconds(self.ttl as i64)
    }
}

/// Outcome of evaluating a rule set against one request.
///
/// Carries the rewritten uri next to the original for comparison, plus
/// every side effect the server is expected to apply: cookies to emit,
/// request-scoped environment variables, and the optional server
/// string, content type and status overrides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rewrite {
    pub uri: String,
    pub original: String,
    pub cookies: HashMap<String, SetCookie>,
    pub env: HashMap<String, String>,
    pub server_string: Option<String>,
    pub mime_type: Option<String>,
    pub status: Option<u16>,
}

impl Rewrite {
    #[inline]
    pub fn changed(&self) -> bool {
        self.uri != self.original
    }

    /// True when applying this result would change nothing.
    pub fn is_noop(&self) -> bool {
        !self.changed()
            && self.cookies.is_empty()
            && self.env.is_empty()
            && self.server_string.is_none()
            && self.mime_type.is_none()
            && self.status.is_none()
    }
}

/// Evaluate `rules` in order against the request, restarting on `N`
/// within the pass budget. Never fails: anything that goes wrong at
/// runtime reads as "this rule did not match".
pub(crate) fn evaluate(
    rules: &[Rule],
    ctx: &RequestContext,
    restart_limit: Option<u32>,
    cancel: Option<&AtomicBool>,
) -> Rewrite {
    let mut result = Rewrite {
        uri: ctx.uri().to_owned(),
        original: ctx.uri().to_owned(),
        ..Rewrite::default()
    };

    // the budget counts total passes over the rule list; seeded from
    // the largest N cap present, clamped by the engine-level limit
    let mut budget = rules
        .iter()
        .filter_map(Rule::next_cap)
        .max()
        .unwrap_or(DEFAULT_NEXT_CAP);
    if let Some(limit) = restart_limit {
        budget = budget.min(limit);
    }
    let mut passes: u32 = 1;

    'pass: loop {
        let mut chained = false;
        let mut previous_ok = false;
        let mut skip: u16 = 0;

        for rule in rules {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                break 'pass;
            }
            if skip > 0 {
                skip -= 1;
                continue;
            }
            if chained && !previous_ok {
                // remainder of a failed chain; the skipped entity still
                // contributes its own link to the chain state
                chained = rule.is_condition() || rule.chains();
                continue;
            }

            previous_ok = match rule.condition_input() {
                Some(input) => rule.matches(&ctx.expand(input)),
                None => match apply_rule(rule, &result.uri) {
                    Some(next) => {
                        result.uri = next;
                        true
                    }
                    None => false,
                },
            };
            chained = rule.is_condition() || rule.chains();
            if !previous_ok {
                continue;
            }

            let mut halt = false;
            for flag in rule.flags() {
                match flag {
                    Flag::Cookie { name, value, ttl } => {
                        result.cookies.insert(
                            name.clone(),
                            SetCookie {
                                value: value.clone(),
                                ttl: *ttl,
                            },
                        );
                    }
                    Flag::EnvVar { name, value } => {
                        result.env.insert(name.clone(), value.clone());
                    }
                    Flag::ServerString(s) => result.server_string = Some(s.clone()),
                    Flag::MimeType(t) => result.mime_type = Some(t.clone()),
                    Flag::Status(code) => result.status = Some(*code),
                    Flag::Skip(count) => skip = *count,
                    Flag::Next { .. } => {
                        if passes >= budget {
                            // budget exhausted: stop with what we have
                            break 'pass;
                        }
                        passes += 1;
                        continue 'pass;
                    }
                    Flag::Last => halt = true,
                    Flag::Chained
                    | Flag::NoCase
                    | Flag::NoEscape
                    | Flag::NoQuery
                    | Flag::NoPlus
                    | Flag::QueryAppend => {}
                }
            }
            if halt {
                break 'pass;
            }
        }
        break;
    }

    result
}

// match input: the decoded path with one leading slash stripped
fn apply_rule(rule: &Rule, current: &str) -> Option<String> {
    let decoded = uri::decode(uri::dissect(current).path);
    let input = decoded.strip_prefix('/').unwrap_or(&decoded);
    let substitution = rule.try_substitute(input)?;
    compose(current, substitution, rule)
}

// turn a raw substitution into the next working uri: promote to
// absolute, merge the query, re-attach the fragment, fold spaces
fn compose(current: &str, substitution: String, rule: &Rule) -> Option<String> {
    let parts = uri::dissect(current);

    let mut out = substitution;
    if !uri::has_scheme(&out) {
        out = format!("{}/{}", parts.head, out.trim_start_matches('/'));
    }

    if rule.query_append() && !rule.no_query() && !parts.query.is_empty() {
        out.push(if out.contains('?') { '&' } else { '?' });
        out.push_str(parts.query);
    }

    if !parts.fragment.is_empty() && !out.contains('#') {
        out.push('#');
        out.push_str(parts.fragment);
    }

    if !rule.no_plus() {
        out = out.replace(' ', "+");
    }

    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;

    fn rewrite(rules: &str, uri: &str) -> Rewrite {
        rewrite_ctx(rules, RequestContext::new(uri))
    }

    fn rewrite_ctx(rules: &str, ctx: RequestContext) -> Rewrite {
        let mut engine = Engine::new();
        engine.add_rules(rules).expect("failed to process rules");
        engine.rewrite(&ctx)
    }

    #[test]
    fn test_plain_rewrite() {
        let r = rewrite("RewriteRule ^old/(.*)$ /new/$1 [L]", "http://h/old/x");
        assert_eq!(r.uri, "http://h/new/x");
        assert_eq!(r.original, "http://h/old/x");
        assert!(r.changed());
        assert!(r.cookies.is_empty() && r.env.is_empty());
        assert!(r.server_string.is_none() && r.mime_type.is_none() && r.status.is_none());
    }

    #[test]
    fn test_condition_gates_rule() {
        let rules = r#"
            RewriteCond %{HTTP_USER_AGENT} MSIE [NC]
            RewriteRule ^(.*)$ /ie/$1 [L]
        "#;

        let ie = RequestContext::new("http://h/foo")
            .user_agent("Mozilla/4.0 (compatible; MSIE 6.0)");
        assert_eq!(rewrite_ctx(rules, ie).uri, "http://h/ie/foo");

        let curl = RequestContext::new("http://h/foo").user_agent("curl/8.0");
        let r = rewrite_ctx(rules, curl);
        assert_eq!(r.uri, "http://h/foo");
        assert!(r.is_noop());
    }

    #[test]
    fn test_skip_flag() {
        let rules = r#"
            RewriteRule ^a$ b [S=1]
            RewriteRule ^b$ c [L]
            RewriteRule ^b$ d [L]
        "#;
        assert_eq!(rewrite(rules, "http://h/a").uri, "http://h/d");
    }

    #[test]
    fn test_query_string_append() {
        let r = rewrite("RewriteRule ^p$ /q?x=1 [QSA,L]", "http://h/p?y=2");
        assert_eq!(r.uri, "http://h/q?x=1&y=2");
    }

    #[test]
    fn test_query_append_without_own_query() {
        let r = rewrite("RewriteRule ^p$ /q [QSA,L]", "http://h/p?y=2");
        assert_eq!(r.uri, "http://h/q?y=2");
    }

    #[test]
    fn test_query_discard() {
        let r = rewrite("RewriteRule ^p$ /q [QSA,NQ,L]", "http://h/p?y=2");
        assert_eq!(r.uri, "http://h/q");
    }

    #[test]
    fn test_cookie_and_status_override() {
        let r = rewrite(
            "RewriteRule ^login$ /login [CO=sid:abc:3600,R=302,L]",
            "http://h/login",
        );
        assert_eq!(r.uri, "http://h/login");
        assert!(!r.changed());
        assert_eq!(
            r.cookies.get("sid"),
            Some(&SetCookie {
                value: "abc".into(),
                ttl: 3600,
            })
        );
        assert_eq!(r.status, Some(302));
    }

    #[test]
    fn test_next_loop_terminates() {
        let r = rewrite("RewriteRule ^(.*)$ $1x [N=8]", "http://h/a");
        assert_eq!(r.uri, format!("http://h/a{}", "x".repeat(8)));
    }

    #[test]
    fn test_next_default_cap_is_bounded() {
        let mut engine = Engine::new();
        engine
            .add_rules("RewriteRule ^(.*)$ $1x [N]")
            .expect("failed to process rules");
        let engine = engine.max_restarts(50);
        let r = engine.rewrite(&RequestContext::new("http://h/a"));
        assert_eq!(r.uri, format!("http://h/a{}", "x".repeat(50)));
    }

    #[test]
    fn test_failed_chain_skips_to_end() {
        let rules = r#"
            RewriteRule ^nope$ /x [C]
            RewriteRule ^(.*)$ /chained/$1 [C]
            RewriteRule ^(.*)$ /tail/$1
            RewriteRule ^(.*)$ /after/$1 [L]
        "#;
        // first two entities are a failed chain; the third is its last
        // link and is skipped with it, the fourth runs normally
        let r = rewrite(rules, "http://h/a");
        assert_eq!(r.uri, "http://h/after/a");
    }

    #[test]
    fn test_condition_failure_leaves_later_rules_alone() {
        let rules = r#"
            RewriteCond %{HTTP_USER_AGENT} MSIE
            RewriteRule ^(.*)$ /ie/$1
            RewriteRule ^a$ /plain [L]
        "#;
        let ctx = RequestContext::new("http://h/a").user_agent("curl/8.0");
        assert_eq!(rewrite_ctx(rules, ctx).uri, "http://h/plain");
    }

    #[test]
    fn test_env_and_overrides() {
        let rules = "RewriteRule ^api/(.*)$ /v2/$1 [E=backend:v2,SS=edge/1.0,T=Application/Json,L]";
        let r = rewrite(rules, "http://h/api/users");
        assert_eq!(r.uri, "http://h/v2/users");
        assert_eq!(r.env.get("backend"), Some(&"v2".to_string()));
        assert_eq!(r.server_string.as_deref(), Some("edge/1.0"));
        assert_eq!(r.mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_forbidden_passthrough() {
        let r = rewrite("RewriteRule ^private/.*$ - [F]", "http://h/private/x");
        assert_eq!(r.uri, "http://h/private/x");
        assert_eq!(r.status, Some(403));
    }

    #[test]
    fn test_last_write_wins_within_pass() {
        let rules = r#"
            RewriteRule ^a$ b [T=text/html]
            RewriteRule ^b$ c [T=text/css,L]
        "#;
        let r = rewrite(rules, "http://h/a");
        assert_eq!(r.mime_type.as_deref(), Some("text/css"));
    }

    #[test]
    fn test_space_to_plus_and_bnp() {
        let folded = rewrite("RewriteRule ^a$ /hello%20world [NE,L]", "http://h/a");
        assert_eq!(folded.uri, "http://h/hello%20world");

        let folded = rewrite(r#"RewriteRule ^a$ "/hello world" [L]"#, "http://h/a");
        assert_eq!(folded.uri, "http://h/hello+world");

        let kept = rewrite(r#"RewriteRule ^a$ "/hello world" [BNP,L]"#, "http://h/a");
        assert_eq!(kept.uri, "http://h/hello world");
    }

    #[test]
    fn test_fragment_reattached() {
        let r = rewrite("RewriteRule ^old$ /new [L]", "http://h/old#sec");
        assert_eq!(r.uri, "http://h/new#sec");
    }

    #[test]
    fn test_percent_decoded_input() {
        let r = rewrite(r#"RewriteRule "^a b$" /spaced [L]"#, "http://h/a%20b");
        assert_eq!(r.uri, "http://h/spaced");
    }

    #[test]
    fn test_no_case_does_not_leak() {
        let rules = r#"
            RewriteRule ^first$ /SECOND [NC]
            RewriteRule ^second$ /leaked [L]
            RewriteRule ^SECOND$ /ok [L]
        "#;
        // NC belongs to the first rule only; if it leaked, the
        // case-sensitive second rule would swallow /SECOND
        let r = rewrite(rules, "http://h/FIRST");
        assert_eq!(r.uri, "http://h/ok");
    }

    #[test]
    fn test_deterministic() {
        let rules = r#"
            RewriteCond %{REQUEST_METHOD} ^GET$
            RewriteRule ^(.*)$ /get/$1 [CO=seen:1,L]
        "#;
        let ctx = RequestContext::new("http://h/x").method("GET");
        let a = rewrite_ctx(rules, ctx.clone());
        let b = rewrite_ctx(rules, ctx);
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_uri_stays_relative() {
        let r = rewrite("RewriteRule ^old/(.*)$ /new/$1 [L]", "/old/x?k=v");
        assert_eq!(r.uri, "/new/x");
    }

    #[test]
    fn test_cancel_checked_between_rules() {
        let cancel = AtomicBool::new(true);
        let mut engine = Engine::new();
        engine
            .add_rules("RewriteRule ^(.*)$ /hit/$1 [L]")
            .expect("failed to process rules");
        let r = engine.rewrite_with_cancel(&RequestContext::new("http://h/a"), &cancel);
        assert_eq!(r.uri, "http://h/a");
    }

    #[test]
    fn test_cookie_expiry() {
        use chrono::TimeZone;
        let cookie = SetCookie {
            value: "v".into(),
            ttl: 3600,
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            cookie.expires_at(at),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()
        );
    }
}
