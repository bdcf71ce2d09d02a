use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex_automata::{
    MatchKind,
    meta::{self, Regex},
    util,
};

use crate::error::RuleError;
use crate::flag::Flag;

// https://url.spec.whatwg.org/#percent-encoded-bytes
const ESCAPE: &AsciiSet = &CONTROLS
    .add(b'~')
    .add(b' ') // fragment encoding
    .add(b'\'')
    .add(b'"')
    .add(b'`')
    .add(b'#') // query encoding
    .add(b'<')
    .add(b'>')
    .add(b'?') // path encoding
    .add(b'^')
    .add(b'{')
    .add(b'}')
    .add(b'/') // user-info encoding
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b'$') // component encoding
    .add(b'&')
    .add(b'+')
    .add(b',');

const DEFAULT_PATTERN: &str = "^$";
const DEFAULT_REWRITE: &str = "$0";

/// Compiled rewrite entity.
///
/// A plain entity (`RewriteRule`) matches its pattern against the
/// request uri and expands a replacement template with `$0..$9` and
/// named back-references. An entity carrying a condition input
/// (`RewriteCond`) is a predicate gating the entity that follows it;
/// its pattern runs against the variable-expanded input instead.
#[derive(Clone, Debug)]
pub struct Rule {
    pattern: Regex,
    source: String,
    rewrite: String,
    condition: Option<String>,
    flags: Vec<Flag>,
}

impl Rule {
    /// Build a rewrite rule, validating the pattern by trial compilation.
    ///
    /// An empty pattern falls back to `^$` and an empty replacement to
    /// `$0`. Duplicate flags are removed, first occurrence wins.
    pub fn new(pattern: &str, rewrite: &str, flags: Vec<Flag>) -> Result<Self, RuleError> {
        let flags = dedup_flags(flags);
        let source = pick(pattern, DEFAULT_PATTERN);
        let rewrite = pick(rewrite, DEFAULT_REWRITE);
        let pattern = compile(&source, flags.contains(&Flag::NoCase))?;
        Ok(Self {
            pattern,
            source,
            rewrite: brace_groups(&rewrite),
            condition: None,
            flags,
        })
    }

    /// Build a condition gating the entity that follows it.
    pub fn condition(input: &str, pattern: &str, flags: Vec<Flag>) -> Result<Self, RuleError> {
        let mut rule = Self::new(pattern, "", flags)?;
        rule.condition = Some(input.to_owned());
        Ok(rule)
    }

    #[inline]
    pub fn is_condition(&self) -> bool {
        self.condition.is_some()
    }

    #[inline]
    pub(crate) fn condition_input(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    #[inline]
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    #[inline]
    pub(crate) fn chains(&self) -> bool {
        self.flags.contains(&Flag::Chained)
    }

    #[inline]
    pub(crate) fn no_query(&self) -> bool {
        self.flags.contains(&Flag::NoQuery)
    }

    #[inline]
    pub(crate) fn no_plus(&self) -> bool {
        self.flags.contains(&Flag::NoPlus)
    }

    #[inline]
    pub(crate) fn query_append(&self) -> bool {
        self.flags.contains(&Flag::QueryAppend)
    }

    #[inline]
    pub(crate) fn next_cap(&self) -> Option<u32> {
        self.flags.iter().find_map(|f| match f {
            Flag::Next { cap } => Some(*cap),
            _ => None,
        })
    }

    /// Run a condition pattern against its expanded input.
    #[inline]
    pub(crate) fn matches(&self, input: &str) -> bool {
        self.pattern.is_match(input)
    }

    /// Try to match the pattern against the given input and expand the
    /// replacement template.
    ///
    /// Interpolated capture text is percent-encoded unless the entity
    /// carries `NE`. A replacement of exactly `-` passes the input
    /// through unchanged.
    pub(crate) fn try_substitute(&self, input: &str) -> Option<String> {
        let mut caps = self.pattern.create_captures();
        self.pattern.captures(input, &mut caps);
        if !caps.is_match() {
            return None;
        }
        if self.rewrite == "-" {
            return Some(input.to_owned());
        }

        let noescape = self.flags.contains(&Flag::NoEscape);
        let mut dst = String::new();
        util::interpolate::string(
            &self.rewrite,
            |index, dst| {
                let text = match caps.get_group(index) {
                    None => return,
                    Some(span) => &input[span],
                };
                if noescape {
                    return dst.push_str(text);
                }
                let escaped = utf8_percent_encode(text, ESCAPE).to_string();
                dst.push_str(&escaped);
            },
            |name| caps.group_info().to_index(caps.pattern()?, name),
            &mut dst,
        );
        Some(dst)
    }
}

// structural equality: compiled patterns are opaque, the source text
// plus template, condition input and flags identify an entity
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.rewrite == other.rewrite
            && self.condition == other.condition
            && self.flags == other.flags
    }
}

impl Eq for Rule {}

fn pick(value: &str, default: &str) -> String {
    match value.is_empty() {
        true => default.to_owned(),
        false => value.to_owned(),
    }
}

fn compile(pattern: &str, insensitive: bool) -> Result<Regex, RuleError> {
    Regex::builder()
        .configure(
            meta::Config::new()
                .nfa_size_limit(Some(10 * (1 << 20)))
                .hybrid_cache_capacity(2 * (1 << 20))
                .match_kind(MatchKind::LeftmostFirst)
                .utf8_empty(true),
        )
        .syntax(util::syntax::Config::new().case_insensitive(insensitive))
        .build(pattern)
        .map_err(|err| RuleError::BadRegex(err.to_string()))
}

fn dedup_flags(flags: Vec<Flag>) -> Vec<Flag> {
    let mut kept: Vec<Flag> = Vec::with_capacity(flags.len());
    for flag in flags {
        if !kept.contains(&flag) {
            kept.push(flag);
        }
    }
    kept
}

/// Rewrite `$N` group references into the braced `${N}` form the
/// interpolator understands, so `$1x` reads as group 1 then literal `x`.
fn brace_groups(rewrite: &str) -> String {
    let mut out = String::with_capacity(rewrite.len() + 4);
    let mut chars = rewrite.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
                chars.next();
                out.push_str("${");
                out.push(digit);
                out.push('}');
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_regex() {
        assert!(matches!(
            Rule::new("^(unclosed$", "/x", Vec::new()),
            Err(RuleError::BadRegex(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let rule = Rule::new("", "", Vec::new()).unwrap();
        assert_eq!(rule.source, "^$");
        assert_eq!(rule.try_substitute(""), Some("".to_owned()));
        assert_eq!(rule.try_substitute("x"), None);
    }

    #[test]
    fn test_simple_substitute() {
        let rule = Rule::new(r"^file/(.*)$", "/new/$1", Vec::new()).unwrap();
        assert_eq!(rule.try_substitute("no/match"), None);
        assert_eq!(
            rule.try_substitute("file/match"),
            Some("/new/match".to_owned())
        );
    }

    #[test]
    fn test_trailing_literal_after_group() {
        let rule = Rule::new(r"^(.*)$", "$1x", Vec::new()).unwrap();
        assert_eq!(rule.try_substitute("a"), Some("ax".to_owned()));
    }

    #[test]
    fn test_passthrough() {
        let rule = Rule::new(r"^blocked/.*$", "-", vec![Flag::Status(403)]).unwrap();
        assert_eq!(
            rule.try_substitute("blocked/page"),
            Some("blocked/page".to_owned())
        );
    }

    #[test]
    fn test_escape_toggle() {
        let rule = Rule::new(r"^static/(.*)$", "/files/$1", Vec::new()).unwrap();
        assert_eq!(
            rule.try_substitute("static/a/b"),
            Some("/files/a%2Fb".to_owned())
        );

        let rule = Rule::new(r"^static/(.*)$", "/files/$1", vec![Flag::NoEscape]).unwrap();
        assert_eq!(
            rule.try_substitute("static/a/b"),
            Some("/files/a/b".to_owned())
        );
    }

    #[test]
    fn test_named_groups() {
        let rule = Rule::new(r"^doc/(?P<name>\w+)$", "/$name", Vec::new()).unwrap();
        assert_eq!(rule.try_substitute("doc/intro"), Some("/intro".to_owned()));
    }

    #[test]
    fn test_no_case() {
        let insensitive = Rule::new("^FILE$", "/x", vec![Flag::NoCase]).unwrap();
        assert!(insensitive.try_substitute("file").is_some());

        let sensitive = Rule::new("^FILE$", "/x", Vec::new()).unwrap();
        assert!(sensitive.try_substitute("file").is_none());
    }

    #[test]
    fn test_flag_dedup() {
        let rule = Rule::new("^a$", "b", vec![Flag::Last, Flag::NoCase, Flag::Last]).unwrap();
        assert_eq!(rule.flags(), &[Flag::Last, Flag::NoCase]);
    }

    #[test]
    fn test_structural_equality() {
        let a = Rule::new("^a$", "b", vec![Flag::Last]).unwrap();
        let b = Rule::new("^a$", "b", vec![Flag::Last]).unwrap();
        let c = Rule::new("^a$", "c", vec![Flag::Last]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Rule::condition("%{REQUEST_URI}", "^a$", vec![Flag::Last]).unwrap());
    }
}
