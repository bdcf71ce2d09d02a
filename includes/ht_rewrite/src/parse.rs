use std::str::FromStr;

use unicase::Ascii;

use crate::error::{ParseError, RuleError};
use crate::flag::Flag;
use crate::rule::Rule;

/// Parse a rule document into an ordered rule list.
///
/// Line oriented, `#` opens a comment running to end of line, blank
/// lines are skipped. Directive names are matched case-insensitively
/// with hyphens ignored. `RewriteEngine` toggles a parser-local state
/// seeded by `initial_on`; every non-engine line is dropped while it
/// is off. The first malformed line rejects the whole document.
pub(crate) fn document(text: &str, initial_on: bool) -> Result<Vec<Rule>, ParseError> {
    let mut rules = Vec::new();
    let mut enabled = initial_on;
    for raw in text.lines() {
        let line = raw.trim();
        if let Err(kind) = directive(line, &mut enabled, &mut rules) {
            return Err(ParseError {
                kind,
                line: line.to_owned(),
            });
        }
    }
    dedup(&mut rules);
    Ok(rules)
}

/// Remove structurally equal duplicates, keeping the first occurrence.
pub(crate) fn dedup(rules: &mut Vec<Rule>) {
    let mut kept: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules.drain(..) {
        if !kept.contains(&rule) {
            kept.push(rule);
        }
    }
    *rules = kept;
}

fn directive(line: &str, enabled: &mut bool, rules: &mut Vec<Rule>) -> Result<(), RuleError> {
    let tokens = tokenize(line)?;
    let Some((ident, args)) = tokens.split_first() else {
        return Ok(());
    };
    let ident = ident.replace('-', "");
    let ident = Ascii::new(ident.as_str());

    if ident == Ascii::new("RewriteEngine") {
        *enabled = engine_state(args)?;
        return Ok(());
    }
    if !*enabled {
        return Ok(());
    }

    if ident == Ascii::new("RewriteRule") {
        rules.push(rewrite_rule(args)?);
        Ok(())
    } else if ident == Ascii::new("RewriteCond") {
        rules.push(rewrite_cond(args)?);
        Ok(())
    } else {
        Err(RuleError::UnknownDirective)
    }
}

fn engine_state(args: &[String]) -> Result<bool, RuleError> {
    let [state] = args else {
        return Err(RuleError::BadEngineState(args.join(" ")));
    };
    let folded = Ascii::new(state.as_str());
    for on in ["on", "yes", "true"] {
        if folded == Ascii::new(on) {
            return Ok(true);
        }
    }
    for off in ["off", "no", "false"] {
        if folded == Ascii::new(off) {
            return Ok(false);
        }
    }
    Err(RuleError::BadEngineState(state.clone()))
}

fn rewrite_rule(args: &[String]) -> Result<Rule, RuleError> {
    let mut args = args.iter();
    let pattern = args.next().ok_or(RuleError::MissingPattern)?;
    let rewrite = args.next().ok_or(RuleError::MissingReplacement)?;
    let flags = flag_list(args.next())?;
    if let Some(extra) = args.next() {
        return Err(RuleError::TrailingToken(extra.clone()));
    }
    Rule::new(pattern, rewrite, flags)
}

fn rewrite_cond(args: &[String]) -> Result<Rule, RuleError> {
    let mut args = args.iter();
    let input = args.next().ok_or(RuleError::MissingInput)?;
    let pattern = args.next().ok_or(RuleError::MissingPattern)?;
    let flags = flag_list(args.next())?;
    if let Some(extra) = args.next() {
        return Err(RuleError::TrailingToken(extra.clone()));
    }
    Rule::condition(input, pattern, flags)
}

fn flag_list(token: Option<&String>) -> Result<Vec<Flag>, RuleError> {
    let Some(token) = token else {
        return Ok(Vec::new());
    };
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| RuleError::BadFlagList(token.clone()))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Flag::from_str)
        .collect()
}

// whitespace separated tokens; a double-quoted token keeps internal
// whitespace with the outer quotes stripped; an unquoted `#` opens a
// comment running to end of line
fn tokenize(line: &str) -> Result<Vec<String>, RuleError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        if quoted {
            if c == '"' {
                quoted = false;
                tokens.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        } else if c == '"' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            quoted = true;
        } else if c == '#' {
            break;
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if quoted {
        return Err(RuleError::UnclosedQuote);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
