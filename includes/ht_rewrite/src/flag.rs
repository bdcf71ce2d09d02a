use std::str::FromStr;

use crate::error::RuleError;

pub(crate) const DEFAULT_NEXT_CAP: u32 = 32_000;

const DEFAULT_COOKIE_TTL: u64 = 86_400;
const DEFAULT_REDIRECT_STATUS: u16 = 307;
const DEFAULT_MIME_TYPE: &str = "text/plain";

/// Behavior modifiers attached to a [`Rule`](crate::Rule) expression.
///
/// Supports a subset of [official](https://httpd.apache.org/docs/current/rewrite/flags.html)
/// `mod_rewrite` flags. Flag names are matched upper-cased; argument
/// values keep their case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    /// `C` — the following entity only evaluates when this one matched
    Chained,
    /// `CO=name:value[:ttl]` — schedule a cookie expiring `ttl` seconds
    /// after the request time
    Cookie { name: String, value: String, ttl: u64 },
    /// `E=name:value` — schedule a request-scoped environment variable
    EnvVar { name: String, value: String },
    /// `L` / `END` — stop evaluation once this entity's effects applied
    Last,
    /// `N[=count]` — restart from the first rule with the current uri,
    /// bounded by `cap` total passes
    Next { cap: u32 },
    /// `NC` — case-insensitive match for this entity only
    NoCase,
    /// `NE` — leave interpolated capture text unescaped
    NoEscape,
    /// `NQ` / `QSD` — discard the original query string
    NoQuery,
    /// `BNP` — keep spaces instead of substituting `+`
    NoPlus,
    /// `QSA` — append the original query string to the substitution
    QueryAppend,
    /// `S=count` — on success, consume the next `count` entities
    Skip(u16),
    /// `R[=code]` / `F` / `G` — override the response status
    Status(u16),
    /// `SS=str` — override the server identity string
    ServerString(String),
    /// `T=mime` — override the response content type
    MimeType(String),
}

impl FromStr for Flag {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name, arg),
            None => (s, ""),
        };
        match name.to_uppercase().as_str() {
            "C" => Ok(Self::Chained),
            "CO" => cookie(s, arg),
            "E" => env_var(s, arg),
            "F" => Ok(Self::Status(403)),
            "G" => Ok(Self::Status(410)),
            "L" | "END" => Ok(Self::Last),
            "N" => Ok(Self::Next {
                cap: parse_int(s, arg, DEFAULT_NEXT_CAP)?,
            }),
            "NC" => Ok(Self::NoCase),
            "NE" => Ok(Self::NoEscape),
            "NQ" | "QSD" => Ok(Self::NoQuery),
            "BNP" => Ok(Self::NoPlus),
            "QSA" => Ok(Self::QueryAppend),
            "R" => Ok(Self::Status(parse_status(s, arg)?)),
            "S" => match arg.is_empty() {
                true => Err(RuleError::BadFlagArgument(s.to_owned())),
                false => Ok(Self::Skip(parse_int(s, arg, 0)?)),
            },
            "SS" => match arg.is_empty() {
                true => Err(RuleError::BadFlagArgument(s.to_owned())),
                false => Ok(Self::ServerString(arg.to_owned())),
            },
            "T" => Ok(Self::MimeType(match arg.is_empty() {
                true => DEFAULT_MIME_TYPE.to_owned(),
                false => arg.to_lowercase(),
            })),
            _ => Err(RuleError::UnknownFlag(s.to_owned())),
        }
    }
}

fn cookie(token: &str, arg: &str) -> Result<Flag, RuleError> {
    let mut parts = arg.splitn(3, ':');
    let name = parts.next().filter(|s| !s.is_empty());
    let value = parts.next();
    let (Some(name), Some(value)) = (name, value) else {
        return Err(RuleError::BadFlagArgument(token.to_owned()));
    };
    let ttl = match parts.next() {
        Some(ttl) => parse_int(token, ttl, 0)?,
        None => DEFAULT_COOKIE_TTL,
    };
    Ok(Flag::Cookie {
        name: name.to_owned(),
        value: value.to_owned(),
        ttl,
    })
}

fn env_var(token: &str, arg: &str) -> Result<Flag, RuleError> {
    // exactly one colon separates name and value
    let Some((name, value)) = arg.split_once(':') else {
        return Err(RuleError::BadFlagArgument(token.to_owned()));
    };
    if name.is_empty() || value.contains(':') {
        return Err(RuleError::BadFlagArgument(token.to_owned()));
    }
    Ok(Flag::EnvVar {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_int<T: FromStr>(token: &str, arg: &str, default: T) -> Result<T, RuleError> {
    match arg.is_empty() {
        true => Ok(default),
        false => arg
            .parse()
            .map_err(|_| RuleError::BadFlagArgument(token.to_owned())),
    }
}

fn parse_status(token: &str, arg: &str) -> Result<u16, RuleError> {
    let status = parse_int(token, arg, DEFAULT_REDIRECT_STATUS)?;
    match (100..600).contains(&status) {
        true => Ok(status),
        false => Err(RuleError::BadFlagArgument(token.to_owned())),
    }
}
