use percent_encoding::percent_decode_str;

/// String-level view of a uri, split into the pieces rewriting cares
/// about. `head` covers `scheme://authority` and is empty for
/// relative uris.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Parts<'a> {
    pub head: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub fragment: &'a str,
}

pub(crate) fn dissect(uri: &str) -> Parts<'_> {
    let (uri, fragment) = uri.split_once('#').unwrap_or((uri, ""));
    let (uri, query) = uri.split_once('?').unwrap_or((uri, ""));
    // a "://" inside a relative path is not a scheme separator
    let head_len = match uri.find("://") {
        Some(at) if at > 0 && !uri[..at].contains('/') => uri[at + 3..]
            .find('/')
            .map(|slash| at + 3 + slash)
            .unwrap_or(uri.len()),
        _ => 0,
    };
    Parts {
        head: &uri[..head_len],
        path: &uri[head_len..],
        query,
        fragment,
    }
}

pub(crate) fn has_scheme(uri: &str) -> bool {
    let Some((scheme, rest)) = uri.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && rest.starts_with("//")
}

pub(crate) fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}
