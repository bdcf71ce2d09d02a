use thiserror::Error;

/// Failure kinds raised while constructing rules or reading a rule document
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("unknown directive")]
    UnknownDirective,

    #[error("bad engine state `{0}`")]
    BadEngineState(String),

    #[error("rule is missing a pattern")]
    MissingPattern,

    #[error("rule is missing a replacement")]
    MissingReplacement,

    #[error("condition is missing a test input")]
    MissingInput,

    #[error("unexpected trailing token `{0}`")]
    TrailingToken(String),

    #[error("quotation never closed")]
    UnclosedQuote,

    #[error("flag list missing brackets `{0}`")]
    BadFlagList(String),

    #[error("unknown flag `{0}`")]
    UnknownFlag(String),

    #[error("bad flag argument `{0}`")]
    BadFlagArgument(String),

    #[error("bad regex `{0}`")]
    BadRegex(String),
}

/// Parse failure bundled with the source line that produced it
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind} in `{line}`")]
pub struct ParseError {
    pub kind: RuleError,
    pub line: String,
}
