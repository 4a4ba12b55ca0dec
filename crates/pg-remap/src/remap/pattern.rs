//! Literal and regular-expression rewrites.
//!
//! Regex replacements are written in PostgreSQL `regexp_replace` syntax:
//! `\1`..`\9` insert a capture group, `\&` the whole match, `\\` a literal
//! backslash. Everything else, `$` included, is literal.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};

use crate::core::traits::RowFilter;
use crate::error::{RemapError, Result};

/// Flags used by `regexp_replace` when none are given: replace every match.
pub const DEFAULT_REGEX_FLAGS: &str = "g";

/// Case-sensitive substring replacement.
#[derive(Debug, Clone)]
pub struct LiteralRewrite {
    pub from: String,
    pub to: String,
    /// Only values starting with `from` are candidates.
    pub anchor_left: bool,
    /// Only values ending with `from` are candidates.
    pub anchor_right: bool,
}

/// Regular-expression replacement.
#[derive(Debug, Clone)]
pub struct RegexRewrite {
    pattern: String,
    regex: Regex,
    /// Replacement translated to `regex` crate expansion syntax.
    expansion: String,
    /// Replace every match (`g`) rather than the first.
    global: bool,
    case_insensitive: bool,
}

impl RegexRewrite {
    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

/// What a remap does to each candidate value.
#[derive(Debug, Clone)]
pub enum Rewrite {
    Literal(LiteralRewrite),
    Regex(RegexRewrite),
}

impl Rewrite {
    /// Literal replacement of every occurrence of `from` with `to`.
    pub fn literal(from: &str, to: &str) -> Result<Self> {
        if from.is_empty() {
            return Err(RemapError::invalid_pattern(from, "pattern must not be empty"));
        }
        Ok(Rewrite::Literal(LiteralRewrite {
            from: from.to_string(),
            to: to.to_string(),
            anchor_left: false,
            anchor_right: false,
        }))
    }

    /// Restrict a literal rewrite to values starting and/or ending with the
    /// pattern. Regex rewrites carry their own anchors and are returned as is.
    pub fn anchored(self, anchor_left: bool, anchor_right: bool) -> Self {
        match self {
            Rewrite::Literal(lit) => Rewrite::Literal(LiteralRewrite {
                anchor_left,
                anchor_right,
                ..lit
            }),
            other => other,
        }
    }

    /// Regex replacement. `flags` is any combination of `g` (global) and
    /// `i` (case-insensitive).
    pub fn regex(pattern: &str, replacement: &str, flags: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(RemapError::invalid_pattern(pattern, "pattern must not be empty"));
        }

        let mut global = false;
        let mut case_insensitive = false;
        for flag in flags.chars() {
            match flag {
                'g' => global = true,
                'i' => case_insensitive = true,
                other => {
                    return Err(RemapError::invalid_pattern(
                        pattern,
                        format!("unsupported flag '{}' (expected g and/or i)", other),
                    ))
                }
            }
        }

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| RemapError::invalid_pattern(pattern, e))?;

        Ok(Rewrite::Regex(RegexRewrite {
            pattern: pattern.to_string(),
            regex,
            expansion: translate_replacement(replacement),
            global,
            case_insensitive,
        }))
    }

    /// The search pattern as given.
    pub fn pattern(&self) -> &str {
        match self {
            Rewrite::Literal(lit) => &lit.from,
            Rewrite::Regex(re) => &re.pattern,
        }
    }

    /// "literal" or "regex"
    pub fn kind(&self) -> &'static str {
        match self {
            Rewrite::Literal(_) => "literal",
            Rewrite::Regex(_) => "regex",
        }
    }

    /// Apply the rewrite. Borrows when nothing changes.
    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Rewrite::Literal(lit) => {
                if value.contains(lit.from.as_str()) {
                    Cow::Owned(value.replace(lit.from.as_str(), &lit.to))
                } else {
                    Cow::Borrowed(value)
                }
            }
            Rewrite::Regex(re) => {
                if re.global {
                    re.regex.replace_all(value, re.expansion.as_str())
                } else {
                    re.regex.replace(value, re.expansion.as_str())
                }
            }
        }
    }
}

impl RowFilter for Rewrite {
    fn prefilter(&self) -> Option<&str> {
        match self {
            Rewrite::Literal(lit) => Some(&lit.from),
            Rewrite::Regex(_) => None,
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            Rewrite::Literal(lit) => {
                value.contains(lit.from.as_str())
                    && (!lit.anchor_left || value.starts_with(lit.from.as_str()))
                    && (!lit.anchor_right || value.ends_with(lit.from.as_str()))
            }
            Rewrite::Regex(re) => re.regex.is_match(value),
        }
    }
}

/// Translate a `regexp_replace` replacement string into `regex` crate
/// expansion syntax.
fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 8);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(d @ '1'..='9') => {
                    chars.next();
                    out.push_str("${");
                    out.push(d);
                    out.push('}');
                }
                Some('&') => {
                    chars.next();
                    out.push_str("${0}");
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }

    out
}
