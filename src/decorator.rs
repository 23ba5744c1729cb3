//! Turns a scanned token stream into highlighting decorations.
//!
//! Decorations are flat, ordered and never overlap. Whitespace and
//! parentheses are left undecorated, so the gaps between decorations plus
//! their `value`s reconstruct the original query exactly.

use crate::lexer::scan_search_query;
use crate::token::{FilterValue, PatternKind, SearchPatternType, Span, Token};
use serde::Serialize;
use std::fmt;

/// The semantic class attached to a decorated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecorationClass {
    Keyword,
    FilterField,
    FilterValueLiteral,
    PatternLiteral,
    PatternRegexp,
    PatternStructural,
    Literal,
    Comment,
}

impl DecorationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecorationClass::Keyword => "keyword",
            DecorationClass::FilterField => "filter-field",
            DecorationClass::FilterValueLiteral => "filter-value-literal",
            DecorationClass::PatternLiteral => "pattern-literal",
            DecorationClass::PatternRegexp => "pattern-regexp",
            DecorationClass::PatternStructural => "pattern-structural",
            DecorationClass::Literal => "literal",
            DecorationClass::Comment => "comment",
        }
    }

    pub fn for_pattern(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Literal => DecorationClass::PatternLiteral,
            PatternKind::Regexp => DecorationClass::PatternRegexp,
            PatternKind::Structural => DecorationClass::PatternStructural,
        }
    }
}

impl fmt::Display for DecorationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    pub range: Span,
    pub class_name: DecorationClass,
    /// The decorated substring of the query.
    pub value: String,
}

impl Decoration {
    fn new(query: &str, range: Span, class_name: DecorationClass) -> Self {
        Self {
            range,
            class_name,
            value: range.slice(query).to_string(),
        }
    }
}

/// Decorates an already scanned token stream.
pub fn decorate_tokens(query: &str, tokens: &[Token]) -> Vec<Decoration> {
    let mut decorations = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Whitespace { .. } | Token::OpeningParen { .. } | Token::ClosingParen { .. } => {}
            Token::Keyword { range, .. } => {
                decorations.push(Decoration::new(query, *range, DecorationClass::Keyword));
            }
            Token::Comment { range, .. } => {
                decorations.push(Decoration::new(query, *range, DecorationClass::Comment));
            }
            Token::Literal(literal) => {
                decorations.push(Decoration::new(query, literal.range, DecorationClass::Literal));
            }
            Token::Pattern(pattern) => {
                decorations.push(Decoration::new(
                    query,
                    pattern.range,
                    DecorationClass::for_pattern(pattern.kind),
                ));
            }
            Token::Filter(filter) => {
                decorations.push(Decoration::new(
                    query,
                    filter.field.range,
                    DecorationClass::FilterField,
                ));
                match &filter.value {
                    Some(FilterValue::Literal(literal)) => decorations.push(Decoration::new(
                        query,
                        literal.range,
                        DecorationClass::FilterValueLiteral,
                    )),
                    Some(FilterValue::Pattern(pattern)) => decorations.push(Decoration::new(
                        query,
                        pattern.range,
                        DecorationClass::for_pattern(pattern.kind),
                    )),
                    None => {}
                }
            }
        }
    }
    decorations
}

/// Scans and decorates `query`, returning `None` when the query does not scan.
///
/// Callers render the raw string undecorated in that case. Without an
/// explicit pattern type the query is decorated in `standard` mode.
pub fn decorate_query(query: &str, pattern_type: Option<SearchPatternType>) -> Option<Vec<Decoration>> {
    let default = pattern_type.unwrap_or(SearchPatternType::Standard);
    let scanned = scan_search_query(query, false, Some(default)).ok()?;
    Some(decorate_tokens(query, &scanned.term))
}
