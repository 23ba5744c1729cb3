//! The token definitions for the search query language.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Filter field that overrides the pattern type of the query it appears in.
pub const PATTERN_TYPE_FIELD: &str = "patterntype";

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The text this span covers, or an empty string if it falls outside `input`.
    pub fn slice<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One of the reserved boolean keywords. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeywordKind {
    And,
    Or,
    Not,
}

impl KeywordKind {
    pub const ALL: [KeywordKind; 3] = [KeywordKind::And, KeywordKind::Or, KeywordKind::Not];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordKind::And => "AND",
            KeywordKind::Or => "OR",
            KeywordKind::Not => "NOT",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == word)
    }
}

/// How the value of a pattern token is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Literal,
    Regexp,
    Structural,
}

/// The search mode of a whole query.
///
/// `standard`, `lucky` and `keyword` scan the full boolean/filter syntax;
/// `literal`, `regexp` and `structural` treat the entire input as a single
/// pattern of the matching [`PatternKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPatternType {
    Standard,
    Lucky,
    Keyword,
    #[default]
    Literal,
    Regexp,
    Structural,
}

impl SearchPatternType {
    pub const ALL: [SearchPatternType; 6] = [
        SearchPatternType::Standard,
        SearchPatternType::Lucky,
        SearchPatternType::Keyword,
        SearchPatternType::Literal,
        SearchPatternType::Regexp,
        SearchPatternType::Structural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPatternType::Standard => "standard",
            SearchPatternType::Lucky => "lucky",
            SearchPatternType::Keyword => "keyword",
            SearchPatternType::Literal => "literal",
            SearchPatternType::Regexp => "regexp",
            SearchPatternType::Structural => "structural",
        }
    }

    /// The kind assigned to patterns scanned in this mode.
    pub fn pattern_kind(&self) -> PatternKind {
        match self {
            SearchPatternType::Regexp => PatternKind::Regexp,
            SearchPatternType::Structural => PatternKind::Structural,
            _ => PatternKind::Literal,
        }
    }

    /// Modes without keyword/filter support: the whole query is one pattern.
    pub fn is_single_pattern(&self) -> bool {
        matches!(
            self,
            SearchPatternType::Literal | SearchPatternType::Regexp | SearchPatternType::Structural
        )
    }
}

impl fmt::Display for SearchPatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pattern type `{0}`")]
pub struct UnknownPatternType(pub String);

impl FromStr for SearchPatternType {
    type Err = UnknownPatternType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pattern_type| pattern_type.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPatternType(s.to_string()))
    }
}

/// A literal value. `value` has surrounding quotes removed when `quoted` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    pub range: Span,
    pub value: String,
    pub quoted: bool,
}

/// A search term, tagged with how it should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub range: Span,
    pub value: String,
    pub kind: PatternKind,
    pub quoted: bool,
}

/// The value half of a `field:value` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterValue {
    Literal(Literal),
    Pattern(Pattern),
}

impl FilterValue {
    pub fn range(&self) -> Span {
        match self {
            FilterValue::Literal(literal) => literal.range,
            FilterValue::Pattern(pattern) => pattern.range,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            FilterValue::Literal(literal) => &literal.value,
            FilterValue::Pattern(pattern) => &pattern.value,
        }
    }

    pub fn quoted(&self) -> bool {
        match self {
            FilterValue::Literal(literal) => literal.quoted,
            FilterValue::Pattern(pattern) => pattern.quoted,
        }
    }
}

/// A `field:value` construct, optionally negated with a leading `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub range: Span,
    pub field: Literal,
    pub negated: bool,
    pub value: Option<FilterValue>,
}

impl Filter {
    pub fn is_pattern_type(&self) -> bool {
        self.field.value.eq_ignore_ascii_case(PATTERN_TYPE_FIELD)
    }
}

/// A classified span of the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Token {
    Whitespace { range: Span },
    OpeningParen { range: Span },
    ClosingParen { range: Span },
    Keyword { range: Span, kind: KeywordKind },
    /// `// ...` up to the end of the line, only when comments are interpreted.
    Comment { range: Span, value: String },
    Literal(Literal),
    Pattern(Pattern),
    Filter(Filter),
}

impl Token {
    pub fn range(&self) -> Span {
        match self {
            Token::Whitespace { range }
            | Token::OpeningParen { range }
            | Token::ClosingParen { range }
            | Token::Keyword { range, .. }
            | Token::Comment { range, .. } => *range,
            Token::Literal(literal) => literal.range,
            Token::Pattern(pattern) => pattern.range,
            Token::Filter(filter) => filter.range,
        }
    }

    /// Whitespace and comments carry no meaning for query evaluation.
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace { .. } | Token::Comment { .. })
    }

    pub fn is_keyword(&self, kind: KeywordKind) -> bool {
        matches!(self, Token::Keyword { kind: k, .. } if *k == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_parsing_is_case_insensitive() {
        assert_eq!("REGEXP".parse::<SearchPatternType>(), Ok(SearchPatternType::Regexp));
        assert_eq!("Standard".parse::<SearchPatternType>(), Ok(SearchPatternType::Standard));
        assert_eq!(" lucky ".parse::<SearchPatternType>(), Ok(SearchPatternType::Lucky));
        assert!("fuzzy".parse::<SearchPatternType>().is_err());
    }

    #[test]
    fn test_default_pattern_type_is_literal() {
        assert_eq!(SearchPatternType::default(), SearchPatternType::Literal);
        assert_eq!(SearchPatternType::Keyword.pattern_kind(), PatternKind::Literal);
        assert_eq!(SearchPatternType::Structural.pattern_kind(), PatternKind::Structural);
        assert!(!SearchPatternType::Standard.is_single_pattern());
        assert!(SearchPatternType::Regexp.is_single_pattern());
    }

    #[test]
    fn test_keyword_words_are_case_sensitive() {
        assert_eq!(KeywordKind::from_word("AND"), Some(KeywordKind::And));
        assert_eq!(KeywordKind::from_word("NOT"), Some(KeywordKind::Not));
        assert_eq!(KeywordKind::from_word("and"), None);
        assert_eq!(KeywordKind::from_word("ANDROID"), None);
    }

    #[test]
    fn test_span_slice_and_contains() {
        let span = Span::new(5, 8);
        assert_eq!(span.slice("kind:Pod"), "Pod");
        assert_eq!(span.len(), 3);
        assert!(span.contains(Span::new(6, 8)));
        assert!(!span.contains(Span::new(4, 6)));
        assert_eq!(Span::new(3, 20).slice("short"), "");
    }
}
