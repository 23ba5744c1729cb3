//! 搜索查询的词法分析器
//!
//! ## 扫描流程
//!
//! ```text
//! scan_search_query(query)
//!   ├─ resolve_pattern_type()          预扫描：查找 patterntype:<value>
//!   │    └─ detect_pattern_type()      标准模式扫描一次，结果丢弃
//!   │
//!   └─ scan_with_pattern_type()        按确定的模式扫描
//!        ├─ literal / regexp / structural → scan_single_pattern()   整个输入是一个模式
//!        └─ standard / lucky / keyword    → create_scanner()        完整的组合扫描
//! ```
//!
//! ## 候选扫描器优先级（同一位置取第一个成功的）
//!
//! 1. 空白
//! 2. 注释（仅在 `interpret_comments` 时）
//! 3. 后接空白或右括号的 `/正则/`
//! 4. 后接空白或右括号的平衡模式（让位于关键字和过滤器）
//! 5. `(`、`)`
//! 6. 关键字 `AND` / `OR` / `NOT`
//! 7. 过滤器 `[-]field:[value]`
//! 8. `/正则/`
//! 9. 普通字面量模式

use crate::scanner::{
    balanced_pattern, boxed, closing_paren, comment, filter, followed_by,
    is_whitespace_or_closing_paren, keyword, one_of, opening_paren, regexp_pattern, scan_pattern,
    whitespace, zero_or_more, BoxedScanner, ScanResult, Scanned,
};
use crate::token::{Pattern, PatternKind, SearchPatternType, Span, Token};
use tracing::debug;

/// 构建完整的组合扫描器，模式类型为 `kind`
pub fn create_scanner(
    kind: PatternKind,
    interpret_comments: bool,
) -> impl Fn(&str, usize) -> ScanResult<Vec<Token>> {
    let mut alternatives: Vec<BoxedScanner<'static, Token>> = vec![boxed(whitespace)];
    if interpret_comments {
        alternatives.push(boxed(comment));
    }
    alternatives.push(boxed(followed_by(regexp_pattern, is_whitespace_or_closing_paren)));
    alternatives.push(boxed(followed_by(
        balanced_pattern(kind),
        is_whitespace_or_closing_paren,
    )));
    alternatives.push(boxed(opening_paren));
    alternatives.push(boxed(closing_paren));
    alternatives.push(boxed(keyword));
    alternatives.push(boxed(filter));
    alternatives.push(boxed(regexp_pattern));
    alternatives.push(boxed(scan_pattern(kind)));

    zero_or_more(one_of(alternatives))
}

/// 在标准模式下扫描一次，返回第一个有效的 `patterntype:` 值
///
/// 扫描失败、没有该过滤器或值无法识别时返回 `None`。否定形式
/// （`-patterntype:...`）不生效。
pub fn detect_pattern_type(query: &str) -> Option<SearchPatternType> {
    let tokens = create_scanner(PatternKind::Literal, false)(query, 0).ok()?.term;
    tokens.iter().find_map(|token| match token {
        Token::Filter(filter) if filter.is_pattern_type() && !filter.negated => {
            filter.value.as_ref()?.value().parse().ok()
        }
        _ => None,
    })
}

/// 确定本次扫描的模式：查询内的 `patterntype:` 优先，其次是调用方默认值，最后是 `literal`
pub fn resolve_pattern_type(query: &str, default: Option<SearchPatternType>) -> SearchPatternType {
    detect_pattern_type(query)
        .or(default)
        .unwrap_or_default()
}

/// 整个输入作为单个模式；首尾空白单独成为空白 token，保证覆盖整个输入
pub fn scan_single_pattern(query: &str, kind: PatternKind) -> Scanned<Vec<Token>> {
    let content_start = query.len() - query.trim_start().len();
    let content_end = query.trim_end().len();
    let mut tokens = Vec::with_capacity(3);

    if content_start >= content_end {
        if !query.is_empty() {
            tokens.push(Token::Whitespace {
                range: Span::new(0, query.len()),
            });
        }
    } else {
        if content_start > 0 {
            tokens.push(Token::Whitespace {
                range: Span::new(0, content_start),
            });
        }
        tokens.push(Token::Pattern(Pattern {
            range: Span::new(content_start, content_end),
            value: query[content_start..content_end].to_string(),
            kind,
            quoted: false,
        }));
        if content_end < query.len() {
            tokens.push(Token::Whitespace {
                range: Span::new(content_end, query.len()),
            });
        }
    }

    Scanned {
        term: tokens,
        range: Span::new(0, query.len()),
    }
}

/// 扫描搜索框中的原始查询
///
/// 成功时 token 范围连续、不重叠，拼接后恰好覆盖整个输入；
/// 失败时不返回任何部分结果。
pub fn scan_search_query(
    query: &str,
    interpret_comments: bool,
    default: Option<SearchPatternType>,
) -> ScanResult<Vec<Token>> {
    scan_with_pattern_type(query, interpret_comments, resolve_pattern_type(query, default))
}

/// 按已确定的模式扫描，不再查找 `patterntype:`
pub fn scan_with_pattern_type(
    query: &str,
    interpret_comments: bool,
    pattern_type: SearchPatternType,
) -> ScanResult<Vec<Token>> {
    let kind = pattern_type.pattern_kind();
    debug!(%pattern_type, len = query.len(), "scanning search query");

    if pattern_type.is_single_pattern() {
        return Ok(scan_single_pattern(query, kind));
    }

    let result = create_scanner(kind, interpret_comments)(query, 0);
    match &result {
        Ok(scanned) => debug!(tokens = scanned.term.len(), "scan succeeded"),
        Err(error) => debug!(%error, "scan failed"),
    }
    result
}
