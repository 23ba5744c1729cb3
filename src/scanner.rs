//! 扫描器基础设施
//!
//! 所有扫描器都是形如 `(input, start) -> ScanResult<T>` 的纯函数：
//! 不修改输入，相同参数总是得到相同结果，可以从任意位置重新开始。
//!
//! ## 层次结构
//!
//! ```text
//! 组合子:   map / one_of / sequence / optional / followed_by / commit / zero_or_more
//! 原子扫描: whitespace, character, quoted, scan_balanced_literal, plain_literal,
//!           opening_paren, closing_paren, comment
//! 模式扫描: scan_pattern, balanced_pattern, regexp_pattern
//! 关键字:   keyword            (AND / OR / NOT)
//! 过滤器:   filter             ([-]field:[value])
//! ```
//!
//! ## 错误语义
//!
//! 失败分为两类：
//! - **软失败**：当前分支不匹配，`one_of` 会继续尝试下一个候选扫描器
//! - **已提交失败**：扫描器已经越过起始位置后才失败（例如未闭合的引号），
//!   该错误会原样向上传播，不再尝试其他候选

use crate::token::{Filter, FilterValue, KeywordKind, Literal, Pattern, PatternKind, Span, Token};
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

/// 扫描失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    #[error("empty literal")]
    EmptyLiteral,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("not a keyword")]
    NotAKeyword,
    #[error("missing field name")]
    MissingFieldName,
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("no match")]
    NoMatch,
}

/// 扫描错误：期望什么，以及在哪个字节位置失败
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} at offset {at} (expected {expected})")]
pub struct ScanError {
    pub kind: ErrorKind,
    pub expected: String,
    pub at: usize,
    #[serde(skip)]
    committed: bool,
}

impl ScanError {
    pub fn new(kind: ErrorKind, expected: impl Into<String>, at: usize) -> Self {
        Self {
            kind,
            expected: expected.into(),
            at,
            committed: false,
        }
    }

    /// 已提交的错误不会被 `one_of` 吞掉
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn committed(mut self) -> Self {
        self.committed = true;
        self
    }
}

/// 扫描成功的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned<T> {
    pub term: T,
    pub range: Span,
}

pub type ScanResult<T> = Result<Scanned<T>, ScanError>;

pub type BoxedScanner<'a, T> = Box<dyn Fn(&str, usize) -> ScanResult<T> + 'a>;

pub fn boxed<'a, T>(scanner: impl Fn(&str, usize) -> ScanResult<T> + 'a) -> BoxedScanner<'a, T> {
    Box::new(scanner)
}

/// 返回 `offset` 之后的剩余输入；越界或不在字符边界上时返回空串
fn rest(input: &str, offset: usize) -> &str {
    input.get(offset..).unwrap_or("")
}

fn peek(input: &str, offset: usize) -> Option<char> {
    rest(input, offset).chars().next()
}

/// 从 `start` 开始，返回第一个不满足 `predicate` 的字符位置
fn take_while(input: &str, start: usize, predicate: impl Fn(char) -> bool) -> usize {
    let tail = rest(input, start);
    tail.char_indices()
        .find(|&(_, c)| !predicate(c))
        .map_or(start + tail.len(), |(i, _)| start + i)
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn is_paren(c: char) -> bool {
    c == '(' || c == ')'
}

/// 模式之后必须紧跟空白、右括号或输入结束
pub fn is_whitespace_or_closing_paren(input: &str, offset: usize) -> bool {
    match peek(input, offset) {
        None => true,
        Some(c) => c.is_whitespace() || c == ')',
    }
}

/// 关键字的词边界：空白、任一括号或输入结束
pub fn is_keyword_boundary(input: &str, offset: usize) -> bool {
    match peek(input, offset) {
        None => true,
        Some(c) => c.is_whitespace() || is_paren(c),
    }
}

// ---------------------------------------------------------------------------
// 组合子
// ---------------------------------------------------------------------------

/// 对成功结果做映射，范围保持不变
pub fn map<T, U>(
    scanner: impl Fn(&str, usize) -> ScanResult<T>,
    f: impl Fn(T, Span) -> U,
) -> impl Fn(&str, usize) -> ScanResult<U> {
    move |input: &str, start: usize| {
        let Scanned { term, range } = scanner(input, start)?;
        Ok(Scanned {
            term: f(term, range),
            range,
        })
    }
}

/// 按顺序尝试候选扫描器，返回第一个成功的结果
///
/// 全部软失败时报告 `UnexpectedCharacter`；遇到已提交的错误立即返回。
pub fn one_of<'a, T: 'a>(scanners: Vec<BoxedScanner<'a, T>>) -> impl Fn(&str, usize) -> ScanResult<T> + 'a {
    move |input: &str, start: usize| {
        let mut expected = Vec::with_capacity(scanners.len());
        for scanner in &scanners {
            match scanner(input, start) {
                Ok(scanned) => return Ok(scanned),
                Err(error) if error.is_committed() => return Err(error),
                Err(error) => expected.push(error.expected),
            }
        }
        Err(ScanError::new(
            ErrorKind::UnexpectedCharacter,
            expected.join(" | "),
            start,
        ))
    }
}

/// 依次运行两个扫描器，第二个从第一个结束处开始
pub fn sequence<A, B>(
    first: impl Fn(&str, usize) -> ScanResult<A>,
    second: impl Fn(&str, usize) -> ScanResult<B>,
) -> impl Fn(&str, usize) -> ScanResult<(A, B)> {
    move |input: &str, start: usize| {
        let a = first(input, start)?;
        let b = second(input, a.range.end)?;
        Ok(Scanned {
            term: (a.term, b.term),
            range: Span::new(start, b.range.end),
        })
    }
}

/// 软失败时返回 `None` 和空范围，不消费输入
pub fn optional<T>(scanner: impl Fn(&str, usize) -> ScanResult<T>) -> impl Fn(&str, usize) -> ScanResult<Option<T>> {
    move |input: &str, start: usize| match scanner(input, start) {
        Ok(Scanned { term, range }) => Ok(Scanned {
            term: Some(term),
            range,
        }),
        Err(error) if error.is_committed() => Err(error),
        Err(_) => Ok(Scanned {
            term: None,
            range: Span::new(start, start),
        }),
    }
}

/// 只有在 `lookahead` 对匹配结束位置成立时才接受匹配
pub fn followed_by<T>(
    scanner: impl Fn(&str, usize) -> ScanResult<T>,
    lookahead: impl Fn(&str, usize) -> bool,
) -> impl Fn(&str, usize) -> ScanResult<T> {
    move |input: &str, start: usize| {
        let scanned = scanner(input, start)?;
        if lookahead(input, scanned.range.end) {
            Ok(scanned)
        } else {
            Err(ScanError::new(
                ErrorKind::NoMatch,
                "whitespace or closing parenthesis",
                scanned.range.end,
            ))
        }
    }
}

/// 扫描器越过起始位置之后的失败标记为已提交
pub fn commit<T>(scanner: impl Fn(&str, usize) -> ScanResult<T>) -> impl Fn(&str, usize) -> ScanResult<T> {
    move |input: &str, start: usize| {
        scanner(input, start).map_err(|error| {
            if error.at > start {
                error.committed()
            } else {
                error
            }
        })
    }
}

/// 重复应用扫描器直到输入结束
///
/// 在未到达结尾时任何失败都使整个扫描失败：软失败统一报告为
/// `UnexpectedCharacter`，已提交的错误原样返回。没有部分结果。
pub fn zero_or_more<T>(scanner: impl Fn(&str, usize) -> ScanResult<T>) -> impl Fn(&str, usize) -> ScanResult<Vec<T>> {
    move |input: &str, start: usize| {
        let mut terms = Vec::new();
        let mut offset = start;
        while offset < input.len() {
            match scanner(input, offset) {
                Ok(Scanned { term, range }) if range.end > offset => {
                    trace!(start = range.start, end = range.end, "scanned term");
                    terms.push(term);
                    offset = range.end;
                }
                // 扫描器必须前进，否则会死循环
                Ok(_) => {
                    return Err(ScanError::new(
                        ErrorKind::UnexpectedCharacter,
                        "non-empty token",
                        offset,
                    ))
                }
                Err(error) if error.is_committed() => return Err(error),
                Err(error) => {
                    return Err(ScanError::new(
                        ErrorKind::UnexpectedCharacter,
                        error.expected,
                        offset,
                    ))
                }
            }
        }
        Ok(Scanned {
            term: terms,
            range: Span::new(start, offset),
        })
    }
}

// ---------------------------------------------------------------------------
// 原子扫描器
// ---------------------------------------------------------------------------

pub fn whitespace(input: &str, start: usize) -> ScanResult<Token> {
    let end = take_while(input, start, char::is_whitespace);
    if end == start {
        return Err(ScanError::new(ErrorKind::NoMatch, "whitespace", start));
    }
    let range = Span::new(start, end);
    Ok(Scanned {
        term: Token::Whitespace { range },
        range,
    })
}

/// 匹配单个指定字符
pub fn character(expected: char) -> impl Fn(&str, usize) -> ScanResult<char> {
    move |input: &str, start: usize| match peek(input, start) {
        Some(c) if c == expected => Ok(Scanned {
            term: c,
            range: Span::new(start, start + c.len_utf8()),
        }),
        _ => Err(ScanError::new(
            ErrorKind::NoMatch,
            format!("'{}'", expected),
            start,
        )),
    }
}

pub fn opening_paren(input: &str, start: usize) -> ScanResult<Token> {
    map(character('('), |_, range| Token::OpeningParen { range })(input, start)
}

pub fn closing_paren(input: &str, start: usize) -> ScanResult<Token> {
    map(character(')'), |_, range| Token::ClosingParen { range })(input, start)
}

/// `//` 开始直到行尾（不含换行符）的注释
pub fn comment(input: &str, start: usize) -> ScanResult<Token> {
    if !rest(input, start).starts_with("//") {
        return Err(ScanError::new(ErrorKind::NoMatch, "'//'", start));
    }
    let end = take_while(input, start, |c| c != '\n');
    let range = Span::new(start, end);
    Ok(Scanned {
        term: Token::Comment {
            range,
            value: input[start..end].to_string(),
        },
        range,
    })
}

/// 读取 `delimiter ... delimiter` 包围的内容
///
/// 内部被反斜杠转义的分隔符会被还原，其余反斜杠保持原样。
/// 在找到结束分隔符之前遇到换行或输入结束时报告 `UnterminatedQuote`。
pub fn quoted(delimiter: char) -> impl Fn(&str, usize) -> ScanResult<Literal> {
    move |input: &str, start: usize| {
        let mut chars = rest(input, start).char_indices();
        match chars.next() {
            Some((_, c)) if c == delimiter => {}
            _ => {
                return Err(ScanError::new(
                    ErrorKind::NoMatch,
                    format!("opening {}", delimiter),
                    start,
                ))
            }
        }

        let mut value = String::new();
        let mut escaped = false;
        for (i, c) in chars {
            let offset = start + i;
            if c == '\n' {
                return Err(ScanError::new(
                    ErrorKind::UnterminatedQuote,
                    format!("closing {}", delimiter),
                    offset,
                ));
            }
            if escaped {
                if c != delimiter {
                    value.push('\\');
                }
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                let range = Span::new(start, offset + c.len_utf8());
                return Ok(Scanned {
                    term: Literal {
                        range,
                        value,
                        quoted: true,
                    },
                    range,
                });
            } else {
                value.push(c);
            }
        }

        Err(ScanError::new(
            ErrorKind::UnterminatedQuote,
            format!("closing {}", delimiter),
            input.len(),
        ))
    }
}

/// 以引号开头的字面量：一旦看到开引号，未闭合就是已提交的错误
fn quoted_string(input: &str, start: usize, delimiter: char) -> ScanResult<Literal> {
    commit(quoted(delimiter))(input, start)
}

/// 读取平衡的字面量
///
/// 不能以空白或括号开头；以 `"` 或 `'` 开头时按引号字符串处理，
/// 使 `"a b c"` 成为一个字面量。否则一直读到括号外的空白或未匹配的 `)`，
/// 中间的括号必须配对，反斜杠转义下一个字符。
///
/// 字面量内部的引号串（`foo"a b"`）整体跳过，其中的空白和括号不计。
/// 没有闭合引号的内部引号、紧跟在字母数字后的 `'`（`it's`）按普通字符处理。
pub fn scan_balanced_literal(input: &str, start: usize) -> ScanResult<Literal> {
    match peek(input, start) {
        None => return Err(ScanError::new(ErrorKind::EmptyLiteral, "non-empty literal", start)),
        Some(c) if c.is_whitespace() || is_paren(c) => {
            return Err(ScanError::new(ErrorKind::EmptyLiteral, "non-empty literal", start))
        }
        Some(c) if is_quote(c) => return quoted_string(input, start, c),
        Some(_) => {}
    }

    let mut offset = start;
    let mut depth = 0usize;
    let mut previous: Option<char> = None;
    while let Some(c) = peek(input, offset) {
        match c {
            c if c.is_whitespace() && depth == 0 => break,
            ')' if depth == 0 => break,
            '(' => depth += 1,
            ')' => depth -= 1,
            '\\' => {
                offset += c.len_utf8();
                if let Some(escaped) = peek(input, offset) {
                    offset += escaped.len_utf8();
                    previous = Some(escaped);
                }
                continue;
            }
            '\'' if previous.is_some_and(char::is_alphanumeric) => {}
            c if is_quote(c) => {
                if let Ok(scanned) = quoted(c)(input, offset) {
                    offset = scanned.range.end;
                    previous = Some(c);
                    continue;
                }
            }
            _ => {}
        }
        offset += c.len_utf8();
        previous = Some(c);
    }

    if depth != 0 {
        return Err(ScanError::new(
            ErrorKind::UnbalancedParentheses,
            "balanced parentheses",
            offset,
        ));
    }

    let range = Span::new(start, offset);
    Ok(Scanned {
        term: Literal {
            range,
            value: input[start..offset].to_string(),
            quoted: false,
        },
        range,
    })
}

/// 读取连续的非空白、非括号字符
pub fn plain_literal(input: &str, start: usize) -> ScanResult<Literal> {
    if let Some(c) = peek(input, start).filter(|c| is_quote(*c)) {
        return quoted_string(input, start, c);
    }

    let end = take_while(input, start, |c| !c.is_whitespace() && !is_paren(c));
    if end == start {
        return Err(ScanError::new(ErrorKind::EmptyLiteral, "non-empty literal", start));
    }
    let range = Span::new(start, end);
    Ok(Scanned {
        term: Literal {
            range,
            value: input[start..end].to_string(),
            quoted: false,
        },
        range,
    })
}

// ---------------------------------------------------------------------------
// 模式扫描器
// ---------------------------------------------------------------------------

fn literal_to_pattern(literal: Literal, kind: PatternKind) -> Pattern {
    Pattern {
        range: literal.range,
        value: literal.value,
        kind,
        quoted: literal.quoted,
    }
}

/// 把字面量标记为指定类型的模式；要么产出完整的字面量，要么不前进地失败
pub fn scan_pattern(kind: PatternKind) -> impl Fn(&str, usize) -> ScanResult<Token> {
    map(
        one_of(vec![boxed(scan_balanced_literal), boxed(plain_literal)]),
        move |literal, _| Token::Pattern(literal_to_pattern(literal, kind)),
    )
}

/// `/.../` 形式的正则模式
pub fn regexp_pattern(input: &str, start: usize) -> ScanResult<Token> {
    map(quoted('/'), |literal, _| {
        Token::Pattern(literal_to_pattern(literal, PatternKind::Regexp))
    })(input, start)
}

/// 提前尝试的平衡模式
///
/// 在同一位置能扫描出关键字或过滤器时让位，避免把 `AND` 或
/// `kind:Pod` 当作普通模式吞掉。
pub fn balanced_pattern(kind: PatternKind) -> impl Fn(&str, usize) -> ScanResult<Token> {
    move |input: &str, start: usize| {
        if keyword(input, start).is_ok() {
            return Err(ScanError::new(ErrorKind::NoMatch, "pattern", start));
        }
        match filter(input, start) {
            Ok(_) => return Err(ScanError::new(ErrorKind::NoMatch, "pattern", start)),
            Err(error) if error.is_committed() => return Err(error),
            Err(_) => {}
        }
        map(scan_balanced_literal, |literal, _| {
            Token::Pattern(literal_to_pattern(literal, kind))
        })(input, start)
    }
}

// ---------------------------------------------------------------------------
// 关键字与过滤器
// ---------------------------------------------------------------------------

/// 识别 `AND` / `OR` / `NOT`，区分大小写，且必须处于词边界
///
/// `ANDROID` 不会被识别为 `AND` + `ROID`。
pub fn keyword(input: &str, start: usize) -> ScanResult<Token> {
    let word_end = take_while(input, start, |c| c.is_ascii_uppercase());
    let word = &rest(input, start)[..word_end - start];
    match KeywordKind::from_word(word) {
        Some(kind) if is_keyword_boundary(input, word_end) => {
            let range = Span::new(start, word_end);
            Ok(Scanned {
                term: Token::Keyword { range, kind },
                range,
            })
        }
        _ => Err(ScanError::new(ErrorKind::NotAKeyword, "AND | OR | NOT", start)),
    }
}

/// 过滤器字段名：不含空白、括号、引号和 `:`
pub fn field_name(input: &str, start: usize) -> ScanResult<Literal> {
    let end = take_while(input, start, |c| {
        !c.is_whitespace() && !is_paren(c) && !is_quote(c) && c != ':'
    });
    if end == start {
        return Err(ScanError::new(ErrorKind::MissingFieldName, "field name", start));
    }
    let range = Span::new(start, end);
    Ok(Scanned {
        term: Literal {
            range,
            value: input[start..end].to_string(),
            quoted: false,
        },
        range,
    })
}

/// 过滤器的值：`/.../` 正则或平衡字面量
pub fn filter_value(input: &str, start: usize) -> ScanResult<FilterValue> {
    one_of(vec![
        boxed(map(
            followed_by(quoted('/'), is_whitespace_or_closing_paren),
            |literal, _| FilterValue::Pattern(literal_to_pattern(literal, PatternKind::Regexp)),
        )),
        boxed(map(scan_balanced_literal, |literal, _| FilterValue::Literal(literal))),
    ])(input, start)
}

/// 识别 `[-]field:[value]`
///
/// `patterntype:` 在这里只是普通过滤器，它的语义由模式类型检测负责。
pub fn filter(input: &str, start: usize) -> ScanResult<Token> {
    let negated = peek(input, start) == Some('-');
    let field_start = if negated { start + 1 } else { start };

    let head = sequence(field_name, character(':'))(input, field_start).map_err(|_| {
        ScanError::new(ErrorKind::MissingFieldName, "field:value", start)
    })?;
    let (field, _) = head.term;

    let value = optional(filter_value)(input, head.range.end)?;
    let range = Span::new(start, value.range.end);
    Ok(Scanned {
        term: Token::Filter(Filter {
            range,
            field,
            negated,
            value: value.term,
        }),
        range,
    })
}
