//! 搜索查询的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    └─ parse_primary_expression()
//!        │    │         ├─ "(" → 分组表达式 (递归调用parse_or_expression)
//!        │    │         ├─ Filter → 字段过滤
//!        │    │         └─ Pattern → 全文搜索模式
//!        │    │
//!        │    └─ 遇到AND或相邻的条件时，继续解析右侧NOT表达式
//!        │
//!        └─ 遇到OR时，继续解析右侧AND表达式
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **NOT操作** `NOT expression`
//! 3. **AND操作** `expr1 AND expr2` 或 `expr1 expr2`
//! 4. **OR操作** `expr1 OR expr2`
//!
//! 空白和注释在解析前被跳过。`patterntype:` 过滤器只影响扫描模式，
//! 不会出现在条件树中。
//!
//! ## 解析示例
//!
//! ```text
//! kind:Pod nginx                        → And(Filter, Pattern)
//! kind:Pod OR kind:Service              → Or(Filter, Filter)
//! -namespace:kube-system NOT /etcd-.*/  → And(Filter(negated), Not(Pattern))
//! ```

use crate::ast::{Condition, Query, Value};
use crate::lexer::{resolve_pattern_type, scan_with_pattern_type};
use crate::scanner::ScanError;
use crate::token::{FilterValue, KeywordKind, PatternKind, SearchPatternType, Span, Token};
use thiserror::Error;

pub struct Parser<'a> {
    /// 去掉空白、注释和 patterntype 指令后的 token
    tokens: Vec<&'a Token>,
    position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

impl From<ScanError> for ParseError {
    fn from(error: ScanError) -> Self {
        Self::at_position(error.to_string(), Span::new(error.at, error.at))
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Keyword { kind, .. } => kind.as_str().to_string(),
        Token::OpeningParen { .. } => "'('".to_string(),
        Token::ClosingParen { .. } => "')'".to_string(),
        Token::Filter(filter) => format!("filter '{}:'", filter.field.value),
        Token::Pattern(pattern) => format!("pattern '{}'", pattern.value),
        Token::Literal(literal) => format!("literal '{}'", literal.value),
        Token::Whitespace { .. } => "whitespace".to_string(),
        Token::Comment { .. } => "comment".to_string(),
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let tokens = tokens
            .iter()
            .filter(|token| !token.is_trivia())
            .filter(|token| !matches!(token, Token::Filter(filter) if filter.is_pattern_type()))
            .collect();
        Self {
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position).copied()
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// 检查当前 token 是否为指定关键字
    fn match_keyword(&self, kind: KeywordKind) -> bool {
        self.peek().is_some_and(|token| token.is_keyword(kind))
    }

    /// 当前 token 能否开始一个新的条件（用于隐式 AND）
    fn starts_term(&self) -> bool {
        match self.peek() {
            Some(Token::OpeningParen { .. } | Token::Filter(_) | Token::Pattern(_) | Token::Literal(_)) => true,
            Some(token) => token.is_keyword(KeywordKind::Not),
            None => false,
        }
    }

    /// 期望右括号并推进，否则返回错误
    fn expect_closing_paren(&mut self, opening: Span) -> Result<(), ParseError> {
        match self.advance() {
            Some(Token::ClosingParen { .. }) => Ok(()),
            Some(token) => Err(ParseError::at_position(
                format!("Expected ')', found {}", describe(token)),
                token.range(),
            )),
            None => Err(ParseError::at_position(
                "Unclosed '(' at end of input".to_string(),
                opening,
            )),
        }
    }

    /// 解析整个 token 流；没有任何条件时返回 `None`
    pub fn parse(&mut self) -> Result<Option<Condition>, ParseError> {
        if self.peek().is_none() {
            return Ok(None);
        }

        let condition = self.parse_or_expression()?;
        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected {}", describe(token)),
                token.range(),
            ));
        }
        Ok(Some(condition))
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_keyword(KeywordKind::Or) {
            self.advance(); // 消费 OR
            let right = self.parse_and_expression()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// 解析AND表达式
    ///
    /// 语法: `not_expr ((AND)? not_expr)*`
    /// 示例: `kind:Pod AND nginx`, `kind:Pod nginx`
    fn parse_and_expression(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_not_expression()?;

        loop {
            if self.match_keyword(KeywordKind::And) {
                self.advance(); // 消费 AND
            } else if !self.starts_term() {
                break;
            }
            let right = self.parse_not_expression()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// 解析NOT表达式
    ///
    /// 语法: `NOT* primary_expr`
    fn parse_not_expression(&mut self) -> Result<Condition, ParseError> {
        if self.match_keyword(KeywordKind::Not) {
            self.advance(); // 消费 NOT
            let expr = self.parse_not_expression()?; // 允许 NOT 链式调用
            Ok(Condition::Not(Box::new(expr)))
        } else {
            self.parse_primary_expression()
        }
    }

    /// 解析基础表达式 (最高优先级)
    fn parse_primary_expression(&mut self) -> Result<Condition, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Unexpected end of input".to_string(), None));
        };

        match token {
            Token::OpeningParen { range } => {
                if let Some(Token::ClosingParen { range: closing }) = self.peek() {
                    return Err(ParseError::at_position(
                        "Empty group".to_string(),
                        Span::new(range.start, closing.end),
                    ));
                }
                let expr = self.parse_or_expression()?;
                self.expect_closing_paren(*range)?;
                Ok(Condition::Grouped(Box::new(expr)))
            }
            Token::Filter(filter) => Ok(Condition::Filter {
                field: filter.field.value.clone(),
                value: filter.value.as_ref().map(|value| match value {
                    FilterValue::Pattern(pattern) if pattern.kind == PatternKind::Regexp => {
                        Value::Regexp(pattern.value.clone())
                    }
                    other => Value::Literal(other.value().to_string()),
                }),
                negated: filter.negated,
            }),
            Token::Pattern(pattern) => Ok(Condition::Pattern {
                value: pattern.value.clone(),
                kind: pattern.kind,
            }),
            Token::Literal(literal) => Ok(Condition::Pattern {
                value: literal.value.clone(),
                kind: PatternKind::Literal,
            }),
            other => Err(ParseError::at_position(
                format!("Unexpected {}", describe(other)),
                other.range(),
            )),
        }
    }
}

/// 扫描并解析一条搜索查询
pub fn parse_search_query(
    query: &str,
    interpret_comments: bool,
    default: Option<SearchPatternType>,
) -> Result<Query, ParseError> {
    let pattern_type = resolve_pattern_type(query, default);
    let scanned = scan_with_pattern_type(query, interpret_comments, pattern_type)?;
    let condition = Parser::new(&scanned.term).parse()?;
    Ok(Query {
        pattern_type,
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_string(input: &str) -> Result<Option<Condition>, ParseError> {
        parse_search_query(input, true, Some(SearchPatternType::Standard)).map(|query| query.condition)
    }

    fn filter(field: &str, value: &str) -> Condition {
        Condition::Filter {
            field: field.to_string(),
            value: Some(Value::Literal(value.to_string())),
            negated: false,
        }
    }

    fn pattern(value: &str) -> Condition {
        Condition::Pattern {
            value: value.to_string(),
            kind: PatternKind::Literal,
        }
    }

    #[test]
    fn test_simple_filter() {
        let result = parse_string("kind:Pod").unwrap();
        assert_eq!(result, Some(filter("kind", "Pod")));
    }

    #[test]
    fn test_implicit_and() {
        let result = parse_string("kind:Pod nginx").unwrap();
        assert_eq!(
            result,
            Some(Condition::And(Box::new(filter("kind", "Pod")), Box::new(pattern("nginx"))))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let result = parse_string("a OR b AND c").unwrap();
        assert_eq!(
            result,
            Some(Condition::Or(
                Box::new(pattern("a")),
                Box::new(Condition::And(Box::new(pattern("b")), Box::new(pattern("c")))),
            ))
        );
    }

    #[test]
    fn test_not_and_grouping() {
        let result = parse_string("NOT (kind:Pod OR kind:Service)").unwrap();
        let Some(Condition::Not(inner)) = result else {
            panic!("Expected NOT condition");
        };
        if let Condition::Grouped(group) = inner.as_ref() {
            assert!(matches!(group.as_ref(), Condition::Or(_, _)));
        } else {
            panic!("Expected grouped condition inside NOT");
        }
    }

    #[test]
    fn test_negated_regexp_filter() {
        let result = parse_string("-name:/^coredns/").unwrap();
        assert_eq!(
            result,
            Some(Condition::Filter {
                field: "name".to_string(),
                value: Some(Value::Regexp("^coredns".to_string())),
                negated: true,
            })
        );
    }

    #[test]
    fn test_empty_filter_value() {
        let result = parse_string("namespace:").unwrap();
        assert_eq!(
            result,
            Some(Condition::Filter {
                field: "namespace".to_string(),
                value: None,
                negated: false,
            })
        );
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        let result = parse_string("  // all pods\n kind:Pod  ").unwrap();
        assert_eq!(result, Some(filter("kind", "Pod")));
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(parse_string("").unwrap(), None);
        assert_eq!(parse_string("   ").unwrap(), None);
    }

    #[test]
    fn test_pattern_type_directive_is_dropped() {
        let query = parse_search_query("patterntype:keyword kind:Pod", false, None).unwrap();
        assert_eq!(query.pattern_type, SearchPatternType::Keyword);
        assert_eq!(query.condition, Some(filter("kind", "Pod")));
    }

    #[test]
    fn test_single_pattern_mode() {
        let query = parse_search_query("foo AND bar", false, Some(SearchPatternType::Regexp)).unwrap();
        assert_eq!(
            query.condition,
            Some(Condition::Pattern {
                value: "foo AND bar".to_string(),
                kind: PatternKind::Regexp,
            })
        );
    }

    #[test]
    fn test_dangling_operator_is_error() {
        let error = parse_string("kind:Pod AND").unwrap_err();
        assert_eq!(error.message, "Unexpected end of input");

        let error = parse_string("OR kind:Pod").unwrap_err();
        assert_eq!(error.span, Some(Span::new(0, 2)));
    }

    #[test]
    fn test_unbalanced_parens_are_errors() {
        let error = parse_string("(kind:Pod").unwrap_err();
        assert_eq!(error.span, Some(Span::new(0, 1)));

        let error = parse_string("kind:Pod)").unwrap_err();
        assert_eq!(error.message, "Unexpected ')'");

        let error = parse_string("()").unwrap_err();
        assert_eq!(error.message, "Empty group");
    }

    #[test]
    fn test_scan_errors_become_parse_errors() {
        let error = parse_string(r#"name:"open"#).unwrap_err();
        assert!(error.message.contains("unterminated quote"));
    }
}
