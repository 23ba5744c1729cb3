//! Scanning, decoration and SQL planning for resource search queries.
//!
//! ```text
//! raw query ─► lexer::scan_search_query ─► Vec<Token> ─┬─► decorator::decorate_tokens ─► Vec<Decoration>
//!                                                      └─► parser::Parser ─► ast::Query ─► sql_compiler::SqlCompiler
//! ```

pub mod ast;
pub mod config;
pub mod decorator;
pub mod lexer;
pub mod parser;
pub mod scanner;
pub mod sql_compiler;
pub mod token;

pub use decorator::{decorate_query, decorate_tokens, Decoration, DecorationClass};
pub use lexer::{detect_pattern_type, resolve_pattern_type, scan_search_query, scan_with_pattern_type};
pub use parser::parse_search_query;
pub use scanner::{ErrorKind, ScanError, ScanResult, Scanned};
pub use token::{KeywordKind, PatternKind, SearchPatternType, Span, Token};
