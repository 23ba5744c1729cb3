use anyhow::{Context, Result};
use query_scanner::config::SearchConfig;
use query_scanner::decorator::{decorate_tokens, Decoration};
use query_scanner::lexer::{resolve_pattern_type, scan_with_pattern_type};
use query_scanner::parser::Parser;
use query_scanner::sql_compiler::{CompileResult, SqlCompiler};
use query_scanner::token::{SearchPatternType, Token};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;

const CONFIG_FILE: &str = "search_config.json";

/// 只有设置了 RUST_LOG 时才安装日志订阅器
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

/// 优先使用JSON配置，失败时使用默认配置
fn load_config() -> SearchConfig {
    match SearchConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载搜索配置: {}", CONFIG_FILE);
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            SearchConfig::default()
        }
    }
}

/// REPL 的会话状态
struct Session {
    compiler: SqlCompiler,
    pattern_type: SearchPatternType,
    interpret_comments: bool,
    json: bool,
}

/// 一条查询的完整分析结果，用于JSON输出
#[derive(Serialize)]
struct Report {
    query: String,
    pattern_type: SearchPatternType,
    tokens: Vec<Token>,
    decorations: Vec<Decoration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compiled: Option<CompileResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Session {
    fn analyze(&self, query: &str) -> Report {
        let pattern_type = resolve_pattern_type(query, Some(self.pattern_type));
        let mut report = Report {
            query: query.to_string(),
            pattern_type,
            tokens: Vec::new(),
            decorations: Vec::new(),
            compiled: None,
            error: None,
        };

        let scanned = match scan_with_pattern_type(query, self.interpret_comments, pattern_type) {
            Ok(scanned) => scanned,
            Err(e) => {
                report.error = Some(format!("扫描失败: {}", e));
                return report;
            }
        };
        report.decorations = decorate_tokens(query, &scanned.term);

        let condition = Parser::new(&scanned.term).parse();
        report.tokens = scanned.term;
        match condition {
            Ok(condition) => {
                let ast = query_scanner::ast::Query {
                    pattern_type,
                    condition,
                };
                match self.compiler.compile(&ast) {
                    Ok(compiled) => report.compiled = Some(compiled),
                    Err(e) => report.error = Some(format!("SQL 编译失败: {}", e)),
                }
            }
            Err(e) => {
                let position = e
                    .span
                    .map(|span| format!(" (位置 {})", span))
                    .unwrap_or_default();
                report.error = Some(format!("解析失败: {}{}", e, position));
            }
        }
        report
    }

    fn run(&self, query: &str) -> Result<()> {
        let report = self.analyze(query);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report).context("无法序列化分析结果")?);
        } else {
            print_report(&report);
        }
        Ok(())
    }

    /// 处理以 `:` 开头的命令；返回 false 表示退出
    fn command(&mut self, line: &str) -> bool {
        let mut parts = line[1..].split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("quit" | "q"), _) => return false,
            (Some("json"), _) => self.json = true,
            (Some("text"), _) => self.json = false,
            (Some("mode"), Some(mode)) => match mode.parse() {
                Ok(pattern_type) => {
                    self.pattern_type = pattern_type;
                    println!("默认模式: {}", self.pattern_type);
                }
                Err(e) => println!("✗ {}", e),
            },
            (Some("mode"), None) => println!("默认模式: {}", self.pattern_type),
            (Some("comments"), Some("on")) => self.interpret_comments = true,
            (Some("comments"), Some("off")) => self.interpret_comments = false,
            _ => print_help(),
        }
        true
    }
}

fn print_report(report: &Report) {
    println!("[模式]: {}", report.pattern_type);

    if !report.tokens.is_empty() {
        println!("[Token]:");
        for token in &report.tokens {
            if !token.is_trivia() {
                println!("  {:>9}  {}", token.range().to_string(), token.range().slice(&report.query));
            }
        }
    }

    if !report.decorations.is_empty() {
        println!("[高亮]:");
        for decoration in &report.decorations {
            println!("  {:>9}  {:<22} {}", decoration.range.to_string(), decoration.class_name, decoration.value);
        }
    }

    if let Some(compiled) = &report.compiled {
        println!("[生成的 SQL]:\n  {}", compiled.sql);
        for opt in &compiled.optimizations {
            println!("  • {:?}", opt);
        }
    }

    if let Some(error) = &report.error {
        println!("✗ {}", error);
    }
}

fn print_help() {
    println!("命令:");
    println!("  :mode <standard|lucky|keyword|literal|regexp|structural>  设置默认模式");
    println!("  :comments on|off   是否解析 // 注释");
    println!("  :json / :text      切换输出格式");
    println!("  :quit              退出");
}

fn main() -> Result<()> {
    init_tracing();

    let mut session = Session {
        compiler: SqlCompiler::with_config(load_config()),
        pattern_type: SearchPatternType::Standard,
        interpret_comments: false,
        json: false,
    };

    // 命令行参数作为一次性查询
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return session.run(&args.join(" "));
    }

    println!("--- Query Scanner: 搜索查询扫描器 (输入 :help 查看命令) ---");
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                if line.starts_with(':') {
                    if !session.command(line) {
                        break;
                    }
                } else {
                    session.run(line)?;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    Ok(())
}
