use crate::token::{PatternKind, SearchPatternType};
use serde::Serialize;

/// AST 的根节点, 代表一个完整的搜索查询
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// 本次查询生效的模式类型
    pub pattern_type: SearchPatternType,
    /// 条件表达式树, 空查询时为 `None`
    pub condition: Option<Condition>,
}

/// 过滤器的值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    /// 精确匹配的字面量, 例如：`kind:Pod`
    Literal(String),
    /// 正则匹配, 例如：`name:/^nginx-.*/`
    Regexp(String),
}

/// 代表查询的条件表达式树
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// 逻辑与运算 (AND, 或相邻的两个条件)
    And(Box<Condition>, Box<Condition>),
    /// 逻辑或运算 (OR)
    Or(Box<Condition>, Box<Condition>),
    /// 逻辑非运算 (NOT)
    Not(Box<Condition>),
    /// 使用括号分组的条件表达式
    Grouped(Box<Condition>),
    /// 字段过滤, 例如：`-namespace:kube-system`
    Filter {
        field: String,
        value: Option<Value>,
        negated: bool,
    },
    /// 全文搜索模式, 这是条件的叶子节点
    Pattern { value: String, kind: PatternKind },
}
