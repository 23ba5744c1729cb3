//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 搜索配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),
    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// 搜索后端的映射配置
///
/// ```json
/// {
///     "table": "resources",
///     "content_column": "object",
///     "max_or_conditions_for_in": 3,
///     "strict_fields": false,
///     "fields": { "kind": "kind", "apiVersion": "api_version" }
/// }
/// ```
///
/// 所有键都是可选的，缺省值见 [`SearchConfig::default`]。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 资源所在的数据库表
    pub table: String,
    /// 全文搜索模式匹配的列
    pub content_column: String,
    /// 同一字段的 OR 等值条件达到该数量时改写为 IN
    pub max_or_conditions_for_in: usize,
    /// 为 true 时，未映射的过滤字段视为错误
    pub strict_fields: bool,
    /// 过滤字段名到列名的映射（字段名不区分大小写）
    pub fields: HashMap<String, String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let fields = [
            ("cluster", "cluster"),
            ("apiVersion", "api_version"),
            ("kind", "kind"),
            ("namespace", "namespace"),
            ("name", "name"),
            ("creationTimestamp", "creation_timestamp"),
            ("deletionTimestamp", "deletion_timestamp"),
            ("ownerReferences", "owner_references"),
        ]
        .into_iter()
        .map(|(field, column)| (field.to_string(), column.to_string()))
        .collect();

        Self {
            table: "resources".to_string(),
            content_column: "object".to_string(),
            max_or_conditions_for_in: 3,
            strict_fields: false,
            fields,
        }
    }
}

impl SearchConfig {
    /// 从JSON文件加载搜索配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 获取过滤字段对应的列名
    ///
    /// 未映射的字段在非严格模式下返回小写的字段名，严格模式下返回 `None`
    pub fn column_for(&self, field: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, column)| column.clone())
            .or_else(|| (!self.strict_fields).then(|| field.to_lowercase()))
    }
}
