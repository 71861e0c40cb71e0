//! 术语表模型
//!
//! 术语表分两类：系统内置（只读、全体用户共享）与用户自建（可修改）。
//! 每个术语表绑定一个行业标签和一个语言对。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单条术语
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub source_term: String,
    pub target_term: String,
    /// 使用场景说明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 给译员的补充说明
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 术语表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Glossary {
    pub id: Uuid,
    /// 系统术语表为 None
    pub owner_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub industry: String,
    pub source_language: String,
    pub target_language: String,
    pub is_system: bool,
    pub terms: Vec<GlossaryTerm>,
    pub created_at: DateTime<Utc>,
}

impl Glossary {
    /// 创建系统术语表
    pub fn system(
        name: impl Into<String>,
        description: impl Into<String>,
        industry: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        terms: Vec<GlossaryTerm>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: None,
            name: name.into(),
            description: Some(description.into()),
            industry: industry.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            is_system: true,
            terms,
            created_at: Utc::now(),
        }
    }

    /// 语言对是否匹配
    pub fn matches_pair(&self, source_language: &str, target_language: &str) -> bool {
        self.source_language.eq_ignore_ascii_case(source_language)
            && self.target_language.eq_ignore_ascii_case(target_language)
    }
}
