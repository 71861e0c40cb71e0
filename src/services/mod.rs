//! 业务能力层
//!
//! 描述"我能做什么"，每个服务只处理单个审计的单项能力：
//! - `FetchService` - 页面内容获取能力（文本抓取 / 视觉快照 / 拦截识别）
//! - `AlignService` - 源/目标内容按位置对齐能力
//! - `GlossaryService` - 行业术语表解析能力
//! - `LlmJudge` - 单个维度的 AI 评审能力
//! - `DimensionEvaluator` - 全维度评审编排（带重试与结果校验）
//! - `score` - 总分聚合与维度排序
//!
//! 外部不可靠能力（抓取、评审）以 trait 为边界，方便在测试中替换。

pub mod align_service;
pub mod evaluator;
pub mod fetch_service;
pub mod glossary_service;
pub mod judge_client;
pub mod score;

use async_trait::async_trait;

use crate::error::AuditResult;
use crate::models::audit::{AcquisitionMode, AuditKind, UsageMetrics};
use crate::models::content::{ContentPairs, ScrapedContent};
use crate::models::dimension::{Dimension, Finding, GoodExample};
use crate::models::glossary::GlossaryTerm;

pub use align_service::AlignService;
pub use evaluator::DimensionEvaluator;
pub use fetch_service::FetchService;
pub use glossary_service::{seed_system_glossaries, GlossaryService};
pub use judge_client::LlmJudge;

/// 单个定位器的抓取结果
///
/// `blocked` 非空表示命中反爬拦截——这是可恢复状态，不是错误。
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub content: Option<ScrapedContent>,
    /// base64 PNG 快照
    pub snapshot: Option<String>,
    /// 拦截原因（人类可读）
    pub blocked: Option<String>,
}

/// 内容获取能力
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// 按指定获取方式抓取一个 URL
    async fn fetch(&self, url: &str, mode: AcquisitionMode) -> AuditResult<FetchOutcome>;
}

/// 一次维度评审的上下文
///
/// 文本证据（`pairs`）与视觉证据（`images`）至少有一样；blocked 之后
/// proceed 的审计只有快照证据。
pub struct JudgeContext<'a> {
    pub kind: AuditKind,
    pub source_language: Option<&'a str>,
    pub target_language: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub glossary_terms: &'a [GlossaryTerm],
    pub pairs: Option<&'a ContentPairs>,
    /// 图片证据（http(s) URL 或 data URL）
    pub images: &'a [String],
}

/// 评审能力返回的原始裁定
///
/// `score` 未经校验（外部能力可能返回越界值），由 `DimensionEvaluator`
/// 负责校验、重试与截断。
#[derive(Debug)]
pub struct JudgeVerdict {
    pub score: i64,
    pub findings: Vec<Finding>,
    pub good_examples: Vec<GoodExample>,
    pub recommendations: Vec<String>,
    pub usage: UsageMetrics,
}

/// AI 评审能力（每次调用裁定一个维度）
#[async_trait]
pub trait JudgeEngine: Send + Sync {
    async fn judge(&self, dimension: Dimension, ctx: &JudgeContext<'_>)
        -> AuditResult<JudgeVerdict>;
}
