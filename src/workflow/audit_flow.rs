//! 审计处理流程 - 流程层
//!
//! 定义"一个审计"各阶段的具体执行：
//! 1. acquire  → 按定位器与获取方式取回证据（文本 / 快照 / 拦截）
//! 2. resolve_glossary → 解析适用术语表
//! 3. evaluate → 逐维度评审
//!
//! 阶段之间的状态流转与持久化由编排层负责，本层不碰存储。

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuditError, AuditResult};
use crate::models::audit::{AcquisitionMode, Audit, AuditKind, UsageMetrics};
use crate::models::content::{ContentPairs, ScrapedContent};
use crate::models::dimension::DimensionResult;
use crate::models::glossary::Glossary;
use crate::services::{
    AlignService, ContentFetcher, DimensionEvaluator, FetchOutcome, GlossaryService, JudgeContext,
};
use crate::workflow::audit_ctx::AuditCtx;

/// 抓取阶段的证据汇总
#[derive(Debug, Default)]
pub struct Evidence {
    pub source_content: Option<ScrapedContent>,
    pub target_content: Option<ScrapedContent>,
    pub pairs: Option<ContentPairs>,
    pub source_snapshot: Option<String>,
    pub target_snapshot: Option<String>,
    /// 实际取得的证据形态
    pub actual: AcquisitionMode,
}

/// 抓取阶段的结果
#[derive(Debug)]
pub enum AcquireOutcome {
    /// 证据就绪，可以进入分析
    Ready(Evidence),
    /// 命中反爬拦截，等待用户 retry / proceed
    Blocked {
        reason: String,
        snapshot: Option<String>,
    },
}

/// 审计处理流程
///
/// - 编排单个审计各阶段的执行
/// - 不持有任何资源（浏览器在 FetchService 之下）
/// - 只依赖业务能力（services）
pub struct AuditFlow {
    fetcher: Arc<dyn ContentFetcher>,
    aligner: AlignService,
    glossaries: GlossaryService,
    evaluator: DimensionEvaluator,
}

impl AuditFlow {
    /// 创建新的审计流程
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        glossaries: GlossaryService,
        evaluator: DimensionEvaluator,
    ) -> Self {
        Self {
            fetcher,
            aligner: AlignService::new(),
            glossaries,
            evaluator,
        }
    }

    /// 抓取阶段：取回全部证据
    pub async fn acquire(&self, audit: &Audit, ctx: &AuditCtx) -> AuditResult<AcquireOutcome> {
        // image_upload 不经过抓取，上传图片本身就是证据
        if audit.acquisition == AcquisitionMode::ImageUpload {
            info!(
                "{} 📎 使用上传图片作为证据（{} 张），跳过抓取",
                ctx,
                audit.uploaded_images().len()
            );
            return Ok(AcquireOutcome::Ready(Evidence {
                actual: AcquisitionMode::ImageUpload,
                ..Default::default()
            }));
        }

        let target_url = audit
            .target_url()
            .ok_or_else(|| AuditError::Other("目标定位器缺少 URL".to_string()))?;

        match audit.kind {
            AuditKind::Comparison => {
                let source_url = audit
                    .source_url()
                    .ok_or_else(|| AuditError::Other("源定位器缺少 URL".to_string()))?;

                info!("{} 🌐 并发抓取源/目标页面", ctx);
                let (source, target) = tokio::try_join!(
                    self.fetcher.fetch(source_url, audit.acquisition),
                    self.fetcher.fetch(target_url, audit.acquisition),
                )?;

                // 任一侧被拦截都转入 blocked，优先报告目标侧
                if let Some(reason) = target.blocked {
                    return Ok(AcquireOutcome::Blocked {
                        reason: format!("目标页面被拦截: {}", reason),
                        snapshot: target.snapshot,
                    });
                }
                if let Some(reason) = source.blocked {
                    return Ok(AcquireOutcome::Blocked {
                        reason: format!("源页面被拦截: {}", reason),
                        snapshot: source.snapshot,
                    });
                }

                let pairs = match (&source.content, &target.content) {
                    (Some(s), Some(t)) => Some(self.aligner.align(s, t)),
                    // 单侧有文本时仍然产出目标侧记录，缺失侧保持 None
                    (None, Some(t)) => Some(self.aligner.target_only(t)),
                    _ => None,
                };

                Ok(AcquireOutcome::Ready(evidence_from(source, target, pairs)))
            }

            AuditKind::Standalone | AuditKind::Proficiency => {
                info!("{} 🌐 抓取目标页面", ctx);
                let target = self.fetcher.fetch(target_url, audit.acquisition).await?;

                if let Some(reason) = target.blocked {
                    return Ok(AcquireOutcome::Blocked {
                        reason: format!("目标页面被拦截: {}", reason),
                        snapshot: target.snapshot,
                    });
                }

                let pairs = target.content.as_ref().map(|t| self.aligner.target_only(t));
                Ok(AcquireOutcome::Ready(evidence_from(
                    FetchOutcome::default(),
                    target,
                    pairs,
                )))
            }
        }
    }

    /// 术语表解析阶段
    pub async fn resolve_glossary(&self, audit: &Audit) -> AuditResult<Option<Glossary>> {
        self.glossaries
            .resolve(
                audit.industry.as_deref(),
                audit.source_language.as_deref(),
                audit.target_language.as_deref(),
                audit.glossary_id,
            )
            .await
    }

    /// 维度评审阶段
    pub async fn evaluate(
        &self,
        audit: &Audit,
        glossary: Option<&Glossary>,
        ctx: &AuditCtx,
    ) -> AuditResult<(Vec<DimensionResult>, UsageMetrics)> {
        let glossary_terms = glossary.map(|g| g.terms.as_slice()).unwrap_or(&[]);

        // 图片证据：页面快照 + 上传图片
        let mut images: Vec<String> = Vec::new();
        if let Some(snapshot) = &audit.source_snapshot {
            images.push(snapshot.clone());
        }
        if let Some(snapshot) = &audit.target_snapshot {
            images.push(snapshot.clone());
        }
        for uploaded in audit.uploaded_images() {
            images.push(uploaded.data.clone());
        }

        if audit.content_pairs.is_none() && images.is_empty() {
            warn!("{} ⚠️ 既无文本证据也无图片证据，评审置信度会很低", ctx);
        }

        let judge_ctx = JudgeContext {
            kind: audit.kind,
            source_language: audit.source_language.as_deref(),
            target_language: audit.target_language.as_deref(),
            industry: audit.industry.as_deref(),
            glossary_terms,
            pairs: audit.content_pairs.as_ref(),
            images: &images,
        };

        let label = ctx.to_string();
        self.evaluator.evaluate_all(&judge_ctx, &label).await
    }
}

/// 由两侧抓取结果组装证据
fn evidence_from(
    source: FetchOutcome,
    target: FetchOutcome,
    pairs: Option<ContentPairs>,
) -> Evidence {
    let has_text = source.content.is_some() || target.content.is_some();
    let has_snapshot = source.snapshot.is_some() || target.snapshot.is_some();
    let actual = match (has_text, has_snapshot) {
        (true, true) => AcquisitionMode::Combined,
        (false, true) => AcquisitionMode::Screenshot,
        _ => AcquisitionMode::Text,
    };

    Evidence {
        source_content: source.content,
        target_content: target.content,
        pairs,
        source_snapshot: source.snapshot,
        target_snapshot: target.snapshot,
        actual,
    }
}
