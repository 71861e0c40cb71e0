//! 维度评审编排 - 业务能力层
//!
//! 按审计模式适用的维度顺序逐个调用评审能力，负责：
//! - 校验外部能力返回的分数范围（[0, 100]）
//! - 畸形 / 越界结果重试一次，再失败就带着维度名上抛
//! - 截断超长的明细列表（外部能力承诺有界，但不可信任）
//! - 跨所有调用累加资源消耗

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AuditError, AuditResult, JudgmentError};
use crate::models::audit::UsageMetrics;
use crate::models::dimension::{Dimension, DimensionResult};
use crate::services::{JudgeContext, JudgeEngine};

/// 单维度结果里各列表的上限
const MAX_FINDINGS: usize = 20;
const MAX_GOOD_EXAMPLES: usize = 10;
const MAX_RECOMMENDATIONS: usize = 10;

/// 维度评审编排器
pub struct DimensionEvaluator {
    engine: Arc<dyn JudgeEngine>,
}

impl DimensionEvaluator {
    pub fn new(engine: Arc<dyn JudgeEngine>) -> Self {
        Self { engine }
    }

    /// 评审全部适用维度
    ///
    /// `label` 仅用于日志前缀。任何维度连续失败两次都会让整个评审失败，
    /// 错误信息里带上维度名。
    pub async fn evaluate_all(
        &self,
        ctx: &JudgeContext<'_>,
        label: &str,
    ) -> AuditResult<(Vec<DimensionResult>, UsageMetrics)> {
        let dimensions = Dimension::for_kind(ctx.kind);
        let mut results = Vec::with_capacity(dimensions.len());
        let mut usage = UsageMetrics::default();

        for (i, dimension) in dimensions.iter().enumerate() {
            info!(
                "{} 🔍 评审维度 {}/{}: {}",
                label,
                i + 1,
                dimensions.len(),
                dimension.tag()
            );

            let result = match self.judge_once(*dimension, ctx, &mut usage).await {
                Ok(result) => result,
                Err(first_err) => {
                    // 畸形 / 越界 / 调用失败都重试一次
                    warn!(
                        "{} ⚠️ 维度 {} 首次评审失败: {}，重试一次",
                        label,
                        dimension.tag(),
                        first_err
                    );
                    match self.judge_once(*dimension, ctx, &mut usage).await {
                        Ok(result) => result,
                        Err(second_err) => {
                            return Err(JudgmentError::DimensionFailed {
                                dimension: dimension.tag(),
                                detail: second_err.to_string(),
                            }
                            .into());
                        }
                    }
                }
            };

            info!(
                "{} ✓ 维度 {} 得分: {}",
                label,
                dimension.tag(),
                result.score
            );
            results.push(result);
        }

        Ok((results, usage))
    }

    /// 调用一次评审能力并校验结果
    async fn judge_once(
        &self,
        dimension: Dimension,
        ctx: &JudgeContext<'_>,
        usage: &mut UsageMetrics,
    ) -> AuditResult<DimensionResult> {
        let verdict = self.engine.judge(dimension, ctx).await?;

        // 调用已经发生，无论结果好坏都计入消耗
        usage.absorb(&verdict.usage);

        if !(0..=100).contains(&verdict.score) {
            return Err(AuditError::Judgment(JudgmentError::ScoreOutOfRange {
                dimension: dimension.tag(),
                score: verdict.score,
            }));
        }

        let mut findings = verdict.findings;
        findings.truncate(MAX_FINDINGS);
        let mut good_examples = verdict.good_examples;
        good_examples.truncate(MAX_GOOD_EXAMPLES);
        let mut recommendations = verdict.recommendations;
        recommendations.truncate(MAX_RECOMMENDATIONS);

        Ok(DimensionResult {
            dimension,
            score: verdict.score as u8,
            findings,
            good_examples,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditKind;
    use crate::models::dimension::{Finding, Severity};
    use crate::services::JudgeVerdict;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// 按脚本顺序吐分数的桩引擎
    struct ScriptedJudge {
        scores: Mutex<VecDeque<i64>>,
        findings_per_call: usize,
    }

    impl ScriptedJudge {
        fn new(scores: &[i64]) -> Self {
            Self {
                scores: Mutex::new(scores.iter().copied().collect()),
                findings_per_call: 1,
            }
        }
    }

    #[async_trait]
    impl JudgeEngine for ScriptedJudge {
        async fn judge(
            &self,
            _dimension: Dimension,
            ctx: &JudgeContext<'_>,
        ) -> AuditResult<JudgeVerdict> {
            let score = {
                let mut scores = self.scores.lock().await;
                scores.pop_front().unwrap_or(80)
            };
            let findings = (0..self.findings_per_call)
                .map(|i| match ctx.kind {
                    AuditKind::Comparison => Finding::Comparison {
                        issue: format!("issue {}", i),
                        original: Some("src".to_string()),
                        localized: Some("tgt".to_string()),
                        suggestion: None,
                        severity: Severity::Low,
                    },
                    _ => Finding::Standalone {
                        issue: format!("issue {}", i),
                        text: Some("tgt".to_string()),
                        suggestion: None,
                        severity: Severity::Low,
                    },
                })
                .collect();
            Ok(JudgeVerdict {
                score,
                findings,
                good_examples: Vec::new(),
                recommendations: Vec::new(),
                usage: UsageMetrics {
                    input_tokens: 100,
                    output_tokens: 50,
                    cost_usd: 0.001,
                    duration_ms: 10,
                },
            })
        }
    }

    fn ctx(kind: AuditKind) -> JudgeContext<'static> {
        JudgeContext {
            kind,
            source_language: Some("en"),
            target_language: Some("ko"),
            industry: None,
            glossary_terms: &[],
            pairs: None,
            images: &[],
        }
    }

    #[tokio::test]
    async fn test_evaluate_all_comparison_dimensions() {
        let evaluator = DimensionEvaluator::new(Arc::new(ScriptedJudge::new(&[])));
        let (results, usage) = evaluator
            .evaluate_all(&ctx(AuditKind::Comparison), "[测试]")
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        // 消耗跨 8 次调用累加
        assert_eq!(usage.input_tokens, 800);
        assert_eq!(usage.output_tokens, 400);
    }

    #[tokio::test]
    async fn test_out_of_range_score_retried_once_then_ok() {
        // 第一个维度先吐 150（越界），重试后 75
        let evaluator = DimensionEvaluator::new(Arc::new(ScriptedJudge::new(&[150, 75])));
        let (results, usage) = evaluator
            .evaluate_all(&ctx(AuditKind::Proficiency), "[测试]")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 75);
        // 越界的那次调用也计入消耗
        assert_eq!(usage.input_tokens, 200);
    }

    #[tokio::test]
    async fn test_out_of_range_twice_fails_with_dimension_name() {
        let evaluator = DimensionEvaluator::new(Arc::new(ScriptedJudge::new(&[150, 150])));
        let err = evaluator
            .evaluate_all(&ctx(AuditKind::Proficiency), "[测试]")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(
            message.contains("LANGUAGE_PROFICIENCY"),
            "错误信息应点名失败的维度: {}",
            message
        );
    }

    #[tokio::test]
    async fn test_finding_lists_are_bounded() {
        let judge = ScriptedJudge {
            scores: Mutex::new(VecDeque::new()),
            findings_per_call: 50,
        };
        let evaluator = DimensionEvaluator::new(Arc::new(judge));
        let (results, _) = evaluator
            .evaluate_all(&ctx(AuditKind::Proficiency), "[测试]")
            .await
            .unwrap();

        assert_eq!(results[0].findings.len(), MAX_FINDINGS);
    }
}
