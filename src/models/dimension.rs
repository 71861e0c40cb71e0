//! 质量维度与评审结果模型

use serde::{Deserialize, Serialize};

use crate::models::audit::AuditKind;

/// 质量维度
///
/// comparison 模式评审全部 8 个维度；standalone 模式没有源文可比，
/// 排除 CONSISTENCY；proficiency 模式只评 LANGUAGE_PROFICIENCY 一个维度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    /// 翻译准确性：语法、拼写、术语忠实度
    Correctness,
    /// 文化适配：习语、意象、语气
    CulturalRelevance,
    /// 行业专业度：领域术语、术语表遵循度
    IndustryExpertise,
    /// 流畅度：目标语言的自然阅读体验
    Fluency,
    /// 一致性：全文术语统一、品牌词处理（仅 comparison）
    Consistency,
    /// 完整性：漏译、未译、占位符检测
    Completeness,
    /// UI/UX：日期、货币、度量衡、排版
    UiUx,
    /// SEO：meta 标签、关键词、标题本地化
    Seo,
    /// 语言能力（仅 proficiency 模式）
    LanguageProficiency,
}

/// comparison 模式的维度列表（顺序即评审顺序）
const COMPARISON_DIMENSIONS: [Dimension; 8] = [
    Dimension::Correctness,
    Dimension::CulturalRelevance,
    Dimension::IndustryExpertise,
    Dimension::Fluency,
    Dimension::Consistency,
    Dimension::Completeness,
    Dimension::UiUx,
    Dimension::Seo,
];

/// standalone 模式的维度列表（无 CONSISTENCY）
const STANDALONE_DIMENSIONS: [Dimension; 7] = [
    Dimension::Correctness,
    Dimension::CulturalRelevance,
    Dimension::IndustryExpertise,
    Dimension::Fluency,
    Dimension::Completeness,
    Dimension::UiUx,
    Dimension::Seo,
];

/// proficiency 模式只有一个维度
const PROFICIENCY_DIMENSIONS: [Dimension; 1] = [Dimension::LanguageProficiency];

impl Dimension {
    /// 获取维度标签（与外部评审能力约定的标识符）
    pub fn tag(self) -> &'static str {
        match self {
            Dimension::Correctness => "CORRECTNESS",
            Dimension::CulturalRelevance => "CULTURAL_RELEVANCE",
            Dimension::IndustryExpertise => "INDUSTRY_EXPERTISE",
            Dimension::Fluency => "FLUENCY",
            Dimension::Consistency => "CONSISTENCY",
            Dimension::Completeness => "COMPLETENESS",
            Dimension::UiUx => "UI_UX",
            Dimension::Seo => "SEO",
            Dimension::LanguageProficiency => "LANGUAGE_PROFICIENCY",
        }
    }

    /// 获取评审标准描述（用于构建评审提示词）
    pub fn criteria(self) -> &'static str {
        match self {
            Dimension::Correctness => {
                "Translation accuracy, grammar, spelling, terminology fidelity"
            }
            Dimension::CulturalRelevance => {
                "Cultural adaptation, idioms, imagery appropriateness, tone for the target audience"
            }
            Dimension::IndustryExpertise => {
                "Domain-specific terminology accuracy, compliance, glossary adherence"
            }
            Dimension::Fluency => {
                "Natural reading flow in the target language, sentence structure, coherence"
            }
            Dimension::Consistency => {
                "Uniform terminology usage throughout, brand terms handling"
            }
            Dimension::Completeness => {
                "Detection of missing/untranslated content, placeholders, broken content"
            }
            Dimension::UiUx => {
                "Date/time formats, currency, measurements, number formats, layout considerations"
            }
            Dimension::Seo => "Meta tags, keywords localization, title optimization",
            Dimension::LanguageProficiency => {
                "Overall language proficiency: vocabulary range, grammatical control, register"
            }
        }
    }

    /// 指定审计模式下适用的维度集合
    pub fn for_kind(kind: AuditKind) -> &'static [Dimension] {
        match kind {
            AuditKind::Comparison => &COMPARISON_DIMENSIONS,
            AuditKind::Standalone => &STANDALONE_DIMENSIONS,
            AuditKind::Proficiency => &PROFICIENCY_DIMENSIONS,
        }
    }
}

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// 从字符串解析严重程度，无法识别时回退为 medium
    pub fn parse_or_medium(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "high" => Severity::High,
            _ => Severity::Medium,
        }
    }
}

/// 单条问题记录
///
/// comparison 模式的问题携带源文/译文摘录；standalone 模式没有源文，
/// 只携带一段问题文本。用带 kind 标签的枚举表达，而不是可选字段堆叠。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// 对照审计的问题：源文 + 译文摘录
    Comparison {
        issue: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        localized: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
        severity: Severity,
    },
    /// 单页审计的问题：只有目标页面上的文本摘录
    Standalone {
        issue: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
        severity: Severity,
    },
}

impl Finding {
    /// 问题描述
    pub fn issue(&self) -> &str {
        match self {
            Finding::Comparison { issue, .. } | Finding::Standalone { issue, .. } => issue,
        }
    }

    /// 严重程度
    pub fn severity(&self) -> Severity {
        match self {
            Finding::Comparison { severity, .. } | Finding::Standalone { severity, .. } => {
                *severity
            }
        }
    }
}

/// 翻译得当的正面示例
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodExample {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 单个维度的评审结果
///
/// 评审能力返回后一次性写入，之后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: Dimension,
    /// 分数，[0, 100]
    pub score: u8,
    pub findings: Vec<Finding>,
    pub good_examples: Vec<GoodExample>,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_for_kind() {
        let comparison = Dimension::for_kind(AuditKind::Comparison);
        assert_eq!(comparison.len(), 8);
        assert!(comparison.contains(&Dimension::Consistency));

        let standalone = Dimension::for_kind(AuditKind::Standalone);
        assert_eq!(standalone.len(), 7);
        assert!(!standalone.contains(&Dimension::Consistency));

        let proficiency = Dimension::for_kind(AuditKind::Proficiency);
        assert_eq!(proficiency, &[Dimension::LanguageProficiency]);
    }

    #[test]
    fn test_dimension_serde_tag() {
        let json = serde_json::to_string(&Dimension::UiUx).unwrap();
        assert_eq!(json, "\"UI_UX\"");

        let dim: Dimension = serde_json::from_str("\"CULTURAL_RELEVANCE\"").unwrap();
        assert_eq!(dim, Dimension::CulturalRelevance);
        assert_eq!(dim.tag(), "CULTURAL_RELEVANCE");
    }

    #[test]
    fn test_severity_parse_fallback() {
        assert_eq!(Severity::parse_or_medium("HIGH"), Severity::High);
        assert_eq!(Severity::parse_or_medium("low"), Severity::Low);
        assert_eq!(Severity::parse_or_medium("严重"), Severity::Medium);
    }

    #[test]
    fn test_finding_kind_tag() {
        let finding = Finding::Standalone {
            issue: "直译痕迹明显".to_string(),
            text: Some("지금 구매하세요".to_string()),
            suggestion: None,
            severity: Severity::Low,
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "standalone");
        assert!(json.get("original").is_none());
    }
}
