//! AI 评审客户端 - 业务能力层
//!
//! 只负责"调用外部评审能力裁定一个维度"，不关心审计流程。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务）
//! - 有图片证据时走 Vision API（快照 / 用户上传图片）
//!
//! ## 响应解析
//! 外部模型的输出并不总是规整 JSON，解析按逐级降级的策略进行：
//! 代码块 JSON → 花括号截取 → 正则仅提取分数。全部失败才算
//! `MalformedResponse`，由上层决定重试。

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AuditResult, JudgmentError};
use crate::models::audit::{AuditKind, UsageMetrics};
use crate::models::content::ContentPairs;
use crate::models::dimension::{Dimension, Finding, GoodExample, Severity};
use crate::models::glossary::GlossaryTerm;
use crate::services::{JudgeContext, JudgeEngine, JudgeVerdict};

/// 提示词里各内容类的数量上限
const PROMPT_MAX_HEADINGS: usize = 30;
const PROMPT_MAX_PARAGRAPHS: usize = 50;
const PROMPT_MAX_BUTTONS: usize = 20;
const PROMPT_MAX_LINKS: usize = 30;
/// 段落总字符数上限
const PROMPT_MAX_PARAGRAPH_CHARS: usize = 15_000;
/// 提示词里的术语数量上限
const PROMPT_MAX_GLOSSARY_TERMS: usize = 50;

/// 常见语言代码 → 英文名（用于提示词）
static LANGUAGE_NAMES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "en" => "English",
    "ko" => "Korean",
    "ja" => "Japanese",
    "zh" => "Chinese",
    "es" => "Spanish",
    "fr" => "French",
    "de" => "German",
    "pt" => "Portuguese",
    "it" => "Italian",
    "ru" => "Russian",
    "ar" => "Arabic",
    "hi" => "Hindi",
    "th" => "Thai",
    "vi" => "Vietnamese",
    "id" => "Indonesian",
};

/// 语言代码转显示名，未知代码原样返回
fn language_name(code: &str) -> &str {
    let base = code.split(['-', '_']).next().unwrap_or(code);
    LANGUAGE_NAMES
        .get(base.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(code)
}

/// AI 评审客户端
///
/// 职责：
/// - 为单个维度构建评审提示词
/// - 调用外部评审能力并解析裁定
/// - 统计 token 消耗与调用成本
/// - 不出现 Audit / 不关心维度顺序
pub struct LlmJudge {
    client: Client<OpenAIConfig>,
    model_name: String,
    call_timeout: Duration,
    input_price_per_mtok: f64,
    output_price_per_mtok: f64,
}

impl LlmJudge {
    /// 创建新的评审客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            call_timeout: Duration::from_secs(config.judge_timeout_secs),
            input_price_per_mtok: config.input_price_per_mtok,
            output_price_per_mtok: config.output_price_per_mtok,
        }
    }
}

#[async_trait]
impl JudgeEngine for LlmJudge {
    async fn judge(
        &self,
        dimension: Dimension,
        ctx: &JudgeContext<'_>,
    ) -> AuditResult<JudgeVerdict> {
        debug!(
            "调用评审 API，维度: {}，模型: {}，图片证据: {} 张",
            dimension.tag(),
            self.model_name,
            ctx.images.len()
        );

        let system_message = build_system_message(ctx.kind);
        let user_message = build_user_message(dimension, ctx);

        // 构建消息列表
        let mut messages = Vec::new();
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message.as_str())
            .build()
            .map_err(|e| JudgmentError::ApiCallFailed {
                model: self.model_name.clone(),
                source: Box::new(e),
            })?;
        messages.push(ChatCompletionRequestMessage::System(system_msg));

        // 有图片证据时构建多部分用户消息（Vision API）
        let user_msg_build = if ctx.images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message.as_str())
                .build()
        } else {
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: user_message.clone(),
                },
            ));
            for image in ctx.images {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: as_image_url(image),
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ));
            }
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
        };
        let user_msg = user_msg_build.map_err(|e| JudgmentError::ApiCallFailed {
            model: self.model_name.clone(),
            source: Box::new(e),
        })?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .max_tokens(2048u32)
            .build()
            .map_err(|e| JudgmentError::ApiCallFailed {
                model: self.model_name.clone(),
                source: Box::new(e),
            })?;

        // 调用 API（带超时）
        let started = Instant::now();
        let response = tokio::time::timeout(self.call_timeout, self.client.chat().create(request))
            .await
            .map_err(|elapsed| JudgmentError::ApiCallFailed {
                model: self.model_name.clone(),
                source: Box::new(elapsed),
            })?
            .map_err(|e| {
                warn!("评审 API 调用失败: {}", e);
                JudgmentError::ApiCallFailed {
                    model: self.model_name.clone(),
                    source: Box::new(e),
                }
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        // 统计资源消耗
        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens as u64, u.completion_tokens as u64))
            .unwrap_or((0, 0));
        let cost_usd = self.call_cost(input_tokens, output_tokens);

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| JudgmentError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        let (score, findings, good_examples, recommendations) =
            parse_verdict(&content, ctx.kind, dimension)?;

        debug!(
            "维度 {} 裁定完成: 分数 {}，问题 {} 条，耗时 {}ms",
            dimension.tag(),
            score,
            findings.len(),
            duration_ms
        );

        Ok(JudgeVerdict {
            score,
            findings,
            good_examples,
            recommendations,
            usage: UsageMetrics {
                input_tokens,
                output_tokens,
                cost_usd,
                duration_ms,
            },
        })
    }
}

impl LlmJudge {
    /// 按配置单价计算一次调用的成本（保留 4 位小数）
    fn call_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let cost = (input_tokens as f64 / 1_000_000.0) * self.input_price_per_mtok
            + (output_tokens as f64 / 1_000_000.0) * self.output_price_per_mtok;
        (cost * 10_000.0).round() / 10_000.0
    }
}

/// 上传的图片证据可能是 URL、data URL 或裸 base64，统一成可传给
/// Vision API 的形式
fn as_image_url(data: &str) -> String {
    if data.starts_with("http://") || data.starts_with("https://") || data.starts_with("data:") {
        data.to_string()
    } else {
        format!("data:image/png;base64,{}", data)
    }
}

// ========== 提示词构建 ==========

fn build_system_message(kind: AuditKind) -> String {
    let (role, finding_shape) = match kind {
        AuditKind::Comparison => (
            "You are an expert localization quality auditor with deep knowledge of translation \
             quality assessment, cultural adaptation, and industry-specific terminology. You \
             evaluate localized website content against the original source content, one quality \
             dimension at a time.",
            r#"{"issue": "<description>", "original": "<source text>", "localized": "<translated text>", "suggestion": "<corrected translation>", "severity": "high|medium|low"}"#,
        ),
        AuditKind::Standalone => (
            "You are an expert localization quality auditor specializing in back-translation \
             assessment. You evaluate a localized website's translation quality WITHOUT access \
             to the original source content, one quality dimension at a time. Assess whether \
             the content appears to be a quality translation from the specified source language: \
             look for machine-translation artifacts, unnatural phrasing, and literal translations \
             that do not work culturally.",
            r#"{"issue": "<description>", "text": "<problematic text>", "suggestion": "<improved text>", "severity": "high|medium|low"}"#,
        ),
        AuditKind::Proficiency => (
            "You are an expert language assessor. You evaluate the overall language proficiency \
             of the given website content in its target language.",
            r#"{"issue": "<description>", "text": "<problematic text>", "suggestion": "<improved text>", "severity": "high|medium|low"}"#,
        ),
    };

    format!(
        r#"{role}

## CRITICAL: Output Format

You MUST end your response with a JSON code block with EXACTLY this structure:

```json
{{
  "score": <int 0-100>,
  "findings": [
    {finding_shape}
  ],
  "good_examples": [
    {{"description": "<why this is well done>", "text": "<good text>"}}
  ],
  "recommendations": ["<actionable recommendation>"]
}}
```

IMPORTANT:
- score MUST be an integer between 0 and 100
- Keep findings focused: at most 10 items, each with all fields populated
- The JSON must be valid and parseable"#
    )
}

fn build_user_message(dimension: Dimension, ctx: &JudgeContext<'_>) -> String {
    let mut message = String::new();

    message.push_str(&format!(
        "Please evaluate the quality dimension **{}** ({}).\n\n",
        dimension.tag(),
        dimension.criteria()
    ));

    if let Some(lang) = ctx.source_language {
        message.push_str(&format!(
            "**Source Language (translated FROM):** {}\n",
            language_name(lang)
        ));
    }
    if let Some(lang) = ctx.target_language {
        message.push_str(&format!(
            "**Target Language (translated TO):** {}\n",
            language_name(lang)
        ));
    }
    message.push_str(&format!(
        "**Industry:** {}\n",
        ctx.industry.unwrap_or("General")
    ));

    message.push_str(&render_glossary(ctx.glossary_terms));

    if let Some(pairs) = ctx.pairs {
        message.push_str(&render_pairs(pairs, ctx.kind));
    }

    if !ctx.images.is_empty() {
        message.push_str(&format!(
            "\n## Visual Evidence\n\n{} page screenshot(s)/image(s) are attached. ",
            ctx.images.len()
        ));
        if ctx.pairs.is_none() {
            message.push_str(
                "Text extraction was not possible, so base your assessment on the attached \
                 images alone and be explicit about reduced confidence where relevant.",
            );
        } else {
            message.push_str("Use them alongside the extracted text.");
        }
        message.push('\n');
    }

    message.push_str(
        "\nEvaluate ONLY this dimension and end your response with the JSON code block \
         specified in the system prompt.\n",
    );

    message
}

fn render_glossary(terms: &[GlossaryTerm]) -> String {
    if terms.is_empty() {
        return String::new();
    }

    let mut block = format!("\n## Industry Glossary ({} terms)\n\n", terms.len());
    block.push_str("Use these terms to validate terminology:\n");
    for t in terms.iter().take(PROMPT_MAX_GLOSSARY_TERMS) {
        block.push_str(&format!("- \"{}\" -> \"{}\"", t.source_term, t.target_term));
        if let Some(context) = &t.context {
            if !context.is_empty() {
                block.push_str(&format!(" (context: {})", context));
            }
        }
        block.push('\n');
    }
    if terms.len() > PROMPT_MAX_GLOSSARY_TERMS {
        block.push_str(&format!(
            "... and {} more terms\n",
            terms.len() - PROMPT_MAX_GLOSSARY_TERMS
        ));
    }
    block
}

fn pair_line(source: &Option<String>, target: &Option<String>, comparison: bool) -> String {
    if comparison {
        format!(
            "source: {} | target: {}",
            source.as_deref().unwrap_or("(missing)"),
            target.as_deref().unwrap_or("(missing)")
        )
    } else {
        target.as_deref().unwrap_or("(missing)").to_string()
    }
}

fn render_pairs(pairs: &ContentPairs, kind: AuditKind) -> String {
    let comparison = kind == AuditKind::Comparison;
    let mut block = if comparison {
        "\n## Aligned Content (source vs target)\n".to_string()
    } else {
        "\n## Page Content\n".to_string()
    };

    block.push_str(&format!(
        "\n**Title:** {}\n",
        pair_line(&pairs.title.source, &pairs.title.target, comparison)
    ));
    if !pairs.meta_description.is_empty() {
        block.push_str(&format!(
            "**Meta Description:** {}\n",
            pair_line(
                &pairs.meta_description.source,
                &pairs.meta_description.target,
                comparison
            )
        ));
    }
    if !pairs.meta_keywords.is_empty() {
        block.push_str(&format!(
            "**Meta Keywords:** {}\n",
            pair_line(&pairs.meta_keywords.source, &pairs.meta_keywords.target, comparison)
        ));
    }

    if !pairs.headings.is_empty() {
        block.push_str("\n### Headings\n");
        for h in pairs.headings.iter().take(PROMPT_MAX_HEADINGS) {
            block.push_str(&format!(
                "- [H{}] {}\n",
                h.level,
                pair_line(&h.source, &h.target, comparison)
            ));
        }
    }

    if !pairs.paragraphs.is_empty() {
        block.push_str("\n### Paragraphs\n");
        let mut used_chars = 0usize;
        for p in pairs.paragraphs.iter().take(PROMPT_MAX_PARAGRAPHS) {
            let line = format!("- {}\n", pair_line(&p.source, &p.target, comparison));
            used_chars += line.chars().count();
            if used_chars > PROMPT_MAX_PARAGRAPH_CHARS {
                block.push_str("- [Content truncated...]\n");
                break;
            }
            block.push_str(&line);
        }
    }

    if !pairs.buttons.is_empty() {
        block.push_str("\n### Buttons/CTAs\n");
        for b in pairs.buttons.iter().take(PROMPT_MAX_BUTTONS) {
            block.push_str(&format!("- {}\n", pair_line(&b.source, &b.target, comparison)));
        }
    }

    if !pairs.links.is_empty() {
        block.push_str("\n### Links\n");
        for l in pairs.links.iter().take(PROMPT_MAX_LINKS) {
            block.push_str(&format!("- {}\n", pair_line(&l.source, &l.target, comparison)));
        }
    }

    if !pairs.images.is_empty() {
        block.push_str("\n### Image Alt Texts\n");
        for img in pairs.images.iter().take(PROMPT_MAX_LINKS) {
            block.push_str(&format!(
                "- {}\n",
                pair_line(&img.source_alt, &img.target_alt, comparison)
            ));
        }
    }

    block
}

// ========== 响应解析 ==========

/// 反序列化用的原始问题记录（字段按模式宽松接收）
#[derive(Debug, Deserialize)]
struct RawFinding {
    issue: String,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    localized: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: i64,
    #[serde(default)]
    findings: Vec<RawFinding>,
    #[serde(default)]
    good_examples: Vec<GoodExample>,
    #[serde(default)]
    recommendations: Vec<String>,
}

fn json_code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("代码块正则必定合法")
    })
}

fn score_fallback_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""score"\s*:\s*(-?\d+)"#).expect("分数正则必定合法"))
}

/// 去掉字符串里的裸控制字符并清理尾随逗号
fn cleanup_json(raw: &str) -> String {
    let no_control: String = raw
        .chars()
        .map(|c| {
            if (c as u32) < 0x20 && c != '\n' && c != '\t' {
                ' '
            } else {
                c
            }
        })
        .collect();

    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA
        .get_or_init(|| Regex::new(r",\s*([}\]])").expect("尾随逗号正则必定合法"));
    re.replace_all(&no_control, "$1").into_owned()
}

/// 从模型输出中解析一个维度的裁定
///
/// 返回的分数未做范围校验（由 `DimensionEvaluator` 负责拒绝与重试）。
pub(crate) fn parse_verdict(
    response: &str,
    kind: AuditKind,
    dimension: Dimension,
) -> Result<(i64, Vec<Finding>, Vec<GoodExample>, Vec<String>), JudgmentError> {
    let mut candidates: Vec<String> = Vec::new();

    // 策略 1: JSON 代码块
    if let Some(captures) = json_code_block_regex().captures(response) {
        if let Some(m) = captures.get(1) {
            candidates.push(m.as_str().to_string());
        }
    }

    // 策略 2: 第一个 { 到最后一个 } 的截取
    if let (Some(first), Some(last)) = (response.find('{'), response.rfind('}')) {
        if last > first {
            candidates.push(response[first..=last].to_string());
        }
    }

    let mut last_error = String::new();
    for candidate in &candidates {
        for attempt in [candidate.clone(), cleanup_json(candidate)] {
            match serde_json::from_str::<RawVerdict>(&attempt) {
                Ok(raw) => {
                    return Ok((
                        raw.score,
                        convert_findings(raw.findings, kind),
                        raw.good_examples,
                        raw.recommendations,
                    ));
                }
                Err(e) => last_error = e.to_string(),
            }
        }
    }

    // 策略 3: 正则兜底，至少把分数捞出来
    if let Some(captures) = score_fallback_regex().captures(response) {
        if let Some(m) = captures.get(1) {
            if let Ok(score) = m.as_str().parse::<i64>() {
                warn!(
                    "维度 {} 响应无法完整解析，降级为仅提取分数",
                    dimension.tag()
                );
                return Ok((
                    score,
                    Vec::new(),
                    Vec::new(),
                    vec!["解析降级：本维度仅提取到分数，明细缺失".to_string()],
                ));
            }
        }
    }

    Err(JudgmentError::MalformedResponse {
        dimension: dimension.tag(),
        detail: if last_error.is_empty() {
            "响应中找不到 JSON 结构".to_string()
        } else {
            last_error
        },
    })
}

/// 按审计模式把原始问题记录转换为带 kind 标签的 Finding
fn convert_findings(raw: Vec<RawFinding>, kind: AuditKind) -> Vec<Finding> {
    raw.into_iter()
        .map(|f| {
            let severity = Severity::parse_or_medium(f.severity.as_deref().unwrap_or("medium"));
            match kind {
                AuditKind::Comparison => Finding::Comparison {
                    issue: f.issue,
                    original: f.original,
                    localized: f.localized,
                    suggestion: f.suggestion,
                    severity,
                },
                AuditKind::Standalone | AuditKind::Proficiency => Finding::Standalone {
                    issue: f.issue,
                    // standalone 模式下模型偶尔仍用 localized 字段回填
                    text: f.text.or(f.localized).or(f.original),
                    suggestion: f.suggestion,
                    severity,
                },
            }
        })
        .collect()
}
