//! 审计任务模型
//!
//! `Audit` 是整个流水线的工作单元，状态机见 orchestrator 层：
//!
//! ```text
//! pending → scraping → (blocked?) → analyzing → completed | failed
//! ```
//!
//! 终态（completed / failed）不可再修改；blocked 状态可以 retry（重新抓取）
//! 或 proceed（用已截获的快照降级继续分析）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::content::{ContentPairs, ScrapedContent};
use crate::models::dimension::DimensionResult;

/// 审计模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    /// 双 URL / 双图片集对照审计
    Comparison,
    /// 单页回译质量评估（无源文）
    Standalone,
    /// 轻量单维度语言能力评估
    Proficiency,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::Comparison => "comparison",
            AuditKind::Standalone => "standalone",
            AuditKind::Proficiency => "proficiency",
        }
    }
}

/// 内容获取方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// 先尝试文本抓取，检测到反爬拦截时转入 blocked 而不是 failed
    #[default]
    Auto,
    /// 仅文本抓取；无可用内容时直接失败（不算拦截）
    Text,
    /// 仅视觉截图
    Screenshot,
    /// 文本 + 截图，由评审器合并使用
    Combined,
    /// 不抓取，直接用用户上传的图片作为证据
    ImageUpload,
}

/// 审计状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pending,
    Scraping,
    Analyzing,
    Completed,
    Failed,
    Blocked,
}

impl AuditStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, AuditStatus::Completed | AuditStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Scraping => "scraping",
            AuditStatus::Analyzing => "analyzing",
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
            AuditStatus::Blocked => "blocked",
        }
    }
}

/// 上传图片的标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLabel {
    Source,
    Target,
}

/// 用户上传的带标签图片
///
/// `data` 可以是 http(s) URL、data URL，也可以是裸的 base64 PNG。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledImage {
    pub label: ImageLabel,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 内容定位器：一个 URL 或一组带标签图片
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Url(String),
    Images(Vec<LabeledImage>),
}

/// 进度信息：轮询客户端据此渲染确定性的进度清单
///
/// 四个固定检查点：(1) 初始化 (2) 术语表解析 (3) 维度评审 (4) 保存结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub step: u8,
    pub total: u8,
    pub label: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            step: 0,
            total: 4,
            label: "排队等待中".to_string(),
        }
    }
}

/// 资源消耗统计（跨所有维度评审调用累加）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

impl UsageMetrics {
    /// 累加另一份统计
    pub fn absorb(&mut self, other: &UsageMetrics) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost_usd += other.cost_usd;
        self.duration_ms += other.duration_ms;
    }
}

/// 审计创建请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    pub owner_id: String,
    pub kind: AuditKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    /// image_upload 模式下的图片（1–3 张，至少一张 target）
    #[serde(default)]
    pub images: Vec<LabeledImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary_id: Option<Uuid>,
    pub acquisition: AcquisitionMode,
}

impl AuditRequest {
    /// 按审计模式校验必填字段
    ///
    /// 任何校验失败都发生在创建审计记录之前，不会留下半成品状态。
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.acquisition == AcquisitionMode::ImageUpload {
            let count = self.images.len();
            if !(1..=3).contains(&count) {
                return Err(ValidationError::ImageCountOutOfRange { count });
            }
            if !self.images.iter().any(|i| i.label == ImageLabel::Target) {
                return Err(ValidationError::MissingTargetImage);
            }
            if self.kind == AuditKind::Comparison
                && !self.images.iter().any(|i| i.label == ImageLabel::Source)
            {
                return Err(ValidationError::MissingSourceImage);
            }
        } else {
            if self.target_url.as_deref().map_or(true, str::is_empty) {
                return Err(ValidationError::MissingTargetLocator);
            }
            if self.kind == AuditKind::Comparison
                && self.source_url.as_deref().map_or(true, str::is_empty)
            {
                return Err(ValidationError::MissingSourceLocator);
            }
        }

        match self.kind {
            AuditKind::Standalone => {
                if self.source_language.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::MissingSourceLanguage);
                }
            }
            AuditKind::Proficiency => {
                if self.target_language.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::MissingTargetLanguage);
                }
            }
            AuditKind::Comparison => {}
        }

        Ok(())
    }

    /// 源侧定位器（standalone / proficiency 模式没有源侧）
    fn source_locator(&self) -> Option<Locator> {
        if self.acquisition == AcquisitionMode::ImageUpload {
            let imgs: Vec<LabeledImage> = self
                .images
                .iter()
                .filter(|i| i.label == ImageLabel::Source)
                .cloned()
                .collect();
            if imgs.is_empty() {
                None
            } else {
                Some(Locator::Images(imgs))
            }
        } else {
            self.source_url.clone().map(Locator::Url)
        }
    }

    /// 目标侧定位器（校验通过后必然存在）
    fn target_locator(&self) -> Option<Locator> {
        if self.acquisition == AcquisitionMode::ImageUpload {
            let imgs: Vec<LabeledImage> = self
                .images
                .iter()
                .filter(|i| i.label == ImageLabel::Target)
                .cloned()
                .collect();
            if imgs.is_empty() {
                None
            } else {
                Some(Locator::Images(imgs))
            }
        } else {
            self.target_url.clone().map(Locator::Url)
        }
    }
}

/// 审计任务记录
///
/// 只有编排器可以修改；每次修改都是一次覆盖整条记录的原子写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: AuditKind,
    pub source: Option<Locator>,
    pub target: Option<Locator>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub industry: Option<String>,
    pub glossary_id: Option<Uuid>,
    /// 请求的获取方式
    pub acquisition: AcquisitionMode,
    /// 实际使用的证据形态（text / screenshot / combined）
    pub actual_acquisition: Option<AcquisitionMode>,
    pub status: AuditStatus,
    pub progress: Progress,
    /// 终态 failed 时必然非空
    pub error_detail: Option<String>,
    /// blocked 状态的人类可读拦截原因
    pub blocked_reason: Option<String>,
    pub source_content: Option<ScrapedContent>,
    pub target_content: Option<ScrapedContent>,
    pub content_pairs: Option<ContentPairs>,
    /// base64 PNG 快照
    pub source_snapshot: Option<String>,
    pub target_snapshot: Option<String>,
    pub results: Vec<DimensionResult>,
    pub overall_score: Option<u8>,
    pub usage: UsageMetrics,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// 从已通过校验的请求创建 pending 状态的审计记录
    pub fn from_request(req: &AuditRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: req.owner_id.clone(),
            kind: req.kind,
            source: req.source_locator(),
            target: req.target_locator(),
            source_language: req.source_language.clone(),
            target_language: req.target_language.clone(),
            industry: req.industry.clone(),
            glossary_id: req.glossary_id,
            acquisition: req.acquisition,
            actual_acquisition: None,
            status: AuditStatus::Pending,
            progress: Progress::default(),
            error_detail: None,
            blocked_reason: None,
            source_content: None,
            target_content: None,
            content_pairs: None,
            source_snapshot: None,
            target_snapshot: None,
            results: Vec::new(),
            overall_score: None,
            usage: UsageMetrics::default(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 更新进度检查点
    pub fn set_progress(&mut self, step: u8, label: impl Into<String>) {
        self.progress = Progress {
            step,
            total: 4,
            label: label.into(),
        };
    }

    /// 目标侧 URL（image_upload 模式返回 None）
    pub fn target_url(&self) -> Option<&str> {
        match &self.target {
            Some(Locator::Url(url)) => Some(url),
            _ => None,
        }
    }

    /// 源侧 URL
    pub fn source_url(&self) -> Option<&str> {
        match &self.source {
            Some(Locator::Url(url)) => Some(url),
            _ => None,
        }
    }

    /// 所有上传图片（先 source 后 target 的顺序）
    pub fn uploaded_images(&self) -> Vec<&LabeledImage> {
        let mut images = Vec::new();
        if let Some(Locator::Images(imgs)) = &self.source {
            images.extend(imgs.iter());
        }
        if let Some(Locator::Images(imgs)) = &self.target {
            images.extend(imgs.iter());
        }
        images
    }
}
