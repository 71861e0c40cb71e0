//! 页面内容模型
//!
//! `ScrapedContent` 是抓取器从单个页面提取的结构化文本；
//! `ContentPairs` 是对齐器把源/目标两侧内容按位置配对后的结果。

use serde::{Deserialize, Serialize};

/// 页面标题层级元素
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    /// 标题层级（1–6）
    pub level: u8,
    pub text: String,
}

/// 页面链接
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// 表单文案（label 与 placeholder）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormTexts {
    pub labels: Vec<String>,
    pub placeholders: Vec<String>,
}

/// 页面图片（alt 文本用于评审）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub alt: String,
    pub src: String,
}

/// 单个页面的结构化抽取结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub links: Vec<PageLink>,
    pub buttons: Vec<String>,
    pub forms: Vec<FormTexts>,
    pub images: Vec<PageImage>,
    /// 来自 html lang 属性的语言检测结果
    pub detected_language: Option<String>,
    /// 正文纯文本（用于拦截页启发式判断等）
    pub raw_text: String,
}

impl ScrapedContent {
    /// 页面是否抽取到了可用的文本内容
    pub fn has_usable_text(&self) -> bool {
        !self.title.trim().is_empty()
            || !self.headings.is_empty()
            || !self.paragraphs.is_empty()
            || !self.raw_text.trim().is_empty()
    }
}

/// 一对可选文本：源侧与目标侧都可能缺失
///
/// 缺失的一侧保持 `None`，绝不用空字符串占位。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl TextPair {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.target.is_none()
    }
}

/// 按位置配对的标题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingPair {
    pub index: usize,
    /// 标题层级（两侧不一致时取源侧，源侧缺失时取目标侧）
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// 按位置配对的普通文本元素（段落 / 按钮 / 链接文案）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPair {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// 按位置配对的图片 alt 文本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePair {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_alt: Option<String>,
}

/// 对齐后的源/目标内容对
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPairs {
    pub title: TextPair,
    pub meta_description: TextPair,
    pub meta_keywords: TextPair,
    pub headings: Vec<HeadingPair>,
    pub paragraphs: Vec<IndexedPair>,
    pub buttons: Vec<IndexedPair>,
    pub links: Vec<IndexedPair>,
    pub images: Vec<ImagePair>,
}

impl ContentPairs {
    /// 是否完全没有可评审的文本
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.meta_description.is_empty()
            && self.meta_keywords.is_empty()
            && self.headings.is_empty()
            && self.paragraphs.is_empty()
            && self.buttons.is_empty()
            && self.links.is_empty()
            && self.images.is_empty()
    }
}
