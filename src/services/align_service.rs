//! 内容对齐服务 - 业务能力层
//!
//! 把源/目标两侧的结构化抽取结果按内容类逐位配对（第 n 个标题对第 n 个
//! 标题）。两侧数量不一致时，多出的元素保留、对侧记为缺失，绝不丢弃
//! 也绝不错位硬配。缺失的一侧是 `None`，不会伪造空字符串。

use crate::models::content::{
    ContentPairs, HeadingPair, ImagePair, IndexedPair, ScrapedContent, TextPair,
};

/// 每个内容类进入对比的元素数量上限
const MAX_HEADINGS: usize = 50;
const MAX_PARAGRAPHS: usize = 30;
const MAX_BUTTONS: usize = 30;
const MAX_LINKS: usize = 50;
const MAX_IMAGES: usize = 30;

/// 内容对齐服务
///
/// 职责：
/// - 只做按位置的结构配对
/// - 不访问网络，不认识 Audit
pub struct AlignService;

impl AlignService {
    pub fn new() -> Self {
        Self
    }

    /// 对照模式：把两侧内容对齐成 ContentPairs
    pub fn align(&self, source: &ScrapedContent, target: &ScrapedContent) -> ContentPairs {
        let heading_count = source.headings.len().max(target.headings.len()).min(MAX_HEADINGS);
        let mut headings = Vec::with_capacity(heading_count);
        for i in 0..heading_count {
            let src = source.headings.get(i);
            let tgt = target.headings.get(i);
            headings.push(HeadingPair {
                index: i,
                // 层级以源侧为准，源侧缺失时取目标侧
                level: src.map(|h| h.level).or(tgt.map(|h| h.level)).unwrap_or(1),
                source: src.and_then(|h| non_empty(&h.text)),
                target: tgt.and_then(|h| non_empty(&h.text)),
            });
        }

        ContentPairs {
            title: TextPair {
                source: non_empty(&source.title),
                target: non_empty(&target.title),
            },
            meta_description: TextPair {
                source: source.meta_description.as_deref().and_then(non_empty),
                target: target.meta_description.as_deref().and_then(non_empty),
            },
            meta_keywords: TextPair {
                source: source.meta_keywords.as_deref().and_then(non_empty),
                target: target.meta_keywords.as_deref().and_then(non_empty),
            },
            headings,
            paragraphs: pair_by_index(&source.paragraphs, &target.paragraphs, MAX_PARAGRAPHS),
            buttons: pair_by_index(&source.buttons, &target.buttons, MAX_BUTTONS),
            links: pair_by_index(
                &source.links.iter().map(|l| l.text.clone()).collect::<Vec<_>>(),
                &target.links.iter().map(|l| l.text.clone()).collect::<Vec<_>>(),
                MAX_LINKS,
            ),
            images: pair_images(source, target),
        }
    }

    /// standalone / proficiency 模式：跳过对齐，只填目标侧
    pub fn target_only(&self, target: &ScrapedContent) -> ContentPairs {
        let empty = ScrapedContent {
            url: String::new(),
            title: String::new(),
            meta_description: None,
            meta_keywords: None,
            headings: Vec::new(),
            paragraphs: Vec::new(),
            links: Vec::new(),
            buttons: Vec::new(),
            forms: Vec::new(),
            images: Vec::new(),
            detected_language: None,
            raw_text: String::new(),
        };
        self.align(&empty, target)
    }
}

impl Default for AlignService {
    fn default() -> Self {
        Self::new()
    }
}

/// 空字符串视为缺失
fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn pair_by_index(source: &[String], target: &[String], cap: usize) -> Vec<IndexedPair> {
    let count = source.len().max(target.len()).min(cap);
    (0..count)
        .map(|i| IndexedPair {
            index: i,
            source: source.get(i).and_then(|s| non_empty(s)),
            target: target.get(i).and_then(|s| non_empty(s)),
        })
        .collect()
}

fn pair_images(source: &ScrapedContent, target: &ScrapedContent) -> Vec<ImagePair> {
    let count = source.images.len().max(target.images.len()).min(MAX_IMAGES);
    (0..count)
        .map(|i| {
            let src_img = source.images.get(i);
            let tgt_img = target.images.get(i);
            ImagePair {
                index: i,
                src: src_img
                    .map(|im| im.src.as_str())
                    .or(tgt_img.map(|im| im.src.as_str()))
                    .and_then(non_empty),
                source_alt: src_img.and_then(|im| non_empty(&im.alt)),
                target_alt: tgt_img.and_then(|im| non_empty(&im.alt)),
            }
        })
        .collect()
}
