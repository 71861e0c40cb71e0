//! 内容获取服务 - 业务能力层
//!
//! 只负责"取回一个页面的证据"能力，不关心审计流程。
//!
//! ## 获取方式
//! - `text`: reqwest 拉取 HTML + 结构化抽取；无可用内容算失败，不算拦截
//! - `screenshot`: 仅浏览器整页截图
//! - `combined`: 文本 + 截图
//! - `auto`: 先尝试文本；命中反爬特征（已知挑战页标题、挑战脚本标记、
//!   正文过短）时返回 blocked 结果并尽力附上快照
//!
//! 网络错误与非 2xx 响应在本层做有限次指数退避重试；重试耗尽后作为
//! `FetchError` 上抛，由编排器落为 failed 状态。

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AuditError, AuditResult, FetchError};
use crate::infrastructure::PageCapture;
use crate::models::audit::AcquisitionMode;
use crate::models::content::{FormTexts, Heading, PageImage, PageLink, ScrapedContent};
use crate::services::{ContentFetcher, FetchOutcome};

/// 桌面浏览器 UA，部分站点对默认 reqwest UA 直接 403
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 已知的反爬挑战页标题（精确匹配）
static CHALLENGE_TITLES: phf::Set<&'static str> = phf::phf_set! {
    "Just a moment...",
    "Attention Required! | Cloudflare",
    "Please Wait... | Cloudflare",
    "Access denied",
    "Access Denied",
    "Security Check",
    "One more step",
    "DDoS-Guard",
    "Verifying you are human",
    "请稍候…",
};

/// 挑战页标题关键词（小写包含匹配）
const CHALLENGE_TITLE_KEYWORDS: [&str; 6] = [
    "just a moment",
    "checking your browser",
    "verify you are human",
    "attention required",
    "access denied",
    "captcha",
];

/// 挑战脚本 / 验证组件的 HTML 标记
fn challenge_markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)cf-browser-verification|cf_chl_|challenge-platform|challenge-form|cf-turnstile|g-recaptcha|h-captcha|px-captcha|ddos-guard|_incapsula_",
        )
        .expect("挑战标记正则必定合法")
    })
}

fn script_style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
            .expect("script/style 正则必定合法")
    })
}

/// 一次 HTTP 抓取的原始结果
struct HttpPage {
    status: u16,
    body: String,
}

/// 内容获取服务
///
/// 职责：
/// - 文本路径走 reqwest + scraper 结构化抽取
/// - 视觉路径委托 PageCapture 截图
/// - 识别反爬拦截并给出人类可读原因
/// - 只处理单个 URL，不出现 Audit
pub struct FetchService {
    http: reqwest::Client,
    capture: Arc<PageCapture>,
    max_retries: u32,
    backoff_ms: u64,
    min_body_chars: usize,
}

impl FetchService {
    /// 创建新的内容获取服务
    pub fn new(config: &Config, capture: Arc<PageCapture>) -> AuditResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuditError::Other(format!("HTTP 客户端初始化失败: {}", e)))?;

        Ok(Self {
            http,
            capture,
            max_retries: config.fetch_max_retries.max(1),
            backoff_ms: config.fetch_backoff_ms,
            min_body_chars: config.min_body_chars,
        })
    }

    /// 拉取页面 HTML（有限次指数退避重试）
    ///
    /// 非 2xx 响应一般会重试，但携带挑战特征的响应直接返回，
    /// 交给上层判定是否进入 blocked。
    async fn fetch_html(&self, url: &str) -> Result<HttpPage, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            match self.http.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    match resp.text().await {
                        Ok(body) => {
                            if (200..300).contains(&status) {
                                return Ok(HttpPage { status, body });
                            }
                            if has_challenge_markers(&body) {
                                debug!("非 2xx 响应携带挑战特征: HTTP {} ({})", status, url);
                                return Ok(HttpPage { status, body });
                            }
                            last_error = format!("HTTP {}", status);
                        }
                        Err(e) => {
                            last_error = format!("读取响应体失败: {}", e);
                        }
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < self.max_retries {
                let backoff = self.backoff_ms.saturating_mul(1 << (attempt - 1));
                debug!(
                    "抓取失败（第 {}/{} 次）: {}，{}ms 后重试",
                    attempt, self.max_retries, last_error, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last_error,
        })
    }

    /// 尽力截取快照（失败只记日志，不中断拦截流程）
    async fn try_capture(&self, url: &str) -> Option<String> {
        match self.capture.capture_png(url).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("⚠️ 拦截证据快照截取失败 ({}): {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl ContentFetcher for FetchService {
    async fn fetch(&self, url: &str, mode: AcquisitionMode) -> AuditResult<FetchOutcome> {
        match mode {
            AcquisitionMode::Text => {
                let page = self.fetch_html(url).await?;
                let content = extract_content(url, &page.body);
                if !content.has_usable_text() {
                    // text 模式下抽取不到内容算失败，不算拦截
                    return Err(FetchError::EmptyContent {
                        url: url.to_string(),
                    }
                    .into());
                }
                Ok(FetchOutcome {
                    content: Some(content),
                    ..Default::default()
                })
            }

            AcquisitionMode::Screenshot => {
                let snapshot = self.capture.capture_png(url).await?;
                Ok(FetchOutcome {
                    snapshot: Some(snapshot),
                    ..Default::default()
                })
            }

            AcquisitionMode::Combined => {
                let page = self.fetch_html(url).await?;
                let content = extract_content(url, &page.body);
                let snapshot = self.capture.capture_png(url).await?;
                Ok(FetchOutcome {
                    content: content.has_usable_text().then_some(content),
                    snapshot: Some(snapshot),
                    blocked: None,
                })
            }

            AcquisitionMode::Auto => {
                let page = self.fetch_html(url).await?;
                let content = extract_content(url, &page.body);

                if let Some(reason) = detect_block(
                    page.status,
                    &content.title,
                    &content.raw_text,
                    &page.body,
                    self.min_body_chars,
                ) {
                    warn!("🚧 检测到反爬拦截 ({}): {}", url, reason);
                    let snapshot = self.try_capture(url).await;
                    return Ok(FetchOutcome {
                        content: None,
                        snapshot,
                        blocked: Some(reason),
                    });
                }

                Ok(FetchOutcome {
                    content: Some(content),
                    ..Default::default()
                })
            }

            AcquisitionMode::ImageUpload => Err(AuditError::Other(
                "image_upload 模式不经过抓取器".to_string(),
            )),
        }
    }
}

/// HTML 是否携带挑战特征（用于重试决策）
fn has_challenge_markers(html: &str) -> bool {
    if challenge_markup_regex().is_match(html) {
        return true;
    }
    if let Some(title) = quick_title(html) {
        return is_challenge_title(&title);
    }
    false
}

/// 反爬拦截启发式判定
///
/// 信号优先级：已知挑战标题 > 挑战脚本标记 > 正文过短。
/// 返回人类可读的拦截原因；None 表示页面正常。
pub(crate) fn detect_block(
    status: u16,
    title: &str,
    raw_text: &str,
    html: &str,
    min_body_chars: usize,
) -> Option<String> {
    let title = title.trim();
    if is_challenge_title(title) {
        return Some(format!("页面标题为已知反爬挑战页: \"{}\"", title));
    }

    if let Some(m) = challenge_markup_regex().find(html) {
        return Some(format!(
            "页面包含反爬验证组件标记 \"{}\" (HTTP {})",
            m.as_str(),
            status
        ));
    }

    let body_chars = raw_text.trim().chars().count();
    if body_chars < min_body_chars {
        return Some(format!(
            "正文仅 {} 字符（阈值 {}），疑似反爬拦截页 (HTTP {})",
            body_chars, min_body_chars, status
        ));
    }

    None
}

fn is_challenge_title(title: &str) -> bool {
    if CHALLENGE_TITLES.contains(title) {
        return true;
    }
    let lower = title.to_lowercase();
    CHALLENGE_TITLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// 从 HTML 快速提取 <title>（不做完整解析）
fn quick_title(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title 正则必定合法")
    });
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| squish(m.as_str()))
}

// ========== 结构化抽取 ==========

/// 解析一个静态选择器
fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("静态选择器必定合法")
}

/// 元素可见文本（压缩空白）
fn element_text(el: &ElementRef<'_>) -> String {
    squish(&el.text().collect::<Vec<_>>().join(" "))
}

fn squish(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(doc: &Html, name: &str) -> Option<String> {
    let by_name = sel(&format!(r#"meta[name="{}"]"#, name));
    let by_property = sel(&format!(r#"meta[property="og:{}"]"#, name));
    doc.select(&by_name)
        .chain(doc.select(&by_property))
        .filter_map(|el| el.value().attr("content"))
        .map(squish)
        .find(|s| !s.is_empty())
}

/// 从 HTML 中抽取结构化内容
///
/// 抽取面与评审需要的内容类一致：标题、meta、各级标题、段落、
/// 链接文案、按钮文案、表单文案、图片 alt、正文纯文本。
pub(crate) fn extract_content(url: &str, html: &str) -> ScrapedContent {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&sel("title"))
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    let detected_language = doc
        .select(&sel("html"))
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut headings = Vec::new();
    for level in 1..=6u8 {
        let heading_sel = sel(&format!("h{}", level));
        for el in doc.select(&heading_sel) {
            let text = element_text(&el);
            if !text.is_empty() {
                headings.push(Heading { level, text });
            }
        }
    }

    let paragraphs: Vec<String> = doc
        .select(&sel("p"))
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect();

    let links: Vec<PageLink> = doc
        .select(&sel("a"))
        .filter_map(|el| {
            let text = element_text(&el);
            if text.is_empty() {
                return None;
            }
            Some(PageLink {
                text,
                href: el.value().attr("href").unwrap_or_default().to_string(),
            })
        })
        .collect();

    let buttons: Vec<String> = doc
        .select(&sel(
            r#"button, input[type="submit"], input[type="button"]"#,
        ))
        .map(|el| {
            let text = element_text(&el);
            if text.is_empty() {
                el.value().attr("value").map(squish).unwrap_or_default()
            } else {
                text
            }
        })
        .filter(|t| !t.is_empty())
        .collect();

    let forms: Vec<FormTexts> = doc
        .select(&sel("form"))
        .map(|form| FormTexts {
            labels: form
                .select(&sel("label"))
                .map(|el| element_text(&el))
                .filter(|t| !t.is_empty())
                .collect(),
            placeholders: form
                .select(&sel("input, textarea"))
                .filter_map(|el| el.value().attr("placeholder"))
                .map(squish)
                .filter(|t| !t.is_empty())
                .collect(),
        })
        .collect();

    let images: Vec<PageImage> = doc
        .select(&sel("img"))
        .filter_map(|el| {
            let alt = el.value().attr("alt").map(squish).unwrap_or_default();
            let src = el.value().attr("src").unwrap_or_default().to_string();
            if alt.is_empty() && src.is_empty() {
                None
            } else {
                Some(PageImage { alt, src })
            }
        })
        .collect();

    // 正文纯文本：先剥掉 script/style 再取 body 文本
    let cleaned = script_style_regex().replace_all(html, " ");
    let cleaned_doc = Html::parse_document(&cleaned);
    let raw_text = cleaned_doc
        .select(&sel("body"))
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    ScrapedContent {
        url: url.to_string(),
        title,
        meta_description: meta_content(&doc, "description"),
        meta_keywords: meta_content(&doc, "keywords"),
        headings,
        paragraphs,
        links,
        buttons,
        forms,
        images,
        detected_language,
        raw_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <html lang="ko">
          <head>
            <title>  테스트  상점  </title>
            <meta name="description" content="최고의 온라인 상점">
            <meta name="keywords" content="쇼핑, 할인">
          </head>
          <body>
            <h1>환영합니다</h1>
            <h2>오늘의 특가</h2>
            <p>모든 상품 무료 배송.</p>
            <p>지금 가입하면 10% 할인.</p>
            <a href="/cart">장바구니 보기</a>
            <button>구매하기</button>
            <form>
              <label>이메일</label>
              <input type="text" placeholder="이메일 입력">
              <input type="submit" value="가입">
            </form>
            <img src="/banner.png" alt="프로모션 배너">
            <script>var tracking = "ignore me";</script>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_content_structure() {
        let content = extract_content("https://example.com/ko", SAMPLE_HTML);

        assert_eq!(content.title, "테스트 상점");
        assert_eq!(content.meta_description.as_deref(), Some("최고의 온라인 상점"));
        assert_eq!(content.meta_keywords.as_deref(), Some("쇼핑, 할인"));
        assert_eq!(content.detected_language.as_deref(), Some("ko"));
        assert_eq!(content.headings.len(), 2);
        assert_eq!(content.headings[0].level, 1);
        assert_eq!(content.headings[0].text, "환영합니다");
        assert_eq!(content.paragraphs.len(), 2);
        assert_eq!(content.links.len(), 1);
        assert_eq!(content.links[0].href, "/cart");
        // button 元素 + submit input 的 value
        assert_eq!(content.buttons, vec!["구매하기", "가입"]);
        assert_eq!(content.forms.len(), 1);
        assert_eq!(content.forms[0].labels, vec!["이메일"]);
        assert_eq!(content.forms[0].placeholders, vec!["이메일 입력"]);
        assert_eq!(content.images.len(), 1);
        assert!(content.has_usable_text());
        // script 内容不进入正文
        assert!(!content.raw_text.contains("ignore me"));
        assert!(content.raw_text.contains("환영합니다"));
    }

    #[test]
    fn test_detect_block_by_known_title() {
        let reason = detect_block(503, "Just a moment...", "long enough body text", "<html></html>", 5);
        assert!(reason.is_some());
        assert!(reason.unwrap().contains("Just a moment..."));
    }

    #[test]
    fn test_detect_block_by_markup() {
        let html = r#"<html><body><div class="g-recaptcha" data-sitekey="x"></div>
                      plenty of body text here to avoid the short-body signal,
                      repeated repeated repeated repeated repeated repeated</body></html>"#;
        let reason = detect_block(200, "Welcome", &"x".repeat(300), html, 200);
        assert!(reason.is_some());
        assert!(reason.unwrap().contains("g-recaptcha"));
    }

    #[test]
    fn test_detect_block_by_short_body() {
        let reason = detect_block(200, "Shop", "tiny", "<html><body>tiny</body></html>", 200);
        let reason = reason.expect("短正文应当触发拦截判定");
        assert!(reason.contains("疑似反爬拦截页"));
    }

    #[test]
    fn test_detect_block_passes_normal_page() {
        let body = "정상적인 페이지 본문입니다. ".repeat(30);
        let reason = detect_block(200, "테스트 상점", &body, "<html><body></body></html>", 200);
        assert!(reason.is_none());
    }

    #[test]
    fn test_has_challenge_markers() {
        assert!(has_challenge_markers(
            "<html><head><title>Just a moment...</title></head></html>"
        ));
        assert!(has_challenge_markers(r#"<div id="cf-turnstile"></div>"#));
        assert!(!has_challenge_markers("<html><title>Shop</title></html>"));
    }
}
