//! 页面截图器 - 基础设施层
//!
//! 持有唯一的 Browser 资源，只暴露"截取页面快照"的能力

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Browser;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::browser;
use crate::config::Config;
use crate::error::{AuditResult, BrowserError};

/// 页面截图器
///
/// 职责：
/// - 持有唯一的 Browser 资源（惰性建立连接）
/// - 暴露 capture_png() 能力
/// - 不认识 Audit / ContentPairs
/// - 不处理业务流程
pub struct PageCapture {
    debug_port: u16,
    chrome_executable: Option<String>,
    capture_timeout: Duration,
    browser: Mutex<Option<Browser>>,
}

impl PageCapture {
    /// 创建新的页面截图器（不立即连接浏览器）
    pub fn new(config: &Config) -> Self {
        Self {
            debug_port: config.browser_debug_port,
            chrome_executable: config.chrome_executable.clone(),
            capture_timeout: Duration::from_secs(config.fetch_timeout_secs),
            browser: Mutex::new(None),
        }
    }

    /// 导航到 URL 并截取整页 PNG 快照（base64 编码）
    pub async fn capture_png(&self, url: &str) -> AuditResult<String> {
        let mut guard = self.browser.lock().await;

        // 首次使用时建立浏览器连接
        if guard.is_none() {
            let browser = if self.debug_port > 0 {
                browser::connect_to_browser(self.debug_port)
                    .await
                    .map_err(|e| BrowserError::ConnectionFailed {
                        port: self.debug_port,
                        source: e.into(),
                    })?
            } else {
                browser::launch_headless_browser(self.chrome_executable.as_deref())
                    .await
                    .map_err(|e| BrowserError::LaunchFailed { source: e.into() })?
            };
            *guard = Some(browser);
        }

        let browser = match guard.as_ref() {
            Some(b) => b,
            None => unreachable!("浏览器连接已在上方建立"),
        };

        let captured = timeout(self.capture_timeout, capture_on(browser, url)).await;
        match captured {
            Ok(result) => result,
            Err(elapsed) => {
                // 连接可能已经处于坏状态，丢弃后下次重连
                *guard = None;
                Err(BrowserError::CaptureFailed {
                    source: Box::new(elapsed),
                }
                .into())
            }
        }
    }
}

/// 在给定浏览器上执行一次导航 + 截图
async fn capture_on(browser: &Browser, url: &str) -> AuditResult<String> {
    debug!("正在截取页面快照: {}", url);

    let page = browser.new_page("about:blank").await?;
    let result = async {
        page.goto(url).await.map_err(|e| BrowserError::NavigationFailed {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        // 等待动态内容渲染
        sleep(Duration::from_millis(800)).await;

        let bytes = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::CaptureFailed {
                source: Box::new(e),
            })?;

        debug!("快照截取完成: {} 字节", bytes.len());
        Ok(BASE64.encode(bytes))
    }
    .await;

    // 无论成败都关闭页面，避免标签页泄漏
    let _ = page.close().await;

    result
}
