use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use localization_audit::models::{AcquisitionMode, AuditKind, AuditRequest, AuditStatus};
use localization_audit::utils::logging;
use localization_audit::{
    seed_system_glossaries, AuditManager, Config, FetchService, LlmJudge, MemoryAuditStore,
    MemoryGlossaryStore, PageCapture,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    logging::log_startup(config.max_concurrent_audits, &config.llm_model_name);

    // 从环境变量读取本次审计请求
    let target_url = match std::env::var("AUDIT_TARGET_URL") {
        Ok(url) => url,
        Err(_) => {
            warn!("⚠️ 未设置 AUDIT_TARGET_URL，无事可做");
            warn!("用法: AUDIT_TARGET_URL=<翻译页> [AUDIT_SOURCE_URL=<源页>] [AUDIT_SOURCE_LANG=en] [AUDIT_TARGET_LANG=ko] [AUDIT_INDUSTRY=ecommerce] cargo run");
            return Ok(());
        }
    };
    let source_url = std::env::var("AUDIT_SOURCE_URL").ok();
    let kind = if source_url.is_some() {
        AuditKind::Comparison
    } else {
        AuditKind::Standalone
    };

    let request = AuditRequest {
        owner_id: "cli".to_string(),
        kind,
        source_url,
        target_url: Some(target_url),
        images: Vec::new(),
        source_language: std::env::var("AUDIT_SOURCE_LANG").ok().or(Some("en".to_string())),
        target_language: std::env::var("AUDIT_TARGET_LANG").ok(),
        industry: std::env::var("AUDIT_INDUSTRY").ok(),
        glossary_id: None,
        acquisition: AcquisitionMode::Auto,
    };

    // 组装真实能力与内存存储
    let capture = Arc::new(PageCapture::new(&config));
    let fetcher = Arc::new(FetchService::new(&config, capture)?);
    let judge = Arc::new(LlmJudge::new(&config));
    let store = Arc::new(MemoryAuditStore::new());
    let glossary_store = Arc::new(MemoryGlossaryStore::new());
    seed_system_glossaries(glossary_store.as_ref()).await?;

    let manager = AuditManager::new(store, glossary_store, fetcher, judge, &config);

    // 受理并轮询（2 秒间隔，与真实客户端一致）
    let id = manager.submit(&request).await?;
    info!("📋 审计已受理: {}", id);

    loop {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let audit = manager.get(id).await?;
        info!(
            "⏳ 状态: {} | 进度 {}/{} {}",
            audit.status.as_str(),
            audit.progress.step,
            audit.progress.total,
            audit.progress.label
        );

        match audit.status {
            AuditStatus::Completed => {
                info!("{}", "=".repeat(60));
                info!("✅ 审计完成，总分: {}", audit.overall_score.unwrap_or(0));
                info!(
                    "📊 消耗: {} + {} tokens, ${:.4}, {} ms",
                    audit.usage.input_tokens,
                    audit.usage.output_tokens,
                    audit.usage.cost_usd,
                    audit.usage.duration_ms
                );
                info!("{}", "=".repeat(60));
                // 维度按分数升序，最差的先看
                for result in &audit.results {
                    info!(
                        "  {} {} 分，问题 {} 条，建议 {} 条",
                        result.dimension.tag(),
                        result.score,
                        result.findings.len(),
                        result.recommendations.len()
                    );
                }
                break;
            }
            AuditStatus::Failed => {
                error!(
                    "❌ 审计失败: {}",
                    audit.error_detail.as_deref().unwrap_or("(无错误详情)")
                );
                break;
            }
            AuditStatus::Blocked => {
                warn!(
                    "🚧 抓取被拦截: {}",
                    audit.blocked_reason.as_deref().unwrap_or("(未知原因)")
                );
                warn!("💡 可调用 retry() 重新抓取，或 proceed() 用快照降级分析；本次运行到此为止");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
