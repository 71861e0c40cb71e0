//! 审计流水线集成测试
//!
//! 用脚本化的桩抓取器 / 桩评审器驱动真实的状态机与存储，验证
//! 状态流转、维度数量、总分聚合与 blocked 恢复路径。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use localization_audit::error::{AuditError, AuditResult, FetchError};
use localization_audit::models::{
    AcquisitionMode, Audit, AuditKind, AuditRequest, AuditStatus, Dimension, Finding, GoodExample,
    ImageLabel, LabeledImage, ScrapedContent, Severity, UsageMetrics,
};
use localization_audit::services::{
    seed_system_glossaries, ContentFetcher, FetchOutcome, JudgeContext, JudgeEngine, JudgeVerdict,
};
use localization_audit::store::{MemoryAuditStore, MemoryGlossaryStore};
use localization_audit::{AuditManager, Config};
use tokio::sync::Mutex;

const SOURCE_URL: &str = "https://example.com/en";
const TARGET_URL: &str = "https://example.com/ko";
const FAKE_SNAPSHOT: &str = "ZmFrZS1wbmctYnl0ZXM=";

// ========== 测试桩 ==========

#[derive(Clone)]
enum FetchScript {
    /// 正常返回文本内容
    Content { lang: &'static str },
    /// 命中反爬拦截
    Blocked { reason: &'static str },
    /// 抓取失败（文本模式无可用内容）
    Error,
}

/// 按 URL 脚本化出结果的桩抓取器
struct StubFetcher {
    scripts: Mutex<HashMap<String, VecDeque<FetchScript>>>,
    calls: Mutex<usize>,
}

impl StubFetcher {
    fn new(scripts: Vec<(&str, Vec<FetchScript>)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|(url, steps)| (url.to_string(), steps.into_iter().collect()))
                    .collect(),
            ),
            calls: Mutex::new(0),
        })
    }

    async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }
}

fn sample_content(url: &str, lang: &str) -> ScrapedContent {
    ScrapedContent {
        url: url.to_string(),
        title: format!("title-{}", lang),
        meta_description: Some(format!("desc-{}", lang)),
        meta_keywords: None,
        headings: vec![localization_audit::models::Heading {
            level: 1,
            text: format!("heading-{}", lang),
        }],
        paragraphs: vec![format!("paragraph-{}", lang)],
        links: Vec::new(),
        buttons: vec![format!("button-{}", lang)],
        forms: Vec::new(),
        images: Vec::new(),
        detected_language: Some(lang.to_string()),
        raw_text: format!("body text {}", lang),
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _mode: AcquisitionMode) -> AuditResult<FetchOutcome> {
        *self.calls.lock().await += 1;

        let mut scripts = self.scripts.lock().await;
        let steps = scripts
            .get_mut(url)
            .ok_or_else(|| AuditError::Other(format!("测试桩未配置 URL: {}", url)))?;
        // 最后一个脚本步骤重复生效，之前的步骤按序消耗
        let step = if steps.len() > 1 {
            steps.pop_front().expect("脚本非空")
        } else {
            steps
                .front()
                .cloned()
                .ok_or_else(|| AuditError::Other(format!("测试桩脚本耗尽: {}", url)))?
        };

        match step {
            FetchScript::Content { lang } => Ok(FetchOutcome {
                content: Some(sample_content(url, lang)),
                snapshot: None,
                blocked: None,
            }),
            FetchScript::Blocked { reason } => Ok(FetchOutcome {
                content: None,
                snapshot: Some(FAKE_SNAPSHOT.to_string()),
                blocked: Some(reason.to_string()),
            }),
            FetchScript::Error => Err(FetchError::EmptyContent {
                url: url.to_string(),
            }
            .into()),
        }
    }
}

/// 按维度脚本化出分数的桩评审器（默认每个维度 80 分）
struct StubJudge {
    score_scripts: Mutex<HashMap<&'static str, VecDeque<i64>>>,
    judged_dimensions: Mutex<Vec<&'static str>>,
}

impl StubJudge {
    fn uniform() -> Arc<Self> {
        Self::with_scores(Vec::new())
    }

    fn with_scores(overrides: Vec<(&'static str, Vec<i64>)>) -> Arc<Self> {
        Arc::new(Self {
            score_scripts: Mutex::new(
                overrides
                    .into_iter()
                    .map(|(tag, scores)| (tag, scores.into_iter().collect()))
                    .collect(),
            ),
            judged_dimensions: Mutex::new(Vec::new()),
        })
    }

    async fn judged(&self) -> Vec<&'static str> {
        self.judged_dimensions.lock().await.clone()
    }
}

#[async_trait]
impl JudgeEngine for StubJudge {
    async fn judge(
        &self,
        dimension: Dimension,
        ctx: &JudgeContext<'_>,
    ) -> AuditResult<JudgeVerdict> {
        self.judged_dimensions.lock().await.push(dimension.tag());

        let score = {
            let mut scripts = self.score_scripts.lock().await;
            match scripts.get_mut(dimension.tag()) {
                Some(steps) if steps.len() > 1 => steps.pop_front().unwrap_or(80),
                Some(steps) => steps.front().copied().unwrap_or(80),
                None => 80,
            }
        };

        let finding = match ctx.kind {
            AuditKind::Comparison => Finding::Comparison {
                issue: "术语不一致".to_string(),
                original: Some("Checkout".to_string()),
                localized: Some("체크아웃".to_string()),
                suggestion: Some("결제하기".to_string()),
                severity: Severity::Medium,
            },
            _ => Finding::Standalone {
                issue: "直译痕迹".to_string(),
                text: Some("당신의 쇼핑을 즐기세요".to_string()),
                suggestion: Some("즐거운 쇼핑 되세요".to_string()),
                severity: Severity::Low,
            },
        };

        Ok(JudgeVerdict {
            score,
            findings: vec![finding],
            good_examples: vec![GoodExample {
                description: "自然的按钮文案".to_string(),
                original: None,
                localized: None,
                text: Some("장바구니에 담기".to_string()),
            }],
            recommendations: vec!["统一使用术语表译法".to_string()],
            usage: UsageMetrics {
                input_tokens: 100,
                output_tokens: 50,
                cost_usd: 0.001,
                duration_ms: 5,
            },
        })
    }
}

// ========== 组装辅助 ==========

async fn build_manager(
    fetcher: Arc<dyn ContentFetcher>,
    judge: Arc<dyn JudgeEngine>,
) -> Arc<AuditManager> {
    let store = Arc::new(MemoryAuditStore::new());
    let glossary_store = Arc::new(MemoryGlossaryStore::new());
    seed_system_glossaries(glossary_store.as_ref())
        .await
        .expect("播种术语表失败");
    AuditManager::new(store, glossary_store, fetcher, judge, &Config::default())
}

fn comparison_request() -> AuditRequest {
    AuditRequest {
        owner_id: "tester".to_string(),
        kind: AuditKind::Comparison,
        source_url: Some(SOURCE_URL.to_string()),
        target_url: Some(TARGET_URL.to_string()),
        images: Vec::new(),
        source_language: Some("en".to_string()),
        target_language: Some("ko".to_string()),
        industry: Some("ecommerce".to_string()),
        glossary_id: None,
        acquisition: AcquisitionMode::Text,
    }
}

fn standalone_request() -> AuditRequest {
    AuditRequest {
        kind: AuditKind::Standalone,
        source_url: None,
        acquisition: AcquisitionMode::Auto,
        ..comparison_request()
    }
}

/// 手动推进到 blocked 或终态（每次 advance 恰好一个阶段流转）
async fn run_to_settled(manager: &AuditManager, id: uuid::Uuid) -> Audit {
    for _ in 0..10 {
        let status = manager.advance(id).await.expect("推进失败");
        if status.is_terminal() || status == AuditStatus::Blocked {
            break;
        }
    }
    manager.get(id).await.expect("读取审计失败")
}

/// 轮询等待谓词成立（后台执行路径用）
async fn wait_for<F>(manager: &AuditManager, id: uuid::Uuid, predicate: F) -> Audit
where
    F: Fn(&Audit) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let audit = manager.get(id).await.expect("读取审计失败");
        if predicate(&audit) {
            return audit;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "等待超时，当前状态: {}",
            audit.status.as_str()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ========== 测试 ==========

#[tokio::test]
async fn test_comparison_text_pipeline_happy_path() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    let judge = StubJudge::with_scores(vec![("CORRECTNESS", vec![90]), ("FLUENCY", vec![70])]);
    let manager = build_manager(fetcher.clone(), judge.clone()).await;

    let id = manager.create(&comparison_request()).await.unwrap();
    assert_eq!(manager.get(id).await.unwrap().status, AuditStatus::Pending);

    // pending → scraping → analyzing → completed，每步可观察
    assert_eq!(manager.advance(id).await.unwrap(), AuditStatus::Scraping);
    assert_eq!(manager.advance(id).await.unwrap(), AuditStatus::Analyzing);

    let mid = manager.get(id).await.unwrap();
    assert!(mid.content_pairs.is_some(), "分析阶段前内容对已就绪");
    assert_eq!(
        mid.content_pairs.as_ref().unwrap().title.source.as_deref(),
        Some("title-en")
    );

    assert_eq!(manager.advance(id).await.unwrap(), AuditStatus::Completed);

    let audit = manager.get(id).await.unwrap();
    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.results.len(), 8, "comparison 模式 8 个维度");
    assert!(audit.completed_at.is_some());
    assert_eq!(audit.progress.step, 4);

    // 总分 = round(mean)：(90 + 70 + 80*6) / 8 = 81.25 → 81
    assert_eq!(audit.overall_score, Some(81));

    // 维度按分数升序，最差的排最前
    assert_eq!(audit.results[0].dimension, Dimension::Fluency);
    assert_eq!(audit.results[0].score, 70);

    // CONSISTENCY 在 comparison 模式下出现
    assert!(audit
        .results
        .iter()
        .any(|r| r.dimension == Dimension::Consistency));

    // comparison 模式的问题带源文/译文摘录
    match &audit.results[0].findings[0] {
        Finding::Comparison { original, .. } => {
            assert_eq!(original.as_deref(), Some("Checkout"));
        }
        other => panic!("comparison 模式应产出 Comparison 问题: {:?}", other),
    }

    // 资源消耗跨 8 次评审调用累加
    assert_eq!(audit.usage.input_tokens, 800);
    assert_eq!(audit.usage.output_tokens, 400);

    // 两个 URL 各抓取一次
    assert_eq!(fetcher.call_count().await, 2);
}

#[tokio::test]
async fn test_standalone_excludes_consistency() {
    let fetcher = StubFetcher::new(vec![(TARGET_URL, vec![FetchScript::Content { lang: "ko" }])]);
    let judge = StubJudge::uniform();
    let manager = build_manager(fetcher, judge.clone()).await;

    let id = manager.create(&standalone_request()).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.results.len(), 7, "standalone 模式 7 个维度");
    assert!(!audit
        .results
        .iter()
        .any(|r| r.dimension == Dimension::Consistency));
    assert!(!judge.judged().await.contains(&"CONSISTENCY"));

    // standalone 模式的问题只带 text 摘录
    match &audit.results[0].findings[0] {
        Finding::Standalone { text, .. } => assert!(text.is_some()),
        other => panic!("standalone 模式应产出 Standalone 问题: {:?}", other),
    }

    // 内容对只有目标侧
    let pairs = audit.content_pairs.expect("standalone 仍然有目标侧内容对");
    assert!(pairs.title.source.is_none());
    assert_eq!(pairs.title.target.as_deref(), Some("title-ko"));
}

#[tokio::test]
async fn test_proficiency_single_dimension() {
    let fetcher = StubFetcher::new(vec![(TARGET_URL, vec![FetchScript::Content { lang: "ko" }])]);
    let judge = StubJudge::with_scores(vec![("LANGUAGE_PROFICIENCY", vec![64])]);
    let manager = build_manager(fetcher, judge).await;

    let request = AuditRequest {
        kind: AuditKind::Proficiency,
        ..standalone_request()
    };
    let id = manager.create(&request).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.results.len(), 1);
    assert_eq!(audit.results[0].dimension, Dimension::LanguageProficiency);
    assert_eq!(audit.overall_score, Some(64));
}

#[tokio::test]
async fn test_auto_block_then_retry_then_proceed() {
    let fetcher = StubFetcher::new(vec![(
        TARGET_URL,
        vec![
            FetchScript::Blocked {
                reason: "已知挑战页标题: Just a moment...",
            },
            FetchScript::Blocked {
                reason: "页面包含 cf-turnstile 验证组件",
            },
        ],
    )]);
    let judge = StubJudge::uniform();
    let manager = build_manager(fetcher, judge).await;

    let id = manager.create(&standalone_request()).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    // 第一次抓取 → blocked，带原因与快照，没有进入 analyzing
    assert_eq!(audit.status, AuditStatus::Blocked);
    let reason = audit.blocked_reason.clone().expect("拦截原因非空");
    assert!(reason.contains("Just a moment"));
    assert_eq!(audit.target_snapshot.as_deref(), Some(FAKE_SNAPSHOT));
    assert!(audit.results.is_empty());

    // blocked 状态下 advance 是无副作用的空操作
    assert_eq!(manager.advance(id).await.unwrap(), AuditStatus::Blocked);
    assert_eq!(
        manager.get(id).await.unwrap().status,
        AuditStatus::Blocked
    );

    // retry：重新抓取，再次被拦截，带着新的拦截原因留在 blocked
    manager.retry(id).await.unwrap();
    let audit = wait_for(&manager, id, |a| {
        a.status == AuditStatus::Blocked
            && a.blocked_reason
                .as_deref()
                .map_or(false, |r| r.contains("cf-turnstile"))
    })
    .await;
    assert!(audit.blocked_reason.unwrap().contains("cf-turnstile"));

    // proceed：用快照证据降级分析，最终完成
    manager.proceed(id).await.unwrap();
    let audit = wait_for(&manager, id, |a| a.status.is_terminal()).await;
    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.results.len(), 7);
    assert_eq!(
        audit.actual_acquisition,
        Some(AcquisitionMode::Screenshot),
        "降级分析的证据形态是快照"
    );
}

#[tokio::test]
async fn test_retry_proceed_rejected_outside_blocked() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    let id = manager.create(&comparison_request()).await.unwrap();

    // pending 状态下 retry / proceed 被拒绝且无副作用
    assert!(matches!(
        manager.retry(id).await.unwrap_err(),
        AuditError::InvalidTransition { operation: "retry", .. }
    ));
    assert!(matches!(
        manager.proceed(id).await.unwrap_err(),
        AuditError::InvalidTransition { operation: "proceed", .. }
    ));
    assert_eq!(manager.get(id).await.unwrap().status, AuditStatus::Pending);

    // 终态同样拒绝
    let audit = run_to_settled(&manager, id).await;
    assert_eq!(audit.status, AuditStatus::Completed);
    assert!(manager.retry(id).await.is_err());
    assert_eq!(
        manager.get(id).await.unwrap().status,
        AuditStatus::Completed
    );
}

#[tokio::test]
async fn test_judgment_out_of_range_fails_naming_dimension() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    // FLUENCY 两次都越界 → 整个审计失败
    let judge = StubJudge::with_scores(vec![("FLUENCY", vec![150, 150])]);
    let manager = build_manager(fetcher, judge).await;

    let id = manager.create(&comparison_request()).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Failed);
    let detail = audit.error_detail.expect("failed 终态必须带错误详情");
    assert!(detail.contains("FLUENCY"), "错误应点名维度: {}", detail);
    assert!(detail.contains("维度评审"), "错误应带阶段名: {}", detail);
    assert!(audit.overall_score.is_none());
}

#[tokio::test]
async fn test_judgment_out_of_range_retried_once_recovers() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    // 第一次 150（越界），重试后 66
    let judge = StubJudge::with_scores(vec![("FLUENCY", vec![150, 66])]);
    let manager = build_manager(fetcher, judge).await;

    let id = manager.create(&comparison_request()).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    let fluency = audit
        .results
        .iter()
        .find(|r| r.dimension == Dimension::Fluency)
        .expect("FLUENCY 结果存在");
    assert_eq!(fluency.score, 66);
}

#[tokio::test]
async fn test_fetch_error_is_failed_not_blocked() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Error]),
    ]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    let mut request = comparison_request();
    request.acquisition = AcquisitionMode::Text;
    let id = manager.create(&request).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    // text 模式无可用内容 → failed（不是 blocked），错误带阶段名
    assert_eq!(audit.status, AuditStatus::Failed);
    let detail = audit.error_detail.expect("failed 终态必须带错误详情");
    assert!(detail.contains("内容抓取"), "错误应带阶段名: {}", detail);
    assert!(audit.blocked_reason.is_none());
}

#[tokio::test]
async fn test_delete_removes_audit_and_is_not_idempotent_silent() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    let id = manager.create(&comparison_request()).await.unwrap();
    let audit = run_to_settled(&manager, id).await;
    assert_eq!(audit.results.len(), 8);

    // 删除后读取与再次删除都报 NotFound（维度结果随记录一起消失，无孤儿）
    manager.delete(id).await.unwrap();
    assert!(manager.get(id).await.unwrap_err().is_not_found());
    assert!(manager.delete(id).await.unwrap_err().is_not_found());

    let (page, total) = manager.list("tester", 0, 10).await.unwrap();
    assert_eq!(total, 0);
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_validation_rejects_before_any_state() {
    let fetcher = StubFetcher::new(vec![]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    let mut request = comparison_request();
    request.source_url = None;
    let err = manager.create(&request).await.unwrap_err();
    assert!(matches!(err, AuditError::Validation(_)));

    // 校验失败不留下任何记录
    let (_, total) = manager.list("tester", 0, 10).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_image_upload_skips_fetch() {
    let fetcher = StubFetcher::new(vec![]);
    let manager = build_manager(fetcher.clone(), StubJudge::uniform()).await;

    let request = AuditRequest {
        owner_id: "tester".to_string(),
        kind: AuditKind::Comparison,
        source_url: None,
        target_url: None,
        images: vec![
            LabeledImage {
                label: ImageLabel::Source,
                data: "https://example.com/en.png".to_string(),
                name: Some("en.png".to_string()),
            },
            LabeledImage {
                label: ImageLabel::Target,
                data: "aXZib3Jed==".to_string(),
                name: Some("ko.png".to_string()),
            },
        ],
        source_language: Some("en".to_string()),
        target_language: Some("ko".to_string()),
        industry: None,
        glossary_id: None,
        acquisition: AcquisitionMode::ImageUpload,
    };

    let id = manager.create(&request).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.results.len(), 8);
    assert_eq!(
        audit.actual_acquisition,
        Some(AcquisitionMode::ImageUpload)
    );
    // 不发生任何抓取
    assert_eq!(fetcher.call_count().await, 0);
}

#[tokio::test]
async fn test_submit_runs_in_background_for_polling() {
    let fetcher = StubFetcher::new(vec![
        (SOURCE_URL, vec![FetchScript::Content { lang: "en" }]),
        (TARGET_URL, vec![FetchScript::Content { lang: "ko" }]),
    ]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    // submit 立即返回 pending 的 id，执行在后台完成
    let id = manager.submit(&comparison_request()).await.unwrap();
    let audit = wait_for(&manager, id, |a| a.status.is_terminal()).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.overall_score, Some(80));
}

#[tokio::test]
async fn test_language_backfill_from_detected() {
    let fetcher = StubFetcher::new(vec![(TARGET_URL, vec![FetchScript::Content { lang: "ko" }])]);
    let manager = build_manager(fetcher, StubJudge::uniform()).await;

    // standalone 请求不带目标语言，由页面 lang 属性回填
    let mut request = standalone_request();
    request.target_language = None;
    let id = manager.create(&request).await.unwrap();
    let audit = run_to_settled(&manager, id).await;

    assert_eq!(audit.status, AuditStatus::Completed);
    assert_eq!(audit.target_language.as_deref(), Some("ko"));
}
