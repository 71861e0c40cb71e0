//! 审计管理器 - 编排层
//!
//! ## 职责
//!
//! 本模块拥有审计的完整生命周期，是状态机的唯一推进者。
//!
//! ## 核心功能
//!
//! 1. **状态机推进**：`advance` 每次调用恰好完成一次阶段流转，
//!    崩溃后审计停留在最后一个完整阶段，而不是半成品
//! 2. **单写者纪律**：每个审计 id 一把异步锁，同一审计不允许并发推进
//! 3. **原子落盘**：新状态与该阶段产物在同一次 `persist` 写入
//! 4. **并发控制**：Semaphore 限制同时执行的审计数量
//! 5. **公开操作**：submit / get / list / retry / proceed / delete
//!
//! ## 状态机
//!
//! ```text
//! pending → scraping → analyzing → completed
//!              │            ↑  └──→ failed
//!              ↓            │
//!           blocked ──retry─┘（重新抓取）
//!              └────proceed──→ analyzing（快照降级分析）
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AuditError, AuditResult};
use crate::models::audit::{AcquisitionMode, Audit, AuditKind, AuditRequest, AuditStatus};
use crate::services::{score, ContentFetcher, DimensionEvaluator, GlossaryService, JudgeEngine};
use crate::store::{AuditStore, GlossaryStore};
use crate::workflow::{AcquireOutcome, AuditCtx, AuditFlow};

/// 审计管理器
pub struct AuditManager {
    store: Arc<dyn AuditStore>,
    flow: AuditFlow,
    /// 每个审计 id 一把锁，保证单写者
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    semaphore: Arc<Semaphore>,
}

impl AuditManager {
    /// 组装审计管理器
    pub fn new(
        store: Arc<dyn AuditStore>,
        glossary_store: Arc<dyn GlossaryStore>,
        fetcher: Arc<dyn ContentFetcher>,
        judge: Arc<dyn JudgeEngine>,
        config: &Config,
    ) -> Arc<Self> {
        let flow = AuditFlow::new(
            fetcher,
            GlossaryService::new(glossary_store),
            DimensionEvaluator::new(judge),
        );
        Arc::new(Self {
            store,
            flow,
            locks: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_audits.max(1))),
        })
    }

    // ========== 公开操作 ==========

    /// 创建审计记录（校验失败时不留下任何状态），不启动执行
    ///
    /// 测试与调试可以用 `advance` 手动逐阶段推进。
    pub async fn create(&self, request: &AuditRequest) -> AuditResult<Uuid> {
        request.validate()?;

        let audit = Audit::from_request(request);
        let id = audit.id;
        let ctx = AuditCtx::new(id, audit.kind);
        self.store.insert(audit).await?;

        info!("{} 📥 审计已受理，状态 pending", ctx);
        Ok(id)
    }

    /// 受理审计请求并在后台异步执行，立即返回 id
    pub async fn submit(self: &Arc<Self>, request: &AuditRequest) -> AuditResult<Uuid> {
        let id = self.create(request).await?;
        self.spawn_drive(id);
        Ok(id)
    }

    /// 读取审计快照（轮询端的唯一入口）
    pub async fn get(&self, id: Uuid) -> AuditResult<Audit> {
        Ok(self.store.get(id).await?)
    }

    /// 按归属者分页列出
    pub async fn list(
        &self,
        owner_id: &str,
        offset: usize,
        limit: usize,
    ) -> AuditResult<(Vec<Audit>, usize)> {
        Ok(self.store.list(owner_id, offset, limit).await?)
    }

    /// 删除审计及其全部归属数据
    ///
    /// 任何状态都可删除；流水线执行中时在下一个阶段边界协作停止。
    /// 已删除的 id 再次删除报 NotFound（调用方可视为成功）。
    pub async fn delete(&self, id: Uuid) -> AuditResult<()> {
        self.store.delete(id).await?;
        self.locks.lock().await.remove(&id);
        info!("🗑️ 审计 {} 已删除", id);
        Ok(())
    }

    /// 从 blocked 状态重新发起抓取
    ///
    /// 只在 blocked 状态下合法；再次被拦截会带着新的拦截原因留在 blocked。
    pub async fn retry(self: &Arc<Self>, id: Uuid) -> AuditResult<()> {
        {
            let lock = self.lock_for(id).await;
            let _guard = lock.lock().await;

            let mut audit = self.store.get(id).await?;
            if audit.status != AuditStatus::Blocked {
                return Err(AuditError::InvalidTransition {
                    status: audit.status,
                    operation: "retry",
                });
            }

            audit.status = AuditStatus::Scraping;
            audit.blocked_reason = None;
            audit.set_progress(1, "正在重新抓取");
            self.store.persist(&audit).await?;
            info!("[审计 {}] 🔁 重新进入抓取阶段", short(id));
        }
        self.spawn_drive(id);
        Ok(())
    }

    /// 从 blocked 状态强行进入分析
    ///
    /// 用已截获的快照作为唯一证据，显式降级置信度而不是放弃。
    pub async fn proceed(self: &Arc<Self>, id: Uuid) -> AuditResult<()> {
        {
            let lock = self.lock_for(id).await;
            let _guard = lock.lock().await;

            let mut audit = self.store.get(id).await?;
            if audit.status != AuditStatus::Blocked {
                return Err(AuditError::InvalidTransition {
                    status: audit.status,
                    operation: "proceed",
                });
            }

            if audit.target_snapshot.is_none() && audit.source_snapshot.is_none() {
                warn!("[审计 {}] ⚠️ 没有快照证据，降级分析的置信度会很低", short(id));
            }
            audit.status = AuditStatus::Analyzing;
            audit.actual_acquisition = Some(AcquisitionMode::Screenshot);
            // 拦截原因保留在记录上，作为降级分析的可追溯依据
            self.store.persist(&audit).await?;
            info!("[审计 {}] ⏭️ 使用快照证据降级进入分析阶段", short(id));
        }
        self.spawn_drive(id);
        Ok(())
    }

    // ========== 状态机推进 ==========

    /// 推进一个阶段
    ///
    /// 每次调用恰好完成一次阶段流转（pending→scraping、scraping→analyzing/
    /// blocked/failed、analyzing→completed/failed），并把新状态与阶段产物
    /// 原子落盘。终态与 blocked 状态下调用是无副作用的空操作。
    pub async fn advance(&self, id: Uuid) -> AuditResult<AuditStatus> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let audit = self.store.get(id).await?;
        let ctx = AuditCtx::new(audit.id, audit.kind);

        match audit.status {
            AuditStatus::Pending => self.run_initializing(audit, &ctx).await,
            AuditStatus::Scraping => self.run_scraping(audit, &ctx).await,
            AuditStatus::Analyzing => self.run_analyzing(audit, &ctx).await,
            status => Ok(status),
        }
    }

    /// pending → scraping（检查点 1）
    async fn run_initializing(&self, mut audit: Audit, ctx: &AuditCtx) -> AuditResult<AuditStatus> {
        audit.set_progress(1, "正在初始化审计任务");
        audit.status = AuditStatus::Scraping;
        self.store.persist(&audit).await?;
        info!("{} 🚀 开始执行，进入抓取阶段", ctx);
        Ok(AuditStatus::Scraping)
    }

    /// scraping → analyzing | blocked | failed
    async fn run_scraping(&self, mut audit: Audit, ctx: &AuditCtx) -> AuditResult<AuditStatus> {
        match self.flow.acquire(&audit, ctx).await {
            Ok(AcquireOutcome::Ready(evidence)) => {
                audit.source_content = evidence.source_content;
                audit.target_content = evidence.target_content;
                audit.content_pairs = evidence.pairs;
                if evidence.source_snapshot.is_some() {
                    audit.source_snapshot = evidence.source_snapshot;
                }
                if evidence.target_snapshot.is_some() {
                    audit.target_snapshot = evidence.target_snapshot;
                }
                audit.actual_acquisition = Some(evidence.actual);

                // 页面声明的语言回填缺失的语言字段
                if audit.source_language.is_none() {
                    audit.source_language = audit
                        .source_content
                        .as_ref()
                        .and_then(|c| c.detected_language.clone());
                }
                if audit.target_language.is_none() {
                    audit.target_language = audit
                        .target_content
                        .as_ref()
                        .and_then(|c| c.detected_language.clone());
                }

                audit.status = AuditStatus::Analyzing;
                self.store.persist(&audit).await?;
                info!("{} ✓ 证据就绪，进入分析阶段", ctx);
                Ok(AuditStatus::Analyzing)
            }

            Ok(AcquireOutcome::Blocked { reason, snapshot }) => {
                warn!("{} 🚧 抓取被拦截: {}", ctx, reason);
                audit.blocked_reason = Some(reason);
                if snapshot.is_some() {
                    audit.target_snapshot = snapshot;
                }
                audit.status = AuditStatus::Blocked;
                self.store.persist(&audit).await?;
                info!("{} ⏸️ 等待用户 retry 或 proceed", ctx);
                Ok(AuditStatus::Blocked)
            }

            Err(e) => self.fail(audit, ctx, "内容抓取", e).await,
        }
    }

    /// analyzing → completed | failed（检查点 2/3/4 在本阶段内推进）
    async fn run_analyzing(&self, mut audit: Audit, ctx: &AuditCtx) -> AuditResult<AuditStatus> {
        // 检查点 2: 术语表解析
        audit.set_progress(2, "正在解析行业术语表");
        self.store.persist(&audit).await?;
        let glossary = match self.flow.resolve_glossary(&audit).await {
            Ok(glossary) => glossary,
            Err(e) => return self.fail(audit, ctx, "术语表解析", e).await,
        };

        // 检查点 3: 维度评审（标签区分对照 / 单页）
        let label = match audit.kind {
            AuditKind::Comparison => "正在对照评审 8 个质量维度",
            AuditKind::Standalone => "正在评估单页翻译质量（7 个维度）",
            AuditKind::Proficiency => "正在评估语言能力",
        };
        audit.set_progress(3, label);
        self.store.persist(&audit).await?;

        let (mut results, usage) = match self.flow.evaluate(&audit, glossary.as_ref(), ctx).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(audit, ctx, "维度评审", e).await,
        };

        // 检查点 4: 保存结果
        audit.set_progress(4, "正在保存审计结果");
        self.store.persist(&audit).await?;

        score::rank_ascending(&mut results);
        audit.overall_score = score::overall_score(&results);
        audit.results = results;
        audit.usage.absorb(&usage);
        audit.status = AuditStatus::Completed;
        audit.completed_at = Some(Utc::now());
        self.store.persist(&audit).await?;

        info!(
            "{} ✅ 审计完成: 总分 {}，消耗 {}+{} tokens，成本 ${:.4}",
            ctx,
            audit.overall_score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            audit.usage.input_tokens,
            audit.usage.output_tokens,
            audit.usage.cost_usd
        );
        Ok(AuditStatus::Completed)
    }

    /// 把阶段错误落为 failed 终态（错误信息带上失败的阶段名）
    async fn fail(
        &self,
        mut audit: Audit,
        ctx: &AuditCtx,
        stage: &str,
        err: AuditError,
    ) -> AuditResult<AuditStatus> {
        error!("{} ❌ {}阶段失败: {}", ctx, stage, err);
        audit.status = AuditStatus::Failed;
        audit.error_detail = Some(format!("{}阶段失败: {}", stage, err));
        self.store.persist(&audit).await?;
        Ok(AuditStatus::Failed)
    }

    // ========== 后台执行 ==========

    /// 在后台任务中把审计推进到 blocked 或终态
    pub fn spawn_drive(self: &Arc<Self>, id: Uuid) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.drive(id).await;
        });
    }

    async fn drive(self: Arc<Self>, id: Uuid) {
        // 并发上限：拿不到许可就排队
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        loop {
            match self.advance(id).await {
                Ok(status) if status.is_terminal() => break,
                Ok(AuditStatus::Blocked) => break,
                Ok(_) => continue,
                Err(e) if e.is_not_found() => {
                    info!("[审计 {}] 已被删除，停止执行", short(id));
                    break;
                }
                Err(e) => {
                    error!("[审计 {}] 推进失败: {}", short(id), e);
                    break;
                }
            }
        }
    }

    async fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// id 前 8 位，用于日志
fn short(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}
