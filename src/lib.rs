//! # Localization Audit
//!
//! 本地化网页质量审计流水线：对照源语言页面审计翻译页面（或在
//! standalone 模式下单独评估一个页面的翻译质量），产出多维度结构化
//! 质量报告。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser），只暴露能力
//! - `PageCapture` - 唯一的浏览器 owner，提供整页截图能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个审计
//! - `FetchService` - 页面抓取 / 拦截识别能力
//! - `AlignService` - 源/目标内容对齐能力
//! - `GlossaryService` - 术语表解析能力
//! - `LlmJudge` + `DimensionEvaluator` - 维度评审能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个审计"的完整处理流程
//! - `AuditCtx` - 上下文封装（审计 id + 模式）
//! - `AuditFlow` - 阶段执行（acquire → glossary → evaluate）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/AuditManager` - 状态机推进、单写者锁、原子持久化、
//!   retry / proceed / delete 等公开操作
//!
//! ## 状态机
//!
//! pending → scraping → (blocked?) → analyzing → completed | failed

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AuditError, AuditResult};
pub use infrastructure::PageCapture;
pub use models::{Audit, AuditRequest, AuditStatus, Dimension};
pub use orchestrator::AuditManager;
pub use services::{seed_system_glossaries, FetchService, LlmJudge};
pub use store::{MemoryAuditStore, MemoryGlossaryStore};
