//! 存储能力边界
//!
//! 真实数据库属于被排除的协作方，流水线只依赖这里定义的两个 trait。
//! 约定：`persist` 一次覆盖整条记录，状态与阶段产物在同一次写入中落盘，
//! 轮询端看到的永远是某个完整阶段结束后的快照，不会有半成品。

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::audit::Audit;
use crate::models::glossary::Glossary;

pub use memory::{MemoryAuditStore, MemoryGlossaryStore};

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 审计记录不存在（已删除或从未创建）
    #[error("审计记录不存在: {0}")]
    NotFound(Uuid),
    /// 术语表不存在
    #[error("术语表不存在: {0}")]
    GlossaryNotFound(Uuid),
    /// 记录已存在
    #[error("审计记录已存在: {0}")]
    AlreadyExists(Uuid),
}

/// 审计记录存储
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// 插入新记录（id 冲突报错）
    async fn insert(&self, audit: Audit) -> Result<(), StoreError>;

    /// 按 id 读取
    async fn get(&self, id: Uuid) -> Result<Audit, StoreError>;

    /// 原子覆盖整条记录；记录已删除时返回 NotFound（协作取消点）
    async fn persist(&self, audit: &Audit) -> Result<(), StoreError>;

    /// 删除记录及其全部归属数据（维度结果、内容对、快照都在记录内，随之删除）
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// 按归属者分页列出，按创建时间倒序；返回 (记录, 总数)
    async fn list(
        &self,
        owner_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Audit>, usize), StoreError>;
}

/// 术语表存储
#[async_trait]
pub trait GlossaryStore: Send + Sync {
    async fn insert(&self, glossary: Glossary) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Glossary, StoreError>;

    /// 查找匹配行业 + 语言对的系统术语表
    async fn find_system(
        &self,
        industry: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<Glossary>, StoreError>;
}
