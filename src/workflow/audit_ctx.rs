//! 审计处理上下文
//!
//! 封装"我正在处理哪个审计"这一信息，主要用于日志前缀

use std::fmt::Display;

use uuid::Uuid;

use crate::models::audit::AuditKind;

/// 审计处理上下文
#[derive(Debug, Clone)]
pub struct AuditCtx {
    /// 审计 ID
    pub id: Uuid,

    /// 审计模式
    pub kind: AuditKind,
}

impl AuditCtx {
    /// 创建新的审计上下文
    pub fn new(id: Uuid, kind: AuditKind) -> Self {
        Self { id, kind }
    }

    /// ID 前 8 位，用于日志显示
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

impl Display for AuditCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[审计 {} {}]", self.short_id(), self.kind.as_str())
    }
}
