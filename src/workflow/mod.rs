//! 流程层
//!
//! 定义"一个审计"的完整处理流程；状态流转与持久化在编排层。

pub mod audit_ctx;
pub mod audit_flow;

pub use audit_ctx::AuditCtx;
pub use audit_flow::{AcquireOutcome, AuditFlow, Evidence};
