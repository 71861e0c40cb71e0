//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是审计状态机的"指挥中心"，负责生命周期、并发与持久化。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::AuditManager (状态机 + 单写者锁 + 持久化)
//!     ↓
//! workflow::AuditFlow (单个审计的阶段执行)
//!     ↓
//! services (能力层：fetch / align / glossary / judge / score)
//!     ↓
//! infrastructure (基础设施：PageCapture)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一写者**：一个审计 id 同一时刻只有一个推进者
//! 2. **阶段原子性**：每次状态流转连同阶段产物一次写入
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **轮询友好**：进度只通过持久化记录暴露，编排器不感知轮询节奏

pub mod audit_manager;

pub use audit_manager::AuditManager;
