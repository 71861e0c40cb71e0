//! 总分聚合 - 业务能力层
//!
//! 总分是全部已产出维度分数的算术平均（四舍五入），刻意不加权。
//! 报告顺序按分数升序排列，最差的维度排最前。

use crate::models::dimension::DimensionResult;

/// 计算总分（没有任何维度结果时为 None）
pub fn overall_score(results: &[DimensionResult]) -> Option<u8> {
    if results.is_empty() {
        return None;
    }
    let sum: u32 = results.iter().map(|r| r.score as u32).sum();
    let mean = sum as f64 / results.len() as f64;
    Some(mean.round() as u8)
}

/// 按分数升序排序（同分保持原有维度顺序）
pub fn rank_ascending(results: &mut [DimensionResult]) {
    results.sort_by_key(|r| r.score);
}
