//! 内核配置

use serde::{Deserialize, Serialize};

/// 内核数值参数
///
/// 所有字段都有默认值，JSON 中可只给出需要覆盖的部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 两个交点视为同一位置的距离阈值
    pub intersection_tolerance: f64,

    /// 退化判定阈值（零长度法向、重合焦点等）
    pub degeneracy_epsilon: f64,

    /// 数值求交时每段参数区间的细分数
    pub subdivisions: usize,

    /// 二分法迭代次数
    pub bisection_iterations: usize,

    /// 牛顿修正迭代次数（0 表示关闭）
    pub newton_iterations: usize,

    /// 操作码中浮点数的小数位数
    pub opcode_precision: usize,

    /// 参数曲线参与的曲线对的固定槽位数
    pub parametric_slots: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            intersection_tolerance: 1e-7,
            degeneracy_epsilon: 1e-10,
            subdivisions: 256,
            bisection_iterations: 60,
            newton_iterations: 8,
            opcode_precision: 10,
            parametric_slots: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: KernelConfig = serde_json::from_str(r#"{ "subdivisions": 64 }"#).unwrap();
        assert_eq!(config.subdivisions, 64);
        assert_eq!(config.opcode_precision, 10);
        assert_eq!(config.intersection_tolerance, 1e-7);
    }
}
