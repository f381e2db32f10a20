//! 数值求根
//!
//! 交点引擎用到的三种数值方法：
//! - 变号区间上的二分法
//! - 一维牛顿修正（数值导数，只接受使残差变小且不离开区间的步长）
//! - 两条参数曲线求交的高斯-牛顿迭代

use crate::config::KernelConfig;
use crate::math::Vector3;
use nalgebra::{Matrix2, Matrix3x2, Vector2};

/// 求解器参数
#[derive(Debug, Clone)]
pub struct SolverParams {
    /// 二分迭代次数
    pub bisection_iterations: usize,

    /// 牛顿/高斯-牛顿最大迭代次数
    pub max_iterations: usize,

    /// 收敛容差
    pub tolerance: f64,

    /// 数值导数步长
    pub gradient_step: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self::from_config(&KernelConfig::default())
    }
}

impl SolverParams {
    pub fn from_config(config: &KernelConfig) -> Self {
        Self {
            bisection_iterations: config.bisection_iterations,
            max_iterations: config.newton_iterations,
            tolerance: config.intersection_tolerance * 1e-3,
            gradient_step: 1e-7,
        }
    }
}

/// 在 `[lo, hi]` 上二分求 `f` 的变号点
///
/// 调用方保证 `f(lo)` 与 `f(hi)` 异号；`f` 在区间内求值失败时提前返回当前中点
pub fn bisect<F>(f: &F, mut lo: f64, mut hi: f64, iterations: usize) -> f64
where
    F: Fn(f64) -> Option<f64>,
{
    let Some(mut f_lo) = f(lo) else {
        return 0.5 * (lo + hi);
    };
    for _ in 0..iterations {
        let mid = 0.5 * (lo + hi);
        let Some(f_mid) = f(mid) else {
            return mid;
        };
        if f_mid == 0.0 {
            return mid;
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// 牛顿修正
pub fn newton_polish<F>(f: &F, t0: f64, lo: f64, hi: f64, params: &SolverParams) -> f64
where
    F: Fn(f64) -> Option<f64>,
{
    let mut t = t0;
    let Some(mut residual) = f(t) else {
        return t0;
    };
    let h = params.gradient_step;

    for _ in 0..params.max_iterations {
        if residual.abs() < params.tolerance {
            break;
        }
        let (Some(forward), Some(backward)) = (f(t + h), f(t - h)) else {
            break;
        };
        let derivative = (forward - backward) / (2.0 * h);
        if derivative.abs() < f64::EPSILON {
            break;
        }
        let next = t - residual / derivative;
        if !(lo..=hi).contains(&next) {
            break;
        }
        match f(next) {
            Some(value) if value.abs() < residual.abs() => {
                t = next;
                residual = value;
            }
            _ => break,
        }
    }
    t
}

/// 高斯-牛顿迭代：最小化 `|a(s) - b(t)|²`
///
/// 返回收敛后的参数对；迭代离开定义域或雅可比矩阵奇异时返回 None
pub fn gauss_newton<A, B>(
    a: &A,
    b: &B,
    start: (f64, f64),
    bounds: ((f64, f64), (f64, f64)),
    params: &SolverParams,
) -> Option<(f64, f64)>
where
    A: Fn(f64) -> Option<Vector3>,
    B: Fn(f64) -> Option<Vector3>,
{
    let ((s_lo, s_hi), (t_lo, t_hi)) = bounds;
    let (mut s, mut t) = start;
    let h = params.gradient_step;
    let iterations = params.max_iterations.max(1) * 4;

    for _ in 0..iterations {
        let residual = a(s)? - b(t)?;
        if residual.norm() < params.tolerance {
            break;
        }
        let da = (a(s + h)? - a(s - h)?) / (2.0 * h);
        let db = (b(t + h)? - b(t - h)?) / (2.0 * h);
        let jacobian = Matrix3x2::from_columns(&[da, -db]);
        let normal: Matrix2<f64> = jacobian.transpose() * jacobian;
        let rhs: Vector2<f64> = jacobian.transpose() * residual;
        let step = normal.try_inverse()? * rhs;

        s = (s - step.x).clamp(s_lo, s_hi);
        t = (t - step.y).clamp(t_lo, t_hi);
    }
    Some((s, t))
}
