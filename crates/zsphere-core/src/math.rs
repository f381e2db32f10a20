//! 球面数学工具
//!
//! 内核中的所有几何向量都位于单位球面上。这里集中放置：
//! - 带退化检测的归一化
//! - 球面距离、对径点、垂直向量
//! - 大圆投影与旋转
//! - 固定精度的向量文本格式（用于操作码）

use nalgebra::{Rotation3, Unit};

/// 三维向量（单位球面上的点或大圆法向）
pub type Vector3 = nalgebra::Vector3<f64>;

/// 通用浮点容差
pub const EPSILON: f64 = 1e-10;

/// 归一化向量，长度小于 `epsilon` 时视为退化
pub fn normalize(v: &Vector3, epsilon: f64) -> Option<Vector3> {
    let length = v.norm();
    if length < epsilon || !length.is_finite() {
        None
    } else {
        Some(v / length)
    }
}

/// 两个单位向量之间的球面距离（弧度，范围 [0, π]）
///
/// 使用 atan2 形式，在接近 0 与 π 时都保持精度
pub fn arc_distance(a: &Vector3, b: &Vector3) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// 两点是否在容差内重合
pub fn coincident(a: &Vector3, b: &Vector3, tolerance: f64) -> bool {
    (a - b).norm() < tolerance
}

/// 两点是否互为对径点
pub fn antipodal(a: &Vector3, b: &Vector3, tolerance: f64) -> bool {
    (a + b).norm() < tolerance
}

/// 任取一个与 `v` 垂直的单位向量
pub fn perpendicular(v: &Vector3) -> Vector3 {
    let axis = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&axis).normalize()
}

/// 从 `from` 出发沿切向 `tangent` 走过 `angle` 弧度
///
/// `tangent` 必须是与 `from` 垂直的单位向量
pub fn walk(from: &Vector3, tangent: &Vector3, angle: f64) -> Vector3 {
    from * angle.cos() + tangent * angle.sin()
}

/// 绕 `axis` 旋转 `angle` 弧度
pub fn rotate_about(v: &Vector3, axis: &Vector3, angle: f64) -> Vector3 {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle) * v
}

/// 关于以 `normal` 为法向的大圆做镜像
pub fn reflect_across(v: &Vector3, normal: &Vector3) -> Vector3 {
    v - normal * (2.0 * v.dot(normal))
}

/// 把点投影到以 `normal` 为法向的大圆上
///
/// 点恰为该大圆的极点时投影不唯一，返回 None
pub fn project_to_great_circle(p: &Vector3, normal: &Vector3, epsilon: f64) -> Option<Vector3> {
    normalize(&(p - normal * p.dot(normal)), epsilon)
}

/// 点 `p` 是否位于从 `start` 到 `end` 的劣弧上（`p` 已知在该大圆上）
pub fn on_minor_arc(p: &Vector3, start: &Vector3, end: &Vector3, tolerance: f64) -> bool {
    let total = arc_distance(start, end);
    let via = arc_distance(start, p) + arc_distance(p, end);
    (via - total).abs() < tolerance
}

/// 以固定小数位数格式化向量：`x,y,z`
pub fn format_vector(v: &Vector3, precision: usize) -> String {
    format!(
        "{:.*},{:.*},{:.*}",
        precision, v.x, precision, v.y, precision, v.z
    )
}

/// 以固定小数位数格式化标量
pub fn format_scalar(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// 解析 `x,y,z` 形式的向量
pub fn parse_vector(text: &str) -> Option<Vector3> {
    let mut parts = text.split(',').map(|s| s.trim().parse::<f64>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Vector3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_arc_distance() {
        let a = Vector3::x();
        let b = Vector3::y();
        assert_relative_eq!(arc_distance(&a, &b), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(arc_distance(&a, &-a), std::f64::consts::PI, epsilon = 1e-12);
        assert_relative_eq!(arc_distance(&a, &a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_degenerate() {
        assert!(normalize(&Vector3::zeros(), EPSILON).is_none());
        let n = normalize(&Vector3::new(3.0, 0.0, 4.0), EPSILON).unwrap();
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_minor_arc() {
        let start = Vector3::x();
        let end = Vector3::y();
        let mid = Vector3::new(1.0, 1.0, 0.0).normalize();
        assert!(on_minor_arc(&mid, &start, &end, 1e-9));
        assert!(!on_minor_arc(&-mid, &start, &end, 1e-9));
    }

    #[test]
    fn test_vector_text_roundtrip() {
        let v = Vector3::new(0.123456789012, -0.5, 1e-13);
        let text = format_vector(&v, 10);
        assert_eq!(text, "0.1234567890,-0.5000000000,0.0000000000");
        let parsed = parse_vector(&text).unwrap();
        assert_eq!(format_vector(&parsed, 10), text);
        assert!(parse_vector("1,2").is_none());
        assert!(parse_vector("1,2,3,4").is_none());
    }
}
