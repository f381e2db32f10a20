//! 一维曲线视图
//!
//! [`Curve`] 是曲线节点在某一时刻的值拷贝，求交、投影与采样都只读取它，
//! 不需要再访问依赖图。
//!
//! 每种曲线提供：
//! - 参数化 `point_at(t)` 与定义域（闭曲线取 `[0, 2π]`）
//! - 隐函数 `implicit(p)`：曲线上为零，两侧异号（参数曲线没有隐函数）
//! - 最近点投影

use crate::config::KernelConfig;
use crate::expression::Expr;
use crate::geometry::ParametricNode;
use crate::math::{self, Vector3};
use crate::node::{Node, NodeKind};
use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

/// 一维曲线接口
pub trait OneDimensional {
    /// 是否是大圆的一部分（直线或线段）
    fn is_straight(&self) -> bool;

    /// 参数定义域
    fn domain(&self) -> (f64, f64);

    /// 定义域的分段边界（含两端点，升序），采样不会跨越这些点
    fn breakpoints(&self) -> Vec<f64> {
        let (lo, hi) = self.domain();
        vec![lo, hi]
    }

    /// 闭曲线的首尾参数对应同一点
    fn is_closed(&self) -> bool;

    /// 参数 `t` 处的点
    fn point_at(&self, t: f64) -> Option<Vector3>;

    /// 带符号隐函数
    fn implicit(&self, p: &Vector3) -> Option<f64>;

    /// 点是否在曲线上
    fn contains(&self, p: &Vector3, config: &KernelConfig) -> bool;

    /// 曲线上离 `p` 最近的点
    fn closest_point(&self, p: &Vector3, config: &KernelConfig) -> Option<Vector3>;
}

/// 参数曲线的值拷贝
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricCurve {
    pub exprs: [Expr; 3],
    pub bindings: BTreeMap<String, f64>,
    pub t_min: f64,
    pub t_max: f64,
    pub cusps: Vec<f64>,
    pub closed: bool,
}

impl ParametricCurve {
    fn evaluate(&self, t: f64) -> Option<Vector3> {
        let lookup = |name: &str| {
            if name == "t" {
                Some(t)
            } else {
                self.bindings.get(name).copied()
            }
        };
        let mut coords = [0.0; 3];
        for (coord, expr) in coords.iter_mut().zip(&self.exprs) {
            *coord = expr.evaluate(&lookup).ok()?;
        }
        let v = Vector3::new(coords[0], coords[1], coords[2]);
        math::normalize(&v, math::EPSILON)
    }
}

/// 曲线的几何值
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    /// 完整大圆
    Line { normal: Vector3 },
    /// 从 `start` 到 `end` 的劣弧
    Segment {
        start: Vector3,
        end: Vector3,
        normal: Vector3,
        arc_length: f64,
    },
    /// 球面圆
    Circle { center: Vector3, radius: f64 },
    /// 球面椭圆：`d(p, f1) + d(p, f2) = 2a`
    Ellipse {
        focus1: Vector3,
        focus2: Vector3,
        a: f64,
    },
    Parametric(ParametricCurve),
}

impl Curve {
    /// 从存在的曲线节点取值
    pub fn of(node: &Node) -> Option<Curve> {
        if !node.exists {
            return None;
        }
        match &node.kind {
            NodeKind::Line(line) => Some(Curve::Line { normal: line.normal }),
            NodeKind::Segment(segment) => Some(Curve::Segment {
                start: segment.start_vector,
                end: segment.end_vector,
                normal: segment.normal,
                arc_length: segment.arc_length,
            }),
            NodeKind::Circle(circle) => Some(Curve::Circle {
                center: circle.center_vector,
                radius: circle.radius,
            }),
            NodeKind::Ellipse(ellipse) => Some(Curve::Ellipse {
                focus1: ellipse.focus1_vector,
                focus2: ellipse.focus2_vector,
                a: ellipse.a,
            }),
            NodeKind::Parametric(parametric) => Some(Curve::from_parametric(parametric)),
            _ => None,
        }
    }

    pub fn from_parametric(parametric: &ParametricNode) -> Curve {
        Curve::Parametric(ParametricCurve {
            exprs: parametric.exprs.clone(),
            bindings: parametric.bindings.clone(),
            t_min: parametric.t_min,
            t_max: parametric.t_max,
            cusps: parametric.cusps.clone(),
            closed: parametric.closed,
        })
    }

    /// 直线或线段的大圆法向
    pub fn normal(&self) -> Option<Vector3> {
        match self {
            Curve::Line { normal } | Curve::Segment { normal, .. } => Some(*normal),
            _ => None,
        }
    }

    /// 椭圆中心（两焦点的球面中点）与长轴方向
    fn ellipse_frame(focus1: &Vector3, focus2: &Vector3) -> Option<(Vector3, Vector3, Vector3)> {
        let center = math::normalize(&(focus1 + focus2), math::EPSILON)?;
        let major = math::normalize(&(focus1 - center * center.dot(focus1)), math::EPSILON)?;
        let minor = center.cross(&major);
        Some((center, major, minor))
    }

    /// 沿从椭圆中心出发的射线二分求椭圆上的点
    fn ellipse_point(
        focus1: &Vector3,
        focus2: &Vector3,
        a: f64,
        t: f64,
        iterations: usize,
    ) -> Option<Vector3> {
        let (center, major, minor) = Self::ellipse_frame(focus1, focus2)?;
        let direction = major * t.cos() + minor * t.sin();
        let excess = |s: f64| {
            let p = math::walk(&center, &direction, s);
            math::arc_distance(&p, focus1) + math::arc_distance(&p, focus2) - 2.0 * a
        };
        // 中心处距离和为 2c < 2a，中心的对径点处为 2(π - c) > 2a
        let (mut lo, mut hi) = (0.0, PI);
        if excess(lo) >= 0.0 || excess(hi) <= 0.0 {
            return None;
        }
        for _ in 0..iterations {
            let mid = 0.5 * (lo + hi);
            if excess(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Some(math::walk(&center, &direction, 0.5 * (lo + hi)))
    }

    /// 先按采样找最近的参数，再在相邻区间内三分细化
    fn closest_by_sampling(&self, p: &Vector3, config: &KernelConfig) -> Option<Vector3> {
        let (lo, hi) = self.domain();
        let n = config.subdivisions.max(4);
        let step = (hi - lo) / n as f64;
        let distance = |t: f64| self.point_at(t).map(|q| math::arc_distance(&q, p));

        let mut best: Option<(f64, f64)> = None;
        for i in 0..=n {
            let t = lo + step * i as f64;
            if let Some(d) = distance(t) {
                if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((t, d));
                }
            }
        }
        let (t0, _) = best?;

        let (mut a, mut b) = ((t0 - step).max(lo), (t0 + step).min(hi));
        for _ in 0..config.bisection_iterations {
            let m1 = a + (b - a) / 3.0;
            let m2 = b - (b - a) / 3.0;
            match (distance(m1), distance(m2)) {
                (Some(d1), Some(d2)) if d1 < d2 => b = m2,
                (Some(_), Some(_)) => a = m1,
                _ => break,
            }
        }
        self.point_at(0.5 * (a + b))
    }
}

impl OneDimensional for Curve {
    fn is_straight(&self) -> bool {
        matches!(self, Curve::Line { .. } | Curve::Segment { .. })
    }

    fn domain(&self) -> (f64, f64) {
        match self {
            Curve::Segment { arc_length, .. } => (0.0, *arc_length),
            Curve::Parametric(curve) => (curve.t_min, curve.t_max),
            _ => (0.0, TAU),
        }
    }

    fn breakpoints(&self) -> Vec<f64> {
        let (lo, hi) = self.domain();
        let mut points = vec![lo];
        if let Curve::Parametric(curve) = self {
            let mut cusps: Vec<f64> = curve
                .cusps
                .iter()
                .copied()
                .filter(|c| *c > lo && *c < hi)
                .collect();
            cusps.sort_by(f64::total_cmp);
            cusps.dedup();
            points.extend(cusps);
        }
        points.push(hi);
        points
    }

    fn is_closed(&self) -> bool {
        match self {
            Curve::Segment { .. } => false,
            Curve::Parametric(curve) => curve.closed,
            _ => true,
        }
    }

    fn point_at(&self, t: f64) -> Option<Vector3> {
        match self {
            Curve::Line { normal } => {
                let u = math::perpendicular(normal);
                let w = normal.cross(&u);
                Some(math::walk(&u, &w, t))
            }
            Curve::Segment { start, normal, .. } => {
                Some(math::walk(start, &normal.cross(start), t))
            }
            Curve::Circle { center, radius } => {
                let u = math::perpendicular(center);
                let w = center.cross(&u);
                let direction = u * t.cos() + w * t.sin();
                Some(math::walk(center, &direction, *radius))
            }
            Curve::Ellipse { focus1, focus2, a } => {
                Self::ellipse_point(focus1, focus2, *a, t, 60)
            }
            Curve::Parametric(curve) => curve.evaluate(t),
        }
    }

    fn implicit(&self, p: &Vector3) -> Option<f64> {
        match self {
            Curve::Line { normal } | Curve::Segment { normal, .. } => Some(p.dot(normal)),
            Curve::Circle { center, radius } => Some(p.dot(center) - radius.cos()),
            Curve::Ellipse { focus1, focus2, a } => {
                Some(math::arc_distance(p, focus1) + math::arc_distance(p, focus2) - 2.0 * a)
            }
            Curve::Parametric(_) => None,
        }
    }

    fn contains(&self, p: &Vector3, config: &KernelConfig) -> bool {
        let tolerance = config.intersection_tolerance;
        match self {
            Curve::Line { normal } => p.dot(normal).abs() < tolerance,
            Curve::Segment { start, end, normal, .. } => {
                p.dot(normal).abs() < tolerance && math::on_minor_arc(p, start, end, tolerance)
            }
            Curve::Circle { center, radius } => {
                (math::arc_distance(p, center) - radius).abs() < tolerance
            }
            Curve::Ellipse { .. } => self
                .implicit(p)
                .map(|value| value.abs() < tolerance)
                .unwrap_or(false),
            Curve::Parametric(_) => self
                .closest_point(p, config)
                .map(|q| math::arc_distance(&q, p) < tolerance)
                .unwrap_or(false),
        }
    }

    fn closest_point(&self, p: &Vector3, config: &KernelConfig) -> Option<Vector3> {
        let eps = config.degeneracy_epsilon;
        match self {
            Curve::Line { normal } => math::project_to_great_circle(p, normal, eps),
            Curve::Segment { start, end, normal, .. } => {
                let projected = math::project_to_great_circle(p, normal, eps);
                match projected {
                    Some(q) if math::on_minor_arc(&q, start, end, config.intersection_tolerance) => {
                        Some(q)
                    }
                    _ => {
                        if math::arc_distance(p, start) <= math::arc_distance(p, end) {
                            Some(*start)
                        } else {
                            Some(*end)
                        }
                    }
                }
            }
            Curve::Circle { center, radius } => {
                let direction = math::normalize(&(p - center * center.dot(p)), eps)
                    .unwrap_or_else(|| math::perpendicular(center));
                Some(math::walk(center, &direction, *radius))
            }
            Curve::Ellipse { .. } | Curve::Parametric(_) => self.closest_by_sampling(p, config),
        }
    }
}
