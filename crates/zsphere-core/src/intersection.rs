//! 交点引擎
//!
//! 求两条曲线在单位球面上的全部交点，并按固定的求解顺序给出解槽位：
//! - 直线×直线：两法向叉积给出一对对径解（槽位 0 与 1），平行或重合时无解
//! - 直线×圆、圆×圆：闭式解，总是两个槽位，各自标记是否存在
//! - 涉及椭圆或参数曲线：沿一条曲线采样另一条的隐函数，变号区间二分求根
//! - 参数曲线×参数曲线：网格搜索后高斯-牛顿修正
//!
//! 槽位序号就是交点的 `order`。每类曲线对的槽位数固定，找不到的根占位为不存在。
//! 采样求得的根初次按参数顺序入槽；几何变化后由 [`intersect_tracked`]
//! 按各槽位上一次的位置重新分配，槽位不会因为某个根消失而整体错位。
//!
//! [`candidates`] 为新加入的曲线规划交点：与现有交点重合的解复用现有节点。

use crate::config::KernelConfig;
use crate::curve::{Curve, OneDimensional};
use crate::graph::Graph;
use crate::math::{self, Vector3};
use crate::node::{NodeId, NodeKind};
use crate::solver::{self, SolverParams};
use std::collections::BTreeMap;

/// 一个解槽位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionSolution {
    pub vector: Vector3,
    pub exists: bool,
}

impl IntersectionSolution {
    fn new(vector: Vector3, exists: bool) -> Self {
        Self { vector, exists }
    }

    fn missing() -> Self {
        Self::new(Vector3::zeros(), false)
    }
}

/// 圆锥曲线（椭圆参与）对的槽位数
const CONIC_SLOTS: usize = 4;

/// 槽位上一次的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotHistory {
    pub location: Vector3,
    /// 上一次更新时是否存在
    pub existed: bool,
}

/// 求两条曲线的交点槽位
pub fn intersect(a: &Curve, b: &Curve, config: &KernelConfig) -> Vec<IntersectionSolution> {
    intersect_tracked(a, b, config, &BTreeMap::new())
}

/// 求交点槽位；采样求得的根按 `history` 中各槽位的旧位置分配
pub fn intersect_tracked(
    a: &Curve,
    b: &Curve,
    config: &KernelConfig,
    history: &BTreeMap<usize, SlotHistory>,
) -> Vec<IntersectionSolution> {
    let mut solutions = match (a, b) {
        (x, y) if x.is_straight() && y.is_straight() => straight_straight(x, y, config),
        (x, Curve::Circle { center, radius }) | (Curve::Circle { center, radius }, x)
            if x.is_straight() =>
        {
            match x.normal() {
                Some(normal) => straight_circle(&normal, center, *radius, config).to_vec(),
                None => Vec::new(),
            }
        }
        (
            Curve::Circle {
                center: c1,
                radius: r1,
            },
            Curve::Circle {
                center: c2,
                radius: r2,
            },
        ) => circle_circle(c1, *r1, c2, *r2, config).to_vec(),
        (Curve::Parametric(_), Curve::Parametric(_)) => {
            let roots = parametric_parametric(a, b, config);
            place(roots, config.parametric_slots, history)
        }
        _ => {
            // 采样较复杂的一条，用另一条的隐函数找变号
            let (sampler, other) = if sampling_rank(b) > sampling_rank(a) {
                (b, a)
            } else {
                (a, b)
            };
            let slots = if matches!(sampler, Curve::Parametric(_)) {
                config.parametric_slots
            } else {
                CONIC_SLOTS
            };
            place(sampled(sampler, other, config), slots, history)
        }
    };

    // 线段只保留落在劣弧上的解
    for curve in [a, b] {
        if let Curve::Segment { start, end, .. } = curve {
            for solution in solutions.iter_mut().filter(|s| s.exists) {
                solution.exists =
                    math::on_minor_arc(&solution.vector, start, end, config.intersection_tolerance);
            }
        }
    }
    solutions
}

/// 把采样得到的根放入固定数量的槽位
///
/// 先让上一次存在的槽位认领离旧位置最近的根，再轮到上一次不存在但有旧位置的槽位，
/// 剩下的根按参数顺序填入空槽位。没有历史时等价于按参数顺序入槽。
fn place(
    mut roots: Vec<Vector3>,
    slots: usize,
    history: &BTreeMap<usize, SlotHistory>,
) -> Vec<IntersectionSolution> {
    if roots.len() > slots {
        tracing::warn!(found = roots.len(), slots, "more intersections than slots, extras dropped");
        roots.truncate(slots);
    }
    let mut out = vec![IntersectionSolution::missing(); slots];
    let mut filled = vec![false; slots];
    let mut claimed = vec![false; roots.len()];

    for existed in [true, false] {
        let mut pairs: Vec<(f64, usize, usize)> = history
            .iter()
            .filter(|(slot, h)| **slot < slots && h.existed == existed && h.location.norm() > 0.5)
            .flat_map(|(slot, h)| {
                roots
                    .iter()
                    .enumerate()
                    .map(move |(r, v)| ((v - h.location).norm(), *slot, r))
            })
            .collect();
        pairs.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
        for (_, slot, r) in pairs {
            if !filled[slot] && !claimed[r] {
                out[slot] = IntersectionSolution::new(roots[r], true);
                filled[slot] = true;
                claimed[r] = true;
            }
        }
    }

    let mut rest = (0..roots.len()).filter(|r| !claimed[*r]);
    for slot in 0..slots {
        if filled[slot] {
            continue;
        }
        match rest.next() {
            Some(r) => out[slot] = IntersectionSolution::new(roots[r], true),
            None => break,
        }
    }
    out
}

fn sampling_rank(curve: &Curve) -> u8 {
    match curve {
        Curve::Parametric(_) => 3,
        Curve::Ellipse { .. } => 2,
        Curve::Circle { .. } => 1,
        _ => 0,
    }
}

fn straight_straight(a: &Curve, b: &Curve, config: &KernelConfig) -> Vec<IntersectionSolution> {
    let (Some(n1), Some(n2)) = (a.normal(), b.normal()) else {
        return Vec::new();
    };
    match math::normalize(&n1.cross(&n2), config.degeneracy_epsilon) {
        Some(v) => vec![
            IntersectionSolution::new(v, true),
            IntersectionSolution::new(-v, true),
        ],
        None => Vec::new(),
    }
}

/// 大圆 `p·n = 0` 与圆 `p·c = cos r` 的交点
fn straight_circle(
    normal: &Vector3,
    center: &Vector3,
    radius: f64,
    config: &KernelConfig,
) -> [IntersectionSolution; 2] {
    let projected = center - normal * normal.dot(center);
    let length = projected.norm();
    // 圆心是大圆的极点：要么无交点，要么重合
    if length < config.degeneracy_epsilon {
        return [IntersectionSolution::missing(), IntersectionSolution::missing()];
    }
    let u = projected / length;
    let w = normal.cross(&u);
    let alpha = radius.cos() / length;
    if alpha.abs() > 1.0 + config.intersection_tolerance {
        return [
            IntersectionSolution::new(u, false),
            IntersectionSolution::new(u, false),
        ];
    }
    let alpha = alpha.clamp(-1.0, 1.0);
    let beta = (1.0 - alpha * alpha).sqrt();
    [
        IntersectionSolution::new(u * alpha + w * beta, true),
        IntersectionSolution::new(u * alpha - w * beta, true),
    ]
}

/// 两圆 `p·c1 = cos r1`、`p·c2 = cos r2` 的交点
fn circle_circle(
    c1: &Vector3,
    r1: f64,
    c2: &Vector3,
    r2: f64,
    config: &KernelConfig,
) -> [IntersectionSolution; 2] {
    let g = c1.dot(c2);
    let det = 1.0 - g * g;
    let Some(axis) = math::normalize(&c1.cross(c2), config.degeneracy_epsilon) else {
        return [IntersectionSolution::missing(), IntersectionSolution::missing()];
    };
    if det < config.degeneracy_epsilon {
        return [IntersectionSolution::missing(), IntersectionSolution::missing()];
    }
    let (h1, h2) = (r1.cos(), r2.cos());
    let x = (h1 - g * h2) / det;
    let y = (h2 - g * h1) / det;
    let base = c1 * x + c2 * y;
    let remainder = 1.0 - base.norm_squared();
    if remainder < -config.intersection_tolerance {
        let fallback = math::normalize(&base, config.degeneracy_epsilon).unwrap_or(axis);
        return [
            IntersectionSolution::new(fallback, false),
            IntersectionSolution::new(fallback, false),
        ];
    }
    let z = remainder.max(0.0).sqrt();
    [
        IntersectionSolution::new(base + axis * z, true),
        IntersectionSolution::new(base - axis * z, true),
    ]
}

/// 沿 `sampler` 采样 `other` 的隐函数，变号处二分求根，按参数顺序返回
fn sampled(sampler: &Curve, other: &Curve, config: &KernelConfig) -> Vec<Vector3> {
    let f = |t: f64| sampler.point_at(t).and_then(|p| other.implicit(&p));
    let params = SolverParams::from_config(config);
    let breakpoints = sampler.breakpoints();
    // 闭曲线的末端样本与起点重合，不再重复计数
    let wraps = sampler.is_closed() && breakpoints.len() == 2;
    let n = config.subdivisions.max(1);

    let mut roots = Vec::new();
    for piece in breakpoints.windows(2) {
        let (lo, hi) = (piece[0], piece[1]);
        let step = (hi - lo) / n as f64;
        let mut previous: Option<(f64, f64)> = None;
        let mut first = None;
        for i in 0..=n {
            let t = if i == n { hi } else { lo + step * i as f64 };
            // 闭曲线接缝两侧用同一个样本值，接缝上的根不会因舍入漏掉
            let value = if wraps && i == n { first } else { f(t) };
            if i == 0 {
                first = value;
            }
            match (previous, value) {
                (_, Some(v)) if v == 0.0 => {
                    if !(wraps && i == n) {
                        roots.push((t, lo, hi));
                    }
                }
                (Some((tp, vp)), Some(v)) if vp != 0.0 && vp.signum() != v.signum() => {
                    let root = solver::bisect(&f, tp, t, params.bisection_iterations);
                    roots.push((root, tp, t));
                }
                _ => {}
            }
            previous = value.map(|v| (t, v));
        }
    }

    let mut solutions: Vec<Vector3> = Vec::new();
    for (t, lo, hi) in roots {
        let t = if config.newton_iterations > 0 {
            solver::newton_polish(&f, t, lo, hi, &params)
        } else {
            t
        };
        let Some(p) = sampler.point_at(t) else {
            continue;
        };
        let verified = other
            .implicit(&p)
            .map(|value| value.abs() < config.intersection_tolerance)
            .unwrap_or(false);
        let duplicate = solutions
            .iter()
            .any(|s| math::coincident(s, &p, config.intersection_tolerance));
        if verified && !duplicate {
            solutions.push(p);
        }
    }
    solutions
}

/// 曲线在尖点之间的各段参数区间
fn pieces(curve: &Curve) -> Vec<(f64, f64)> {
    curve
        .breakpoints()
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|(lo, hi)| hi > lo)
        .collect()
}

/// 两条参数曲线求交：逐段采样配对，高斯-牛顿迭代限制在两段各自的区间内
fn parametric_parametric(a: &Curve, b: &Curve, config: &KernelConfig) -> Vec<Vector3> {
    let params = SolverParams::from_config(config);
    let n = (config.subdivisions / 4).max(8);
    let sample = |curve: &Curve, (lo, hi): (f64, f64)| -> Vec<(f64, Vector3)> {
        (0..=n)
            .filter_map(|i| {
                let t = lo + (hi - lo) * i as f64 / n as f64;
                curve.point_at(t).map(|p| (t, p))
            })
            .collect()
    };
    let spacing = |samples: &[(f64, Vector3)]| {
        samples
            .windows(2)
            .map(|w| (w[1].1 - w[0].1).norm())
            .fold(0.0, f64::max)
    };

    let pieces_a: Vec<_> = pieces(a).into_iter().map(|p| (p, sample(a, p))).collect();
    let pieces_b: Vec<_> = pieces(b).into_iter().map(|p| (p, sample(b, p))).collect();
    let threshold = pieces_a
        .iter()
        .chain(&pieces_b)
        .map(|(_, samples)| spacing(samples))
        .fold(0.0, f64::max);

    let point_a = |s: f64| a.point_at(s);
    let point_b = |t: f64| b.point_at(t);

    let mut solutions: Vec<(f64, Vector3)> = Vec::new();
    for (bounds_a, samples_a) in &pieces_a {
        for (bounds_b, samples_b) in &pieces_b {
            for (s0, pa) in samples_a {
                for (t0, pb) in samples_b {
                    if (pa - pb).norm() > threshold {
                        continue;
                    }
                    let Some((s, t)) = solver::gauss_newton(
                        &point_a,
                        &point_b,
                        (*s0, *t0),
                        (*bounds_a, *bounds_b),
                        &params,
                    ) else {
                        continue;
                    };
                    let (Some(p), Some(q)) = (a.point_at(s), b.point_at(t)) else {
                        continue;
                    };
                    if !math::coincident(&p, &q, config.intersection_tolerance) {
                        continue;
                    }
                    let duplicate = solutions
                        .iter()
                        .any(|(_, existing)| math::coincident(existing, &p, config.intersection_tolerance));
                    if !duplicate {
                        solutions.push((s, p));
                    }
                }
            }
        }
    }
    // 按第一条曲线的参数排序
    solutions.sort_by(|x, y| x.0.total_cmp(&y.0));
    solutions.into_iter().map(|(_, p)| p).collect()
}

// === 规划 ===

/// 新曲线与一条现有曲线的一个交点槽位
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// (现有曲线, 新曲线)
    pub pair: (NodeId, NodeId),
    pub order: usize,
    pub solution: IntersectionSolution,
    /// 两条曲线都是直的（需要对径耦合）
    pub straight: bool,
    /// 位置重合的现有交点
    pub existing: Option<NodeId>,
}

/// 计算新曲线（可以尚未挂入图）与所有已挂入曲线的交点槽位
///
/// 曲线按 `NodeId` 升序、槽位按求解顺序给出
pub fn candidates(graph: &Graph, new_curve: NodeId) -> Vec<Candidate> {
    let config = graph.config();
    let Some(curve) = graph.curve_of(new_curve) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for node in graph.attached() {
        if node.id == new_curve || !node.entity_kind().is_curve() {
            continue;
        }
        let Some(other) = Curve::of(node) else {
            continue;
        };
        let straight = other.is_straight() && curve.is_straight();
        for (order, solution) in intersect(&other, &curve, config).into_iter().enumerate() {
            let existing = if solution.exists {
                find_intersection_point(graph, &solution.vector)
            } else {
                None
            };
            out.push(Candidate {
                pair: (node.id, new_curve),
                order,
                solution,
                straight,
                existing,
            });
        }
    }

    tracing::debug!(curve = %new_curve, candidates = out.len(), "intersection candidates");
    out
}

/// 在给定位置的已挂入、存在的交点
pub fn find_intersection_point(graph: &Graph, vector: &Vector3) -> Option<NodeId> {
    let tolerance = graph.config().intersection_tolerance;
    graph
        .attached()
        .filter(|n| n.exists && n.kind.intersection().is_some())
        .find(|n| match &n.kind {
            NodeKind::Point(point) => math::coincident(&point.location, vector, tolerance),
            _ => false,
        })
        .map(|n| n.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::ParametricCurve;
    use crate::expression::Expr;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn line(normal: Vector3) -> Curve {
        Curve::Line {
            normal: normal.normalize(),
        }
    }

    #[test]
    fn test_two_lines_meet_in_antipodal_pair() {
        let config = KernelConfig::default();
        let solutions = intersect(&line(Vector3::z()), &line(Vector3::x()), &config);
        assert_eq!(solutions.len(), 2);
        assert_relative_eq!(solutions[0].vector, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(solutions[1].vector, -Vector3::y(), epsilon = 1e-12);
        assert!(solutions.iter().all(|s| s.exists));
    }

    #[test]
    fn test_identical_lines_have_no_slots() {
        let config = KernelConfig::default();
        assert!(intersect(&line(Vector3::z()), &line(-Vector3::z()), &config).is_empty());
    }

    #[test]
    fn test_segment_slot_exists_only_on_arc() {
        let config = KernelConfig::default();
        let segment = Curve::Segment {
            start: Vector3::x(),
            end: Vector3::y(),
            normal: Vector3::z(),
            arc_length: FRAC_PI_2,
        };
        let cutter = line(Vector3::new(1.0, -1.0, 0.0));
        let solutions = intersect(&segment, &cutter, &config);
        assert_eq!(solutions.len(), 2);
        let on_arc: Vec<bool> = solutions.iter().map(|s| s.exists).collect();
        assert_eq!(on_arc.iter().filter(|e| **e).count(), 1);
    }

    #[test]
    fn test_line_circle_closed_form() {
        let config = KernelConfig::default();
        let circle = Curve::Circle {
            center: Vector3::x(),
            radius: FRAC_PI_4,
        };
        let solutions = intersect(&line(Vector3::z()), &circle, &config);
        assert_eq!(solutions.len(), 2);
        for s in &solutions {
            assert!(s.exists);
            assert!(s.vector.z.abs() < 1e-12);
            assert_relative_eq!(math::arc_distance(&s.vector, &Vector3::x()), FRAC_PI_4, epsilon = 1e-12);
        }
        // 参数顺序不影响槽位
        let swapped = intersect(&circle, &line(Vector3::z()), &config);
        assert_eq!(solutions, swapped);
    }

    #[test]
    fn test_far_circle_misses_line() {
        let config = KernelConfig::default();
        let circle = Curve::Circle {
            center: Vector3::z(),
            radius: 0.3,
        };
        let solutions = intersect(&line(Vector3::z()), &circle, &config);
        assert_eq!(solutions.len(), 2);
        assert!(solutions.iter().all(|s| !s.exists));
    }

    #[test]
    fn test_circle_circle_closed_form() {
        let config = KernelConfig::default();
        let c1 = Curve::Circle {
            center: Vector3::x(),
            radius: FRAC_PI_2,
        };
        let c2 = Curve::Circle {
            center: Vector3::y(),
            radius: FRAC_PI_2,
        };
        let solutions = intersect(&c1, &c2, &config);
        assert_relative_eq!(solutions[0].vector, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(solutions[1].vector, -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_line_ellipse_by_sampling() {
        let config = KernelConfig::default();
        let f1 = Vector3::new(0.3_f64.sin(), 0.0, 0.3_f64.cos());
        let f2 = Vector3::new(-(0.3_f64.sin()), 0.0, 0.3_f64.cos());
        let ellipse = Curve::Ellipse {
            focus1: f1,
            focus2: f2,
            a: 0.5,
        };
        // 过两焦点中点的子午线与椭圆交于两点
        let meridian = line(Vector3::y());
        let solutions = intersect(&meridian, &ellipse, &config);
        assert_eq!(solutions.len(), CONIC_SLOTS);
        let found: Vec<_> = solutions.iter().filter(|s| s.exists).collect();
        assert_eq!(found.len(), 2);
        for s in found {
            assert!(s.vector.y.abs() < 1e-7);
            assert!(ellipse.implicit(&s.vector).unwrap().abs() < config.intersection_tolerance);
        }
        // 采样根按参数顺序占据前两个槽位
        assert!(solutions[0].exists && solutions[1].exists);
        assert!(!solutions[2].exists && !solutions[3].exists);
    }

    #[test]
    fn test_disjoint_ellipse_keeps_fixed_slots() {
        let config = KernelConfig::default();
        let ellipse = Curve::Ellipse {
            focus1: Vector3::new(0.1_f64.sin(), 0.0, 0.1_f64.cos()),
            focus2: Vector3::new(-(0.1_f64.sin()), 0.0, 0.1_f64.cos()),
            a: 0.3,
        };
        // 赤道离北极附近的小椭圆很远
        let solutions = intersect(&line(Vector3::z()), &ellipse, &config);
        assert_eq!(solutions.len(), CONIC_SLOTS);
        assert!(solutions.iter().all(|s| !s.exists));
    }

    #[test]
    fn test_place_follows_previous_locations() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);
        let c = Vector3::new(0.0, 0.0, 1.0);
        let history: BTreeMap<usize, SlotHistory> = [
            (0, SlotHistory { location: a, existed: true }),
            (1, SlotHistory { location: b, existed: true }),
            (2, SlotHistory { location: c, existed: true }),
        ]
        .into_iter()
        .collect();

        // 第一个根消失：其余根留在原槽位
        let nudged_b = Vector3::new(0.01, 1.0, 0.0).normalize();
        let nudged_c = Vector3::new(0.0, 0.01, 1.0).normalize();
        let solutions = place(vec![nudged_b, nudged_c], 4, &history);
        assert_eq!(solutions.len(), 4);
        assert!(!solutions[0].exists);
        assert_relative_eq!(solutions[1].vector, nudged_b);
        assert_relative_eq!(solutions[2].vector, nudged_c);
        assert!(!solutions[3].exists);

        // 根的参数顺序反转也不影响槽位
        let solutions = place(vec![c, b, a], 4, &history);
        assert_relative_eq!(solutions[0].vector, a);
        assert_relative_eq!(solutions[1].vector, b);
        assert_relative_eq!(solutions[2].vector, c);

        // 新出现的根落入空槽位
        let only_c: BTreeMap<usize, SlotHistory> =
            [(2, SlotHistory { location: c, existed: true })].into_iter().collect();
        let solutions = place(vec![a, c], 3, &only_c);
        assert_relative_eq!(solutions[0].vector, a);
        assert!(!solutions[1].exists);
        assert_relative_eq!(solutions[2].vector, c);
    }

    #[test]
    fn test_place_drops_extra_roots() {
        let roots = vec![Vector3::x(), Vector3::y(), Vector3::z()];
        let solutions = place(roots, 2, &BTreeMap::new());
        assert_eq!(solutions.len(), 2);
        assert!(solutions.iter().all(|s| s.exists));
    }

    fn parametric(coordinates: [&str; 3], cusps: Vec<f64>) -> Curve {
        Curve::Parametric(ParametricCurve {
            exprs: coordinates.map(|c| Expr::parse(c).unwrap()),
            bindings: BTreeMap::new(),
            t_min: -1.0,
            t_max: 1.0,
            cusps,
            closed: false,
        })
    }

    #[test]
    fn test_pieces_split_at_cusps() {
        let curve = parametric(["cos(t)", "sin(t)", "0"], vec![0.5, -0.2, 3.0]);
        assert_eq!(pieces(&curve), vec![(-1.0, -0.2), (-0.2, 0.5), (0.5, 1.0)]);
    }

    #[test]
    fn test_parametric_pair_root_on_cusp() {
        let config = KernelConfig::default();
        let equator = parametric(["cos(t)", "sin(t)", "0"], vec![0.0]);
        let meridian = parametric(["cos(t)", "0", "sin(t)"], vec![]);
        let solutions = intersect(&equator, &meridian, &config);
        assert_eq!(solutions.len(), config.parametric_slots);
        let found: Vec<_> = solutions.iter().filter(|s| s.exists).collect();
        assert_eq!(found.len(), 1);
        assert_relative_eq!(found[0].vector, Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn test_parametric_pair_stays_within_pieces() {
        let config = KernelConfig::default();
        // 折返曲线：两段重走同一段弧，交点只算一次
        let folded = parametric(["cos(t)", "sin(abs(t))", "0"], vec![0.0]);
        let meridian = parametric(["cos(0.5)", "sin(0.5)*cos(t)", "sin(t)"], vec![]);
        let solutions = intersect(&folded, &meridian, &config);
        let found: Vec<_> = solutions.iter().filter(|s| s.exists).collect();
        assert_eq!(found.len(), 1);
        let expected = Vector3::new(0.5_f64.cos(), 0.5_f64.sin(), 0.0);
        assert_relative_eq!(found[0].vector, expected, epsilon = 1e-9);
    }
}
