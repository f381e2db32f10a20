//! 几何实体定义与重算公式
//!
//! 支持的实体：
//! - 点 (Point)：自由点、曲线上的点、交点、对径点、极点、等分点、变换点
//! - 直线 (Line)：过两点的大圆或某点的极线
//! - 线段 (Segment)：两点间的劣弧
//! - 圆 (Circle)、椭圆 (Ellipse)
//! - 参数曲线 (Parametric)
//! - 多边形 (Polygon)、角度标记 (AngleMarker)、度量 (Measurement)
//!
//! 每个实体在更新时只从父节点的当前值重新计算自身。
//! 几何退化（零长度法向、重合焦点、对径歧义）不会报错，只返回“不存在”。

use crate::curve::{Curve, OneDimensional};
use crate::expression::{Expr, ExprError};
use crate::graph::Graph;
use crate::intersection;
use crate::math::{self, Vector3};
use crate::node::{NodeId, NodeKind};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::{PI, TAU};

// === 点 ===

/// 点
#[derive(Debug, Clone, PartialEq)]
pub struct PointNode {
    /// 单位球面上的位置
    pub location: Vector3,
    pub def: PointDef,
}

impl PointNode {
    pub fn new(def: PointDef, location: Vector3) -> Self {
        Self { location, def }
    }

    pub fn free(location: Vector3) -> Self {
        Self::new(PointDef::Free, location)
    }
}

/// 点的构造方式
#[derive(Debug, Clone, PartialEq)]
pub enum PointDef {
    /// 自由点
    Free,
    /// 约束在曲线上的点
    OnObject { curve: NodeId },
    /// 两条曲线的交点
    Intersection(IntersectionData),
    /// 另一点的对径点
    Antipodal { parent: NodeId },
    /// 直线的极点（index 0）或反极点（index 1）
    Polar { line: NodeId, index: u8 },
    /// 线段的 n 等分点之一
    NSect { segment: NodeId, index: u32, count: u32 },
    /// 变换后的点
    Transformed {
        parent: NodeId,
        transform: PointTransform,
    },
}

impl PointDef {
    pub fn parents(&self) -> Vec<NodeId> {
        match self {
            PointDef::Free => vec![],
            PointDef::OnObject { curve } => vec![*curve],
            PointDef::Intersection(data) => data.curves().into_iter().collect(),
            PointDef::Antipodal { parent } => vec![*parent],
            PointDef::Polar { line, .. } => vec![*line],
            PointDef::NSect { segment, .. } => vec![*segment],
            PointDef::Transformed { parent, transform } => {
                let mut parents = vec![*parent];
                match transform {
                    PointTransform::Rotation { center, angle } => {
                        parents.push(*center);
                        parents.push(*angle);
                    }
                    PointTransform::Reflection { line } => parents.push(*line),
                }
                parents
            }
        }
    }
}

/// 点变换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointTransform {
    /// 绕某点旋转，角度取自度量节点
    Rotation { center: NodeId, angle: NodeId },
    /// 关于直线（大圆）镜像
    Reflection { line: NodeId },
}

/// 其他父曲线对记录
///
/// 交点创建之后，又发现另一对曲线也经过同一位置时记录在这里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherParent {
    pub parents: (NodeId, NodeId),
    /// 该曲线对求交解中的序号
    pub order: usize,
    /// 发现该曲线对时是否同时创建了对径交点
    pub creates_antipode: bool,
}

impl OtherParent {
    pub fn new(parents: (NodeId, NodeId), order: usize) -> Self {
        Self {
            parents,
            order,
            creates_antipode: false,
        }
    }

    pub fn involves(&self, id: NodeId) -> bool {
        self.parents.0 == id || self.parents.1 == id
    }
}

/// 同一对曲线（不计顺序）
pub fn same_pair(a: (NodeId, NodeId), b: (NodeId, NodeId)) -> bool {
    (a.0 == b.0 && a.1 == b.1) || (a.0 == b.1 && a.1 == b.0)
}

/// 交点数据
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionData {
    /// 主父曲线对
    pub principal: (NodeId, NodeId),
    /// 主父曲线对求交解中的序号
    pub order: usize,
    /// 其他经过该点的曲线对
    pub others: Vec<OtherParent>,
    /// 耦合的对径交点
    pub antipode: Option<NodeId>,
    /// 是否已由用户显式创建（自动创建的交点默认隐藏）
    pub user_created: bool,
}

impl IntersectionData {
    pub fn new(principal: (NodeId, NodeId), order: usize) -> Self {
        Self {
            principal,
            order,
            others: Vec::new(),
            antipode: None,
            user_created: false,
        }
    }

    /// 是否已经记录了这对曲线（主父或其他父）
    pub fn has_pair(&self, a: NodeId, b: NodeId) -> bool {
        same_pair(self.principal, (a, b)) || self.others.iter().any(|r| same_pair(r.parents, (a, b)))
    }

    /// 引用到的全部曲线
    pub fn curves(&self) -> BTreeSet<NodeId> {
        let mut curves = BTreeSet::new();
        curves.insert(self.principal.0);
        curves.insert(self.principal.1);
        for record in &self.others {
            curves.insert(record.parents.0);
            curves.insert(record.parents.1);
        }
        curves
    }
}

// === 直线与线段 ===

/// 直线的构造方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDef {
    /// 过两点的大圆
    ThroughPoints { start: NodeId, end: NodeId },
    /// 某点的极线
    Polar { pole: NodeId },
}

impl LineDef {
    pub fn parents(&self) -> Vec<NodeId> {
        match self {
            LineDef::ThroughPoints { start, end } => vec![*start, *end],
            LineDef::Polar { pole } => vec![*pole],
        }
    }
}

/// 直线（完整大圆）
#[derive(Debug, Clone, PartialEq)]
pub struct LineNode {
    pub def: LineDef,
    pub start_vector: Vector3,
    pub end_vector: Vector3,
    /// 大圆平面的单位法向
    pub normal: Vector3,
}

impl LineNode {
    pub fn new(def: LineDef) -> Self {
        Self {
            def,
            start_vector: Vector3::zeros(),
            end_vector: Vector3::zeros(),
            normal: Vector3::zeros(),
        }
    }
}

/// 线段（两点间的劣弧）
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentNode {
    pub start: NodeId,
    pub end: NodeId,
    pub start_vector: Vector3,
    pub end_vector: Vector3,
    pub normal: Vector3,
    /// 弧长（弧度）
    pub arc_length: f64,
}

impl SegmentNode {
    pub fn new(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            start_vector: Vector3::zeros(),
            end_vector: Vector3::zeros(),
            normal: Vector3::zeros(),
            arc_length: 0.0,
        }
    }
}

// === 圆锥曲线 ===

/// 圆
#[derive(Debug, Clone, PartialEq)]
pub struct CircleNode {
    pub center: NodeId,
    pub circle_point: NodeId,
    pub center_vector: Vector3,
    /// 球面半径（弧度）
    pub radius: f64,
}

impl CircleNode {
    pub fn new(center: NodeId, circle_point: NodeId) -> Self {
        Self {
            center,
            circle_point,
            center_vector: Vector3::zeros(),
            radius: 0.0,
        }
    }
}

/// 椭圆：到两焦点球面距离之和为 2a 的点集
#[derive(Debug, Clone, PartialEq)]
pub struct EllipseNode {
    pub focus1: NodeId,
    pub focus2: NodeId,
    pub ellipse_point: NodeId,
    pub focus1_vector: Vector3,
    pub focus2_vector: Vector3,
    pub a: f64,
}

impl EllipseNode {
    pub fn new(focus1: NodeId, focus2: NodeId, ellipse_point: NodeId) -> Self {
        Self {
            focus1,
            focus2,
            ellipse_point,
            focus1_vector: Vector3::zeros(),
            focus2_vector: Vector3::zeros(),
            a: 0.0,
        }
    }
}

// === 参数曲线 ===

/// 参数曲线 `t -> normalize(x(t), y(t), z(t))`
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricNode {
    /// 坐标表达式原文
    pub coordinates: [String; 3],
    pub exprs: [Expr; 3],
    pub t_min: f64,
    pub t_max: f64,
    /// 尖点参数值（采样时作为分段边界）
    pub cusps: Vec<f64>,
    pub closed: bool,
    /// 表达式中的度量记号 -> 节点
    pub tokens: BTreeMap<String, NodeId>,
    /// 最近一次更新时记号的取值
    pub bindings: BTreeMap<String, f64>,
}

impl ParametricNode {
    /// 解析三个坐标表达式；记号到节点的绑定由调用方填写
    pub fn new(
        coordinates: [String; 3],
        t_min: f64,
        t_max: f64,
        cusps: Vec<f64>,
        closed: bool,
    ) -> Result<Self, ExprError> {
        let exprs = [
            Expr::parse(&coordinates[0])?,
            Expr::parse(&coordinates[1])?,
            Expr::parse(&coordinates[2])?,
        ];
        Ok(Self {
            coordinates,
            exprs,
            t_min,
            t_max,
            cusps,
            closed,
            tokens: BTreeMap::new(),
            bindings: BTreeMap::new(),
        })
    }
}

// === 度量类 ===

/// 多边形（线段的有序环）
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonNode {
    pub segments: Vec<NodeId>,
    pub vertices: Vec<Vector3>,
    /// 球面面积（球面角盈）
    pub area: f64,
}

impl PolygonNode {
    pub fn new(segments: Vec<NodeId>) -> Self {
        Self {
            segments,
            vertices: Vec::new(),
            area: 0.0,
        }
    }
}

/// 角度标记的构造方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleDef {
    /// 两条直线/线段之间的夹角
    Lines { first: NodeId, second: NodeId },
    /// 三点 A-B-C 在 B 处的夹角
    Points {
        first: NodeId,
        vertex: NodeId,
        second: NodeId,
    },
}

impl AngleDef {
    pub fn parents(&self) -> Vec<NodeId> {
        match self {
            AngleDef::Lines { first, second } => vec![*first, *second],
            AngleDef::Points {
                first,
                vertex,
                second,
            } => vec![*first, *vertex, *second],
        }
    }
}

/// 角度标记
#[derive(Debug, Clone, PartialEq)]
pub struct AngleMarkerNode {
    pub def: AngleDef,
    /// 角度（弧度）
    pub value: f64,
}

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// 度量的构造方式
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementDef {
    SegmentLength {
        segment: NodeId,
    },
    PointDistance {
        first: NodeId,
        second: NodeId,
    },
    PointCoordinate {
        point: NodeId,
        axis: Axis,
    },
    /// 引用其他度量记号的算术表达式
    Calculation {
        text: String,
        expr: Expr,
        tokens: BTreeMap<String, NodeId>,
    },
}

impl MeasurementDef {
    pub fn parents(&self) -> Vec<NodeId> {
        match self {
            MeasurementDef::SegmentLength { segment } => vec![*segment],
            MeasurementDef::PointDistance { first, second } => vec![*first, *second],
            MeasurementDef::PointCoordinate { point, .. } => vec![*point],
            MeasurementDef::Calculation { tokens, .. } => tokens.values().copied().collect(),
        }
    }
}

/// 度量（标量）
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementNode {
    pub def: MeasurementDef,
    pub value: f64,
    /// 最近一次求值失败的信息（供界面显示）
    pub last_error: Option<String>,
}

impl MeasurementNode {
    pub fn new(def: MeasurementDef) -> Self {
        Self {
            def,
            value: 0.0,
            last_error: None,
        }
    }
}

// === 重算 ===

/// 根据父节点的当前值重新计算实体，返回实体是否存在
pub(crate) fn recompute(kind: &mut NodeKind, graph: &Graph) -> bool {
    match kind {
        NodeKind::Point(point) => recompute_point(point, graph),
        NodeKind::Line(line) => recompute_line(line, graph),
        NodeKind::Segment(segment) => recompute_segment(segment, graph),
        NodeKind::Circle(circle) => recompute_circle(circle, graph),
        NodeKind::Ellipse(ellipse) => recompute_ellipse(ellipse, graph),
        NodeKind::Parametric(parametric) => recompute_parametric(parametric, graph),
        NodeKind::Polygon(polygon) => recompute_polygon(polygon, graph),
        NodeKind::AngleMarker(marker) => recompute_angle(marker, graph),
        NodeKind::Measurement(measurement) => recompute_measurement(measurement, graph),
    }
}

fn recompute_point(point: &mut PointNode, graph: &Graph) -> bool {
    let config = graph.config();
    let location = match &point.def {
        PointDef::Free => return true,
        PointDef::OnObject { curve } => graph
            .curve_of(*curve)
            .and_then(|c| c.closest_point(&point.location, config)),
        PointDef::Intersection(data) => intersection_location(data, &point.location, graph),
        PointDef::Antipodal { parent } => graph.location_of(*parent).map(|v| -v),
        PointDef::Polar { line, index } => graph
            .normal_of(*line)
            .map(|n| if *index == 0 { n } else { -n }),
        PointDef::NSect {
            segment,
            index,
            count,
        } => graph.segment_of(*segment).and_then(|s| {
            if *count < 2 || *index == 0 || *index >= *count {
                return None;
            }
            let tangent = s.normal.cross(&s.start_vector);
            let fraction = f64::from(*index) / f64::from(*count);
            Some(math::walk(&s.start_vector, &tangent, s.arc_length * fraction))
        }),
        PointDef::Transformed { parent, transform } => {
            graph.location_of(*parent).and_then(|p| match transform {
                PointTransform::Rotation { center, angle } => {
                    let axis = graph.location_of(*center)?;
                    let theta = graph.value_of(*angle)?;
                    Some(math::rotate_about(&p, &axis, theta))
                }
                PointTransform::Reflection { line } => {
                    let normal = graph.normal_of(*line)?;
                    Some(math::reflect_across(&p, &normal))
                }
            })
        }
    };

    match location.and_then(|v| math::normalize(&v, config.degeneracy_epsilon)) {
        Some(v) => {
            point.location = v;
            true
        }
        None => false,
    }
}

/// 交点位置：先取主父曲线对的第 `order` 个解，不存在时依次尝试其他父记录
fn intersection_location(
    data: &IntersectionData,
    previous: &Vector3,
    graph: &Graph,
) -> Option<Vector3> {
    let config = graph.config();
    let pairs = std::iter::once((data.principal, data.order))
        .chain(data.others.iter().map(|r| (r.parents, r.order)));

    for ((a, b), order) in pairs {
        let (Some(first), Some(second)) = (graph.curve_of(a), graph.curve_of(b)) else {
            continue;
        };
        let history = slot_history(graph, (a, b), order, previous);
        let solutions = intersection::intersect_tracked(&first, &second, config, &history);
        if let Some(solution) = solutions.get(order) {
            if solution.exists {
                return Some(solution.vector);
            }
        }
    }
    None
}

/// 曲线对各槽位上交点的当前位置
///
/// 同一曲线对的交点都是两条曲线的子节点；自身未挂入时用 `own` 补上
fn slot_history(
    graph: &Graph,
    pair: (NodeId, NodeId),
    own_order: usize,
    own: &Vector3,
) -> BTreeMap<usize, intersection::SlotHistory> {
    let mut history = BTreeMap::new();
    if let Some(curve) = graph.get(pair.0) {
        for kid in curve.kids() {
            let Some(node) = graph.get(*kid) else {
                continue;
            };
            let (Some(data), Some(location)) = (node.kind.intersection(), node.kind.location())
            else {
                continue;
            };
            let order = if same_pair(data.principal, pair) {
                Some(data.order)
            } else {
                data.others
                    .iter()
                    .find(|r| same_pair(r.parents, pair))
                    .map(|r| r.order)
            };
            if let Some(order) = order {
                history.insert(
                    order,
                    intersection::SlotHistory {
                        location,
                        existed: node.exists,
                    },
                );
            }
        }
    }
    history
        .entry(own_order)
        .or_insert(intersection::SlotHistory {
            location: *own,
            existed: true,
        });
    history
}

fn recompute_line(line: &mut LineNode, graph: &Graph) -> bool {
    let eps = graph.config().degeneracy_epsilon;
    match line.def {
        LineDef::ThroughPoints { start, end } => {
            let (Some(s), Some(e)) = (graph.location_of(start), graph.location_of(end)) else {
                return false;
            };
            // 重合或对径的两点不能确定唯一大圆
            let Some(normal) = math::normalize(&s.cross(&e), eps) else {
                return false;
            };
            line.start_vector = s;
            line.end_vector = e;
            line.normal = normal;
            true
        }
        LineDef::Polar { pole } => {
            let Some(p) = graph.location_of(pole) else {
                return false;
            };
            let start = math::perpendicular(&p);
            line.normal = p;
            line.start_vector = start;
            line.end_vector = p.cross(&start);
            true
        }
    }
}

fn recompute_segment(segment: &mut SegmentNode, graph: &Graph) -> bool {
    let eps = graph.config().degeneracy_epsilon;
    let (Some(s), Some(e)) = (graph.location_of(segment.start), graph.location_of(segment.end))
    else {
        return false;
    };
    let Some(normal) = math::normalize(&s.cross(&e), eps) else {
        return false;
    };
    segment.start_vector = s;
    segment.end_vector = e;
    segment.normal = normal;
    segment.arc_length = math::arc_distance(&s, &e);
    true
}

fn recompute_circle(circle: &mut CircleNode, graph: &Graph) -> bool {
    let eps = graph.config().degeneracy_epsilon;
    let (Some(c), Some(p)) = (
        graph.location_of(circle.center),
        graph.location_of(circle.circle_point),
    ) else {
        return false;
    };
    let radius = math::arc_distance(&c, &p);
    if radius < eps || radius > PI - eps {
        return false;
    }
    circle.center_vector = c;
    circle.radius = radius;
    true
}

fn recompute_ellipse(ellipse: &mut EllipseNode, graph: &Graph) -> bool {
    let eps = graph.config().degeneracy_epsilon;
    let (Some(f1), Some(f2), Some(p)) = (
        graph.location_of(ellipse.focus1),
        graph.location_of(ellipse.focus2),
        graph.location_of(ellipse.ellipse_point),
    ) else {
        return false;
    };
    let focal = math::arc_distance(&f1, &f2);
    // 焦点重合或对径
    if focal < eps || focal > PI - eps {
        return false;
    }
    let a = (math::arc_distance(&f1, &p) + math::arc_distance(&f2, &p)) / 2.0;
    let c = focal / 2.0;
    if a - c < eps || a > PI - c - eps {
        return false;
    }
    ellipse.focus1_vector = f1;
    ellipse.focus2_vector = f2;
    ellipse.a = a;
    true
}

fn recompute_parametric(parametric: &mut ParametricNode, graph: &Graph) -> bool {
    let mut bindings = BTreeMap::new();
    for (name, id) in &parametric.tokens {
        let Some(value) = graph.value_of(*id) else {
            return false;
        };
        bindings.insert(name.clone(), value);
    }
    parametric.bindings = bindings;

    if parametric.t_min.is_nan() || parametric.t_max.is_nan() || parametric.t_min >= parametric.t_max {
        return false;
    }
    let curve = Curve::from_parametric(parametric);
    curve.point_at(parametric.t_min).is_some()
}

fn recompute_polygon(polygon: &mut PolygonNode, graph: &Graph) -> bool {
    let tolerance = graph.config().intersection_tolerance;
    let count = polygon.segments.len();
    if count < 3 {
        return false;
    }

    let mut ends = Vec::with_capacity(count);
    for id in &polygon.segments {
        let Some(segment) = graph.segment_of(*id) else {
            return false;
        };
        ends.push((segment.start_vector, segment.end_vector));
    }

    // 第 i 个顶点是第 i 条与第 i+1 条线段的公共端点
    let mut vertices = Vec::with_capacity(count);
    for i in 0..count {
        let (a0, a1) = ends[i];
        let (b0, b1) = ends[(i + 1) % count];
        let shared = [a0, a1]
            .into_iter()
            .find(|v| math::coincident(v, &b0, tolerance) || math::coincident(v, &b1, tolerance));
        match shared {
            Some(v) => vertices.push(v),
            None => return false,
        }
    }

    let mut turning = 0.0;
    for i in 0..count {
        let prev = vertices[(i + count - 1) % count];
        let v = vertices[i];
        let next = vertices[(i + 1) % count];
        let eps = graph.config().degeneracy_epsilon;
        let (Some(back), Some(out)) = (
            math::normalize(&(prev - v * v.dot(&prev)), eps),
            math::normalize(&(next - v * v.dot(&next)), eps),
        ) else {
            return false;
        };
        let incoming = -back;
        turning += v.dot(&incoming.cross(&out)).atan2(incoming.dot(&out));
    }

    let enclosed = TAU - turning;
    polygon.area = enclosed.min(2.0 * TAU - enclosed);
    polygon.vertices = vertices;
    true
}

fn recompute_angle(marker: &mut AngleMarkerNode, graph: &Graph) -> bool {
    let eps = graph.config().degeneracy_epsilon;
    let value = match marker.def {
        AngleDef::Lines { first, second } => {
            let (Some(n1), Some(n2)) = (graph.normal_of(first), graph.normal_of(second)) else {
                return false;
            };
            math::arc_distance(&n1, &n2)
        }
        AngleDef::Points {
            first,
            vertex,
            second,
        } => {
            let (Some(a), Some(v), Some(c)) = (
                graph.location_of(first),
                graph.location_of(vertex),
                graph.location_of(second),
            ) else {
                return false;
            };
            let (Some(ta), Some(tc)) = (
                math::normalize(&(a - v * v.dot(&a)), eps),
                math::normalize(&(c - v * v.dot(&c)), eps),
            ) else {
                return false;
            };
            math::arc_distance(&ta, &tc)
        }
    };
    marker.value = value;
    true
}

fn recompute_measurement(measurement: &mut MeasurementNode, graph: &Graph) -> bool {
    let value = match &measurement.def {
        MeasurementDef::SegmentLength { segment } => graph.segment_of(*segment).map(|s| s.arc_length),
        MeasurementDef::PointDistance { first, second } => {
            match (graph.location_of(*first), graph.location_of(*second)) {
                (Some(a), Some(b)) => Some(math::arc_distance(&a, &b)),
                _ => None,
            }
        }
        MeasurementDef::PointCoordinate { point, axis } => {
            graph.location_of(*point).map(|p| p[axis.index()])
        }
        MeasurementDef::Calculation { expr, tokens, .. } => {
            let mut values = BTreeMap::new();
            for (name, id) in tokens {
                match graph.value_of(*id) {
                    Some(v) => {
                        values.insert(name.as_str(), v);
                    }
                    None => {
                        measurement.last_error = None;
                        return false;
                    }
                }
            }
            match expr.evaluate(&|name: &str| values.get(name).copied()) {
                Ok(v) => Some(v),
                Err(err) => {
                    measurement.last_error = Some(err.to_string());
                    return false;
                }
            }
        }
    };

    match value {
        Some(v) if v.is_finite() => {
            measurement.value = v;
            measurement.last_error = None;
            true
        }
        _ => false,
    }
}
