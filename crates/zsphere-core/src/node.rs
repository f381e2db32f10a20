//! 依赖图节点
//!
//! 每个几何实体或度量都是图中的一个节点。节点存放在 [`Graph`](crate::graph::Graph)
//! 的竞技场中，通过 [`NodeId`] 句柄相互引用：
//! - `parents`: 本节点的值由哪些节点计算而来
//! - `kids`: 哪些节点由本节点计算而来
//!
//! 节点从不被物理销毁。删除只会把节点从图中摘下（`attached = false`），
//! 重做时重新挂回同一个槽位。

use crate::geometry::{
    AngleMarkerNode, CircleNode, EllipseNode, IntersectionData, LineNode, MeasurementNode,
    ParametricNode, PointDef, PointNode, PolygonNode, SegmentNode,
};
use crate::math::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 节点句柄（竞技场下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 实体种类（不带数据的判别值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Point,
    Line,
    Segment,
    Circle,
    Ellipse,
    Parametric,
    Polygon,
    AngleMarker,
    Measurement,
}

impl EntityKind {
    /// 自动命名使用的前缀
    pub fn name_prefix(&self) -> &'static str {
        match self {
            EntityKind::Point => "P",
            EntityKind::Line => "Li",
            EntityKind::Segment => "Ls",
            EntityKind::Circle => "C",
            EntityKind::Ellipse => "E",
            EntityKind::Parametric => "Pa",
            EntityKind::Polygon => "Po",
            EntityKind::AngleMarker => "Am",
            EntityKind::Measurement => "M",
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Point => "Point",
            EntityKind::Line => "Line",
            EntityKind::Segment => "Segment",
            EntityKind::Circle => "Circle",
            EntityKind::Ellipse => "Ellipse",
            EntityKind::Parametric => "Parametric",
            EntityKind::Polygon => "Polygon",
            EntityKind::AngleMarker => "AngleMarker",
            EntityKind::Measurement => "Measurement",
        }
    }

    /// 是否是一维曲线（可参与求交）
    pub fn is_curve(&self) -> bool {
        matches!(
            self,
            EntityKind::Line
                | EntityKind::Segment
                | EntityKind::Circle
                | EntityKind::Ellipse
                | EntityKind::Parametric
        )
    }
}

/// 节点数据（按实体种类区分）
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Point(PointNode),
    Line(LineNode),
    Segment(SegmentNode),
    Circle(CircleNode),
    Ellipse(EllipseNode),
    Parametric(ParametricNode),
    Polygon(PolygonNode),
    AngleMarker(AngleMarkerNode),
    Measurement(MeasurementNode),
}

impl NodeKind {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            NodeKind::Point(_) => EntityKind::Point,
            NodeKind::Line(_) => EntityKind::Line,
            NodeKind::Segment(_) => EntityKind::Segment,
            NodeKind::Circle(_) => EntityKind::Circle,
            NodeKind::Ellipse(_) => EntityKind::Ellipse,
            NodeKind::Parametric(_) => EntityKind::Parametric,
            NodeKind::Polygon(_) => EntityKind::Polygon,
            NodeKind::AngleMarker(_) => EntityKind::AngleMarker,
            NodeKind::Measurement(_) => EntityKind::Measurement,
        }
    }

    /// 由定义决定的父节点（挂入图时逐个注册）
    pub fn defining_parents(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Point(point) => point.def.parents(),
            NodeKind::Line(line) => line.def.parents(),
            NodeKind::Segment(segment) => vec![segment.start, segment.end],
            NodeKind::Circle(circle) => vec![circle.center, circle.circle_point],
            NodeKind::Ellipse(ellipse) => {
                vec![ellipse.focus1, ellipse.focus2, ellipse.ellipse_point]
            }
            NodeKind::Parametric(parametric) => parametric.tokens.values().copied().collect(),
            NodeKind::Polygon(polygon) => polygon.segments.clone(),
            NodeKind::AngleMarker(marker) => marker.def.parents(),
            NodeKind::Measurement(measurement) => measurement.def.parents(),
        }
    }

    /// 点的位置（非点返回 None）
    pub fn location(&self) -> Option<Vector3> {
        match self {
            NodeKind::Point(point) => Some(point.location),
            _ => None,
        }
    }

    /// 交点数据
    pub fn intersection(&self) -> Option<&IntersectionData> {
        match self {
            NodeKind::Point(PointNode {
                def: PointDef::Intersection(data),
                ..
            }) => Some(data),
            _ => None,
        }
    }

    pub fn intersection_mut(&mut self) -> Option<&mut IntersectionData> {
        match self {
            NodeKind::Point(PointNode {
                def: PointDef::Intersection(data),
                ..
            }) => Some(data),
            _ => None,
        }
    }

    /// 标量值（度量、角度标记、多边形面积）
    pub fn value(&self) -> Option<f64> {
        match self {
            NodeKind::Measurement(measurement) => Some(measurement.value),
            NodeKind::AngleMarker(marker) => Some(marker.value),
            NodeKind::Polygon(polygon) => Some(polygon.area),
            _ => None,
        }
    }
}

/// 样式负载
///
/// 内核不解释其内容，只负责保存、撤销与序列化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub entries: BTreeMap<String, String>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// 图节点
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// 句柄
    pub id: NodeId,

    /// 稳定名称（脚本中通过名称引用）
    pub name: String,

    /// 实体数据
    pub kind: NodeKind,

    /// 逻辑上是否有定义
    pub exists: bool,

    /// 是否可见
    pub showing: bool,

    /// 标签（由外部样式/标签子系统挂接）
    pub label: Option<NodeId>,

    /// 样式负载
    pub style: Style,

    pub(crate) out_of_date: bool,
    pub(crate) attached: bool,
    pub(crate) parents: BTreeSet<NodeId>,
    pub(crate) kids: BTreeSet<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            kind,
            exists: true,
            showing: true,
            label: None,
            style: Style::default(),
            out_of_date: false,
            attached: false,
            parents: BTreeSet::new(),
            kids: BTreeSet::new(),
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.kind.entity_kind()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date
    }

    pub fn parents(&self) -> &BTreeSet<NodeId> {
        &self.parents
    }

    pub fn kids(&self) -> &BTreeSet<NodeId> {
        &self.kids
    }

    /// 存在时的位置
    pub fn location(&self) -> Option<Vector3> {
        if self.exists {
            self.kind.location()
        } else {
            None
        }
    }

    /// 存在时的标量值
    pub fn value(&self) -> Option<f64> {
        if self.exists {
            self.kind.value()
        } else {
            None
        }
    }
}

/// 更新前的节点快照（删除前记录，撤销时恢复）
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub prior: Node,
}
