//! 实体集合
//!
//! 渲染层可见的集合由外部提供。内核在命令执行时通过 [`EntityStore`]
//! 把节点加入或移出对应种类的集合，默认实现 [`Collections`] 只记录句柄。

use crate::node::{EntityKind, NodeId};
use std::collections::BTreeSet;

/// 按实体种类划分的全局集合接口
pub trait EntityStore: std::fmt::Debug {
    fn add_point(&mut self, id: NodeId);
    fn remove_point(&mut self, id: NodeId);
    fn add_line(&mut self, id: NodeId);
    fn remove_line(&mut self, id: NodeId);
    fn add_segment(&mut self, id: NodeId);
    fn remove_segment(&mut self, id: NodeId);
    fn add_circle(&mut self, id: NodeId);
    fn remove_circle(&mut self, id: NodeId);
    fn add_ellipse(&mut self, id: NodeId);
    fn remove_ellipse(&mut self, id: NodeId);
    fn add_parametric(&mut self, id: NodeId);
    fn remove_parametric(&mut self, id: NodeId);
    fn add_polygon(&mut self, id: NodeId);
    fn remove_polygon(&mut self, id: NodeId);
    fn add_angle_marker(&mut self, id: NodeId);
    fn remove_angle_marker(&mut self, id: NodeId);
    fn add_measurement(&mut self, id: NodeId);
    fn remove_measurement(&mut self, id: NodeId);

    /// 节点当前是否在某个集合中
    fn contains(&self, id: NodeId) -> bool;

    /// 按种类分派到对应的 `add_*`
    fn insert(&mut self, kind: EntityKind, id: NodeId) {
        match kind {
            EntityKind::Point => self.add_point(id),
            EntityKind::Line => self.add_line(id),
            EntityKind::Segment => self.add_segment(id),
            EntityKind::Circle => self.add_circle(id),
            EntityKind::Ellipse => self.add_ellipse(id),
            EntityKind::Parametric => self.add_parametric(id),
            EntityKind::Polygon => self.add_polygon(id),
            EntityKind::AngleMarker => self.add_angle_marker(id),
            EntityKind::Measurement => self.add_measurement(id),
        }
    }

    /// 按种类分派到对应的 `remove_*`
    fn remove(&mut self, kind: EntityKind, id: NodeId) {
        match kind {
            EntityKind::Point => self.remove_point(id),
            EntityKind::Line => self.remove_line(id),
            EntityKind::Segment => self.remove_segment(id),
            EntityKind::Circle => self.remove_circle(id),
            EntityKind::Ellipse => self.remove_ellipse(id),
            EntityKind::Parametric => self.remove_parametric(id),
            EntityKind::Polygon => self.remove_polygon(id),
            EntityKind::AngleMarker => self.remove_angle_marker(id),
            EntityKind::Measurement => self.remove_measurement(id),
        }
    }
}

/// 默认集合实现
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collections {
    pub points: BTreeSet<NodeId>,
    pub lines: BTreeSet<NodeId>,
    pub segments: BTreeSet<NodeId>,
    pub circles: BTreeSet<NodeId>,
    pub ellipses: BTreeSet<NodeId>,
    pub parametrics: BTreeSet<NodeId>,
    pub polygons: BTreeSet<NodeId>,
    pub angle_markers: BTreeSet<NodeId>,
    pub measurements: BTreeSet<NodeId>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有集合中的节点总数
    pub fn len(&self) -> usize {
        self.sets().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sets(&self) -> impl Iterator<Item = &BTreeSet<NodeId>> {
        [
            &self.points,
            &self.lines,
            &self.segments,
            &self.circles,
            &self.ellipses,
            &self.parametrics,
            &self.polygons,
            &self.angle_markers,
            &self.measurements,
        ]
        .into_iter()
    }
}

impl EntityStore for Collections {
    fn add_point(&mut self, id: NodeId) {
        self.points.insert(id);
    }

    fn remove_point(&mut self, id: NodeId) {
        self.points.remove(&id);
    }

    fn add_line(&mut self, id: NodeId) {
        self.lines.insert(id);
    }

    fn remove_line(&mut self, id: NodeId) {
        self.lines.remove(&id);
    }

    fn add_segment(&mut self, id: NodeId) {
        self.segments.insert(id);
    }

    fn remove_segment(&mut self, id: NodeId) {
        self.segments.remove(&id);
    }

    fn add_circle(&mut self, id: NodeId) {
        self.circles.insert(id);
    }

    fn remove_circle(&mut self, id: NodeId) {
        self.circles.remove(&id);
    }

    fn add_ellipse(&mut self, id: NodeId) {
        self.ellipses.insert(id);
    }

    fn remove_ellipse(&mut self, id: NodeId) {
        self.ellipses.remove(&id);
    }

    fn add_parametric(&mut self, id: NodeId) {
        self.parametrics.insert(id);
    }

    fn remove_parametric(&mut self, id: NodeId) {
        self.parametrics.remove(&id);
    }

    fn add_polygon(&mut self, id: NodeId) {
        self.polygons.insert(id);
    }

    fn remove_polygon(&mut self, id: NodeId) {
        self.polygons.remove(&id);
    }

    fn add_angle_marker(&mut self, id: NodeId) {
        self.angle_markers.insert(id);
    }

    fn remove_angle_marker(&mut self, id: NodeId) {
        self.angle_markers.remove(&id);
    }

    fn add_measurement(&mut self, id: NodeId) {
        self.measurements.insert(id);
    }

    fn remove_measurement(&mut self, id: NodeId) {
        self.measurements.remove(&id);
    }

    fn contains(&self, id: NodeId) -> bool {
        self.sets().any(|set| set.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_dispatches_by_kind() {
        let mut store = Collections::new();
        store.insert(EntityKind::Circle, NodeId(3));
        store.insert(EntityKind::Measurement, NodeId(4));
        assert!(store.circles.contains(&NodeId(3)));
        assert!(store.contains(NodeId(4)));
        assert_eq!(store.len(), 2);

        store.remove(EntityKind::Circle, NodeId(3));
        assert!(!store.contains(NodeId(3)));
        assert_eq!(store.len(), 1);
    }
}
