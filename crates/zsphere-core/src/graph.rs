//! 依赖图与更新传播
//!
//! 所有节点存放在一个竞技场 (`Vec<Node>`) 中，通过 [`NodeId`] 下标互相引用。
//! 父子关系保存为有序集合，环检测是一次可达性查询。
//!
//! 更新分两步：
//! 1. `mark_kids_out_of_date` 标记整个下游集合
//! 2. 按 Kahn 顺序只重算“被标记且所有被标记父节点都已清理”的节点，
//!    同一时刻就绪的节点按 `NodeId` 升序处理，保证传播顺序确定

use crate::config::KernelConfig;
use crate::curve::Curve;
use crate::error::GraphError;
use crate::geometry::{self, SegmentNode};
use crate::math::Vector3;
use crate::node::{Node, NodeId, NodeKind, NodeSnapshot};
use std::collections::{BTreeSet, VecDeque};

/// 更新模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// 只重算几何值
    DisplayOnly,
    /// 重算的同时记录每个被访问节点的旧值
    RecordState,
}

/// 依赖图
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    config: KernelConfig,
}

impl Graph {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// 竞技场中的节点数（包括未挂入的节点）
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    // === 节点访问 ===

    /// 分配一个未挂入图的节点，并用父节点当前值预先计算一次
    pub(crate) fn allocate(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, name.into(), kind));
        self.refresh(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.get(id).ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.get_mut(id).ok_or(GraphError::UnknownNode(id))
    }

    /// 全部节点（包括未挂入的节点）
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// 已挂入图的节点
    pub fn attached(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.attached)
    }

    /// 按名称查找已挂入的节点
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.attached().find(|n| n.name == name).map(|n| n.id)
    }

    // === 父子关系 ===

    /// 把 `child` 注册为 `parent` 的子节点
    ///
    /// 若 `parent` 已经是 `child` 的后代（或两者相同）则拒绝
    pub fn register_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.node(parent)?;
        self.node(child)?;
        if parent == child || self.is_descendant(child, parent) {
            return Err(GraphError::Cycle { parent, child });
        }
        self.node_mut(parent)?.kids.insert(child);
        self.node_mut(child)?.parents.insert(parent);
        Ok(())
    }

    /// 解除父子关系，重复调用无副作用
    pub fn unregister_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.node(parent)?;
        self.node(child)?;
        self.node_mut(parent)?.kids.remove(&child);
        self.node_mut(child)?.parents.remove(&parent);
        Ok(())
    }

    /// `node` 是否可以从 `ancestor` 沿子节点到达
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([ancestor]);
        while let Some(current) = queue.pop_front() {
            let Some(n) = self.get(current) else {
                continue;
            };
            for kid in &n.kids {
                if *kid == node {
                    return true;
                }
                if seen.insert(*kid) {
                    queue.push_back(*kid);
                }
            }
        }
        false
    }

    /// `root` 的全部后代，按拓扑顺序（不含 `root`）
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants_of(&[root])
    }

    /// 多个根的后代并集，按拓扑顺序（不含根本身）
    pub fn descendants_of(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut downstream = BTreeSet::new();
        for root in roots {
            downstream.extend(self.downstream(*root));
        }
        for root in roots {
            downstream.remove(root);
        }
        let mut pending: BTreeSet<NodeId> = downstream.clone();
        let mut ready = BTreeSet::new();
        let mut order = Vec::with_capacity(downstream.len());

        let release = |done: NodeId, pending: &BTreeSet<NodeId>, ready: &mut BTreeSet<NodeId>| {
            if let Some(n) = self.get(done) {
                for kid in &n.kids {
                    let blocked = self
                        .get(*kid)
                        .map(|k| k.parents.iter().any(|p| pending.contains(p)))
                        .unwrap_or(true);
                    if pending.contains(kid) && !blocked {
                        ready.insert(*kid);
                    }
                }
            }
        };

        for root in roots {
            release(*root, &pending, &mut ready);
        }
        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            order.push(id);
            release(id, &pending, &mut ready);
        }
        order
    }

    fn downstream(&self, root: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            if let Some(n) = self.get(current) {
                for kid in &n.kids {
                    if seen.insert(*kid) {
                        queue.push_back(*kid);
                    }
                }
            }
        }
        seen
    }

    // === 挂入与摘下 ===

    /// 把节点挂入图：逐个注册定义父节点
    pub(crate) fn attach(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node(id)?;
        if node.attached {
            return Err(GraphError::AlreadyAttached(id));
        }
        let parents = node.kind.defining_parents();
        for parent in &parents {
            if !self.node(*parent)?.attached {
                return Err(GraphError::NotAttached(*parent));
            }
        }

        let mut registered = Vec::with_capacity(parents.len());
        for parent in parents {
            if let Err(err) = self.register_child(parent, id) {
                for done in registered {
                    self.unregister_child(done, id)?;
                }
                return Err(err);
            }
            registered.push(parent);
        }
        self.node_mut(id)?.attached = true;
        Ok(())
    }

    /// 把节点从图中摘下：解除与所有父节点的关系
    ///
    /// 节点必须已经没有挂入的子节点
    pub(crate) fn detach(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node(id)?;
        if !node.attached {
            return Err(GraphError::NotAttached(id));
        }
        if !node.kids.is_empty() {
            return Err(GraphError::HasDependents(id));
        }
        let parents: Vec<NodeId> = node.parents.iter().copied().collect();
        for parent in parents {
            self.unregister_child(parent, id)?;
        }
        self.node_mut(id)?.attached = false;
        Ok(())
    }

    // === 更新传播 ===

    /// 标记整个下游集合为过期，返回被标记的节点数
    pub fn mark_kids_out_of_date(&mut self, root: NodeId) -> usize {
        let downstream = self.downstream(root);
        for id in &downstream {
            if let Some(n) = self.get_mut(*id) {
                n.out_of_date = true;
            }
        }
        downstream.len()
    }

    /// 从 `root` 开始更新，返回实际重算的节点顺序
    ///
    /// `RecordState` 模式下，每个节点在被覆盖前把旧值追加到 `log`
    pub fn update(
        &mut self,
        root: NodeId,
        mode: UpdateMode,
        log: &mut Vec<NodeSnapshot>,
    ) -> Result<Vec<NodeId>, GraphError> {
        self.node_mut(root)?.out_of_date = true;
        let marked = self.mark_kids_out_of_date(root);

        let mut ready = BTreeSet::from([root]);
        let mut order = Vec::with_capacity(marked + 1);
        while let Some(id) = ready.pop_first() {
            if mode == UpdateMode::RecordState {
                log.push(NodeSnapshot {
                    id,
                    prior: self.node(id)?.clone(),
                });
            }
            self.refresh(id);
            order.push(id);

            let kids: Vec<NodeId> = self.node(id)?.kids.iter().copied().collect();
            for kid in kids {
                let node = self.node(kid)?;
                let parents_clean = node
                    .parents
                    .iter()
                    .all(|p| self.get(*p).map(|n| !n.out_of_date).unwrap_or(true));
                if node.out_of_date && parents_clean {
                    ready.insert(kid);
                }
            }
        }

        tracing::debug!(root = %root, visited = order.len(), "update pass");
        Ok(order)
    }

    /// 只重算单个节点（不传播）
    pub(crate) fn refresh(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let was = node.exists;
        let mut kind = node.kind.clone();
        let exists = geometry::recompute(&mut kind, self);
        if was && !exists {
            tracing::debug!(node = %id, "node became undefined");
        }
        if let Some(node) = self.get_mut(id) {
            node.kind = kind;
            node.exists = exists;
            node.out_of_date = false;
        }
    }

    /// 记录 `root` 及其全部后代的当前值
    pub(crate) fn snapshot(&self, root: NodeId) -> Result<Vec<NodeSnapshot>, GraphError> {
        std::iter::once(root)
            .chain(self.descendants(root))
            .map(|id| {
                Ok(NodeSnapshot {
                    id,
                    prior: self.node(id)?.clone(),
                })
            })
            .collect()
    }

    /// 写回快照中的值（不改变父子关系与挂入状态）
    pub(crate) fn restore_values(&mut self, snapshots: &[NodeSnapshot]) -> Result<(), GraphError> {
        for snapshot in snapshots {
            let node = self.node_mut(snapshot.id)?;
            node.kind = snapshot.prior.kind.clone();
            node.exists = snapshot.prior.exists;
            node.out_of_date = false;
        }
        Ok(())
    }

    // === 父节点数据读取（供重算公式使用） ===

    /// 存在的点的位置
    pub fn location_of(&self, id: NodeId) -> Option<Vector3> {
        self.get(id)?.location()
    }

    /// 存在的度量、角度或多边形的标量值
    pub fn value_of(&self, id: NodeId) -> Option<f64> {
        self.get(id)?.value()
    }

    /// 存在的直线或线段的法向
    pub fn normal_of(&self, id: NodeId) -> Option<Vector3> {
        let node = self.get(id)?;
        if !node.exists {
            return None;
        }
        match &node.kind {
            NodeKind::Line(line) => Some(line.normal),
            NodeKind::Segment(segment) => Some(segment.normal),
            _ => None,
        }
    }

    /// 存在的线段
    pub fn segment_of(&self, id: NodeId) -> Option<&SegmentNode> {
        let node = self.get(id)?;
        match &node.kind {
            NodeKind::Segment(segment) if node.exists => Some(segment),
            _ => None,
        }
    }

    /// 存在的曲线的几何视图
    pub fn curve_of(&self, id: NodeId) -> Option<Curve> {
        Curve::of(self.get(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LineDef, LineNode, PointDef, PointNode, SegmentNode};

    fn free_point(graph: &mut Graph, name: &str, v: Vector3) -> NodeId {
        let id = graph.allocate(name, NodeKind::Point(PointNode::free(v.normalize())));
        graph.attach(id).unwrap();
        id
    }

    fn segment(graph: &mut Graph, name: &str, a: NodeId, b: NodeId) -> NodeId {
        let id = graph.allocate(name, NodeKind::Segment(SegmentNode::new(a, b)));
        graph.attach(id).unwrap();
        id
    }

    #[test]
    fn test_register_refuses_cycle() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", Vector3::y());
        let s = segment(&mut graph, "S", a, b);

        assert_eq!(
            graph.register_child(s, a),
            Err(GraphError::Cycle { parent: s, child: a })
        );
        assert_eq!(
            graph.register_child(a, a),
            Err(GraphError::Cycle { parent: a, child: a })
        );
        assert!(graph.is_descendant(a, s));
        assert!(!graph.is_descendant(s, a));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", Vector3::y());
        let s = segment(&mut graph, "S", a, b);

        graph.unregister_child(a, s).unwrap();
        graph.unregister_child(a, s).unwrap();
        assert!(!graph.node(a).unwrap().kids().contains(&s));
        assert!(!graph.node(s).unwrap().parents().contains(&a));
        assert_eq!(
            graph.unregister_child(a, NodeId(99)),
            Err(GraphError::UnknownNode(NodeId(99)))
        );
    }

    #[test]
    fn test_update_visits_parents_first() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", Vector3::y());
        let line = graph.allocate(
            "L",
            NodeKind::Line(LineNode::new(LineDef::ThroughPoints { start: a, end: b })),
        );
        graph.attach(line).unwrap();
        let pole = graph.allocate(
            "Q",
            NodeKind::Point(PointNode::new(
                PointDef::Polar { line, index: 0 },
                Vector3::z(),
            )),
        );
        graph.attach(pole).unwrap();
        // 同时依赖 A 与 Q 的线段
        let s = segment(&mut graph, "S", a, pole);

        let order = graph.update(a, UpdateMode::DisplayOnly, &mut Vec::new()).unwrap();
        assert_eq!(order, vec![a, line, pole, s]);
        assert_eq!(graph.descendants(a), vec![line, pole, s]);
        assert!(graph.attached().all(|n| !n.is_out_of_date()));
    }

    #[test]
    fn test_record_state_logs_prior_values() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", Vector3::y());
        let s = segment(&mut graph, "S", a, b);

        let mut log = Vec::new();
        let order = graph.update(a, UpdateMode::RecordState, &mut log).unwrap();
        assert_eq!(order, vec![a, s]);
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].id, s);
        assert_eq!(log[1].prior.kind, graph.node(s).unwrap().kind);
    }

    #[test]
    fn test_degenerate_segment_does_not_exist() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", -Vector3::x());
        let s = segment(&mut graph, "S", a, b);
        assert!(!graph.node(s).unwrap().exists);
        assert!(graph.curve_of(s).is_none());
    }

    #[test]
    fn test_detach_requires_no_dependents() {
        let mut graph = Graph::default();
        let a = free_point(&mut graph, "A", Vector3::x());
        let b = free_point(&mut graph, "B", Vector3::y());
        let s = segment(&mut graph, "S", a, b);

        assert_eq!(graph.detach(a), Err(GraphError::HasDependents(a)));
        graph.detach(s).unwrap();
        assert!(graph.node(a).unwrap().kids().is_empty());
        graph.attach(s).unwrap();
        assert!(graph.node(a).unwrap().kids().contains(&s));
        assert_eq!(graph.attach(s), Err(GraphError::AlreadyAttached(s)));
    }

    proptest::proptest! {
        #[test]
        fn test_random_links_never_form_cycles(
            links in proptest::collection::vec((0u32..12, 0u32..12), 0..80)
        ) {
            let mut graph = Graph::default();
            let ids: Vec<NodeId> = (0..12)
                .map(|i| free_point(&mut graph, &format!("P{i}"), Vector3::x()))
                .collect();
            for (parent, child) in links {
                let _ = graph.register_child(ids[parent as usize], ids[child as usize]);
            }
            for id in &ids {
                proptest::prop_assert!(!graph.is_descendant(*id, *id));
            }
            // 拓扑序：每个后代排在其所有位于集合内的父节点之后
            let order = graph.descendants(ids[0]);
            for (index, id) in order.iter().enumerate() {
                for parent in graph.node(*id).unwrap().parents() {
                    if let Some(at) = order.iter().position(|o| o == parent) {
                        proptest::prop_assert!(at < index);
                    }
                }
            }
        }
    }
}
