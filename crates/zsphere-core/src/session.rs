//! 会话
//!
//! 会话拥有依赖图、实体集合、名称注册表、撤销/重做栈与视图状态。
//! 所有命令都在某个会话上执行；不存在全局状态。
//!
//! 构造辅助方法（`free_point`、`line`、`segment` …）只分配未挂入的节点并返回命令，
//! 调用 [`Session::execute`] 后才真正修改图。曲线的构造命令会附带交点规划，
//! 整体作为一个原子命令组执行。

use crate::command::{
    resolve_tokens, AddNode, AddOtherParent, Command, CommandGroup, ConvertToUserCreated,
    DeleteNode, MovePoint, RemoveOtherParent, Reversible, RotateView, SetExpression, SetStyle,
    SetVisibility, SwapPrincipalParent,
};
use crate::config::KernelConfig;
use crate::error::{GraphError, HistoryError, OpcodeError, Result};
use crate::expression::Expr;
use crate::geometry::{
    AngleDef, AngleMarkerNode, CircleNode, EllipseNode, IntersectionData, LineDef, LineNode,
    MeasurementDef, MeasurementNode, OtherParent, ParametricNode, PointDef, PointNode,
    PolygonNode, SegmentNode, same_pair,
};
use crate::graph::Graph;
use crate::history::History;
use crate::intersection;
use crate::math::{self, Vector3};
use crate::node::{EntityKind, Node, NodeId, NodeKind, Style};
use crate::opcode::NameRegistry;
use crate::store::{Collections, EntityStore};
use nalgebra::UnitQuaternion;
use std::collections::{BTreeMap, BTreeSet};

/// 视图状态（相机朝向）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub orientation: UnitQuaternion<f64>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl ViewState {
    /// 把世界坐标中的向量转到视图坐标
    pub fn to_view(&self, v: &Vector3) -> Vector3 {
        self.orientation.inverse_transform_vector(v)
    }
}

/// 交点规划中某个解槽位最终落到的点
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// 本次新分配的交点
    Created(NodeId),
    /// 已有的交点或本次先前规划的交点
    Reused(NodeId, Record),
}

/// 为复用的交点追加的记录所在位置
#[derive(Debug, Clone, Copy)]
enum Record {
    /// 曲线对已经记录过
    Known,
    /// 待执行的 `AddOtherParent` 列表中的下标
    Pending(usize),
    /// 直接写入未挂入交点的 `others` 下标
    Dormant(usize),
}

/// 构造会话
#[derive(Debug)]
pub struct Session {
    pub(crate) graph: Graph,
    pub(crate) store: Box<dyn EntityStore>,
    pub(crate) registry: NameRegistry,
    pub(crate) view: ViewState,
    history: History,
    counters: BTreeMap<EntityKind, u32>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Session {
    pub fn new(config: KernelConfig) -> Self {
        Self::with_store(config, Box::new(Collections::new()))
    }

    /// 使用外部提供的实体集合
    pub fn with_store(config: KernelConfig, store: Box<dyn EntityStore>) -> Self {
        Self {
            graph: Graph::new(config),
            store,
            registry: NameRegistry::new(),
            view: ViewState::default(),
            history: History::new(),
            counters: BTreeMap::new(),
        }
    }

    // === 访问 ===

    pub fn config(&self) -> &KernelConfig {
        self.graph.config()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn node(&self, id: NodeId) -> std::result::Result<&Node, GraphError> {
        self.graph.node(id)
    }

    /// 按名称查找节点（包括已删除但仍可重做的节点）
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.registry.get(name)
    }

    pub fn resolve(&self, name: &str) -> std::result::Result<NodeId, OpcodeError> {
        self.registry.resolve(name)
    }

    pub fn name_of(&self, id: NodeId) -> String {
        self.graph
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// 操作码中数值的小数位数
    pub fn precision(&self) -> usize {
        self.config().opcode_precision
    }

    /// 清空会话：图、集合、名称、历史与视图
    pub fn reset(&mut self) {
        let attached: Vec<(EntityKind, NodeId)> = self
            .graph
            .attached()
            .map(|n| (n.entity_kind(), n.id))
            .collect();
        for (kind, id) in attached {
            self.store.remove(kind, id);
        }
        self.graph.clear();
        self.registry.clear();
        self.history.clear();
        self.counters.clear();
        self.view = ViewState::default();
    }

    // === 分配 ===

    fn next_name(&mut self, kind: EntityKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        loop {
            *counter += 1;
            let name = format!("{}{}", kind.name_prefix(), counter);
            if !self.registry.contains(&name) {
                return name;
            }
        }
    }

    /// 分配一个未挂入的节点并登记名称；`None` 时自动命名
    pub(crate) fn allocate(&mut self, name: Option<String>, kind: NodeKind) -> Result<NodeId> {
        let name = match name {
            Some(name) if self.registry.contains(&name) => {
                return Err(OpcodeError::BadValue {
                    field: "objectName".to_string(),
                    value: name,
                }
                .into())
            }
            Some(name) => name,
            None => self.next_name(kind.entity_kind()),
        };
        let id = self.graph.allocate(name.clone(), kind);
        self.registry.register(name, id);
        Ok(id)
    }

    fn add(&mut self, kind: NodeKind) -> Result<Command> {
        let id = self.allocate(None, kind)?;
        Ok(Command::AddNode(AddNode::capture(self, id)?))
    }

    fn add_curve(&mut self, kind: NodeKind) -> Result<Command> {
        let id = self.allocate(None, kind)?;
        let command = Command::AddNode(AddNode::capture(self, id)?);
        self.with_intersections(command)
    }

    // === 执行与撤销 ===

    /// 执行命令并压入撤销栈，清空重做栈
    pub fn execute(&mut self, mut command: Command) -> Result<()> {
        command.save_state(self)?;
        command.apply(self)?;
        self.history.push_undo(command);
        self.history.clear_redo();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<()> {
        let mut command = self.history.pop_undo().ok_or(HistoryError::NothingToUndo)?;
        if let Err(err) = command.restore_state(self) {
            self.history.push_undo(command);
            return Err(err);
        }
        tracing::info!(remaining = self.history.undo_len(), "undo");
        self.history.push_redo(command);
        Ok(())
    }

    /// 重新执行最近撤销的命令（不清空重做栈中其余命令）
    pub fn redo(&mut self) -> Result<()> {
        let mut command = self.history.pop_redo().ok_or(HistoryError::NothingToRedo)?;
        let step = command.save_state(self).and_then(|_| command.apply(self));
        if let Err(err) = step {
            self.history.push_redo(command);
            return Err(err);
        }
        tracing::info!(remaining = self.history.redo_len(), "redo");
        self.history.push_undo(command);
        Ok(())
    }

    // === 点 ===

    pub fn free_point(&mut self, location: Vector3) -> Result<Command> {
        self.point(PointDef::Free, location)
    }

    /// 按任意定义构造点；`location` 作为初始位置（曲线上的点据此投影）
    pub fn point(&mut self, def: PointDef, location: Vector3) -> Result<Command> {
        let eps = self.config().degeneracy_epsilon;
        let location = math::normalize(&location, eps).unwrap_or_else(Vector3::z);
        self.add(NodeKind::Point(PointNode::new(def, location)))
    }

    // === 曲线 ===

    /// 过两点的直线
    pub fn line(&mut self, start: NodeId, end: NodeId) -> Result<Command> {
        self.add_curve(NodeKind::Line(LineNode::new(LineDef::ThroughPoints {
            start,
            end,
        })))
    }

    /// 某点的极线
    pub fn polar_line(&mut self, pole: NodeId) -> Result<Command> {
        self.add_curve(NodeKind::Line(LineNode::new(LineDef::Polar { pole })))
    }

    pub fn segment(&mut self, start: NodeId, end: NodeId) -> Result<Command> {
        self.add_curve(NodeKind::Segment(SegmentNode::new(start, end)))
    }

    pub fn circle(&mut self, center: NodeId, circle_point: NodeId) -> Result<Command> {
        self.add_curve(NodeKind::Circle(CircleNode::new(center, circle_point)))
    }

    pub fn ellipse(&mut self, focus1: NodeId, focus2: NodeId, ellipse_point: NodeId) -> Result<Command> {
        self.add_curve(NodeKind::Ellipse(EllipseNode::new(
            focus1,
            focus2,
            ellipse_point,
        )))
    }

    /// 参数曲线；表达式中除 `t` 以外的记号按节点名称解析
    pub fn parametric(
        &mut self,
        coordinates: [&str; 3],
        t_min: f64,
        t_max: f64,
        cusps: Vec<f64>,
        closed: bool,
    ) -> Result<Command> {
        let parametric = ParametricNode::new(
            coordinates.map(str::to_string),
            t_min,
            t_max,
            cusps,
            closed,
        )?;
        let tokens = resolve_tokens(&parametric.exprs.iter().collect::<Vec<_>>(), self)?;
        self.add_curve(NodeKind::Parametric(ParametricNode {
            tokens,
            ..parametric
        }))
    }

    // === 度量 ===

    pub fn polygon(&mut self, segments: Vec<NodeId>) -> Result<Command> {
        self.add(NodeKind::Polygon(PolygonNode::new(segments)))
    }

    pub fn angle_marker(&mut self, def: AngleDef) -> Result<Command> {
        self.add(NodeKind::AngleMarker(AngleMarkerNode { def, value: 0.0 }))
    }

    pub fn measurement(&mut self, def: MeasurementDef) -> Result<Command> {
        self.add(NodeKind::Measurement(MeasurementNode::new(def)))
    }

    /// 计算度量，表达式中的记号是其他度量的名称
    pub fn calculation(&mut self, text: &str) -> Result<Command> {
        let expr = Expr::parse(text)?;
        let tokens = resolve_tokens(&[&expr], self)?;
        self.measurement(MeasurementDef::Calculation {
            text: text.to_string(),
            expr,
            tokens,
        })
    }

    // === 修改 ===

    pub fn move_point(&mut self, point: NodeId, to: Vector3) -> Result<Command> {
        let from = self
            .graph
            .node(point)?
            .kind
            .location()
            .ok_or(GraphError::WrongKind(point))?;
        Ok(Command::MovePoint(MovePoint::new(point, from, to)))
    }

    pub fn set_visibility(&self, id: NodeId, showing: bool) -> Command {
        Command::SetVisibility(SetVisibility::new(id, showing))
    }

    pub fn set_style(&self, id: NodeId, style: Style) -> Command {
        Command::SetStyle(SetStyle::new(id, style))
    }

    pub fn set_expression(&self, id: NodeId, text: &str) -> Result<Command> {
        let expr = Expr::parse(text)?;
        let tokens = resolve_tokens(&[&expr], self)?;
        Ok(Command::SetExpression(SetExpression::new(
            id,
            text.to_string(),
            expr,
            tokens,
        )))
    }

    pub fn convert_to_user_created(&self, point: NodeId) -> Command {
        Command::ConvertToUserCreated(ConvertToUserCreated::new(point))
    }

    pub fn rotate_view(&self, axis: Vector3, angle: f64) -> Command {
        Command::RotateView(RotateView::new(axis, angle))
    }

    // === 交点规划 ===

    /// 把曲线的添加命令与其交点规划合成一个命令组
    pub fn with_intersections(&mut self, command: Command) -> Result<Command> {
        let Some(curve) = command.created() else {
            return Ok(command);
        };
        let planned = self.plan_intersections(curve)?;
        if planned.is_empty() {
            return Ok(command);
        }
        let mut group = CommandGroup::new(vec![command]);
        for member in planned {
            group.push(member);
        }
        Ok(Command::Group(group))
    }

    /// 为一条（未挂入的）新曲线规划交点命令
    ///
    /// - 与已挂入交点重合的解记录为该交点的其他父曲线对，
    ///   会形成环的记录直接跳过
    /// - 与本次先前规划的交点重合的解并入该交点
    /// - 其余的解分配新的隐藏交点
    /// - 直线×直线的两个槽位互为对径点
    pub fn plan_intersections(&mut self, curve: NodeId) -> Result<Vec<Command>> {
        let tolerance = self.config().intersection_tolerance;
        let curve_parents = self.graph.node(curve)?.kind.defining_parents();
        let candidates = intersection::candidates(&self.graph, curve);

        let mut created: Vec<NodeId> = Vec::new();
        let mut records: Vec<(NodeId, OtherParent)> = Vec::new();

        for pair_candidates in candidates.chunk_by(|a, b| a.pair == b.pair) {
            let mut slots: Vec<Option<Slot>> = Vec::with_capacity(pair_candidates.len());
            for candidate in pair_candidates {
                let (existing_curve, _) = candidate.pair;
                let record = OtherParent::new(candidate.pair, candidate.order);

                if let Some(point) = candidate.existing {
                    let data = self
                        .graph
                        .node(point)?
                        .kind
                        .intersection()
                        .ok_or(GraphError::WrongKind(point))?;
                    let cycles = self.graph.is_descendant(point, existing_curve)
                        || curve_parents
                            .iter()
                            .any(|p| *p == point || self.graph.is_descendant(point, *p));
                    // 切点：同一曲线对的两个槽位落在同一交点上
                    let queued = records
                        .iter()
                        .any(|(p, r)| *p == point && same_pair(r.parents, record.parents));
                    if queued || data.has_pair(record.parents.0, record.parents.1) {
                        slots.push(Some(Slot::Reused(point, Record::Known)));
                    } else if cycles {
                        tracing::warn!(
                            point = %point,
                            curve = %curve,
                            "skipping intersection record that would create a cycle"
                        );
                        slots.push(None);
                    } else {
                        records.push((point, record));
                        slots.push(Some(Slot::Reused(point, Record::Pending(records.len() - 1))));
                    }
                    continue;
                }

                let earlier = candidate
                    .solution
                    .exists
                    .then(|| {
                        created.iter().copied().find(|id| {
                            self.graph.get(*id).is_some_and(|n| {
                                n.exists
                                    && n.kind.location().is_some_and(|v| {
                                        math::coincident(&v, &candidate.solution.vector, tolerance)
                                    })
                            })
                        })
                    })
                    .flatten();
                if let Some(point) = earlier {
                    let data = self
                        .graph
                        .node_mut(point)?
                        .kind
                        .intersection_mut()
                        .ok_or(GraphError::WrongKind(point))?;
                    if data.has_pair(record.parents.0, record.parents.1) {
                        slots.push(Some(Slot::Reused(point, Record::Known)));
                    } else {
                        data.others.push(record);
                        let index = data.others.len() - 1;
                        slots.push(Some(Slot::Reused(point, Record::Dormant(index))));
                    }
                    continue;
                }

                let data = IntersectionData::new(candidate.pair, candidate.order);
                let point = self.allocate(
                    None,
                    NodeKind::Point(PointNode::new(
                        PointDef::Intersection(data),
                        candidate.solution.vector,
                    )),
                )?;
                self.graph.node_mut(point)?.showing = false;
                created.push(point);
                slots.push(Some(Slot::Created(point)));
            }

            if pair_candidates.first().is_some_and(|c| c.straight) {
                self.link_antipodes(&slots, &mut records)?;
            }
        }

        let mut commands = Vec::with_capacity(created.len() + records.len());
        for id in &created {
            commands.push(Command::AddNode(AddNode::capture(self, *id)?));
        }
        for (point, record) in records {
            commands.push(Command::AddOtherParent(AddOtherParent::new(point, record)));
        }
        tracing::debug!(curve = %curve, commands = commands.len(), "intersections planned");
        Ok(commands)
    }

    /// 直线×直线的两个槽位建立对径耦合
    fn link_antipodes(
        &mut self,
        slots: &[Option<Slot>],
        records: &mut [(NodeId, OtherParent)],
    ) -> Result<()> {
        let [Some(first), Some(second)] = slots else {
            return Ok(());
        };
        match (*first, *second) {
            (Slot::Created(a), Slot::Created(b)) => self.set_antipode(b, a),
            (Slot::Created(new), Slot::Reused(existing, record))
            | (Slot::Reused(existing, record), Slot::Created(new)) => {
                self.set_antipode(new, existing)?;
                self.flag_creates_antipode(existing, record, records)
            }
            _ => Ok(()),
        }
    }

    fn set_antipode(&mut self, point: NodeId, partner: NodeId) -> Result<()> {
        if let Some(data) = self.graph.node_mut(point)?.kind.intersection_mut() {
            data.antipode = Some(partner);
        }
        Ok(())
    }

    fn flag_creates_antipode(
        &mut self,
        point: NodeId,
        record: Record,
        records: &mut [(NodeId, OtherParent)],
    ) -> Result<()> {
        match record {
            Record::Dormant(index) => {
                if let Some(data) = self.graph.node_mut(point)?.kind.intersection_mut() {
                    if let Some(r) = data.others.get_mut(index) {
                        r.creates_antipode = true;
                    }
                }
            }
            Record::Pending(index) => {
                if let Some((_, r)) = records.get_mut(index) {
                    r.creates_antipode = true;
                }
            }
            Record::Known => {}
        }
        Ok(())
    }

    // === 删除规划 ===

    /// 删除节点的完整命令组
    ///
    /// 删除交点时同时删除其对径点。受影响的交点若仍有存活的曲线对则保留：
    /// 主父曲线对失效时先与存活记录交换，再移除失效记录。
    pub fn plan_delete(&mut self, target: NodeId) -> Result<Command> {
        let mut roots = vec![target];
        if let Some(partner) = self.graph.node(target)?.kind.intersection().and_then(|d| d.antipode) {
            if self.graph.get(partner).is_some_and(Node::is_attached) {
                roots.push(partner);
            }
        }

        let mut doomed: BTreeSet<NodeId> = roots.iter().copied().collect();
        let mut commands = Vec::new();
        let alive = |doomed: &BTreeSet<NodeId>, pair: (NodeId, NodeId)| {
            !doomed.contains(&pair.0) && !doomed.contains(&pair.1)
        };

        for id in self.graph.descendants_of(&roots) {
            let node = self.graph.node(id)?;
            if let Some(data) = node.kind.intersection() {
                if alive(&doomed, data.principal) {
                    for record in data.others.iter().filter(|r| !alive(&doomed, r.parents)) {
                        commands.push(Command::RemoveOtherParent(RemoveOtherParent::new(
                            id,
                            record.parents,
                        )));
                    }
                    continue;
                }
                if let Some(survivor) = data.others.iter().find(|r| alive(&doomed, r.parents)) {
                    commands.push(Command::SwapPrincipalParent(SwapPrincipalParent::new(
                        id,
                        survivor.parents,
                    )));
                    commands.push(Command::RemoveOtherParent(RemoveOtherParent::new(
                        id,
                        data.principal,
                    )));
                    for record in data.others.iter().filter(|r| !alive(&doomed, r.parents)) {
                        commands.push(Command::RemoveOtherParent(RemoveOtherParent::new(
                            id,
                            record.parents,
                        )));
                    }
                    tracing::debug!(point = %id, "principal parents swapped before delete");
                    continue;
                }
            }
            if node.parents().iter().any(|p| doomed.contains(p)) {
                doomed.insert(id);
            }
        }

        for root in &roots {
            let covered = roots
                .iter()
                .any(|other| other != root && self.graph.is_descendant(*other, *root));
            if !covered {
                commands.push(Command::DeleteNode(DeleteNode::new(*root)));
            }
        }
        Ok(Command::Group(CommandGroup::new(commands)))
    }
}
