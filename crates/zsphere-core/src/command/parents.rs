//! 交点父曲线记录相关命令

use super::Reversible;
use crate::error::{GraphError, Result};
use crate::geometry::{same_pair, IntersectionData, OtherParent};
use crate::graph::{Graph, UpdateMode};
use crate::node::NodeId;
use crate::opcode::{OpcodeBuilder, OpcodeFields};
use crate::session::Session;

fn intersection(graph: &Graph, point: NodeId) -> std::result::Result<&IntersectionData, GraphError> {
    graph
        .node(point)?
        .kind
        .intersection()
        .ok_or(GraphError::WrongKind(point))
}

fn intersection_mut(
    graph: &mut Graph,
    point: NodeId,
) -> std::result::Result<&mut IntersectionData, GraphError> {
    graph
        .node_mut(point)?
        .kind
        .intersection_mut()
        .ok_or(GraphError::WrongKind(point))
}

/// 解除不再被任何曲线对引用的父关系
fn release_unreferenced(graph: &mut Graph, point: NodeId, pair: (NodeId, NodeId)) -> Result<()> {
    let referenced = intersection(graph, point)?.curves();
    for curve in [pair.0, pair.1] {
        if !referenced.contains(&curve) {
            graph.unregister_child(curve, point)?;
        }
    }
    Ok(())
}

/// 注册一对曲线为父节点，失败时撤销已注册的部分
fn register_pair(graph: &mut Graph, point: NodeId, pair: (NodeId, NodeId)) -> Result<()> {
    let already = graph.node(point)?.parents().contains(&pair.0);
    graph.register_child(pair.0, point)?;
    if let Err(err) = graph.register_child(pair.1, point) {
        if !already {
            graph.unregister_child(pair.0, point)?;
        }
        return Err(err.into());
    }
    Ok(())
}

fn refresh(session: &mut Session, point: NodeId) -> Result<()> {
    session
        .graph
        .update(point, UpdateMode::DisplayOnly, &mut Vec::new())?;
    Ok(())
}

fn parse_pair(fields: &OpcodeFields, session: &Session) -> Result<(NodeId, NodeId)> {
    Ok((
        session.resolve(&fields.text("parent1")?)?,
        session.resolve(&fields.text("parent2")?)?,
    ))
}

// === 添加其他父记录 ===

/// 记录另一对也经过该交点的曲线
#[derive(Debug, Clone)]
pub struct AddOtherParent {
    point: NodeId,
    record: OtherParent,
}

impl AddOtherParent {
    pub fn new(point: NodeId, record: OtherParent) -> Self {
        Self { point, record }
    }

    pub fn point(&self) -> NodeId {
        self.point
    }

    pub fn record(&self) -> &OtherParent {
        &self.record
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let point = session.resolve(&fields.text("objectName")?)?;
        let mut record = OtherParent::new(parse_pair(fields, session)?, fields.integer("order")?);
        record.creates_antipode = fields.flag("createsAntipode")?;
        Ok(Self::new(point, record))
    }
}

impl Reversible for AddOtherParent {
    fn save_state(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let (a, b) = self.record.parents;
        if intersection(&session.graph, self.point)?.has_pair(a, b) {
            return Err(GraphError::DuplicatePair {
                point: self.point,
                first: a,
                second: b,
            }
            .into());
        }
        register_pair(&mut session.graph, self.point, self.record.parents)?;
        intersection_mut(&mut session.graph, self.point)?
            .others
            .push(self.record);
        refresh(session, self.point)
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        let data = intersection_mut(&mut session.graph, self.point)?;
        if let Some(index) = data.others.iter().rposition(|r| *r == self.record) {
            data.others.remove(index);
        }
        release_unreferenced(&mut session.graph, self.point, self.record.parents)?;
        refresh(session, self.point)
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("AddIntersectionPointOtherParent", session.precision())
                .text("objectName", &session.name_of(self.point))
                .text("parent1", &session.name_of(self.record.parents.0))
                .text("parent2", &session.name_of(self.record.parents.1))
                .integer("order", self.record.order as u64)
                .flag("createsAntipode", self.record.creates_antipode)
                .build(),
        )
    }
}

// === 移除其他父记录 ===

/// 移除一条其他父记录
#[derive(Debug, Clone)]
pub struct RemoveOtherParent {
    point: NodeId,
    pair: (NodeId, NodeId),
    removed: Option<(usize, OtherParent)>,
}

impl RemoveOtherParent {
    pub fn new(point: NodeId, pair: (NodeId, NodeId)) -> Self {
        Self {
            point,
            pair,
            removed: None,
        }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let point = session.resolve(&fields.text("objectName")?)?;
        Ok(Self::new(point, parse_pair(fields, session)?))
    }
}

impl Reversible for RemoveOtherParent {
    fn save_state(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let data = intersection_mut(&mut session.graph, self.point)?;
        let index = data
            .others
            .iter()
            .position(|r| same_pair(r.parents, self.pair))
            .ok_or(GraphError::MissingPair {
                point: self.point,
                first: self.pair.0,
                second: self.pair.1,
            })?;
        let record = data.others.remove(index);
        self.removed = Some((index, record));
        release_unreferenced(&mut session.graph, self.point, self.pair)?;
        refresh(session, self.point)
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        let Some((index, record)) = self.removed.take() else {
            return Ok(());
        };
        register_pair(&mut session.graph, self.point, record.parents)?;
        let data = intersection_mut(&mut session.graph, self.point)?;
        data.others.insert(index.min(data.others.len()), record);
        refresh(session, self.point)
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("RemoveIntersectionPointOtherParent", session.precision())
                .text("objectName", &session.name_of(self.point))
                .text("parent1", &session.name_of(self.pair.0))
                .text("parent2", &session.name_of(self.pair.1))
                .build(),
        )
    }
}

// === 交换主父曲线对 ===

/// 把一条其他父记录提升为主父曲线对，原主父曲线对降为该位置上的记录
#[derive(Debug, Clone)]
pub struct SwapPrincipalParent {
    point: NodeId,
    pair: (NodeId, NodeId),
    promoted: Option<(usize, OtherParent)>,
}

impl SwapPrincipalParent {
    pub fn new(point: NodeId, pair: (NodeId, NodeId)) -> Self {
        Self {
            point,
            pair,
            promoted: None,
        }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let point = session.resolve(&fields.text("objectName")?)?;
        Ok(Self::new(point, parse_pair(fields, session)?))
    }
}

impl Reversible for SwapPrincipalParent {
    fn save_state(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let data = intersection_mut(&mut session.graph, self.point)?;
        let index = data
            .others
            .iter()
            .position(|r| same_pair(r.parents, self.pair))
            .ok_or(GraphError::MissingPair {
                point: self.point,
                first: self.pair.0,
                second: self.pair.1,
            })?;
        let record = data.others[index];
        data.others[index] = OtherParent::new(data.principal, data.order);
        data.principal = record.parents;
        data.order = record.order;
        self.promoted = Some((index, record));
        tracing::debug!(point = %self.point, "principal parent swapped");
        refresh(session, self.point)
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        let Some((index, record)) = self.promoted.take() else {
            return Ok(());
        };
        let data = intersection_mut(&mut session.graph, self.point)?;
        let demoted = data.others[index];
        data.principal = demoted.parents;
        data.order = demoted.order;
        data.others[index] = record;
        refresh(session, self.point)
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("ChangeIntersectionPointPrincipalParent", session.precision())
                .text("objectName", &session.name_of(self.point))
                .text("parent1", &session.name_of(self.pair.0))
                .text("parent2", &session.name_of(self.pair.1))
                .build(),
        )
    }
}

// === 转为用户创建 ===

/// 把自动创建的（隐藏）交点转为用户可见的交点
#[derive(Debug, Clone)]
pub struct ConvertToUserCreated {
    point: NodeId,
    prior: Option<(bool, bool)>,
}

impl ConvertToUserCreated {
    pub fn new(point: NodeId) -> Self {
        Self { point, prior: None }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        Ok(Self::new(session.resolve(&fields.text("objectName")?)?))
    }
}

impl Reversible for ConvertToUserCreated {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        let showing = session.graph.node(self.point)?.showing;
        let user_created = intersection(&session.graph, self.point)?.user_created;
        self.prior = Some((user_created, showing));
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        intersection_mut(&mut session.graph, self.point)?.user_created = true;
        session.graph.node_mut(self.point)?.showing = true;
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        if let Some((user_created, showing)) = self.prior {
            intersection_mut(&mut session.graph, self.point)?.user_created = user_created;
            session.graph.node_mut(self.point)?.showing = showing;
        }
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("ConvertInterPtToUserCreated", session.precision())
                .text("objectName", &session.name_of(self.point))
                .build(),
        )
    }
}
