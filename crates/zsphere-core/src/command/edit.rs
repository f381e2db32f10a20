//! 修改已有节点的命令：移动、显示、样式、表达式、视图

use super::add::resolve_tokens;
use super::Reversible;
use crate::error::{GraphError, OpcodeError, Result};
use crate::expression::Expr;
use crate::geometry::{MeasurementDef, PointDef};
use crate::graph::{Graph, UpdateMode};
use crate::math::{self, Vector3};
use crate::node::{NodeId, NodeKind, NodeSnapshot, Style};
use crate::opcode::{OpcodeBuilder, OpcodeFields};
use crate::session::Session;
use nalgebra::{Unit, UnitQuaternion};
use std::collections::{BTreeMap, BTreeSet};

// === 移动点 ===

/// 移动自由点（或曲线上的点）并传播更新
#[derive(Debug, Clone)]
pub struct MovePoint {
    point: NodeId,
    from: Vector3,
    to: Vector3,
    snapshots: Vec<NodeSnapshot>,
}

impl MovePoint {
    pub fn new(point: NodeId, from: Vector3, to: Vector3) -> Self {
        Self {
            point,
            from,
            to,
            snapshots: Vec::new(),
        }
    }

    pub fn point(&self) -> NodeId {
        self.point
    }

    pub fn target(&self) -> Vector3 {
        self.to
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        Ok(Self::new(
            session.resolve(&fields.text("objectName")?)?,
            fields.vector("fromVector")?,
            fields.vector("toVector")?,
        ))
    }
}

impl Reversible for MovePoint {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.snapshots = session.graph.snapshot(self.point)?;
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let eps = session.config().degeneracy_epsilon;
        let to = math::normalize(&self.to, eps).ok_or(OpcodeError::BadValue {
            field: "toVector".to_string(),
            value: math::format_vector(&self.to, session.precision()),
        })?;
        match &mut session.graph.node_mut(self.point)?.kind {
            NodeKind::Point(point)
                if matches!(point.def, PointDef::Free | PointDef::OnObject { .. }) =>
            {
                point.location = to;
            }
            _ => return Err(GraphError::WrongKind(self.point).into()),
        }
        let visited = session
            .graph
            .update(self.point, UpdateMode::DisplayOnly, &mut Vec::new())?;
        tracing::debug!(point = %self.point, visited = visited.len(), "point moved");
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        session.graph.restore_values(&self.snapshots)?;
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("MovePoint", session.precision())
                .text("objectName", &session.name_of(self.point))
                .vector("fromVector", &self.from)
                .vector("toVector", &self.to)
                .build(),
        )
    }
}

// === 显示/隐藏 ===

/// 显示或隐藏节点
#[derive(Debug, Clone)]
pub struct SetVisibility {
    id: NodeId,
    showing: bool,
    prior: Option<bool>,
}

impl SetVisibility {
    pub fn new(id: NodeId, showing: bool) -> Self {
        Self {
            id,
            showing,
            prior: None,
        }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        Ok(Self::new(
            session.resolve(&fields.text("objectName")?)?,
            fields.flag("objectShowing")?,
        ))
    }
}

impl Reversible for SetVisibility {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.prior = Some(session.graph.node(self.id)?.showing);
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        session.graph.node_mut(self.id)?.showing = self.showing;
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        if let Some(showing) = self.prior {
            session.graph.node_mut(self.id)?.showing = showing;
        }
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("SetNoduleDisplay", session.precision())
                .text("objectName", &session.name_of(self.id))
                .flag("objectShowing", self.showing)
                .build(),
        )
    }
}

// === 样式 ===

/// 替换节点的样式负载
#[derive(Debug, Clone)]
pub struct SetStyle {
    id: NodeId,
    style: Style,
    prior: Option<Style>,
}

impl SetStyle {
    pub fn new(id: NodeId, style: Style) -> Self {
        Self {
            id,
            style,
            prior: None,
        }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let id = session.resolve(&fields.text("objectName")?)?;
        let json = fields.text("style")?;
        let style = serde_json::from_str(&json).map_err(|_| OpcodeError::BadValue {
            field: "style".to_string(),
            value: json.clone(),
        })?;
        Ok(Self::new(id, style))
    }
}

impl Reversible for SetStyle {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.prior = Some(session.graph.node(self.id)?.style.clone());
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        session.graph.node_mut(self.id)?.style = self.style.clone();
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        if let Some(style) = self.prior.take() {
            session.graph.node_mut(self.id)?.style = style;
        }
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        let json = serde_json::to_string(&self.style).ok()?;
        Some(
            OpcodeBuilder::new("StyleNodule", session.precision())
                .text("objectName", &session.name_of(self.id))
                .text("style", &json)
                .build(),
        )
    }
}

// === 计算表达式 ===

/// 修改计算度量的表达式，并按新记号重新连接父节点
#[derive(Debug, Clone)]
pub struct SetExpression {
    id: NodeId,
    text: String,
    expr: Expr,
    tokens: BTreeMap<String, NodeId>,
    prior: Option<MeasurementDef>,
    snapshots: Vec<NodeSnapshot>,
}

impl SetExpression {
    pub(crate) fn new(id: NodeId, text: String, expr: Expr, tokens: BTreeMap<String, NodeId>) -> Self {
        Self {
            id,
            text,
            expr,
            tokens,
            prior: None,
            snapshots: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let id = session.resolve(&fields.text("objectName")?)?;
        let text = fields.text("expression")?;
        let expr = Expr::parse(&text)?;
        let tokens = resolve_tokens(&[&expr], session)?;
        Ok(Self::new(id, text, expr, tokens))
    }

    fn calculation(graph: &Graph, id: NodeId) -> std::result::Result<MeasurementDef, GraphError> {
        match &graph.node(id)?.kind {
            NodeKind::Measurement(measurement)
                if matches!(measurement.def, MeasurementDef::Calculation { .. }) =>
            {
                Ok(measurement.def.clone())
            }
            _ => Err(GraphError::WrongKind(id)),
        }
    }
}

/// 把 `id` 的父节点从 `old` 换成 `new`；新父节点会成环时恢复原状
fn relink(
    graph: &mut Graph,
    id: NodeId,
    old: &BTreeSet<NodeId>,
    new: &BTreeSet<NodeId>,
) -> std::result::Result<(), GraphError> {
    for parent in old.difference(new) {
        graph.unregister_child(*parent, id)?;
    }
    let mut added = Vec::new();
    for parent in new.difference(old) {
        if let Err(err) = graph.register_child(*parent, id) {
            for done in added {
                graph.unregister_child(done, id)?;
            }
            for parent in old.difference(new) {
                graph.register_child(*parent, id)?;
            }
            return Err(err);
        }
        added.push(*parent);
    }
    Ok(())
}

fn set_definition(graph: &mut Graph, id: NodeId, def: MeasurementDef) -> Result<()> {
    if let NodeKind::Measurement(measurement) = &mut graph.node_mut(id)?.kind {
        measurement.def = def;
    }
    Ok(())
}

impl Reversible for SetExpression {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.prior = Some(Self::calculation(&session.graph, self.id)?);
        self.snapshots = session.graph.snapshot(self.id)?;
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let prior = Self::calculation(&session.graph, self.id)?;
        let old: BTreeSet<NodeId> = prior.parents().into_iter().collect();
        let new: BTreeSet<NodeId> = self.tokens.values().copied().collect();
        relink(&mut session.graph, self.id, &old, &new)?;
        set_definition(
            &mut session.graph,
            self.id,
            MeasurementDef::Calculation {
                text: self.text.clone(),
                expr: self.expr.clone(),
                tokens: self.tokens.clone(),
            },
        )?;
        session
            .graph
            .update(self.id, UpdateMode::DisplayOnly, &mut Vec::new())?;
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        let Some(prior) = self.prior.take() else {
            return Ok(());
        };
        let old: BTreeSet<NodeId> = self.tokens.values().copied().collect();
        let new: BTreeSet<NodeId> = prior.parents().into_iter().collect();
        relink(&mut session.graph, self.id, &old, &new)?;
        set_definition(&mut session.graph, self.id, prior)?;
        session.graph.restore_values(&self.snapshots)?;
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("SetCalculationExpression", session.precision())
                .text("objectName", &session.name_of(self.id))
                .text("expression", &self.text)
                .build(),
        )
    }
}

// === 视图旋转 ===

/// 旋转会话视图（纯视图操作，不进入脚本）
#[derive(Debug, Clone)]
pub struct RotateView {
    rotation: UnitQuaternion<f64>,
    prior: Option<UnitQuaternion<f64>>,
}

impl RotateView {
    pub fn new(axis: Vector3, angle: f64) -> Self {
        let rotation = Unit::try_new(axis, math::EPSILON)
            .map(|axis| UnitQuaternion::from_axis_angle(&axis, angle))
            .unwrap_or_else(UnitQuaternion::identity);
        Self {
            rotation,
            prior: None,
        }
    }
}

impl Reversible for RotateView {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.prior = Some(session.view.orientation);
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        session.view.orientation = self.rotation * session.view.orientation;
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        if let Some(orientation) = self.prior {
            session.view.orientation = orientation;
        }
        Ok(())
    }

    fn opcode(&self, _session: &Session) -> Option<String> {
        None
    }
}
