//! 添加节点命令

use super::Reversible;
use crate::error::{GraphError, OpcodeError, Result};
use crate::expression::Expr;
use crate::geometry::{
    AngleDef, AngleMarkerNode, Axis, CircleNode, EllipseNode, IntersectionData, LineDef, LineNode,
    MeasurementDef, MeasurementNode, OtherParent, ParametricNode, PointDef, PointNode,
    PointTransform, PolygonNode, SegmentNode,
};
use crate::graph::UpdateMode;
use crate::node::{NodeId, NodeKind, Style};
use crate::opcode::{OpcodeBuilder, OpcodeFields};
use crate::session::Session;
use std::collections::BTreeMap;

/// 把一个未挂入的节点挂入图
///
/// 构造时记录节点的定义与当时的取值，操作码只依赖这份记录，
/// 因此 `parse(opcode(c)).opcode() == opcode(c)` 与之后的图状态无关。
#[derive(Debug, Clone)]
pub struct AddNode {
    id: NodeId,
    definition: NodeKind,
    exists: bool,
    showing: bool,
    style: Style,
    /// 执行时顺带建立的对径耦合（撤销时解除）
    linked_partner: Option<NodeId>,
}

impl AddNode {
    /// 记录未挂入节点的当前定义
    pub(crate) fn capture(session: &Session, id: NodeId) -> std::result::Result<Self, GraphError> {
        let node = session.graph.node(id)?;
        Ok(Self {
            id,
            definition: node.kind.clone(),
            exists: node.exists,
            showing: node.showing,
            style: node.style.clone(),
            linked_partner: None,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn definition(&self) -> &NodeKind {
        &self.definition
    }

    /// 操作码标签
    pub fn tag(&self) -> &'static str {
        match &self.definition {
            NodeKind::Point(PointNode {
                def: PointDef::Intersection(_),
                ..
            }) => "AddIntersectionPoint",
            NodeKind::Point(_) => "AddPoint",
            NodeKind::Line(_) => "AddLine",
            NodeKind::Segment(_) => "AddSegment",
            NodeKind::Circle(_) => "AddCircle",
            NodeKind::Ellipse(_) => "AddEllipse",
            NodeKind::Parametric(_) => "AddParametric",
            NodeKind::Polygon(_) => "AddPolygon",
            NodeKind::AngleMarker(_) => "AddAngleMarker",
            NodeKind::Measurement(_) => "AddMeasurement",
        }
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        let name = fields.text("objectName")?;
        let exists = fields.flag("objectExists")?;
        let showing = fields.flag("objectShowing")?;
        let style = match fields.optional_text("style")? {
            Some(json) => serde_json::from_str(&json).map_err(|_| OpcodeError::BadValue {
                field: "style".to_string(),
                value: json.clone(),
            })?,
            None => Style::default(),
        };

        let definition = match fields.tag() {
            "AddPoint" => parse_point(fields, session)?,
            "AddIntersectionPoint" => parse_intersection_point(fields, session)?,
            "AddLine" => parse_line(fields, session)?,
            "AddSegment" => {
                let mut segment =
                    SegmentNode::new(resolve(fields, "start", session)?, resolve(fields, "end", session)?);
                segment.normal = fields.vector("normalVector")?;
                segment.arc_length = fields.scalar("arcLength")?;
                NodeKind::Segment(segment)
            }
            "AddCircle" => {
                let mut circle = CircleNode::new(
                    resolve(fields, "center", session)?,
                    resolve(fields, "circlePoint", session)?,
                );
                circle.radius = fields.scalar("radius")?;
                NodeKind::Circle(circle)
            }
            "AddEllipse" => {
                let mut ellipse = EllipseNode::new(
                    resolve(fields, "focus1", session)?,
                    resolve(fields, "focus2", session)?,
                    resolve(fields, "ellipsePoint", session)?,
                );
                ellipse.a = fields.scalar("semiMajorAxis")?;
                NodeKind::Ellipse(ellipse)
            }
            "AddParametric" => parse_parametric(fields, session)?,
            "AddPolygon" => {
                let segments = fields
                    .list("segments")?
                    .iter()
                    .map(|name| session.resolve(name))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let mut polygon = PolygonNode::new(segments);
                polygon.area = fields.scalar("area")?;
                NodeKind::Polygon(polygon)
            }
            "AddAngleMarker" => parse_angle_marker(fields, session)?,
            "AddMeasurement" => parse_measurement(fields, session)?,
            other => return Err(OpcodeError::UnknownTag(other.to_string()).into()),
        };

        let id = session.allocate(Some(name), definition.clone())?;
        let node = session.graph.node_mut(id)?;
        node.showing = showing;
        node.style = style.clone();

        Ok(Self {
            id,
            definition,
            exists,
            showing,
            style,
            linked_partner: None,
        })
    }
}

fn resolve(fields: &OpcodeFields, key: &str, session: &Session) -> Result<NodeId> {
    Ok(session.resolve(&fields.text(key)?)?)
}

fn parse_point(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let location = fields.vector("pointVector")?;
    let def_name = fields.text("pointDef")?;
    let def = match def_name.as_str() {
        "free" => PointDef::Free,
        "onObject" => PointDef::OnObject {
            curve: resolve(fields, "curve", session)?,
        },
        "antipodal" => PointDef::Antipodal {
            parent: resolve(fields, "parent", session)?,
        },
        "polar" => PointDef::Polar {
            line: resolve(fields, "line", session)?,
            index: fields.integer("index")?,
        },
        "nsect" => PointDef::NSect {
            segment: resolve(fields, "segment", session)?,
            index: fields.integer("index")?,
            count: fields.integer("count")?,
        },
        "rotation" => PointDef::Transformed {
            parent: resolve(fields, "parent", session)?,
            transform: PointTransform::Rotation {
                center: resolve(fields, "center", session)?,
                angle: resolve(fields, "angle", session)?,
            },
        },
        "reflection" => PointDef::Transformed {
            parent: resolve(fields, "parent", session)?,
            transform: PointTransform::Reflection {
                line: resolve(fields, "line", session)?,
            },
        },
        _ => {
            return Err(OpcodeError::BadValue {
                field: "pointDef".to_string(),
                value: def_name,
            }
            .into())
        }
    };
    Ok(NodeKind::Point(PointNode::new(def, location)))
}

fn parse_intersection_point(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let location = fields.vector("pointVector")?;
    let principal = (
        resolve(fields, "principalParent1", session)?,
        resolve(fields, "principalParent2", session)?,
    );
    let mut data = IntersectionData::new(principal, fields.integer("order")?);
    data.user_created = fields.flag("userCreated")?;
    data.antipode = match fields.optional_text("antipode")? {
        Some(name) => Some(session.resolve(&name)?),
        None => None,
    };
    for parts in fields.tuples("otherParents")? {
        let [a, b, order, flag] = parts.as_slice() else {
            return Err(OpcodeError::BadValue {
                field: "otherParents".to_string(),
                value: parts.join(","),
            }
            .into());
        };
        let bad = |value: &str| OpcodeError::BadValue {
            field: "otherParents".to_string(),
            value: value.to_string(),
        };
        data.others.push(OtherParent {
            parents: (session.resolve(a)?, session.resolve(b)?),
            order: order.parse().map_err(|_| bad(order))?,
            creates_antipode: flag.parse().map_err(|_| bad(flag))?,
        });
    }
    Ok(NodeKind::Point(PointNode::new(
        PointDef::Intersection(data),
        location,
    )))
}

fn parse_line(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let def_name = fields.text("lineDef")?;
    let def = match def_name.as_str() {
        "points" => LineDef::ThroughPoints {
            start: resolve(fields, "start", session)?,
            end: resolve(fields, "end", session)?,
        },
        "polar" => LineDef::Polar {
            pole: resolve(fields, "pole", session)?,
        },
        _ => {
            return Err(OpcodeError::BadValue {
                field: "lineDef".to_string(),
                value: def_name,
            }
            .into())
        }
    };
    let mut line = LineNode::new(def);
    line.normal = fields.vector("normalVector")?;
    Ok(NodeKind::Line(line))
}

/// 表达式中的记号按名称解析为节点（参数 `t` 除外）
pub(crate) fn resolve_tokens(
    exprs: &[&Expr],
    session: &Session,
) -> std::result::Result<BTreeMap<String, NodeId>, OpcodeError> {
    let mut tokens = BTreeMap::new();
    for expr in exprs {
        for token in expr.tokens() {
            if token == "t" {
                continue;
            }
            let id = session.resolve(&token)?;
            tokens.insert(token, id);
        }
    }
    Ok(tokens)
}

fn parse_parametric(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let coordinates = [
        fields.text("xExpression")?,
        fields.text("yExpression")?,
        fields.text("zExpression")?,
    ];
    let parametric = ParametricNode::new(
        coordinates,
        fields.scalar("tMin")?,
        fields.scalar("tMax")?,
        fields.scalars("cusps")?,
        fields.flag("closed")?,
    )?;
    let tokens = resolve_tokens(&parametric.exprs.iter().collect::<Vec<_>>(), session)?;
    Ok(NodeKind::Parametric(ParametricNode {
        tokens,
        ..parametric
    }))
}

fn parse_angle_marker(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let def_name = fields.text("angleDef")?;
    let def = match def_name.as_str() {
        "lines" => AngleDef::Lines {
            first: resolve(fields, "first", session)?,
            second: resolve(fields, "second", session)?,
        },
        "points" => AngleDef::Points {
            first: resolve(fields, "first", session)?,
            vertex: resolve(fields, "vertex", session)?,
            second: resolve(fields, "second", session)?,
        },
        _ => {
            return Err(OpcodeError::BadValue {
                field: "angleDef".to_string(),
                value: def_name,
            }
            .into())
        }
    };
    Ok(NodeKind::AngleMarker(AngleMarkerNode {
        def,
        value: fields.scalar("value")?,
    }))
}

fn parse_measurement(fields: &OpcodeFields, session: &Session) -> Result<NodeKind> {
    let def_name = fields.text("measurementDef")?;
    let def = match def_name.as_str() {
        "segmentLength" => MeasurementDef::SegmentLength {
            segment: resolve(fields, "segment", session)?,
        },
        "pointDistance" => MeasurementDef::PointDistance {
            first: resolve(fields, "first", session)?,
            second: resolve(fields, "second", session)?,
        },
        "pointCoordinate" => {
            let axis_name = fields.text("axis")?;
            let axis = Axis::from_name(&axis_name).ok_or(OpcodeError::BadValue {
                field: "axis".to_string(),
                value: axis_name.clone(),
            })?;
            MeasurementDef::PointCoordinate {
                point: resolve(fields, "point", session)?,
                axis,
            }
        }
        "calculation" => {
            let text = fields.text("expression")?;
            let expr = Expr::parse(&text)?;
            let tokens = resolve_tokens(&[&expr], session)?;
            MeasurementDef::Calculation { text, expr, tokens }
        }
        _ => {
            return Err(OpcodeError::BadValue {
                field: "measurementDef".to_string(),
                value: def_name,
            }
            .into())
        }
    };
    let mut measurement = MeasurementNode::new(def);
    measurement.value = fields.scalar("value")?;
    Ok(NodeKind::Measurement(measurement))
}

impl Reversible for AddNode {
    fn save_state(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        session.graph.attach(self.id)?;
        let node = session.graph.node(self.id)?;
        let kind = node.entity_kind();
        let partner = node.kind.intersection().and_then(|data| data.antipode);
        session.store.insert(kind, self.id);

        self.linked_partner = None;
        if let Some(partner) = partner {
            if let Some(data) = session.graph.node_mut(partner)?.kind.intersection_mut() {
                if data.antipode.is_none() {
                    data.antipode = Some(self.id);
                    self.linked_partner = Some(partner);
                }
            }
        }

        session
            .graph
            .update(self.id, UpdateMode::DisplayOnly, &mut Vec::new())?;
        tracing::debug!(node = %self.id, tag = self.tag(), "node attached");
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        if let Some(partner) = self.linked_partner.take() {
            if let Some(data) = session.graph.node_mut(partner)?.kind.intersection_mut() {
                data.antipode = None;
            }
        }
        session.graph.detach(self.id)?;
        let kind = session.graph.node(self.id)?.entity_kind();
        session.store.remove(kind, self.id);
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        let name = |id: &NodeId| session.name_of(*id);
        let mut op = OpcodeBuilder::new(self.tag(), session.precision())
            .text("objectName", &name(&self.id))
            .flag("objectExists", self.exists)
            .flag("objectShowing", self.showing);
        if !self.style.entries.is_empty() {
            let json = serde_json::to_string(&self.style).ok()?;
            op = op.text("style", &json);
        }

        let op = match &self.definition {
            NodeKind::Point(point) => point_fields(op, point, &name),
            NodeKind::Line(line) => {
                let op = match &line.def {
                    LineDef::ThroughPoints { start, end } => op
                        .text("lineDef", "points")
                        .text("start", &name(start))
                        .text("end", &name(end)),
                    LineDef::Polar { pole } => op.text("lineDef", "polar").text("pole", &name(pole)),
                };
                op.vector("normalVector", &line.normal)
            }
            NodeKind::Segment(segment) => op
                .text("start", &name(&segment.start))
                .text("end", &name(&segment.end))
                .vector("normalVector", &segment.normal)
                .scalar("arcLength", segment.arc_length),
            NodeKind::Circle(circle) => op
                .text("center", &name(&circle.center))
                .text("circlePoint", &name(&circle.circle_point))
                .scalar("radius", circle.radius),
            NodeKind::Ellipse(ellipse) => op
                .text("focus1", &name(&ellipse.focus1))
                .text("focus2", &name(&ellipse.focus2))
                .text("ellipsePoint", &name(&ellipse.ellipse_point))
                .scalar("semiMajorAxis", ellipse.a),
            NodeKind::Parametric(parametric) => op
                .text("xExpression", &parametric.coordinates[0])
                .text("yExpression", &parametric.coordinates[1])
                .text("zExpression", &parametric.coordinates[2])
                .scalar("tMin", parametric.t_min)
                .scalar("tMax", parametric.t_max)
                .scalars("cusps", &parametric.cusps)
                .flag("closed", parametric.closed),
            NodeKind::Polygon(polygon) => {
                let segments: Vec<String> = polygon.segments.iter().map(name).collect();
                op.list("segments", &segments).scalar("area", polygon.area)
            }
            NodeKind::AngleMarker(marker) => {
                let op = match &marker.def {
                    AngleDef::Lines { first, second } => op
                        .text("angleDef", "lines")
                        .text("first", &name(first))
                        .text("second", &name(second)),
                    AngleDef::Points {
                        first,
                        vertex,
                        second,
                    } => op
                        .text("angleDef", "points")
                        .text("first", &name(first))
                        .text("vertex", &name(vertex))
                        .text("second", &name(second)),
                };
                op.scalar("value", marker.value)
            }
            NodeKind::Measurement(measurement) => {
                let op = match &measurement.def {
                    MeasurementDef::SegmentLength { segment } => op
                        .text("measurementDef", "segmentLength")
                        .text("segment", &name(segment)),
                    MeasurementDef::PointDistance { first, second } => op
                        .text("measurementDef", "pointDistance")
                        .text("first", &name(first))
                        .text("second", &name(second)),
                    MeasurementDef::PointCoordinate { point, axis } => op
                        .text("measurementDef", "pointCoordinate")
                        .text("point", &name(point))
                        .text("axis", axis.name()),
                    MeasurementDef::Calculation { text, .. } => op
                        .text("measurementDef", "calculation")
                        .text("expression", text),
                };
                op.scalar("value", measurement.value)
            }
        };
        Some(op.build())
    }
}

fn point_fields<F>(op: OpcodeBuilder, point: &PointNode, name: &F) -> OpcodeBuilder
where
    F: Fn(&NodeId) -> String,
{
    let op = match &point.def {
        PointDef::Free => op.text("pointDef", "free"),
        PointDef::OnObject { curve } => op.text("pointDef", "onObject").text("curve", &name(curve)),
        PointDef::Antipodal { parent } => op
            .text("pointDef", "antipodal")
            .text("parent", &name(parent)),
        PointDef::Polar { line, index } => op
            .text("pointDef", "polar")
            .text("line", &name(line))
            .integer("index", u64::from(*index)),
        PointDef::NSect {
            segment,
            index,
            count,
        } => op
            .text("pointDef", "nsect")
            .text("segment", &name(segment))
            .integer("index", u64::from(*index))
            .integer("count", u64::from(*count)),
        PointDef::Transformed {
            parent,
            transform: PointTransform::Rotation { center, angle },
        } => op
            .text("pointDef", "rotation")
            .text("parent", &name(parent))
            .text("center", &name(center))
            .text("angle", &name(angle)),
        PointDef::Transformed {
            parent,
            transform: PointTransform::Reflection { line },
        } => op
            .text("pointDef", "reflection")
            .text("parent", &name(parent))
            .text("line", &name(line)),
        PointDef::Intersection(data) => {
            let records: Vec<Vec<String>> = data
                .others
                .iter()
                .map(|r| {
                    vec![
                        name(&r.parents.0),
                        name(&r.parents.1),
                        r.order.to_string(),
                        r.creates_antipode.to_string(),
                    ]
                })
                .collect();
            let mut op = op
                .text("principalParent1", &name(&data.principal.0))
                .text("principalParent2", &name(&data.principal.1))
                .integer("order", data.order as u64)
                .tuples("otherParents", &records)
                .flag("userCreated", data.user_created);
            if let Some(antipode) = &data.antipode {
                op = op.text("antipode", &name(antipode));
            }
            op
        }
    };
    op.vector("pointVector", &point.location)
}
