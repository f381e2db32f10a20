//! 集成测试共用的构造辅助函数

#![allow(dead_code)]

use zsphere_core::prelude::*;

/// 执行一条构造命令并返回它创建的节点
pub fn add(session: &mut Session, command: Command) -> NodeId {
    let id = command.created().expect("command creates a node");
    session.execute(command).expect("command executes");
    id
}

pub fn point(session: &mut Session, x: f64, y: f64, z: f64) -> NodeId {
    let command = session.free_point(Vector3::new(x, y, z)).unwrap();
    add(session, command)
}

pub fn line(session: &mut Session, start: NodeId, end: NodeId) -> NodeId {
    let command = session.line(start, end).unwrap();
    add(session, command)
}

pub fn segment(session: &mut Session, start: NodeId, end: NodeId) -> NodeId {
    let command = session.segment(start, end).unwrap();
    add(session, command)
}

/// 已挂入的交点，按句柄升序
pub fn intersection_points(session: &Session) -> Vec<NodeId> {
    session
        .graph()
        .attached()
        .filter(|n| n.kind.intersection().is_some())
        .map(|n| n.id)
        .collect()
}

pub fn data(session: &Session, id: NodeId) -> IntersectionData {
    session
        .node(id)
        .unwrap()
        .kind
        .intersection()
        .cloned()
        .expect("intersection point")
}

pub fn location(session: &Session, id: NodeId) -> Vector3 {
    session.node(id).unwrap().kind.location().expect("point")
}

/// 三条过 ±z 的经线，返回 (L1, L2, L3)
pub fn three_meridians(session: &mut Session) -> (NodeId, NodeId, NodeId) {
    let a = point(session, 1.0, 0.0, 1.0);
    let b = point(session, 1.0, 0.0, -1.0);
    let l1 = line(session, a, b);
    let c = point(session, 0.0, 1.0, 1.0);
    let d = point(session, 0.0, 1.0, -1.0);
    let l2 = line(session, c, d);
    let e = point(session, 1.0, 1.0, 1.0);
    let f = point(session, 1.0, 1.0, -1.0);
    let l3 = line(session, e, f);
    (l1, l2, l3)
}
