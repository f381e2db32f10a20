//! 撤销/重做：往返、级联删除、主父曲线对交换

mod common;

use approx::assert_relative_eq;
use common::*;
use std::collections::BTreeSet;
use zsphere_core::geometry::same_pair;
use zsphere_core::prelude::*;

/// 已挂入节点的可比较摘要
fn state(session: &Session) -> Vec<(String, bool, BTreeSet<NodeId>, Option<[i64; 3]>)> {
    session
        .graph()
        .attached()
        .map(|n| {
            let location = n
                .kind
                .location()
                .map(|v| [v.x, v.y, v.z].map(|c| (c * 1e9).round() as i64));
            (n.name.clone(), n.exists, n.parents().clone(), location)
        })
        .collect()
}

#[test]
fn test_undo_redo_round_trip() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let p4 = point(&mut session, 1.0, 1.0, 0.0);
    let before = state(&session);

    let command = session.segment(p3, p4).unwrap();
    session.execute(command).unwrap();
    let after = state(&session);
    assert_ne!(before, after);

    session.undo().unwrap();
    assert_eq!(state(&session), before);
    assert!(session.history().can_redo());

    session.redo().unwrap();
    assert_eq!(state(&session), after);
    assert!(!session.history().can_redo());
}

#[test]
fn test_move_undo_restores_dependents() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let s = segment(&mut session, p1, p2);
    let before = state(&session);

    let command = session.move_point(p2, Vector3::new(0.0, 0.0, 1.0)).unwrap();
    session.execute(command).unwrap();
    assert_relative_eq!(
        session.graph().normal_of(s).unwrap(),
        Vector3::new(0.0, -1.0, 0.0),
        epsilon = 1e-12
    );

    session.undo().unwrap();
    assert_eq!(state(&session), before);
    assert_relative_eq!(session.graph().normal_of(s).unwrap(), Vector3::z(), epsilon = 1e-12);
}

#[test]
fn test_empty_history_errors() {
    let mut session = Session::default();
    assert!(matches!(
        session.undo(),
        Err(KernelError::History(_))
    ));
    assert!(matches!(
        session.redo(),
        Err(KernelError::History(_))
    ));
}

#[test]
fn test_new_command_clears_redo() {
    let mut session = Session::default();
    point(&mut session, 1.0, 0.0, 0.0);
    session.undo().unwrap();
    assert_eq!(session.history().redo_len(), 1);
    point(&mut session, 0.0, 1.0, 0.0);
    assert_eq!(session.history().redo_len(), 0);
}

#[test]
fn test_deleting_segment_cascades_to_intersections() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let l1 = line(&mut session, p1, p2);
    let q1 = point(&mut session, 1.0, 1.0, 1.0);
    let q2 = point(&mut session, 1.0, 1.0, -1.0);
    let s = segment(&mut session, q1, q2);

    let points = intersection_points(&session);
    assert_eq!(points.len(), 2);
    let before = state(&session);

    let command = session.plan_delete(s).unwrap();
    session.execute(command).unwrap();
    assert!(intersection_points(&session).is_empty());
    assert!(!session.node(s).unwrap().is_attached());
    assert!(session.node(l1).unwrap().is_attached());
    for id in &points {
        assert!(!session.store().contains(*id));
    }

    // 一次撤销同时恢复两个交点
    session.undo().unwrap();
    assert_eq!(state(&session), before);
    assert!(session.store().contains(s));
    for id in &points {
        assert!(session.store().contains(*id));
    }
    assert_eq!(data(&session, points[0]).antipode, Some(points[1]));
    assert_eq!(data(&session, points[1]).antipode, Some(points[0]));
}

#[test]
fn test_deleting_intersection_point_takes_its_antipode() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let p4 = point(&mut session, 1.0, 1.0, 0.0);
    line(&mut session, p3, p4);
    let points = intersection_points(&session);
    let before = state(&session);

    let command = session.plan_delete(points[1]).unwrap();
    session.execute(command).unwrap();
    assert!(intersection_points(&session).is_empty());

    session.undo().unwrap();
    assert_eq!(state(&session), before);
    assert_eq!(data(&session, points[0]).antipode, Some(points[1]));
    assert_eq!(data(&session, points[1]).antipode, Some(points[0]));
}

#[test]
fn test_principal_swap_on_delete_and_undo() {
    let mut session = Session::default();
    let (l1, l2, l3) = three_meridians(&mut session);
    let points = intersection_points(&session);
    let north = points[0];
    let original = data(&session, north);
    assert_eq!(original.principal, (l1, l2));
    let before = state(&session);

    let command = session.plan_delete(l1).unwrap();
    session.execute(command).unwrap();

    assert!(!session.node(l1).unwrap().is_attached());
    assert_eq!(intersection_points(&session), points);
    for id in &points {
        let swapped = data(&session, *id);
        assert!(same_pair(swapped.principal, (l2, l3)));
        assert!(swapped.others.is_empty());
        assert!(session.node(*id).unwrap().exists);
        assert!(!session.node(*id).unwrap().parents().contains(&l1));
    }
    assert_relative_eq!(location(&session, north), Vector3::z(), epsilon = 1e-12);

    session.undo().unwrap();
    assert_eq!(data(&session, north), original);
    assert_eq!(state(&session), before);

    session.redo().unwrap();
    assert!(same_pair(data(&session, north).principal, (l2, l3)));
    assert!(!session.node(l1).unwrap().is_attached());
}

#[test]
fn test_visibility_and_style_undo() {
    let mut session = Session::default();
    let p = point(&mut session, 1.0, 0.0, 0.0);

    let command = session.set_visibility(p, false);
    session.execute(command).unwrap();
    let command = session.set_style(p, Style::new().with("strokeColor", "#ff0000"));
    session.execute(command).unwrap();
    assert!(!session.node(p).unwrap().showing);
    assert_eq!(session.node(p).unwrap().style.get("strokeColor"), Some("#ff0000"));

    session.undo().unwrap();
    assert_eq!(session.node(p).unwrap().style, Style::default());
    session.undo().unwrap();
    assert!(session.node(p).unwrap().showing);
}

#[test]
fn test_rotate_view_is_reversible_but_not_scripted() {
    let mut session = Session::default();
    let command = session.rotate_view(Vector3::z(), std::f64::consts::FRAC_PI_2);
    session.execute(command).unwrap();
    assert_relative_eq!(
        session.view().to_view(&Vector3::y()),
        Vector3::x(),
        epsilon = 1e-12
    );
    assert!(session.script().is_empty());

    session.undo().unwrap();
    assert_eq!(*session.view(), ViewState::default());
}

#[test]
fn test_calculation_expression_change() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let s = segment(&mut session, p1, p2);
    let command = session
        .measurement(MeasurementDef::SegmentLength { segment: s })
        .unwrap();
    let m1 = add(&mut session, command);
    let command = session.calculation("M1 * 2").unwrap();
    let m2 = add(&mut session, command);
    assert_relative_eq!(
        session.graph().value_of(m2).unwrap(),
        std::f64::consts::PI,
        epsilon = 1e-12
    );

    let command = session.set_expression(m2, "M1 + 1").unwrap();
    session.execute(command).unwrap();
    assert_relative_eq!(
        session.graph().value_of(m2).unwrap(),
        std::f64::consts::FRAC_PI_2 + 1.0,
        epsilon = 1e-12
    );
    assert!(session.node(m2).unwrap().parents().contains(&m1));

    session.undo().unwrap();
    assert_relative_eq!(
        session.graph().value_of(m2).unwrap(),
        std::f64::consts::PI,
        epsilon = 1e-12
    );

    // 引用自身会成环
    let command = session.set_expression(m2, "M2 + 1").unwrap();
    assert!(matches!(
        session.execute(command),
        Err(KernelError::Graph(GraphError::Cycle { .. }))
    ));
    assert!(session.node(m2).unwrap().parents().contains(&m1));
}

fn last_error(session: &Session, id: NodeId) -> Option<String> {
    match &session.node(id).unwrap().kind {
        NodeKind::Measurement(measurement) => measurement.last_error.clone(),
        _ => None,
    }
}

#[test]
fn test_calculation_error_marks_measurement_undefined() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let s = segment(&mut session, p1, p2);
    let command = session
        .measurement(MeasurementDef::SegmentLength { segment: s })
        .unwrap();
    add(&mut session, command);

    let command = session.calculation("1 / (M1 - M1)").unwrap();
    let m2 = add(&mut session, command);
    assert!(!session.node(m2).unwrap().exists);
    assert!(session.graph().value_of(m2).is_none());
    assert!(last_error(&session, m2).is_some());

    let command = session.set_expression(m2, "M1 + 1").unwrap();
    session.execute(command).unwrap();
    assert!(session.node(m2).unwrap().exists);
    assert_eq!(last_error(&session, m2), None);

    // 几何变化导致求值越界
    let command = session.set_expression(m2, "sqrt(M1 - 1)").unwrap();
    session.execute(command).unwrap();
    assert!(session.node(m2).unwrap().exists);
    let command = session
        .move_point(p2, Vector3::new(1.0, 0.5, 0.0).normalize())
        .unwrap();
    session.execute(command).unwrap();
    assert!(!session.node(m2).unwrap().exists);
    assert!(last_error(&session, m2).is_some());

    session.undo().unwrap();
    assert!(session.node(m2).unwrap().exists);
    assert_relative_eq!(
        session.graph().value_of(m2).unwrap(),
        (std::f64::consts::FRAC_PI_2 - 1.0).sqrt(),
        epsilon = 1e-12
    );
}
