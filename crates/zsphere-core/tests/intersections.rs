//! 交点规划：数量、去重、对径耦合、成环跳过

mod common;

use approx::assert_relative_eq;
use common::*;
use std::f64::consts::FRAC_1_SQRT_2;
use zsphere_core::geometry::same_pair;
use zsphere_core::prelude::*;

/// P1=(1,0,0), P2=(0,1,0), P3=(0,0,1), P4=(1,1,0)
fn two_line_scene() -> (Session, NodeId, NodeId) {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let l1 = line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let p4 = point(&mut session, 1.0, 1.0, 0.0);
    let l2 = line(&mut session, p3, p4);
    (session, l1, l2)
}

#[test]
fn test_two_lines_make_one_antipodal_pair() {
    let (session, l1, l2) = two_line_scene();
    let points = intersection_points(&session);
    assert_eq!(points.len(), 2);

    let first = data(&session, points[0]);
    let second = data(&session, points[1]);
    assert_eq!(first.principal, (l1, l2));
    assert_eq!(second.principal, (l1, l2));
    assert_eq!(first.order, 0);
    assert_eq!(second.order, 1);
    assert_eq!(first.antipode, Some(points[1]));
    assert_eq!(second.antipode, Some(points[0]));
    assert!(!first.user_created);
    assert!(!session.node(points[0]).unwrap().showing);

    let v = location(&session, points[0]);
    assert_relative_eq!(v, Vector3::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0), epsilon = 1e-12);
    assert_relative_eq!(location(&session, points[1]), -v, epsilon = 1e-12);
}

#[test]
fn test_orders_are_stable_across_derivations() {
    let (a, _, _) = two_line_scene();
    let (b, _, _) = two_line_scene();
    let describe = |session: &Session| -> Vec<(String, usize, String)> {
        intersection_points(session)
            .into_iter()
            .map(|id| {
                let node = session.node(id).unwrap();
                let data = data(session, id);
                let v = location(session, id);
                (node.name.clone(), data.order, format!("{:.9},{:.9},{:.9}", v.x, v.y, v.z))
            })
            .collect()
    };
    assert_eq!(describe(&a), describe(&b));
}

#[test]
fn test_identical_great_circles_do_not_intersect() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let p3 = point(&mut session, -1.0, 0.0, 0.0);
    let p4 = point(&mut session, 0.0, -1.0, 0.0);
    line(&mut session, p3, p4);
    assert!(intersection_points(&session).is_empty());
}

#[test]
fn test_concurrent_lines_share_intersection_points() {
    let mut session = Session::default();
    let (l1, l2, l3) = three_meridians(&mut session);

    let points = intersection_points(&session);
    assert_eq!(points.len(), 2);

    let north = data(&session, points[0]);
    assert_eq!(north.principal, (l1, l2));
    assert_relative_eq!(location(&session, points[0]), Vector3::z(), epsilon = 1e-12);
    assert_eq!(north.others.len(), 2);
    assert!(north.has_pair(l1, l3));
    assert!(north.has_pair(l2, l3));

    let south = data(&session, points[1]);
    assert_eq!(south.others.len(), 2);
    assert!(south.others.iter().all(|r| !r.creates_antipode));

    // 新曲线成为交点的父节点
    assert!(session.node(points[0]).unwrap().parents().contains(&l3));
}

#[test]
fn test_cycle_creating_record_is_skipped() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 1.0, 0.0);
    let p2 = point(&mut session, -1.0, 1.0, 0.0);
    let l1 = line(&mut session, p1, p2);
    let a = point(&mut session, 1.0, 0.0, 1.0);
    let b = point(&mut session, 1.0, 0.0, -1.0);
    let l2 = line(&mut session, a, b);

    let points = intersection_points(&session);
    assert_eq!(points.len(), 2);
    let (west, east) = (points[0], points[1]);
    assert_relative_eq!(location(&session, east), Vector3::x(), epsilon = 1e-12);

    // 过交点 east 的新直线不能把 east 记为自己的交点
    let q = point(&mut session, 0.0, 1.0, 1.0);
    let l3 = line(&mut session, east, q);

    assert_eq!(intersection_points(&session).len(), 2);
    assert!(data(&session, east).others.is_empty());
    assert!(!session.node(east).unwrap().parents().contains(&l3));

    let west_data = data(&session, west);
    assert_eq!(west_data.others.len(), 2);
    assert!(west_data.others.iter().any(|r| same_pair(r.parents, (l1, l3))));
    assert!(west_data.others.iter().any(|r| same_pair(r.parents, (l2, l3))));
    assert!(session.graph().is_descendant(east, l3));
    assert!(!session.graph().is_descendant(l3, east));
}

#[test]
fn test_segment_slots_exist_only_on_arc() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let q1 = point(&mut session, 1.0, 1.0, 1.0);
    let q2 = point(&mut session, 1.0, 1.0, -1.0);
    segment(&mut session, q1, q2);

    let points = intersection_points(&session);
    assert_eq!(points.len(), 2);
    assert!(!session.node(points[0]).unwrap().exists);
    assert!(session.node(points[1]).unwrap().exists);
    assert_relative_eq!(
        location(&session, points[1]),
        Vector3::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0),
        epsilon = 1e-12
    );
}

#[test]
fn test_moving_a_point_moves_intersections() {
    let (mut session, _, _) = two_line_scene();
    let p4 = session.find("P4").unwrap();
    let command = session.move_point(p4, Vector3::new(1.0, -1.0, 0.0)).unwrap();
    session.execute(command).unwrap();

    let points = intersection_points(&session);
    let v = location(&session, points[0]);
    assert_relative_eq!(v.z, 0.0, epsilon = 1e-12);
    assert_relative_eq!(v.x.abs(), FRAC_1_SQRT_2, epsilon = 1e-12);
    assert_relative_eq!(v.x, -v.y, epsilon = 1e-12);
    assert_relative_eq!(location(&session, points[1]), -v, epsilon = 1e-12);
}

fn circle(session: &mut Session, center: NodeId, through: NodeId) -> NodeId {
    let command = session.circle(center, through).unwrap();
    add(session, command)
}

/// 位于 `v` 的已挂入交点
fn point_at(session: &Session, v: Vector3) -> Option<NodeId> {
    intersection_points(session)
        .into_iter()
        .find(|id| (location(session, *id) - v).norm() < 1e-7)
}

/// 主父曲线对为 `pair` 的交点，按槽位排序
fn slots_of(session: &Session, pair: (NodeId, NodeId)) -> Vec<NodeId> {
    let mut points: Vec<_> = intersection_points(session)
        .into_iter()
        .filter(|id| same_pair(data(session, *id).principal, pair))
        .collect();
    points.sort_by_key(|id| data(session, *id).order);
    points
}

fn assert_no_self_records(session: &Session) {
    for id in intersection_points(session) {
        let data = data(session, id);
        assert!(
            data.others.iter().all(|r| !same_pair(r.parents, data.principal)),
            "{id} lists its principal pair as another record"
        );
        for (i, r) in data.others.iter().enumerate() {
            assert!(
                data.others[i + 1..].iter().all(|s| !same_pair(s.parents, r.parents)),
                "{id} lists a pair twice"
            );
        }
    }
}

#[test]
fn test_tangent_circle_through_existing_point() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let l1 = line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let l2 = line(&mut session, p3, p2);
    let at_y = point_at(&session, Vector3::y()).expect("lines meet at y");

    // 圆心在 y 正上方，圆与赤道相切于 y
    let c = point(&mut session, 0.0, 0.4_f64.sin(), 0.4_f64.cos());
    let command = session.circle(c, p2).unwrap();
    let k = command.created().unwrap();
    session.execute(command).expect("tangent circle is added");

    let shared = data(&session, at_y);
    assert_eq!(shared.principal, (l1, l2));
    assert_eq!(shared.others.len(), 2);
    assert!(shared.has_pair(l1, k));
    assert!(shared.has_pair(l2, k));
    assert_no_self_records(&session);

    session.undo().unwrap();
    assert!(data(&session, at_y).others.is_empty());
    session.redo().unwrap();
    assert_eq!(data(&session, at_y).others.len(), 2);
}

#[test]
fn test_tangent_circle_creates_single_point() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    let l1 = line(&mut session, p1, p2);
    let c = point(&mut session, 0.0, 0.4_f64.sin(), 0.4_f64.cos());
    let k = circle(&mut session, c, p2);

    let points = intersection_points(&session);
    assert_eq!(points.len(), 1);
    let tangent = data(&session, points[0]);
    assert_eq!(tangent.principal, (l1, k));
    assert!(tangent.others.is_empty());
    assert_relative_eq!(location(&session, points[0]), Vector3::y(), epsilon = 1e-7);
    assert_no_self_records(&session);
}

/// 焦点 (±sin0.3, 0, cos0.3)、半长轴 `a` 的椭圆上 y 轴方向的点
fn ellipse_point(a: f64) -> Vector3 {
    let theta = (a.cos() / 0.3_f64.cos()).acos();
    Vector3::new(0.0, theta.sin(), theta.cos())
}

/// 过两焦点的大圆 L1 与椭圆 E，返回 (session, L1, E, 椭圆点)
fn ellipse_scene() -> (Session, NodeId, NodeId, NodeId) {
    let mut session = Session::default();
    let a = point(&mut session, 1.0, 0.0, 0.0);
    let b = point(&mut session, 0.0, 0.0, 1.0);
    let l1 = line(&mut session, a, b);
    let f1 = point(&mut session, 0.3_f64.sin(), 0.0, 0.3_f64.cos());
    let f2 = point(&mut session, -(0.3_f64.sin()), 0.0, 0.3_f64.cos());
    let v = ellipse_point(0.5);
    let p = point(&mut session, v.x, v.y, v.z);
    let command = session.ellipse(f1, f2, p).unwrap();
    let e = add(&mut session, command);
    (session, l1, e, p)
}

#[test]
fn test_line_ellipse_has_fixed_slots() {
    let (session, l1, e, _) = ellipse_scene();
    let slots = slots_of(&session, (l1, e));
    assert_eq!(slots.len(), 4);
    let existing: Vec<bool> = slots
        .iter()
        .map(|id| session.node(*id).unwrap().exists)
        .collect();
    assert_eq!(existing, vec![true, true, false, false]);
    for id in &slots[..2] {
        let v = location(&session, *id);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v.z, 0.5_f64.cos(), epsilon = 1e-9);
    }
}

#[test]
fn test_ellipse_slots_follow_moving_geometry() {
    let (mut session, l1, e, p) = ellipse_scene();
    let slots = slots_of(&session, (l1, e));
    let before: Vec<Vector3> = slots[..2].iter().map(|id| location(&session, *id)).collect();

    let command = session.move_point(p, ellipse_point(0.55)).unwrap();
    session.execute(command).unwrap();

    for (id, old) in slots[..2].iter().zip(&before) {
        assert!(session.node(*id).unwrap().exists);
        let moved = (location(&session, *id) - old).norm();
        assert!(moved < 0.1, "slot jumped by {moved}");
    }
    assert!(slots[2..].iter().all(|id| !session.node(*id).unwrap().exists));
}

#[test]
fn test_line_through_ellipse_vertex_shares_point() {
    let (mut session, l1, e, _) = ellipse_scene();
    let vertex = Vector3::new(0.5_f64.sin(), 0.0, 0.5_f64.cos());
    let on_ellipse = point_at(&session, vertex).expect("vertex intersection");

    let f = point(&mut session, vertex.x, vertex.y, vertex.z);
    let g = point(&mut session, 0.0, 1.0, 1.0);
    let l2 = line(&mut session, f, g);

    assert_eq!(point_at(&session, vertex), Some(on_ellipse));
    let shared = data(&session, on_ellipse);
    assert!(same_pair(shared.principal, (l1, e)));
    assert_eq!(shared.others.len(), 2);
    assert!(shared.has_pair(l1, l2));
    assert!(shared.has_pair(e, l2));
    assert_eq!(slots_of(&session, (e, l2)).len() + 1, 4);
    assert_no_self_records(&session);
}

#[test]
fn test_parametric_curve_meets_line() {
    let mut session = Session::default();
    let a = point(&mut session, 1.0, 0.0, 0.0);
    let b = point(&mut session, 0.0, 0.0, 1.0);
    let l1 = line(&mut session, a, b);
    let command = session
        .parametric(["cos(t)", "sin(t)", "0"], -1.0, 1.0, vec![0.5], false)
        .unwrap();
    let arc = add(&mut session, command);

    let slots = slots_of(&session, (l1, arc));
    assert_eq!(slots.len(), session.config().parametric_slots);
    let found: Vec<_> = slots
        .iter()
        .filter(|id| session.node(**id).unwrap().exists)
        .collect();
    assert_eq!(found.len(), 1);
    assert_relative_eq!(location(&session, *found[0]), Vector3::x(), epsilon = 1e-9);
    assert_eq!(data(&session, *found[0]).order, 0);
}
