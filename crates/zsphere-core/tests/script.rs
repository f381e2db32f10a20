//! 脚本序列化与回放

mod common;

use common::*;
use zsphere_core::prelude::*;

fn build_scene() -> Session {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let p4 = point(&mut session, 1.0, 1.0, 0.0);
    let s = segment(&mut session, p3, p4);

    let command = session.circle(p3, p1).unwrap();
    add(&mut session, command);
    let command = session
        .measurement(MeasurementDef::SegmentLength { segment: s })
        .unwrap();
    let m1 = add(&mut session, command);
    let command = session.calculation("M1 * 2 + sin(pi / 6)").unwrap();
    let m2 = add(&mut session, command);
    let command = session.set_expression(m2, "M1 / 2").unwrap();
    session.execute(command).unwrap();

    let command = session
        .move_point(p4, Vector3::new(1.0, 0.5, 0.25))
        .unwrap();
    session.execute(command).unwrap();
    let command = session.set_style(p1, Style::new().with("label", "a&b=c"));
    session.execute(command).unwrap();
    let command = session.set_visibility(m1, false);
    session.execute(command).unwrap();
    let command = session.rotate_view(Vector3::x(), 0.3);
    session.execute(command).unwrap();

    let hidden = intersection_points(&session)[0];
    let command = session.convert_to_user_created(hidden);
    session.execute(command).unwrap();

    let command = session.plan_delete(p2).unwrap();
    session.execute(command).unwrap();
    session.undo().unwrap();
    session
}

fn summary(session: &Session) -> Vec<(String, bool, bool, Option<String>)> {
    session
        .graph()
        .attached()
        .map(|n| {
            (
                n.name.clone(),
                n.exists,
                n.showing,
                n.location().map(|v| format!("{:.8},{:.8},{:.8}", v.x, v.y, v.z)),
            )
        })
        .collect()
}

#[test]
fn test_script_round_trip() {
    let original = build_scene();
    let script = original.script();
    assert!(!script.is_empty());

    let mut replayed = Session::default();
    replayed.replay(&script).unwrap();

    assert_eq!(replayed.script(), script);
    assert_eq!(summary(&replayed), summary(&original));
}

#[test]
fn test_script_survives_json() {
    let original = build_scene();
    let script = original.script();
    let json = serde_json::to_string_pretty(&script).unwrap();
    let parsed: Vec<ScriptEntry> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, script);
}

#[test]
fn test_curve_groups_are_script_groups() {
    let mut session = Session::default();
    let p1 = point(&mut session, 1.0, 0.0, 0.0);
    let p2 = point(&mut session, 0.0, 1.0, 0.0);
    line(&mut session, p1, p2);
    let p3 = point(&mut session, 0.0, 0.0, 1.0);
    let p4 = point(&mut session, 1.0, 1.0, 0.0);
    line(&mut session, p3, p4);

    let script = session.script();
    assert_eq!(script.len(), 6);
    assert!(matches!(script[2], ScriptEntry::Single(_)));
    match &script[5] {
        ScriptEntry::Group(opcodes) => {
            assert_eq!(opcodes.len(), 3);
            assert!(opcodes[0].starts_with("AddLine&objectName=Li2"));
            assert!(opcodes[1].starts_with("AddIntersectionPoint&objectName=P5"));
            assert!(opcodes[2].contains("antipode=P5"));
        }
        other => panic!("expected a group, got {other:?}"),
    }
}

#[test]
fn test_replay_failure_names_entry() {
    let script = vec![
        ScriptEntry::Single(
            "AddPoint&objectName=P1&objectExists=true&objectShowing=true&pointDef=free\
             &pointVector=1.0,0.0,0.0"
                .to_string(),
        ),
        ScriptEntry::Single(
            "AddSegment&objectName=Ls1&objectExists=true&objectShowing=true&start=P1&end=P7\
             &normalVector=0,0,1&arcLength=0"
                .to_string(),
        ),
    ];
    let mut session = Session::default();
    match session.replay(&script) {
        Err(KernelError::Replay { entry, source, .. }) => {
            assert_eq!(entry, 1);
            assert_eq!(
                *source,
                KernelError::Opcode(OpcodeError::UnknownName("P7".to_string()))
            );
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(session.graph().attached().count(), 1);
}
