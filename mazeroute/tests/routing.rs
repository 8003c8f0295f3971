//! End-to-end routing scenarios.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use geometry::prelude::*;
use mazeroute::{CellDb, MazeRouter, MazeStyle, Orient, RouteNode, RouteStatus, TermShape};

const ONE_LAYER: &str = "\
layer m1 1 1 2 0 10
spacing m1 m1 1
wRate 50
wWidth 500
verbosity 0
";

const TWO_LAYER: &str = "\
layer m1 1 5 2 0 10
layer m2 5 1 2 0 10
contact via m1 m2 3
spacing m1 m1 1
spacing m2 m2 1
spacing via m1 1
spacing via m2 1
spacing via via 2
wRate 50
wWidth 500
verbosity 0
";

struct Net {
    start: Rect,
    start_layer: &'static str,
    dest: Rect,
    dest_layer: &'static str,
}

fn run(style_text: &str, db: &CellDb, net: &Net, bound: Rect) -> (RouteStatus, Option<Vec<RouteNode>>) {
    let style = MazeStyle::parse("test", style_text).unwrap();
    let starts = [TermShape::new(net.start, net.start_layer)];
    let dests = [TermShape::new(net.dest, net.dest_layer)];
    let mut router = MazeRouter::initialise(
        db,
        &starts,
        &dests,
        bound,
        &style,
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();
    router.build_estimate();
    router.route()
}

fn final_cost(path: &[RouteNode]) -> i64 {
    path.first().map(|n| n.cost).unwrap_or(i64::MAX)
}

/// The chain runs from the destination back to the start: its last node
/// must lie on the start terminal, and costs must not increase toward the
/// start.
fn check_chain(path: &[RouteNode], start: Rect) {
    assert!(!path.is_empty());
    let last = path.last().unwrap();
    assert!(
        start.expand_all(1).contains(last.point),
        "chain does not reach the start: {:?}",
        last.point
    );
    for w in path.windows(2) {
        assert!(w[0].cost >= w[1].cost, "cost increases toward the start");
    }
}

#[test]
fn single_layer_direct_route() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(20, 0, 24, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    let (status, path) = run(ONE_LAYER, &db, &net, Rect::new(-10, -10, 40, 20));
    assert_eq!(status, RouteStatus::Success);
    let path = path.unwrap();
    check_chain(&path, net.start);
    // A straight horizontal run of roughly the terminal separation.
    let cost = final_cost(&path);
    assert!((15..=25).contains(&cost), "unexpected cost {cost}");
    assert!(path.iter().all(|n| n.layer.as_str() == "m1"));
    assert!(path.iter().all(|n| !n.orient.is_contact()));
    // The completion point lies on the destination.
    let head = path.first().unwrap().point;
    assert!(net.dest.expand_all(1).contains(head), "head {head:?}");
}

#[test]
fn route_detours_around_an_obstacle() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(30, 0, 34, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    // A wall between the terminals, not connected to either.
    db.paint(Rect::new(14, -6, 16, 10), m1);
    let (status, path) = run(ONE_LAYER, &db, &net, Rect::new(-10, -20, 50, 30));
    assert_eq!(status, RouteStatus::Success);
    let path = path.unwrap();
    check_chain(&path, net.start);
    // The detour shows up both in the cost and in the geometry.
    let cost = final_cost(&path);
    assert!(cost > 30, "cost {cost} ignores the wall");
    assert!(
        path.iter().any(|n| n.point.y >= 10 || n.point.y <= -7),
        "no detour in {path:?}"
    );
    // At least two bends: out, across, and back.
    let mut bends = 0;
    for w in path.windows(2) {
        if w[0].orient != w[1].orient && w[1].orient != Orient::Start {
            bends += 1;
        }
    }
    assert!(bends >= 2, "expected a detour with bends, got {path:?}");
}

#[test]
fn via_reaches_the_cheap_layer() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", TWO_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let m2 = db.registry_probe(&style, "m2");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(0, 20, 4, 24),
        dest_layer: "m2",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m2);
    let (status, path) = run(TWO_LAYER, &db, &net, Rect::new(-10, -10, 30, 40));
    assert_eq!(status, RouteStatus::Success);
    let path = path.unwrap();
    check_chain(&path, net.start);
    // Vertical travel on m1 costs 5 per unit; the via plus m2's vertical
    // rate of 1 must win.
    let cost = final_cost(&path);
    assert!(cost < 60, "cost {cost}: the via was not taken");
    assert!(path.iter().any(|n| n.layer.as_str() == "m2"));
    assert!(path.iter().any(|n| n.layer.as_str() == "m1"));
    assert!(path.iter().any(|n| n.orient.is_contact()));
}

#[test]
fn fence_excludes_the_middle() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(30, 0, 34, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    // Routing happens outside fences here, so the fenced region between the
    // terminals is off limits.
    db.hint(Rect::new(10, -20, 20, 20), mazeroute::HintKind::Fence);
    let (status, path) = run(ONE_LAYER, &db, &net, Rect::new(-10, -30, 50, 30));
    assert_eq!(status, RouteStatus::Success);
    let path = path.unwrap();
    check_chain(&path, net.start);
    let cost = final_cost(&path);
    assert!(cost > 30 + 2 * 16, "cost {cost} crosses the fence");
    assert!(
        path.iter().any(|n| n.point.y >= 19 || n.point.y <= -20),
        "no fence detour in {path:?}"
    );
}

#[test]
fn magnet_hint_attracts_the_route() {
    let mut db = CellDb::new();
    let hinted = "\
layer m1 1 1 2 1 10
spacing m1 m1 1
wRate 50
wWidth 500
verbosity 0
";
    let style = MazeStyle::parse("test", hinted).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(30, 0, 34, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    db.hint(Rect::new(-5, 10, 40, 11), mazeroute::HintKind::Magnet);
    let (status, path) = run(hinted, &db, &net, Rect::new(-10, -10, 50, 30));
    assert_eq!(status, RouteStatus::Success);
    let path = path.unwrap();
    check_chain(&path, net.start);
    // Hugging the magnet at y = 10 costs about 10 + 30 + 10 plus jogs; a
    // straight run at y = 0 would pay the hint penalty of roughly
    // 10 * 30 = 300.
    let cost = final_cost(&path);
    assert!(cost < 150, "cost {cost}: hint penalty was not avoided");
    assert!(
        path.iter().any(|n| n.point.y >= 9),
        "route did not climb to the magnet: {path:?}"
    );
}

#[test]
fn fully_fenced_destination_fails() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(30, 0, 34, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    // The destination sits inside a fence, so routing is inside-fence; the
    // start is outside it and can never get in.
    db.hint(Rect::new(26, -6, 40, 12), mazeroute::HintKind::Fence);
    let (status, path) = run(ONE_LAYER, &db, &net, Rect::new(-10, -20, 60, 20));
    assert_eq!(status, RouteStatus::Failure);
    assert!(path.is_none());
}

#[test]
fn identical_inputs_give_identical_routes() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    let net = Net {
        start: Rect::new(0, 0, 2, 2),
        start_layer: "m1",
        dest: Rect::new(30, 0, 34, 4),
        dest_layer: "m1",
    };
    db.paint(net.start, m1);
    db.paint(net.dest, m1);
    db.paint(Rect::new(14, -6, 16, 10), m1);
    let bound = Rect::new(-10, -20, 50, 30);
    let (s1, p1) = run(ONE_LAYER, &db, &net, bound);
    let (s2, p2) = run(ONE_LAYER, &db, &net, bound);
    assert_eq!(s1, s2);
    assert_eq!(p1, p2);
}

#[test]
fn interrupt_before_search_reports_interrupted() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    db.paint(Rect::new(0, 0, 2, 2), m1);
    db.paint(Rect::new(30, 0, 34, 4), m1);
    let starts = [TermShape::new(Rect::new(0, 0, 2, 2), "m1")];
    let dests = [TermShape::new(Rect::new(30, 0, 34, 4), "m1")];
    let flag = Arc::new(AtomicBool::new(false));
    let mut router = MazeRouter::initialise(
        &db,
        &starts,
        &dests,
        Rect::new(-10, -10, 50, 20),
        &style,
        flag.clone(),
    )
    .unwrap();
    router.build_estimate();
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let (status, path) = router.route();
    assert_eq!(status, RouteStatus::Interrupted);
    assert!(path.is_none());
}

#[test]
fn clean_releases_the_call_state() {
    let mut db = CellDb::new();
    let style = MazeStyle::parse("test", ONE_LAYER).unwrap();
    let m1 = db.registry_probe(&style, "m1");
    db.paint(Rect::new(0, 0, 2, 2), m1);
    db.paint(Rect::new(20, 0, 24, 4), m1);
    let starts = [TermShape::new(Rect::new(0, 0, 2, 2), "m1")];
    let dests = [TermShape::new(Rect::new(20, 0, 24, 4), "m1")];
    let mut router = MazeRouter::initialise(
        &db,
        &starts,
        &dests,
        Rect::new(-10, -10, 40, 20),
        &style,
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();
    let (status, _) = router.route();
    assert_eq!(status, RouteStatus::Success);
    router.clean();
    // A cleaned router has nothing left to search.
    let (status, path) = router.route();
    assert_eq!(status, RouteStatus::Failure);
    assert!(path.is_none());
}
