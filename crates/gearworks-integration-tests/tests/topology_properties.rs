//! Integration test: topology properties of the mechanical module.
//!
//! Each test builds a small contraption in a `GridWorld`, performs one kind
//! of edit, and checks the resulting network partition, variants, and world
//! contents. Every test ends with a full invariant check.

use gearworks_core::config::MechanicalConfig;
use gearworks_core::direction::{ConnectorSet, Direction};
use gearworks_core::event::MechanicalEvent;
use gearworks_core::fixed::Fixed64;
use gearworks_core::grid::GridPos;
use gearworks_core::test_utils::*;
use gearworks_power::{MechanicalModule, PlacementError};
use gearworks_spatial::{BlockAccess, GridWorld};
use std::collections::BTreeSet;

// ===========================================================================
// Helpers
// ===========================================================================

fn setup() -> (MechanicalModule, GridWorld) {
    let module = MechanicalModule::new(standard_registry(), MechanicalConfig::default());
    let grass = block(module.registry(), GRASS);
    (module, GridWorld::new().with_replaceable(grass))
}

fn p(x: i32, y: i32, z: i32) -> GridPos {
    GridPos::new(x, y, z)
}

fn place(m: &mut MechanicalModule, w: &mut GridWorld, pos: GridPos, name: &str) {
    let bt = block(m.registry(), name);
    if let Err(e) = m.place(w, pos, bt) {
        panic!("placing {name} at {pos} failed: {e}");
    }
}

fn check(m: &MechanicalModule, w: &GridWorld) {
    if let Err(violations) = m.validate_world(w) {
        panic!("invariants broken: {violations:#?}");
    }
}

/// A square loop in the xz plane: angled gears at the corners of a 3x3
/// ring, axles along the edges.
fn build_ring(m: &mut MechanicalModule, w: &mut GridWorld) {
    place(m, w, p(1, 0, 0), "axle-ew");
    place(m, w, p(2, 0, 1), "axle-ns");
    place(m, w, p(1, 0, 2), "axle-ew");
    place(m, w, p(0, 0, 1), "axle-ns");
    place(m, w, p(0, 0, 0), "angled_gear-es");
    place(m, w, p(2, 0, 0), "angled_gear-sw");
    place(m, w, p(2, 0, 2), "angled_gear-nw");
    place(m, w, p(0, 0, 2), "angled_gear-ne");
}

fn members(m: &MechanicalModule, pos: GridPos) -> BTreeSet<GridPos> {
    let id = m.network_of(pos).expect("node should have a network");
    m.network(id).expect("network exists").members().clone()
}

// ===========================================================================
// Partition
// ===========================================================================

#[test]
fn every_active_node_in_exactly_one_network() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, 0), "motor-e");
    place(&mut m, &mut w, p(1, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(2, 0, 0), "clutch-ew");
    place(&mut m, &mut w, p(3, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(0, 0, 5), "axle-ns");
    m.toggle_disconnected(p(2, 0, 0)).unwrap();

    let mut seen = BTreeSet::new();
    for net in m.networks() {
        for pos in net.members() {
            assert!(seen.insert(*pos), "{pos} appears in two networks");
        }
    }
    let active: BTreeSet<GridPos> = m
        .nodes()
        .filter(|(_, n)| n.is_active())
        .map(|(p, _)| p)
        .collect();
    assert_eq!(seen, active);
    assert_eq!(m.network_count(), 3);
    check(&m, &w);
}

// ===========================================================================
// Merge
// ===========================================================================

#[test]
fn bridging_merges_into_oldest_network() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, 0), "motor-e");
    place(&mut m, &mut w, p(1, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(3, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(4, 0, 0), "axle-ew");
    let left = m.network_of(p(0, 0, 0)).unwrap();
    let right = m.network_of(p(4, 0, 0)).unwrap();
    assert!(left < right);

    for t in 1..=10 {
        m.tick(t);
    }
    let before = m.current_angular_speed(p(1, 0, 0));
    assert!(before > Fixed64::ZERO);
    let mut expected = members(&m, p(0, 0, 0));
    expected.extend(members(&m, p(4, 0, 0)));
    m.drain_events();

    place(&mut m, &mut w, p(2, 0, 0), "axle-ew");
    expected.insert(p(2, 0, 0));

    assert_eq!(m.network_count(), 1);
    assert_eq!(m.network_of(p(4, 0, 0)), Some(left));
    assert_eq!(members(&m, p(0, 0, 0)), expected);
    assert_eq!(m.current_angular_speed(p(4, 0, 0)), before);
    let events = m.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        MechanicalEvent::NetworksMerged { survivor, absorbed, .. }
            if *survivor == left && *absorbed == right
    )));
    check(&m, &w);
}

#[test]
fn hub_joins_four_networks_at_once() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, -2), "axle-ns");
    place(&mut m, &mut w, p(2, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(0, 0, 2), "axle-ns");
    place(&mut m, &mut w, p(-2, 0, 0), "axle-ew");
    assert_eq!(m.network_count(), 4);
    let oldest = m.network_of(p(0, 0, -2)).unwrap();
    m.drain_events();

    let hub = block(m.registry(), "large_gear-neswud");
    let outcome = m.place(&mut w, p(0, 0, 0), hub).unwrap();

    assert_eq!(outcome.connections, ConnectorSet::from_code("nesw").unwrap());
    assert_eq!(outcome.network, Some(oldest));
    assert_eq!(m.network_count(), 1);
    assert_eq!(m.network(oldest).unwrap().len(), 5);
    let merges = m
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, MechanicalEvent::NetworksMerged { .. }))
        .count();
    assert_eq!(merges, 3);
    check(&m, &w);
}

// ===========================================================================
// Split
// ===========================================================================

#[test]
fn breaking_a_bridge_splits_into_components() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, 0), "motor-e");
    for x in 1..=6 {
        place(&mut m, &mut w, p(x, 0, 0), "axle-ew");
    }
    for t in 1..=20 {
        m.tick(t);
    }
    let original = m.network_of(p(0, 0, 0)).unwrap();
    let angle = m.current_angle(p(3, 0, 0));
    let speed = m.current_angular_speed(p(3, 0, 0));
    m.drain_events();

    m.break_block(&mut w, p(3, 0, 0)).unwrap();

    let left: BTreeSet<_> = (0..=2).map(|x| p(x, 0, 0)).collect();
    let right: BTreeSet<_> = (4..=6).map(|x| p(x, 0, 0)).collect();
    assert_eq!(members(&m, p(0, 0, 0)), left);
    assert_eq!(members(&m, p(6, 0, 0)), right);
    assert!(m.network(original).is_none());
    for pos in [p(0, 0, 0), p(6, 0, 0)] {
        assert_eq!(m.current_angle(pos), angle);
        assert_eq!(m.current_angular_speed(pos), speed);
    }

    let events = m.drain_events();
    let split = events.iter().find_map(|e| match e {
        MechanicalEvent::NetworkSplit { original: o, parts, .. } => Some((*o, parts.clone())),
        _ => None,
    });
    let (o, parts) = split.expect("split event");
    assert_eq!(o, original);
    assert_eq!(parts.len(), 2);
    check(&m, &w);
}

#[test]
fn removing_a_redundant_ring_edge_does_not_split() {
    let (mut m, mut w) = setup();
    build_ring(&mut m, &mut w);
    assert_eq!(m.network_count(), 1);
    let id = m.network_of(p(0, 0, 0)).unwrap();
    assert_eq!(m.network(id).unwrap().len(), 8);
    let corner = m.node(p(0, 0, 0)).unwrap();
    assert_eq!(corner.connections, ConnectorSet::from_code("es").unwrap());
    check(&m, &w);
    m.drain_events();

    m.break_block(&mut w, p(1, 0, 0)).unwrap();

    assert_eq!(m.network_count(), 1);
    assert_eq!(m.network_of(p(2, 0, 0)), Some(id));
    assert_eq!(m.network(id).unwrap().len(), 7);
    // The corners fall back to their dead-end variants.
    assert_eq!(
        m.node(p(0, 0, 0)).unwrap().block_type,
        block(m.registry(), "angled_gear-s")
    );
    assert_eq!(
        w.block_type_at(p(2, 0, 0)),
        Some(block(m.registry(), "angled_gear-s"))
    );
    let events = m.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, MechanicalEvent::NetworkSplit { .. })));
    check(&m, &w);
}

#[test]
fn second_cut_in_ring_splits() {
    let (mut m, mut w) = setup();
    build_ring(&mut m, &mut w);
    m.break_block(&mut w, p(1, 0, 0)).unwrap();
    m.break_block(&mut w, p(1, 0, 2)).unwrap();

    assert_eq!(m.network_count(), 2);
    assert_ne!(m.network_of(p(0, 0, 1)), m.network_of(p(2, 0, 1)));
    assert_eq!(m.network_of(p(0, 0, 0)), m.network_of(p(0, 0, 2)));
    check(&m, &w);
}

// ===========================================================================
// Variant consistency
// ===========================================================================

#[test]
fn world_always_holds_the_active_variant() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
    place(&mut m, &mut w, p(0, 0, 0), "angled_gear-n");
    place(&mut m, &mut w, p(1, 0, 0), "axle-ew");
    place(&mut m, &mut w, p(0, 1, 0), "axle-ud");

    for (pos, node) in m.nodes() {
        assert_eq!(w.block_type_at(pos), Some(node.block_type));
        let desc = m.registry().descriptor(node.block_type).unwrap();
        assert!(desc.supports(node.connections));
    }
    // The gear only had room for two.
    assert!(!m.is_connector_active(p(0, 1, 0), Direction::Down));

    m.break_block(&mut w, p(0, 0, -1)).unwrap();
    assert_eq!(
        w.block_type_at(p(0, 0, 0)),
        Some(block(m.registry(), "angled_gear-e"))
    );
    m.break_block(&mut w, p(1, 0, 0)).unwrap();
    // Nothing left to hold the gear.
    assert!(w.is_air(p(0, 0, 0)));
    assert!(m.node(p(0, 0, 0)).is_none());
    check(&m, &w);
}

// ===========================================================================
// Composite atomicity
// ===========================================================================

#[test]
fn composite_placement_is_all_or_nothing() {
    let (mut m, mut w) = setup();
    let stone = block(m.registry(), STONE);
    let grass = block(m.registry(), GRASS);
    w.set_block_type_at(p(1, 0, 1), stone);
    w.set_block_type_at(p(-1, 0, 0), grass);
    let before = w.clone();

    let hub = block(m.registry(), "large_gear-neswud");
    let err = m.place(&mut w, p(0, 0, 0), hub).unwrap_err();
    assert_eq!(err, PlacementError::Occupied { pos: p(1, 0, 1) });
    assert_eq!(w, before);
    assert_eq!(m.node_count(), 0);
    assert_eq!(m.satellite_count(), 0);

    w.clear_block_at(p(1, 0, 1));
    m.place(&mut w, p(0, 0, 0), hub).unwrap();
    assert_eq!(m.satellite_count(), 8);
    // Grass was overwritten by a placeholder.
    assert_eq!(w.block_type_at(p(-1, 0, 0)), Some(block(m.registry(), GEAR_FILLER)));
    check(&m, &w);
}

#[test]
fn breaking_any_cell_removes_the_whole_machine() {
    let (mut m, mut w) = setup();
    place(&mut m, &mut w, p(0, 0, 0), "pulverizer-u");
    place(&mut m, &mut w, p(0, 3, 0), "axle-ud");
    assert!(m.is_connector_active(p(0, 3, 0), Direction::Down));
    assert_eq!(m.network_count(), 1);

    m.break_block(&mut w, p(0, 1, 0)).unwrap();

    for y in 0..3 {
        assert!(w.is_air(p(0, y, 0)));
        assert!(m.principal_of(p(0, y, 0)).is_none());
    }
    assert!(!m.is_connector_active(p(0, 3, 0), Direction::Down));
    assert_eq!(m.network_count(), 1);
    check(&m, &w);
}

// ===========================================================================
// Idempotence
// ===========================================================================

#[test]
fn neighbor_notifications_converge() {
    let (mut m, mut w) = setup();
    build_ring(&mut m, &mut w);
    place(&mut m, &mut w, p(5, 0, 5), "large_gear-neswud");

    // Vandalize the world behind the module's back.
    w.clear_block_at(p(2, 0, 1));
    w.clear_block_at(p(6, 0, 5));
    let cells: Vec<GridPos> = vec![p(2, 0, 1), p(2, 0, 0), p(6, 0, 5), p(5, 0, 5)];

    for &c in &cells {
        m.on_neighbor_changed(&mut w, c);
    }
    check(&m, &w);
    let nodes: Vec<_> = m.nodes().map(|(p, n)| (p, *n)).collect();
    let world = w.clone();
    m.drain_events();

    for &c in &cells {
        m.on_neighbor_changed(&mut w, c);
    }
    let again: Vec<_> = m.nodes().map(|(p, n)| (p, *n)).collect();
    assert_eq!(nodes, again);
    assert_eq!(w, world);
    assert!(m.drain_events().is_empty());
    // The hub lost a rim cell and reverted to a plain vertical axle.
    assert_eq!(
        m.node(p(5, 0, 5)).unwrap().block_type,
        block(m.registry(), "axle-ud")
    );
}
