use approx::assert_relative_eq;
use zinc_region_core::{NodeId, Region, RegionSpec, Texture};

fn load_region(name: &str) -> Region {
    let spec: RegionSpec = zinc_test_fixtures::regions::load(name).expect("load region fixture");
    Region::from_spec(&spec).expect("build region")
}

#[test]
fn every_region_fixture_builds() {
    for key in zinc_test_fixtures::regions::keys() {
        let spec: RegionSpec = zinc_test_fixtures::regions::load(&key).expect("load");
        let region = Region::from_spec(&spec).unwrap_or_else(|e| panic!("{key}: {e}"));
        assert_eq!(region.to_spec(), spec, "{key} round trip");
    }
}

#[test]
fn three_nodes_fixture_has_partial_child() {
    let root = load_region("three-nodes");
    assert_eq!(root.number_of_nodes(), 3);
    let partial = root.find_child("partial").expect("partial child");
    assert!(!partial
        .node(NodeId(11))
        .expect("node 11")
        .defines("pressure"));
    assert_eq!(root.find_child("empty").expect("empty").number_of_nodes(), 0);
}

#[test]
fn rotation_track_interpolates_height_over_time() {
    let region = load_region("rotation-track");
    let node = region.node(NodeId(1)).expect("node");
    assert_relative_eq!(node.field_values("height", 1.5).expect("height")[0], 2.5);
    let sequence = node.time_sequence("orientation").expect("sequence");
    assert_eq!(sequence.times(), &[0.0, 1.0, 2.0]);
    assert!(region.node(NodeId(2)).expect("node 2").time_sequence("height").is_none());
}

#[test]
fn checker_texture_fixture_loads() {
    let texture: Texture = zinc_test_fixtures::textures::load("checker-2x2").expect("texture");
    assert_eq!(texture.sizes(), [2, 2, 1]);
    assert_eq!(texture.sample([0.9, 0.1, 0.0]), vec![1.0]);
}
