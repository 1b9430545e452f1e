mod common;

use std::f64::consts::FRAC_1_SQRT_2;

use approx::assert_relative_eq;
use zinc_field_core::region::{ElementId, NodalParameters, Node, NodeId, Region};
use zinc_field_core::{ChangeFlags, FieldError, FieldKind, FieldModule};

use common::{module_for, node, record_messages};

fn assert_quaternion(actual: &[f64], expected: [f64; 4]) {
    assert_eq!(actual.len(), 4);
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, e, epsilon = 1e-9);
    }
}

#[test]
fn lookup_evaluates_at_its_node_everywhere() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let pressure = module.create_node_value("pressure", 1)?;
    let at_two = module.create_nodal_lookup(&pressure, node(module.region(), 2))?;
    assert_eq!(at_two.kind(), FieldKind::NodalLookup);
    assert_eq!(at_two.lookup_node(), Some(node(module.region(), 2)));

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&at_two)?, vec![4.0]);
    cache.set_node(node(module.region(), 1));
    assert_eq!(cache.evaluate_real(&at_two)?, vec![4.0]);
    assert_eq!(cache.evaluate_real(&pressure)?, vec![2.0]);
    cache.set_element_xi(module.region().element(ElementId(1)).expect("element"), &[0.5, 0.5])?;
    assert_eq!(cache.evaluate_real(&at_two)?, vec![4.0]);
    assert!(cache.is_defined(&at_two));
    assert_eq!(at_two.command_string(), format!("nodal_lookup {} node 2", pressure.name()));
    Ok(())
}

#[test]
fn lookup_of_a_removed_node_is_rejected() {
    let module = module_for("three-nodes");
    let pressure = module.create_node_value("pressure", 1).expect("pressure");
    let handle = node(module.region(), 3);
    module.region().remove_node(NodeId(3)).expect("remove");
    let before = module.manager().number_of_fields();

    let err = module.create_nodal_lookup(&pressure, handle).unwrap_err();
    assert!(matches!(err, FieldError::InvalidArgument(_)), "{err}");
    assert_eq!(module.manager().number_of_fields(), before);
}

#[test]
fn node_edits_reach_lookup_dependents() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let pressure = module.define_field("pressure", &module.create_node_value("pressure", 1)?)?;
    let at_two = module.define_field("at_two", &module.create_nodal_lookup(&pressure, node(module.region(), 2))?)?;
    let copied = module.define_field("copied", &module.create_identity(&at_two)?)?;

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&at_two)?, vec![4.0]);

    let (messages, _subscription) = record_messages(&module);
    {
        let _scope = module.change_scope();
        module
            .region()
            .set_node_field_values(NodeId(2), "pressure", 0.0, &[40.0], 1e-9)?;
    }

    let messages = messages.borrow();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert!(message.object_change(&at_two).contains(ChangeFlags::FULL_RESULT));
    assert!(message.object_change(&copied).contains(ChangeFlags::FULL_RESULT));
    assert_eq!(message.object_change(&pressure), ChangeFlags::PARTIAL_RESULT);

    cache.invalidate();
    assert_eq!(cache.evaluate_real(&at_two)?, vec![40.0]);
    Ok(())
}

#[test]
fn slerp_blends_between_samples() -> anyhow::Result<()> {
    let module = module_for("rotation-track");
    let orientation = module.create_node_value("orientation", 4)?;
    let slerp = module.create_quaternion_slerp(&orientation, node(module.region(), 1))?;
    let mut cache = module.create_cache();

    cache.set_time(0.5);
    let angle = std::f64::consts::PI / 8.0;
    assert_quaternion(&cache.evaluate_real(&slerp)?, [angle.cos(), 0.0, 0.0, angle.sin()]);

    cache.set_time(1.0);
    assert_quaternion(&cache.evaluate_real(&slerp)?, [FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2]);

    // the last sample is stored unnormalized
    cache.set_time(2.0);
    assert_quaternion(&cache.evaluate_real(&slerp)?, [0.0, 0.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn slerp_clamps_outside_the_sequence() -> anyhow::Result<()> {
    let module = module_for("rotation-track");
    let orientation = module.create_node_value("orientation", 4)?;
    let slerp = module.create_quaternion_slerp(&orientation, node(module.region(), 1))?;
    let mut cache = module.create_cache();

    cache.set_time(-3.0);
    assert_quaternion(&cache.evaluate_real(&slerp)?, [1.0, 0.0, 0.0, 0.0]);
    cache.set_time(12.0);
    assert_quaternion(&cache.evaluate_real(&slerp)?, [0.0, 0.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn slerp_requires_a_time_sequence() -> anyhow::Result<()> {
    let region = Region::new("still");
    region.add_node(
        Node::new(NodeId(1))
            .with_parameters("q", NodalParameters::constant(vec![1.0, 0.0, 0.0, 0.0])?),
    )?;
    let module = FieldModule::new(region);
    let q = module.create_node_value("q", 4)?;
    let slerp = module.create_quaternion_slerp(&q, node(module.region(), 1))?;

    let mut cache = module.create_cache();
    let err = cache.evaluate(&slerp).unwrap_err();
    assert!(
        matches!(err, FieldError::MissingTimeSequence { node, .. } if node == NodeId(1)),
        "{err}"
    );
    assert!(!cache.is_defined(&slerp));
    Ok(())
}

#[test]
fn slerp_source_must_have_four_components() {
    let module = module_for("rotation-track");
    let height = module.create_node_value("height", 1).expect("height");
    let err = module
        .create_quaternion_slerp(&height, node(module.region(), 1))
        .unwrap_err();
    assert!(matches!(err, FieldError::InvalidArgument(_)), "{err}");
}

#[test]
fn time_sequence_is_found_through_sources() -> anyhow::Result<()> {
    let module = module_for("rotation-track");
    let height = module.create_node_value("height", 1)?;
    let wrapped = module.create_identity(&height)?;
    let sequence = wrapped
        .time_sequence_at_node(&node(module.region(), 1))
        .expect("sequence through identity");
    assert_eq!(sequence.times(), &[0.0, 2.0]);
    assert!(wrapped.time_sequence_at_node(&node(module.region(), 2)).is_none());
    Ok(())
}
