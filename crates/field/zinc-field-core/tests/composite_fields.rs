mod common;

use approx::assert_relative_eq;
use zinc_field_core::region::ElementId;
use zinc_field_core::{ComponentSource, CompositeError, FieldError, FieldKind};

use common::module_for;

#[test]
fn invalid_component_maps_create_nothing() {
    let module = module_for("three-nodes");
    let a = module.create_constant(&[1.0, 2.0]).expect("a");
    let b = module.create_constant(&[3.0]).expect("b");
    let before = module.manager().number_of_fields();

    let cases: Vec<(Vec<_>, Vec<f64>, Vec<ComponentSource>)> = vec![
        (vec![a.clone(), a.clone()], vec![], vec![ComponentSource::field(0, 0), ComponentSource::field(1, 0)]),
        (vec![a.clone(), b.clone()], vec![], vec![ComponentSource::field(1, 0), ComponentSource::field(0, 0)]),
        (vec![a.clone()], vec![], vec![ComponentSource::field(0, 2)]),
        (vec![a.clone(), b.clone()], vec![], vec![ComponentSource::field(0, 0)]),
        (vec![], vec![1.0, 2.0], vec![ComponentSource::Literal(1), ComponentSource::Literal(0)]),
        (vec![], vec![1.0, 2.0], vec![ComponentSource::Literal(0)]),
        (vec![a.clone()], vec![], vec![]),
    ];
    for (sources, values, map) in cases {
        let err = module
            .create_composite(&sources, &values, &map)
            .expect_err("map should be rejected");
        assert!(matches!(err, FieldError::Composite(_)), "{err}");
    }
    assert_eq!(module.manager().number_of_fields(), before);
}

#[test]
fn rejection_reasons_are_specific() {
    let module = module_for("three-nodes");
    let a = module.create_constant(&[1.0, 2.0]).expect("a");

    let err = module
        .create_composite(&[a.clone()], &[5.0], &[ComponentSource::field(0, 1)])
        .unwrap_err();
    assert_eq!(err, FieldError::Composite(CompositeError::UnusedValues));

    let err = module
        .create_composite(&[a.clone()], &[], &[ComponentSource::field(1, 0)])
        .unwrap_err();
    assert_eq!(
        err,
        FieldError::Composite(CompositeError::InvalidFieldIndex { component: 0, index: 1 })
    );
}

#[test]
fn fields_may_be_reused_after_first_use() {
    let module = module_for("three-nodes");
    let a = module.create_constant(&[1.0, 2.0]).expect("a");
    let b = module.create_constant(&[3.0]).expect("b");
    let mixed = module
        .create_composite(
            &[a.clone(), b.clone()],
            &[9.0],
            &[
                ComponentSource::field(0, 1),
                ComponentSource::Literal(0),
                ComponentSource::field(1, 0),
                ComponentSource::field(0, 0),
            ],
        )
        .expect("mixed");

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&mixed).expect("evaluate"), vec![2.0, 9.0, 3.0, 1.0]);
}

#[test]
fn constants_and_identity() {
    let module = module_for("three-nodes");
    let k = module.create_constant(&[2.5]).expect("constant");
    assert!(k.is_constant());
    assert!(k.is_constant_scalar(2.5));
    assert!(!k.is_constant_scalar(1.0));

    let v = module.create_constant(&[1.0, 2.0, 3.0]).expect("vector");
    assert!(!v.is_constant_scalar(1.0));
    let same = module.create_identity(&v).expect("identity");
    assert!(!same.is_constant());
    assert_eq!(same.number_of_components(), 3);

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&same).expect("evaluate"), vec![1.0, 2.0, 3.0]);
    assert!(module.create_constant(&[]).is_err());
}

#[test]
fn command_string_collapses_whole_fields() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let a = module.define_field("a", &module.create_constant(&[1.0, 2.0])?)?;
    let b = module.define_field("b", &module.create_constant(&[3.0, 4.0])?)?;

    let whole = module.create_concatenate(&[a.clone(), b.clone()])?;
    assert_eq!(whole.command_string(), "composite a b");

    let picked = module.create_composite(
        &[a.clone(), b.clone()],
        &[3.5],
        &[
            ComponentSource::field(0, 1),
            ComponentSource::Literal(0),
            ComponentSource::field(1, 0),
        ],
    )?;
    assert_eq!(picked.command_string(), "composite a.2 3.5 b.1");
    assert_eq!(module.create_constant(&[1.5, 0.0])?.command_string(), "composite 1.5 0");

    let description = picked.describe();
    assert_eq!(description.kind, FieldKind::Composite);
    assert_eq!(description.sources, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(description.source_values, vec![3.5]);
    let json = serde_json::to_value(&description)?;
    assert_eq!(json["kind"], "composite");
    Ok(())
}

#[test]
fn component_wrapper_is_found_again() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let position = module.define_field("position", &module.create_node_value("position", 2)?)?;

    let y = module.component_wrapper(&position, 1)?;
    assert_eq!(y.name(), "position.2");
    let again = module.component_wrapper(&position, 1)?;
    assert_eq!(again, y);

    let scalar = module.create_constant(&[1.0])?;
    assert_eq!(module.component_wrapper(&scalar, 0)?, scalar);

    let mut cache = module.create_cache();
    cache.set_node(common::node(module.region(), 3));
    assert_eq!(cache.evaluate_real(&y)?, vec![5.0]);
    Ok(())
}

#[test]
fn derivatives_follow_element_xi() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let xi = module.xi_field()?;
    let element = module.region().element(ElementId(1)).expect("element 1");
    let picked = module.create_composite(
        &[xi.clone()],
        &[7.0],
        &[ComponentSource::field(0, 1), ComponentSource::Literal(0)],
    )?;

    let mut cache = module.create_cache();
    cache.set_element_xi(element, &[0.25, 0.5])?;

    let (values, derivatives) = cache.evaluate_with_derivatives(&xi)?;
    assert_eq!(values, vec![0.25, 0.5, 0.0]);
    assert_eq!(derivatives, Some(vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]));

    let (values, derivatives) = cache.evaluate_with_derivatives(&picked)?;
    assert_eq!(values, vec![0.5, 7.0]);
    assert_eq!(derivatives, Some(vec![0.0, 1.0, 0.0, 0.0]));

    // values alone carry no derivatives
    let mut plain = module.create_cache();
    plain.set_element_xi(module.region().element(ElementId(1)).expect("element"), &[0.25, 0.5])?;
    assert!(plain.evaluate(&picked)?.valid_derivatives().is_none());
    Ok(())
}

#[test]
fn derivatives_downgrade_through_reductions() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let pressure = module.create_node_value("pressure", 1)?;
    let sum = module.create_region_sum(&pressure, module.region())?;
    let xi = module.xi_field()?;
    let both = module.create_concatenate(&[xi, sum])?;

    let mut cache = module.create_cache();
    cache.set_element_xi(module.region().element(ElementId(1)).expect("element"), &[0.5, 0.5])?;
    let (values, derivatives) = cache.evaluate_with_derivatives(&both)?;
    assert_relative_eq!(values[3], 12.0);
    assert!(derivatives.is_none());
    Ok(())
}

#[test]
fn find_element_xi_through_a_single_source() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let region = module.region().clone();
    let xi = module.xi_field()?;
    let mut cache = module.create_cache();

    let (element, found) = cache.find_element_xi(&xi, &[0.25, 0.5, 0.0], &region)?;
    assert_eq!(element.identifier(), ElementId(1));
    assert_eq!(found, vec![0.25, 0.5]);

    let (element, found) = cache.find_element_xi(&xi, &[0.25, 0.5, 0.75], &region)?;
    assert_eq!(element.identifier(), ElementId(2));
    assert_eq!(found, vec![0.25, 0.5, 0.75]);

    let first = module.create_component(&xi, 0)?;
    let (element, found) = cache.find_element_xi(&first, &[0.5], &region)?;
    assert_eq!(element.identifier(), ElementId(1));
    assert_eq!(found, vec![0.5, 0.0]);

    let two = module.create_concatenate(&[xi.clone(), module.create_constant(&[1.0])?])?;
    let err = cache.find_element_xi(&two, &[0.0, 0.0, 0.0, 1.0], &region).unwrap_err();
    assert!(matches!(err, FieldError::FindElementXiUnsupported(_)));

    assert!(cache.find_element_xi(&xi, &[2.0, 0.0, 0.0], &region).is_err());
    Ok(())
}
