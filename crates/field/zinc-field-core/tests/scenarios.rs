mod common;

use approx::assert_relative_eq;
use zinc_field_core::{ComponentSource, FieldError, FieldKind};

use common::module_for;

#[test]
fn composite_of_two_constants() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let a = module.create_constant(&[3.0])?;
    let b = module.create_constant(&[4.0])?;
    let c = module.create_composite(
        &[a.clone(), b.clone()],
        &[],
        &[ComponentSource::field(0, 0), ComponentSource::field(1, 0)],
    )?;

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&c)?, vec![3.0, 4.0]);
    assert_eq!(c.number_of_components(), 2);
    assert_eq!(c.source_fields(), vec![a, b]);
    Ok(())
}

#[test]
fn composite_selects_second_component() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let v = module.create_constant(&[5.0, 6.0])?;
    let d = module.create_component(&v, 1)?;

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&d)?, vec![6.0]);
    assert_eq!(d.composite_map(), Some(vec![ComponentSource::field(0, 1)]));
    Ok(())
}

#[test]
fn region_sum_and_mean_over_three_nodes() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let pressure = module.create_node_value("pressure", 1)?;
    let sum = module.create_region_sum(&pressure, module.region())?;
    let mean = module.create_region_mean(&pressure, module.region())?;

    let mut cache = module.create_cache();
    assert_relative_eq!(cache.evaluate_real(&sum)?[0], 12.0);
    assert_relative_eq!(cache.evaluate_real(&mean)?[0], 4.0);
    assert_eq!(sum.kind(), FieldKind::RegionSum);
    assert_eq!(mean.region_of_reduction().as_ref(), Some(module.region()));
    Ok(())
}

#[test]
fn field_cannot_become_its_own_source() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let x = module.define_field("x", &module.create_constant(&[1.0])?)?;

    let direct = module.create_identity(&x)?;
    let err = module.define_field("x", &direct).unwrap_err();
    assert!(matches!(err, FieldError::Cycle { ref field, .. } if field == "x"), "{err}");

    let y = module.define_field("y", &module.create_identity(&x)?)?;
    let through_y = module.create_identity(&y)?;
    let err = module.define_field("x", &through_y).unwrap_err();
    assert!(matches!(err, FieldError::Cycle { .. }), "{err}");

    // the failed redefinitions left x untouched
    assert!(x.is_constant_scalar(1.0));
    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&y)?, vec![1.0]);
    Ok(())
}
