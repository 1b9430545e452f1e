mod common;

use zinc_field_core::region::{ElementId, RescaleIntensityFilter, Texture, ThresholdFilter};
use zinc_field_core::{FieldError, FieldKind};

use common::{load_texture, module_for};

#[test]
fn image_samples_the_xi_field_by_default() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let image = module.create_image_sample(None, load_texture("checker-2x2"))?;
    let xi = module.find_field_by_name("xi").expect("xi field created");
    assert_eq!(xi.kind(), FieldKind::XiCoordinates);
    assert!(xi.is_managed());
    assert_eq!(image.source_field(0), Some(xi.clone()));
    assert_eq!(module.xi_field()?, xi);

    let element = module.region().element(ElementId(1)).expect("element");
    let mut cache = module.create_cache();
    cache.set_element_xi(element.clone(), &[0.25, 0.25])?;
    assert_eq!(cache.evaluate_real(&image)?, vec![0.0]);
    cache.set_element_xi(element.clone(), &[0.75, 0.25])?;
    assert_eq!(cache.evaluate_real(&image)?, vec![1.0]);

    image.set_image_output_range(10.0, 20.0)?;
    assert_eq!(image.image_output_range(), Some((10.0, 20.0)));
    cache.invalidate();
    assert_eq!(cache.evaluate_real(&image)?, vec![20.0]);

    assert!(module.create_cache().evaluate(&image).is_err());
    Ok(())
}

#[test]
fn native_resolution_propagates_through_sources() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let image = module.create_image_sample(None, load_texture("checker-2x2"))?;
    let wrapped = module.create_identity(&image)?;

    let resolution = wrapped.native_resolution().expect("resolution");
    assert_eq!(resolution.dimension, 2);
    assert_eq!(resolution.sizes, [2, 2, 1]);
    assert_eq!(Some(resolution.texture_coordinate_field), module.find_field_by_name("xi"));
    assert!(module.create_constant(&[1.0])?.native_resolution().is_none());
    Ok(())
}

#[test]
fn coordinates_are_limited_to_three_components() {
    let module = module_for("three-nodes");
    let four = module.create_constant(&[0.0; 4]).expect("constant");
    let err = module
        .create_image_sample(Some(&four), load_texture("checker-2x2"))
        .unwrap_err();
    assert!(matches!(err, FieldError::InvalidArgument(_)), "{err}");
}

#[test]
fn retexturing_a_used_image_keeps_its_components() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let coordinates = module.create_constant(&[0.9, 0.1])?;
    let image = module.create_image_sample(Some(&coordinates), load_texture("checker-2x2"))?;
    let rgb = Texture::filled(2, [2, 2, 1], 3, &[0.5, 0.5, 0.5])?;

    image.set_image_texture(rgb.clone())?;
    assert_eq!(image.number_of_components(), 3);

    let user = module.create_identity(&image)?;
    let err = image.set_image_texture(load_texture("checker-2x2")).unwrap_err();
    assert_eq!(
        err,
        FieldError::ComponentCountLocked {
            field: image.name(),
            current: 3,
            requested: 1
        }
    );
    image.set_image_texture(Texture::filled(1, [4, 1, 1], 3, &[0.25, 0.25, 0.25])?)?;

    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&user)?, vec![0.25, 0.25, 0.25]);
    Ok(())
}

#[test]
fn removed_users_keep_the_image_components_locked() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let coordinates = module.create_constant(&[0.1, 0.1])?;
    let rgb = Texture::filled(2, [2, 2, 1], 3, &[0.5, 0.5, 0.5])?;
    let image = module.create_image_sample(Some(&coordinates), rgb)?;
    let blue = module.create_component(&image, 2)?;
    module.manager().remove(&blue)?;

    let err = image.set_image_texture(load_texture("checker-2x2")).unwrap_err();
    assert!(matches!(err, FieldError::ComponentCountLocked { .. }), "{err}");
    assert_eq!(module.create_cache().evaluate_real(&blue)?, vec![0.5]);

    drop(blue);
    image.set_image_texture(load_texture("checker-2x2"))?;
    assert_eq!(image.number_of_components(), 1);
    Ok(())
}

#[test]
fn filters_replace_the_texture() -> anyhow::Result<()> {
    let module = module_for("three-nodes");
    let coordinates = module.create_constant(&[0.75, 0.25])?;
    let image = module.create_image_sample(Some(&coordinates), load_texture("checker-2x2"))?;
    let mut cache = module.create_cache();
    assert_eq!(cache.evaluate_real(&image)?, vec![1.0]);

    image.apply_image_filter(&ThresholdFilter {
        lower: -1.0,
        upper: 0.5,
        outside_value: 0.25,
    })?;
    assert_eq!(
        image.image_texture().expect("texture").pixels(),
        &[0.0, 0.25, 0.25, 0.0]
    );
    cache.invalidate();
    assert_eq!(cache.evaluate_real(&image)?, vec![0.25]);

    image.apply_image_filter(&RescaleIntensityFilter {
        output_minimum: 0.0,
        output_maximum: 1.0,
    })?;
    cache.invalidate();
    assert_eq!(cache.evaluate_real(&image)?, vec![1.0]);

    let bad = ThresholdFilter {
        lower: 1.0,
        upper: 0.0,
        outside_value: 0.0,
    };
    assert!(matches!(image.apply_image_filter(&bad), Err(FieldError::Region(_))));

    let k = module.create_constant(&[1.0])?;
    assert!(k.apply_image_filter(&bad).is_err());
    Ok(())
}
