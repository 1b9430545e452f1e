use log::debug;
use zinc_region_core::{ImageFilter, Texture};

use super::{format_number, FieldCore};
use crate::{ChangeFlags, EvaluationCache, Field, FieldError, ValueCache};

/// Pixel grid of the texture an image field ultimately samples.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeResolution {
    pub dimension: usize,
    pub sizes: [usize; 3],
    pub texture_coordinate_field: Field,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ImageSample {
    texture: Texture,
    minimum: f64,
    maximum: f64,
}

impl ImageSample {
    pub(crate) fn new(texture: Texture) -> Self {
        Self {
            texture,
            minimum: 0.0,
            maximum: 1.0,
        }
    }

    pub(crate) fn compare(&self, other: &ImageSample) -> bool {
        self == other
    }

    /// Pixel values in `[0, 1]` map onto `[minimum, maximum]`.
    fn rescale(&self, value: f64) -> f64 {
        self.minimum + value * (self.maximum - self.minimum)
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let sources = cache.evaluate_source_fields(field)?;
        let coordinates = sources
            .first()
            .ok_or_else(|| FieldError::not_defined(&field.name()))?;
        let mut point = [0.0; 3];
        for (slot, value) in point.iter_mut().zip(&coordinates.values) {
            *slot = *value;
        }
        let values = self
            .texture
            .sample(point)
            .into_iter()
            .map(|v| self.rescale(v))
            .collect();
        Ok(ValueCache::from_values(values))
    }

    pub(crate) fn native_resolution(&self, field: &Field) -> Option<NativeResolution> {
        Some(NativeResolution {
            dimension: self.texture.dimension(),
            sizes: self.texture.sizes(),
            texture_coordinate_field: field.source_field(0)?,
        })
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        let coordinates = field.source_field(0).map(|s| s.name()).unwrap_or_default();
        let [x, y, z] = self.texture.sizes();
        format!(
            "coordinates {coordinates} minimum {} maximum {} texture {x}x{y}x{z}",
            format_number(self.minimum),
            format_number(self.maximum)
        )
    }
}

impl Field {
    /// Pixel grid and texture coordinates, found through the first source
    /// that samples an image.
    pub fn native_resolution(&self) -> Option<NativeResolution> {
        self.core().native_resolution(self)
    }

    pub fn image_texture(&self) -> Option<Texture> {
        match &*self.core() {
            FieldCore::ImageSample(image) => Some(image.texture.clone()),
            _ => None,
        }
    }

    pub fn image_output_range(&self) -> Option<(f64, f64)> {
        match &*self.core() {
            FieldCore::ImageSample(image) => Some((image.minimum, image.maximum)),
            _ => None,
        }
    }

    pub fn set_image_output_range(&self, minimum: f64, maximum: f64) -> Result<(), FieldError> {
        {
            let mut core = self.core_mut()?;
            let FieldCore::ImageSample(image) = &mut *core else {
                return Err(FieldError::InvalidArgument(format!(
                    "'{}' is not an image field",
                    self.name()
                )));
            };
            if image.minimum == minimum && image.maximum == maximum {
                return Ok(());
            }
            image.minimum = minimum;
            image.maximum = maximum;
        }
        self.set_changed();
        Ok(())
    }

    /// Replace the texture. The component count may only change while no
    /// other field uses this one.
    pub fn set_image_texture(&self, texture: Texture) -> Result<(), FieldError> {
        let current = self.number_of_components();
        let requested = texture.number_of_components();
        if requested != current && self.has_dependents() {
            return Err(FieldError::ComponentCountLocked {
                field: self.name(),
                current,
                requested,
            });
        }
        {
            let mut core = self.core_mut()?;
            let FieldCore::ImageSample(image) = &mut *core else {
                return Err(FieldError::InvalidArgument(format!(
                    "'{}' is not an image field",
                    self.name()
                )));
            };
            image.texture = texture;
        }
        self.0.number_of_components.set(requested);
        debug!("image field '{}' retextured with {requested} components", self.name());
        self.dependency_changed(ChangeFlags::OBJECT_NOT_IDENTIFIER);
        Ok(())
    }

    /// Run `filter` over the whole texture and retexture with its output.
    pub fn apply_image_filter(&self, filter: &dyn ImageFilter) -> Result<(), FieldError> {
        let texture = self.image_texture().ok_or_else(|| {
            FieldError::InvalidArgument(format!("'{}' is not an image field", self.name()))
        })?;
        let filtered = filter.apply(&texture)?;
        debug!("applied {} filter to '{}'", filter.name(), self.name());
        self.set_image_texture(filtered)
    }
}
