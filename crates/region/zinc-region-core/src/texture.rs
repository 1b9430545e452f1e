use serde::{Deserialize, Serialize};

use crate::RegionError;

/// A raster image of 1 to 3 dimensions with 1 to 4 components per pixel.
///
/// Pixels are stored x-fastest, then y, then z; each pixel holds
/// `components` consecutive values, nominally in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TextureSpec", into = "TextureSpec")]
pub struct Texture {
    dimension: usize,
    sizes: [usize; 3],
    components: usize,
    pixels: Vec<f64>,
}

/// Unvalidated serialized form of a [`Texture`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSpec {
    pub dimension: usize,
    pub sizes: [usize; 3],
    pub components: usize,
    pub pixels: Vec<f64>,
}

impl Texture {
    pub fn new(
        dimension: usize,
        sizes: [usize; 3],
        components: usize,
        pixels: Vec<f64>,
    ) -> Result<Self, RegionError> {
        if !(1..=3).contains(&dimension) {
            return Err(RegionError::InvalidTexture(format!(
                "dimension {dimension} not in 1..=3"
            )));
        }
        if !(1..=4).contains(&components) {
            return Err(RegionError::InvalidTexture(format!(
                "{components} components not in 1..=4"
            )));
        }
        if sizes.iter().any(|&s| s == 0) || sizes[dimension..].iter().any(|&s| s != 1) {
            return Err(RegionError::InvalidTexture(format!(
                "sizes {sizes:?} invalid for dimension {dimension}"
            )));
        }
        let expected = sizes.iter().product::<usize>() * components;
        if pixels.len() != expected {
            return Err(RegionError::InvalidTexture(format!(
                "buffer holds {} values, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            dimension,
            sizes,
            components,
            pixels,
        })
    }

    /// A texture with every pixel set to `value`.
    pub fn filled(
        dimension: usize,
        sizes: [usize; 3],
        components: usize,
        value: &[f64],
    ) -> Result<Self, RegionError> {
        if value.len() != components {
            return Err(RegionError::InvalidTexture(
                "fill value does not match component count".to_string(),
            ));
        }
        let count = sizes.iter().product::<usize>();
        let pixels = value.iter().copied().cycle().take(count * components).collect();
        Self::new(dimension, sizes, components, pixels)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn sizes(&self) -> [usize; 3] {
        self.sizes
    }

    pub fn number_of_components(&self) -> usize {
        self.components
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize, z: usize) -> Option<&[f64]> {
        let [sx, sy, sz] = self.sizes;
        if x >= sx || y >= sy || z >= sz {
            return None;
        }
        let start = ((z * sy + y) * sx + x) * self.components;
        self.pixels.get(start..start + self.components)
    }

    /// Nearest-pixel sample at a normalized coordinate; coordinates beyond the
    /// texture dimension are ignored and out-of-range values clamp to the edge.
    pub fn sample(&self, coordinates: [f64; 3]) -> Vec<f64> {
        let mut index = [0usize; 3];
        for d in 0..self.dimension {
            let size = self.sizes[d];
            let scaled = (coordinates[d] * size as f64).floor();
            index[d] = if scaled.is_nan() || scaled < 0.0 {
                0
            } else {
                (scaled as usize).min(size - 1)
            };
        }
        let [x, y, z] = index;
        self.pixel(x, y, z)
            .map(<[f64]>::to_vec)
            .unwrap_or_else(|| vec![0.0; self.components])
    }

    /// Same geometry, new pixel values.
    pub fn with_pixels(&self, pixels: Vec<f64>) -> Result<Self, RegionError> {
        Self::new(self.dimension, self.sizes, self.components, pixels)
    }
}

impl TryFrom<TextureSpec> for Texture {
    type Error = RegionError;

    fn try_from(raw: TextureSpec) -> Result<Self, Self::Error> {
        Texture::new(raw.dimension, raw.sizes, raw.components, raw.pixels)
    }
}

impl From<Texture> for TextureSpec {
    fn from(texture: Texture) -> Self {
        TextureSpec {
            dimension: texture.dimension,
            sizes: texture.sizes,
            components: texture.components,
            pixels: texture.pixels,
        }
    }
}

/// A whole-buffer pixel operation producing a new texture.
pub trait ImageFilter {
    fn name(&self) -> &str;
    fn apply(&self, input: &Texture) -> Result<Texture, RegionError>;
}

/// Pixels inside `[lower, upper]` keep their value; others become `outside_value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdFilter {
    pub lower: f64,
    pub upper: f64,
    pub outside_value: f64,
}

impl ImageFilter for ThresholdFilter {
    fn name(&self) -> &str {
        "threshold"
    }

    fn apply(&self, input: &Texture) -> Result<Texture, RegionError> {
        if self.lower > self.upper {
            return Err(RegionError::Filter(format!(
                "threshold lower {} exceeds upper {}",
                self.lower, self.upper
            )));
        }
        let pixels = input
            .pixels()
            .iter()
            .map(|&v| {
                if v >= self.lower && v <= self.upper {
                    v
                } else {
                    self.outside_value
                }
            })
            .collect();
        input.with_pixels(pixels)
    }
}

/// Linearly maps the buffer's value range onto `[output_minimum, output_maximum]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleIntensityFilter {
    pub output_minimum: f64,
    pub output_maximum: f64,
}

impl ImageFilter for RescaleIntensityFilter {
    fn name(&self) -> &str {
        "rescale_intensity"
    }

    fn apply(&self, input: &Texture) -> Result<Texture, RegionError> {
        let (min, max) = input
            .pixels()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = max - min;
        let out_span = self.output_maximum - self.output_minimum;
        let pixels = input
            .pixels()
            .iter()
            .map(|&v| {
                if span > 0.0 {
                    self.output_minimum + (v - min) / span * out_span
                } else {
                    self.output_minimum
                }
            })
            .collect();
        input.with_pixels(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Texture {
        Texture::new(2, [2, 2, 1], 1, vec![0.0, 1.0, 1.0, 0.0]).expect("texture")
    }

    #[test]
    fn validates_geometry() {
        assert!(Texture::new(2, [2, 2, 1], 1, vec![0.0; 3]).is_err());
        assert!(Texture::new(4, [1, 1, 1], 1, vec![0.0]).is_err());
        assert!(Texture::new(1, [2, 2, 1], 1, vec![0.0; 4]).is_err());
        assert!(Texture::new(1, [2, 1, 1], 5, vec![0.0; 10]).is_err());
    }

    #[test]
    fn samples_nearest_pixel_and_clamps() {
        let tex = checker();
        assert_eq!(tex.sample([0.25, 0.25, 0.0]), vec![0.0]);
        assert_eq!(tex.sample([0.75, 0.25, 0.0]), vec![1.0]);
        assert_eq!(tex.sample([0.25, 0.75, 0.0]), vec![1.0]);
        assert_eq!(tex.sample([1.0, 1.0, 9.0]), vec![0.0]);
        assert_eq!(tex.sample([-3.0, 0.9, 0.0]), vec![1.0]);
    }

    #[test]
    fn threshold_replaces_outside_values() {
        let filter = ThresholdFilter {
            lower: 0.5,
            upper: 1.0,
            outside_value: 0.25,
        };
        let out = filter.apply(&checker()).expect("filtered");
        assert_eq!(out.pixels(), &[0.25, 1.0, 1.0, 0.25]);
    }

    #[test]
    fn rescale_maps_value_range() {
        let filter = RescaleIntensityFilter {
            output_minimum: 2.0,
            output_maximum: 4.0,
        };
        let out = filter.apply(&checker()).expect("filtered");
        assert_eq!(out.pixels(), &[2.0, 4.0, 4.0, 2.0]);
    }

    #[test]
    fn deserializes_validated_textures() {
        let tex: Texture = serde_json::from_str(
            r#"{ "dimension": 1, "sizes": [3, 1, 1], "components": 1, "pixels": [0.0, 0.5, 1.0] }"#,
        )
        .expect("json");
        assert_eq!(tex.sample([0.5, 0.0, 0.0]), vec![0.5]);
        assert!(serde_json::from_str::<Texture>(
            r#"{ "dimension": 1, "sizes": [3, 1, 1], "components": 1, "pixels": [0.0] }"#
        )
        .is_err());
    }
}
