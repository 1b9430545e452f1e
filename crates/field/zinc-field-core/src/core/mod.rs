//! Type-specific field behavior.
//!
//! [`FieldCore`] is a closed set of variants and every capability below is a
//! single `match` over it:
//! - `composite`: component selection from sources and literal constants
//! - `region_ops`: sum, mean and RMS of a source over the nodes of a region
//! - `lookup`: a source evaluated at one fixed node, plainly or as a
//!   quaternion SLERP through the node's time sequence
//! - `image`: texture sampling at texture coordinates
//! - `nodal`: nodal parameters stored on mesh nodes, and element xi

mod composite;
mod image;
mod lookup;
mod nodal;
mod region_ops;

use serde::{Deserialize, Serialize};
use zinc_region_core::{ElementHandle, NodeHandle, Region, TimeSequence};

use crate::{AssignmentResult, EvaluationCache, Field, FieldError, ValueCache};

pub(crate) use composite::Composite;
pub use composite::ComponentSource;
pub(crate) use image::ImageSample;
pub use image::NativeResolution;
pub(crate) use lookup::{NodalLookup, QuaternionSlerp};
pub(crate) use nodal::NodeValue;
pub(crate) use region_ops::{ReductionKind, RegionOperation};

pub(crate) use composite::validate_component_map;

/// Public name of each field type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Composite,
    RegionSum,
    RegionMean,
    RegionRms,
    NodalLookup,
    QuaternionSlerp,
    ImageSample,
    NodeValue,
    XiCoordinates,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Composite => "composite",
            FieldKind::RegionSum => "region_sum",
            FieldKind::RegionMean => "region_mean",
            FieldKind::RegionRms => "region_rms",
            FieldKind::NodalLookup => "nodal_lookup",
            FieldKind::QuaternionSlerp => "quaternion_slerp",
            FieldKind::ImageSample => "image_sample",
            FieldKind::NodeValue => "node_value",
            FieldKind::XiCoordinates => "xi_coordinates",
        }
    }
}

pub(crate) enum FieldCore {
    Composite(Composite),
    RegionOperation(RegionOperation),
    NodalLookup(NodalLookup),
    QuaternionSlerp(QuaternionSlerp),
    ImageSample(ImageSample),
    NodeValue(NodeValue),
    XiCoordinates,
}

impl FieldCore {
    pub(crate) fn kind(&self) -> FieldKind {
        match self {
            FieldCore::Composite(_) => FieldKind::Composite,
            FieldCore::RegionOperation(op) => match op.kind() {
                ReductionKind::Sum => FieldKind::RegionSum,
                ReductionKind::Mean => FieldKind::RegionMean,
                ReductionKind::Rms => FieldKind::RegionRms,
            },
            FieldCore::NodalLookup(_) => FieldKind::NodalLookup,
            FieldCore::QuaternionSlerp(_) => FieldKind::QuaternionSlerp,
            FieldCore::ImageSample(_) => FieldKind::ImageSample,
            FieldCore::NodeValue(_) => FieldKind::NodeValue,
            FieldCore::XiCoordinates => FieldKind::XiCoordinates,
        }
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        match self {
            FieldCore::Composite(core) => core.evaluate(field, cache),
            FieldCore::RegionOperation(core) => core.evaluate(field, cache),
            FieldCore::NodalLookup(core) => core.evaluate(field, cache),
            FieldCore::QuaternionSlerp(core) => core.evaluate(field, cache),
            FieldCore::ImageSample(core) => core.evaluate(field, cache),
            FieldCore::NodeValue(core) => core.evaluate(field, cache),
            FieldCore::XiCoordinates => nodal::evaluate_xi(field, cache),
        }
    }

    pub(crate) fn assign(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
        values: &[f64],
    ) -> Result<AssignmentResult, FieldError> {
        match self {
            FieldCore::Composite(core) => core.assign(field, cache, values),
            FieldCore::NodeValue(core) => core.assign(field, cache, values),
            _ => Err(FieldError::NotAssignable(field.name())),
        }
    }

    pub(crate) fn is_defined_at_location(&self, field: &Field, cache: &mut EvaluationCache) -> bool {
        match self {
            FieldCore::RegionOperation(core) => core.is_defined_at_location(field, cache),
            FieldCore::NodalLookup(core) => core.is_defined_at_location(field),
            FieldCore::QuaternionSlerp(core) => core.is_defined_at_location(field),
            FieldCore::NodeValue(core) => core.is_defined_at_location(field, cache),
            FieldCore::XiCoordinates => cache.location().element_xi().is_some(),
            FieldCore::Composite(_) | FieldCore::ImageSample(_) => field
                .source_fields()
                .iter()
                .all(|source| cache.is_defined(source)),
        }
    }

    /// Type-specific parameters match; sources and literals are compared by
    /// the caller.
    pub(crate) fn compare(&self, other: &FieldCore) -> bool {
        match (self, other) {
            (FieldCore::Composite(a), FieldCore::Composite(b)) => a.compare(b),
            (FieldCore::RegionOperation(a), FieldCore::RegionOperation(b)) => a.compare(b),
            (FieldCore::NodalLookup(a), FieldCore::NodalLookup(b)) => a.compare(b),
            (FieldCore::QuaternionSlerp(a), FieldCore::QuaternionSlerp(b)) => a.compare(b),
            (FieldCore::ImageSample(a), FieldCore::ImageSample(b)) => a.compare(b),
            (FieldCore::NodeValue(a), FieldCore::NodeValue(b)) => a.compare(b),
            (FieldCore::XiCoordinates, FieldCore::XiCoordinates) => true,
            _ => false,
        }
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        match self {
            FieldCore::Composite(core) => core.source_string(field),
            FieldCore::RegionOperation(core) => core.source_string(field),
            FieldCore::NodalLookup(core) => core.source_string(field),
            FieldCore::QuaternionSlerp(core) => core.source_string(field),
            FieldCore::ImageSample(core) => core.source_string(field),
            FieldCore::NodeValue(core) => core.source_string(field),
            FieldCore::XiCoordinates => String::new(),
        }
    }

    pub(crate) fn native_resolution(&self, field: &Field) -> Option<NativeResolution> {
        match self {
            FieldCore::ImageSample(core) => core.native_resolution(field),
            _ => field
                .source_fields()
                .iter()
                .find_map(|source| source.core().native_resolution(source)),
        }
    }

    /// Bind per-field resources once the field node exists.
    pub(crate) fn attach_to_field(&mut self, field: &Field) -> Result<(), FieldError> {
        match self {
            FieldCore::NodalLookup(core) => core.attach_to_field(field),
            FieldCore::QuaternionSlerp(core) => core.attach_to_field(field),
            FieldCore::NodeValue(core) => {
                core.attach_to_field(field);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn find_element_xi(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
        values: &[f64],
        search_region: &Region,
    ) -> Result<(ElementHandle, Vec<f64>), FieldError> {
        match self {
            FieldCore::Composite(core) => {
                core.propagate_find_element_xi(field, cache, values, search_region)
            }
            FieldCore::XiCoordinates => nodal::find_element_xi(field, values, search_region),
            _ => Err(FieldError::FindElementXiUnsupported(field.name())),
        }
    }

    pub(crate) fn time_sequence_at_node(
        &self,
        field: &Field,
        node: &NodeHandle,
    ) -> Option<TimeSequence> {
        match self {
            FieldCore::NodeValue(core) => core.time_sequence_at_node(node),
            _ => field
                .source_fields()
                .iter()
                .find_map(|source| source.time_sequence_at_node(node)),
        }
    }

    /// Fresh copy of the definition, not yet attached to any field.
    pub(crate) fn copy_definition(&self) -> FieldCore {
        match self {
            FieldCore::Composite(core) => FieldCore::Composite(core.clone()),
            FieldCore::RegionOperation(core) => FieldCore::RegionOperation(core.clone()),
            FieldCore::NodalLookup(core) => FieldCore::NodalLookup(core.copy_definition()),
            FieldCore::QuaternionSlerp(core) => FieldCore::QuaternionSlerp(core.copy_definition()),
            FieldCore::ImageSample(core) => FieldCore::ImageSample(core.clone()),
            FieldCore::NodeValue(core) => FieldCore::NodeValue(core.copy_definition()),
            FieldCore::XiCoordinates => FieldCore::XiCoordinates,
        }
    }
}

impl Field {
    /// Region a sum, mean or RMS field reduces over.
    pub fn region_of_reduction(&self) -> Option<Region> {
        match &*self.core() {
            FieldCore::RegionOperation(core) => Some(core.region().clone()),
            _ => None,
        }
    }

    /// Node a lookup or SLERP field is bound to.
    pub fn lookup_node(&self) -> Option<NodeHandle> {
        match &*self.core() {
            FieldCore::NodalLookup(core) => Some(core.node().clone()),
            FieldCore::QuaternionSlerp(core) => Some(core.node().clone()),
            _ => None,
        }
    }

    pub fn composite_map(&self) -> Option<Vec<ComponentSource>> {
        match &*self.core() {
            FieldCore::Composite(core) => Some(core.map().to_vec()),
            _ => None,
        }
    }

    pub fn node_parameter_name(&self) -> Option<String> {
        match &*self.core() {
            FieldCore::NodeValue(core) => Some(core.parameter_name().to_string()),
            _ => None,
        }
    }
}

/// `%g`-style formatting used in definition strings.
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&exponent) {
        let formatted = format!("{value:.5e}");
        let (mantissa, power) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let power: i32 = power.parse().unwrap_or(0);
        let sign = if power < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), power.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}"))
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}
