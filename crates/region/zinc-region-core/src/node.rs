use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{RegionError, TimeSequence};

/// Node identifier, unique within one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameter values stored for one named field at one node.
///
/// Without a time sequence there is exactly one sample; otherwise one sample
/// per time, linearly interpolated in between and clamped outside.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalParameters {
    time_sequence: Option<TimeSequence>,
    samples: Vec<Vec<f64>>,
}

impl NodalParameters {
    pub fn constant(values: Vec<f64>) -> Result<Self, RegionError> {
        if values.is_empty() {
            return Err(RegionError::NoComponents);
        }
        Ok(Self {
            time_sequence: None,
            samples: vec![values],
        })
    }

    pub fn time_varying(
        time_sequence: TimeSequence,
        samples: Vec<Vec<f64>>,
    ) -> Result<Self, RegionError> {
        if samples.len() != time_sequence.len() {
            return Err(RegionError::SampleCountMismatch {
                times: time_sequence.len(),
                samples: samples.len(),
            });
        }
        let components = samples.first().map(Vec::len).unwrap_or(0);
        if components == 0 {
            return Err(RegionError::NoComponents);
        }
        if let Some(bad) = samples.iter().find(|s| s.len() != components) {
            return Err(RegionError::ComponentMismatch {
                field: String::new(),
                expected: components,
                actual: bad.len(),
            });
        }
        Ok(Self {
            time_sequence: Some(time_sequence),
            samples,
        })
    }

    pub fn number_of_components(&self) -> usize {
        self.samples[0].len()
    }

    pub fn time_sequence(&self) -> Option<&TimeSequence> {
        self.time_sequence.as_ref()
    }

    pub fn samples(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn values_at_time(&self, time: f64) -> Vec<f64> {
        let Some(sequence) = &self.time_sequence else {
            return self.samples[0].clone();
        };
        let found = sequence.interpolation_for_time(time);
        let one = &self.samples[found.index_one];
        if found.index_one == found.index_two || found.xi == 0.0 {
            return one.clone();
        }
        let two = &self.samples[found.index_two];
        one.iter()
            .zip(two)
            .map(|(a, b)| a + found.xi * (b - a))
            .collect()
    }

    /// Overwrite the sample at `time` (or the only sample when not time varying).
    pub fn set_values_at_time(
        &mut self,
        time: f64,
        values: &[f64],
        tolerance: f64,
    ) -> Result<(), RegionError> {
        if values.len() != self.number_of_components() {
            return Err(RegionError::ComponentMismatch {
                field: String::new(),
                expected: self.number_of_components(),
                actual: values.len(),
            });
        }
        let index = match &self.time_sequence {
            None => 0,
            Some(sequence) => sequence
                .index_for_time(time, tolerance)
                .ok_or(RegionError::TimeNotInSequence { time })?,
        };
        self.samples[index].copy_from_slice(values);
        Ok(())
    }
}

/// A mesh node: an identifier plus named nodal parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    identifier: NodeId,
    fields: IndexMap<String, NodalParameters>,
}

impl Node {
    pub fn new(identifier: NodeId) -> Self {
        Self {
            identifier,
            fields: IndexMap::new(),
        }
    }

    pub fn with_parameters(mut self, name: impl Into<String>, parameters: NodalParameters) -> Self {
        self.fields.insert(name.into(), parameters);
        self
    }

    pub fn identifier(&self) -> NodeId {
        self.identifier
    }

    pub fn parameters(&self, name: &str) -> Option<&NodalParameters> {
        self.fields.get(name)
    }

    pub(crate) fn parameters_mut(&mut self, name: &str) -> Option<&mut NodalParameters> {
        self.fields.get_mut(name)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub(crate) fn define(&mut self, name: &str, parameters: NodalParameters) {
        self.fields.insert(name.to_string(), parameters);
    }

    pub(crate) fn undefine(&mut self, name: &str) -> bool {
        self.fields.shift_remove(name).is_some()
    }
}
