use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Element, ElementId, NodalParameters, Node, NodeId, Region, RegionError, TimeSequence};

/// Serializable description of a region tree, as stored in JSON fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub children: Vec<RegionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub fields: IndexMap<String, NodalParametersSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalParametersSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<TimeSequence>,
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub id: ElementId,
    pub dimension: usize,
}

impl NodalParametersSpec {
    fn build(&self, field: &str) -> Result<NodalParameters, RegionError> {
        match &self.times {
            Some(times) => NodalParameters::time_varying(times.clone(), self.values.clone()),
            None => match self.values.as_slice() {
                [single] => NodalParameters::constant(single.clone()),
                _ => Err(RegionError::SampleCountMismatch {
                    times: 1,
                    samples: self.values.len(),
                }),
            },
        }
        .map_err(|e| e.for_field(field))
    }
}

impl Region {
    /// Build a region tree from its description.
    pub fn from_spec(spec: &RegionSpec) -> Result<Region, RegionError> {
        let region = Region::new(spec.name.clone());
        region.populate(spec)?;
        Ok(region)
    }

    fn populate(&self, spec: &RegionSpec) -> Result<(), RegionError> {
        self.begin_change();
        let result: Result<(), RegionError> = (|| {
            for node_spec in &spec.nodes {
                let mut node = Node::new(node_spec.id);
                for (name, params) in &node_spec.fields {
                    node = node.with_parameters(name.clone(), params.build(name)?);
                }
                self.add_node(node)?;
            }
            for element in &spec.elements {
                self.add_element(Element::new(element.id, element.dimension))?;
            }
            for child_spec in &spec.children {
                self.create_child(child_spec.name.clone())?
                    .populate(child_spec)?;
            }
            Ok(())
        })();
        self.end_change();
        result
    }

    /// Describe this region tree.
    pub fn to_spec(&self) -> RegionSpec {
        let nodes = self
            .node_ids()
            .into_iter()
            .filter_map(|id| {
                self.with_node(id, |node| NodeSpec {
                    id,
                    fields: node
                        .field_names()
                        .filter_map(|name| {
                            node.parameters(name).map(|p| {
                                (
                                    name.to_string(),
                                    NodalParametersSpec {
                                        times: p.time_sequence().cloned(),
                                        values: p.samples().to_vec(),
                                    },
                                )
                            })
                        })
                        .collect(),
                })
            })
            .collect();
        let elements = self
            .elements()
            .into_iter()
            .map(|e| ElementSpec {
                id: e.identifier(),
                dimension: e.dimension(),
            })
            .collect();
        RegionSpec {
            name: self.name().to_string(),
            nodes,
            elements,
            children: self.children().iter().map(Region::to_spec).collect(),
        }
    }
}
