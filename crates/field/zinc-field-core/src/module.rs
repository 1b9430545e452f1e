//! Field factories bound to one region and one manager.
//!
//! Every factory validates its arguments before creating anything, so a
//! failed call leaves no field behind. New fields get a temporary name and
//! are unmanaged: the manager drops them during its next update once nothing
//! refers to them. Use [`FieldModule::define_field`] to give a field a
//! permanent name.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, error};
use zinc_region_core::{NodeHandle, Region, Texture};

use crate::config::Config;
use crate::core::{
    validate_component_map, Composite, FieldCore, ImageSample, NodalLookup, NodeValue,
    QuaternionSlerp, ReductionKind, RegionOperation,
};
use crate::field::FieldNode;
use crate::{
    ChangeScope, ComponentSource, EvaluationCache, Field, FieldDescription, FieldError, FieldKind,
    Manager,
};

#[derive(Clone, Debug)]
pub struct FieldModule {
    region: Region,
    manager: Manager,
    config: Rc<Config>,
}

impl FieldModule {
    pub fn new(region: Region) -> Self {
        Self::with_config(region, Config::default())
    }

    pub fn with_config(region: Region, config: Config) -> Self {
        Self {
            region,
            manager: Manager::new(),
            config: Rc::new(config),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fresh evaluation cache, unbound and at time zero.
    pub fn create_cache(&self) -> EvaluationCache {
        EvaluationCache::new(Rc::clone(&self.config))
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<Field> {
        self.manager.find_by_name(name)
    }

    /// Descriptions of every registered field, as pretty JSON.
    pub fn describe_json(&self) -> serde_json::Result<String> {
        let descriptions: Vec<FieldDescription> =
            self.manager.fields().iter().map(Field::describe).collect();
        serde_json::to_string_pretty(&descriptions)
    }

    pub fn begin_change(&self) {
        self.manager.begin_change();
    }

    pub fn end_change(&self) {
        self.manager.end_change();
    }

    pub fn change_scope(&self) -> ChangeScope {
        self.manager.change_scope()
    }

    /// Name `field` permanently, or, when a field of that name already
    /// exists, redefine it to match `field`. Returns the named field, which
    /// is marked managed.
    pub fn define_field(&self, name: &str, field: &Field) -> Result<Field, FieldError> {
        let named = match self.manager.find_by_name(name) {
            Some(existing) => {
                self.manager.redefine(&existing, field).inspect_err(|err| {
                    error!("cannot redefine field '{name}': {err}");
                })?;
                existing
            }
            None => {
                field.set_name(name)?;
                field.clone()
            }
        };
        named.set_managed(true);
        Ok(named)
    }

    fn create_generic(
        &self,
        core: FieldCore,
        components: usize,
        sources: Vec<Field>,
        source_values: Vec<f64>,
    ) -> Result<Field, FieldError> {
        if components == 0 {
            return Err(FieldError::InvalidArgument(
                "fields need at least one component".to_string(),
            ));
        }
        if let Some(foreign) = sources.iter().find(|s| !s.belongs_to(&self.manager)) {
            return Err(FieldError::NotManaged(foreign.name()));
        }
        let field = Field::new(FieldNode {
            id: self.manager.allocate_field_id(),
            name: RefCell::new(self.manager.temporary_name(&self.config.temporary_name_prefix)),
            number_of_components: Cell::new(components),
            sources: RefCell::new(sources),
            source_values: RefCell::new(source_values),
            core: RefCell::new(core),
            manager: self.manager.downgrade(),
            managed: Cell::new(false),
            config: Rc::clone(&self.config),
            dependents: RefCell::new(Vec::new()),
        });
        field.link_sources();
        field.core_mut()?.attach_to_field(&field)?;
        self.manager.add(&field)?;
        debug!("created {}", field.command_string());
        Ok(field)
    }

    fn logged(kind: FieldKind, result: Result<Field, FieldError>) -> Result<Field, FieldError> {
        result.inspect_err(|err| error!("cannot create {} field: {err}", kind.as_str()))
    }

    // --- Composite family ---

    /// Components drawn from `sources` and `values` through `map`.
    pub fn create_composite(
        &self,
        sources: &[Field],
        values: &[f64],
        map: &[ComponentSource],
    ) -> Result<Field, FieldError> {
        let result = validate_component_map(sources, values, map)
            .map_err(FieldError::from)
            .and_then(|()| {
                self.create_generic(
                    FieldCore::Composite(Composite::new(map.to_vec())),
                    map.len(),
                    sources.to_vec(),
                    values.to_vec(),
                )
            });
        Self::logged(FieldKind::Composite, result)
    }

    pub fn create_constant(&self, values: &[f64]) -> Result<Field, FieldError> {
        let map: Vec<ComponentSource> = (0..values.len()).map(ComponentSource::Literal).collect();
        self.create_composite(&[], values, &map)
    }

    /// Every component of `field`, unchanged.
    pub fn create_identity(&self, field: &Field) -> Result<Field, FieldError> {
        let map: Vec<ComponentSource> = (0..field.number_of_components())
            .map(|c| ComponentSource::field(0, c))
            .collect();
        self.create_composite(std::slice::from_ref(field), &[], &map)
    }

    /// Component `index` (0-based) of `field`.
    pub fn create_component(&self, field: &Field, index: usize) -> Result<Field, FieldError> {
        self.create_composite(
            std::slice::from_ref(field),
            &[],
            &[ComponentSource::field(0, index)],
        )
    }

    /// All components of each field in turn.
    pub fn create_concatenate(&self, fields: &[Field]) -> Result<Field, FieldError> {
        let map: Vec<ComponentSource> = fields
            .iter()
            .enumerate()
            .flat_map(|(f, field)| {
                (0..field.number_of_components()).map(move |c| ComponentSource::field(f, c))
            })
            .collect();
        self.create_composite(fields, &[], &map)
    }

    /// Existing single-component wrapper of `field`, or a new one named
    /// `<field>.<index + 1>` when that name is free.
    pub fn component_wrapper(&self, field: &Field, index: usize) -> Result<Field, FieldError> {
        if field.number_of_components() == 1 && index == 0 {
            return Ok(field.clone());
        }
        let wanted = [ComponentSource::field(0, index)];
        let existing = self.manager.fields().into_iter().find(|candidate| {
            candidate.number_of_source_fields() == 1
                && candidate.source_field(0).as_ref() == Some(field)
                && candidate.composite_map().as_deref() == Some(&wanted[..])
        });
        if let Some(wrapper) = existing {
            return Ok(wrapper);
        }
        let wrapper = self.create_component(field, index)?;
        let name = format!("{}.{}", field.name(), index + 1);
        if self.manager.find_by_name(&name).is_none() {
            wrapper.set_name(&name)?;
        }
        Ok(wrapper)
    }

    // --- Region reductions ---

    fn create_reduction(
        &self,
        kind: ReductionKind,
        field_kind: FieldKind,
        source: &Field,
        region: &Region,
    ) -> Result<Field, FieldError> {
        let result = self.create_generic(
            FieldCore::RegionOperation(RegionOperation::new(kind, region.clone())),
            kind.number_of_components(source.number_of_components()),
            vec![source.clone()],
            Vec::new(),
        );
        Self::logged(field_kind, result)
    }

    /// Sum of `source` over every node of `region`.
    pub fn create_region_sum(&self, source: &Field, region: &Region) -> Result<Field, FieldError> {
        self.create_reduction(ReductionKind::Sum, FieldKind::RegionSum, source, region)
    }

    /// Mean of `source` over the nodes of `region` where it evaluates.
    pub fn create_region_mean(&self, source: &Field, region: &Region) -> Result<Field, FieldError> {
        self.create_reduction(ReductionKind::Mean, FieldKind::RegionMean, source, region)
    }

    /// Scalar root mean square of every component of `source` over `region`.
    pub fn create_region_rms(&self, source: &Field, region: &Region) -> Result<Field, FieldError> {
        self.create_reduction(ReductionKind::Rms, FieldKind::RegionRms, source, region)
    }

    // --- Fixed-node fields ---

    /// `source` evaluated at `node` whatever the caller's location.
    pub fn create_nodal_lookup(&self, source: &Field, node: NodeHandle) -> Result<Field, FieldError> {
        let result = self.create_generic(
            FieldCore::NodalLookup(NodalLookup::new(node)),
            source.number_of_components(),
            vec![source.clone()],
            Vec::new(),
        );
        Self::logged(FieldKind::NodalLookup, result)
    }

    /// SLERP of the (w, x, y, z) quaternion `source` between the time
    /// sequence samples at `node`.
    pub fn create_quaternion_slerp(
        &self,
        source: &Field,
        node: NodeHandle,
    ) -> Result<Field, FieldError> {
        let result = if source.number_of_components() != 4 {
            Err(FieldError::InvalidArgument(format!(
                "quaternion source '{}' has {} components, expected 4",
                source.name(),
                source.number_of_components()
            )))
        } else {
            self.create_generic(
                FieldCore::QuaternionSlerp(QuaternionSlerp::new(node)),
                4,
                vec![source.clone()],
                Vec::new(),
            )
        };
        Self::logged(FieldKind::QuaternionSlerp, result)
    }

    // --- Leaf fields ---

    /// Nodal parameters stored as `parameter_name` on the module region's
    /// nodes.
    pub fn create_node_value(
        &self,
        parameter_name: &str,
        components: usize,
    ) -> Result<Field, FieldError> {
        let result = if parameter_name.is_empty() {
            Err(FieldError::InvalidArgument("parameter name is empty".to_string()))
        } else {
            self.create_generic(
                FieldCore::NodeValue(NodeValue::new(parameter_name, self.region.clone())),
                components,
                Vec::new(),
                Vec::new(),
            )
        };
        Self::logged(FieldKind::NodeValue, result)
    }

    /// Element xi padded to three components.
    pub fn create_xi_coordinates(&self) -> Result<Field, FieldError> {
        let result = self.create_generic(FieldCore::XiCoordinates, 3, Vec::new(), Vec::new());
        Self::logged(FieldKind::XiCoordinates, result)
    }

    /// The module's managed xi field, created on first use.
    pub fn xi_field(&self) -> Result<Field, FieldError> {
        let name = self.config.image_domain_name.as_str();
        if let Some(existing) = self.manager.find_by_name(name) {
            if existing.kind() == FieldKind::XiCoordinates {
                return Ok(existing);
            }
            return Err(FieldError::DuplicateName(name.to_string()));
        }
        let xi = self.create_xi_coordinates()?;
        xi.set_name(name)?;
        xi.set_managed(true);
        Ok(xi)
    }

    // --- Images ---

    /// Samples `texture` at the values of `domain`, or at the module's xi
    /// field when no domain is given.
    pub fn create_image_sample(
        &self,
        domain: Option<&Field>,
        texture: Texture,
    ) -> Result<Field, FieldError> {
        let result = match domain {
            Some(field) => Ok(field.clone()),
            None => self.xi_field(),
        }
        .and_then(|coordinates| {
            if coordinates.number_of_components() > 3 {
                return Err(FieldError::InvalidArgument(format!(
                    "texture coordinates '{}' have {} components, at most 3 are allowed",
                    coordinates.name(),
                    coordinates.number_of_components()
                )));
            }
            let components = texture.number_of_components();
            self.create_generic(
                FieldCore::ImageSample(ImageSample::new(texture)),
                components,
                vec![coordinates],
                Vec::new(),
            )
        });
        Self::logged(FieldKind::ImageSample, result)
    }
}
