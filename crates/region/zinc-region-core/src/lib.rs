//! zinc-region-core: the mesh-side collaborators of the computed field engine.
//!
//! Regions own nodes (with nodal parameters and optional time sequences),
//! elements and child regions, and publish batched change callbacks. Raster
//! textures and image filters live here too so image fields can sample and
//! retexture without depending on any codec.

pub mod element;
pub mod error;
pub mod node;
pub mod region;
pub mod spec;
pub mod texture;
pub mod time_sequence;

pub use element::{Element, ElementId};
pub use error::RegionError;
pub use node::{NodalParameters, Node, NodeId};
pub use region::{ElementHandle, NodeHandle, Region, RegionChange, RegionSubscription};
pub use spec::{ElementSpec, NodalParametersSpec, NodeSpec, RegionSpec};
pub use texture::{ImageFilter, RescaleIntensityFilter, Texture, TextureSpec, ThresholdFilter};
pub use time_sequence::{TimeInterpolation, TimeSequence};
