#![doc = "hydroprep public API"]
#[cfg(feature = "fetch")]
pub mod acquire;
pub mod cli;
mod clip;
pub mod commands;
mod error;
pub mod hotspot;
mod pipeline;
mod proj;
pub mod rules;
mod schema;
pub mod sites;
mod store;
mod types;

#[doc(inline)]
pub use error::PrepError;

#[doc(inline)]
pub use schema::{AttrValue, Field, FieldKind, Schema};

#[doc(inline)]
pub use store::{load, Feature, FeatureStore, Geometry};

#[doc(inline)]
pub use types::{HucCode, HucLevel};

#[doc(inline)]
pub use clip::{assign_by_interior_point, clip_level, clip_to_boundary, Container};

#[doc(inline)]
pub use pipeline::{containers_from_store, run, HierarchyLevel, PipelineConfig};
