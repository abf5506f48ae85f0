//! Satellite scene discovery.
//!
//! Searches a STAC API (Earth Search by default) for Sentinel-2 L2A scenes
//! intersecting a parcel, converts the returned items into [`Scene`]s and
//! picks at most one scene per acquisition date with [`SceneSelector`].
//!
//! The pipeline only depends on the [`SceneCatalog`] trait, so tests can
//! script catalog responses without a network.

pub mod client;
pub mod error;
pub mod geojson;
pub mod models;
pub mod scene;
pub mod selector;

pub use client::{SceneCatalog, StacCatalog, StacCatalogClient, StacClientOptions};
pub use error::{CatalogError, Result};
pub use scene::{AssetRef, Scene};
pub use selector::SceneSelector;
