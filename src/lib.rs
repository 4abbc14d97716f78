//! terrastream — core of a planetary terrain streaming engine.
//!
//! Given a moving viewpoint, the crate maintains an adaptive
//! level-of-detail quadtree over the Earth's surface and keeps its terrain
//! tiles resident in a bounded, reusable cache fed by on-demand reads from
//! a hierarchical on-disk dataset. Three pieces cooperate:
//!
//! - the [`quadtree`] selects, splits and merges tiles for the current
//!   viewpoint and culls against horizon and frustum;
//! - the [`dataset`] reader synthesizes a tile's elevation grid and colour
//!   imagery from overlapping source pyramids with per-band tile sizes;
//! - the [`cache`] hands tiles between the two frame-pipeline consumers
//!   without copies, bounding the number of unused residents.
//!
//! Rendering, input and the interactive camera live outside the crate; the
//! [`render::RenderBackend`] and [`camera`] types define the seams.

pub mod animation;
pub mod cache;
pub mod camera;
pub mod colormap;
pub mod dataset;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod poi;
pub mod quadtree;
pub mod render;
pub mod stats;
pub mod tile;
pub mod view;

pub use cache::{Consumer, TileCache, TileKey};
pub use dataset::{Dataset, DatasetLayout};
pub use error::{Error, Result};
pub use pipeline::{FramePipeline, PipelineConfig};
pub use quadtree::Earth;
pub use render::{RenderBackend, TextureHandle};
pub use tile::TerrainTile;
pub use view::{ViewSnapshot, ViewState};
