//! Load COLMAP reconstructions and stream them to a [Rerun](https://rerun.io) viewer.
//!
//! The [colmap] module reads and writes sparse models, [depth] reads dense depth maps,
//! [visualize] logs a [Reconstruction] to a recording stream and [session] ties it together:
//! derive the input paths, check them, load, visualize and display.

pub mod colmap;
pub mod depth;
pub mod export;
pub mod logging;
pub mod model;
pub mod session;
pub mod visualize;

pub use model::*;
