//! Visualization sessions: resolve the input paths of a reconstruction, check them, load the model
//! and stream it to a Rerun viewer.
//!
//! ```no_run
//! use colmap_rerun::session::*;
//! use std::path::PathBuf;
//!
//! let config = SessionConfig {
//!     dense_model_path: Some(PathBuf::from("/data/scene1")),
//!     resize: Some((640, 480)),
//!     ..Default::default()
//! };
//! visualize_colmap(&config, &Viewer::Spawn).unwrap();
//! ```
extern crate rerun;

use tracing::{debug, info};

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::colmap::load_sparse_model;
use crate::model::*;
use crate::visualize::{visualize_reconstruction, VisualizeOptions};

pub const DEFAULT_APPLICATION_ID: &str = "colmap_notebook_demo";
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a visualization session needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Directory of the sparse model. Ignored when `dense_model_path` is set.
    pub sparse_model_path: PathBuf,
    /// Directory of the images. Ignored when `dense_model_path` is set.
    pub images_path: PathBuf,
    /// Dense COLMAP workspace. Sparse model, images and depth maps are taken from inside it.
    pub dense_model_path: Option<PathBuf>,
    /// Resize images to `(width, height)` before logging.
    pub resize: Option<(u32, u32)>,
    /// Keep noisy points.
    pub unfiltered: bool,
    /// Viewer width.
    pub width: u32,
    /// Viewer height.
    pub height: u32,
    pub application_id: String,
    /// Show a progress bar while logging frames.
    pub progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            sparse_model_path: PathBuf::new(),
            images_path: PathBuf::new(),
            dense_model_path: None,
            resize: None,
            unfiltered: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            progress: true,
        }
    }
}

/// Locations a reconstruction is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub sparse_model: PathBuf,
    pub images_root: PathBuf,
    pub depths_root: Option<PathBuf>,
}

impl ModelPaths {
    /// Paths of a session. A dense workspace `D` overrides the explicit paths with `D/sparse`,
    /// `D/images` and `D/stereo/depth_maps`.
    pub fn resolve(
        sparse_model_path: &Path,
        images_path: &Path,
        dense_model_path: Option<&Path>,
    ) -> Self {
        match dense_model_path {
            Some(dense) => ModelPaths {
                sparse_model: dense.join("sparse"),
                images_root: dense.join("images"),
                depths_root: Some(dense.join("stereo").join("depth_maps")),
            },
            None => ModelPaths {
                sparse_model: sparse_model_path.to_path_buf(),
                images_root: images_path.to_path_buf(),
                depths_root: None,
            },
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::resolve(
            &config.sparse_model_path,
            &config.images_path,
            config.dense_model_path.as_deref(),
        )
    }

    /// Check that the sparse model and image directories exist. Depth maps are optional.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sparse_model.exists() {
            return Err(ConfigError::MissingSparseModel(self.sparse_model.clone()));
        }
        if !self.images_root.exists() {
            return Err(ConfigError::MissingImages(self.images_root.clone()));
        }
        Ok(())
    }
}

/// Where the recording goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    /// Spawn a native viewer, or reuse one already listening on the default port.
    Spawn,
    /// Stream to a running viewer, on the default address if none is given.
    Connect(Option<SocketAddr>),
    /// Write an `.rrd` file.
    Save(PathBuf),
}

impl Viewer {
    /// Start a recording named `application_id`. A spawned viewer opens a `width` x `height`
    /// window.
    pub fn start(
        &self,
        application_id: &str,
        width: u32,
        height: u32,
    ) -> Result<rerun::RecordingStream, Error> {
        let builder = rerun::RecordingStreamBuilder::new(application_id);
        let rec = match self {
            Viewer::Spawn => {
                let opts = rerun::SpawnOptions {
                    extra_args: vec![
                        "--window-size".to_string(),
                        format!("{}x{}", width, height),
                    ],
                    ..Default::default()
                };
                builder.spawn_opts(&opts, Some(FLUSH_TIMEOUT))?
            }
            Viewer::Connect(addr) => builder.connect_tcp_opts(
                addr.unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 9876))),
                Some(FLUSH_TIMEOUT),
            )?,
            Viewer::Save(path) => builder.save(path)?,
        };
        debug!("started recording {} to {:?}", application_id, self);
        Ok(rec)
    }
}

/// Produces the reconstruction of a session.
pub trait ReconstructionLoader {
    fn load(&self, paths: &ModelPaths) -> Result<Reconstruction, Error>;
}

/// Reads COLMAP models from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColmapLoader;

impl ReconstructionLoader for ColmapLoader {
    fn load(&self, paths: &ModelPaths) -> Result<Reconstruction, Error> {
        load_sparse_model(
            &paths.sparse_model,
            &paths.images_root,
            paths.depths_root.as_deref(),
        )
    }
}

/// Load the COLMAP reconstruction described by `config` and show it in `viewer`. Progress is
/// printed to stdout.
pub fn visualize_colmap(config: &SessionConfig, viewer: &Viewer) -> Result<(), Error> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    visualize_colmap_with(config, &ColmapLoader, viewer, &mut out)
}

/// [visualize_colmap] with a custom loader and progress output.
///
/// Paths are checked before anything is printed or loaded. Errors from the loader and the
/// visualizer are returned as is.
pub fn visualize_colmap_with<L, W>(
    config: &SessionConfig,
    loader: &L,
    viewer: &Viewer,
    out: &mut W,
) -> Result<(), Error>
where
    L: ReconstructionLoader,
    W: Write,
{
    let paths = ModelPaths::from_config(config);
    paths.validate()?;

    writeln!(
        out,
        "Loading sparse model from: {}",
        paths.sparse_model.display()
    )?;
    writeln!(out, "Loading images from: {}", paths.images_root.display())?;
    if let Some(depths_root) = &paths.depths_root {
        writeln!(out, "Loading depth maps from: {}", depths_root.display())?;
    }

    let rec = viewer.start(&config.application_id, config.width, config.height)?;

    let reconstruction = loader.load(&paths)?;
    let options = VisualizeOptions {
        filter_output: !config.unfiltered,
        resize: config.resize,
        verbose: config.progress,
    };
    let frames = visualize_reconstruction(&rec, &reconstruction, &options)?;
    info!("visualized {} frames", frames);

    display(&rec, out)
}

fn display<W: Write>(rec: &rerun::RecordingStream, out: &mut W) -> Result<(), Error> {
    rec.flush_blocking();
    writeln!(
        out,
        "Visualization complete! The Rerun viewer should now show the reconstruction."
    )?;
    Ok(())
}
