//! Logging a reconstruction to Rerun.
//!
//! Each registered image becomes one step on the `frame` timeline: the camera pose and
//! intrinsics, the image itself, its keypoints, the 3D points it sees and, for dense models, its
//! depth map.
extern crate image;
extern crate indicatif;
extern crate itertools;
extern crate rayon;
extern crate rerun;

use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{debug, info, warn};

use std::collections::BTreeMap;
use std::path::Path;

use crate::depth::{depth_map_path, read_depth_map, DepthMap};
use crate::model::*;

const DESCRIPTION: &str = "\
# Sparse reconstruction by COLMAP

Camera poses, intrinsics and images of a COLMAP reconstruction, one frame per registered image.
The 3D points shown for a frame are the ones observed by its image; their reprojection error is
plotted under `plot/avg_reproj_err`. When a dense model is loaded, the per-image depth maps are
back-projected through the camera.
";

const KEYPOINT_COLOR: [u8; 3] = [34, 138, 167];
const ERROR_COLOR: [u8; 3] = [240, 45, 58];

/// Options for [visualize_reconstruction].
#[derive(Debug, Clone)]
pub struct VisualizeOptions {
    /// Drop noisy points before logging, see [Point3D::is_noisy].
    pub filter_output: bool,
    /// Resize images (and intrinsics, keypoints, depth maps) to `(width, height)`.
    pub resize: Option<(u32, u32)>,
    /// Show a progress bar.
    pub verbose: bool,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        VisualizeOptions {
            filter_output: true,
            resize: None,
            verbose: false,
        }
    }
}

pub(crate) fn progress_bar(length: u64, message: &'static str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(length);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {percent}% ({eta})")
    {
        pb.set_style(style.progress_chars("#-"));
    }
    pb.set_message(message);
    pb
}

fn color(rgb: [u8; 3]) -> rerun::Color {
    rerun::Color::from_rgb(rgb[0], rgb[1], rgb[2])
}

fn to_f32<const N: usize>(v: [f64; N]) -> [f32; N] {
    v.map(|x| x as f32)
}

/// Pixels of one frame, ready to be logged.
enum FrameImage {
    Encoded(rerun::EncodedImage),
    Decoded(rerun::Image),
}

fn load_image(path: &Path, resize: Option<(u32, u32)>) -> Result<FrameImage, Error> {
    match resize {
        None => Ok(FrameImage::Encoded(rerun::EncodedImage::from_file(path)?)),
        Some((width, height)) => {
            let rgb = image::open(path)?
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgb8();
            Ok(FrameImage::Decoded(rerun::Image::from_rgb24(
                rgb.into_raw(),
                [width, height],
            )))
        }
    }
}

fn load_depth(
    depths_root: Option<&Path>,
    image_name: &str,
    resolution: [u32; 2],
) -> Result<Option<DepthMap>, Error> {
    let path = match depths_root.and_then(|root| depth_map_path(root, image_name)) {
        Some(path) => path,
        None => return Ok(None),
    };
    let depth = read_depth_map(&path)?;
    Ok(Some(depth.resized(resolution[0], resolution[1])))
}

/// Log `reconstruction` to `rec`. Images missing from the images directory are skipped. Returns
/// the number of frames logged.
pub fn visualize_reconstruction(
    rec: &rerun::RecordingStream,
    reconstruction: &Reconstruction,
    options: &VisualizeOptions,
) -> Result<usize, Error> {
    let model = &reconstruction.model;
    let points3d: BTreeMap<u64, &Point3D> = model
        .points3d
        .iter()
        .filter(|(_, p)| !options.filter_output || !p.is_noisy())
        .map(|(id, p)| (*id, p))
        .collect();
    if options.filter_output {
        debug!(
            "kept {} of {} points after filtering",
            points3d.len(),
            model.num_points()
        );
    }

    rec.log_static(
        "description",
        &rerun::TextDocument::from_markdown(DESCRIPTION),
    )?;
    rec.log_static("/", &rerun::ViewCoordinates::RIGHT_HAND_Y_DOWN())?;
    rec.log_static(
        "plot/avg_reproj_err",
        &rerun::SeriesLine::new().with_color(color(ERROR_COLOR)),
    )?;
    // COLMAP cameras look down +z with y pointing down.
    rec.log_static("camera", &rerun::ViewCoordinates::RDF())?;

    for camera in model.cameras.values().filter(|c| c.is_distorted()) {
        warn!(
            "camera {} uses the distorted model {}, distortion is ignored",
            camera.id,
            camera.model.name()
        );
    }

    let images = model
        .images
        .values()
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect::<Vec<_>>();
    let pb = progress_bar(images.len() as u64, "Logging frames", options.verbose);
    let mut logged = 0;

    for (position, image) in images.into_iter().enumerate() {
        pb.inc(1);
        let image_file = reconstruction.images_root.join(&image.name);
        if !image_file.is_file() {
            warn!("skipping {}, file not found", image_file.display());
            continue;
        }
        let camera = model
            .cameras
            .get(&image.camera_id)
            .ok_or_else(|| Error::UnknownCamera(image.name.clone(), image.camera_id))?;

        let (camera, scale) = match options.resize {
            Some((width, height)) => camera.scaled(width, height),
            None => (camera.clone(), [1.0, 1.0]),
        };
        let resolution = [camera.width as u32, camera.height as u32];

        let (pixels, depth) = rayon::join(
            || load_image(&image_file, options.resize),
            || {
                load_depth(
                    reconstruction.depths_root.as_deref(),
                    &image.name,
                    resolution,
                )
            },
        );
        let (pixels, depth) = (pixels?, depth?);

        let visible = image
            .points2d
            .iter()
            .filter_map(|p| {
                p.point3d_id
                    .and_then(|id| points3d.get(&id))
                    .map(|p3d| (p, *p3d))
            })
            .collect::<Vec<_>>();

        rec.set_time_sequence("frame", image.frame_index().unwrap_or(position as i64));

        if !visible.is_empty() {
            let mean_error =
                visible.iter().map(|(_, p)| p.error).sum::<f64>() / visible.len() as f64;
            rec.log("plot/avg_reproj_err", &rerun::Scalar::new(mean_error))?;
        }
        rec.log(
            "points",
            &rerun::Points3D::new(visible.iter().map(|(_, p)| to_f32(p.xyz)))
                .with_colors(visible.iter().map(|(_, p)| color(p.rgb))),
        )?;

        // COLMAP stores camera-from-world poses.
        let q = image.rotation();
        rec.log(
            "camera",
            &rerun::Transform3D::from_translation_rotation(
                to_f32(image.tvec),
                rerun::Quaternion::from_xyzw(to_f32([q.v.x, q.v.y, q.v.z, q.s])),
            )
            .with_relation(rerun::components::TransformRelation::ChildFromParent),
        )?;

        rec.log(
            "camera/image",
            &rerun::Pinhole::from_focal_length_and_resolution(
                to_f32(camera.focal_length()),
                [resolution[0] as f32, resolution[1] as f32],
            )
            .with_principal_point(to_f32(camera.principal_point())),
        )?;

        match pixels {
            FrameImage::Encoded(encoded) => rec.log("camera/image", &encoded)?,
            FrameImage::Decoded(decoded) => rec.log("camera/image", &decoded)?,
        }

        rec.log(
            "camera/image/keypoints",
            &rerun::Points2D::new(visible.iter().map(|(p, _)| {
                [
                    (p.xy[0] * scale[0]) as f32,
                    (p.xy[1] * scale[1]) as f32,
                ]
            }))
            .with_colors([color(KEYPOINT_COLOR)]),
        )?;

        if let Some(depth) = depth {
            let depth_image = rerun::DepthImage::try_from(depth.to_array())
                .map_err(|e| Error::Visualization(e.to_string()))?
                .with_meter(1.0);
            rec.log("camera/image/depth", &depth_image)?;
        }

        logged += 1;
    }
    pb.finish_and_clear();

    info!("logged {} frames", logged);
    Ok(logged)
}
