//! In-memory representation of a COLMAP reconstruction.
extern crate cgmath;
extern crate thiserror;

use cgmath::prelude::*;
use cgmath::{Point3, Quaternion, Vector3};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Problems with the paths handed to a visualization session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Sparse model path {} does not exist.", .0.display())]
    MissingSparseModel(PathBuf),
    #[error("Images path {} does not exist.", .0.display())]
    MissingImages(PathBuf),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("unsupported camera model {0}")]
    UnsupportedCameraModel(i64),
    #[error("no COLMAP model found in {}", .0.display())]
    MissingModel(PathBuf),
    #[error("image {0} references unknown camera {1}")]
    UnknownCamera(String, u32),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("recording error: {0}")]
    Recording(#[from] rerun::RecordingStreamError),
    #[error("visualization error: {0}")]
    Visualization(String),
}

/// Camera models understood by COLMAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModel {
    SimplePinhole,
    Pinhole,
    SimpleRadial,
    Radial,
    OpenCV,
    OpenCVFisheye,
    FullOpenCV,
    FOV,
    SimpleRadialFisheye,
    RadialFisheye,
    ThinPrismFisheye,
}

const CAMERA_MODELS: [CameraModel; 11] = [
    CameraModel::SimplePinhole,
    CameraModel::Pinhole,
    CameraModel::SimpleRadial,
    CameraModel::Radial,
    CameraModel::OpenCV,
    CameraModel::OpenCVFisheye,
    CameraModel::FullOpenCV,
    CameraModel::FOV,
    CameraModel::SimpleRadialFisheye,
    CameraModel::RadialFisheye,
    CameraModel::ThinPrismFisheye,
];

impl CameraModel {
    /// Numeric id used in `cameras.bin`.
    pub fn id(self) -> i32 {
        match self {
            CameraModel::SimplePinhole => 0,
            CameraModel::Pinhole => 1,
            CameraModel::SimpleRadial => 2,
            CameraModel::Radial => 3,
            CameraModel::OpenCV => 4,
            CameraModel::OpenCVFisheye => 5,
            CameraModel::FullOpenCV => 6,
            CameraModel::FOV => 7,
            CameraModel::SimpleRadialFisheye => 8,
            CameraModel::RadialFisheye => 9,
            CameraModel::ThinPrismFisheye => 10,
        }
    }

    /// Name used in `cameras.txt`.
    pub fn name(self) -> &'static str {
        match self {
            CameraModel::SimplePinhole => "SIMPLE_PINHOLE",
            CameraModel::Pinhole => "PINHOLE",
            CameraModel::SimpleRadial => "SIMPLE_RADIAL",
            CameraModel::Radial => "RADIAL",
            CameraModel::OpenCV => "OPENCV",
            CameraModel::OpenCVFisheye => "OPENCV_FISHEYE",
            CameraModel::FullOpenCV => "FULL_OPENCV",
            CameraModel::FOV => "FOV",
            CameraModel::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            CameraModel::RadialFisheye => "RADIAL_FISHEYE",
            CameraModel::ThinPrismFisheye => "THIN_PRISM_FISHEYE",
        }
    }

    pub fn num_params(self) -> usize {
        match self {
            CameraModel::SimplePinhole => 3,
            CameraModel::Pinhole => 4,
            CameraModel::SimpleRadial => 4,
            CameraModel::Radial => 5,
            CameraModel::OpenCV => 8,
            CameraModel::OpenCVFisheye => 8,
            CameraModel::FullOpenCV => 12,
            CameraModel::FOV => 5,
            CameraModel::SimpleRadialFisheye => 4,
            CameraModel::RadialFisheye => 5,
            CameraModel::ThinPrismFisheye => 12,
        }
    }

    /// Models parameterized by a single focal length `f, cx, cy, ...`.
    fn single_focal(self) -> bool {
        match self {
            CameraModel::SimplePinhole
            | CameraModel::SimpleRadial
            | CameraModel::Radial
            | CameraModel::SimpleRadialFisheye
            | CameraModel::RadialFisheye => true,
            _ => false,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, Error> {
        CAMERA_MODELS
            .iter()
            .find(|m| i64::from(m.id()) == id)
            .copied()
            .ok_or(Error::UnsupportedCameraModel(id))
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        CAMERA_MODELS
            .iter()
            .find(|m| m.name() == name)
            .copied()
            .ok_or_else(|| Error::ParseError(format!("unknown camera model {}", name)))
    }
}

/// Intrinsics of one physical camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: u32,
    pub model: CameraModel,
    pub width: u64,
    pub height: u64,
    pub params: Vec<f64>,
}

impl Camera {
    /// Focal length in pixels along x and y.
    pub fn focal_length(&self) -> [f64; 2] {
        if self.model.single_focal() {
            [self.params[0], self.params[0]]
        } else {
            [self.params[0], self.params[1]]
        }
    }

    pub fn principal_point(&self) -> [f64; 2] {
        if self.model.single_focal() {
            [self.params[1], self.params[2]]
        } else {
            [self.params[2], self.params[3]]
        }
    }

    /// Whether the model carries parameters beyond a plain pinhole.
    pub fn is_distorted(&self) -> bool {
        let pinhole_params = if self.model.single_focal() { 3 } else { 4 };
        self.params[pinhole_params..].iter().any(|&k| k != 0.0)
    }

    /// Camera with its image resized to `width` x `height`. Focal length and principal point are
    /// scaled along, distortion is left untouched. Also returns the `(sx, sy)` scale factors.
    pub fn scaled(&self, width: u32, height: u32) -> (Camera, [f64; 2]) {
        let sx = f64::from(width) / self.width as f64;
        let sy = f64::from(height) / self.height as f64;
        let mut params = self.params.clone();
        if self.model.single_focal() {
            // one focal length for both axes, average the scales
            params[0] *= (sx + sy) / 2.0;
            params[1] *= sx;
            params[2] *= sy;
        } else {
            params[0] *= sx;
            params[1] *= sy;
            params[2] *= sx;
            params[3] *= sy;
        }
        (
            Camera {
                id: self.id,
                model: self.model,
                width: u64::from(width),
                height: u64::from(height),
                params,
            },
            [sx, sy],
        )
    }
}

/// Keypoint of a registered image. `point3d_id` is `None` when the keypoint was not triangulated.
#[derive(Debug, Clone, PartialEq)]
pub struct Point2D {
    pub xy: [f64; 2],
    pub point3d_id: Option<u64>,
}

/// A registered image with its camera-from-world pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: u32,
    /// Rotation quaternion as `w, x, y, z`.
    pub qvec: [f64; 4],
    pub tvec: [f64; 3],
    pub camera_id: u32,
    pub name: String,
    pub points2d: Vec<Point2D>,
}

impl Image {
    /// Rotation `R` of the camera-from-world transform `Rx + t`.
    pub fn rotation(&self) -> Quaternion<f64> {
        Quaternion::new(self.qvec[0], self.qvec[1], self.qvec[2], self.qvec[3]).normalize()
    }

    /// Center of the camera in world coordinates, `-R^T t`.
    pub fn center(&self) -> Point3<f64> {
        let t = Vector3::new(self.tvec[0], self.tvec[1], self.tvec[2]);
        Point3::from_vec(-self.rotation().conjugate().rotate_vector(t))
    }

    /// Frame number embedded in the image name, e.g. `frame_00042.jpg` -> 42.
    pub fn frame_index(&self) -> Option<i64> {
        let stem = Path::new(&self.name).file_stem()?.to_str()?;
        let digits = stem
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackElement {
    pub image_id: u32,
    pub point2d_idx: u32,
}

/// A triangulated point and the images observing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Point3D {
    pub id: u64,
    pub xyz: [f64; 3],
    pub rgb: [u8; 3],
    /// Mean reprojection error in pixels.
    pub error: f64,
    pub track: Vec<TrackElement>,
}

impl Point3D {
    /// Black points or points seen by 4 images or fewer are most likely noise.
    pub fn is_noisy(&self) -> bool {
        self.rgb.iter().all(|&c| c == 0) || self.track.len() <= 4
    }
}

/// Cameras, registered images and 3D points of a COLMAP model, keyed by their COLMAP ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseModel {
    pub cameras: BTreeMap<u32, Camera>,
    pub images: BTreeMap<u32, Image>,
    pub points3d: BTreeMap<u64, Point3D>,
}

impl SparseModel {
    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_points(&self) -> usize {
        self.points3d.len()
    }

    /// Number of image-point observations.
    pub fn num_observations(&self) -> usize {
        self.points3d.values().map(|p| p.track.len()).sum()
    }

    /// Mean of the per-point reprojection errors. Zero for a model without points.
    pub fn mean_reprojection_error(&self) -> f64 {
        if self.points3d.is_empty() {
            return 0.0;
        }
        self.points3d.values().map(|p| p.error).sum::<f64>() / self.points3d.len() as f64
    }

    /// Smallest and largest coordinates of camera centers and points.
    pub fn extent(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut coords = self
            .images
            .values()
            .map(|image| image.center())
            .chain(
                self.points3d
                    .values()
                    .map(|p| Point3::new(p.xyz[0], p.xyz[1], p.xyz[2])),
            );
        let first = coords.next()?;
        Some(coords.fold((first, first), |(min, max), p| {
            (
                Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        }))
    }

    /// Drop noisy points, see [Point3D::is_noisy].
    pub fn filter_noisy(mut self) -> Self {
        self.points3d.retain(|_, p| !p.is_noisy());
        self
    }
}

impl std::fmt::Display for SparseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "COLMAP model with {} cameras, {} images, {} points, and {} observations",
            self.num_cameras(),
            self.num_images(),
            self.num_points(),
            self.num_observations()
        )
    }
}

/// A loaded model together with the directories holding its images and (optional) depth maps.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub model: SparseModel,
    pub images_root: PathBuf,
    pub depths_root: Option<PathBuf>,
}
