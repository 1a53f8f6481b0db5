//! Reading and writing COLMAP sparse models.
//!
//! A model is a directory holding `cameras`, `images` and `points3D` files, either all in the
//! binary format (`.bin`) or all in the text format (`.txt`). See
//! <https://colmap.github.io/format.html>.
//!
//! ```no_run
//! use colmap_rerun::colmap::*;
//! use std::path::Path;
//!
//! let model = read_model(Path::new("dataset/sparse")).unwrap();
//! println!("{}", model);
//! write_model(&model, Path::new("dataset/sparse_txt"), ModelFormat::Text).unwrap();
//! ```
extern crate byteorder;
extern crate itertools;
extern crate nom;
extern crate rayon;

use byteorder::*;
use itertools::Itertools;
use nom::bytes::complete::take_till1;
use nom::character::complete::{char, digit1, not_line_ending, space0};
use nom::combinator::{eof, map_res, opt, recognize};
use nom::error::VerboseError;
use nom::multi::many0;
use nom::number::complete::double;
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;
use tracing::{debug, info};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::model::*;

/// On-disk encoding of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Binary,
    Text,
}

impl ModelFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Binary => "bin",
            ModelFormat::Text => "txt",
        }
    }

    fn files(self, dir: &Path) -> [PathBuf; 3] {
        let ext = self.extension();
        [
            dir.join(format!("cameras.{}", ext)),
            dir.join(format!("images.{}", ext)),
            dir.join(format!("points3D.{}", ext)),
        ]
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bin" | "binary" => Ok(ModelFormat::Binary),
            "txt" | "text" => Ok(ModelFormat::Text),
            other => Err(format!("unknown model format {}, expected bin or txt", other)),
        }
    }
}

/// Format of the model stored directly in `dir`, if all three model files are present.
/// Binary wins when both formats are present.
pub fn detect_format(dir: &Path) -> Option<ModelFormat> {
    [ModelFormat::Binary, ModelFormat::Text]
        .iter()
        .copied()
        .find(|format| format.files(dir).iter().all(|f| f.is_file()))
}

/// Read a model from `dir`. Falls back to `dir/0`, where COLMAP's mapper puts its first model.
pub fn read_model(dir: &Path) -> Result<SparseModel, Error> {
    if let Some(format) = detect_format(dir) {
        return read_model_format(dir, format);
    }
    let first = dir.join("0");
    match detect_format(&first) {
        Some(format) => read_model_format(&first, format),
        None => Err(Error::MissingModel(dir.to_path_buf())),
    }
}

fn read_model_format(dir: &Path, format: ModelFormat) -> Result<SparseModel, Error> {
    info!("reading {:?} model from {}", format, dir.display());
    let [cameras_path, images_path, points_path] = format.files(dir);
    let (cameras, (images, points3d)) = match format {
        ModelFormat::Binary => rayon::join(
            || read_cameras_binary(&cameras_path),
            || {
                rayon::join(
                    || read_images_binary(&images_path),
                    || read_points3d_binary(&points_path),
                )
            },
        ),
        ModelFormat::Text => rayon::join(
            || read_cameras_text(&cameras_path),
            || {
                rayon::join(
                    || read_images_text(&images_path),
                    || read_points3d_text(&points_path),
                )
            },
        ),
    };
    let model = SparseModel {
        cameras: cameras?,
        images: images?,
        points3d: points3d?,
    };
    debug!("{}", model);
    Ok(model)
}

/// Load the sparse model at `model_path` and attach the image and depth map directories.
pub fn load_sparse_model(
    model_path: &Path,
    images_root: &Path,
    depths_root: Option<&Path>,
) -> Result<Reconstruction, Error> {
    let model = read_model(model_path)?;
    info!(
        "loaded {} cameras, {} images, {} points",
        model.num_cameras(),
        model.num_images(),
        model.num_points()
    );
    Ok(Reconstruction {
        model,
        images_root: images_root.to_path_buf(),
        depths_root: depths_root.map(Path::to_path_buf),
    })
}

/// Write `model` into `dir` in the requested format. `dir` is created if needed.
pub fn write_model(model: &SparseModel, dir: &Path, format: ModelFormat) -> Result<(), Error> {
    std::fs::create_dir_all(dir)?;
    let [cameras_path, images_path, points_path] = format.files(dir);
    match format {
        ModelFormat::Binary => {
            write_cameras_binary(&model.cameras, &cameras_path)?;
            write_images_binary(&model.images, &images_path)?;
            write_points3d_binary(&model.points3d, &points_path)?;
        }
        ModelFormat::Text => {
            write_cameras_text(&model.cameras, &cameras_path)?;
            write_images_text(&model.images, &images_path)?;
            write_points3d_text(&model.points3d, &points_path)?;
        }
    }
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    debug!("opening {}", path.display());
    Ok(BufReader::new(File::open(path)?))
}

// Counts come from the file, don't trust them for preallocation.
fn capacity(n: u64) -> usize {
    n.min(1 << 16) as usize
}

fn read_point3d_id<R: Read>(reader: &mut R) -> Result<Option<u64>, Error> {
    let id = reader.read_i64::<LittleEndian>()?;
    Ok(if id < 0 { None } else { Some(id as u64) })
}

/// Read a NUL terminated string.
fn read_name<R: BufRead>(reader: &mut R) -> Result<String, Error> {
    let mut bytes = Vec::new();
    reader.read_until(0, &mut bytes)?;
    if bytes.pop() != Some(0) {
        return Err(Error::ParseError(
            "image name is not NUL terminated".to_string(),
        ));
    }
    String::from_utf8(bytes).map_err(|e| Error::ParseError(format!("image name: {}", e)))
}

/// Parse `cameras.bin`.
pub fn read_cameras_binary(path: &Path) -> Result<BTreeMap<u32, Camera>, Error> {
    let mut reader = open(path)?;
    let num_cameras = reader.read_u64::<LittleEndian>()?;
    let mut cameras = BTreeMap::new();
    for _ in 0..num_cameras {
        let id = reader.read_u32::<LittleEndian>()?;
        let model = CameraModel::from_id(i64::from(reader.read_i32::<LittleEndian>()?))?;
        let width = reader.read_u64::<LittleEndian>()?;
        let height = reader.read_u64::<LittleEndian>()?;
        let mut params = vec![0.0; model.num_params()];
        reader.read_f64_into::<LittleEndian>(&mut params)?;
        cameras.insert(
            id,
            Camera {
                id,
                model,
                width,
                height,
                params,
            },
        );
    }
    Ok(cameras)
}

/// Parse `images.bin`.
pub fn read_images_binary(path: &Path) -> Result<BTreeMap<u32, Image>, Error> {
    let mut reader = open(path)?;
    let num_images = reader.read_u64::<LittleEndian>()?;
    let mut images = BTreeMap::new();
    for _ in 0..num_images {
        let id = reader.read_u32::<LittleEndian>()?;
        let mut qvec = [0.0; 4];
        reader.read_f64_into::<LittleEndian>(&mut qvec)?;
        let mut tvec = [0.0; 3];
        reader.read_f64_into::<LittleEndian>(&mut tvec)?;
        let camera_id = reader.read_u32::<LittleEndian>()?;
        let name = read_name(&mut reader)?;
        let num_points2d = reader.read_u64::<LittleEndian>()?;
        let mut points2d = Vec::with_capacity(capacity(num_points2d));
        for _ in 0..num_points2d {
            let x = reader.read_f64::<LittleEndian>()?;
            let y = reader.read_f64::<LittleEndian>()?;
            points2d.push(Point2D {
                xy: [x, y],
                point3d_id: read_point3d_id(&mut reader)?,
            });
        }
        images.insert(
            id,
            Image {
                id,
                qvec,
                tvec,
                camera_id,
                name,
                points2d,
            },
        );
    }
    Ok(images)
}

/// Parse `points3D.bin`.
pub fn read_points3d_binary(path: &Path) -> Result<BTreeMap<u64, Point3D>, Error> {
    let mut reader = open(path)?;
    let num_points = reader.read_u64::<LittleEndian>()?;
    let mut points = BTreeMap::new();
    for _ in 0..num_points {
        let id = reader.read_u64::<LittleEndian>()?;
        let mut xyz = [0.0; 3];
        reader.read_f64_into::<LittleEndian>(&mut xyz)?;
        let mut rgb = [0u8; 3];
        reader.read_exact(&mut rgb)?;
        let error = reader.read_f64::<LittleEndian>()?;
        let track_length = reader.read_u64::<LittleEndian>()?;
        let mut track = Vec::with_capacity(capacity(track_length));
        for _ in 0..track_length {
            let image_id = reader.read_u32::<LittleEndian>()?;
            let point2d_idx = reader.read_u32::<LittleEndian>()?;
            track.push(TrackElement {
                image_id,
                point2d_idx,
            });
        }
        points.insert(
            id,
            Point3D {
                id,
                xyz,
                rgb,
                error,
                track,
            },
        );
    }
    Ok(points)
}

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn unsigned<T: FromStr>(input: &str) -> ParseResult<'_, T> {
    map_res(preceded(space0, digit1), T::from_str)(input)
}

fn signed(input: &str) -> ParseResult<'_, i64> {
    map_res(
        preceded(space0, recognize(pair(opt(char('-')), digit1))),
        i64::from_str,
    )(input)
}

fn float(input: &str) -> ParseResult<'_, f64> {
    preceded(space0, double)(input)
}

fn word(input: &str) -> ParseResult<'_, &str> {
    preceded(space0, take_till1(|c: char| c.is_whitespace()))(input)
}

fn line_end(input: &str) -> ParseResult<'_, ()> {
    let (input, _) = terminated(space0, eof)(input)?;
    Ok((input, ()))
}

fn parse_camera_line(line: &str) -> ParseResult<'_, (u32, &str, u64, u64, Vec<f64>)> {
    terminated(
        tuple((unsigned, word, unsigned, unsigned, many0(float))),
        line_end,
    )(line)
}

type ImageHeader<'a> = (u32, [f64; 4], [f64; 3], u32, &'a str);

fn parse_image_line(line: &str) -> ParseResult<'_, ImageHeader<'_>> {
    let (input, id) = unsigned(line)?;
    let (input, (qw, qx, qy, qz)) = tuple((float, float, float, float))(input)?;
    let (input, (tx, ty, tz)) = tuple((float, float, float))(input)?;
    let (input, camera_id) = unsigned(input)?;
    let (input, name) = preceded(space0, not_line_ending)(input)?;
    Ok((
        input,
        (id, [qw, qx, qy, qz], [tx, ty, tz], camera_id, name.trim_end()),
    ))
}

fn parse_points2d_line(line: &str) -> ParseResult<'_, Vec<Point2D>> {
    let point = nom::combinator::map(tuple((float, float, signed)), |(x, y, id)| Point2D {
        xy: [x, y],
        point3d_id: if id < 0 { None } else { Some(id as u64) },
    });
    terminated(many0(point), line_end)(line)
}

fn parse_point3d_line(line: &str) -> ParseResult<'_, Point3D> {
    let (input, id) = unsigned(line)?;
    let (input, (x, y, z)) = tuple((float, float, float))(input)?;
    let (input, (r, g, b)) = tuple((unsigned, unsigned, unsigned))(input)?;
    let (input, error) = float(input)?;
    let track_element = nom::combinator::map(
        tuple((unsigned, unsigned)),
        |(image_id, point2d_idx)| TrackElement {
            image_id,
            point2d_idx,
        },
    );
    let (input, track) = terminated(many0(track_element), line_end)(input)?;
    Ok((
        input,
        Point3D {
            id,
            xyz: [x, y, z],
            rgb: [r, g, b],
            error,
            track,
        },
    ))
}

/// Run `parser` on one line, converting a failure into an error pointing at `path:line`.
fn parse_line<'a, T>(
    parser: impl FnOnce(&'a str) -> ParseResult<'a, T>,
    line: &'a str,
    path: &Path,
    line_number: usize,
) -> Result<T, Error> {
    parser(line).map(|x| x.1).map_err(|e| {
        let message = match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => nom::error::convert_error(line, e),
            nom::Err::Incomplete(x) => format!("{:?}", x),
        };
        Error::ParseError(format!(
            "{}:{}: {}",
            path.display(),
            line_number + 1,
            message
        ))
    })
}

fn is_data_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

fn read_to_string(path: &Path) -> Result<String, Error> {
    let mut contents = String::new();
    open(path)?.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse `cameras.txt` contents. `path` is only used for error messages.
pub fn parse_cameras_text(contents: &str, path: &Path) -> Result<BTreeMap<u32, Camera>, Error> {
    let mut cameras = BTreeMap::new();
    for (n, line) in contents.lines().enumerate().filter(|(_, l)| is_data_line(l)) {
        let (id, model, width, height, params) = parse_line(parse_camera_line, line, path, n)?;
        let model = CameraModel::from_name(model)?;
        if params.len() != model.num_params() {
            return Err(Error::ParseError(format!(
                "{}:{}: {} expects {} parameters, got {}",
                path.display(),
                n + 1,
                model.name(),
                model.num_params(),
                params.len()
            )));
        }
        cameras.insert(
            id,
            Camera {
                id,
                model,
                width,
                height,
                params,
            },
        );
    }
    Ok(cameras)
}

/// Parse `images.txt` contents. Each image takes two lines, the second one lists its keypoints
/// and may be empty.
pub fn parse_images_text(contents: &str, path: &Path) -> Result<BTreeMap<u32, Image>, Error> {
    let mut images = BTreeMap::new();
    let mut lines = contents.lines().enumerate();
    while let Some((n, line)) = lines.next() {
        if !is_data_line(line) {
            continue;
        }
        let (id, qvec, tvec, camera_id, name) = parse_line(parse_image_line, line, path, n)?;
        let points2d = match lines.next() {
            Some((n, points_line)) => parse_line(parse_points2d_line, points_line, path, n)?,
            None => Vec::new(),
        };
        images.insert(
            id,
            Image {
                id,
                qvec,
                tvec,
                camera_id,
                name: name.to_string(),
                points2d,
            },
        );
    }
    Ok(images)
}

/// Parse `points3D.txt` contents.
pub fn parse_points3d_text(contents: &str, path: &Path) -> Result<BTreeMap<u64, Point3D>, Error> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, l)| is_data_line(l))
        .map(|(n, line)| {
            let point = parse_line(parse_point3d_line, line, path, n)?;
            Ok((point.id, point))
        })
        .collect()
}

pub fn read_cameras_text(path: &Path) -> Result<BTreeMap<u32, Camera>, Error> {
    parse_cameras_text(&read_to_string(path)?, path)
}

pub fn read_images_text(path: &Path) -> Result<BTreeMap<u32, Image>, Error> {
    parse_images_text(&read_to_string(path)?, path)
}

pub fn read_points3d_text(path: &Path) -> Result<BTreeMap<u64, Point3D>, Error> {
    parse_points3d_text(&read_to_string(path)?, path)
}

fn create(path: &Path) -> Result<BufWriter<File>, std::io::Error> {
    debug!("writing {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}

fn point3d_id_value(id: Option<u64>) -> i64 {
    id.map(|x| x as i64).unwrap_or(-1)
}

pub fn write_cameras_binary(
    cameras: &BTreeMap<u32, Camera>,
    path: &Path,
) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    file.write_u64::<LittleEndian>(cameras.len() as u64)?;
    for camera in cameras.values() {
        file.write_u32::<LittleEndian>(camera.id)?;
        file.write_i32::<LittleEndian>(camera.model.id())?;
        file.write_u64::<LittleEndian>(camera.width)?;
        file.write_u64::<LittleEndian>(camera.height)?;
        for p in &camera.params {
            file.write_f64::<LittleEndian>(*p)?;
        }
    }
    file.flush()
}

pub fn write_images_binary(
    images: &BTreeMap<u32, Image>,
    path: &Path,
) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    file.write_u64::<LittleEndian>(images.len() as u64)?;
    for image in images.values() {
        file.write_u32::<LittleEndian>(image.id)?;
        for q in &image.qvec {
            file.write_f64::<LittleEndian>(*q)?;
        }
        for t in &image.tvec {
            file.write_f64::<LittleEndian>(*t)?;
        }
        file.write_u32::<LittleEndian>(image.camera_id)?;
        file.write_all(image.name.as_bytes())?;
        file.write_u8(0)?;
        file.write_u64::<LittleEndian>(image.points2d.len() as u64)?;
        for p in &image.points2d {
            file.write_f64::<LittleEndian>(p.xy[0])?;
            file.write_f64::<LittleEndian>(p.xy[1])?;
            file.write_i64::<LittleEndian>(point3d_id_value(p.point3d_id))?;
        }
    }
    file.flush()
}

pub fn write_points3d_binary(
    points: &BTreeMap<u64, Point3D>,
    path: &Path,
) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    file.write_u64::<LittleEndian>(points.len() as u64)?;
    for point in points.values() {
        file.write_u64::<LittleEndian>(point.id)?;
        for x in &point.xyz {
            file.write_f64::<LittleEndian>(*x)?;
        }
        file.write_all(&point.rgb)?;
        file.write_f64::<LittleEndian>(point.error)?;
        file.write_u64::<LittleEndian>(point.track.len() as u64)?;
        for t in &point.track {
            file.write_u32::<LittleEndian>(t.image_id)?;
            file.write_u32::<LittleEndian>(t.point2d_idx)?;
        }
    }
    file.flush()
}

pub fn write_cameras_text(
    cameras: &BTreeMap<u32, Camera>,
    path: &Path,
) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    writeln!(&mut file, "# Camera list with one line of data per camera:")?;
    writeln!(&mut file, "#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]")?;
    writeln!(&mut file, "# Number of cameras: {}", cameras.len())?;
    for camera in cameras.values() {
        writeln!(
            &mut file,
            "{} {} {} {} {}",
            camera.id,
            camera.model.name(),
            camera.width,
            camera.height,
            camera.params.iter().join(" ")
        )?;
    }
    file.flush()
}

pub fn write_images_text(images: &BTreeMap<u32, Image>, path: &Path) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    let mean_observations = if images.is_empty() {
        0.0
    } else {
        images.values().map(|i| i.points2d.len()).sum::<usize>() as f64 / images.len() as f64
    };
    writeln!(&mut file, "# Image list with two lines of data per image:")?;
    writeln!(
        &mut file,
        "#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME"
    )?;
    writeln!(&mut file, "#   POINTS2D[] as (X, Y, POINT3D_ID)")?;
    writeln!(
        &mut file,
        "# Number of images: {}, mean observations per image: {}",
        images.len(),
        mean_observations
    )?;
    for image in images.values() {
        writeln!(
            &mut file,
            "{} {} {} {} {}",
            image.id,
            image.qvec.iter().join(" "),
            image.tvec.iter().join(" "),
            image.camera_id,
            image.name
        )?;
        writeln!(
            &mut file,
            "{}",
            image
                .points2d
                .iter()
                .map(|p| format!("{} {} {}", p.xy[0], p.xy[1], point3d_id_value(p.point3d_id)))
                .join(" ")
        )?;
    }
    file.flush()
}

pub fn write_points3d_text(
    points: &BTreeMap<u64, Point3D>,
    path: &Path,
) -> Result<(), std::io::Error> {
    let mut file = create(path)?;
    let mean_track_length = if points.is_empty() {
        0.0
    } else {
        points.values().map(|p| p.track.len()).sum::<usize>() as f64 / points.len() as f64
    };
    writeln!(&mut file, "# 3D point list with one line of data per point:")?;
    writeln!(
        &mut file,
        "#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)"
    )?;
    writeln!(
        &mut file,
        "# Number of points: {}, mean track length: {}",
        points.len(),
        mean_track_length
    )?;
    for point in points.values() {
        let track = point
            .track
            .iter()
            .map(|t| format!("{} {}", t.image_id, t.point2d_idx))
            .join(" ");
        writeln!(
            &mut file,
            "{} {} {} {} {}",
            point.id,
            point.xyz.iter().join(" "),
            point.rgb.iter().join(" "),
            point.error,
            track
        )?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERAS_TXT: &str = "\
# Camera list with one line of data per camera:
#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
# Number of cameras: 2
1 PINHOLE 640 480 500 510 320 240
2 SIMPLE_RADIAL 1024 768 800.5 512 384 -0.02
";

    const IMAGES_TXT: &str = "\
# Image list with two lines of data per image:
1 1 0 0 0 0.1 -0.2 3 1 frame 001.jpg
10.5 20.25 7 30 40 -1
2 0.7071 0 0.7071 0 0 0 0 2 frame_002.jpg

";

    const POINTS_TXT: &str = "\
# 3D point list with one line of data per point:
7 1.5 -2 3e-1 255 128 0 0.75 1 0 2 1
8 0 0 0 1 2 3 1.25
";

    #[test]
    fn parse_cameras() {
        let cameras = parse_cameras_text(CAMERAS_TXT, Path::new("cameras.txt")).unwrap();
        assert_eq!(cameras.len(), 2);
        let c = &cameras[&1];
        assert_eq!(c.model, CameraModel::Pinhole);
        assert_eq!((c.width, c.height), (640, 480));
        assert_eq!(c.params, vec![500.0, 510.0, 320.0, 240.0]);
        assert_eq!(cameras[&2].params[3], -0.02);
    }

    #[test]
    fn parse_cameras_wrong_param_count() {
        let r = parse_cameras_text("1 PINHOLE 640 480 500 510 320\n", Path::new("cameras.txt"));
        match r {
            Err(Error::ParseError(msg)) => assert!(msg.contains("PINHOLE expects 4")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parse_images() {
        let images = parse_images_text(IMAGES_TXT, Path::new("images.txt")).unwrap();
        assert_eq!(images.len(), 2);
        let first = &images[&1];
        assert_eq!(first.name, "frame 001.jpg");
        assert_eq!(first.tvec, [0.1, -0.2, 3.0]);
        assert_eq!(
            first.points2d,
            vec![
                Point2D {
                    xy: [10.5, 20.25],
                    point3d_id: Some(7)
                },
                Point2D {
                    xy: [30.0, 40.0],
                    point3d_id: None
                },
            ]
        );
        assert_eq!(images[&2].camera_id, 2);
        assert!(images[&2].points2d.is_empty());
    }

    #[test]
    fn parse_points() {
        let points = parse_points3d_text(POINTS_TXT, Path::new("points3D.txt")).unwrap();
        assert_eq!(points[&7].rgb, [255, 128, 0]);
        assert_eq!(points[&7].xyz, [1.5, -2.0, 0.3]);
        assert_eq!(
            points[&7].track,
            vec![
                TrackElement {
                    image_id: 1,
                    point2d_idx: 0
                },
                TrackElement {
                    image_id: 2,
                    point2d_idx: 1
                }
            ]
        );
        assert!(points[&8].track.is_empty());
    }

    #[test]
    fn parse_error_reports_line() {
        let r = parse_points3d_text("# header\n7 1.5 oops\n", Path::new("points3D.txt"));
        match r {
            Err(Error::ParseError(msg)) => assert!(msg.starts_with("points3D.txt:2:")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn binary_and_text_agree() {
        let dir = tempfile::tempdir().unwrap();
        let model = SparseModel {
            cameras: parse_cameras_text(CAMERAS_TXT, Path::new("c")).unwrap(),
            images: parse_images_text(IMAGES_TXT, Path::new("i")).unwrap(),
            points3d: parse_points3d_text(POINTS_TXT, Path::new("p")).unwrap(),
        };

        let bin_dir = dir.path().join("bin");
        write_model(&model, &bin_dir, ModelFormat::Binary).unwrap();
        assert_eq!(detect_format(&bin_dir), Some(ModelFormat::Binary));
        assert_eq!(read_model(&bin_dir).unwrap(), model);

        let txt_dir = dir.path().join("txt");
        write_model(&model, &txt_dir, ModelFormat::Text).unwrap();
        assert_eq!(detect_format(&txt_dir), Some(ModelFormat::Text));
        assert_eq!(read_model(&txt_dir).unwrap(), model);
    }

    #[test]
    fn read_mapper_layout() {
        let dir = tempfile::tempdir().unwrap();
        let model = SparseModel {
            cameras: parse_cameras_text(CAMERAS_TXT, Path::new("c")).unwrap(),
            ..Default::default()
        };
        write_model(&model, &dir.path().join("0"), ModelFormat::Binary).unwrap();
        assert_eq!(read_model(dir.path()).unwrap().num_cameras(), 2);
    }

    #[test]
    fn missing_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_model(dir.path()),
            Err(Error::MissingModel(_))
        ));
    }

    #[test]
    fn truncated_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.bin");
        std::fs::write(&path, [2u8, 0, 0, 0, 0, 0, 0, 0, 1, 0]).unwrap();
        assert!(matches!(
            read_cameras_binary(&path),
            Err(Error::IOError(_))
        ));
    }
}
