use assert_cmd::prelude::*;
use colmap_rerun::colmap::{write_model, ModelFormat};
use colmap_rerun::*;
use predicates::prelude::*;
use std::path::*;
use std::process::Command;
use tempfile::tempdir;

// Two images of one pinhole camera looking at five points, each seen by both images. Point 5 is
// black and so counts as noise.
fn small_model() -> SparseModel {
    let mut model = SparseModel::default();
    model.cameras.insert(
        1,
        Camera {
            id: 1,
            model: CameraModel::Pinhole,
            width: 16,
            height: 12,
            params: vec![20.0, 20.0, 8.0, 6.0],
        },
    );
    for (id, name, x) in [(1, "frame_0001.png", 0.0), (2, "frame_0002.png", 1.0)] {
        model.images.insert(
            id,
            Image {
                id,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [x, 0.0, 0.0],
                camera_id: 1,
                name: name.to_string(),
                points2d: (1..=5)
                    .map(|p| Point2D {
                        xy: [p as f64, p as f64],
                        point3d_id: Some(p),
                    })
                    .collect(),
            },
        );
    }
    for p in 1..=5u64 {
        let rgb = if p == 5 { [0, 0, 0] } else { [255, 128, 0] };
        model.points3d.insert(
            p,
            Point3D {
                id: p,
                xyz: [p as f64, 0.0, 10.0],
                rgb,
                error: 0.25,
                track: (0..6)
                    .map(|i| TrackElement {
                        image_id: 1 + i % 2,
                        point2d_idx: (p - 1) as u32,
                    })
                    .collect(),
            },
        );
    }
    model
}

fn write_images(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    for name in ["frame_0001.png", "frame_0002.png"] {
        image::RgbImage::from_pixel(16, 12, image::Rgb([10, 200, 30])).save(dir.join(name))?;
    }
    Ok(())
}

#[test]
fn info_binary_model() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let sparse = dir.path().join("sparse");
    write_model(&small_model(), &sparse, ModelFormat::Binary)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("info").arg(&sparse);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "COLMAP model with 1 cameras, 2 images, 5 points",
        ))
        .stdout(predicate::str::contains("Mean reprojection error: 0.2500"))
        .stdout(predicate::str::contains("Noisy points: 1"));

    Ok(())
}

#[test]
fn info_mapper_layout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let sparse = dir.path().join("sparse");
    write_model(&small_model(), &sparse.join("0"), ModelFormat::Text)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("info").arg(&sparse);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("COLMAP model with 1 cameras"));

    Ok(())
}

#[test]
fn convert_to_text() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let sparse = dir.path().join("sparse");
    let text = dir.path().join("text");
    write_model(&small_model(), &sparse, ModelFormat::Binary)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("convert")
        .arg(&sparse)
        .arg(&text)
        .arg("--format")
        .arg("txt");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Wrote COLMAP model"));
    assert!(text.join("cameras.txt").is_file());
    assert!(text.join("images.txt").is_file());
    assert!(text.join("points3D.txt").is_file());

    let mut info = Command::cargo_bin("colmap-rerun")?;
    info.arg("info").arg(&text);
    info.assert()
        .success()
        .stdout(predicate::str::contains("2 images, 5 points"));

    Ok(())
}

#[test]
fn ply_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let sparse = dir.path().join("sparse");
    let ply = dir.path().join("model.ply");
    write_model(&small_model(), &sparse, ModelFormat::Binary)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("ply").arg(&sparse).arg(&ply);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("4 points"));
    assert!(std::fs::read(&ply)?.starts_with(b"ply"));

    Ok(())
}

#[test]
fn view_missing_sparse_model() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let images = dir.path().join("images");
    write_images(&images)?;
    let rrd = dir.path().join("out.rrd");

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("view")
        .arg(dir.path().join("missing"))
        .arg(&images)
        .arg("--save")
        .arg(&rrd);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Sparse model path"))
        .stderr(predicate::str::contains("does not exist."))
        .stdout(predicate::str::contains("Loading").not());
    assert!(!rrd.exists());

    Ok(())
}

#[test]
fn view_save_recording() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let sparse = dir.path().join("sparse");
    let images = dir.path().join("images");
    let rrd = dir.path().join("out.rrd");
    write_model(&small_model(), &sparse, ModelFormat::Binary)?;
    write_images(&images)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("view")
        .arg(&sparse)
        .arg(&images)
        .arg("--resize")
        .arg("8x6")
        .arg("--save")
        .arg(&rrd)
        .arg("--quiet");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Loading sparse model from:"))
        .stdout(predicate::str::contains("Visualization complete!"));
    assert!(std::fs::metadata(&rrd)?.len() > 0);

    Ok(())
}

#[test]
fn view_dense_workspace() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let dense = dir.path().join("dense");
    let rrd = dir.path().join("dense.rrd");
    write_model(&small_model(), &dense.join("sparse"), ModelFormat::Binary)?;
    write_images(&dense.join("images"))?;

    let depth_maps = dense.join("stereo/depth_maps");
    std::fs::create_dir_all(&depth_maps)?;
    let mut depth = b"16&12&1&".to_vec();
    for i in 0..16 * 12 {
        depth.extend_from_slice(&(1.0 + i as f32 / 100.0).to_le_bytes());
    }
    std::fs::write(depth_maps.join("frame_0001.png.geometric.bin"), depth)?;

    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("view")
        .arg("--dense")
        .arg(&dense)
        .arg("--save")
        .arg(&rrd)
        .arg("--quiet");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Loading depth maps from:"))
        .stdout(predicate::str::contains("Visualization complete!"));

    Ok(())
}

#[test]
fn view_bad_resize() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("colmap-rerun")?;
    cmd.arg("view").arg("a").arg("b").arg("--resize").arg("640");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("WIDTHxHEIGHT"));

    Ok(())
}

#[test]
fn demo_reports_errors() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("demo")?;
    cmd.arg("--dense")
        .arg(dir.path().join("nowhere"))
        .arg("--save")
        .arg(dir.path().join("demo.rrd"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "Starting COLMAP dense reconstruction visualization...",
        ))
        .stdout(predicate::str::contains("Error: Sparse model path"));

    Ok(())
}
