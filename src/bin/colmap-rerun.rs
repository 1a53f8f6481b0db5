extern crate colmap_rerun;
extern crate structopt;

use colmap_rerun::colmap::*;
use colmap_rerun::export::write_ply;
use colmap_rerun::logging::initialize_logging;
use colmap_rerun::session::*;
use colmap_rerun::*;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use structopt::StructOpt;

// helper to parse WIDTHxHEIGHT with structopt
fn parse_resize(s: &str) -> Result<(u32, u32), String> {
    let mut it = s.split('x').map(u32::from_str);
    match (it.next(), it.next(), it.next()) {
        (Some(Ok(w)), Some(Ok(h)), None) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(format!("expected WIDTHxHEIGHT, got {}", s)),
    }
}

#[derive(StructOpt, Debug)]
struct ViewOpt {
    /// Sparse model directory holding cameras, images and points3D in .bin or .txt format.
    #[structopt(name = "SPARSE", parse(from_os_str), required_unless = "dense")]
    sparse: Option<PathBuf>,

    /// Directory containing the images of the reconstruction.
    #[structopt(name = "IMAGES", parse(from_os_str), required_unless = "dense")]
    images: Option<PathBuf>,

    /// Dense COLMAP workspace. Sparse model, images and depth maps are read from its sparse,
    /// images and stereo/depth_maps subdirectories. Overrides <SPARSE> and <IMAGES>.
    #[structopt(long = "dense", parse(from_os_str))]
    dense: Option<PathBuf>,

    /// Resize images to WIDTHxHEIGHT before logging them.
    #[structopt(long = "resize", parse(try_from_str = parse_resize))]
    resize: Option<(u32, u32)>,

    /// Keep noisy points: black points and points seen by 4 images or fewer.
    #[structopt(long = "unfiltered")]
    unfiltered: bool,

    /// Width of the viewer window.
    #[structopt(long = "width", default_value = "800")]
    width: u32,

    /// Height of the viewer window.
    #[structopt(long = "height", default_value = "600")]
    height: u32,

    /// Rerun application id.
    #[structopt(long = "app-id", default_value = "colmap_notebook_demo")]
    application_id: String,

    /// Write the recording to an .rrd file instead of spawning a viewer.
    #[structopt(long = "save", parse(from_os_str), conflicts_with = "connect")]
    save: Option<PathBuf>,

    /// Stream to a running viewer at ADDR (default 127.0.0.1:9876) instead of spawning one.
    #[structopt(long = "connect")]
    connect: Option<Option<SocketAddr>>,

    /// Do not show a progress bar.
    #[structopt(long = "quiet")]
    quiet: bool,
}

#[derive(StructOpt, Debug)]
struct InfoOpt {
    /// Sparse model directory.
    #[structopt(name = "MODEL", parse(from_os_str))]
    model: PathBuf,
}

#[derive(StructOpt, Debug)]
struct PLYOpt {
    /// Sparse model directory.
    #[structopt(name = "MODEL", parse(from_os_str))]
    model: PathBuf,

    /// Output file in .ply format.
    #[structopt(name = "OUT", parse(from_os_str))]
    out: PathBuf,

    /// Keep noisy points.
    #[structopt(long = "unfiltered")]
    unfiltered: bool,
}

#[derive(StructOpt, Debug)]
struct ConvertOpt {
    /// Sparse model directory.
    #[structopt(name = "MODEL", parse(from_os_str))]
    model: PathBuf,

    /// Output directory.
    #[structopt(name = "OUT", parse(from_os_str))]
    out: PathBuf,

    /// Output format, bin or txt.
    #[structopt(long = "format", default_value = "txt")]
    format: ModelFormat,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "colmap-rerun",
    about = "Tools for inspecting COLMAP reconstructions with Rerun."
)]
enum Opt {
    /// Visualize a sparse or dense COLMAP reconstruction in Rerun.
    View(ViewOpt),
    /// Print a summary of a sparse model.
    Info(InfoOpt),
    /// Convert a sparse model to a .ply with camera centers, points and observations.
    PLY(PLYOpt),
    /// Convert a sparse model between the binary and text formats.
    Convert(ConvertOpt),
}

fn run_view(opt: ViewOpt) -> Result<(), Error> {
    let viewer = match (opt.save, opt.connect) {
        (Some(path), _) => Viewer::Save(path),
        (None, Some(addr)) => Viewer::Connect(addr),
        (None, None) => Viewer::Spawn,
    };
    let config = SessionConfig {
        sparse_model_path: opt.sparse.unwrap_or_default(),
        images_path: opt.images.unwrap_or_default(),
        dense_model_path: opt.dense,
        resize: opt.resize,
        unfiltered: opt.unfiltered,
        width: opt.width,
        height: opt.height,
        application_id: opt.application_id,
        progress: !opt.quiet,
    };
    visualize_colmap(&config, &viewer)
}

fn run_info(opt: InfoOpt) -> Result<(), Error> {
    let model = read_model(&opt.model)?;
    println!("{}", model);
    println!(
        "Mean reprojection error: {:.4}",
        model.mean_reprojection_error()
    );
    if let Some((min, max)) = model.extent() {
        println!(
            "Extent: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }
    let noisy = model.points3d.values().filter(|p| p.is_noisy()).count();
    println!("Noisy points: {}", noisy);
    Ok(())
}

fn run_ply(opt: PLYOpt) -> Result<(), Error> {
    let mut model = read_model(&opt.model)?;
    if !opt.unfiltered {
        model = model.filter_noisy();
    }
    write_ply(&model, &opt.out)?;
    println!("Wrote {} to {}", model, opt.out.display());
    Ok(())
}

fn run_convert(opt: ConvertOpt) -> Result<(), Error> {
    let model = read_model(&opt.model)?;
    write_model(&model, &opt.out, opt.format)?;
    println!("Wrote {} to {}", model, opt.out.display());
    Ok(())
}

fn main() {
    initialize_logging();
    let result = match Opt::from_args() {
        Opt::View(opt) => run_view(opt),
        Opt::Info(opt) => run_info(opt),
        Opt::PLY(opt) => run_ply(opt),
        Opt::Convert(opt) => run_convert(opt),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
