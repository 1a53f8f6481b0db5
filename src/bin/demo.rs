extern crate colmap_rerun;
extern crate structopt;

use colmap_rerun::logging::initialize_logging;
use colmap_rerun::session::*;

use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "demo",
    about = "Visualize a COLMAP reconstruction with example settings. Edit the paths in \
             sample_config to point at your own data."
)]
struct Opt {
    /// Dense COLMAP workspace. Without it the sample sparse model is shown.
    #[structopt(long = "dense", parse(from_os_str))]
    dense: Option<PathBuf>,

    /// Write the recording to an .rrd file instead of spawning a viewer.
    #[structopt(long = "save", parse(from_os_str))]
    save: Option<PathBuf>,
}

fn sample_config() -> SessionConfig {
    SessionConfig {
        sparse_model_path: PathBuf::from("content/colmap_output/sparse"),
        images_path: PathBuf::from("content/colmap_output/images"),
        resize: Some((640, 480)),
        // set to true to show all data including noise
        unfiltered: false,
        width: 1000,
        height: 700,
        ..Default::default()
    }
}

fn dense_config(dense_model_path: PathBuf) -> SessionConfig {
    SessionConfig {
        dense_model_path: Some(dense_model_path),
        resize: Some((640, 480)),
        width: 1000,
        height: 700,
        ..Default::default()
    }
}

fn main() {
    initialize_logging();
    let opt = Opt::from_args();
    let viewer = opt.save.map(Viewer::Save).unwrap_or(Viewer::Spawn);

    let config = match opt.dense {
        Some(dense) => {
            println!("Starting COLMAP dense reconstruction visualization...");
            dense_config(dense)
        }
        None => sample_config(),
    };

    if let Err(e) = visualize_colmap(&config, &viewer) {
        println!("Error: {}", e);
    }
}
