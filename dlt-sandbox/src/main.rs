use dlt_core::ObjectPoints;
use dlt_gradient::Metric;
use dlt_optimize::{
    error_bounds, validation_error, BoundsSettings, Diagnostics, ErrorBounds, ExperimentSettings,
    IterationRecord, OptimizeError, Optimizer,
};
use dlt_pinhole::{Camera, CameraError};
use log::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use thiserror::Error;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "dlt-sandbox",
    about = "A tool for optimizing calibration point configurations for DLT homography estimation"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `dlt_optimize::ExperimentSettings`. Fields that are left out take
    /// their default values and a missing file means all defaults.
    #[structopt(short, long, default_value = "dlt-settings.json")]
    settings: PathBuf,
    /// Override the number of iterations
    #[structopt(short, long)]
    iterations: Option<usize>,
    /// Override the metric, either "condition-number" or "configuration-metric"
    #[structopt(short, long)]
    metric: Option<Metric>,
    /// Override the number of points (4 or 5)
    #[structopt(short, long)]
    points: Option<usize>,
    /// Divide the gradient by its largest partial before every step
    #[structopt(long)]
    normalize: bool,
    /// Override the seed used to sample the initial configuration
    #[structopt(long)]
    seed: Option<u64>,
    /// Output JSON file to deposit the settings and iteration history
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// Estimate the homography error bounds and the validation error with this many noisy trials
    /// before and after optimizing, even if the settings file leaves them disabled
    #[structopt(short, long)]
    trials: Option<usize>,
}

#[derive(Debug, Error)]
enum SandboxError {
    #[error("unable to read settings file {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed settings file {path:?}: {source}")]
    Settings {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

#[derive(Serialize)]
struct Report<'a> {
    settings: &'a ExperimentSettings,
    initial_points: &'a ObjectPoints,
    initial: Diagnostics,
    history: &'a [IterationRecord],
    bounds_before: Option<ErrorBounds>,
    bounds_after: Option<ErrorBounds>,
    /// Mean pixel error of the estimated homography on the validation grid
    validation_before: Option<f64>,
    validation_after: Option<f64>,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(&opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_settings(path: &Path) -> Result<ExperimentSettings, SandboxError> {
    match File::open(path) {
        Ok(file) => {
            let settings = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                SandboxError::Settings {
                    path: path.to_owned(),
                    source,
                }
            })?;
            info!("loaded existing settings");
            Ok(settings)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("used default settings");
            Ok(ExperimentSettings::default())
        }
        Err(source) => Err(SandboxError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Error bounds and validation error of one configuration, if they are enabled.
fn estimate<R: rand::Rng>(
    camera: &Camera,
    points: &ObjectPoints,
    validation: &ObjectPoints,
    settings: &BoundsSettings,
    rng: &mut R,
) -> Result<(Option<ErrorBounds>, Option<f64>), SandboxError> {
    if !settings.enabled {
        return Ok((None, None));
    }
    let bounds = error_bounds(camera, points, settings, rng)?;
    let validation = validation_error(camera, points, validation, settings, rng)?;
    Ok((Some(bounds), Some(validation)))
}

fn run(opt: &Opt) -> Result<(), SandboxError> {
    let mut settings = load_settings(&opt.settings)?;
    // Command line arguments take precedence over the settings file.
    if let Some(iterations) = opt.iterations {
        settings.optimizer.iterations = iterations;
    }
    if let Some(metric) = opt.metric {
        settings.optimizer.metric = metric;
    }
    if let Some(points) = opt.points {
        settings.plane.points = points;
    }
    if opt.normalize {
        settings.optimizer.normalize_gradient = true;
    }
    if let Some(seed) = opt.seed {
        settings.plane.seed = seed;
    }
    if let Some(trials) = opt.trials {
        settings.bounds.trials = trials;
        settings.bounds.enabled = true;
    }
    settings.validate()?;

    let camera: Camera = settings.camera.camera()?;
    let plane = settings.plane.plane()?;
    let mut rng = Pcg64::seed_from_u64(settings.plane.seed);
    let initial_points = plane.sample_points(
        settings.plane.points,
        settings.plane.radius,
        settings.plane.min_separation,
        &mut rng,
    )?;
    info!("initial points: {:?}", initial_points.coordinates());

    let validation = plane.uniform_grid();
    if settings.bounds.enabled {
        info!("estimating the errors of the initial configuration");
    }
    let (bounds_before, validation_before) = estimate(
        &camera,
        &initial_points,
        &validation,
        &settings.bounds,
        &mut rng,
    )?;

    let outcome = Optimizer::new(settings.optimizer, camera, initial_points.clone())?.run()?;
    let last = outcome.last();
    info!(
        "condition number went from {:e} to {:e}, configuration metric from {:e} to {:e}",
        outcome.initial.condition_number,
        last.condition_number,
        outcome.initial.configuration_metric,
        last.configuration_metric
    );
    info!("final points: {:?}", outcome.points.coordinates());
    if !camera.in_view(&camera.project(&outcome.points, false)?)? {
        warn!("some optimized points project outside of the image");
    }

    if settings.bounds.enabled {
        info!("estimating the errors of the optimized configuration");
    }
    let (bounds_after, validation_after) = estimate(
        &camera,
        &outcome.points,
        &validation,
        &settings.bounds,
        &mut rng,
    )?;
    for (name, bounds, validation) in [
        ("initial", bounds_before, validation_before),
        ("optimized", bounds_after, validation_after),
    ] {
        if let (Some(bounds), Some(validation)) = (bounds, validation) {
            info!(
                "{} configuration: relative homography error {:e} within [{:e}, {:e}], validation error {:e} pixels",
                name, bounds.relative_error, bounds.lower, bounds.upper, validation
            );
        }
    }

    if let Some(path) = &opt.output {
        info!("saving the iteration history");
        let report = Report {
            settings: &settings,
            initial_points: &initial_points,
            initial: outcome.initial,
            history: &outcome.history,
            bounds_before,
            bounds_after,
            validation_before,
            validation_after,
        };
        match File::create(path) {
            Ok(file) => {
                if let Err(e) = serde_json::to_writer_pretty(BufWriter::new(file), &report) {
                    error!("unable to save iteration history: {}", e);
                }
            }
            Err(e) => error!("unable to create {}: {}", path.display(), e),
        }
    } else {
        info!("no output file given, so not saving the iteration history");
    }
    Ok(())
}
