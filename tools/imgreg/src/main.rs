//! CLI front end for the image co-registration and warping engine
//! (spec.md §6). Wires `clap`'s derive API the same way every `tools/*`
//! binary in the teacher workspace does it, and routes GDAL's own
//! error/debug stream through `log` before opening any dataset.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand};
use env_logger::{Env, TimestampPrecision};

use coreg::tiepointio::TiePointFormat;
use coreg::warp::interpolator::Interpolator;
use coreg::warp::model::{InverseModel, NearestModel, PolynomialModel, TriangulationModel};
use coreg::{BasicConfig, Gcp, MatcherConfig, SimilarityMetric, SingleLayerConfig, TiePoint};
use geo::{GdalRaster, GeoReference, Raster, RasterIO};

pub type Result<T = ()> = anyhow::Result<T>;

#[derive(Parser, Debug)]
#[command(name = "imgreg", about = "Image co-registration and warping engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct RegistrationInputs {
    #[arg(long = "reference")]
    reference: PathBuf,
    #[arg(long = "floating")]
    floating: PathBuf,
    #[arg(long = "output")]
    output: PathBuf,
    #[arg(long = "metric", default_value = "correlation")]
    metric: String,
    #[arg(long = "outputType", default_value = "rsgis_img2map")]
    output_type: String,
    #[arg(long = "window", default_value_t = 9)]
    window: i32,
    #[arg(long = "search", default_value_t = 4)]
    search: i32,
    #[arg(long = "threshold", default_value_t = 0.9)]
    threshold: f32,
    #[arg(long = "stddevRef", default_value_t = 0.0)]
    stddev_ref: f32,
    #[arg(long = "stddevFloat", default_value_t = 0.0)]
    stddev_float: f32,
    #[arg(long = "subpixelresolution", default_value_t = 8)]
    subpixelresolution: u32,
}

#[derive(clap::Args, Debug)]
struct WarpInputs {
    #[arg(long = "image")]
    image: PathBuf,
    #[arg(long = "gcps")]
    gcps: PathBuf,
    #[arg(long = "output")]
    output: PathBuf,
    #[arg(long = "format", default_value = "KEA")]
    format: String,
    #[arg(long = "datatype", default_value = "Float32")]
    datatype: String,
    #[arg(long = "resolution")]
    resolution: f64,
    #[arg(long = "projection")]
    projection: Option<PathBuf>,
    #[arg(long = "transform", default_value = "no")]
    transform: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Independent per-tie-point registration (C5)")]
    Basic {
        #[command(flatten)]
        inputs: RegistrationInputs,
        #[arg(long = "pixelgap", default_value_t = 16)]
        pixelgap: i32,
    },
    #[command(name = "singlelayer", about = "Elastic single-connected-layer registration (C6)")]
    SingleLayer {
        #[command(flatten)]
        inputs: RegistrationInputs,
        #[arg(long = "pixelgap", default_value_t = 16)]
        pixelgap: i32,
        #[arg(long = "distanceThreshold", default_value_t = 50.0)]
        distance_threshold: f64,
        #[arg(long = "maxiterations", default_value_t = 10)]
        maxiterations: u32,
        #[arg(long = "movementThreshold", default_value_t = 0.01)]
        movement_threshold: f64,
        #[arg(long = "pSmoothness", default_value_t = 1.0)]
        p_smoothness: f64,
    },
    #[command(name = "pxlshift", about = "Per-pixel shift/metric diagnostic image (C7)")]
    PxlShift {
        #[command(flatten)]
        inputs: RegistrationInputs,
    },
    #[command(name = "triangularwarp", about = "Warp with a Delaunay-triangulation inverse model (C11b)")]
    TriangularWarp {
        #[command(flatten)]
        inputs: WarpInputs,
    },
    #[command(name = "nnwarp", about = "Warp with a nearest-GCP inverse model (C11a)")]
    NnWarp {
        #[command(flatten)]
        inputs: WarpInputs,
    },
    #[command(name = "polywarp", about = "Warp with a global polynomial inverse model (C11c)")]
    PolyWarp {
        #[command(flatten)]
        inputs: WarpInputs,
        #[arg(long = "polyOrder", default_value_t = 1)]
        poly_order: u32,
    },
    #[command(name = "gcp2gdal", about = "Copy pixels and attach tie points as GCPs (C9)")]
    Gcp2Gdal {
        #[arg(long = "image")]
        image: PathBuf,
        #[arg(long = "gcps")]
        gcps: PathBuf,
        #[arg(long = "output")]
        output: PathBuf,
        #[arg(long = "format", default_value = "KEA")]
        format: String,
    },
}

fn main() -> Result {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    geo::gdalinterop::setup_logging(log::max_level() >= log::LevelFilter::Debug);

    let cli = Cli::parse();
    match cli.command {
        Commands::Basic { inputs, pixelgap } => run_basic(inputs, pixelgap),
        Commands::SingleLayer {
            inputs,
            pixelgap,
            distance_threshold,
            maxiterations,
            movement_threshold,
            p_smoothness,
        } => run_single_layer(inputs, pixelgap, distance_threshold, maxiterations, movement_threshold, p_smoothness),
        Commands::PxlShift { inputs } => run_pixel_shift(inputs),
        Commands::TriangularWarp { inputs } => run_warp(inputs, WarpKind::Triangulation),
        Commands::NnWarp { inputs } => run_warp(inputs, WarpKind::Nearest),
        Commands::PolyWarp { inputs, poly_order } => run_warp(inputs, WarpKind::Polynomial(poly_order)),
        Commands::Gcp2Gdal { image, gcps, output, format } => run_gcp2gdal(image, gcps, output, format),
    }
}

fn matcher_config(inputs: &RegistrationInputs, threshold: Option<f32>) -> Result<MatcherConfig> {
    Ok(MatcherConfig {
        half_window: inputs.window,
        half_search: inputs.search,
        metric: SimilarityMetric::from_str(&inputs.metric).map_err(anyhow::Error::msg)?,
        subpixel_resolution: inputs.subpixelresolution,
        threshold,
    })
}

fn tie_point_format(name: &str) -> Result<TiePointFormat> {
    match name {
        "envi_img2img" => Ok(TiePointFormat::EnviImageToImage),
        "envi_img2map" => Ok(TiePointFormat::EnviImageToMap),
        "rsgis_img2map" => Ok(TiePointFormat::RsgisImageToMap),
        "rsgis_mapoffs" => Ok(TiePointFormat::RsgisMapOffsets),
        other => anyhow::bail!("unknown --outputType {other}"),
    }
}

fn write_tie_points(output: &Path, points: &[TiePoint], format: TiePointFormat) -> Result {
    let mut file = fs::File::create(output)?;
    coreg::tiepointio::write(&mut file, points, format)?;
    Ok(())
}

fn run_basic(inputs: RegistrationInputs, pixelgap: i32) -> Result {
    let reference = GdalRaster::open_read_only(&inputs.reference)?;
    let floating = GdalRaster::open_read_only(&inputs.floating)?;

    let config = BasicConfig {
        gap: pixelgap,
        matcher: matcher_config(&inputs, Some(inputs.threshold))?,
        stddev_ref_threshold: inputs.stddev_ref,
        stddev_float_threshold: inputs.stddev_float,
    };

    let points = coreg::register_basic(&reference, &floating, &config)?;
    log::info!("retained {} tie points", points.len());
    write_tie_points(&inputs.output, &points, tie_point_format(&inputs.output_type)?)
}

#[allow(clippy::too_many_arguments)]
fn run_single_layer(
    inputs: RegistrationInputs,
    pixelgap: i32,
    distance_threshold: f64,
    maxiterations: u32,
    movement_threshold: f64,
    p_smoothness: f64,
) -> Result {
    let reference = GdalRaster::open_read_only(&inputs.reference)?;
    let floating = GdalRaster::open_read_only(&inputs.floating)?;

    let config = SingleLayerConfig {
        basic: BasicConfig {
            gap: pixelgap,
            matcher: matcher_config(&inputs, Some(inputs.threshold))?,
            stddev_ref_threshold: inputs.stddev_ref,
            stddev_float_threshold: inputs.stddev_float,
        },
        distance_threshold,
        max_iterations: maxiterations,
        move_change_threshold: movement_threshold,
        smoothness: p_smoothness,
    };

    let points = coreg::register_single_layer(&reference, &floating, &config)?;
    log::info!("retained {} tie points", points.len());
    write_tie_points(&inputs.output, &points, tie_point_format(&inputs.output_type)?)
}

fn run_pixel_shift(inputs: RegistrationInputs) -> Result {
    let reference = GdalRaster::open_read_only(&inputs.reference)?;
    let floating = GdalRaster::open_read_only(&inputs.floating)?;
    let matcher = matcher_config(&inputs, None)?;

    let (overlap_region, output_geo) = coreg::plan_pixel_shift(&reference, &floating)?;
    let band_descriptions = ["X Shift", "Y Shift", "Metric Value"];
    let mut output = GdalRaster::create(&inputs.output, output_geo, &band_descriptions)?;
    coreg::register_pixel_shift(&reference, &floating, &overlap_region, &matcher, &mut output)?;
    log::info!("wrote per-pixel shift raster to {}", inputs.output.display());
    Ok(())
}

enum WarpKind {
    Nearest,
    Triangulation,
    Polynomial(u32),
}

fn read_gcps(path: &Path) -> Result<Vec<Gcp>> {
    let file = fs::File::open(path)?;
    Ok(coreg::read_gcp_file(std::io::BufReader::new(file))?)
}

fn resolve_projection(projection_file: &Option<PathBuf>, fallback: &GeoReference) -> Result<String> {
    match projection_file {
        Some(path) => Ok(fs::read_to_string(path)?.trim().to_string()),
        None => Ok(fallback.projection().to_string()),
    }
}

fn run_warp(inputs: WarpInputs, kind: WarpKind) -> Result {
    if inputs.datatype != "Float32" {
        log::warn!("--datatype {} requested; the core always resamples in 32-bit float (spec.md §3)", inputs.datatype);
    }

    let input = GdalRaster::open_read_only(&inputs.image)?;
    let gcps = read_gcps(&inputs.gcps)?;
    let projection = resolve_projection(&inputs.projection, input.geo_reference())?;
    let input_resolution = input.geo_reference().pixel_width();

    let model = match kind {
        WarpKind::Nearest => InverseModel::Nearest(NearestModel::build(&gcps, input_resolution)),
        WarpKind::Triangulation => InverseModel::Triangulation(TriangulationModel::build(&gcps)?),
        WarpKind::Polynomial(order) => {
            let model = PolynomialModel::build(&gcps, order)?;
            log::info!("polynomial fit RMSE: {:.6} input pixels", model.rmse());
            InverseModel::Polynomial(model)
        }
    };

    let diagnostic = inputs.transform.eq_ignore_ascii_case("yes");
    let band_count = if diagnostic { 2 } else { input.band_count() };
    let output_geo = coreg::warp::output_geo_reference(&gcps, inputs.resolution, &projection, band_count)?;

    if diagnostic {
        let descriptions = ["X Input Pixel", "Y Input Pixel"];
        let mut output = GdalRaster::create(&inputs.output, output_geo.clone(), &descriptions)?;
        coreg::warp::warp_diagnostic_transform(&model, &output_geo, &mut output)?;
    } else {
        let descriptions: Vec<String> = (0..band_count).map(|i| format!("Band {}", i + 1)).collect();
        let description_refs: Vec<&str> = descriptions.iter().map(String::as_str).collect();
        let mut output = GdalRaster::create(&inputs.output, output_geo.clone(), &description_refs)?;
        coreg::warp::warp(&input, &model, Interpolator::NearestNeighbour, &output_geo, &mut output)?;
    }

    log::info!("wrote warped output to {}", inputs.output.display());
    Ok(())
}

fn run_gcp2gdal(image: PathBuf, gcps_path: PathBuf, output: PathBuf, format: String) -> Result {
    if format != "KEA" {
        log::debug!("--format {format} is honoured via the output path's extension, not a driver-name override");
    }

    let input = GdalRaster::open_read_only(&image)?;
    let gcps = read_gcps(&gcps_path)?;
    let projection = input.geo_reference().projection().to_string();
    let band_descriptions: Vec<String> = (0..input.band_count()).map(|i| format!("Band {}", i + 1)).collect();
    let description_refs: Vec<&str> = band_descriptions.iter().map(String::as_str).collect();

    let mut output_raster = GdalRaster::create(&output, input.geo_reference().clone(), &description_refs)?;
    coreg::copy_pixels(&input, &mut output_raster)?;

    let gdal_gcps: Vec<(f64, f64, f64, f64)> = gcps.iter().map(|g| (g.pixel_col, g.pixel_row, g.easting, g.northing)).collect();
    output_raster.set_gcps(&gdal_gcps, &projection)?;

    log::info!("wrote {} GCPs to {}", gdal_gcps.len(), output.display());
    Ok(())
}
