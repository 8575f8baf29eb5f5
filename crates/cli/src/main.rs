//! soilmap CLI - soil fertility surfaces and classified maps

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use soilmap_algorithms::classification::{classify, Boundary, ClassEntry, ClassifiedMap, ClassifyParams};
use soilmap_algorithms::interpolation::{
    format_stats_line, InterpolationMethod, PointDataset, SoilInterpolator, SurfaceStats,
};
use soilmap_algorithms::Degradation;
use soilmap_core::io::{read_features, read_geotiff};
use soilmap_core::Raster;

use config::FileConfig;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "soilmap")]
#[command(author, version, about = "Soil fertility interpolation and classified maps", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true, env = "SOILMAP_VERBOSE")]
    verbose: bool,

    /// Log record format on stderr
    #[arg(long, global = true, value_enum, default_value = "text", env = "SOILMAP_LOG_FORMAT")]
    log_format: LogFormat,

    /// TOML configuration file; explicit flags take precedence
    #[arg(short, long, global = true, env = "SOILMAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpolate one sampled attribute onto a regular grid
    Interpolate {
        /// GeoJSON file with point samples
        #[arg(short, long, env = "SOILMAP_INPUT")]
        input: PathBuf,
        /// Attribute to interpolate
        #[arg(short, long)]
        parameter: String,
        /// Interpolation method: kriging, idw
        #[arg(short, long, default_value = "kriging")]
        method: InterpolationMethod,
        /// Target cell size in metres
        #[arg(long, env = "SOILMAP_RESOLUTION")]
        resolution: Option<f64>,
        /// Minimum cells per axis
        #[arg(long)]
        min_cells: Option<usize>,
        /// Maximum cells per axis
        #[arg(long)]
        max_cells: Option<usize>,
        /// IDW power
        #[arg(long)]
        power: Option<f64>,
        /// Null cells outside the convex envelope of the samples
        #[arg(long)]
        mask: bool,
        /// Directory for `<parameter>_<method>_interpolation.tif`
        #[arg(short, long, env = "SOILMAP_OUTPUT_DIR")]
        output_dir: PathBuf,
    },
    /// Classify a surface into percentile classes
    Classify {
        /// Input GeoTIFF surface
        #[arg(short, long)]
        input: PathBuf,
        /// Number of classes
        #[arg(short = 'n', long)]
        classes: Option<usize>,
        /// GeoJSON study-area boundary
        #[arg(short, long, env = "SOILMAP_BOUNDARY")]
        boundary: Option<PathBuf>,
        /// Output PNG image
        #[arg(short, long)]
        output: PathBuf,
        /// Output JSON class table (defaults to the image path with .json)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },
    /// Classify several surfaces independently
    Report {
        /// Surfaces as `name=path`
        #[arg(short, long = "raster", value_parser = parse_named_path, required = true)]
        rasters: Vec<(String, PathBuf)>,
        /// Number of classes
        #[arg(short = 'n', long)]
        classes: Option<usize>,
        /// GeoJSON study-area boundary
        #[arg(short, long, env = "SOILMAP_BOUNDARY")]
        boundary: Option<PathBuf>,
        /// Directory for images, tables and `summary.json`
        #[arg(short, long, env = "SOILMAP_OUTPUT_DIR")]
        output_dir: PathBuf,
    },
    /// Show information about a surface (GeoTIFF) or a sample file (GeoJSON)
    Info {
        /// Input file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool, format: LogFormat) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    if let Err(e) = installed {
        eprintln!("logging disabled: {}", e);
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_named_path(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected name=path, got '{}'", s)),
    }
}

fn read_surface(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading surface...");
    let raster = read_geotiff(path)
        .with_context(|| format!("Failed to read surface {}", path.display()));
    pb.finish_and_clear();
    let raster = raster?;
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

/// A boundary that cannot be read is a degradation, not a failure.
fn load_boundary(path: Option<&Path>) -> (Option<Boundary>, Vec<Degradation>) {
    let Some(path) = path else {
        return (None, Vec::new());
    };
    match Boundary::read(path) {
        Ok(boundary) => (Some(boundary), Vec::new()),
        Err(e) => {
            let reason = format!("{}: {}", path.display(), e);
            warn!(reason = %reason, "boundary unavailable, classifying the full surface");
            (None, vec![Degradation::clipping(reason)])
        }
    }
}

#[derive(Serialize)]
struct Stats {
    min: f64,
    max: f64,
    mean: f64,
}

#[derive(Serialize)]
struct ClassTable<'a> {
    name: &'a str,
    num_classes: usize,
    stats: Stats,
    breaks: &'a [f64],
    classes: &'a [ClassEntry],
    boundary_rings: &'a [Vec<(usize, usize)>],
    boundary_area_ha: Option<f64>,
    degradations: Vec<Degradation>,
}

fn write_map(name: &str, map: &ClassifiedMap, extra: &[Degradation], image: &Path, table: &Path) -> Result<()> {
    let pb = spinner("Writing map...");
    let (min, max, mean) = map.stats;
    let doc = ClassTable {
        name,
        num_classes: map.table.len(),
        stats: Stats { min, max, mean },
        breaks: &map.breaks,
        classes: &map.table,
        boundary_rings: &map.boundary_rings,
        boundary_area_ha: map.boundary_area_ha,
        degradations: extra.iter().chain(&map.degradations).cloned().collect(),
    };
    let written = map
        .image
        .save(image)
        .with_context(|| format!("Failed to write image {}", image.display()))
        .and_then(|_| write_json(&doc, table));
    pb.finish_and_clear();
    written
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn classify_params(file: &FileConfig, classes: Option<usize>, boundary: Option<Boundary>) -> ClassifyParams {
    ClassifyParams {
        num_classes: classes.unwrap_or(file.classification.num_classes),
        boundary,
    }
}

/// The `STATS:` line, only for surfaces with at least one valid cell
fn stats_line(stats: &SurfaceStats) -> Option<String> {
    (stats.valid_cells > 0).then(|| format_stats_line(stats))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Report ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ReportEntry {
    Rendered {
        name: String,
        image: PathBuf,
        table: PathBuf,
        boundary_area_ha: Option<f64>,
        degradations: Vec<Degradation>,
    },
    Skipped {
        name: String,
        reason: String,
    },
}

fn render_one(
    name: &str,
    path: &Path,
    params: &ClassifyParams,
    extra: &[Degradation],
    output_dir: &Path,
) -> Result<ReportEntry> {
    let surface = read_surface(path)?;
    let Some(map) = classify(&surface, params)? else {
        bail!("surface has no valid cells");
    };
    let image = output_dir.join(format!("{}_classified.png", name));
    let table = output_dir.join(format!("{}_classes.json", name));
    write_map(name, &map, extra, &image, &table)?;
    Ok(ReportEntry::Rendered {
        name: name.to_string(),
        image,
        table,
        boundary_area_ha: map.boundary_area_ha,
        degradations: extra.iter().chain(&map.degradations).cloned().collect(),
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_format);
    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Interpolate {
            input,
            parameter,
            method,
            resolution,
            min_cells,
            max_cells,
            power,
            mask,
            output_dir,
        } => {
            let mut config = file.interpolation;
            if let Some(r) = resolution {
                config.grid.resolution_m = r;
            }
            if let Some(n) = min_cells {
                config.grid.min_cells = n;
            }
            if let Some(n) = max_cells {
                config.grid.max_cells = n;
            }
            if let Some(p) = power {
                config.estimator.idw_power = p;
            }
            config.use_mask |= mask;

            let pb = spinner("Reading samples...");
            let features = read_features(&input);
            pb.finish_and_clear();
            let features =
                features.with_context(|| format!("Failed to read samples {}", input.display()))?;
            let dataset = PointDataset::from_features(&features).context("No usable sample points")?;

            let start = Instant::now();
            let interpolator = SoilInterpolator::new(config);
            let result = interpolator
                .interpolate_parameter(&dataset, &parameter, method)
                .with_context(|| format!("Failed to interpolate {}", parameter))?;
            let elapsed = start.elapsed();

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            let pb = spinner("Writing surface...");
            let path = interpolator.save_surface(&result, &output_dir);
            pb.finish_and_clear();
            let path = path.context("Failed to write surface")?;

            if result.estimator != method.as_str() {
                info!(requested = %method, used = result.estimator, "surface produced by fallback estimator");
            }
            match stats_line(&result.stats) {
                Some(line) => println!("{}", line),
                None => warn!(parameter = %parameter, "surface has no valid cells"),
            }
            done("Surface", &path, elapsed);
        }

        Commands::Classify {
            input,
            classes,
            boundary,
            output,
            table,
        } => {
            let surface = read_surface(&input)?;
            let (boundary, extra) = load_boundary(boundary.as_deref());
            let params = classify_params(&file, classes, boundary);

            let start = Instant::now();
            let Some(map) = classify(&surface, &params).context("Failed to classify surface")? else {
                bail!("{} has no valid cells", input.display());
            };
            let elapsed = start.elapsed();

            let table = table.unwrap_or_else(|| output.with_extension("json"));
            let name = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            write_map(&name, &map, &extra, &output, &table)?;

            for entry in &map.table {
                println!(
                    "  class {}: {:.3} - {:.3}  {:>7} px  {:>6.2} %",
                    entry.index, entry.min, entry.max, entry.pixels, entry.percent
                );
            }
            done("Classified map", &output, elapsed);
            println!("  Class table: {}", table.display());
            if let Some(area) = map.boundary_area_ha {
                println!("  Boundary area: {:.2} ha", area);
            }
        }

        Commands::Report {
            rasters,
            classes,
            boundary,
            output_dir,
        } => {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            let (boundary, extra) = load_boundary(boundary.as_deref());
            let params = classify_params(&file, classes, boundary);

            let start = Instant::now();
            let mut entries = Vec::with_capacity(rasters.len());
            for (name, path) in &rasters {
                let entry = match render_one(name, path, &params, &extra, &output_dir) {
                    Ok(entry) => entry,
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        warn!(name = %name, reason = %reason, "render skipped");
                        ReportEntry::Skipped {
                            name: name.clone(),
                            reason,
                        }
                    }
                };
                entries.push(entry);
            }

            let summary = output_dir.join("summary.json");
            write_json(&entries, &summary)?;
            let rendered = entries
                .iter()
                .filter(|e| matches!(e, ReportEntry::Rendered { .. }))
                .count();
            println!("Rendered {} of {} surfaces", rendered, entries.len());
            done("Summary", &summary, start.elapsed());
            if rendered == 0 {
                bail!("no surface could be rendered");
            }
        }

        Commands::Info { input } => {
            let is_vector = input
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"));

            if is_vector {
                let features = read_features(&input)
                    .with_context(|| format!("Failed to read samples {}", input.display()))?;
                let dataset = PointDataset::from_features(&features)?;
                let e = dataset.extent();
                println!("Samples: {}", input.display());
                println!("  Points: {} of {} features", dataset.len(), features.len());
                println!("  CRS: {}", dataset.crs());
                println!("  Extent: ({:.6}, {:.6}) - ({:.6}, {:.6})", e.min_x, e.min_y, e.max_x, e.max_y);
                println!("  Attributes: {}", dataset.attribute_names().join(", "));
            } else {
                let raster = read_surface(&input)?;
                let (min_x, min_y, max_x, max_y) = raster.bounds();
                let stats = raster.statistics();
                let na = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v));
                println!("Surface: {}", input.display());
                println!("  Dimensions: {} x {} ({} cells)", raster.cols(), raster.rows(), raster.len());
                println!(
                    "  Cell size: {} x {}",
                    raster.transform().pixel_width,
                    raster.transform().pixel_height
                );
                println!("  Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", min_x, min_y, max_x, max_y);
                match raster.crs() {
                    Some(crs) => println!("  CRS: {}", crs),
                    None => println!("  CRS: none"),
                }
                println!("  Min: {}", na(stats.min));
                println!("  Max: {}", na(stats.max));
                println!("  Mean: {}", na(stats.mean));
                println!("  Valid cells: {} ({} null)", stats.valid_count, stats.nodata_count);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_path() {
        assert_eq!(
            parse_named_path("ph=out/ph_idw_interpolation.tif").unwrap(),
            ("ph".to_string(), PathBuf::from("out/ph_idw_interpolation.tif"))
        );
        assert!(parse_named_path("ph").is_err());
        assert!(parse_named_path("=x.tif").is_err());
        assert!(parse_named_path("ph=").is_err());
    }

    #[test]
    fn test_stats_line_needs_valid_cells() {
        let empty = SurfaceStats { min: f64::NAN, max: f64::NAN, mean: f64::NAN, valid_cells: 0 };
        assert!(stats_line(&empty).is_none());

        let stats = SurfaceStats { min: 4.5, max: 6.25, mean: 5.0, valid_cells: 12 };
        assert_eq!(stats_line(&stats).unwrap(), "STATS: min=4.500, max=6.250, mean=5.000");
    }

    #[test]
    fn test_missing_boundary_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let (boundary, extra) = load_boundary(Some(&dir.path().join("absent.geojson")));
        assert!(boundary.is_none());
        assert!(matches!(extra.as_slice(), [Degradation::ClippingDegraded { .. }]));

        let (boundary, extra) = load_boundary(None);
        assert!(boundary.is_none() && extra.is_empty());
    }

    #[test]
    fn test_cli_parses_report() {
        let cli = Cli::try_parse_from([
            "soilmap", "report", "-r", "ph=a.tif", "-r", "k=b.tif", "-n", "5", "-o", "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Report { rasters, classes, .. } => {
                assert_eq!(rasters.len(), 2);
                assert_eq!(classes, Some(5));
            }
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_method() {
        let parsed = Cli::try_parse_from([
            "soilmap", "interpolate", "-i", "s.geojson", "-p", "ph", "-m", "spline", "-o", "out",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_classify_flag_overrides_file() {
        let file = FileConfig::parse("[classification]\nnum_classes = 4\n").unwrap();
        assert_eq!(classify_params(&file, None, None).num_classes, 4);
        assert_eq!(classify_params(&file, Some(6), None).num_classes, 6);
    }
}
