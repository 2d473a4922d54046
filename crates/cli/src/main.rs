//! Hydrospan CLI - surface-water dynamics from radar backscatter

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hydrospan_algorithms::classify::ClassifyParams;
use hydrospan_algorithms::pipeline::{run_water_pipeline, PipelineParams, ProductSink};
use hydrospan_algorithms::threshold::ThresholdMethod;
use hydrospan_core::io::{
    read_frame_stack, write_geotiff, write_geotiff_u8, GeoTiffOptions, SummaryWriter,
};
use hydrospan_core::{ChangeRaster, ClassifiedMask, FrameSummary, FrequencyProduct, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hydrospan")]
#[command(author, version, about = "Surface-water dynamics from radar backscatter", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monthly water pipeline over a directory of dated frames
    Run {
        /// Directory of monthly backscatter GeoTIFFs named *_YYYY-MM-DD.tif
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for masks, changes and derived products
        #[arg(short, long)]
        out_dir: PathBuf,
        /// Threshold method: otsu, quantile, fixed
        #[arg(short = 'm', long, default_value = "otsu")]
        threshold_method: String,
        /// Cutoff in dB for the fixed method
        #[arg(long, default_value = "-16.0", allow_hyphen_values = true)]
        fixed_threshold: f64,
        /// Quantile in (0, 1) for the quantile method
        #[arg(long, default_value = "0.12")]
        quantile: f64,
        /// Pool every finite sample across the run and classify all frames
        /// against one shared threshold
        #[arg(long)]
        global_threshold: bool,
        /// Minimum 3x3 votes to keep a wet pixel; 0 disables the filter
        #[arg(long, default_value = "0")]
        min_neighbors: i32,
        /// Majority filter passes
        #[arg(long, default_value = "1")]
        neighbor_iters: i32,
        /// Wet-pixel floor below which a frame gets no centroid
        #[arg(long, default_value = "25")]
        min_water_pixels: usize,
        /// Wet months required for permanent water
        #[arg(long, default_value = "10")]
        permanent_min_months: i32,
        /// Keep only frames on or after this month (YYYY-MM or YYYY-MM-DD)
        #[arg(long, value_parser = parse_month_arg)]
        start: Option<NaiveDate>,
        /// Keep only frames on or before this month (YYYY-MM or YYYY-MM-DD)
        #[arg(long, value_parser = parse_month_arg)]
        end: Option<NaiveDate>,
        /// Also write per-frame overflow masks (wet outside permanent water)
        #[arg(long)]
        write_overflow_masks: bool,
    },
    /// Show information about a directory of dated frames
    Info {
        /// Directory of monthly backscatter GeoTIFFs
        #[arg(short, long)]
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_method(name: &str, fixed: f64, quantile: f64) -> Result<ThresholdMethod> {
    ThresholdMethod::from_name(&name.to_lowercase(), fixed, quantile)
        .with_context(|| format!("Unknown threshold method: {}", name))
}

fn parse_month_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
        .map_err(|_| format!("expected YYYY-MM or YYYY-MM-DD, got '{}'", s))
}

// ─── Product sink writing GeoTIFFs and the CSV summary ─────────────────

struct DiskSink {
    masks_dir: PathBuf,
    changes_dir: PathBuf,
    overflow_dir: PathBuf,
    derived_dir: PathBuf,
    summary: SummaryWriter,
}

impl DiskSink {
    fn create(output: &Path) -> Result<Self> {
        let masks_dir = output.join("masks");
        let changes_dir = output.join("changes");
        let overflow_dir = output.join("overflow");
        let derived_dir = output.join("derived");
        for dir in [&masks_dir, &changes_dir, &overflow_dir, &derived_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let summary = SummaryWriter::create(derived_dir.join("water_monthly_summary.csv"))
            .context("Failed to create summary CSV")?;
        Ok(Self {
            masks_dir,
            changes_dir,
            overflow_dir,
            derived_dir,
            summary,
        })
    }
}

impl ProductSink for DiskSink {
    fn mask(&mut self, mask: &ClassifiedMask) -> hydrospan_core::Result<Option<String>> {
        let path = self.masks_dir.join(format!("water_mask_{}.tif", mask.date));
        write_geotiff_u8(&mask.wet, &path, &GeoTiffOptions::default())?;
        Ok(Some(path.display().to_string()))
    }

    fn change(&mut self, change: &ChangeRaster) -> hydrospan_core::Result<()> {
        let path = self
            .changes_dir
            .join(format!("change_vs_prev_{}.tif", change.date));
        write_geotiff(&change.code, &path, &GeoTiffOptions::default())?;
        write_geotiff_u8(
            &change.gain_mask(),
            self.changes_dir
                .join(format!("gain_vs_prev_{}.tif", change.date)),
            &GeoTiffOptions::default(),
        )?;
        write_geotiff_u8(
            &change.loss_mask(),
            self.changes_dir
                .join(format!("loss_vs_prev_{}.tif", change.date)),
            &GeoTiffOptions::default(),
        )?;
        Ok(())
    }

    fn summary(&mut self, row: &FrameSummary) -> hydrospan_core::Result<()> {
        self.summary.append(row)
    }

    fn frequency(&mut self, product: &FrequencyProduct) -> hydrospan_core::Result<()> {
        let opts = GeoTiffOptions::default();
        write_geotiff(
            &product.months_wet,
            self.derived_dir.join("water_frequency_months.tif"),
            &opts,
        )?;
        write_geotiff(
            &product.fraction,
            self.derived_dir.join("water_frequency_fraction.tif"),
            &GeoTiffOptions::with_nodata(f64::NAN),
        )?;
        // The scalar median threshold ships as a constant grid so raster
        // calculators can consume it next to the other products
        let mut median: Raster<f64> = product.fraction.with_same_meta();
        median
            .data_mut()
            .fill(product.median_threshold.unwrap_or(f64::NAN));
        write_geotiff(
            &median,
            self.derived_dir.join("water_threshold_median.tif"),
            &GeoTiffOptions::with_nodata(f64::NAN),
        )?;
        write_geotiff_u8(
            &product.permanent,
            self.derived_dir.join("permanent_water_mask.tif"),
            &opts,
        )?;
        Ok(())
    }

    fn overflow(&mut self, date: NaiveDate, mask: &Raster<u8>) -> hydrospan_core::Result<()> {
        let path = self
            .overflow_dir
            .join(format!("overflow_mask_{}.tif", date));
        write_geotiff_u8(mask, &path, &GeoTiffOptions::default())
    }
}

// ─── Entry point ────────────────────────────────────────────────────────

fn run_pipeline(input: &Path, output: &Path, params: PipelineParams) -> Result<()> {
    let pb = spinner("Reading frame stack...");
    let frames = read_frame_stack(input)
        .with_context(|| format!("Failed to read frames from {}", input.display()))?;
    pb.finish_and_clear();
    info!("Loaded {} monthly frames", frames.len());

    let mut sink = DiskSink::create(output)?;
    let start = Instant::now();
    let run = run_water_pipeline(&frames, &params, &mut sink).context("Pipeline run failed")?;
    sink.summary.flush()?;
    let elapsed = start.elapsed();

    println!("Processed {} frames", run.frames);
    if let Some(t) = run.median_threshold {
        println!("  Median threshold: {:.3} dB", t);
    }
    println!("  Permanent water pixels: {}", run.permanent_pixels);
    println!("  Products saved to: {}", output.display());
    println!("  Processing time: {:.2?}", elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            input,
            out_dir,
            threshold_method,
            fixed_threshold,
            quantile,
            global_threshold,
            min_neighbors,
            neighbor_iters,
            min_water_pixels,
            permanent_min_months,
            start,
            end,
            write_overflow_masks,
        } => {
            let method = parse_method(&threshold_method, fixed_threshold, quantile)?;
            let params = PipelineParams {
                classify: ClassifyParams {
                    method,
                    global_threshold: None,
                    min_neighbors,
                    neighbor_iterations: neighbor_iters,
                },
                permanence_threshold: permanent_min_months,
                min_wet_pixels: min_water_pixels,
                start,
                end,
                global_threshold,
                write_overflow_masks,
            };
            run_pipeline(&input, &out_dir, params)?;
        }

        Commands::Info { input } => {
            let pb = spinner("Reading frame stack...");
            let frames = read_frame_stack(&input)
                .with_context(|| format!("Failed to read frames from {}", input.display()))?;
            pb.finish_and_clear();

            let first = &frames[0].samples;
            let (rows, cols) = first.shape();
            let bounds = first.transform().bounds(cols, rows);
            println!("Directory: {}", input.display());
            println!("Frames: {}", frames.len());
            println!(
                "Date span: {} - {}",
                frames[0].date,
                frames[frames.len() - 1].date
            );
            println!("Grid: {} x {} ({} cells)", cols, rows, first.len());
            println!("Cell size: {}", first.transform().cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = first.crs() {
                println!("CRS: {}", crs);
            }

            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            let mut valid = 0usize;
            let mut cells = 0usize;
            for frame in &frames {
                cells += frame.samples.len();
                for &v in frame.samples.data().iter() {
                    if v.is_finite() {
                        min = min.min(v);
                        max = max.max(v);
                        sum += v;
                        valid += 1;
                    }
                }
            }
            println!("\nStatistics (all frames):");
            if valid > 0 {
                println!("  Min: {:.4}", min);
                println!("  Max: {:.4}", max);
                println!("  Mean: {:.4}", sum / valid as f64);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                valid,
                100.0 * valid as f64 / cells as f64
            );
        }
    }

    Ok(())
}
