//! Command-line interface
//!
//! `train` runs one k-fold pipeline on a feature file, `models` lists the
//! available pipelines and `info` inspects a feature file.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::features::CsvFeatureProvider;
use crate::training::{CVReport, CrossValEngine, FitOutcome, ModelKind, PipelineConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "oof-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "K-fold trainer with checkpoints and out-of-fold AUC")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run k-fold training for one model family
    Train(TrainArgs),

    /// List available model families and their presets
    Models,

    /// Show feature file information
    Info {
        /// Feature file (CSV with header)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column; prints the class balance when given
        #[arg(short, long)]
        target: Option<String>,
    },
}

/// Arguments of the `train` command
#[derive(Debug, Clone, Args)]
pub struct TrainArgs {
    /// Model family
    #[arg(short, long, value_enum)]
    pub model: ModelKind,

    /// Feature file (CSV with header)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Binary target column
    #[arg(short, long)]
    pub target: String,

    /// Group column for the grouped AUC (e.g. coupon id)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Columns excluded from the features
    #[arg(long, value_delimiter = ',')]
    pub drop: Vec<String>,

    /// JSON pipeline configuration overlaid on the model preset
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Checkpoint directory
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Always retrain, ignoring and not writing checkpoints
    #[arg(long)]
    pub no_checkpoint: bool,

    /// Directory for OOF predictions, diagnostics and the run report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Fold shuffling seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write ROC and importance diagnostics
    #[arg(long)]
    pub plot: bool,
}

impl TrainArgs {
    /// Resolve the pipeline configuration: file or preset, then flag overrides
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let config = PipelineConfig::from_file(path)?;
                if config.model != self.model {
                    anyhow::bail!(
                        "Config file is for model '{}' but '{}' was requested",
                        config.model,
                        self.model
                    );
                }
                config
            }
            None => PipelineConfig::for_model(self.model),
        };

        if let Some(dir) = &self.checkpoint_dir {
            config = config.with_checkpoint_dir(dir);
        }
        if self.no_checkpoint {
            config = config.with_checkpoints(false);
        }
        if let Some(dir) = &self.output {
            config = config.with_output_dir(dir);
        }
        if let Some(folds) = self.folds {
            config = config.with_folds(folds);
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        if self.plot {
            config.features.plot = true;
            config.roc_curve = true;
        }
        Ok(config)
    }

    fn provider(&self) -> CsvFeatureProvider {
        let mut provider =
            CsvFeatureProvider::new(&self.data, &self.target).with_drop_columns(self.drop.clone());
        if let Some(group) = &self.group {
            provider = provider.with_group_column(group);
        }
        provider
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<CVReport> {
    let config = args.pipeline_config()?;

    println!();
    line_box_top();
    line_box_center(&format!("{}", format!("{} k-fold training", config.model.tag().to_uppercase()).white().bold()));
    line_box_sep();
    line_box(&kv("Data       ", &args.data.display().to_string()));
    line_box(&kv("Target     ", &args.target));
    line_box(&kv("CV         ", &format!("{:?}", config.cv)));
    line_box(&kv("Checkpoints", &if config.use_checkpoints {
        config.checkpoint_dir.display().to_string()
    } else {
        "off".to_string()
    }));
    line_box_bottom();

    section("Train");
    step_run(&format!("Running {}", config.model.tag().cyan()));
    let start = Instant::now();
    let engine = CrossValEngine::new(config);
    let report = engine.run(&args.provider())?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_report(&report);
    Ok(report)
}

fn print_report(report: &CVReport) {
    section("Folds");
    println!(
        "  {:<6} {:>8} {:>8} {:>10} {:>10}",
        muted("Fold"), muted("Train"), muted("Valid"), muted("AUC"), muted("Status")
    );
    println!("  {}", dim(&"─".repeat(46)));

    for fold in &report.folds {
        let status = match &fold.outcome {
            FitOutcome::Restored => accent("restored"),
            FitOutcome::Trained(_) => ok("trained"),
        };
        println!(
            "  {:<6} {:>8} {:>8} {:>10.5} {:>10}",
            fold.fold, fold.n_train, fold.n_val, fold.auc, status
        );
    }

    println!("  {}", dim(&"─".repeat(46)));
    println!();
    println!(
        "  {:<16} {} {}",
        muted("Mean AUC"),
        format!("{:.5}", report.summary.mean_score).white().bold(),
        dim(&format!("± {:.5}", report.summary.std_score))
    );
    println!("  {:<16} {}", muted("OOF AUC"), format!("{:.5}", report.oof_auc).white().bold());
    if let Some(grouped) = report.grouped_auc {
        println!("  {:<16} {}", muted("Grouped AUC"), format!("{:.5}", grouped).white().bold());
    }

    if !report.artifacts.is_empty() {
        section("Artifacts");
        for path in &report.artifacts {
            println!("  {}", path.display());
        }
    }
    println!();
}

pub fn cmd_models() -> anyhow::Result<()> {
    section("Models");

    for kind in ModelKind::ALL {
        let config = PipelineConfig::for_model(kind);
        println!("  {:<6} {}", kind.tag().white().bold(), muted(kind.description()));
        println!(
            "  {:<6} {} {}",
            "",
            dim(&format!("{:?}", config.cv)),
            dim(if config.use_checkpoints { "· checkpoints" } else { "" })
        );
    }

    println!();
    Ok(())
}

fn load_frame(path: &Path) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

pub fn cmd_info(data_path: &Path, target: Option<&str>) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_frame(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);

    if let Some(target) = target {
        let labels = df.column(target)?.as_materialized_series().cast(&DataType::Float64)?;
        let labels = labels.f64()?;
        let positives = labels.into_iter().filter(|v| *v == Some(1.0)).count();
        let total = labels.len() - labels.null_count();
        let rate = if total > 0 { positives as f64 / total as f64 } else { 0.0 };
        println!("  {:<12} {} / {} ({:.2}%)", muted("Positives"), positives, total, rate * 100.0);
    }
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        let series = col.as_materialized_series();
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            series.null_count(),
            series.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}
