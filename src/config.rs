use clap::{Args, Parser, Subcommand};
use image::ImageFormat;
use std::path::PathBuf;
use std::time::Duration;

use crate::mask::{composite::DEFAULT_ALPHA, reduce::DEFAULT_THRESHOLD};
use crate::pipeline::{OutputMode, SegmentOptions};

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub model: ModelConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Serve the segmentation HTTP API
    Serve(ServeConfig),
    /// Segment every image under a directory
    Batch(BatchConfig),
}

#[derive(Args, Clone, Debug)]
pub struct ModelConfig {
    #[arg(short, long, global = true, env = "PETSEG_MODEL_PATH", default_value = "model/pet_segmentation.onnx")]
    pub model_path: PathBuf,

    #[arg(short, long, global = true, default_value_t = 0)]
    pub device_id: i32,

    /// JSON list of `{"label": .., "color": [r, g, b]}`; defaults to background/dog/cat
    #[arg(long, global = true, env = "PETSEG_PALETTE")]
    pub palette: Option<PathBuf>,

    /// Exit instead of serving with `model_loaded = false` when loading fails
    #[arg(long, global = true, default_value_t = false)]
    pub require_model: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ServeConfig {
    #[arg(long, env = "PETSEG_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PETSEG_PORT", default_value_t = 8888)]
    pub port: u16,

    #[arg(long, env = "PETSEG_BODY_LIMIT_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub body_limit_bytes: usize,

    #[arg(long, env = "PETSEG_ARTIFACT_DIR", default_value = "static")]
    pub artifact_dir: PathBuf,

    #[arg(long, default_value_t = 600)]
    pub artifact_max_age_secs: u64,

    /// Base URL used when returning links to saved artifacts
    #[arg(long, env = "PETSEG_PUBLIC_URL", default_value = "http://localhost:8888")]
    pub public_url: String,

    #[arg(long, default_value_t = DEFAULT_ALPHA, value_parser = check_unit_interval)]
    pub default_alpha: f32,
}

impl ServeConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub const fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(self.artifact_max_age_secs)
    }
}

#[derive(Args, Clone, Debug)]
pub struct BatchConfig {
    #[arg(short, long)]
    pub input_dir: PathBuf,

    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    #[arg(long, value_enum, default_value_t = OutputMode::Overlay)]
    pub mode: OutputMode,

    #[arg(long, default_value_t = DEFAULT_ALPHA, value_parser = check_unit_interval)]
    pub alpha: f32,

    #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = check_unit_interval)]
    pub threshold: f32,

    #[arg(short, long, default_value_t = std::thread::available_parallelism().map_or(1, |n| n.get()))]
    pub num_threads: usize,
}

impl BatchConfig {
    pub const fn options(&self) -> SegmentOptions {
        SegmentOptions {
            mode: self.mode,
            alpha: self.alpha,
            threshold: self.threshold,
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        ImageFormat::from_extension(&self.format).unwrap_or(ImageFormat::Png)
    }
}

fn check_format(s: &str) -> Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}

fn check_unit_interval(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{value} is outside [0, 1]"));
    }
    Ok(value)
}
