use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageFormat, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::BatchConfig;
use crate::errors::{PetSegError, Result};
use crate::pipeline::{OutputMode, Segmenter};
use crate::report::SegmentationResult;
use crate::traits::SegmentationModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Offline counterpart of the HTTP API: segments every image below
/// `input_dir` and mirrors the tree under `output_dir`.
pub struct ImageProcessor<M: SegmentationModel> {
    segmenter: Segmenter<M>,
    config: BatchConfig,
}

impl<M: SegmentationModel> ImageProcessor<M> {
    pub const fn new(segmenter: Segmenter<M>, config: BatchConfig) -> Self {
        Self { segmenter, config }
    }

    pub fn process_directory(&self) -> Result<BatchSummary> {
        let input_path = &self.config.input_dir;
        let output_path = &self.config.output_dir;

        if !input_path.exists() {
            return Err(PetSegError::FileSystem {
                path: input_path.clone(),
                operation: "input directory check".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input directory does not exist",
                ),
            });
        }

        fs::create_dir_all(output_path).map_err(|e| PetSegError::FileSystem {
            path: output_path.clone(),
            operation: "output directory create".to_string(),
            source: e,
        })?;

        let image_files = self.collect_image_files(input_path);
        if image_files.is_empty() {
            tracing::warn!(dir = %input_path.display(), "no images to process");
            return Ok(BatchSummary::default());
        }

        let pb = ProgressBar::new(image_files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
            )
            .map_err(|e| PetSegError::Configuration {
                message: format!("progress template: {e}"),
            })?
            .progress_chars("#>-"),
        );

        let failed = AtomicUsize::new(0);
        image_files.par_iter().for_each(|input_file| {
            if let Err(e) = self.process_single_image(input_file, output_path) {
                failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(path = %input_file.display(), error = %e, "failed to segment image");
            }
            pb.inc(1);
        });
        pb.finish();

        let failed = failed.into_inner();
        let summary = BatchSummary {
            processed: image_files.len() - failed,
            failed,
        };
        tracing::info!(processed = summary.processed, failed = summary.failed, "batch finished");
        Ok(summary)
    }

    fn collect_image_files(&self, input_path: &Path) -> Vec<PathBuf> {
        WalkDir::new(input_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported_image_format(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    pub fn is_supported_image_format(&self, path: &Path) -> bool {
        ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
    }

    fn process_single_image(&self, input_file: &Path, output_dir: &Path) -> Result<()> {
        let bytes = fs::read(input_file).map_err(|e| PetSegError::FileSystem {
            path: input_file.to_path_buf(),
            operation: "image read".to_string(),
            source: e,
        })?;
        let segmentation = self.segmenter.segment_bytes(&bytes, self.config.options())?;

        let target = output_dir.join(self.get_relative_path(input_file)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PetSegError::FileSystem {
                path: parent.to_path_buf(),
                operation: "output directory create".to_string(),
                source: e,
            })?;
        }

        let extension = self.config.format.as_str();
        match self.config.mode {
            OutputMode::Color => {
                self.save(&segmentation.color_mask, &target.with_extension(extension))?;
            }
            OutputMode::Overlay => {
                let overlay = segmentation.overlay.as_ref().unwrap_or(&segmentation.color_mask);
                self.save(overlay, &target.with_extension(extension))?;
            }
            OutputMode::Both => {
                self.save(&segmentation.color_mask, &target.with_extension(format!("mask.{extension}")))?;
                if let Some(overlay) = &segmentation.overlay {
                    self.save(overlay, &target.with_extension(format!("overlay.{extension}")))?;
                }
                let summary = SegmentationResult::from_segmentation(&segmentation, self.segmenter.palette());
                let json_path = target.with_extension("json");
                let json = serde_json::to_vec_pretty(&summary).map_err(|e| PetSegError::Encoding {
                    operation: "summary json".to_string(),
                    source: Box::new(e),
                })?;
                fs::write(&json_path, json).map_err(|e| PetSegError::FileSystem {
                    path: json_path.clone(),
                    operation: "summary write".to_string(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    fn save(&self, image: &RgbImage, path: &Path) -> Result<()> {
        image
            .save_with_format(path, self.config.image_format())
            .map_err(|e| PetSegError::Encoding {
                operation: format!("save {}", path.display()),
                source: Box::new(e),
            })
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        let input_dir = &self.config.input_dir;
        input_file
            .strip_prefix(input_dir)
            .map(|p| p.to_path_buf())
            .map_err(|_| PetSegError::FileSystem {
                path: input_file.to_path_buf(),
                operation: "relative path".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "input file is outside the input directory",
                ),
            })
    }
}
