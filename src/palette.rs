use std::path::Path;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::errors::{PetSegError, Result};

/// One entry of the color table: a human-readable label and its mask color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub label: String,
    pub color: [u8; 3],
}

impl ClassInfo {
    pub fn new(label: &str, color: [u8; 3]) -> Self {
        Self {
            label: label.to_string(),
            color,
        }
    }
}

/// Class index → color/label lookup table.
///
/// Built once at startup and shared read-only. Index 0 is always the
/// background class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    classes: Vec<ClassInfo>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::pets()
    }
}

impl Palette {
    pub fn new(classes: Vec<ClassInfo>) -> Result<Self> {
        if classes.is_empty() {
            return Err(PetSegError::Configuration {
                message: "color table must contain at least the background class".to_string(),
            });
        }
        if classes.len() > usize::from(u8::MAX) + 1 {
            return Err(PetSegError::Configuration {
                message: format!("color table has {} entries, at most 256 are supported", classes.len()),
            });
        }
        Ok(Self { classes })
    }

    /// background / dog / cat
    pub fn pets() -> Self {
        Self {
            classes: vec![
                ClassInfo::new("background", [0, 0, 0]),
                ClassInfo::new("dog", [255, 0, 0]),
                ClassInfo::new("cat", [0, 255, 0]),
            ],
        }
    }

    /// Reads a JSON array of `{"label": .., "color": [r, g, b]}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PetSegError::FileSystem {
            path: path.to_path_buf(),
            operation: "palette read".to_string(),
            source: e,
        })?;
        let classes: Vec<ClassInfo> =
            serde_json::from_str(&raw).map_err(|e| PetSegError::Configuration {
                message: format!("invalid palette {}: {e}", path.display()),
            })?;
        Self::new(classes)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    pub fn get(&self, index: u8) -> Option<&ClassInfo> {
        self.classes.get(usize::from(index))
    }

    pub fn color(&self, index: u8) -> Result<Rgb<u8>> {
        self.get(index)
            .map(|class| Rgb(class.color))
            .ok_or(PetSegError::UnknownClassIndex {
                index,
                table_len: self.classes.len(),
            })
    }

    pub fn label(&self, index: u8) -> &str {
        self.get(index).map_or("unknown", |class| class.label.as_str())
    }

    /// Fails fast when the model's class count and the table disagree.
    pub fn ensure_matches(&self, num_classes: usize) -> Result<()> {
        if self.classes.len() != num_classes {
            return Err(PetSegError::Configuration {
                message: format!(
                    "color table has {} entries but the model predicts {} classes",
                    self.classes.len(),
                    num_classes
                ),
            });
        }
        Ok(())
    }
}
