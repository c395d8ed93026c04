use serde::Serialize;

use crate::errors::{PetSegError, Result};
use crate::mask::ClassIndexGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Run {
    pub class: u8,
    pub len: u32,
}

/// Run-length encoding of a class grid flattened in row-major order.
///
/// The textual form is the space separated run lengths, starting with the
/// first run. Counts alone do not say which class a run belongs to, so the
/// per-run classes travel next to them (`classes_string`), or, for two-class
/// masks, the decoder is given the first class and the alternate class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunLengths {
    runs: Vec<Run>,
}

impl RunLengths {
    pub fn encode(grid: &ClassIndexGrid) -> Self {
        let mut runs: Vec<Run> = Vec::new();
        for class in grid.iter() {
            match runs.last_mut() {
                Some(run) if run.class == class => run.len += 1,
                _ => runs.push(Run { class, len: 1 }),
            }
        }
        Self { runs }
    }

    /// Counts plus the class of every run.
    pub fn parse(counts: &str, classes: &str) -> Result<Self> {
        let lengths = parse_numbers::<u32>("mask_rle", counts)?;
        let classes = parse_numbers::<u8>("mask_rle_classes", classes)?;
        if lengths.len() != classes.len() {
            return Err(PetSegError::validation(
                "mask_rle_classes",
                format!("has {} entries for {} runs", classes.len(), lengths.len()),
            ));
        }
        let runs = lengths
            .into_iter()
            .zip(classes)
            .map(|(len, class)| Run { class, len })
            .collect();
        Ok(Self { runs })
    }

    /// Counts of a two-class mask whose runs alternate between `first` and
    /// `second`. Zero-length runs are accepted, so a leading `0` means the
    /// mask actually starts with `second`.
    pub fn parse_alternating(counts: &str, first: u8, second: u8) -> Result<Self> {
        let runs = parse_numbers::<u32>("mask_rle", counts)?
            .into_iter()
            .enumerate()
            .map(|(i, len)| Run {
                class: if i % 2 == 0 { first } else { second },
                len,
            })
            .collect();
        Ok(Self { runs })
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Class of the first pixel.
    pub fn start_class(&self) -> Option<u8> {
        self.runs.iter().find(|run| run.len > 0).map(|run| run.class)
    }

    pub fn total_len(&self) -> u64 {
        self.runs.iter().map(|run| u64::from(run.len)).sum()
    }

    pub fn counts_string(&self) -> String {
        join(self.runs.iter().map(|run| run.len))
    }

    pub fn classes_string(&self) -> String {
        join(self.runs.iter().map(|run| run.class))
    }

    pub fn decode(&self, width: u32, height: u32) -> Result<ClassIndexGrid> {
        let expected = u64::from(width) * u64::from(height);
        if self.total_len() != expected {
            return Err(PetSegError::validation(
                "mask_rle",
                format!("covers {} pixels, expected {expected}", self.total_len()),
            ));
        }
        let flat = self
            .runs
            .iter()
            .flat_map(|run| std::iter::repeat(run.class).take(run.len as usize))
            .collect();
        ClassIndexGrid::from_flat(width, height, flat)
    }
}

fn parse_numbers<T: std::str::FromStr>(field: &str, text: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| PetSegError::validation(field, format!("invalid number `{token}`")))
        })
        .collect()
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}
