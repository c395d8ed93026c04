use std::collections::BTreeMap;

use serde::Serialize;

use crate::mask::ClassIndexGrid;
use crate::palette::Palette;

pub const BACKGROUND_LABEL: &str = "background";

/// Per-class pixel statistics of a class grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCoverage {
    /// Pixel count per observed class.
    pub counts: BTreeMap<u8, u64>,
    /// `floor(count * 100 / total)` per observed class.
    pub percentages: BTreeMap<u8, u32>,
    pub total_pixels: u64,
    /// Most frequent non-background class, if any.
    pub dominant: Option<u8>,
}

impl ClassCoverage {
    pub fn dominant_label<'a>(&self, palette: &'a Palette) -> &'a str {
        match self.dominant {
            Some(index) => palette.label(index),
            None => BACKGROUND_LABEL,
        }
    }

    pub fn detected(&self) -> impl Iterator<Item = u8> + '_ {
        self.counts.keys().copied()
    }
}

pub fn summarize(grid: &ClassIndexGrid) -> ClassCoverage {
    let mut counts = BTreeMap::new();
    for index in grid.iter() {
        *counts.entry(index).or_insert(0u64) += 1;
    }

    let total_pixels = grid.pixel_count() as u64;
    let percentages = counts
        .iter()
        .map(|(&index, &count)| (index, (count * 100 / total_pixels.max(1)) as u32))
        .collect();

    // ascending keys + strict comparison keeps the lowest index on ties
    let mut dominant: Option<(u8, u64)> = None;
    for (&index, &count) in counts.iter().filter(|(index, _)| **index != 0) {
        if dominant.map_or(true, |(_, best)| count > best) {
            dominant = Some((index, count));
        }
    }

    ClassCoverage {
        counts,
        percentages,
        total_pixels,
        dominant: dominant.map(|(index, _)| index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};

    #[test]
    fn test_background_is_excluded_from_dominance() {
        let mut data = Array2::<u8>::zeros((10, 10));
        data.slice_mut(s![3..5, 6..8]).fill(1);
        let grid = ClassIndexGrid::new(data);

        let coverage = summarize(&grid);
        assert_eq!(coverage.percentages.get(&0), Some(&96));
        assert_eq!(coverage.percentages.get(&1), Some(&4));
        assert_eq!(coverage.dominant, Some(1));
        assert_eq!(coverage.dominant_label(&Palette::pets()), "dog");
    }

    #[test]
    fn test_background_only() {
        let grid = ClassIndexGrid::filled(7, 3, 0);
        let coverage = summarize(&grid);

        assert_eq!(coverage.percentages.len(), 1);
        assert_eq!(coverage.percentages[&0], 100);
        assert_eq!(coverage.dominant, None);
        assert_eq!(coverage.dominant_label(&Palette::pets()), "background");
    }

    #[test]
    fn test_percentages_truncate() {
        // 1/3 each
        let grid = ClassIndexGrid::from_rows(&[&[0, 1, 2]]).unwrap();
        let coverage = summarize(&grid);

        assert_eq!(coverage.percentages.values().copied().collect::<Vec<_>>(), vec![33, 33, 33]);
        assert!(coverage.percentages.values().sum::<u32>() <= 100);
        assert_eq!(coverage.dominant, Some(1));
        assert_eq!(coverage.detected().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dominant_prefers_larger_count() {
        let grid = ClassIndexGrid::from_rows(&[&[2, 2, 1], &[0, 0, 0]]).unwrap();
        let coverage = summarize(&grid);
        assert_eq!(coverage.dominant, Some(2));
        assert_eq!(coverage.dominant_label(&Palette::pets()), "cat");
    }

    #[test]
    fn test_empty_grid() {
        let grid = ClassIndexGrid::filled(0, 0, 0);
        let coverage = summarize(&grid);
        assert!(coverage.counts.is_empty());
        assert_eq!(coverage.dominant, None);
    }
}
