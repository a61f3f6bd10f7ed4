//! FER-2013 facial expression dataset.
//!
//! The dataset ships as one CSV file with the columns `emotion`, `pixels`
//! and `Usage`. Pixels are 48x48 grayscale values separated by spaces.

use super::sample::ImagePayload;
use super::store::{ConcatStore, SampleStore};
use crate::error::{MachineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FER_IMAGE_WIDTH: usize = 48;
pub const FER_IMAGE_HEIGHT: usize = 48;

/// Emotion classes in label-index order.
pub const FER_CLASSES: [&str; 7] = [
    "angry", "disgust", "fear", "happy", "sad", "surprise", "neutral",
];

/// Subsets of FER-2013, keyed by the `Usage` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FerSplit {
    Train,
    Validation,
    Test,
}

impl FerSplit {
    pub const ALL: [FerSplit; 3] = [FerSplit::Train, FerSplit::Validation, FerSplit::Test];

    /// Split named by a `Usage` value, or `None` for an unknown one.
    pub fn from_usage(usage: &str) -> Option<Self> {
        match usage.trim() {
            "Training" => Some(FerSplit::Train),
            "PrivateTest" => Some(FerSplit::Validation),
            "PublicTest" => Some(FerSplit::Test),
            _ => None,
        }
    }
}

/// One split of FER-2013, fully parsed into memory.
pub struct Fer2013Store {
    path: PathBuf,
    rows: Vec<(Vec<u8>, usize)>,
}

impl Fer2013Store {
    /// Parse the rows of `path` belonging to `split`.
    pub fn open(path: impl AsRef<Path>, split: FerSplit) -> Result<Self> {
        let path = path.as_ref();
        let rows = read_rows(path)?;
        Ok(Self::from_rows(path, split, rows))
    }

    /// All splits concatenated in train, validation, test order.
    ///
    /// The file is read and parsed once, then partitioned by split.
    pub fn open_all(path: impl AsRef<Path>) -> Result<ConcatStore> {
        let path = path.as_ref();
        let mut rows = read_rows(path)?;
        let mut parts: Vec<Box<dyn SampleStore>> = Vec::with_capacity(FerSplit::ALL.len());
        for split in FerSplit::ALL {
            let (matching, rest): (Vec<FerRow>, Vec<FerRow>) =
                rows.into_iter().partition(|row| row.0 == split);
            rows = rest;
            parts.push(Box::new(Self::from_rows(path, split, matching)));
        }
        Ok(ConcatStore::new(parts))
    }

    fn from_rows(path: &Path, split: FerSplit, rows: Vec<FerRow>) -> Self {
        let rows: Vec<(Vec<u8>, usize)> = rows
            .into_iter()
            .filter(|row| row.0 == split)
            .map(|(_, pixels, label)| (pixels, label))
            .collect();
        info!(
            "Loaded {} FER-2013 {:?} samples from {}",
            rows.len(),
            split,
            path.display()
        );
        Self {
            path: path.to_path_buf(),
            rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleStore for Fer2013Store {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Result<(ImagePayload, usize)> {
        let (pixels, label) = self.rows.get(index).ok_or_else(|| {
            MachineError::store(format!(
                "no FER-2013 row {} in {}",
                index,
                self.path.display()
            ))
        })?;
        let image = ImagePayload::grayscale(FER_IMAGE_WIDTH, FER_IMAGE_HEIGHT, pixels.clone())?;
        Ok((image, *label))
    }
}

/// One parsed CSV row: split, pixels, label.
type FerRow = (FerSplit, Vec<u8>, usize);

fn read_rows(path: &Path) -> Result<Vec<FerRow>> {
    let contents = fs::read_to_string(path).map_err(|e| MachineError::io_with_path(e, path))?;
    parse_rows(path, &contents)
}

fn parse_rows(path: &Path, contents: &str) -> Result<Vec<FerRow>> {
    let mut lines = contents.lines().enumerate();
    let header = match lines.next() {
        Some((_, line)) => line,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let column = |name: &str| {
        columns.iter().position(|c| *c == name).ok_or_else(|| {
            MachineError::store(format!("{} has no '{}' column", path.display(), name))
        })
    };
    let emotion_col = column("emotion")?;
    let pixels_col = column("pixels")?;
    let usage_col = column("Usage")?;

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let field = |col: usize| {
            fields.get(col).copied().ok_or_else(|| {
                MachineError::store(format!(
                    "{}:{}: expected {} columns",
                    path.display(),
                    line_no + 1,
                    columns.len()
                ))
            })
        };
        let usage = field(usage_col)?;
        let split = FerSplit::from_usage(usage).ok_or_else(|| {
            MachineError::store(format!(
                "{}:{}: unknown Usage '{}'",
                path.display(),
                line_no + 1,
                usage.trim()
            ))
        })?;
        let label: usize = field(emotion_col)?.trim().parse().map_err(|_| {
            MachineError::store(format!("{}:{}: invalid emotion", path.display(), line_no + 1))
        })?;
        let pixels = field(pixels_col)?
            .split_whitespace()
            .map(str::parse::<u8>)
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| {
                MachineError::store(format!("{}:{}: invalid pixel", path.display(), line_no + 1))
            })?;
        if pixels.len() != FER_IMAGE_WIDTH * FER_IMAGE_HEIGHT {
            return Err(MachineError::store(format!(
                "{}:{}: expected {} pixels, got {}",
                path.display(),
                line_no + 1,
                FER_IMAGE_WIDTH * FER_IMAGE_HEIGHT,
                pixels.len()
            )));
        }
        rows.push((split, pixels, label));
    }
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn write_fixture_csv(path: &Path, rows: &[(usize, u8, &str)]) {
    let mut csv = String::from("emotion,pixels,Usage\n");
    for (label, level, usage) in rows {
        let pixels = vec![level.to_string(); FER_IMAGE_WIDTH * FER_IMAGE_HEIGHT].join(" ");
        csv.push_str(&format!("{},{},{}\n", label, pixels, usage));
    }
    fs::write(path, csv).unwrap();
}
