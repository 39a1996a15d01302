//! Event sources: where derived columns are registered and histograms are filled.

use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::cuts::Cut;
use crate::error::{Error, Result};
use crate::histogram::Histogram;

/// Name, title and fixed binning of a histogram to fill.
#[derive(Clone, Debug, PartialEq)]
pub struct HistModel {
    pub name: String,
    pub title: String,
    pub n_bins: usize,
    pub x_min: f64,
    pub x_max: f64,
}

impl HistModel {
    pub fn new(name: &str, n_bins: usize, x_min: f64, x_max: f64) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            n_bins,
            x_min,
            x_max,
        }
    }
}

pub trait EventSource {
    fn name(&self) -> &str;

    /// Registers a derived column visible to every later selection and histogram.
    fn define(&mut self, name: &str, expr: Expr);

    /// Fills `variable` weighted by the `weight` column for events passing `cut`.
    /// The returned histogram is fully materialised.
    fn histo1d(&self, model: &HistModel, variable: &str, weight: &str, cut: &Cut)
        -> Result<Histogram>;
}

/// One named dataset: the ntuple files it is read from.
#[derive(Clone, Debug)]
pub struct Sample {
    pub name: String,
    pub files: Vec<PathBuf>,
}

impl Sample {
    /// Resolves every entry of `datasets` under `ntuple_path`. An entry naming a
    /// directory contributes all ntuple files inside it, in name order.
    pub fn new(name: &str, ntuple_path: &Path, datasets: &[String], one_file: bool) -> Result<Self> {
        let mut files = Vec::new();
        for dataset in datasets {
            let path = ntuple_path.join(dataset);
            if path.is_dir() {
                let mut found: Vec<PathBuf> = std::fs::read_dir(&path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| NtupleFormat::of(p).is_some())
                    .collect();
                found.sort();
                files.extend(found);
            } else {
                files.push(path);
            }
        }
        if one_file {
            files.truncate(1);
        }
        if files.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "sample {name} has no ntuple files under {}",
                ntuple_path.display()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            files,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NtupleFormat {
    Parquet,
    Csv,
}

impl NtupleFormat {
    fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "parquet" => Some(NtupleFormat::Parquet),
            "csv" => Some(NtupleFormat::Csv),
            _ => None,
        }
    }

    fn scan(path: &Path) -> Result<LazyFrame> {
        match NtupleFormat::of(path) {
            Some(NtupleFormat::Parquet) => {
                Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
            }
            Some(NtupleFormat::Csv) => Ok(LazyCsvReader::new(path).with_has_header(true).finish()?),
            None => Err(Error::InvalidArgument(format!(
                "unsupported ntuple format: {}",
                path.display()
            ))),
        }
    }
}

/// A physics process backed by a polars lazy frame over all its samples.
pub struct Process {
    name: String,
    frame: LazyFrame,
}

impl Process {
    pub fn from_samples(name: &str, samples: &[Sample]) -> Result<Self> {
        let frames = samples
            .iter()
            .flat_map(|sample| sample.files.iter())
            .map(|file| NtupleFormat::scan(file))
            .collect::<Result<Vec<_>>>()?;
        if frames.is_empty() {
            return Err(Error::InvalidArgument(format!("process {name} has no samples")));
        }
        for sample in samples {
            tracing::info!(process = name, sample = %sample.name, files = sample.files.len(), "added sample");
        }
        Ok(Self {
            name: name.to_string(),
            frame: concat(frames, UnionArgs::default())?,
        })
    }

    pub fn from_frame(name: &str, frame: DataFrame) -> Self {
        Self {
            name: name.to_string(),
            frame: frame.lazy(),
        }
    }
}

impl EventSource for Process {
    fn name(&self) -> &str {
        &self.name
    }

    fn define(&mut self, name: &str, expr: Expr) {
        self.frame = self.frame.clone().with_column(expr.alias(name));
    }

    fn histo1d(
        &self,
        model: &HistModel,
        variable: &str,
        weight: &str,
        cut: &Cut,
    ) -> Result<Histogram> {
        let selected = self
            .frame
            .clone()
            .filter(cut.to_expr()?)
            .select([
                col(variable).cast(DataType::Float64).alias("x"),
                col(weight).cast(DataType::Float64).alias("w"),
            ])
            .collect()?;
        let mut hist = Histogram::new(&model.name, &model.title, model.n_bins, model.x_min, model.x_max)?;
        let values = selected.column("x")?.f64()?;
        let weights = selected.column("w")?.f64()?;
        for (x, w) in values.into_iter().zip(weights.into_iter()) {
            if let (Some(x), Some(w)) = (x, w) {
                hist.fill(x, w);
            }
        }
        tracing::debug!(
            process = %self.name,
            histogram = %model.name,
            entries = hist.entries,
            integral = hist.integral(),
            "filled histogram"
        );
        Ok(hist)
    }
}
