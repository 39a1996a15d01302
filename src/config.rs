//! Analysis configuration: sample lists, category selections and the
//! optimised per-year tagger thresholds.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::cuts::Thresholds;
use crate::error::{Error, Result};

pub const SAMPLES_FILE: &str = "samples.yml";
pub const CATEGORIES_FILE: &str = "categories_2l.json";

pub fn thresholds_file(year: &str) -> String {
    format!("coordsBestThresholds_{year}.json")
}

/// Sample name to the datasets it is built from.
pub type SampleList = IndexMap<String, Vec<String>>;

#[derive(Clone, Debug, Deserialize)]
pub struct CategoryDefinition {
    /// Event selection in SQL expression syntax over nominal columns.
    pub varexp: String,
}

#[derive(Debug)]
pub struct AnalysisConfig {
    samples_path: PathBuf,
    categories_path: PathBuf,
    thresholds_path: PathBuf,
    samples: HashMap<String, HashMap<u32, SampleList>>,
    categories: HashMap<String, CategoryDefinition>,
    thresholds: HashMap<String, Thresholds>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

impl AnalysisConfig {
    pub fn load(config_dir: &Path, year: &str) -> Result<Self> {
        let samples_path = config_dir.join(SAMPLES_FILE);
        let categories_path = config_dir.join(CATEGORIES_FILE);
        let thresholds_path = config_dir.join(thresholds_file(year));
        let samples = serde_yaml::from_reader(BufReader::new(File::open(&samples_path)?))?;
        let categories = read_json(&categories_path)?;
        let thresholds = read_json(&thresholds_path)?;
        tracing::debug!(config_dir = %config_dir.display(), year, "loaded configuration");
        Ok(Self {
            samples_path,
            categories_path,
            thresholds_path,
            samples,
            categories,
            thresholds,
        })
    }

    /// Samples making up `process` in `year`.
    pub fn samples(&self, process: &str, year: &str) -> Result<&SampleList> {
        let missing = |key: &str| Error::missing(self.samples_path.display().to_string(), key);
        let years = self.samples.get(process).ok_or_else(|| missing(process))?;
        let year_key: u32 = year
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("year must be numeric, got {year}")))?;
        years
            .get(&year_key)
            .ok_or_else(|| missing(&format!("{process}.{year}")))
    }

    pub fn selection(&self, category: &str) -> Result<&str> {
        self.categories
            .get(category)
            .map(|definition| definition.varexp.as_str())
            .ok_or_else(|| Error::missing(self.categories_path.display().to_string(), category))
    }

    pub fn thresholds(&self, category: &str) -> Result<&Thresholds> {
        self.thresholds
            .get(category)
            .ok_or_else(|| Error::missing(self.thresholds_path.display().to_string(), category))
    }
}
