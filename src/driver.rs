//! Runs one (process, category, region, year) job end to end.

use std::path::PathBuf;

use indicatif::ProgressIterator;
use polars::prelude::*;

use crate::category::{category_column, category_index, dilepton_categories, tagger_score, tagger_score_column};
use crate::config::AnalysisConfig;
use crate::cuts::{Region, Thresholds};
use crate::engine::{EventSource, Process, Sample};
use crate::error::Result;
use crate::output::{write_hist, Directory, OutputFile};
use crate::synth::{make_hists, nominal_weight_column, rate_weight_column};
use crate::systematics::{RateSystematic, ShapeSystematic, Variation};

/// Couplings processed when none are given on the command line.
pub const DEFAULT_COUPLINGS: [u32; 5] = [2, 7, 12, 47, 52];
/// Largest coupling index of the signal grid.
pub const MAX_COUPLING: u32 = 67;
/// Name of the signal-family process.
pub const SIGNAL_PROCESS: &str = "HNL";
/// Histogram name used for collision data.
pub const DATA_NAME: &str = "data";

pub fn is_signal(process: &str) -> bool {
    process.contains(SIGNAL_PROCESS)
}

/// Steps through the coupling grid.
///
/// The signal family yields every allowed coupling in `2..=MAX_COUPLING` in
/// ascending order; any other process yields a single `None` and stops.
#[derive(Clone, Debug)]
pub struct CouplingSchedule {
    counter: u32,
    signal: bool,
    allowed: Vec<u32>,
}

impl CouplingSchedule {
    pub fn new(signal: bool, allowed: &[u32]) -> Self {
        Self {
            counter: 1,
            signal,
            allowed: allowed.to_vec(),
        }
    }
}

impl Iterator for CouplingSchedule {
    type Item = Option<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.counter < MAX_COUPLING {
            if !self.signal {
                self.counter = MAX_COUPLING + 1;
                return Some(None);
            }
            self.counter += 1;
            if self.allowed.contains(&self.counter) {
                return Some(Some(self.counter));
            }
        }
        None
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub year: String,
    pub process: String,
    pub category: String,
    pub region: Region,
    pub ntuple_path: PathBuf,
    pub output_path: PathBuf,
    pub config_dir: PathBuf,
    pub is_data: bool,
    pub one_file: bool,
    pub couplings: Vec<u32>,
}

impl RunOptions {
    pub fn is_mc(&self) -> bool {
        !self.is_data
    }

    pub fn is_signal(&self) -> bool {
        is_signal(&self.process)
    }

    /// Directory of the output file holding this job's histograms.
    pub fn directory_name(&self) -> String {
        format!("{}_{}", self.category, self.region)
    }

    pub fn output_file(&self) -> PathBuf {
        self.output_path.join(format!(
            "{}_{}_{}_{}.json",
            self.process, self.category, self.region, self.year
        ))
    }

    fn schedule(&self) -> CouplingSchedule {
        CouplingSchedule::new(self.is_signal(), &self.couplings)
    }
}

/// Loads every sample of the job's process from `{ntuple_path}/{year}`.
pub fn build_process(options: &RunOptions, config: &AnalysisConfig) -> Result<Process> {
    let ntuple_path = options.ntuple_path.join(&options.year);
    if options.is_signal() {
        let dataset = format!("{}-{}", options.process, options.year);
        let sample = Sample::new(&options.process, &ntuple_path, &[dataset], false)?;
        return Process::from_samples(SIGNAL_PROCESS, &[sample]);
    }
    let samples = config
        .samples(&options.process, &options.year)?
        .iter()
        .map(|(name, datasets)| Sample::new(name, &ntuple_path, datasets, options.one_file))
        .collect::<Result<Vec<_>>>()?;
    Process::from_samples(&options.process, &samples)
}

fn rate_weight(coupling: Option<u32>, rate: &RateSystematic, variation: Variation) -> Expr {
    col(&nominal_weight_column(coupling)) / col(&rate.nominal_column())
        * col(&rate.varied_column(variation))
}

/// Registers the rate-varied weights (MC only) and the category and tagger
/// score columns of every systematic the job needs.
pub fn define_columns<S: EventSource>(source: &mut S, is_mc: bool, signal_couplings: Option<&[u32]>) {
    if !is_mc {
        let nominal = ShapeSystematic::Nominal;
        source.define(&category_column(nominal), category_index(nominal));
        source.define(&tagger_score_column(nominal), tagger_score(nominal));
        return;
    }

    let couplings: Vec<Option<u32>> = match signal_couplings {
        Some(couplings) => couplings.iter().copied().map(Some).collect(),
        None => vec![None],
    };
    for rate in &RateSystematic::ALL {
        for variation in Variation::BOTH {
            for &coupling in &couplings {
                source.define(
                    &rate_weight_column(coupling, rate, variation),
                    rate_weight(coupling, rate, variation),
                );
            }
        }
    }
    for syst in ShapeSystematic::ALL {
        source.define(&category_column(syst), category_index(syst));
        source.define(&tagger_score_column(syst), tagger_score(syst));
    }
}

/// Synthesises and writes every histogram of the job into `dir`.
/// Returns the number of histograms written.
pub fn write_all<S: EventSource>(
    source: &S,
    dir: &mut Directory,
    options: &RunOptions,
    selection: &str,
    thresholds: &Thresholds,
) -> Result<usize> {
    let categories = dilepton_categories();
    let steps = options.schedule().count() as u64;
    let mut written = 0;
    for coupling in options.schedule().progress_count(steps) {
        if options.is_mc() {
            let hists = make_hists(
                source,
                &ShapeSystematic::ALL,
                &RateSystematic::ALL,
                selection,
                thresholds,
                options.region,
                coupling,
            )?;
            for (name, hist) in &hists {
                write_hist(dir, hist, &categories, name, true)?;
                written += 1;
            }
        } else {
            let hists = make_hists(
                source,
                &[ShapeSystematic::Nominal],
                &[],
                selection,
                thresholds,
                options.region,
                coupling,
            )?;
            for hist in hists.values() {
                write_hist(dir, hist, &categories, DATA_NAME, false)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Runs the job and returns the path of the output file.
pub fn run(options: &RunOptions) -> Result<PathBuf> {
    tracing::info!(
        process = %options.process,
        category = %options.category,
        region = %options.region,
        year = %options.year,
        data = options.is_data,
        "making histograms"
    );
    let config = AnalysisConfig::load(&options.config_dir, &options.year)?;
    let selection = config.selection(&options.category)?;
    let thresholds = config.thresholds(&options.category)?;
    tracing::info!(category = %options.category, selection, "category selection");

    let mut process = build_process(options, &config)?;
    let signal_couplings = options.is_signal().then_some(options.couplings.as_slice());
    define_columns(&mut process, options.is_mc(), signal_couplings);

    let path = options.output_file();
    let mut file = OutputFile::create(&path)?;
    let dir = file.mkdir(&options.directory_name());
    let written = write_all(&process, dir, options, selection, thresholds)?;
    tracing::info!(histograms = written, "done");
    file.close()?;
    Ok(path)
}
