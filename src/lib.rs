//! Category histograms for the displaced heavy neutral lepton search.
//!
//! Events are split into merged and resolved topologies, selected per ABCD
//! region, and histogrammed once per systematic variation. The resulting
//! two-bin histograms are written into one output file per job.

pub mod category;
pub mod config;
pub mod cuts;
pub mod driver;
pub mod engine;
pub mod error;
pub mod histogram;
pub mod output;
pub mod sanitize;
pub mod synth;
pub mod systematics;

pub use error::{Error, Result};
