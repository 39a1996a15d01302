//! Fixed-width 1-D histogram with ROOT `TH1D` bin numbering.
//!
//! Bin 0 is the underflow, bins `1..=n_bins` the visible range and
//! `n_bins + 1` the overflow. Errors are stored as sums of squared weights.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub name: String,
    pub title: String,
    pub n_bins: usize,
    pub x_min: f64,
    pub x_max: f64,
    /// Sum of weights per bin, including under/overflow.
    pub content: Vec<f64>,
    /// Sum of squared weights per bin, including under/overflow.
    pub sumw2: Vec<f64>,
    /// Axis labels of the visible bins; empty when unlabelled.
    pub labels: Vec<String>,
    pub entries: f64,
}

impl Histogram {
    pub fn new(name: &str, title: &str, n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        if n_bins == 0 || x_min.is_nan() || x_max.is_nan() || x_max <= x_min {
            return Err(Error::Histogram(format!(
                "invalid axis for {name}: {n_bins} bins over [{x_min}, {x_max})"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            n_bins,
            x_min,
            x_max,
            content: vec![0.0; n_bins + 2],
            sumw2: vec![0.0; n_bins + 2],
            labels: vec![String::new(); n_bins],
            entries: 0.0,
        })
    }

    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Bin holding the value `x`; NaN lands in the overflow.
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.x_min {
            0
        } else if x.is_nan() || x >= self.x_max {
            self.n_bins + 1
        } else {
            let bin = 1 + ((x - self.x_min) / self.bin_width()).floor() as usize;
            bin.min(self.n_bins)
        }
    }

    pub fn fill(&mut self, x: f64, weight: f64) {
        let bin = self.find_bin(x);
        self.content[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1.0;
    }

    fn check_bin(&self, bin: usize) -> Result<()> {
        if bin > self.n_bins + 1 {
            return Err(Error::Histogram(format!(
                "bin {bin} out of range for {} ({} bins)",
                self.name, self.n_bins
            )));
        }
        Ok(())
    }

    pub fn bin_content(&self, bin: usize) -> f64 {
        self.content.get(bin).copied().unwrap_or(0.0)
    }

    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).map_or(0.0, |w2| w2.sqrt())
    }

    /// Sets a bin content. As in ROOT, every call counts as one more entry.
    pub fn set_bin_content(&mut self, bin: usize, content: f64) -> Result<()> {
        self.check_bin(bin)?;
        self.content[bin] = content;
        self.entries += 1.0;
        Ok(())
    }

    pub fn set_bin_error(&mut self, bin: usize, error: f64) -> Result<()> {
        self.check_bin(bin)?;
        self.sumw2[bin] = error * error;
        Ok(())
    }

    pub fn set_bin_label(&mut self, bin: usize, label: &str) -> Result<()> {
        if bin == 0 || bin > self.n_bins {
            return Err(Error::Histogram(format!(
                "cannot label bin {bin} of {} ({} bins)",
                self.name, self.n_bins
            )));
        }
        self.labels[bin - 1] = label.to_string();
        Ok(())
    }

    pub fn bin_label(&self, bin: usize) -> Option<&str> {
        bin.checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Sum of the visible bins.
    pub fn integral(&self) -> f64 {
        self.content[1..=self.n_bins].iter().sum()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}
