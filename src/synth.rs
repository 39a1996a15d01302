//! Builds the per-systematic selections and asks the event source for one
//! category histogram per systematic name.

use indexmap::IndexMap;

use crate::category::{category_column, Topology};
use crate::cuts::{mass_cut, tagger_cut, Cut, Region, Thresholds, DEFAULT_LOWER_TAGGER_THRESHOLD};
use crate::engine::{EventSource, HistModel};
use crate::error::Result;
use crate::histogram::Histogram;
use crate::systematics::{RateSystematic, ShapeSystematic, Variation};

/// Category histograms have one bin per topology index, centred on 1 and 2.
const CATEGORY_BINS: usize = 2;
const CATEGORY_MIN: f64 = 0.5;
const CATEGORY_MAX: f64 = 2.5;

/// Event weight column for the nominal and shape-varied histograms.
pub fn nominal_weight_column(coupling: Option<u32>) -> String {
    match coupling {
        Some(coupling) => format!("weightNominalHNL_{coupling}"),
        None => "weightNominal".to_string(),
    }
}

/// Event weight column carrying one rate variation.
pub fn rate_weight_column(coupling: Option<u32>, rate: &RateSystematic, variation: Variation) -> String {
    match coupling {
        Some(coupling) => format!("weightHNL_{coupling}_{}", rate.tag(variation)),
        None => format!("weight_{}", rate.tag(variation)),
    }
}

fn base_name(process: &str, coupling: Option<u32>) -> String {
    match coupling {
        Some(coupling) => format!("{process}_coupling_{coupling}"),
        None => process.to_string(),
    }
}

/// Fills the category histogram for events passing `cut` and the
/// region-dependent mass and tagger selection of their topology.
pub fn make_hist<S: EventSource>(
    source: &S,
    category_variable: &str,
    thresholds: &Thresholds,
    weight: &str,
    cut: Cut,
    region: Region,
    syst: ShapeSystematic,
) -> Result<Histogram> {
    let mut topologies = Vec::with_capacity(Topology::ALL.len());
    for topology in Topology::ALL {
        let limits = topology.thresholds(thresholds);
        topologies.push(Cut::And(vec![
            Cut::Equal(category_variable.to_string(), topology.index() as f64),
            mass_cut(limits.delta_m, region, syst),
            tagger_cut(limits.tagger, DEFAULT_LOWER_TAGGER_THRESHOLD, region, syst)?,
        ]));
    }
    let cut = cut.and(Cut::Or(topologies));
    tracing::debug!(%syst, category_variable, weight, %cut, "synthesising histogram");

    let model = HistModel::new(category_variable, CATEGORY_BINS, CATEGORY_MIN, CATEGORY_MAX);
    source.histo1d(&model, category_variable, weight, &cut)
}

/// Makes every rate- and shape-varied histogram of one process.
///
/// `coupling` is set for the signal family, whose names and weights are
/// qualified by the coupling index. Rate variations only swap the weight;
/// shape variations reselect events through the varied columns.
pub fn make_hists<S: EventSource>(
    source: &S,
    shapes: &[ShapeSystematic],
    rates: &[RateSystematic],
    selection: &str,
    thresholds: &Thresholds,
    region: Region,
    coupling: Option<u32>,
) -> Result<IndexMap<String, Histogram>> {
    let mut hists = IndexMap::new();
    let base = base_name(source.name(), coupling);
    let nominal = ShapeSystematic::Nominal;

    for rate in rates {
        for variation in Variation::BOTH {
            let name = format!("{base}_{}", rate.tag(variation));
            let weight = rate_weight_column(coupling, rate, variation);
            let hist = make_hist(
                source,
                &category_column(nominal),
                thresholds,
                &weight,
                Cut::Selection(selection.to_string()),
                region,
                nominal,
            )?;
            hists.insert(name, hist);
        }
    }

    for &syst in shapes {
        let name = if syst.is_nominal() {
            base.clone()
        } else {
            format!("{base}_{syst}")
        };
        let hist = make_hist(
            source,
            &category_column(syst),
            thresholds,
            &nominal_weight_column(coupling),
            Cut::Selection(syst.rewrite_expression(selection)),
            region,
            syst,
        )?;
        hists.insert(name, hist);
    }

    Ok(hists)
}
