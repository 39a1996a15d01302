//! Merged/resolved categorisation from the lepton-jet angular separation.

use indexmap::IndexMap;
use polars::prelude::*;

use crate::cuts::{Thresholds, TopologyThresholds};
use crate::systematics::ShapeSystematic;

/// Below this `dR(l2, j)` the subleading lepton sits inside the jet.
pub const MERGED_MAX_DR: f64 = 0.4;
/// Upper edge of the resolved band.
pub const RESOLVED_MAX_DR: f64 = 1.3;

/// Ordered mapping from category index to the bin label written out.
pub type CategoryMap = IndexMap<i32, String>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    Merged,
    Resolved,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::Merged, Topology::Resolved];

    /// Value of the category index column for this topology.
    pub fn index(&self) -> i32 {
        match self {
            Topology::Merged => 1,
            Topology::Resolved => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Topology::Merged => "ql",
            Topology::Resolved => "q",
        }
    }

    pub fn thresholds(&self, thresholds: &Thresholds) -> TopologyThresholds {
        match self {
            Topology::Merged => thresholds.merged,
            Topology::Resolved => thresholds.resolved,
        }
    }
}

/// The dilepton categories in output bin order.
pub fn dilepton_categories() -> CategoryMap {
    Topology::ALL
        .iter()
        .map(|topology| (topology.index(), topology.label().to_string()))
        .collect()
}

/// Name of the derived category index column for `syst`.
pub fn category_column(syst: ShapeSystematic) -> String {
    syst.column("category_nominal_index")
}

/// Name of the derived compound tagger score column for `syst`.
pub fn tagger_score_column(syst: ShapeSystematic) -> String {
    syst.column("tagger_score_nominal")
}

fn delta_r(syst: ShapeSystematic) -> Expr {
    col(&syst.column("nominal_dR_l2j"))
}

fn merged_band(syst: ShapeSystematic) -> Expr {
    delta_r(syst).lt(lit(MERGED_MAX_DR))
}

fn resolved_band(syst: ShapeSystematic) -> Expr {
    delta_r(syst)
        .gt_eq(lit(MERGED_MAX_DR))
        .and(delta_r(syst).lt(lit(RESOLVED_MAX_DR)))
}

/// 1 for merged, 2 for resolved, 0 otherwise (including missing or NaN separations).
pub fn category_index(syst: ShapeSystematic) -> Expr {
    when(merged_band(syst))
        .then(lit(Topology::Merged.index() as f64))
        .when(resolved_band(syst))
        .then(lit(Topology::Resolved.index() as f64))
        .otherwise(lit(0.0))
}

/// Tagger score blending the resolved, merged-muon and merged-electron sub-scores.
///
/// The band and flavour flags are 0/1 and mutually exclusive, so exactly one
/// term contributes per event.
pub fn tagger_score(syst: ShapeSystematic) -> Expr {
    let sub_score = |name: &str| col(&syst.column(&format!("hnlJet_nominal_llpdnnx_ratio_{name}")));
    let flag = |expr: Expr| expr.cast(DataType::Float64);

    flag(resolved_band(syst)) * sub_score("LLP_Q")
        + flag(merged_band(syst)) * sub_score("LLP_QMU") * flag(col("subleadingLeptons_isMuon"))
        + flag(merged_band(syst)) * sub_score("LLP_QE") * flag(col("subleadingLeptons_isElectron"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn evaluate(df: DataFrame, expr: Expr) -> Vec<f64> {
        let out = df.lazy().select([expr.alias("out")]).collect().unwrap();
        out.column("out")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn category_index_is_always_0_1_or_2() {
        let df = df![
            "nominal_dR_l2j" => [-1.0, 0.0, 0.39, 0.4, 1.0, 1.299, 1.3, 5.0, f64::NAN, f64::INFINITY],
        ]
        .unwrap();
        let index = evaluate(df, category_index(ShapeSystematic::Nominal));
        assert_eq!(index, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_separation_is_category_0() {
        let df = df!["nominal_dR_l2j" => [Some(0.1), None]].unwrap();
        let index = evaluate(df, category_index(ShapeSystematic::Nominal));
        assert_eq!(index, vec![1.0, 0.0]);
    }

    #[test]
    fn category_index_reads_the_varied_separation() {
        let df = df![
            "nominal_dR_l2j" => [0.1],
            "jerUp_dR_l2j" => [1.0],
        ]
        .unwrap();
        let index = evaluate(df, category_index(ShapeSystematic::JerUp));
        assert_eq!(index, vec![2.0]);
    }

    #[test]
    fn tagger_score_picks_one_sub_score() {
        let df = df![
            "nominal_dR_l2j" => [0.1, 0.1, 0.8, 2.0],
            "hnlJet_nominal_llpdnnx_ratio_LLP_Q" => [0.11, 0.12, 0.13, 0.14],
            "hnlJet_nominal_llpdnnx_ratio_LLP_QMU" => [0.21, 0.22, 0.23, 0.24],
            "hnlJet_nominal_llpdnnx_ratio_LLP_QE" => [0.31, 0.32, 0.33, 0.34],
            "subleadingLeptons_isMuon" => [true, false, true, true],
            "subleadingLeptons_isElectron" => [false, true, false, false],
        ]
        .unwrap();
        let score = evaluate(df, tagger_score(ShapeSystematic::Nominal));
        let expected = [0.21, 0.32, 0.13, 0.0];
        for (got, want) in score.iter().zip(expected) {
            assert_relative_eq!(*got, want);
        }
    }

    #[test]
    fn categories_are_ordered_merged_then_resolved() {
        let categories = dilepton_categories();
        let entries: Vec<_> = categories.iter().map(|(k, v)| (*k, v.as_str())).collect();
        assert_eq!(entries, vec![(1, "ql"), (2, "q")]);
    }
}
