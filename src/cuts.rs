//! Region-dependent mass-window and tagger-score selections.
//!
//! The four regions of the ABCD background estimate split events by whether
//! the `llj` mass falls inside the W window and whether the tagger score passes
//! the signal threshold:
//!
//! | region | mass window | tagger score          |
//! |--------|-------------|-----------------------|
//! | A      | inside      | between the thresholds |
//! | B      | outside     | between the thresholds |
//! | C      | outside     | above the threshold    |
//! | D      | inside      | above the threshold    |

use std::fmt::Display;
use std::str::FromStr;

use polars::prelude::*;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::systematics::ShapeSystematic;

/// W boson mass in GeV, the centre of the mass window.
pub const W_MASS: f64 = 80.0;
/// Lower edge of the tagger-score sideband used in regions A and B.
pub const DEFAULT_LOWER_TAGGER_THRESHOLD: f64 = 0.25;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Region {
    A,
    B,
    C,
    D,
}

impl Region {
    fn inside_mass_window(&self) -> bool {
        matches!(self, Region::A | Region::D)
    }

    fn tagger_sideband(&self) -> bool {
        matches!(self, Region::A | Region::B)
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::A => "A",
            Region::B => "B",
            Region::C => "C",
            Region::D => "D",
        };
        f.write_str(name)
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Region::A),
            "B" => Ok(Region::B),
            "C" => Ok(Region::C),
            "D" => Ok(Region::D),
            _ => Err(Error::InvalidArgument(format!("Invalid region {s} selected"))),
        }
    }
}

/// Tagger threshold and mass half-window for one topology.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct TopologyThresholds {
    pub tagger: f64,
    pub delta_m: f64,
}

/// Per-category thresholds, read from `[threshold, delta_m]` pairs.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct Thresholds {
    pub merged: TopologyThresholds,
    pub resolved: TopologyThresholds,
}

/// A boolean event selection.
///
/// Generated selections are kept as a tree so they can be rendered for the
/// log and lowered to a polars expression; configured selections are carried
/// as text and parsed on lowering.
#[derive(Clone, Debug, PartialEq)]
pub enum Cut {
    Greater(String, f64),
    Less(String, f64),
    Equal(String, f64),
    And(Vec<Cut>),
    Or(Vec<Cut>),
    Selection(String),
}

impl Cut {
    pub fn and(self, other: Cut) -> Cut {
        match self {
            Cut::And(mut cuts) => {
                cuts.push(other);
                Cut::And(cuts)
            }
            cut => Cut::And(vec![cut, other]),
        }
    }

    /// Lowers the selection to a polars expression.
    pub fn to_expr(&self) -> Result<Expr> {
        Ok(match self {
            Cut::Greater(column, value) => col(column).gt(lit(*value)),
            Cut::Less(column, value) => col(column).lt(lit(*value)),
            Cut::Equal(column, value) => col(column).eq(lit(*value)),
            Cut::And(cuts) => fold(cuts, lit(true), |a, b| a.and(b))?,
            Cut::Or(cuts) => fold(cuts, lit(false), |a, b| a.or(b))?,
            Cut::Selection(text) => polars::sql::sql_expr(text)?,
        })
    }
}

fn fold(cuts: &[Cut], empty: Expr, op: fn(Expr, Expr) -> Expr) -> Result<Expr> {
    let mut exprs = cuts.iter().map(Cut::to_expr);
    match exprs.next() {
        None => Ok(empty),
        Some(first) => exprs.try_fold(first?, |acc, next| Ok(op(acc, next?))),
    }
}

impl Display for Cut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cut::Greater(column, value) => write!(f, "{column}>{value}"),
            Cut::Less(column, value) => write!(f, "{column}<{value}"),
            Cut::Equal(column, value) => write!(f, "{column}=={value}"),
            Cut::And(cuts) => write_joined(f, cuts, " and "),
            Cut::Or(cuts) => write_joined(f, cuts, " or "),
            Cut::Selection(text) => write!(f, "({text})"),
        }
    }
}

fn write_joined(f: &mut std::fmt::Formatter<'_>, cuts: &[Cut], sep: &str) -> std::fmt::Result {
    f.write_str("(")?;
    for (i, cut) in cuts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{cut}")?;
    }
    f.write_str(")")
}

/// Selects events inside (A, D) or outside (B, C) of `[mW - delta_m, mW + delta_m]`.
pub fn mass_cut(delta_m: f64, region: Region, syst: ShapeSystematic) -> Cut {
    let m_upper = W_MASS + delta_m;
    let m_lower = W_MASS - delta_m;
    let mass = syst.column("nominal_m_llj");
    if region.inside_mass_window() {
        Cut::And(vec![
            Cut::Less(mass.clone(), m_upper),
            Cut::Greater(mass, m_lower),
        ])
    } else {
        Cut::Or(vec![
            Cut::Greater(mass.clone(), m_upper),
            Cut::Less(mass, m_lower),
        ])
    }
}

/// Selects the tagger-score band `(lower, threshold)` in A and B, and
/// `score > threshold` in C and D.
pub fn tagger_cut(
    tagger_threshold: f64,
    lower_threshold: f64,
    region: Region,
    syst: ShapeSystematic,
) -> Result<Cut> {
    if tagger_threshold < lower_threshold {
        return Err(Error::InvalidArgument(format!(
            "Inconsistent tagger thresholds: {tagger_threshold} < {lower_threshold}"
        )));
    }
    let score = syst.column("tagger_score_nominal");
    Ok(if region.tagger_sideband() {
        Cut::And(vec![
            Cut::Greater(score.clone(), lower_threshold),
            Cut::Less(score, tagger_threshold),
        ])
    } else {
        Cut::Greater(score, tagger_threshold)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGIONS: [Region; 4] = [Region::A, Region::B, Region::C, Region::D];

    #[test]
    fn mass_window_sides() {
        for region in [Region::B, Region::C] {
            assert_eq!(
                mass_cut(5.0, region, ShapeSystematic::Nominal).to_string(),
                "(nominal_m_llj>85 or nominal_m_llj<75)"
            );
        }
        for region in [Region::A, Region::D] {
            assert_eq!(
                mass_cut(5.0, region, ShapeSystematic::Nominal).to_string(),
                "(nominal_m_llj<85 and nominal_m_llj>75)"
            );
        }
    }

    #[test]
    fn mass_cut_follows_the_systematic() {
        assert_eq!(
            mass_cut(2.5, Region::D, ShapeSystematic::JerUp).to_string(),
            "(jerUp_m_llj<82.5 and jerUp_m_llj>77.5)"
        );
    }

    #[test]
    fn unknown_regions_are_rejected() {
        for name in ["E", "a", "", "AB"] {
            assert!(matches!(name.parse::<Region>(), Err(Error::InvalidArgument(_))));
        }
        for region in REGIONS {
            assert_eq!(region.to_string().parse::<Region>().unwrap(), region);
        }
    }

    #[test]
    fn inverted_tagger_thresholds_fail_in_every_region() {
        for region in REGIONS {
            let res = tagger_cut(0.2, 0.25, region, ShapeSystematic::Nominal);
            assert!(matches!(res, Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn tagger_band_and_bound() {
        for region in [Region::A, Region::B] {
            let cut = tagger_cut(0.9, 0.25, region, ShapeSystematic::Nominal).unwrap();
            assert_eq!(
                cut.to_string(),
                "(tagger_score_nominal>0.25 and tagger_score_nominal<0.9)"
            );
        }
        for region in [Region::C, Region::D] {
            let cut = tagger_cut(0.9, 0.25, region, ShapeSystematic::JesTotalDown).unwrap();
            assert_eq!(cut.to_string(), "tagger_score_jesTotalDown>0.9");
        }
    }

    #[test]
    fn equal_thresholds_are_consistent() {
        assert!(tagger_cut(0.25, 0.25, Region::A, ShapeSystematic::Nominal).is_ok());
    }

    #[test]
    fn and_flattens() {
        let cut = Cut::And(vec![Cut::Greater("a".into(), 1.0)]).and(Cut::Less("b".into(), 2.0));
        assert_eq!(cut.to_string(), "(a>1 and b<2)");
    }

    #[test]
    fn cuts_select_rows() {
        let df = df![
            "nominal_m_llj" => [70.0, 78.0, 83.0, 90.0],
            "tagger_score_nominal" => [0.95, 0.5, 0.99, 0.1],
        ]
        .unwrap();
        let cut = mass_cut(5.0, Region::D, ShapeSystematic::Nominal).and(
            tagger_cut(0.9, 0.25, Region::D, ShapeSystematic::Nominal).unwrap(),
        );
        let selected = df.lazy().filter(cut.to_expr().unwrap()).collect().unwrap();
        assert_eq!(selected.height(), 1);
        let mass = selected.column("nominal_m_llj").unwrap().f64().unwrap();
        assert_eq!(mass.get(0), Some(83.0));
    }

    #[test]
    fn configured_selection_is_parsed() {
        let df = df![
            "nselectedJets_nominal" => [0i32, 1, 2],
            "nominal_dR_l2j" => [0.1, 0.2, 2.0],
        ]
        .unwrap();
        let cut = Cut::Selection("nselectedJets_nominal >= 1 and nominal_dR_l2j < 1.3".into());
        let selected = df.lazy().filter(cut.to_expr().unwrap()).collect().unwrap();
        assert_eq!(selected.height(), 1);
    }

    #[test]
    fn thresholds_deserialize_from_pairs() {
        let thresholds: Thresholds =
            serde_json::from_str(r#"{"merged": [0.9, 5.0], "resolved": [0.8, 10.0]}"#).unwrap();
        assert_eq!(thresholds.merged, TopologyThresholds { tagger: 0.9, delta_m: 5.0 });
        assert_eq!(thresholds.resolved.delta_m, 10.0);
    }
}
