//! Systematic variations and the column-naming rule each one carries.
//!
//! Columns are always written in their nominal form (`nominal_m_llj`,
//! `tagger_score_nominal`, ...). A shape variation selects its own columns by
//! swapping the `nominal` segment of a column name for its tag, except for the
//! columns it pins back to nominal because upstream never produced them.

use std::fmt::Display;

const NOMINAL_SEGMENT: &str = "nominal";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShapeSystematic {
    Nominal,
    JesTotalUp,
    JesTotalDown,
    JerUp,
    JerDown,
    UnclEnUp,
    UnclEnDown,
}

impl ShapeSystematic {
    pub const ALL: [ShapeSystematic; 7] = [
        ShapeSystematic::Nominal,
        ShapeSystematic::JesTotalUp,
        ShapeSystematic::JesTotalDown,
        ShapeSystematic::JerUp,
        ShapeSystematic::JerDown,
        ShapeSystematic::UnclEnUp,
        ShapeSystematic::UnclEnDown,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ShapeSystematic::Nominal => "nominal",
            ShapeSystematic::JesTotalUp => "jesTotalUp",
            ShapeSystematic::JesTotalDown => "jesTotalDown",
            ShapeSystematic::JerUp => "jerUp",
            ShapeSystematic::JerDown => "jerDown",
            ShapeSystematic::UnclEnUp => "unclEnUp",
            ShapeSystematic::UnclEnDown => "unclEnDown",
        }
    }

    /// Nominal columns this variation keeps unchanged.
    fn pinned_columns(&self) -> &'static [&'static str] {
        match self {
            // the jet multiplicity is not recomputed for unclustered energy shifts
            ShapeSystematic::UnclEnUp | ShapeSystematic::UnclEnDown => &["nselectedJets_nominal"],
            _ => &[],
        }
    }

    pub fn is_nominal(&self) -> bool {
        *self == ShapeSystematic::Nominal
    }

    /// Maps a nominal column name onto the column holding this variation.
    pub fn column(&self, nominal: &str) -> String {
        if self.is_nominal() || self.pinned_columns().contains(&nominal) {
            return nominal.to_string();
        }
        nominal
            .split('_')
            .map(|segment| {
                if segment == NOMINAL_SEGMENT {
                    self.tag()
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Rewrites every identifier of a selection expression with [`Self::column`].
    ///
    /// Only whole identifiers are touched, so literals, operators and names that
    /// merely contain the letters `nominal` (e.g. `weightNominal`) are left alone.
    pub fn rewrite_expression(&self, expression: &str) -> String {
        let mut out = String::with_capacity(expression.len());
        let mut ident = String::new();
        let mut in_number = false;
        for ch in expression.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                if ident.is_empty() && !in_number && ch.is_ascii_digit() {
                    in_number = true;
                }
                if in_number {
                    out.push(ch);
                } else {
                    ident.push(ch);
                }
                continue;
            }
            if !ident.is_empty() {
                out.push_str(&self.column(&ident));
                ident.clear();
            }
            // keep a decimal point inside the current number
            in_number = in_number && ch == '.';
            out.push(ch);
        }
        if !ident.is_empty() {
            out.push_str(&self.column(&ident));
        }
        out
    }
}

impl Display for ShapeSystematic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variation {
    Up,
    Down,
}

impl Variation {
    pub const BOTH: [Variation; 2] = [Variation::Up, Variation::Down];

    /// Suffix used in histogram and weight names.
    pub fn suffix(&self) -> &'static str {
        match self {
            Variation::Up => "Up",
            Variation::Down => "Down",
        }
    }

    /// Suffix of the scale-factor column holding this variation.
    pub fn column_suffix(&self) -> &'static str {
        match self {
            Variation::Up => "up",
            Variation::Down => "down",
        }
    }
}

/// A weight-only uncertainty: the stem of its scale-factor columns and the
/// short name it carries in histogram names.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RateSystematic {
    pub stem: &'static str,
    pub abbreviation: &'static str,
}

impl RateSystematic {
    pub const ALL: [RateSystematic; 7] = [
        RateSystematic::new("IsoMuTrigger_weight_trigger", "trigger"),
        RateSystematic::new("tightMuons_weight_iso", "tight_muon_iso"),
        RateSystematic::new("tightMuons_weight_id", "tight_muon_id"),
        RateSystematic::new("tightElectrons_weight_id", "tight_electron_id"),
        RateSystematic::new("tightElectrons_weight_reco", "tight_electron_reco"),
        RateSystematic::new("looseElectrons_weight_reco", "loose_electron_reco"),
        RateSystematic::new("puweight", "pu"),
    ];

    const fn new(stem: &'static str, abbreviation: &'static str) -> Self {
        Self { stem, abbreviation }
    }

    pub fn nominal_column(&self) -> String {
        format!("{}_nominal", self.stem)
    }

    pub fn varied_column(&self, variation: Variation) -> String {
        format!("{}_{}", self.stem, variation.column_suffix())
    }

    /// `abbreviation` + `Up`/`Down`, the tail of weight and histogram names.
    pub fn tag(&self, variation: Variation) -> String {
        format!("{}{}", self.abbreviation, variation.suffix())
    }
}
