//! Fingerprint types and similarity metrics understood by the chemistry
//! cartridges.

use std::fmt;
use std::str::FromStr;

use crate::error::CredoError;
use crate::sql::{BinaryOp, Expr};

/// RDKit fingerprint flavours stored per chemical component and fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Circular,
    AtomPair,
    Torsion,
    Maccs,
    Layered,
    Avalon,
}

impl Fingerprint {
    pub const ALL: [Fingerprint; 6] = [
        Fingerprint::Circular,
        Fingerprint::AtomPair,
        Fingerprint::Torsion,
        Fingerprint::Maccs,
        Fingerprint::Layered,
        Fingerprint::Avalon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Fingerprint::Circular => "circular",
            Fingerprint::AtomPair => "atompair",
            Fingerprint::Torsion => "torsion",
            Fingerprint::Maccs => "maccs",
            Fingerprint::Layered => "layered",
            Fingerprint::Avalon => "avalon",
        }
    }

    /// Column of the `*_rdfps` tables holding this fingerprint.
    pub fn column(self) -> &'static str {
        match self {
            Fingerprint::Circular => "circular_fp",
            Fingerprint::AtomPair => "atompair_fp",
            Fingerprint::Torsion => "torsion_fp",
            Fingerprint::Maccs => "maccs_fp",
            Fingerprint::Layered => "layered_fp",
            Fingerprint::Avalon => "avalon_fp",
        }
    }

    /// Cartridge function turning a molecule into this fingerprint.
    pub fn function(self) -> &'static str {
        match self {
            Fingerprint::Circular => "rdkit.morganbv_fp",
            Fingerprint::AtomPair => "rdkit.atompairbv_fp",
            Fingerprint::Torsion => "rdkit.torsionbv_fp",
            Fingerprint::Maccs => "rdkit.maccs_fp",
            Fingerprint::Layered => "rdkit.layered_fp",
            Fingerprint::Avalon => "rdkit.avalon_fp",
        }
    }

    /// The query fingerprint computed by the cartridge from SMILES.
    pub fn from_smiles(self, smiles: &str) -> Expr {
        Expr::function(self.function(), vec![mol_from_smiles(smiles)])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fingerprint {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::ALL
            .into_iter()
            .find(|fp| fp.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CredoError::invalid(format!("unknown fingerprint type: {s}")))
    }
}

/// Bit-vector similarity metrics of the RDKit cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Tanimoto,
    Dice,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Tanimoto => "tanimoto",
            Metric::Dice => "dice",
        }
    }

    pub fn function(self) -> &'static str {
        match self {
            Metric::Tanimoto => "rdkit.tanimoto_sml",
            Metric::Dice => "rdkit.dice_sml",
        }
    }

    /// Session variable consulted by the index-driven threshold operator.
    pub fn threshold_setting(self) -> &'static str {
        match self {
            Metric::Tanimoto => "rdkit.tanimoto_threshold",
            Metric::Dice => "rdkit.dice_threshold",
        }
    }

    pub fn operator(self) -> BinaryOp {
        match self {
            Metric::Tanimoto => BinaryOp::Similar,
            Metric::Dice => BinaryOp::DiceSimilar,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tanimoto" => Ok(Metric::Tanimoto),
            "dice" => Ok(Metric::Dice),
            _ => Err(CredoError::invalid(format!("unknown similarity metric: {s}"))),
        }
    }
}

/// Similarity metrics of the OpenEye cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OeMetric {
    Tanimoto,
    Dice,
    Manhattan,
    Cosine,
    Euclidean,
}

impl OeMetric {
    pub const ALL: [OeMetric; 5] = [
        OeMetric::Tanimoto,
        OeMetric::Dice,
        OeMetric::Manhattan,
        OeMetric::Cosine,
        OeMetric::Euclidean,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OeMetric::Tanimoto => "tanimoto",
            OeMetric::Dice => "dice",
            OeMetric::Manhattan => "manhattan",
            OeMetric::Cosine => "cosine",
            OeMetric::Euclidean => "euclidean",
        }
    }

    pub fn function(self) -> &'static str {
        match self {
            OeMetric::Tanimoto => "openeye.tanimoto",
            OeMetric::Dice => "openeye.dice",
            OeMetric::Manhattan => "openeye.manhattan",
            OeMetric::Cosine => "openeye.cosine",
            OeMetric::Euclidean => "openeye.euclidean",
        }
    }

    /// Predicate comparing against the limit set for this session.
    pub fn predicate(self) -> &'static str {
        match self {
            OeMetric::Tanimoto => "openeye.tanimoto_is_above_limit",
            OeMetric::Dice => "openeye.dice_is_above_limit",
            OeMetric::Manhattan => "openeye.manhattan_is_above_limit",
            OeMetric::Cosine => "openeye.cosine_is_above_limit",
            OeMetric::Euclidean => "openeye.euclidean_is_above_limit",
        }
    }
}

impl FromStr for OeMetric {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OeMetric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CredoError::invalid(format!("unknown similarity metric: {s}")))
    }
}

/// The two FuzCav binding-site fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuzcavFingerprint {
    /// Computed from C-alpha atoms.
    Calpha,
    /// Computed from representative side-chain atoms.
    Rep,
}

impl FuzcavFingerprint {
    pub fn column(self) -> &'static str {
        match self {
            FuzcavFingerprint::Calpha => "calpha",
            FuzcavFingerprint::Rep => "rep",
        }
    }
}

impl FromStr for FuzcavFingerprint {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calpha" => Ok(FuzcavFingerprint::Calpha),
            "rep" | "representative" => Ok(FuzcavFingerprint::Rep),
            _ => Err(CredoError::invalid(format!("unknown FuzCav fingerprint: {s}"))),
        }
    }
}

/// Count-vector similarity functions for FuzCav fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuzcavMetric {
    Global,
    Simpson,
    RussellRao,
    Ochiai,
    Kulcz,
}

impl FuzcavMetric {
    pub fn function(self) -> &'static str {
        match self {
            FuzcavMetric::Global => "arrayxi_fuzcavsim_global",
            FuzcavMetric::Simpson => "arrayxi_simpson",
            FuzcavMetric::RussellRao => "arrayxi_russell_rao",
            FuzcavMetric::Ochiai => "arrayxi_ochiai",
            FuzcavMetric::Kulcz => "arrayxi_kulcz",
        }
    }
}

impl FromStr for FuzcavMetric {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "global" | "fuzcav" => Ok(FuzcavMetric::Global),
            "simpson" => Ok(FuzcavMetric::Simpson),
            "russell_rao" | "russellrao" => Ok(FuzcavMetric::RussellRao),
            "ochiai" => Ok(FuzcavMetric::Ochiai),
            "kulcz" | "kulczynski" => Ok(FuzcavMetric::Kulcz),
            _ => Err(CredoError::invalid(format!("unknown FuzCav metric: {s}"))),
        }
    }
}

/// `rdkit.mol_from_smiles(CAST($n AS cstring))`
pub fn mol_from_smiles(smiles: &str) -> Expr {
    Expr::function(
        "rdkit.mol_from_smiles",
        vec![Expr::value(smiles).cast("cstring")],
    )
}

/// `rdkit.qmol_from_smarts(CAST($n AS cstring))`
pub fn qmol_from_smarts(smarts: &str) -> Expr {
    Expr::function(
        "rdkit.qmol_from_smarts",
        vec![Expr::value(smarts).cast("cstring")],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("Circular".parse::<Fingerprint>().ok(), Some(Fingerprint::Circular));
        assert_eq!("DICE".parse::<Metric>().ok(), Some(Metric::Dice));
        assert_eq!("cosine".parse::<OeMetric>().ok(), Some(OeMetric::Cosine));
        assert_eq!("rep".parse::<FuzcavFingerprint>().ok(), Some(FuzcavFingerprint::Rep));
        assert_eq!(
            "russell-rao".parse::<FuzcavMetric>().ok(),
            Some(FuzcavMetric::RussellRao)
        );
    }

    #[test]
    fn unknown_names_are_invalid_arguments() {
        let err = "ecfp4".parse::<Fingerprint>().expect_err("unknown fingerprint");
        assert!(matches!(err, CredoError::InvalidArgument(_)));
        let err = "jaccard".parse::<Metric>().expect_err("unknown metric");
        assert!(err.to_string().contains("jaccard"));
        assert!("sokal".parse::<FuzcavMetric>().is_err());
    }

    #[test]
    fn query_fingerprint_is_built_by_the_cartridge() {
        let expr = Fingerprint::Circular.from_smiles("c1ccccc1");
        assert_eq!(
            expr.to_sql().to_sql(&SchemaNames::default()),
            "rdkit.morganbv_fp(rdkit.mol_from_smiles(CAST($1 AS cstring)))"
        );
    }
}
