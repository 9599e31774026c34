//! Entity-type and atom-type bitmasks, and the 13-component interaction
//! fingerprint shared by contacts and the SIFt aggregator.

use std::fmt;
use std::ops::{Add, AddAssign, BitOr, Index};

use serde::{Deserialize, Serialize};

use crate::error::CredoError;

/// Residue entity types. Each residue carries one or more of these bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Solvent,
    Ligand,
    Saccharide,
    Rna,
    Dna,
    Protein,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Solvent,
        EntityType::Ligand,
        EntityType::Saccharide,
        EntityType::Rna,
        EntityType::Dna,
        EntityType::Protein,
    ];

    pub const fn bit(self) -> i32 {
        match self {
            EntityType::Solvent => 1,
            EntityType::Ligand => 2,
            EntityType::Saccharide => 4,
            EntityType::Rna => 8,
            EntityType::Dna => 16,
            EntityType::Protein => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityType::Solvent => "solvent",
            EntityType::Ligand => "ligand",
            EntityType::Saccharide => "saccharide",
            EntityType::Rna => "rna",
            EntityType::Dna => "dna",
            EntityType::Protein => "protein",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CredoError> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CredoError::invalid(format!("unknown entity type '{name}'")))
    }
}

/// A set of [`EntityType`] bits as stored in `entity_type_bm`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityTypes(pub i32);

impl EntityTypes {
    pub const EMPTY: EntityTypes = EntityTypes(0);
    pub const MASK: i32 = 0b11_1111;

    pub fn contains(self, ty: EntityType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = EntityType> {
        EntityType::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    pub fn is_polymer(self) -> bool {
        self.contains(EntityType::Protein)
            || self.contains(EntityType::Dna)
            || self.contains(EntityType::Rna)
    }
}

impl From<EntityType> for EntityTypes {
    fn from(ty: EntityType) -> Self {
        EntityTypes(ty.bit())
    }
}

impl BitOr for EntityType {
    type Output = EntityTypes;

    fn bitor(self, rhs: EntityType) -> EntityTypes {
        EntityTypes(self.bit() | rhs.bit())
    }
}

impl BitOr<EntityType> for EntityTypes {
    type Output = EntityTypes;

    fn bitor(self, rhs: EntityType) -> EntityTypes {
        EntityTypes(self.0 | rhs.bit())
    }
}

impl fmt::Display for EntityTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(EntityType::name).collect();
        f.write_str(&names.join("|"))
    }
}

/// `structural_interaction_type_bm` for a contact from `bgn` to `end`.
pub fn interaction_type_bm(bgn: impl Into<EntityTypes>, end: impl Into<EntityTypes>) -> i32 {
    (bgn.into().0 << 6) | end.into().0
}

/// Splits a contact bitmask into its `(bgn, end)` entity types.
pub fn split_interaction_type_bm(bm: i32) -> (EntityTypes, EntityTypes) {
    (
        EntityTypes((bm >> 6) & EntityTypes::MASK),
        EntityTypes(bm & EntityTypes::MASK),
    )
}

/// Both directed encodings of the undirected interaction between `a` and `b`,
/// smaller first.
pub fn interaction_category(a: impl Into<EntityTypes>, b: impl Into<EntityTypes>) -> (i32, i32) {
    let (a, b) = (a.into(), b.into());
    let forward = interaction_type_bm(a, b);
    let reverse = interaction_type_bm(b, a);
    (forward.min(reverse), forward.max(reverse))
}

/// The 13 typed-atom features in mask bit order.
pub const ATOM_TYPE_FEATURES: [&str; 13] = [
    "is_donor",
    "is_acceptor",
    "is_aromatic",
    "is_weak_acceptor",
    "is_weak_donor",
    "is_hydrophobe",
    "is_metal",
    "is_pos_ionisable",
    "is_neg_ionisable",
    "is_xbond_donor",
    "is_xbond_acceptor",
    "is_carbonyl_oxygen",
    "is_carbonyl_carbon",
];

/// 13-bit mask over [`ATOM_TYPE_FEATURES`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomType(pub u16);

impl AtomType {
    pub fn from_flags(flags: [bool; 13]) -> Self {
        AtomType(
            flags
                .iter()
                .enumerate()
                .filter(|(_, set)| **set)
                .fold(0u16, |mask, (idx, _)| mask | (1 << idx)),
        )
    }

    pub fn has(self, feature: &str) -> bool {
        ATOM_TYPE_FEATURES
            .iter()
            .position(|f| *f == feature)
            .is_some_and(|idx| self.0 & (1 << idx) != 0)
    }

    pub fn features(self) -> impl Iterator<Item = &'static str> {
        ATOM_TYPE_FEATURES
            .into_iter()
            .enumerate()
            .filter(move |(idx, _)| self.0 & (1 << idx) != 0)
            .map(|(_, name)| name)
    }
}

/// The contact columns forming a structural interaction fingerprint, in
/// order.
pub const SIFT_FEATURES: [&str; 13] = [
    "is_clash",
    "is_covalent",
    "is_vdw_clash",
    "is_vdw",
    "is_proximal",
    "is_hbond",
    "is_weak_hbond",
    "is_xbond",
    "is_ionic",
    "is_metal_complex",
    "is_aromatic",
    "is_hydrophobic",
    "is_carbonyl",
];

/// Per-feature contact counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sift {
    pub clash: i64,
    pub covalent: i64,
    pub vdw_clash: i64,
    pub vdw: i64,
    pub proximal: i64,
    pub hbond: i64,
    pub weak_hbond: i64,
    pub xbond: i64,
    pub ionic: i64,
    pub metal_complex: i64,
    pub aromatic: i64,
    pub hydrophobic: i64,
    pub carbonyl: i64,
}

impl Sift {
    pub fn from_array(v: [i64; 13]) -> Self {
        Sift {
            clash: v[0],
            covalent: v[1],
            vdw_clash: v[2],
            vdw: v[3],
            proximal: v[4],
            hbond: v[5],
            weak_hbond: v[6],
            xbond: v[7],
            ionic: v[8],
            metal_complex: v[9],
            aromatic: v[10],
            hydrophobic: v[11],
            carbonyl: v[12],
        }
    }

    pub fn to_array(&self) -> [i64; 13] {
        [
            self.clash,
            self.covalent,
            self.vdw_clash,
            self.vdw,
            self.proximal,
            self.hbond,
            self.weak_hbond,
            self.xbond,
            self.ionic,
            self.metal_complex,
            self.aromatic,
            self.hydrophobic,
            self.carbonyl,
        ]
    }

    /// A single contact's fingerprint from its feature flags.
    pub fn from_flags(flags: [bool; 13]) -> Self {
        Sift::from_array(flags.map(i64::from))
    }

    pub fn total(&self) -> i64 {
        self.to_array().iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(|v| *v == 0)
    }

    /// Features with a non-zero count.
    pub fn present(&self) -> Vec<&'static str> {
        SIFT_FEATURES
            .into_iter()
            .zip(self.to_array())
            .filter(|(_, count)| *count > 0)
            .map(|(name, _)| name)
            .collect()
    }
}

impl Index<usize> for Sift {
    type Output = i64;

    fn index(&self, idx: usize) -> &i64 {
        match idx {
            0 => &self.clash,
            1 => &self.covalent,
            2 => &self.vdw_clash,
            3 => &self.vdw,
            4 => &self.proximal,
            5 => &self.hbond,
            6 => &self.weak_hbond,
            7 => &self.xbond,
            8 => &self.ionic,
            9 => &self.metal_complex,
            10 => &self.aromatic,
            11 => &self.hydrophobic,
            12 => &self.carbonyl,
            _ => panic!("SIFt index {idx} out of range"),
        }
    }
}

impl Add for Sift {
    type Output = Sift;

    fn add(self, rhs: Sift) -> Sift {
        let (a, b) = (self.to_array(), rhs.to_array());
        Sift::from_array(std::array::from_fn(|i| a[i] + b[i]))
    }
}

impl AddAssign for Sift {
    fn add_assign(&mut self, rhs: Sift) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Sift {
    fn sum<I: Iterator<Item = Sift>>(iter: I) -> Sift {
        iter.fold(Sift::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_bits_are_distinct_powers_of_two() {
        let total: i32 = EntityType::ALL.iter().map(|t| t.bit()).sum();
        assert_eq!(total, EntityTypes::MASK);
        for t in EntityType::ALL {
            assert_eq!(t.bit().count_ones(), 1);
        }
    }

    #[test]
    fn interaction_bitmask_is_symmetric_per_category() {
        for a in EntityType::ALL {
            for b in EntityType::ALL {
                let forward = interaction_type_bm(a, b);
                let reverse = interaction_type_bm(b, a);
                assert_eq!(split_interaction_type_bm(forward), (a.into(), b.into()));
                assert_eq!(split_interaction_type_bm(reverse), (b.into(), a.into()));
                assert_eq!(interaction_category(a, b), interaction_category(b, a));
            }
        }
        assert_eq!(
            interaction_type_bm(EntityType::Protein, EntityType::Ligand),
            (32 << 6) | 2
        );
    }

    #[test]
    fn entity_types_display_and_membership() {
        let types = EntityType::Protein | EntityType::Ligand;
        assert!(types.contains(EntityType::Ligand));
        assert!(!types.contains(EntityType::Dna));
        assert!(types.is_polymer());
        assert_eq!(types.to_string(), "ligand|protein");
        assert_eq!(EntityType::from_name("DNA").expect("dna"), EntityType::Dna);
        assert!(EntityType::from_name("lipid").is_err());
    }

    #[test]
    fn atom_type_mask_from_flags() {
        let mut flags = [false; 13];
        flags[0] = true;
        flags[2] = true;
        let mask = AtomType::from_flags(flags);
        assert_eq!(mask.0, 0b101);
        assert!(mask.has("is_donor"));
        assert!(mask.has("is_aromatic"));
        assert!(!mask.has("is_acceptor"));
        assert_eq!(mask.features().collect::<Vec<_>>(), vec!["is_donor", "is_aromatic"]);
    }

    #[test]
    fn sift_arithmetic() {
        let mut flags = [false; 13];
        flags[3] = true;
        flags[5] = true;
        let one = Sift::from_flags(flags);
        let total: Sift = [one, one, Sift::default()].into_iter().sum();
        assert_eq!(total.vdw, 2);
        assert_eq!(total.hbond, 2);
        assert_eq!(total.total(), 4);
        assert_eq!(total[5], 2);
        assert_eq!(total.present(), vec!["is_vdw", "is_hbond"]);
        assert!(Sift::default().is_empty());
    }
}
