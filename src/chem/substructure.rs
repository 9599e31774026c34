//! Substructure matching through the chemistry cartridges.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::similarity::{mol_from_smiles, qmol_from_smarts};
use crate::adaptor::{AtomAdaptor, ContactAdaptor, FetchArgs, LigandAdaptor, ResidueAdaptor, ResidueSift, SiftAdaptor};
use crate::db::Credo;
use crate::entity::{Atom, Contact, Ligand, Residue};
use crate::error::Result;
use crate::sql::{BinaryOp, ColumnRef, Expr};

/// How a query molecule is compared with stored molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureMatch {
    /// Stored molecule contains the SMILES query (`@>`).
    Substructure,
    /// Stored molecule is contained in the SMILES query (`<@`).
    Superstructure,
    /// Stored molecule matches the SMARTS pattern.
    Smarts,
    /// Same molecule (`@=`).
    Exact,
}

impl StructureMatch {
    /// Predicate over a cartridge `mol` column.
    pub fn predicate(self, column: ColumnRef, pattern: &str) -> Expr {
        match self {
            StructureMatch::Substructure => {
                Expr::binary(BinaryOp::Contains, column, mol_from_smiles(pattern))
            }
            StructureMatch::Superstructure => {
                Expr::binary(BinaryOp::ContainedBy, column, mol_from_smiles(pattern))
            }
            StructureMatch::Smarts => {
                Expr::binary(BinaryOp::Contains, column, qmol_from_smarts(pattern))
            }
            StructureMatch::Exact => {
                Expr::binary(BinaryOp::SameStructure, column, mol_from_smiles(pattern))
            }
        }
    }
}

/// A ligand matching a substructure pattern, with the names of the matching
/// atoms.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LigandMatch {
    pub ligand_id: i32,
    pub biomolecule_id: i32,
    pub ism: Option<String>,
    pub pattern: String,
    pub atom_names: Vec<String>,
}

impl LigandMatch {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligand_matches", "ligand_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("ligand_matches", "biomolecule_id");
    pub const ATOM_NAMES: ColumnRef = ColumnRef::new("ligand_matches", "atom_names");

    pub async fn ligand(&self, credo: &Credo) -> Result<Option<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_by_ligand_id(self.ligand_id)
            .await
    }

    /// The ligand atoms realizing the match.
    pub async fn atoms(&self, credo: &Credo) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id_and_atom_names(
                self.ligand_id,
                self.biomolecule_id,
                &self.atom_names,
                FetchArgs::default(),
            )
            .await?
            .collect(credo)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id_and_atom_names(
                self.ligand_id,
                self.biomolecule_id,
                &self.atom_names,
                args,
            )
            .await?
            .collect(credo)
            .await
    }

    /// Residues in contact with the matched atoms.
    pub async fn proximal_residues(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_all_in_contact_with_ligand_atom_names(
                self.ligand_id,
                self.biomolecule_id,
                &self.atom_names,
                args,
            )
            .await?
            .collect(credo)
            .await
    }

    pub async fn sift(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ResidueSift>> {
        SiftAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id_and_atom_names(
                self.ligand_id,
                self.biomolecule_id,
                &self.atom_names,
                args,
            )
            .await?
            .collect(credo)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;

    const RDMOL: ColumnRef = ColumnRef::new("chem_comp_rdmols", "rdmol");

    #[test]
    fn match_modes_map_to_cartridge_operators() {
        let names = SchemaNames::default();
        let render = |mode: StructureMatch| mode.predicate(RDMOL, "c1ccncc1").to_sql().to_sql(&names);

        assert_eq!(
            render(StructureMatch::Substructure),
            "chem_comp_rdmols.rdmol @> rdkit.mol_from_smiles(CAST($1 AS cstring))"
        );
        assert_eq!(
            render(StructureMatch::Superstructure),
            "chem_comp_rdmols.rdmol <@ rdkit.mol_from_smiles(CAST($1 AS cstring))"
        );
        assert_eq!(
            render(StructureMatch::Smarts),
            "chem_comp_rdmols.rdmol @> rdkit.qmol_from_smarts(CAST($1 AS cstring))"
        );
        assert!(render(StructureMatch::Exact).contains(" @= "));
    }
}
