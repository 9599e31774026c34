//! Structural interaction fingerprints rolled up per residue.
//!
//! Every variant builds the same shape of query: the contacts touching the
//! scoping atoms are selected once from each side, each row carrying the id
//! of the residue it is reported for plus the thirteen feature flags. The
//! union is summed per residue and joined back to `residues`.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row as _};
use tracing::debug;

use super::contact::{anchor, AtomScope, Side};
use super::{adaptor, FetchArgs, Fetched};
use crate::bitmask::{Sift, SIFT_FEATURES};
use crate::config::Schema;
use crate::entity::{Atom, Contact, Entity, Residue};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{self, ColumnRef, Direction, Select, Sql};

/// A residue and the summed fingerprint of the contacts it takes part in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidueSift {
    pub residue: Residue,
    pub sift: Sift,
}

impl<'r> FromRow<'r, PgRow> for ResidueSift {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let residue = Residue::from_row(row)?;
        let mut counts = [0i64; 13];
        for (count, feature) in counts.iter_mut().zip(SIFT_FEATURES) {
            *count = row.try_get(feature)?;
        }
        Ok(Self {
            residue,
            sift: Sift::from_array(counts),
        })
    }
}

const SIFT_RESIDUE_ID: ColumnRef = ColumnRef::new("sift", "residue_id");

/// Whose residues the fingerprint rows describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    /// The residues owning the scoping atoms.
    Scope,
    /// The residues on the far side of each contact.
    Partner,
}

/// The contact rows of one traversal, one select per side.
fn sides(
    biomolecule_id: i32,
    scope: AtomScope<'_>,
    report: Report,
    secondary: bool,
) -> Vec<Select> {
    Side::BOTH
        .iter()
        .map(|&side| {
            let partner = side.other();
            let reported = match report {
                Report::Scope => side,
                Report::Partner => partner,
            };
            let mut residue_id = Atom::RESIDUE_ID.aliased(reported.atoms()).to_sql();
            residue_id.push(" AS residue_id");
            let flags = SIFT_FEATURES
                .iter()
                .map(|feature| Sql::text(format!("contacts.{feature}")));

            let select = Select::from_table(Schema::Credo, Contact::TABLE.name, Contact::TABLE.name)
                .column(residue_id)
                .columns(flags);
            let select = anchor(select, biomolecule_id, side, side.contact_atom(), scope);
            let select = anchor(
                select,
                biomolecule_id,
                partner,
                partner.contact_atom(),
                AtomScope::Any,
            )
            .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
            .filter(Contact::IS_SAME_ENTITY.is_false());

            if secondary {
                select
            } else {
                select.filter(Contact::IS_SECONDARY.is_false())
            }
        })
        .collect()
}

/// Sums the flags of `sides` per residue and joins the totals to `residues`.
fn rollup(sides: &[Select]) -> Query<ResidueSift> {
    let sums = SIFT_FEATURES
        .iter()
        .map(|feature| Sql::text(format!("SUM(CAST(sides.{feature} AS int))::int8 AS {feature}")));
    let per_residue = Select::from_subquery(&sql::union(sides, false), "sides")
        .column(Sql::text("sides.residue_id"))
        .columns(sums)
        .group_by(Sql::text("sides.residue_id"));

    let totals = SIFT_FEATURES
        .iter()
        .map(|feature| Sql::text(format!("sift.{feature}")));
    let select = Residue::TABLE
        .select()
        .columns(totals)
        .join_subquery(
            &per_residue.to_sql(),
            "sift",
            SIFT_RESIDUE_ID.eq(Residue::RESIDUE_ID),
        );

    Query::new(select).order_by(Residue::RESIDUE_ID, Direction::Asc)
}

adaptor!(
    /// Per-residue structural interaction fingerprints.
    SiftAdaptor
);

impl SiftAdaptor {
    async fn fetch_all_scoped(
        &self,
        biomolecule_id: i32,
        scope: AtomScope<'_>,
        report: Report,
        secondary: bool,
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        debug!(
            stage = "adaptor",
            event = "sift.rollup",
            biomolecule_id,
            scope = ?scope,
            secondary
        );
        let query = rollup(&sides(biomolecule_id, scope, report, secondary));
        self.core.fetch_all(query, args).await
    }

    /// Fingerprints of the chain's own residues. Secondary contacts are
    /// excluded.
    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        let scope = AtomScope::Chain(chain_id);
        self.fetch_all_scoped(biomolecule_id, scope, Report::Scope, false, args)
            .await
    }

    /// Fingerprints of the residues in contact with a ligand. Secondary
    /// contacts are included.
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        let scope = AtomScope::Ligand(ligand_id);
        self.fetch_all_scoped(biomolecule_id, scope, Report::Partner, true, args)
            .await
    }

    pub async fn fetch_all_by_ligand_fragment_id(
        &self,
        ligand_fragment_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        let scope = AtomScope::LigandFragment(ligand_fragment_id);
        self.fetch_all_scoped(biomolecule_id, scope, Report::Partner, true, args)
            .await
    }

    /// Fingerprints restricted to contacts of the named ligand atoms.
    pub async fn fetch_all_by_ligand_id_and_atom_names(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        atom_names: &[String],
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        let scope = AtomScope::LigandAtomNames(ligand_id, atom_names);
        self.fetch_all_scoped(biomolecule_id, scope, Report::Partner, true, args)
            .await
    }

    /// Fingerprints of the residues in contact with one residue.
    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ResidueSift>> {
        let scope = AtomScope::Residue(residue_id);
        self.fetch_all_scoped(biomolecule_id, scope, Report::Partner, true, args)
            .await
    }
}
