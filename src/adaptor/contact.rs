use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;

use super::{adaptor, union_query, FetchArgs, Fetched};
use crate::bitmask::EntityType;
use crate::config::Schema;
use crate::entity::{Atom, Contact, Entity, LigandComponent, LigandFragmentAtom, Residue};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{self, BinaryOp, ColumnRef, Direction, Expr, Select, Sql};

/// One end of a stored contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Bgn,
    End,
}

impl Side {
    pub(crate) const BOTH: [Side; 2] = [Side::Bgn, Side::End];

    pub(crate) fn other(self) -> Side {
        match self {
            Side::Bgn => Side::End,
            Side::End => Side::Bgn,
        }
    }

    pub(crate) fn contact_atom(self) -> ColumnRef {
        match self {
            Side::Bgn => Contact::ATOM_BGN_ID,
            Side::End => Contact::ATOM_END_ID,
        }
    }

    pub(crate) fn atoms(self) -> &'static str {
        match self {
            Side::Bgn => "bgn_atoms",
            Side::End => "end_atoms",
        }
    }

    pub(crate) fn residues(self) -> &'static str {
        match self {
            Side::Bgn => "bgn_residues",
            Side::End => "end_residues",
        }
    }

    fn components(self) -> &'static str {
        match self {
            Side::Bgn => "bgn_components",
            Side::End => "end_components",
        }
    }

    fn fragment_atoms(self) -> &'static str {
        match self {
            Side::Bgn => "bgn_fragment_atoms",
            Side::End => "end_fragment_atoms",
        }
    }
}

/// The atoms a traversal starts from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AtomScope<'a> {
    Any,
    Atom(i32),
    Residue(i32),
    Chain(i32),
    Ligand(i32),
    LigandAtomNames(i32, &'a [String]),
    LigandFragment(i32),
}

/// Joins the atoms matched by `atom_column` on `side`, pinned to the
/// partition of `biomolecule_id`, and restricts them to `scope`.
pub(crate) fn anchor(
    select: Select,
    biomolecule_id: i32,
    side: Side,
    atom_column: ColumnRef,
    scope: AtomScope<'_>,
) -> Select {
    let atoms = side.atoms();
    let atom = |column: ColumnRef| column.aliased(atoms);
    let select = select.join(
        Schema::Credo,
        Atom::TABLE.name,
        atoms,
        Expr::and([
            atom(Atom::ATOM_ID).eq(atom_column),
            atom(Atom::BIOMOLECULE_ID).eq(biomolecule_id),
        ]),
    );

    match scope {
        AtomScope::Any => select,
        AtomScope::Atom(atom_id) => select.filter(atom(Atom::ATOM_ID).eq(atom_id)),
        AtomScope::Residue(residue_id) => select.filter(atom(Atom::RESIDUE_ID).eq(residue_id)),
        AtomScope::Chain(chain_id) => join_residues(select, side)
            .filter(Residue::CHAIN_ID.aliased(side.residues()).eq(chain_id)),
        AtomScope::Ligand(ligand_id) => join_components(select, side, ligand_id),
        AtomScope::LigandAtomNames(ligand_id, names) => join_components(select, side, ligand_id)
            .filter(atom(Atom::ATOM_NAME).any(names.to_vec())),
        AtomScope::LigandFragment(ligand_fragment_id) => {
            let fragment_atoms = side.fragment_atoms();
            select
                .join(
                    Schema::Credo,
                    LigandFragmentAtom::TABLE.name,
                    fragment_atoms,
                    LigandFragmentAtom::ATOM_ID
                        .aliased(fragment_atoms)
                        .eq(atom(Atom::ATOM_ID)),
                )
                .filter(
                    LigandFragmentAtom::LIGAND_FRAGMENT_ID
                        .aliased(fragment_atoms)
                        .eq(ligand_fragment_id),
                )
        }
    }
}

/// Joins the residues of the atoms joined by [`anchor`] on `side`.
pub(crate) fn join_residues(select: Select, side: Side) -> Select {
    let residues = side.residues();
    select.join(
        Schema::Credo,
        Residue::TABLE.name,
        residues,
        Residue::RESIDUE_ID
            .aliased(residues)
            .eq(Atom::RESIDUE_ID.aliased(side.atoms())),
    )
}

fn join_components(select: Select, side: Side, ligand_id: i32) -> Select {
    let components = side.components();
    select
        .join(
            Schema::Credo,
            LigandComponent::TABLE.name,
            components,
            LigandComponent::RESIDUE_ID
                .aliased(components)
                .eq(Atom::RESIDUE_ID.aliased(side.atoms())),
        )
        .filter(LigandComponent::LIGAND_ID.aliased(components).eq(ligand_id))
}

/// A water-mediated contact pair: `bgn` and `end` both contact the same
/// water atom.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct WaterBridge {
    pub biomolecule_id: i32,
    pub atom_bgn_id: i32,
    pub water_atom_id: i32,
    pub atom_end_id: i32,
    pub contact_bgn_id: i32,
    pub contact_end_id: i32,
    pub distance_bgn: f64,
    pub distance_end: f64,
}

impl WaterBridge {
    /// Upper bound on the summed length of the two contacts.
    pub const MAX_DISTANCE_SUM: f64 = 6.1;

    pub const ATOM_BGN_ID: ColumnRef = ColumnRef::new("water_bridges", "atom_bgn_id");
    pub const WATER_ATOM_ID: ColumnRef = ColumnRef::new("water_bridges", "water_atom_id");
    pub const ATOM_END_ID: ColumnRef = ColumnRef::new("water_bridges", "atom_end_id");
    pub const DISTANCE_BGN: ColumnRef = ColumnRef::new("water_bridges", "distance_bgn");
    pub const DISTANCE_END: ColumnRef = ColumnRef::new("water_bridges", "distance_end");

    pub fn distance_sum(&self) -> f64 {
        self.distance_bgn + self.distance_end
    }
}

const E1_ATOM: ColumnRef = ColumnRef::new("e1", "atom_id");
const E1_PARTNER: ColumnRef = ColumnRef::new("e1", "partner_id");
const E1_DISTANCE: ColumnRef = ColumnRef::new("e1", "distance");
const E2_ATOM: ColumnRef = ColumnRef::new("e2", "atom_id");
const E2_PARTNER: ColumnRef = ColumnRef::new("e2", "partner_id");
const E2_DISTANCE: ColumnRef = ColumnRef::new("e2", "distance");

/// Every contact of the partition, once in each direction.
fn contact_edges(biomolecule_id: i32) -> Sql {
    let edges: Vec<Select> = Side::BOTH
        .iter()
        .map(|&side| {
            let mut atom = side.contact_atom().to_sql();
            atom.push(" AS atom_id");
            let mut partner = side.other().contact_atom().to_sql();
            partner.push(" AS partner_id");
            Select::from_table(Schema::Credo, Contact::TABLE.name, Contact::TABLE.name)
                .columns([
                    Sql::text("contacts.contact_id"),
                    atom,
                    partner,
                    Sql::text("contacts.distance::float8 AS distance"),
                ])
                .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
        })
        .collect();
    sql::union(&edges, false)
}

adaptor!(
    /// Contacts, traversed as undirected edges.
    ContactAdaptor
);

impl ContactAdaptor {
    pub async fn fetch_by_contact_id(
        &self,
        contact_id: i32,
        biomolecule_id: i32,
    ) -> Result<Option<Contact>> {
        let query = Contact::query()
            .filter(Contact::CONTACT_ID.eq(contact_id))
            .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id));
        self.core.fetch_one(query).await
    }

    /// Contacts with an atom of `scope` on either side. The caller's filters
    /// apply to both sides before the union.
    async fn fetch_all_anchored(
        &self,
        biomolecule_id: i32,
        scope: AtomScope<'_>,
        dedup: bool,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        let (filters, shape) = args.split();
        let selects: Vec<Select> = Side::BOTH
            .iter()
            .map(|&side| {
                anchor(
                    Contact::TABLE.select(),
                    biomolecule_id,
                    side,
                    side.contact_atom(),
                    scope,
                )
                .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
                .filters(filters.clone())
            })
            .collect();

        debug!(
            stage = "adaptor",
            event = "contacts.anchored",
            biomolecule_id,
            scope = ?scope,
            dedup
        );
        let query = union_query::<Contact>(&selects, dedup, Contact::TABLE.name)
            .order_by(Contact::CONTACT_ID, Direction::Asc);
        self.core.finalize(query, shape).await
    }

    /// Contacts of one atom. A contact cannot join an atom to itself, so the
    /// two sides are disjoint and need no de-duplication.
    pub async fn fetch_all_by_atom_id(
        &self,
        atom_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        self.fetch_all_anchored(biomolecule_id, AtomScope::Atom(atom_id), false, args)
            .await
    }

    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        self.fetch_all_anchored(biomolecule_id, AtomScope::Residue(residue_id), true, args)
            .await
    }

    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        self.fetch_all_anchored(biomolecule_id, AtomScope::Ligand(ligand_id), true, args)
            .await
    }

    /// Contacts of the named atoms of a ligand, as reported by a substructure
    /// match.
    pub async fn fetch_all_by_ligand_id_and_atom_names(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        atom_names: &[String],
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        let scope = AtomScope::LigandAtomNames(ligand_id, atom_names);
        self.fetch_all_anchored(biomolecule_id, scope, true, args)
            .await
    }

    pub async fn fetch_all_by_ligand_fragment_id(
        &self,
        ligand_fragment_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        let scope = AtomScope::LigandFragment(ligand_fragment_id);
        self.fetch_all_anchored(biomolecule_id, scope, true, args)
            .await
    }

    /// Contacts between two chains, whichever side each chain was stored on.
    pub async fn fetch_all_by_chain_pair(
        &self,
        chain_a: i32,
        chain_b: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Contact>> {
        let (filters, shape) = args.split();
        let selects: Vec<Select> = Side::BOTH
            .iter()
            .map(|&side| {
                let select = anchor(
                    Contact::TABLE.select(),
                    biomolecule_id,
                    side,
                    side.contact_atom(),
                    AtomScope::Chain(chain_a),
                );
                anchor(
                    select,
                    biomolecule_id,
                    side.other(),
                    side.other().contact_atom(),
                    AtomScope::Chain(chain_b),
                )
                .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
                .filters(filters.clone())
            })
            .collect();

        let query = union_query::<Contact>(&selects, chain_a == chain_b, Contact::TABLE.name)
            .order_by(Contact::CONTACT_ID, Direction::Asc);
        self.core.finalize(query, shape).await
    }

    /// Pairs of contacts from a ligand atom to a non-water atom through one
    /// water atom, with a combined length of at most
    /// [`WaterBridge::MAX_DISTANCE_SUM`].
    pub async fn fetch_all_water_bridges_by_ligand_id(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<WaterBridge>> {
        let water = EntityType::Solvent.bit();
        let water_atoms = "water_atoms";
        let water_residues = "water_residues";

        let bridges = Select::from_named("edges", "e1")
            .with("edges", contact_edges(biomolecule_id))
            .columns([
                Sql::text("bgn_atoms.biomolecule_id"),
                Sql::text("e1.atom_id AS atom_bgn_id"),
                Sql::text("e1.partner_id AS water_atom_id"),
                Sql::text("e2.partner_id AS atom_end_id"),
                Sql::text("e1.contact_id AS contact_bgn_id"),
                Sql::text("e2.contact_id AS contact_end_id"),
                Sql::text("e1.distance AS distance_bgn"),
                Sql::text("e2.distance AS distance_end"),
            ])
            .join_named(
                "edges",
                "e2",
                Expr::and([E2_ATOM.eq(E1_PARTNER), E2_PARTNER.ne(E1_ATOM)]),
            )
            .join(
                Schema::Credo,
                Atom::TABLE.name,
                water_atoms,
                Expr::and([
                    Atom::ATOM_ID.aliased(water_atoms).eq(E1_PARTNER),
                    Atom::BIOMOLECULE_ID.aliased(water_atoms).eq(biomolecule_id),
                ]),
            )
            .join(
                Schema::Credo,
                Residue::TABLE.name,
                water_residues,
                Residue::RESIDUE_ID
                    .aliased(water_residues)
                    .eq(Atom::RESIDUE_ID.aliased(water_atoms)),
            );
        let bridges = anchor(
            bridges,
            biomolecule_id,
            Side::Bgn,
            E1_ATOM,
            AtomScope::Ligand(ligand_id),
        );
        let end_residues = Side::End.residues();
        let bridges = anchor(bridges, biomolecule_id, Side::End, E2_PARTNER, AtomScope::Any);
        let bridges = join_residues(bridges, Side::End)
            .filter(Residue::ENTITY_TYPE_BM.aliased(water_residues).eq(water))
            .filter(Residue::ENTITY_TYPE_BM.aliased(end_residues).ne(water))
            .filter(
                Expr::binary(BinaryOp::Add, E1_DISTANCE, E2_DISTANCE)
                    .le(WaterBridge::MAX_DISTANCE_SUM),
            );

        let query = Query::<WaterBridge>::new(Select::from_subquery(
            &bridges.to_sql(),
            "water_bridges",
        ))
        .order_by(WaterBridge::ATOM_BGN_ID, Direction::Asc)
        .order_by(WaterBridge::WATER_ATOM_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn atom_contacts_union_both_directions() {
        let adaptor = ContactAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_atom_id(11, 7, FetchArgs::from(Contact::IS_HBOND.is_true()))
                .await
                .expect("query"),
        );

        assert!(sql.contains("bgn_atoms.atom_id = contacts.atom_bgn_id"));
        assert!(sql.contains("end_atoms.atom_id = contacts.atom_end_id"));
        assert!(sql.contains(") UNION ALL ("));
        assert_eq!(sql.matches("contacts.is_hbond = $").count(), 2);
        assert!(sql.ends_with("ORDER BY contacts.contact_id ASC"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn ligand_contacts_are_deduplicated() {
        let adaptor = ContactAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_ligand_id(3, 7, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains(") UNION ("));
        assert!(sql.contains("JOIN credo.ligand_components AS bgn_components"));
        assert!(sql.contains("bgn_components.ligand_id = $"));
        assert!(sql.contains("end_components.ligand_id = $"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn atom_names_filter_the_anchored_side() {
        let adaptor = ContactAdaptor::with_options(lazy_credo(), dynamic());
        let names = vec!["N1".to_string(), "C2".to_string()];
        let sql = rendered(
            adaptor
                .fetch_all_by_ligand_id_and_atom_names(3, 7, &names, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("bgn_atoms.atom_name = ANY($"));
        assert!(sql.contains("end_atoms.atom_name = ANY($"));
    }

    #[tokio::test]
    async fn chain_pair_anchors_each_chain_to_one_side() {
        let adaptor = ContactAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_chain_pair(1, 2, 7, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert_eq!(sql.matches("bgn_residues.chain_id = $").count(), 2);
        assert_eq!(sql.matches("end_residues.chain_id = $").count(), 2);
        assert!(sql.contains(") UNION ALL ("));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn water_bridges_cap_the_distance_sum() {
        let adaptor = ContactAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_water_bridges_by_ligand_id(3, 7, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("WITH edges AS ("));
        assert!(sql.contains("JOIN edges AS e2 ON (e2.atom_id = e1.partner_id) AND (e2.partner_id <> e1.atom_id)"));
        assert!(sql.contains("(e1.distance + e2.distance) <= $"));
        assert!(sql.contains("water_residues.entity_type_bm = $"));
        assert!(sql.contains(") AS water_bridges"));
        assert_partition_pinned(&sql);
    }

    #[test]
    fn water_bridge_sums_both_legs() {
        let bridge = WaterBridge {
            biomolecule_id: 1,
            atom_bgn_id: 1,
            water_atom_id: 2,
            atom_end_id: 3,
            contact_bgn_id: 10,
            contact_end_id: 11,
            distance_bgn: 2.75,
            distance_end: 3.0,
        };
        assert!((bridge.distance_sum() - 5.75).abs() < 1e-12);
        assert!(bridge.distance_sum() <= WaterBridge::MAX_DISTANCE_SUM);
    }
}
