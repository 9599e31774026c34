use super::contact::{anchor, join_residues, AtomScope, Side};
use super::{adaptor, path_ops, union_query, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::association::{PF_RESIDUE_PF_ID, PF_RESIDUE_RESIDUE_ID, PROT_FRAGMENT_RESIDUES};
use crate::entity::{
    BindingSiteResidue, Contact, DomainPeptide, Entity, Interface, Peptide, Residue,
};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{Direction, Expr, Select};

adaptor!(ResidueAdaptor);
path_ops!(ResidueAdaptor, Residue);

/// Residues on the far side of contacts made by the atoms of `scope`,
/// one select per contact direction. Contacts within one entity are skipped.
fn partner_residues(biomolecule_id: i32, scope: AtomScope<'_>) -> Vec<Select> {
    Side::BOTH
        .iter()
        .map(|&side| {
            let partner = side.other();
            let select = Select::from_table(Schema::Credo, Contact::TABLE.name, Contact::TABLE.name)
                .columns(Residue::TABLE.projection(partner.residues()));
            let select = anchor(select, biomolecule_id, side, side.contact_atom(), scope);
            let select = anchor(
                select,
                biomolecule_id,
                partner,
                partner.contact_atom(),
                AtomScope::Any,
            );
            join_residues(select, partner)
                .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
                .filter(Contact::IS_SAME_ENTITY.is_false())
        })
        .collect()
}

fn residue_union(selects: &[Select]) -> Query<Residue> {
    union_query::<Residue>(selects, true, Residue::TABLE.name)
        .order_by(Residue::RESIDUE_ID, Direction::Asc)
}

impl ResidueAdaptor {
    pub async fn fetch_by_residue_id(&self, residue_id: i32) -> Result<Option<Residue>> {
        self.core
            .fetch_one(Residue::query().filter(Residue::RESIDUE_ID.eq(residue_id)))
            .await
    }

    /// `ins_code` is a one-character code, `' '` when the residue has none.
    pub async fn fetch_by_chain_id_and_res_num(
        &self,
        chain_id: i32,
        res_num: i32,
        ins_code: &str,
    ) -> Result<Option<Residue>> {
        let query = Residue::query()
            .filter(Residue::CHAIN_ID.eq(chain_id))
            .filter(Residue::RES_NUM.eq(res_num))
            .filter(Residue::INS_CODE.eq(Expr::value(ins_code).cast("bpchar")));
        self.core.fetch_one(query).await
    }

    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let query = Residue::query()
            .filter(Residue::CHAIN_ID.eq(chain_id))
            .order_by(Residue::RES_NUM, Direction::Asc)
            .order_by(Residue::INS_CODE, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_prot_fragment_id(
        &self,
        prot_fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let (schema, table) = PROT_FRAGMENT_RESIDUES;
        let query = Residue::query()
            .map_select(|s| {
                s.join(schema, table, table, PF_RESIDUE_RESIDUE_ID.eq(Residue::RESIDUE_ID))
            })
            .filter(PF_RESIDUE_PF_ID.eq(prot_fragment_id))
            .order_by(Residue::RESIDUE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// The binding site of a ligand as recorded at load time.
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let query = Residue::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    BindingSiteResidue::TABLE.name,
                    BindingSiteResidue::TABLE.name,
                    BindingSiteResidue::RESIDUE_ID.eq(Residue::RESIDUE_ID),
                )
            })
            .filter(BindingSiteResidue::LIGAND_ID.eq(ligand_id))
            .order_by(Residue::RESIDUE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Residues of either chain of an interface that take part in an
    /// inter-chain contact.
    pub async fn fetch_all_by_interface_id(
        &self,
        interface_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let bgn_chain = Residue::CHAIN_ID.aliased(Side::Bgn.residues());
        let end_chain = Residue::CHAIN_ID.aliased(Side::End.residues());
        let spans_interface = Expr::and([
            Interface::INTERFACE_ID.eq(interface_id),
            Expr::or([
                Expr::and([
                    bgn_chain.eq(Interface::CHAIN_BGN_ID),
                    end_chain.eq(Interface::CHAIN_END_ID),
                ]),
                Expr::and([
                    bgn_chain.eq(Interface::CHAIN_END_ID),
                    end_chain.eq(Interface::CHAIN_BGN_ID),
                ]),
            ]),
        ]);

        let selects: Vec<Select> = Side::BOTH
            .iter()
            .map(|&side| {
                let mut select =
                    Select::from_table(Schema::Credo, Contact::TABLE.name, Contact::TABLE.name)
                        .columns(Residue::TABLE.projection(side.residues()));
                for each in Side::BOTH {
                    select = anchor(
                        select,
                        biomolecule_id,
                        each,
                        each.contact_atom(),
                        AtomScope::Any,
                    );
                    select = join_residues(select, each);
                }
                select
                    .join(
                        Schema::Credo,
                        Interface::TABLE.name,
                        Interface::TABLE.name,
                        spans_interface.clone(),
                    )
                    .filter(Contact::BIOMOLECULE_ID.eq(biomolecule_id))
            })
            .collect();

        self.core.fetch_all(residue_union(&selects), args).await
    }

    /// Residues in contact with any atom of a ligand.
    pub async fn fetch_all_in_contact_with_ligand_id(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let selects = partner_residues(biomolecule_id, AtomScope::Ligand(ligand_id));
        self.core.fetch_all(residue_union(&selects), args).await
    }

    /// Residues in contact with the named atoms of a ligand.
    pub async fn fetch_all_in_contact_with_ligand_atom_names(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        atom_names: &[String],
        args: FetchArgs,
    ) -> Result<Fetched<Residue>> {
        let scope = AtomScope::LigandAtomNames(ligand_id, atom_names);
        let selects = partner_residues(biomolecule_id, scope);
        self.core.fetch_all(residue_union(&selects), args).await
    }
}

adaptor!(PeptideAdaptor);
path_ops!(PeptideAdaptor, Peptide);

impl PeptideAdaptor {
    pub async fn fetch_by_residue_id(&self, residue_id: i32) -> Result<Option<Peptide>> {
        self.core
            .fetch_one(Peptide::query().filter(Peptide::RESIDUE_ID.eq(residue_id)))
            .await
    }

    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Peptide>> {
        let query = Peptide::query()
            .filter(Peptide::CHAIN_ID.eq(chain_id))
            .order_by(Peptide::RES_NUM, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_domain_id(
        &self,
        domain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Peptide>> {
        let query = Peptide::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    DomainPeptide::TABLE.name,
                    DomainPeptide::TABLE.name,
                    DomainPeptide::RESIDUE_ID.eq(Peptide::RESIDUE_ID),
                )
            })
            .filter(DomainPeptide::DOMAIN_ID.eq(domain_id))
            .order_by(Peptide::RESIDUE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::adaptor::PathOps;
    use crate::db::testing::{lazy_credo, lazy_credo_without};
    use crate::db::Capability;

    #[test]
    fn residue_lookup_compares_insertion_codes_as_bpchar() {
        let query = Residue::query()
            .filter(Residue::INS_CODE.eq(Expr::value(" ").cast("bpchar")));
        let sql = query.to_sql(&crate::config::SchemaNames::default());
        assert!(sql.ends_with("WHERE residues.ins_code = CAST($1 AS bpchar)"));
    }

    #[tokio::test]
    async fn ligand_partners_come_from_the_far_side() {
        let adaptor = ResidueAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_in_contact_with_ligand_id(3, 7, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("SELECT * FROM ((SELECT end_residues.residue_id"));
        assert!(sql.contains("bgn_components.ligand_id = $"));
        assert!(sql.contains("(SELECT bgn_residues.residue_id"));
        assert!(sql.contains("end_components.ligand_id = $"));
        assert_eq!(sql.matches("contacts.is_same_entity = $").count(), 2);
        assert!(sql.contains(") AS residues ORDER BY residues.residue_id ASC"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn interface_residues_span_both_chains() {
        let adaptor = ResidueAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_interface_id(9, 7, FetchArgs::from(Residue::RES_NAME.eq("ARG")))
                .await
                .expect("query"),
        );
        assert!(sql.contains("JOIN credo.interfaces AS interfaces ON"));
        assert!(sql.contains("bgn_residues.chain_id = interfaces.chain_bgn_id"));
        assert!(sql.contains("bgn_residues.chain_id = interfaces.chain_end_id"));
        assert!(sql.contains(") UNION ("));
        assert!(sql.contains("WHERE residues.res_name = $"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn peptides_support_path_operators() {
        let adaptor = PeptideAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_path_match("2P33/1/A/*", FetchArgs::default())
                .await
                .expect("query")
                .expect("ptree available"),
        );
        assert!(sql.contains("peptides.path"));
    }

    #[tokio::test]
    async fn path_operators_need_the_ptree_types() {
        let adaptor = ResidueAdaptor::with_options(
            lazy_credo_without(Capability::PathTree),
            dynamic(),
        );
        let matched = adaptor
            .fetch_all_by_path_match("2P33/1/A/*", FetchArgs::default())
            .await
            .expect("no error");
        assert!(matched.is_none());
        let below = adaptor
            .fetch_all_path_descendants("2P33/1/A", FetchArgs::default())
            .await
            .expect("no error");
        assert!(below.is_none());
        assert!(
            adaptor
                .fetch_all_by_path_match("", FetchArgs::default())
                .await
                .is_err()
        );
    }
}
