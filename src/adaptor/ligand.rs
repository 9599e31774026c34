use tracing::debug;

use super::similarity::{ranked, similarity_column, ShapeQuery};
use super::{adaptor, path_ops, FetchArgs, Fetched};
use crate::chem::{FuzcavFingerprint, FuzcavMetric, LigandMatch, UsrParams};
use crate::config::Schema;
use crate::db::Capability;
use crate::entity::{
    BindingSiteFuzcav, Biomolecule, Chain, Entity, Ligand, LigandComponent, LigandMolString,
    LigandUsr, Variation2BindingSite,
};
use crate::error::Result;
use crate::query::{Query, Scored};
use crate::sql::{ColumnRef, Direction, Expr, Select, Sql};

/// Hits returned by a FuzCav search when the caller sets no limit.
pub const FUZCAV_TOP_HITS: i64 = 100;

/// The binding site a FuzCav search compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzcavQuery {
    /// The stored fingerprint of another ligand's binding site.
    Ligand(i32),
    /// A caller-supplied count vector.
    Fingerprint(Vec<i32>),
}

impl FuzcavQuery {
    fn to_expr(&self, fingerprint: FuzcavFingerprint) -> Expr {
        match self {
            FuzcavQuery::Ligand(ligand_id) => {
                let query_site = ColumnRef::new("query_site", "ligand_id");
                let select = Select::from_table(
                    Schema::Credo,
                    BindingSiteFuzcav::TABLE.name,
                    "query_site",
                )
                .column(Sql::text(format!("query_site.{}", fingerprint.column())))
                .filter(query_site.eq(*ligand_id));
                let mut sql = Sql::text("(");
                sql.append(&select.to_sql()).push(")");
                Expr::raw(sql)
            }
            FuzcavQuery::Fingerprint(counts) => Expr::value(counts.clone()).cast("int4[]"),
        }
    }
}

adaptor!(LigandAdaptor);
path_ops!(LigandAdaptor, Ligand);

impl LigandAdaptor {
    pub async fn fetch_by_ligand_id(&self, ligand_id: i32) -> Result<Option<Ligand>> {
        self.core
            .fetch_one(Ligand::query().filter(Ligand::LIGAND_ID.eq(ligand_id)))
            .await
    }

    pub async fn fetch_all_by_structure_id(
        &self,
        structure_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Ligand>> {
        let query = Ligand::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    Biomolecule::TABLE.name,
                    Biomolecule::TABLE.name,
                    Biomolecule::BIOMOLECULE_ID.eq(Ligand::BIOMOLECULE_ID),
                )
            })
            .filter(Biomolecule::STRUCTURE_ID.eq(structure_id))
            .order_by(Ligand::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Ligand>> {
        let query = Ligand::query()
            .filter(Ligand::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Ligand::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Ligands sharing the PDB chain identifier of a polymer chain.
    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Ligand>> {
        let query = Ligand::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    Chain::TABLE.name,
                    Chain::TABLE.name,
                    Expr::and([
                        Chain::BIOMOLECULE_ID.eq(Ligand::BIOMOLECULE_ID),
                        Chain::PDB_CHAIN_ID.eq(Ligand::PDB_CHAIN_ID),
                    ]),
                )
            })
            .filter(Chain::CHAIN_ID.eq(chain_id))
            .filter(Ligand::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Ligand::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Ligands containing the chemical component at least once.
    pub async fn fetch_all_by_het_id(&self, het_id: &str, args: FetchArgs) -> Result<Fetched<Ligand>> {
        let query = Ligand::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::Credo,
                    LigandComponent::TABLE.name,
                    LigandComponent::TABLE.name,
                    LigandComponent::LIGAND_ID.eq(Ligand::LIGAND_ID),
                )
            })
            .filter(LigandComponent::HET_ID.eq(het_id.trim().to_ascii_uppercase()))
            .order_by(Ligand::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Ligands whose binding site carries the variation.
    pub async fn fetch_all_by_variation_id(
        &self,
        variation_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Ligand>> {
        let query = Ligand::query()
            .map_select(|s| {
                s.distinct().join(
                    Variation2BindingSite::TABLE.schema,
                    Variation2BindingSite::TABLE.name,
                    Variation2BindingSite::TABLE.name,
                    Variation2BindingSite::LIGAND_ID.eq(Ligand::LIGAND_ID),
                )
            })
            .filter(Variation2BindingSite::VARIATION_ID.eq(variation_id))
            .order_by(Ligand::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Ligands containing a SMILES or SMARTS substructure, with the names of
    /// the matching atoms. Needs the OpenEye cartridge; `None` without it.
    pub async fn fetch_all_ligand_matches(
        &self,
        pattern: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<LigandMatch>>> {
        if !self
            .core
            .credo()
            .require(Capability::OpenEye, "ligand.fetch_all_ligand_matches")
        {
            return Ok(None);
        }

        let (filters, shape) = args.split();
        let mut pattern_column = Expr::value(pattern).cast("text").to_sql();
        pattern_column.push(" AS pattern");
        let atom_names = Expr::function(
            "openeye.match_atom_names",
            vec![LigandMolString::OEB.expr(), Expr::value(pattern).cast("text")],
        );
        let mut atom_names = atom_names.to_sql();
        atom_names.push("::text[] AS atom_names");

        let matches = Select::from_table(Schema::Credo, Ligand::TABLE.name, Ligand::TABLE.name)
            .column(Ligand::LIGAND_ID.to_sql())
            .column(Ligand::BIOMOLECULE_ID.to_sql())
            .column(LigandMolString::ISM.to_sql())
            .column(pattern_column)
            .column(atom_names)
            .join(
                Schema::Credo,
                LigandMolString::TABLE.name,
                LigandMolString::TABLE.name,
                LigandMolString::LIGAND_ID.eq(Ligand::LIGAND_ID),
            )
            .filters(filters);

        let query = Query::<LigandMatch>::new(Select::from_subquery(
            &matches.to_sql(),
            "ligand_matches",
        ))
        .filter(Expr::function("cardinality", vec![LigandMatch::ATOM_NAMES.expr()]).gt(0))
        .order_by(LigandMatch::LIGAND_ID, Direction::Asc);

        self.core.finalize(query, shape).await.map(Some)
    }

    /// Ligands of similar shape. Moments are validated first; a missing cube
    /// extension yields `None`.
    pub async fn fetch_all_by_usr(
        &self,
        usr_space: &[f64],
        usr_moments: &[f64],
        params: UsrParams,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<Ligand>>>> {
        let shape = ShapeQuery::new(usr_space, usr_moments, params)?;
        if !self.core.credo().require(Capability::Cube, "ligand.fetch_all_by_usr") {
            return Ok(None);
        }
        debug!(
            stage = "adaptor",
            event = "ligand.usr",
            threshold = shape.threshold()
        );

        let inner = Ligand::TABLE
            .select()
            .column(similarity_column(&shape.similarity(LigandUsr::USR_MOMENTS)))
            .join(
                Schema::Credo,
                LigandUsr::TABLE.name,
                LigandUsr::TABLE.name,
                LigandUsr::LIGAND_ID.eq(Ligand::LIGAND_ID),
            )
            .filter(shape.probe(LigandUsr::USR_SPACE));

        let query = ranked::<Ligand>(inner, shape.threshold());
        self.core.fetch_all(query, args).await.map(Some)
    }

    /// Ligands whose binding site resembles the query site. Returns the top
    /// hits only; the adaptor's paginate flag is ignored.
    pub async fn fetch_all_by_fuzcav(
        &self,
        query: &FuzcavQuery,
        fingerprint: FuzcavFingerprint,
        metric: FuzcavMetric,
        threshold: f64,
        args: FetchArgs,
    ) -> Result<Fetched<Scored<Ligand>>> {
        let (filters, mut shape) = args.split();
        shape.limit = shape.limit.or(Some(FUZCAV_TOP_HITS));

        let stored = ColumnRef::new(BindingSiteFuzcav::TABLE.name, fingerprint.column());
        let similarity = Expr::function(metric.function(), vec![stored.expr(), query.to_expr(fingerprint)]);
        let inner = Ligand::TABLE
            .select()
            .column(similarity_column(&similarity))
            .join(
                Schema::Credo,
                BindingSiteFuzcav::TABLE.name,
                BindingSiteFuzcav::TABLE.name,
                BindingSiteFuzcav::LIGAND_ID.eq(Ligand::LIGAND_ID),
            );

        let query = ranked::<Ligand>(inner, threshold).filters(filters);
        self.core.finalize_unpaged(query, shape).await
    }
}

adaptor!(LigandComponentAdaptor);

impl LigandComponentAdaptor {
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<LigandComponent>> {
        let query = LigandComponent::query()
            .filter(LigandComponent::LIGAND_ID.eq(ligand_id))
            .order_by(LigandComponent::RESIDUE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_het_id(
        &self,
        het_id: &str,
        args: FetchArgs,
    ) -> Result<Fetched<LigandComponent>> {
        let query = LigandComponent::query()
            .filter(LigandComponent::HET_ID.eq(het_id.trim().to_ascii_uppercase()))
            .order_by(LigandComponent::LIGAND_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::chem::UsrWeights;
    use crate::config::SchemaNames;
    use crate::db::testing::{lazy_credo, lazy_credo_without};
    use crate::error::CredoError;
    use crate::sql::Value;

    #[tokio::test]
    async fn ligands_of_a_chain_match_on_pdb_chain_id() {
        let adaptor = LigandAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_chain_id(4, 7, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "JOIN credo.chains AS chains ON (chains.biomolecule_id = ligands.biomolecule_id) AND (chains.pdb_chain_id = ligands.pdb_chain_id)"
        ));
        assert!(sql.contains("WHERE (chains.chain_id = $1) AND (ligands.biomolecule_id = $2)"));
    }

    #[tokio::test]
    async fn ligand_matches_keep_only_hits_with_atoms() {
        let adaptor = LigandAdaptor::with_options(lazy_credo(), dynamic());
        let fetched = adaptor
            .fetch_all_ligand_matches("c1ccncc1", FetchArgs::from(Ligand::IS_INCOMPLETE.is_false()))
            .await
            .expect("query")
            .expect("openeye enabled");
        let sql = rendered(fetched);
        assert!(sql.contains("CAST($1 AS text) AS pattern"));
        assert!(sql.contains(
            "openeye.match_atom_names(ligand_molstrings.oeb, CAST($2 AS text))::text[] AS atom_names"
        ));
        assert!(sql.contains("WHERE ligands.is_incomplete = $3) AS ligand_matches"));
        assert!(sql.ends_with(
            "WHERE cardinality(ligand_matches.atom_names) > $4 ORDER BY ligand_matches.ligand_id ASC"
        ));
    }

    #[tokio::test]
    async fn ligand_matches_need_openeye() {
        let adaptor = LigandAdaptor::new(lazy_credo_without(Capability::OpenEye));
        let fetched = adaptor
            .fetch_all_ligand_matches("c1ccncc1", FetchArgs::default())
            .await
            .expect("soft failure");
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn usr_search_rejects_short_moment_vectors() {
        let adaptor = LigandAdaptor::with_options(lazy_credo(), dynamic());
        let err = adaptor
            .fetch_all_by_usr(&[0.0; 12], &[0.0; 59], UsrParams::default(), FetchArgs::default())
            .await
            .expect_err("59 moments");
        assert!(matches!(err, CredoError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn usr_search_ranks_by_similarity() {
        let adaptor = LigandAdaptor::with_options(lazy_credo(), dynamic());
        let params = UsrParams::default().threshold(0.8).weights(UsrWeights::classic());
        let sql = rendered(
            adaptor
                .fetch_all_by_usr(&[1.0; 12], &[1.0; 60], params, FetchArgs::default().limit(10))
                .await
                .expect("query")
                .expect("cube enabled"),
        );
        assert!(sql.contains("JOIN credo.ligand_usr AS ligand_usr ON ligand_usr.ligand_id = ligands.ligand_id"));
        assert!(sql.contains("ligand_usr.usr_space <@ cube_enlarge("));
        assert!(sql.contains(") AS ligands WHERE ligands.similarity >= $"));
        assert!(sql.ends_with("ORDER BY ligands.similarity DESC LIMIT 10"));
    }

    #[test]
    fn fuzcav_query_from_a_ligand_reads_its_stored_site() {
        let expr = FuzcavQuery::Ligand(42).to_expr(FuzcavFingerprint::Rep);
        assert_eq!(
            expr.to_sql().to_sql(&SchemaNames::default()),
            "(SELECT query_site.rep FROM credo.binding_site_fuzcav AS query_site WHERE query_site.ligand_id = $1)"
        );
    }

    #[tokio::test]
    async fn fuzcav_search_defaults_to_top_hits() {
        let adaptor = LigandAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_fuzcav(
                    &FuzcavQuery::Fingerprint(vec![0, 1, 2]),
                    FuzcavFingerprint::Calpha,
                    FuzcavMetric::Ochiai,
                    0.6,
                    FetchArgs::default(),
                )
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "arrayxi_ochiai(binding_site_fuzcav.calpha, CAST($1 AS int4[]))::float8 AS similarity"
        ));
        assert!(sql.ends_with("ORDER BY ligands.similarity DESC LIMIT 100"));
    }

    #[tokio::test]
    async fn components_by_het_id_are_upper_cased() {
        let adaptor = LigandComponentAdaptor::with_options(lazy_credo(), dynamic());
        let query = adaptor
            .fetch_all_by_het_id("sti", FetchArgs::default())
            .await
            .expect("query")
            .into_query()
            .expect("handle");
        let sql = query.statement();
        assert!(sql.binds().any(|value| value == &Value::from("STI")));
    }
}
