use tracing::debug;

use super::similarity::{
    fingerprint_query, rdkit_available, similarity_column, trigram_query, FingerprintSearch,
    ShapeQuery,
};
use super::{adaptor, FetchArgs, Fetched};
use crate::chem::{OeMetric, StructureMatch, UsrParams};
use crate::config::Schema;
use crate::db::Capability;
use crate::entity::{
    ChemComp, ChemCompConformer, ChemCompFragment, ChemCompRDFP, ChemCompRDMol, Entity,
};
use crate::error::Result;
use crate::query::{Query, Scored, SessionSetting};
use crate::sql::{ColumnRef, Direction, Expr, Select, Sql};

/// OpenEye circular fingerprints, one row per chemical component.
const OE_FP_TABLE: &str = "chem_comp_oefps";
const OE_FP_HET_ID: ColumnRef = ColumnRef::new(OE_FP_TABLE, "het_id");
const OE_FP_CIRCULAR: ColumnRef = ColumnRef::new(OE_FP_TABLE, "circular_fp");

/// Best conformer similarity per HET-ID.
const HITS_HET_ID: ColumnRef = ColumnRef::new("hits", "het_id");
const HITS_SIMILARITY: ColumnRef = ColumnRef::new("hits", "similarity");

adaptor!(
    /// Chemical components of the PDB chemical dictionary.
    ChemCompAdaptor
);

impl ChemCompAdaptor {
    pub async fn fetch_by_chem_comp_id(&self, chem_comp_id: i32) -> Result<Option<ChemComp>> {
        self.core
            .fetch_one(ChemComp::query().filter(ChemComp::CHEM_COMP_ID.eq(chem_comp_id)))
            .await
    }

    pub async fn fetch_by_het_id(&self, het_id: &str) -> Result<Option<ChemComp>> {
        let query = ChemComp::query().filter(ChemComp::HET_ID.eq(het_id.trim().to_ascii_uppercase()));
        self.core.fetch_one(query).await
    }

    /// Chemical components the fragment was derived from.
    pub async fn fetch_all_by_fragment_id(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ChemComp>> {
        let query = ChemComp::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::PdbChem,
                    ChemCompFragment::TABLE.name,
                    ChemCompFragment::TABLE.name,
                    ChemCompFragment::HET_ID.eq(ChemComp::HET_ID),
                )
            })
            .filter(ChemCompFragment::FRAGMENT_ID.eq(fragment_id))
            .order_by(ChemComp::HET_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Chemical components matching `pattern` under `mode`, ordered by
    /// HET-ID. `None` when RDKit is unavailable.
    pub async fn fetch_all_by_structure_match(
        &self,
        pattern: &str,
        mode: StructureMatch,
        args: FetchArgs,
    ) -> Result<Option<Fetched<ChemComp>>> {
        if !rdkit_available(self.core.credo(), "chemcomp.fetch_all_by_structure_match") {
            return Ok(None);
        }
        let query = ChemComp::query()
            .map_select(|s| {
                s.join(
                    Schema::PdbChem,
                    ChemCompRDMol::TABLE.name,
                    ChemCompRDMol::TABLE.name,
                    ChemCompRDMol::HET_ID.eq(ChemComp::HET_ID),
                )
            })
            .filter(mode.predicate(ChemCompRDMol::RDMOL, pattern))
            .order_by(ChemComp::HET_ID, Direction::Asc);
        self.core.fetch_all(query, args).await.map(Some)
    }

    pub async fn fetch_all_by_substruct(
        &self,
        smiles: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<ChemComp>>> {
        self.fetch_all_by_structure_match(smiles, StructureMatch::Substructure, args)
            .await
    }

    pub async fn fetch_all_by_superstruct(
        &self,
        smiles: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<ChemComp>>> {
        self.fetch_all_by_structure_match(smiles, StructureMatch::Superstructure, args)
            .await
    }

    pub async fn fetch_all_by_smarts(
        &self,
        smarts: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<ChemComp>>> {
        self.fetch_all_by_structure_match(smarts, StructureMatch::Smarts, args)
            .await
    }

    /// RDKit fingerprint similarity to a SMILES query, best first.
    pub async fn fetch_all_by_sim_fp(
        &self,
        smiles: &str,
        search: FingerprintSearch,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<ChemComp>>>> {
        if !rdkit_available(self.core.credo(), "chemcomp.fetch_all_by_sim_fp") {
            return Ok(None);
        }
        debug!(
            stage = "adaptor",
            event = "chemcomp.sim_fp",
            fingerprint = %search.fingerprint,
            metric = %search.metric,
            threshold = search.threshold
        );
        let query = fingerprint_query::<ChemComp>(
            ChemComp::TABLE.select(),
            ChemCompRDFP::TABLE.name,
            ChemCompRDFP::HET_ID,
            ChemComp::HET_ID,
            smiles,
            search,
        );
        self.core.fetch_all(query, args).await.map(Some)
    }

    /// Trigram similarity of the stored isomeric SMILES to `smiles`.
    pub async fn fetch_all_by_trigram(
        &self,
        smiles: &str,
        threshold: f64,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<ChemComp>>>> {
        if !self
            .core
            .credo()
            .require(Capability::Trigram, "chemcomp.fetch_all_by_trigram")
        {
            return Ok(None);
        }
        let query =
            trigram_query::<ChemComp>(ChemComp::TABLE.select(), ChemComp::ISM, smiles, threshold);
        self.core.fetch_all(query, args).await.map(Some)
    }

    /// Shape similarity over all conformers; each chemical component scores
    /// with its best conformer.
    pub async fn fetch_all_by_usr(
        &self,
        usr_space: &[f64],
        usr_moments: &[f64],
        params: UsrParams,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<ChemComp>>>> {
        let shape = ShapeQuery::new(usr_space, usr_moments, params)?;
        if !self.core.credo().require(Capability::Cube, "chemcomp.fetch_all_by_usr") {
            return Ok(None);
        }

        let similarity = shape.similarity(ChemCompConformer::USR_MOMENTS);
        let mut best = Sql::text("MAX(");
        best.append(&similarity.to_sql())
            .push(")::float8 AS similarity");
        let hits = Select::from_table(
            Schema::PdbChem,
            ChemCompConformer::TABLE.name,
            ChemCompConformer::TABLE.name,
        )
        .column(ChemCompConformer::HET_ID.to_sql())
        .column(best)
        .filter(shape.probe(ChemCompConformer::USR_SPACE))
        .group_by(ChemCompConformer::HET_ID.to_sql())
        .having(Expr::function("MAX", vec![similarity]).ge(shape.threshold()));

        let select = ChemComp::TABLE
            .select()
            .column(HITS_SIMILARITY.to_sql())
            .join_named("hits", "hits", HITS_HET_ID.eq(ChemComp::HET_ID))
            .with("hits", hits.to_sql());
        let query = Query::<Scored<ChemComp>>::new(select)
            .order_by(HITS_SIMILARITY, Direction::Desc);
        self.core.fetch_all(query, args).await.map(Some)
    }

    /// OpenEye fingerprint similarity above `threshold` under `metric`.
    pub async fn fetch_all_by_oe_sim(
        &self,
        smiles: &str,
        metric: OeMetric,
        threshold: f64,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<ChemComp>>>> {
        if !self
            .core
            .credo()
            .require(Capability::OpenEye, "chemcomp.fetch_all_by_oe_sim")
        {
            return Ok(None);
        }

        let query_fp = Expr::function(
            "openeye.make_circular_fp",
            vec![Expr::value(smiles).cast("text")],
        );
        let similarity = Expr::function(
            metric.function(),
            vec![OE_FP_CIRCULAR.expr(), query_fp.clone()],
        );
        let above_limit = Expr::function(metric.predicate(), vec![OE_FP_CIRCULAR.expr(), query_fp]);

        let select = ChemComp::TABLE
            .select()
            .column(similarity_column(&similarity))
            .join(
                Schema::PdbChem,
                OE_FP_TABLE,
                OE_FP_TABLE,
                OE_FP_HET_ID.eq(ChemComp::HET_ID),
            )
            .filter(above_limit)
            .order_by(Sql::text("similarity"), Direction::Desc);
        let query = Query::<Scored<ChemComp>>::new(select).with_setting(
            SessionSetting::OpenEyeLimit {
                metric: metric.name(),
                value: threshold,
            },
        );
        self.core.fetch_all(query, args).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::chem::{Fingerprint, Metric};
    use crate::db::testing::{lazy_credo, lazy_credo_without};

    #[tokio::test]
    async fn substructure_search_joins_the_rdkit_molecules() {
        let adaptor = ChemCompAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_substruct("c1cc(cnc1)c2ccncn2", FetchArgs::default())
                .await
                .expect("query")
                .expect("rdkit enabled"),
        );
        assert!(sql.contains(
            "JOIN pdbchem.chem_comp_rdmols AS chem_comp_rdmols ON chem_comp_rdmols.het_id = chem_comps.het_id"
        ));
        assert!(sql.contains("chem_comp_rdmols.rdmol @> rdkit.mol_from_smiles(CAST($1 AS cstring))"));
        assert!(sql.ends_with("ORDER BY chem_comps.het_id ASC"));
    }

    #[tokio::test]
    async fn rdkit_searches_return_none_without_the_cartridge() {
        let adaptor = ChemCompAdaptor::new(lazy_credo_without(Capability::RdkitCartridge));
        let fetched = adaptor
            .fetch_all_by_smarts("[#6]~[#7]", FetchArgs::default())
            .await
            .expect("soft failure");
        assert!(fetched.is_none());

        let fetched = adaptor
            .fetch_all_by_sim_fp("c1ccccc1", FingerprintSearch::default(), FetchArgs::default())
            .await
            .expect("soft failure");
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn fingerprint_search_carries_its_threshold_setting() {
        let adaptor = ChemCompAdaptor::with_options(lazy_credo(), dynamic());
        let search = FingerprintSearch::default()
            .fingerprint(Fingerprint::Maccs)
            .metric(Metric::Tanimoto)
            .threshold(0.4);
        let query = adaptor
            .fetch_all_by_sim_fp("c1ccccc1", search, FetchArgs::default().limit(5))
            .await
            .expect("query")
            .expect("rdkit enabled")
            .into_query()
            .expect("handle");
        assert_eq!(query.settings().len(), 1);
        let sql = query.to_sql(&crate::config::SchemaNames::default());
        assert!(sql.contains("chem_comp_rdfps.maccs_fp % rdkit.maccs_fp("));
        assert!(sql.ends_with("ORDER BY similarity DESC LIMIT 5"));
    }

    #[tokio::test]
    async fn trigram_search_ranks_with_the_distance_operator() {
        let adaptor = ChemCompAdaptor::with_options(lazy_credo(), dynamic());
        let query = adaptor
            .fetch_all_by_trigram("Cc1ccc(cc1)C", 0.6, FetchArgs::default())
            .await
            .expect("query")
            .expect("pg_trgm enabled")
            .into_query()
            .expect("handle");
        assert_eq!(query.settings(), &[SessionSetting::TrigramLimit(0.6)]);
        let sql = query.to_sql(&crate::config::SchemaNames::default());
        assert!(sql.contains("similarity(chem_comps.ism, $1)::float8 AS similarity"));
        assert!(sql.contains("WHERE chem_comps.ism % $2"));
        assert!(sql.ends_with("ORDER BY chem_comps.ism <-> $3 ASC"));
    }

    #[tokio::test]
    async fn usr_search_keeps_the_best_conformer() {
        let adaptor = ChemCompAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_usr(&[0.5; 12], &[0.5; 60], UsrParams::default(), FetchArgs::default())
                .await
                .expect("query")
                .expect("cube enabled"),
        );
        assert!(sql.starts_with("WITH hits AS (SELECT chem_comp_conformers.het_id, MAX(arrayxd_usrcatsim("));
        assert!(sql.contains("GROUP BY chem_comp_conformers.het_id HAVING MAX(arrayxd_usrcatsim("));
        assert!(sql.contains("JOIN hits AS hits ON hits.het_id = chem_comps.het_id"));
        assert!(sql.ends_with("ORDER BY hits.similarity DESC"));
    }

    #[tokio::test]
    async fn openeye_similarity_sets_the_metric_limit() {
        let adaptor = ChemCompAdaptor::with_options(lazy_credo(), dynamic());
        let query = adaptor
            .fetch_all_by_oe_sim("c1ccccc1", OeMetric::Cosine, 0.7, FetchArgs::default())
            .await
            .expect("query")
            .expect("openeye enabled")
            .into_query()
            .expect("handle");
        assert_eq!(
            query.settings(),
            &[SessionSetting::OpenEyeLimit {
                metric: "cosine",
                value: 0.7
            }]
        );
        let sql = query.to_sql(&crate::config::SchemaNames::default());
        assert!(sql.contains("WHERE openeye.cosine_is_above_limit(chem_comp_oefps.circular_fp, openeye.make_circular_fp("));
    }
}
