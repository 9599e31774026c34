//! Query fragments shared by the similarity kernels.
//!
//! The kernels differ in the cartridge they talk to, but all of them add a
//! `similarity` column to an entity projection, restrict the candidates with
//! an index-friendly predicate and rank by similarity.

use crate::chem::usr::{validate_moments, validate_space, UsrParams, USR_SPACE_DIM};
use crate::chem::{Fingerprint, Metric};
use crate::config::Schema;
use crate::db::{Capability, Credo};
use crate::entity::Entity;
use crate::error::Result;
use crate::query::{Query, Scored, SessionSetting};
use crate::sql::{BinaryOp, ColumnRef, Direction, Expr, Select, Sql};

/// Parameters of a 2D fingerprint search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintSearch {
    pub fingerprint: Fingerprint,
    pub metric: Metric,
    pub threshold: f64,
}

impl Default for FingerprintSearch {
    fn default() -> Self {
        Self {
            fingerprint: Fingerprint::Circular,
            metric: Metric::Tanimoto,
            threshold: 0.5,
        }
    }
}

impl FingerprintSearch {
    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Both halves of RDKit must be enabled for cartridge-side molecule
/// construction.
pub(crate) fn rdkit_available(credo: &Credo, operation: &str) -> bool {
    credo.require(Capability::RdkitClient, operation)
        && credo.require(Capability::RdkitCartridge, operation)
}

/// `<expr>::float8 AS similarity`
pub(crate) fn similarity_column(expr: &Expr) -> Sql {
    let mut sql = expr.to_sql();
    sql.push("::float8 AS similarity");
    sql
}

/// Adds a fingerprint similarity search to `base`, whose fingerprints live
/// in `fp_table` joined on `fp_key = key`.
pub(crate) fn fingerprint_query<T: Entity>(
    base: Select,
    fp_table: &'static str,
    fp_key: ColumnRef,
    key: ColumnRef,
    smiles: &str,
    search: FingerprintSearch,
) -> Query<Scored<T>> {
    let fp = ColumnRef::new(fp_table, search.fingerprint.column());
    let query_fp = search.fingerprint.from_smiles(smiles);
    let similarity = Expr::function(search.metric.function(), vec![fp.expr(), query_fp.clone()]);

    let mut threshold = Expr::value(search.threshold).cast("float8").to_sql();
    threshold.push(" AS threshold");

    let select = base
        .column(similarity_column(&similarity))
        .column(threshold)
        .join(Schema::PdbChem, fp_table, fp_table, fp_key.eq(key))
        .filter(Expr::binary(search.metric.operator(), fp, query_fp))
        .order_by(Sql::text("similarity"), Direction::Desc);

    Query::new(select).with_setting(SessionSetting::Config {
        name: search.metric.threshold_setting(),
        value: search.threshold.to_string(),
    })
}

/// Adds a pg_trgm similarity search over the text column `column`.
pub(crate) fn trigram_query<T: Entity>(
    base: Select,
    column: ColumnRef,
    text: &str,
    threshold: f64,
) -> Query<Scored<T>> {
    let similarity = Expr::function("similarity", vec![column.expr(), Expr::value(text)]);
    let select = base
        .column(similarity_column(&similarity))
        .filter(Expr::binary(BinaryOp::Similar, column, text))
        .order_by(
            Expr::binary(BinaryOp::Distance, column, text).to_sql(),
            Direction::Asc,
        );
    Query::new(select).with_setting(SessionSetting::TrigramLimit(threshold))
}

/// A validated USR shape query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShapeQuery {
    space: Vec<f64>,
    moments: Vec<f64>,
    params: UsrParams,
}

impl ShapeQuery {
    pub(crate) fn new(space: &[f64], moments: &[f64], params: UsrParams) -> Result<Self> {
        validate_moments(moments)?;
        validate_space(space)?;
        Ok(Self {
            space: space.to_vec(),
            moments: moments.to_vec(),
            params,
        })
    }

    pub(crate) fn threshold(&self) -> f64 {
        self.params.threshold
    }

    /// `space <@ cube_enlarge(cube(query), radius, 12)`
    pub(crate) fn probe(&self, space: ColumnRef) -> Expr {
        let envelope = Expr::function(
            "cube_enlarge",
            vec![
                Expr::function("cube", vec![Expr::value(self.space.clone()).cast("float8[]")]),
                Expr::value(self.params.probe_radius),
                Expr::value(USR_SPACE_DIM as i32).cast("int4"),
            ],
        );
        Expr::binary(BinaryOp::ContainedBy, space, envelope)
    }

    /// Server-side USRCAT similarity of `moments` to the query.
    pub(crate) fn similarity(&self, moments: ColumnRef) -> Expr {
        let mut args = vec![
            moments.expr(),
            Expr::value(self.moments.clone()).cast("float8[]"),
        ];
        args.extend(self.params.weights.to_array().into_iter().map(Expr::value));
        Expr::function("arrayxd_usrcatsim", args)
    }
}

/// Wraps `inner` as `T`'s table so the computed similarity can be filtered
/// and ranked like an ordinary column.
pub(crate) fn ranked<T: Entity>(inner: Select, threshold: f64) -> Query<Scored<T>> {
    let similarity = ColumnRef::new(T::TABLE.name, "similarity");
    Query::new(Select::from_subquery(&inner.to_sql(), T::TABLE.name))
        .filter(similarity.ge(threshold))
        .order_by(similarity, Direction::Desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;
    use crate::entity::{ChemComp, ChemCompRDFP};
    use pretty_assertions::assert_eq;

    #[test]
    fn moments_are_validated_before_the_space() {
        let err = ShapeQuery::new(&[0.0; 12], &[0.0; 12], UsrParams::default())
            .expect_err("short moments");
        assert!(err.to_string().contains("60"));
        let err = ShapeQuery::new(&[0.0; 3], &[0.0; 60], UsrParams::default())
            .expect_err("short space");
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn probe_enlarges_the_query_cube() {
        let shape = ShapeQuery::new(&[1.0; 12], &[1.0; 60], UsrParams::default()).expect("valid");
        let probe = shape.probe(ColumnRef::new("ligand_usr", "usr_space"));
        assert_eq!(
            probe.to_sql().to_sql(&SchemaNames::default()),
            "ligand_usr.usr_space <@ cube_enlarge(cube(CAST($1 AS float8[])), $2, CAST($3 AS int4))"
        );
    }

    #[test]
    fn usrcat_similarity_passes_every_weight() {
        let shape = ShapeQuery::new(&[1.0; 12], &[1.0; 60], UsrParams::default()).expect("valid");
        let sql = shape
            .similarity(ColumnRef::new("ligand_usr", "usr_moments"))
            .to_sql();
        assert_eq!(sql.binds().count(), 6);
        assert_eq!(
            sql.to_sql(&SchemaNames::default()),
            "arrayxd_usrcatsim(ligand_usr.usr_moments, CAST($1 AS float8[]), $2, $3, $4, $5, $6)"
        );
    }

    #[test]
    fn fingerprint_search_sets_the_metric_threshold() {
        let query = fingerprint_query::<ChemComp>(
            ChemComp::TABLE.select(),
            ChemCompRDFP::TABLE.name,
            ChemCompRDFP::HET_ID,
            ChemComp::HET_ID,
            "c1ccccc1",
            FingerprintSearch::default().metric(Metric::Dice).threshold(0.7),
        );
        assert_eq!(
            query.settings(),
            &[SessionSetting::Config {
                name: "rdkit.dice_threshold",
                value: "0.7".to_string(),
            }]
        );
        let sql = query.to_sql(&SchemaNames::default());
        assert!(sql.contains(
            "rdkit.dice_sml(chem_comp_rdfps.circular_fp, rdkit.morganbv_fp(rdkit.mol_from_smiles(CAST($1 AS cstring))))::float8 AS similarity"
        ));
        assert!(sql.contains("CAST($2 AS float8) AS threshold"));
        assert!(sql.contains("JOIN pdbchem.chem_comp_rdfps AS chem_comp_rdfps ON chem_comp_rdfps.het_id = chem_comps.het_id"));
        assert!(sql.contains("WHERE chem_comp_rdfps.circular_fp # rdkit.morganbv_fp("));
        assert!(sql.ends_with("ORDER BY similarity DESC"));
    }
}
