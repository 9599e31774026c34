use super::{adaptor, FetchArgs, Fetched};
use crate::entity::{Entity, XRef};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{Direction, Select, Sql};

adaptor!(
    /// Cross-references between CREDO entities and external databases.
    XRefAdaptor
);

impl XRefAdaptor {
    pub async fn fetch_by_xref_id(&self, xref_id: i32) -> Result<Option<XRef>> {
        self.core
            .fetch_one(XRef::query().filter(XRef::XREF_ID.eq(xref_id)))
            .await
    }

    /// All cross-references of one entity, e.g. `("Chain", 42)`.
    pub async fn fetch_all_by_entity(
        &self,
        entity_type: &str,
        entity_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<XRef>> {
        let query = XRef::query()
            .filter(XRef::ENTITY_TYPE.eq(entity_type))
            .filter(XRef::ENTITY_ID.eq(entity_id))
            .order_by(XRef::XREF_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Every mapping of an external identifier, e.g. `("UniProt", "P00519")`.
    pub async fn fetch_all_by_xref(
        &self,
        source: &str,
        xref: &str,
        args: FetchArgs,
    ) -> Result<Fetched<XRef>> {
        let query = XRef::query()
            .filter(XRef::SOURCE.eq(source))
            .filter(XRef::XREF.eq(xref))
            .order_by(XRef::XREF_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Identifiers of the entities of one type carrying an external identifier.
    pub async fn fetch_entity_ids(
        &self,
        entity_type: &str,
        source: &str,
        xref: &str,
    ) -> Result<Vec<i32>> {
        let rows = entity_ids(entity_type, source, xref)
            .all(self.core.credo())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn entity_ids(entity_type: &str, source: &str, xref: &str) -> Query<(i32,)> {
    let select = Select::from_table(XRef::TABLE.schema, XRef::TABLE.name, XRef::TABLE.name)
        .distinct()
        .column(Sql::text("xrefs.entity_id"))
        .filter(XRef::ENTITY_TYPE.eq(entity_type))
        .filter(XRef::SOURCE.eq(source))
        .filter(XRef::XREF.eq(xref))
        .order_by_column(XRef::ENTITY_ID, Direction::Asc);
    Query::new(select)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::config::SchemaNames;
    use crate::db::testing::lazy_credo;
    use pretty_assertions::assert_eq;

    #[test]
    fn entity_ids_are_distinct_and_ordered() {
        let sql = entity_ids("Chain", "UniProt", "P00519").to_sql(&SchemaNames::default());
        assert_eq!(
            sql,
            "SELECT DISTINCT xrefs.entity_id FROM credo.xrefs AS xrefs \
             WHERE (xrefs.entity_type = $1) AND (xrefs.source = $2) AND (xrefs.xref = $3) \
             ORDER BY xrefs.entity_id ASC"
        );
    }

    #[tokio::test]
    async fn entity_xrefs_filter_type_and_id() {
        let adaptor = XRefAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_entity("ChemComp", 11, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("WHERE (xrefs.entity_type = $1) AND (xrefs.entity_id = $2)"));
        assert!(sql.ends_with("ORDER BY xrefs.xref_id ASC"));
    }
}
