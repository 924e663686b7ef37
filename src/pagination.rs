use serde::de::DeserializeOwned;

use crate::{
    error::StoreError,
    models::Page,
    query::ListQuery,
    repository::{Collection, DocumentStore},
};

/// paginate
///
/// Counts the matching documents, fetches the `[(page-1)*limit, page*limit)` window in sort
/// order and decodes it into `T`. A page past the end yields empty `results` with the totals
/// still filled in. `query.limit` and `query.page` are already clamped to at least 1 by
/// `ListQuery::from_params`.
pub async fn paginate<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    query: &ListQuery,
) -> Result<Page<T>, StoreError> {
    let limit = query.limit.max(1);
    let page = query.page.max(1);

    let total_results = store.count(collection, &query.filter).await?;
    let total_pages = total_results.div_ceil(limit);

    let skip = (page - 1).saturating_mul(limit);
    let results = if skip >= total_results {
        vec![]
    } else {
        store
            .find(collection, &query.filter, &query.sort, skip, limit)
            .await?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?
    };

    tracing::debug!(
        collection = collection.table(),
        page,
        limit,
        total_results,
        "paginated query"
    );

    Ok(Page {
        results,
        page,
        limit,
        total_pages,
        total_results,
    })
}
