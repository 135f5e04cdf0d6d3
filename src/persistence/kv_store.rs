//! Collections are stored whole, one JSON array per named store in the `app_store` table.

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::types::Json;
use sqlx::{Connection, PgConnection, query, query_scalar};
use tracing::debug;

pub const TODOS_STORE: &str = "todos-storage";
pub const USERS_STORE: &str = "users-storage";

/// Reads every record in [store_name]. A store that was never written reads as empty.
pub async fn load_collection<T>(
    store_name: &str,
    cxn: &mut PgConnection,
) -> Result<Vec<T>, anyhow::Error>
where
    T: DeserializeOwned + Send + Unpin + 'static,
{
    let payload = query_scalar::<_, Json<Vec<T>>>(
        "SELECT payload FROM app_store WHERE store_name = $1",
    )
    .bind(store_name)
    .fetch_optional(&mut *cxn)
    .await
    .with_context(|| format!("trying to load the {store_name} store"))?;

    Ok(payload.map(|Json(records)| records).unwrap_or_default())
}

/// Loads [store_name], lets [change] modify the records and writes the result back.
///
/// The store's row stays locked for the whole read-modify-write, so concurrent changes to the
/// same store are applied one after another instead of overwriting each other.
pub async fn update_collection<T, R>(
    store_name: &str,
    cxn: &mut PgConnection,
    change: impl FnOnce(&mut Vec<T>) -> R,
) -> Result<R, anyhow::Error>
where
    T: Serialize + DeserializeOwned + Send + Unpin + 'static,
{
    let mut txn = cxn
        .begin()
        .await
        .with_context(|| format!("starting a transaction on the {store_name} store"))?;

    query(
        "INSERT INTO app_store(store_name, payload) VALUES ($1, '[]'::jsonb) \
         ON CONFLICT (store_name) DO NOTHING",
    )
    .bind(store_name)
    .execute(&mut *txn)
    .await
    .with_context(|| format!("trying to initialize the {store_name} store"))?;

    let Json(mut records) = query_scalar::<_, Json<Vec<T>>>(
        "SELECT payload FROM app_store WHERE store_name = $1 FOR UPDATE",
    )
    .bind(store_name)
    .fetch_one(&mut *txn)
    .await
    .with_context(|| format!("trying to lock the {store_name} store"))?;

    let outcome = change(&mut records);
    debug!(store_name, record_count = records.len(), "Saving store");

    query("UPDATE app_store SET payload = $2, updated_at = now() WHERE store_name = $1")
        .bind(store_name)
        .bind(Json(&records))
        .execute(&mut *txn)
        .await
        .with_context(|| format!("trying to save the {store_name} store"))?;

    txn.commit()
        .await
        .with_context(|| format!("committing changes to the {store_name} store"))?;

    Ok(outcome)
}
