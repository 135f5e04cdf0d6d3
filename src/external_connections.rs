use reqwest_middleware::ClientWithMiddleware;
use sqlx::PgConnection;

/// Something that can lend out a live database connection
pub trait ConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// The external systems driven adapters talk to. Domain logic only ever sees this trait,
/// so tests can hand in a fake and adapters can be swapped out freely.
pub trait ExternalConnectivity {
    type DbHandle<'cxn_borrow>: ConnectionHandle
    where
        Self: 'cxn_borrow;

    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;

    fn http_client(&self) -> &ClientWithMiddleware;
}
