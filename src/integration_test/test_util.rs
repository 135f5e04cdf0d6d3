use crate::app_env::test::TEST_DB_URL;
use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use sqlx::{Connection, PgConnection, PgPool, Row};
use std::env;
use std::future::Future;
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

/// Drops databases left behind by earlier test runs
async fn clear_old_dbs(conn: &mut PgConnection) {
    let test_dbs = sqlx::query(
        "SELECT datname FROM pg_catalog.pg_database WHERE datname LIKE 'todo_planner_test_%'",
    )
    .fetch_all(&mut *conn)
    .await;
    let test_dbs: Vec<String> = match test_dbs {
        Ok(rows) => rows.into_iter().map(|row| row.get::<String, _>(0)).collect(),
        Err(error) => {
            println!("Warning: failed to list old test databases. You may need to delete them manually. Error: {error}");
            return;
        }
    };

    for db in test_dbs {
        let result = sqlx::query(&format!("DROP DATABASE IF EXISTS {db}"))
            .execute(&mut *conn)
            .await;
        if result.is_err() {
            println!("Warning: failed to drop old test database {db}, you may need to do it manually.");
        }
    }
}

/// Creates an empty database with a random name, migrates it, and hands a pool for it to [test_fn].
///
/// Expects that the TEST_DB_URL environment variable is populated with a base connection string
/// that has no database name in its path
pub fn prepare_db_and_test<F, R>(test_fn: F)
where
    R: Future<Output = ()>,
    F: FnOnce(PgPool) -> R,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }

    TOKIO_RT.block_on(async move {
        let base_url = env::var(TEST_DB_URL).unwrap_or_else(|_| {
            panic!("You must provide the {TEST_DB_URL} environment variable as the base postgres connection string")
        });
        let db_name = format!("todo_planner_test_{}", thread_rng().gen_range(10_000..99_999));

        let mut admin_conn = PgConnection::connect(&format!("{base_url}/postgres"))
            .await
            .expect("Test failure - could not create initial connection to provision database.");
        clear_old_dbs(&mut admin_conn).await;
        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&mut admin_conn)
            .await
            .unwrap_or_else(|err| panic!("Failed to create test database {db_name}: {err}"));
        let _ = admin_conn.close().await;

        let pool = PgPool::connect(&format!("{base_url}/{db_name}"))
            .await
            .expect("Could not connect to the test database");
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("Could not migrate the test database");

        test_fn(pool).await;
    });
}
