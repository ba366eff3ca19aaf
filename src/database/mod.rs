use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPoolOptions, MySqlStatement},
    Executor, MySqlPool, Statement,
};

use crate::{config, database::table::price::Price};

pub mod table;

/// The seam between the insert logic and the actual database.
///
/// A statement is prepared and executed in two steps so a failed prepare can
/// be told apart from a failed execution.
#[async_trait]
pub trait Repository: Send + Sync {
    type Statement: Send + Sync;

    /// Prepares `sql` on the server.
    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement>;

    /// Executes a prepared insert for `price` and returns the affected row count.
    async fn execute(&self, statement: &Self::Statement, price: &Price) -> Result<u64>;
}

#[async_trait]
impl<T: Repository> Repository for Arc<T> {
    type Statement = T::Statement;

    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement> {
        self.as_ref().prepare(sql).await
    }

    async fn execute(&self, statement: &Self::Statement, price: &Price) -> Result<u64> {
        self.as_ref().execute(statement, price).await
    }
}

/// MySQL connection pool wrapper.
pub struct MySql {
    pool: MySqlPool,
}

impl MySql {
    /// Opens the pool and checks that the server is reachable.
    ///
    /// # Errors
    /// Fails when no connection can be established with the given settings.
    pub async fn connect(settings: &config::Database) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            // a single poll task is the only writer
            .max_connections(2)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .max_lifetime(Some(Duration::from_secs(1800)))
            .connect_with(settings.connect_options())
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to mysql at {}:{}/{}",
                    settings.host, settings.port, settings.dbname
                )
            })?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for MySql {
    type Statement = MySqlStatement<'static>;

    async fn prepare(&self, sql: &'static str) -> Result<Self::Statement> {
        Ok(self.pool().prepare(sql).await?)
    }

    async fn execute(&self, statement: &Self::Statement, price: &Price) -> Result<u64> {
        let result = statement
            .query()
            .bind(price.ticker.clone())
            .bind(price.currency.clone())
            .bind(price.price)
            .bind(price.volume)
            .bind(price.delta)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
