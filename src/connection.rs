//! Database connection handle and migration ledger access.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use url::Url;

use crate::error::{Error, Result};
use crate::inspect::{DialectInspector, MySqlInspector, PostgresInspector};
use crate::schema::Dialect;

/// An open pool to one of the supported engines.
#[derive(Debug, Clone)]
pub enum Connection {
    MySql { pool: MySqlPool, database: String },
    Postgres { pool: PgPool, schema: String },
}

/// Database name carried in the path of a MySQL url, if any.
fn database_from_url(url: &Url) -> Option<String> {
    let name = url.path().trim_start_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

fn quote_mysql(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn quote_pg(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl Connection {
    /// Open a pool for `url`. `schema` is the PostgreSQL schema to inspect.
    pub async fn connect(url: &str, schema: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let dialect = Dialect::from_scheme(parsed.scheme())
            .ok_or_else(|| Error::UnsupportedScheme(parsed.scheme().to_string()))?;
        let host = parsed.host_str().unwrap_or("localhost");
        log::debug!("connecting to {} database at {}", dialect, host);

        match dialect {
            Dialect::Mysql => {
                let pool = MySqlPoolOptions::new().max_connections(1).connect(url).await?;
                let database = match database_from_url(&parsed) {
                    Some(name) => name,
                    None => sqlx::query_scalar::<_, Option<String>>("SELECT DATABASE()")
                        .fetch_one(&pool)
                        .await?
                        .ok_or(Error::NoDatabase)?,
                };
                Ok(Connection::MySql { pool, database })
            }
            Dialect::Postgres => {
                let pool = PgPoolOptions::new().max_connections(1).connect(url).await?;
                Ok(Connection::Postgres {
                    pool,
                    schema: schema.to_string(),
                })
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Connection::MySql { .. } => Dialect::Mysql,
            Connection::Postgres { .. } => Dialect::Postgres,
        }
    }

    pub fn inspector(&self) -> DialectInspector {
        match self {
            Connection::MySql { pool, database } => {
                DialectInspector::MySql(MySqlInspector::new(pool.clone(), database.clone()))
            }
            Connection::Postgres { pool, schema } => {
                DialectInspector::Postgres(PostgresInspector::new(pool.clone(), schema.clone()))
            }
        }
    }

    /// Names recorded in the ledger table, in application order.
    ///
    /// A missing ledger means nothing was applied yet.
    pub async fn applied_migrations(&self, table: &str) -> Result<Vec<String>> {
        let names = match self {
            Connection::MySql { pool, database } => {
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM information_schema.TABLES \
                     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
                )
                .bind(database)
                .bind(table)
                .fetch_one(pool)
                .await?;
                if exists == 0 {
                    log::debug!("ledger table {} does not exist", table);
                    return Ok(Vec::new());
                }

                let sql = format!(
                    "SELECT CAST(name AS CHAR) FROM {}.{} ORDER BY id",
                    quote_mysql(database),
                    quote_mysql(table)
                );
                sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await?
            }
            Connection::Postgres { pool, schema } => {
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM information_schema.tables \
                     WHERE table_schema = $1 AND table_name = $2",
                )
                .bind(schema)
                .bind(table)
                .fetch_one(pool)
                .await?;
                if exists == 0 {
                    log::debug!("ledger table {} does not exist", table);
                    return Ok(Vec::new());
                }

                let sql = format!(
                    "SELECT name::text FROM {}.{} ORDER BY id",
                    quote_pg(schema),
                    quote_pg(table)
                );
                sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await?
            }
        };

        log::debug!("{} applied migration(s) in {}", names.len(), table);
        Ok(names)
    }

    pub async fn close(&self) {
        match self {
            Connection::MySql { pool, .. } => pool.close().await,
            Connection::Postgres { pool, .. } => pool.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_from_url() {
        let url = Url::parse("mysql://root:pw@localhost:3306/shop").unwrap();
        assert_eq!(database_from_url(&url).as_deref(), Some("shop"));

        let url = Url::parse("mysql://root@localhost").unwrap();
        assert_eq!(database_from_url(&url), None);
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_mysql("knex_migrations"), "`knex_migrations`");
        assert_eq!(quote_mysql("odd`name"), "`odd``name`");
        assert_eq!(quote_pg("Migrations"), "\"Migrations\"");
        assert_eq!(quote_pg("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = Connection::connect("sqlite://local.db", "public").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(ref s) if s == "sqlite"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = Connection::connect("not a url", "public").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
