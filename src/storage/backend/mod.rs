//! SeaORM storage backend
//!
//! One `SeaOrmStorage` implements every store interface the engine needs,
//! on SQLite, MySQL/MariaDB or PostgreSQL.

mod connection;
mod converters;
mod impressions;
mod inventory;
mod mutations;
pub mod retry;
mod sync;
mod visitors;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::errors::{Result, SupplyrError};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::model_to_ad;
pub use retry::RetryPolicy;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(SupplyrError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry: RetryPolicy,
}

impl SeaOrmStorage {
    /// 连接数据库并执行迁移
    pub async fn new(database_url: &str, backend_name: &str, config: &DatabaseConfig) -> Result<Self> {
        if database_url.is_empty() {
            return Err(SupplyrError::database_config("database_url is not set"));
        }

        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name, config.pool_size).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry: RetryPolicy::from(config),
        };

        run_migrations(&storage.db).await?;

        warn!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 获取数据库连接（关闭连接池等场景使用）
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 存储往返检查（健康检查使用）
    pub async fn ping(&self) -> Result<()> {
        let db = &self.db;
        self.retry
            .read("ping", || async { db.execute_unprepared("SELECT 1").await.map(|_| ()) })
            .await
            .map_err(SupplyrError::from)
    }
}

/// `INSERT … ON CONFLICT DO NOTHING` 在部分后端上以 RecordNotInserted 报告冲突
pub(crate) fn ignore_not_inserted(result: std::result::Result<u64, DbErr>) -> std::result::Result<u64, DbErr> {
    match result {
        Err(DbErr::RecordNotInserted) => Ok(0),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("supplyr.db").unwrap(), "sqlite");
        assert_eq!(
            infer_backend_from_url("sqlite:///tmp/x?mode=rwc").unwrap(),
            "sqlite"
        );
        assert_eq!(infer_backend_from_url("mariadb://h/db").unwrap(), "mysql");
        assert_eq!(
            infer_backend_from_url("postgresql://h/db").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://h").is_err());
    }
}
