use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum SupplyrError {
    Validation(String),
    StoreUnavailable(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    InvalidRecord(String),
    FileOperation(String),
    Serialization(String),
}

impl SupplyrError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SupplyrError::Validation(_) => "E001",
            SupplyrError::StoreUnavailable(_) => "E002",
            SupplyrError::DatabaseConfig(_) => "E003",
            SupplyrError::DatabaseConnection(_) => "E004",
            SupplyrError::DatabaseOperation(_) => "E005",
            SupplyrError::InvalidRecord(_) => "E006",
            SupplyrError::FileOperation(_) => "E007",
            SupplyrError::Serialization(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SupplyrError::Validation(_) => "Validation Error",
            SupplyrError::StoreUnavailable(_) => "Store Unavailable",
            SupplyrError::DatabaseConfig(_) => "Database Configuration Error",
            SupplyrError::DatabaseConnection(_) => "Database Connection Error",
            SupplyrError::DatabaseOperation(_) => "Database Operation Error",
            SupplyrError::InvalidRecord(_) => "Invalid Record",
            SupplyrError::FileOperation(_) => "File Operation Error",
            SupplyrError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SupplyrError::Validation(msg)
            | SupplyrError::StoreUnavailable(msg)
            | SupplyrError::DatabaseConfig(msg)
            | SupplyrError::DatabaseConnection(msg)
            | SupplyrError::DatabaseOperation(msg)
            | SupplyrError::InvalidRecord(msg)
            | SupplyrError::FileOperation(msg)
            | SupplyrError::Serialization(msg) => msg,
        }
    }

    /// HTTP 状态码映射
    ///
    /// 参数错误在访问存储前就被拒绝；存储不可达统一为 503，其余为 500。
    pub fn http_status(&self) -> StatusCode {
        match self {
            SupplyrError::Validation(_) => StatusCode::BAD_REQUEST,
            SupplyrError::StoreUnavailable(_) | SupplyrError::DatabaseConnection(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 是否为存储不可达类错误
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            SupplyrError::StoreUnavailable(_) | SupplyrError::DatabaseConnection(_)
        )
    }

    /// 格式化为彩色输出（用于启动失败时打印到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SupplyrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SupplyrError {}

// 便捷的构造函数
impl SupplyrError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SupplyrError::Validation(msg.into())
    }

    pub fn store_unavailable<T: Into<String>>(msg: T) -> Self {
        SupplyrError::StoreUnavailable(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        SupplyrError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        SupplyrError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        SupplyrError::DatabaseOperation(msg.into())
    }

    pub fn invalid_record<T: Into<String>>(msg: T) -> Self {
        SupplyrError::InvalidRecord(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        SupplyrError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SupplyrError::Serialization(msg.into())
    }
}

// 连接类错误（含重试耗尽后的超时）视为存储不可达，其余为操作错误
impl From<sea_orm::DbErr> for SupplyrError {
    fn from(err: sea_orm::DbErr) -> Self {
        use sea_orm::DbErr;
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
                SupplyrError::StoreUnavailable(err.to_string())
            }
            DbErr::Custom(ref msg) if msg.contains("timed out") => {
                SupplyrError::StoreUnavailable(err.to_string())
            }
            _ => SupplyrError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for SupplyrError {
    fn from(err: std::io::Error) -> Self {
        SupplyrError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for SupplyrError {
    fn from(err: serde_json::Error) -> Self {
        SupplyrError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SupplyrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            SupplyrError::validation("size is required").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SupplyrError::store_unavailable("timeout").http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SupplyrError::invalid_record("bad state").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_err_conversion() {
        let err: SupplyrError =
            sea_orm::DbErr::ConnectionAcquire(sea_orm::error::ConnAcquireErr::Timeout).into();
        assert!(err.is_store_unavailable());

        let err: SupplyrError =
            sea_orm::DbErr::Custom("Operation 'x' timed out after 100ms".to_string()).into();
        assert!(err.is_store_unavailable());

        let err: SupplyrError = sea_orm::DbErr::RecordNotFound("nope".to_string()).into();
        assert_eq!(err.code(), "E005");
    }

    #[test]
    fn test_format_simple() {
        let err = SupplyrError::validation("size is required");
        assert_eq!(err.to_string(), "Validation Error: size is required");
    }
}
