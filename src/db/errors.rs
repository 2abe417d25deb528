use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("db.server, db.database, db.user are required")]
    MissingConnectionFields,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("liveness ping failed: {0}")]
    Ping(String),

    #[error("query execution failed: {0}")]
    Execution(String),

    #[error("query timed out after {0} ms")]
    Timeout(u128),

    #[error("statement requires named parameters for the mssql driver")]
    ExpectedNamedParams,

    #[error("statement requires positional parameters for the hana driver")]
    ExpectedPositionalParams,

    #[error("value normalization failed: {0}")]
    Normalize(String),
}
