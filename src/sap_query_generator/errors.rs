use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryGeneratorError {
    #[error("unsupported db dialect: {0}")]
    UnsupportedDialect(String),

    #[error("empty DocEntry list for {0}")]
    EmptyDocEntryList(String),
}
