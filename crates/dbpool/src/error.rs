use plat_log::error::Fault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to postgres for chain {chain}: {source}")]
    Connect {
        chain: &'static str,
        #[source]
        source: postgres::Error,
    },

    #[error("chain {0} is exhausted")]
    ChainExhausted(&'static str),

    #[error("failed to start a transaction on handle {handle_id}: {source}")]
    TransactionStart {
        handle_id: u32,
        #[source]
        source: postgres::Error,
    },

    #[error("failed to commit the transaction on handle {handle_id}: {source}")]
    TransactionCommit {
        handle_id: u32,
        #[source]
        source: postgres::Error,
    },

    #[error("failed to roll back the transaction on handle {handle_id}: {source}")]
    TransactionRollback {
        handle_id: u32,
        #[source]
        source: postgres::Error,
    },

    #[error("query failed on handle {handle_id}: {source}")]
    Query {
        handle_id: u32,
        #[source]
        source: postgres::Error,
    },

    #[error("result validation failed: {0}")]
    Validation(&'static str),
}

impl Fault for DbError {
    fn code(&self) -> &'static str {
        match self {
            DbError::Connect { .. } => "db_connect_failed",
            DbError::ChainExhausted(_) => "db_chain_exhausted",
            DbError::TransactionStart { .. } => "db_transaction_start_failed",
            DbError::TransactionCommit { .. } => "db_transaction_commit_failed",
            DbError::TransactionRollback { .. } => "db_transaction_rollback_failed",
            DbError::Query { .. } => "db_query_failed",
            DbError::Validation(_) => "db_validation_failed",
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
