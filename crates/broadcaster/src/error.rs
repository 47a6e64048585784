use plat_log::error::Fault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcasterFault {
    #[error("no database handlers available")]
    NoDatabaseHandlers,
    #[error("unexpected database result")]
    UnexpectedDatabaseResult,
    #[error("failed to bind the loopback listener: {0}")]
    CannotBindListener(std::io::Error),
}

impl Fault for BroadcasterFault {
    fn code(&self) -> &'static str {
        match self {
            BroadcasterFault::NoDatabaseHandlers => "no_database_handlers",
            BroadcasterFault::UnexpectedDatabaseResult => "unexpected_database_result",
            BroadcasterFault::CannotBindListener(_) => "cannot_bind_listener",
        }
    }
}

impl From<dbpool::DbError> for BroadcasterFault {
    fn from(err: dbpool::DbError) -> Self {
        match err {
            dbpool::DbError::ChainExhausted(_) => BroadcasterFault::NoDatabaseHandlers,
            _ => BroadcasterFault::UnexpectedDatabaseResult,
        }
    }
}

pub type BroadcasterResult<T> = Result<T, BroadcasterFault>;
