use plat_log::error::Fault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessengerFault {
    #[error("no database handlers available")]
    NoDatabaseHandlers,
    #[error("unexpected database result")]
    UnexpectedDatabaseResult,
    #[error("buffer pool exhausted for a notification record")]
    NoBufferForNotification,
    #[error("failed to connect to APNS: {0}")]
    CannotConnectToApns(std::io::Error),
    #[error("APNS TLS handshake failed: {0}")]
    TlsHandshakeFailed(#[source] native_tls::Error),
}

impl Fault for MessengerFault {
    fn code(&self) -> &'static str {
        match self {
            MessengerFault::NoDatabaseHandlers => "no_database_handlers",
            MessengerFault::UnexpectedDatabaseResult => "unexpected_database_result",
            MessengerFault::NoBufferForNotification => "no_buffer_for_notification",
            MessengerFault::CannotConnectToApns(_) => "cannot_connect_to_apns",
            MessengerFault::TlsHandshakeFailed(_) => "tls_handshake_failed",
        }
    }
}

impl From<dbpool::DbError> for MessengerFault {
    fn from(err: dbpool::DbError) -> Self {
        match err {
            dbpool::DbError::ChainExhausted(_) => MessengerFault::NoDatabaseHandlers,
            _ => MessengerFault::UnexpectedDatabaseResult,
        }
    }
}

impl From<mmps::MmpsError> for MessengerFault {
    fn from(_: mmps::MmpsError) -> Self {
        MessengerFault::NoBufferForNotification
    }
}

pub type MessengerResult<T> = Result<T, MessengerFault>;
