use plat_log::error::Fault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MmpsError {
    #[error("bank {0:?} already initialized")]
    DuplicateBank(crate::bank::BankId),

    #[error("bank {0:?} is not known to this pool")]
    UnknownBank(crate::bank::BankId),

    #[error("bank {0:?} is exhausted")]
    BankExhausted(crate::bank::BankId),

    #[error("no bank in the pool can satisfy a buffer of size {0}")]
    NoBankFitsSize(usize),

    #[error("out of memory allocating bank {0:?}")]
    OutOfMemory(crate::bank::BankId),

    #[error("failed to map shared memory for bank {0:?}: {1}")]
    SharedMemoryMapFailed(crate::bank::BankId, std::io::Error),

    #[error("attempted to read past the end of the chain")]
    ChainUnderrun,

    #[error("attempted to write a string longer than u16::MAX bytes")]
    StringTooLong,
}

impl Fault for MmpsError {
    fn code(&self) -> &'static str {
        match self {
            MmpsError::DuplicateBank(_) => "duplicate_bank",
            MmpsError::UnknownBank(_) => "unknown_bank",
            MmpsError::BankExhausted(_) => "bank_exhausted",
            MmpsError::NoBankFitsSize(_) => "no_bank_fits_size",
            MmpsError::OutOfMemory(_) => "out_of_memory",
            MmpsError::SharedMemoryMapFailed(_, _) => "shared_memory_map_failed",
            MmpsError::ChainUnderrun => "chain_underrun",
            MmpsError::StringTooLong => "string_too_long",
        }
    }
}

pub type MmpsResult<T> = Result<T, MmpsError>;
