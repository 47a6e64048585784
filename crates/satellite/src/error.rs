use plat_log::error::Fault;
use thiserror::Error;

/// Status-bitmask taxonomy a task or paquet worker can set when it fails, named after the
/// original's `TaskStatus*` constants (`Satellite/tasks.h`). A paquet worker setting one of
/// these on its task does not abort the task; only a transport-class failure does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskFault {
    #[error("out of memory")]
    OutOfMemory,
    #[error("cannot allocate a buffer for input")]
    CannotAllocateBufferForInput,
    #[error("cannot allocate a buffer for output")]
    CannotAllocateBufferForOutput,
    #[error("cannot extend a buffer for input")]
    CannotExtendBufferForInput,
    #[error("no database handlers available")]
    NoDatabaseHandlers,
    #[error("unexpected database result")]
    UnexpectedDatabaseResult,
    #[error("device authentication failed")]
    DeviceAuthenticationFailed,
    #[error("profile authentication failed")]
    ProfileAuthenticationFailed,
    #[error("cannot get session")]
    CannotGetSession,
    #[error("cannot set session online")]
    CannotSetSessionOnline,
    #[error("cannot set session offline")]
    CannotSetSessionOffline,
    #[error("poll for receive timed out")]
    PollForReceiveTimeout,
    #[error("received data incomplete")]
    ReceivedDataIncomplete,
    #[error("write to socket failed")]
    WriteToSocketFailed,
    #[error("wrong payload size")]
    WrongPayloadSize,
    #[error("missing dialogue demande")]
    MissingDialogueDemande,
    #[error("missing anticipant record")]
    MissingAnticipantRecord,
    #[error("cannot send dialogue verdict")]
    CannotSendDialogueVerdict,
    #[error("cannot create a paquet thread")]
    CannotCreatePaquetThread,
    #[error("missing pilot")]
    MissingPilot,
    #[error("missing signature")]
    MissingSignature,
    #[error("other: {0}")]
    Other(&'static str),
}

impl Fault for TaskFault {
    fn code(&self) -> &'static str {
        match self {
            TaskFault::OutOfMemory => "out_of_memory",
            TaskFault::CannotAllocateBufferForInput => "cannot_allocate_buffer_for_input",
            TaskFault::CannotAllocateBufferForOutput => "cannot_allocate_buffer_for_output",
            TaskFault::CannotExtendBufferForInput => "cannot_extend_buffer_for_input",
            TaskFault::NoDatabaseHandlers => "no_database_handlers",
            TaskFault::UnexpectedDatabaseResult => "unexpected_database_result",
            TaskFault::DeviceAuthenticationFailed => "device_authentication_failed",
            TaskFault::ProfileAuthenticationFailed => "profile_authentication_failed",
            TaskFault::CannotGetSession => "cannot_get_session",
            TaskFault::CannotSetSessionOnline => "cannot_set_session_online",
            TaskFault::CannotSetSessionOffline => "cannot_set_session_offline",
            TaskFault::PollForReceiveTimeout => "poll_for_receive_timeout",
            TaskFault::ReceivedDataIncomplete => "received_data_incomplete",
            TaskFault::WriteToSocketFailed => "write_to_socket_failed",
            TaskFault::WrongPayloadSize => "wrong_payload_size",
            TaskFault::MissingDialogueDemande => "missing_dialogue_demande",
            TaskFault::MissingAnticipantRecord => "missing_anticipant_record",
            TaskFault::CannotSendDialogueVerdict => "cannot_send_dialogue_verdict",
            TaskFault::CannotCreatePaquetThread => "cannot_create_paquet_thread",
            TaskFault::MissingPilot => "missing_pilot",
            TaskFault::MissingSignature => "missing_signature",
            TaskFault::Other(_) => "other",
        }
    }
}

impl TaskFault {
    /// Transport-class faults terminate the whole task; everything else only fails the one
    /// paquet that raised it.
    pub fn is_transport_fatal(&self) -> bool {
        matches!(
            self,
            TaskFault::PollForReceiveTimeout
                | TaskFault::ReceivedDataIncomplete
                | TaskFault::WriteToSocketFailed
                | TaskFault::MissingPilot
                | TaskFault::MissingSignature
        )
    }

    /// Classifies a failed bounded socket read (`spec.md` §4.C.5/§5: every receive is gated by a
    /// poll with an explicit timeout). `WouldBlock`/`TimedOut` is what `set_read_timeout` turns a
    /// quiet peer into; anything else (EOF mid-frame, reset, ...) is a genuinely incomplete read.
    pub fn from_receive_error(err: &std::io::Error) -> TaskFault {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => TaskFault::PollForReceiveTimeout,
            _ => TaskFault::ReceivedDataIncomplete,
        }
    }
}

impl From<mmps::MmpsError> for TaskFault {
    fn from(err: mmps::MmpsError) -> Self {
        match err {
            mmps::MmpsError::BankExhausted(_) | mmps::MmpsError::OutOfMemory(_) => TaskFault::OutOfMemory,
            mmps::MmpsError::NoBankFitsSize(_) => TaskFault::CannotExtendBufferForInput,
            _ => TaskFault::Other("mmps"),
        }
    }
}

impl From<dbpool::DbError> for TaskFault {
    fn from(err: dbpool::DbError) -> Self {
        match err {
            dbpool::DbError::ChainExhausted(_) => TaskFault::NoDatabaseHandlers,
            dbpool::DbError::Validation(_) => TaskFault::UnexpectedDatabaseResult,
            _ => TaskFault::UnexpectedDatabaseResult,
        }
    }
}

pub type TaskResult<T> = Result<T, TaskFault>;
