use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::TaskFault;
use crate::rendezvous::BroadcastRendezvous;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaquetId(pub u32);

/// Where a connection sits in the dialogue lifecycle:
/// `Accepted -> DialogueReceived -> (Anticipant -> Terminated | Authenticated -> RegularLoop ->
/// Terminated | Rejected)`. The anticipant path has no `RegularLoop`: it registers a device,
/// sends back a device token, and terminates right there. A transport-fatal fault moves a task
/// straight to `Terminated` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    Accepted,
    DialogueReceived,
    Anticipant,
    Authenticated,
    Rejected,
    RegularLoop,
    Terminated,
}

/// One connection's worth of state. Reached only through an `Arc`, since both the owning
/// connection thread and every paquet worker thread it spawns hold a reference concurrently.
///
/// Carries a single simplex write half rather than a duplex read/write pair: only one thread
/// (the connection's own receive loop) ever reads from the socket, but many paquet workers may
/// be writing responses at once, so `send` serializes through a mutex while reads stay
/// lock-free on the dedicated connection thread.
pub struct Task {
    pub id: TaskId,
    pub peer: SocketAddr,
    write_half: Mutex<TcpStream>,
    state: Mutex<DialogueState>,
    faults: Mutex<Vec<TaskFault>>,
    next_paquet_id: AtomicU32,
    paquets: DashMap<PaquetId, ()>,
    pub device_id: Mutex<Option<i64>>,
    pub profile_id: Mutex<Option<i64>>,
    pub session_id: Mutex<Option<i64>>,
    pub rendezvous: BroadcastRendezvous,
}

impl Task {
    pub fn new(id: TaskId, peer: SocketAddr, write_half: TcpStream) -> Task {
        Task {
            id,
            peer,
            write_half: Mutex::new(write_half),
            state: Mutex::new(DialogueState::Accepted),
            faults: Mutex::new(Vec::new()),
            next_paquet_id: AtomicU32::new(1),
            paquets: DashMap::new(),
            device_id: Mutex::new(None),
            profile_id: Mutex::new(None),
            session_id: Mutex::new(None),
            rendezvous: BroadcastRendezvous::new(),
        }
    }

    pub fn state(&self) -> DialogueState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: DialogueState) {
        *self.state.lock() = state;
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == DialogueState::Terminated
    }

    /// Records a fault against the task. A transport-fatal fault also moves the task straight to
    /// `Terminated`, so the owning connection thread's next read or write notices and tears the
    /// connection down instead of servicing further paquets on it; any other fault only fails
    /// the one paquet that raised it and the connection carries on.
    pub fn record_fault(&self, fault: TaskFault) {
        let fatal = fault.is_transport_fatal();
        self.faults.lock().push(fault);
        if fatal {
            self.set_state(DialogueState::Terminated);
        }
    }

    pub fn faults(&self) -> Vec<TaskFault> {
        self.faults.lock().clone()
    }

    pub fn next_paquet_id(&self) -> PaquetId {
        PaquetId(self.next_paquet_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn begin_paquet(&self, id: PaquetId) {
        self.paquets.insert(id, ());
    }

    pub fn end_paquet(&self, id: PaquetId) {
        self.paquets.remove(&id);
    }

    pub fn in_flight_paquets(&self) -> usize {
        self.paquets.len()
    }

    /// Writes a complete response (pilot header followed by its payload) to the peer. Paquet
    /// worker threads call this independently and concurrently; the mutex is what keeps two
    /// responses from interleaving mid-write on the shared socket.
    pub fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        use std::io::Write;
        self.write_half.lock().write_all(bytes)
    }

    pub fn try_clone_write_half(&self) -> std::io::Result<TcpStream> {
        self.write_half.lock().try_clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_pair() -> (TcpStream, std::net::TcpListener) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        (client, listener)
    }

    #[test]
    fn transport_fatal_fault_terminates_the_task() {
        let (stream, _listener) = loopback_pair();
        let task = Task::new(TaskId(1), stream.peer_addr().unwrap(), stream);
        task.record_fault(TaskFault::WriteToSocketFailed);
        assert_eq!(task.state(), DialogueState::Terminated);
    }

    #[test]
    fn non_fatal_fault_leaves_state_alone() {
        let (stream, _listener) = loopback_pair();
        let task = Task::new(TaskId(1), stream.peer_addr().unwrap(), stream);
        task.set_state(DialogueState::RegularLoop);
        task.record_fault(TaskFault::UnexpectedDatabaseResult);
        assert_eq!(task.state(), DialogueState::RegularLoop);
        assert_eq!(task.faults().len(), 1);
    }

    #[test]
    fn paquet_chain_tracks_in_flight_count() {
        let (stream, _listener) = loopback_pair();
        let task = Task::new(TaskId(1), stream.peer_addr().unwrap(), stream);
        let id = task.next_paquet_id();
        task.begin_paquet(id);
        assert_eq!(task.in_flight_paquets(), 1);
        task.end_paquet(id);
        assert_eq!(task.in_flight_paquets(), 0);
    }
}
