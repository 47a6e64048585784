//! The persistent-TLS-session sender thread (`spec.md` §4.E "APNs thread"). Grounded on
//! `original_source/Messanger/apns_thread.c`'s loop (timed-wait, connect-with-backoff, send,
//! read responses) and `apns.c`'s `SendOneByOne`/`SendAsFrame` pair, reworked from OpenSSL's
//! blocking socket API onto `native_tls::TlsStream<TcpStream>`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use native_tls::{TlsConnector, TlsStream};
use plat_log::logging::Logger;

use crate::chalkboard::Chalkboard;
use crate::wire::{self, ApnsResponse};

/// Payload framing mode: one notification per write, or several packed into a command-2 frame.
/// `spec.md` §4.E offers both; which one a deployment uses is a config choice, not a protocol
/// negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Legacy,
    Framed,
}

pub struct ApnsConfig {
    pub gateway_host: String,
    pub gateway_port: u16,
    /// `APNS_DISCONNECT_IF_IDLE` (`original_source/Messanger/apns.h`): how long the sender
    /// waits for a signal before tearing down an idle TLS session.
    pub disconnect_if_idle: Duration,
    pub send_mode: SendMode,
}

impl Default for ApnsConfig {
    fn default() -> Self {
        ApnsConfig {
            gateway_host: "gateway.push.apple.com".into(),
            gateway_port: 2195,
            disconnect_if_idle: Duration::from_secs(60),
            send_mode: SendMode::Framed,
        }
    }
}

/// `apns.h`'s `SLEEP_ON_*` constants, translated into explicit millisecond `Duration`s per
/// `spec.md` §9 Open Question 3.
const SLEEP_ON_CONNECT_ERROR: Duration = Duration::from_secs(5);
const SLEEP_ON_XMIT_ERROR: Duration = Duration::from_secs(10);
const SLEEP_ON_BUSY_RESOURCES: Duration = Duration::from_secs(2);
const SLEEP_ON_OTHER_ERROR: Duration = Duration::from_secs(10);

enum FailureClass {
    Busy,
    Transmit,
    Other,
}

pub fn run(board: Arc<Chalkboard>, identity: native_tls::Identity, logger: Logger, config: ApnsConfig, shutdown: Arc<AtomicBool>) {
    let connector = TlsConnector::builder()
        .identity(identity)
        .build()
        .expect("failed to build the APNS TLS connector");

    let mut session: Option<TlsStream<TcpStream>> = None;
    // "Untimed" wait once the session is already torn down: a long timeout rather than a true
    // infinite wait, so the thread still notices `shutdown` periodically.
    const UNTIMED: Duration = Duration::from_secs(3600);
    // Set after a failed connect attempt so the next pass retries immediately instead of
    // parking back on the ready-to-go condition (the batch that triggered the signal is still
    // sitting in `in_the_air`, not something a fresh signal will ever arrive for on its own).
    let mut retry_connect = false;

    while !shutdown.load(Ordering::Relaxed) {
        if !retry_connect {
            let wait_timeout = if session.is_some() { config.disconnect_if_idle } else { UNTIMED };
            if !board.wait_ready_to_go(wait_timeout) {
                if session.take().is_some() {
                    plat_log::logging::info!(logger, "disconnecting idle APNS session");
                }
                continue;
            }
        }
        retry_connect = false;

        if session.is_none() {
            match connect(&connector, &config, &logger) {
                Ok(stream) => session = Some(stream),
                Err(err) => {
                    plat_log::logging::warn!(logger, "failed to connect to apns"; "error" => %err);
                    std::thread::sleep(SLEEP_ON_CONNECT_ERROR);
                    retry_connect = true;
                    continue;
                }
            }
        }

        let stream = session.as_mut().unwrap();
        match send_batch(stream, &board, &config, &logger) {
            Ok(()) => {}
            Err(class) => {
                session = None;
                let sleep_for = match class {
                    FailureClass::Busy => SLEEP_ON_BUSY_RESOURCES,
                    FailureClass::Transmit => SLEEP_ON_XMIT_ERROR,
                    FailureClass::Other => SLEEP_ON_OTHER_ERROR,
                };
                std::thread::sleep(sleep_for);
                // The failed batch went back onto `in_the_air` (`send_batch`); retry it on the
                // next pass rather than waiting for a fresh signal that may never come.
                retry_connect = true;
            }
        }
    }
}

fn connect(connector: &TlsConnector, config: &ApnsConfig, logger: &Logger) -> Result<TlsStream<TcpStream>, crate::error::MessengerFault> {
    let addr = (config.gateway_host.as_str(), config.gateway_port);
    let tcp = TcpStream::connect(addr).map_err(crate::error::MessengerFault::CannotConnectToApns)?;
    connector.connect(&config.gateway_host, tcp).map_err(|err| {
        let fault = crate::error::MessengerFault::TlsHandshakeFailed(err);
        plat_log::logging::warn!(*logger, "apns tls handshake failed"; "error" => %fault);
        fault
    })
}

/// Takes the whole `in_the_air` batch, writes it (as one frame or one write per notification),
/// and moves each written notification to `sent`. On any transmit failure the notifications
/// still `in_the_air` (not yet written) go back to the queue; the caller reconnects and retries.
fn send_batch(stream: &mut TlsStream<TcpStream>, board: &Chalkboard, config: &ApnsConfig, logger: &Logger) -> Result<(), FailureClass> {
    let mut batch = board.take_in_the_air();
    if batch.is_empty() {
        return Ok(());
    }

    let result = match config.send_mode {
        SendMode::Legacy => send_legacy(stream, &mut batch, board),
        SendMode::Framed => send_framed(stream, &mut batch, board),
    };

    if let Err(class) = &result {
        board.return_to_in_the_air(batch);
        if matches!(class, FailureClass::Transmit) {
            plat_log::logging::warn!(*logger, "apns write failed, notifications remain in the air");
        }
    }

    if result.is_ok() {
        read_responses(stream, logger);
    }

    result
}

fn send_legacy(stream: &mut TlsStream<TcpStream>, batch: &mut std::collections::VecDeque<crate::notification::Notification>, board: &Chalkboard) -> Result<(), FailureClass> {
    while let Some(mut notification) = batch.pop_front() {
        let record = notification.record().map_err(|_| FailureClass::Other)?;
        let payload = wire::build_payload(&record.message_key, &record.message_arguments);
        let item = wire::encode_legacy_item(&record.device_token, &payload);
        stream.write_all(&item).map_err(|err| classify_io_error(&err))?;
        board.move_to_sent(notification);
    }
    Ok(())
}

fn send_framed(stream: &mut TlsStream<TcpStream>, batch: &mut std::collections::VecDeque<crate::notification::Notification>, board: &Chalkboard) -> Result<(), FailureClass> {
    let mut items = Vec::with_capacity(batch.len());
    let mut drained = Vec::with_capacity(batch.len());

    while let Some(mut notification) = batch.pop_front() {
        let record = notification.record().map_err(|_| FailureClass::Other)?;
        let payload = wire::build_payload(&record.message_key, &record.message_arguments);
        items.push(wire::encode_frame_notification(
            &record.device_token,
            &payload,
            record.notification_id as u32,
            0,
            10,
        ));
        drained.push(notification);
    }

    let frame = wire::encode_frame(&items);
    stream.write_all(&frame).map_err(|err| classify_io_error(&err))?;

    for notification in drained {
        board.move_to_sent(notification);
    }
    Ok(())
}

/// `RC_RESOURCES_BUSY` vs `RC_XMIT_ERROR` (`original_source/Messanger/apns.h`): a `WouldBlock`
/// on a blocking socket means the TLS session's send buffer is backed up, not that the
/// connection itself is bad, so it gets the brief busy-retry rather than a full reconnect.
fn classify_io_error(err: &std::io::Error) -> FailureClass {
    if err.kind() == std::io::ErrorKind::WouldBlock {
        FailureClass::Busy
    } else {
        FailureClass::Transmit
    }
}

/// `spec.md` §4.E step 4: after each frame, read any command-8 error response. A response names
/// the first failing notification; per the spec this is connection-reset behavior, so the
/// caller's session is simply dropped and reconnected on the next signal.
fn read_responses(stream: &mut TlsStream<TcpStream>, logger: &Logger) {
    let _ = stream.get_ref().set_read_timeout(Some(Duration::from_millis(200)));
    let mut bytes = [0u8; ApnsResponse::SIZE];
    match stream.read_exact(&mut bytes) {
        Ok(()) => {
            if let Some(response) = ApnsResponse::decode(&bytes) {
                plat_log::logging::warn!(
                    *logger,
                    "apns reported a failed notification";
                    "notification_id" => response.notification_id,
                    "status" => response.status,
                );
            }
        }
        Err(_) => {
            // No response within the window means every notification in the frame was accepted.
        }
    }
}
