//! Per-connection task: reads bytes, drives the session state machine,
//! writes ACKs, and enqueues batches to the sink dispatcher.
//!
//! Grounded on the teacher's `lockframe-server::lib.rs` `handle_connection`
//! (register on entry, tokio::spawn per connection from the accept loop,
//! remove on every exit path) and `handle_stream` (read-decode-act loop),
//! adapted from Quinn bidirectional streams to a single `TcpStream` split
//! into independent read/write halves.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use teltonika_core::{ProtocolFault, Session, SessionAction};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::dispatcher::SinkDispatcher;
use crate::env::SystemClock;
use crate::registry::SessionRegistry;

/// Idle read timeout: if no bytes arrive for this long, the connection is
/// closed per spec.md §4.G / §5.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const READ_CHUNK_SIZE: usize = 4096;

/// Handles one accepted TCP connection end to end.
///
/// Always removes the session from `registry` before returning, regardless
/// of which path (EOF, socket error, protocol fault, idle timeout) ended
/// the connection.
pub async fn handle(
    stream: TcpStream,
    remote_addr: SocketAddr,
    dispatcher: SinkDispatcher,
    registry: Arc<SessionRegistry>,
) {
    let (session_id, record) = registry.register(remote_addr, SystemTime::now());
    let mut session = Session::new(SystemClock);
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = [0u8; READ_CHUNK_SIZE];

    let outcome = loop {
        match tokio::time::timeout(IDLE_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(0)) => break Outcome::Eof,
            Ok(Ok(n)) => {
                let outcome = session.on_bytes(&buf[..n]);
                record.set_packets_received(session.packets_received());
                if let Some(imei) = session.imei() {
                    record.set_imei(imei.as_str());
                }
                // Actions from frames completed earlier in this chunk run
                // before we act on a fault from a later frame in the same
                // chunk, so a login ACK is never lost to a malformed frame
                // that follows it in the same read.
                if let Err(write_outcome) = run_actions(&mut writer, &dispatcher, outcome.actions).await {
                    break write_outcome;
                }
                if let Some(fault) = outcome.fault {
                    break Outcome::Fault(fault);
                }
            },
            Ok(Err(error)) => break Outcome::SocketError(error),
            Err(_elapsed) => break Outcome::IdleTimeout,
        }
    };

    let imei = record.imei();
    log_outcome(session_id, remote_addr, imei.as_deref().unwrap_or("unknown"), &outcome);
    registry.remove(session_id);
}

enum Outcome {
    Eof,
    Fault(ProtocolFault),
    SocketError(std::io::Error),
    IdleTimeout,
    WriteFailed,
}

/// Runs the actions produced by one `Session::on_bytes` call: writes ACK
/// bytes back to the device and hands batches to the dispatcher. The ACK
/// write happens before the loop reads again, so a login ACK is always on
/// the wire before any subsequent frame from the device is processed, per
/// spec.md §4.C.
async fn run_actions(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    dispatcher: &SinkDispatcher,
    actions: Vec<SessionAction>,
) -> Result<(), Outcome> {
    for action in actions {
        match action {
            SessionAction::WriteAck(bytes) => {
                if writer.write_all(&bytes).await.is_err() {
                    return Err(Outcome::WriteFailed);
                }
            },
            SessionAction::Dispatch { imei, records } => {
                dispatcher.enqueue(imei, records);
            },
        }
    }
    Ok(())
}

fn log_outcome(session_id: u64, remote_addr: SocketAddr, imei: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Eof => {
            tracing::info!(session_id, %remote_addr, imei, "connection closed by peer");
        },
        Outcome::Fault(fault) => {
            tracing::warn!(session_id, %remote_addr, imei, %fault, "closing connection after protocol fault");
        },
        Outcome::SocketError(error) => {
            tracing::warn!(session_id, %remote_addr, imei, message = %error, "closing connection after socket error");
        },
        Outcome::IdleTimeout => {
            tracing::info!(session_id, %remote_addr, imei, "closing connection after idle timeout");
        },
        Outcome::WriteFailed => {
            tracing::warn!(session_id, %remote_addr, imei, "closing connection after failed ACK write");
        },
    }
}
