//! Control-socket wire format and the blocking client the CLI uses.
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! > {"cmd":"sync"}
//! < {"ok":true,"data":{"clients_seen":3,"confirmed":["alice"],...}}
//! > {"cmd":"sync"}
//! < {"ok":false,"error":"sync cycle exceeded its 30s deadline"}
//! ```

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use ovpn_core::paths::socket_path;
use ovpn_sync::CycleSummary;

use crate::error::{io_err, DaemonError};
use crate::state::DaemonStatus;

const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A control command, tagged on the wire as `{"cmd":"<name>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    Status,
    Sync,
    Stop,
}

/// One reply line. `data` is set on success, `error` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> DaemonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// The payload, or the daemon's own message as [`DaemonError::Protocol`].
    pub fn into_result(self) -> Result<T, DaemonError> {
        match (self.ok, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(DaemonError::Protocol(
                "daemon reply carried no data".to_string(),
            )),
            (false, _) => Err(DaemonError::Protocol(
                self.error
                    .unwrap_or_else(|| "daemon reported an unspecified failure".to_string()),
            )),
        }
    }
}

impl<T> From<Result<T, String>> for DaemonResponse<T> {
    fn from(outcome: Result<T, String>) -> Self {
        match outcome {
            Ok(data) => Self::ok(data),
            Err(message) => Self::error(message),
        }
    }
}

/// Payload of a successful `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAck {
    pub stopping: bool,
}

/// Blocking client for the daemon that owns `<home>/.ovpnadm/run/daemon.sock`.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(home: &Path) -> Self {
        Self {
            socket: socket_path(home),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Send `request` and decode the reply's payload as `T`.
    pub fn call<T: DeserializeOwned>(&self, request: DaemonRequest) -> Result<T, DaemonError> {
        let reply = self.exchange(request)?;
        serde_json::from_str::<DaemonResponse<T>>(reply.trim_end())?.into_result()
    }

    /// Retries briefly so a daemon still binding its socket is not reported as down.
    pub fn status(&self) -> Result<DaemonStatus, DaemonError> {
        let mut attempt = 1;
        loop {
            match self.call(DaemonRequest::Status) {
                Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                    attempt += 1;
                    sleep(STATUS_RETRY_DELAY);
                }
                other => return other,
            }
        }
    }

    pub fn sync(&self) -> Result<CycleSummary, DaemonError> {
        self.call(DaemonRequest::Sync)
    }

    pub fn stop(&self) -> Result<(), DaemonError> {
        self.call::<StopAck>(DaemonRequest::Stop).map(|_| ())
    }

    fn exchange(&self, request: DaemonRequest) -> Result<String, DaemonError> {
        let stream = self.connect()?;
        let mut frame = serde_json::to_vec(&request)?;
        frame.push(b'\n');
        (&stream)
            .write_all(&frame)
            .map_err(|e| io_err(&self.socket, e))?;

        let mut reply = String::new();
        match BufReader::new(&stream).read_line(&mut reply) {
            Ok(0) => Err(DaemonError::Protocol(
                "daemon hung up without replying".to_string(),
            )),
            Ok(_) => Ok(reply),
            Err(e) => Err(io_err(&self.socket, e)),
        }
    }

    fn connect(&self) -> Result<UnixStream, DaemonError> {
        UnixStream::connect(&self.socket).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                DaemonError::DaemonNotRunning {
                    socket: self.socket.clone(),
                }
            }
            _ => io_err(&self.socket, err),
        })
    }
}

pub fn request_status(home: &Path) -> Result<DaemonStatus, DaemonError> {
    DaemonClient::new(home).status()
}

/// Queue a cycle on the daemon and wait for its summary.
pub fn request_sync(home: &Path) -> Result<CycleSummary, DaemonError> {
    DaemonClient::new(home).sync()
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    DaemonClient::new(home).stop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn commands_are_tagged_by_name() {
        assert_eq!(
            serde_json::to_string(&DaemonRequest::Sync).expect("encode"),
            r#"{"cmd":"sync"}"#
        );
        let decoded: DaemonRequest = serde_json::from_str(r#"{"cmd":"stop"}"#).expect("decode");
        assert_eq!(decoded, DaemonRequest::Stop);
        assert!(serde_json::from_str::<DaemonRequest>(r#"{"cmd":"reboot"}"#).is_err());
    }

    #[test]
    fn failure_reply_has_no_data_field() {
        let reply = DaemonResponse::<CycleSummary>::from(Err("boom".to_string()));
        let wire = serde_json::to_value(&reply).expect("encode");
        assert_eq!(wire, serde_json::json!({"ok": false, "error": "boom"}));
    }

    #[test]
    fn daemon_message_surfaces_as_protocol_error() {
        let reply: DaemonResponse<CycleSummary> =
            serde_json::from_str(r#"{"ok":false,"error":"cycle timed out"}"#).expect("decode");
        let err = reply.into_result().unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "cycle timed out"));
    }

    #[test]
    fn success_without_payload_is_rejected() {
        let reply: DaemonResponse<StopAck> = serde_json::from_str(r#"{"ok":true}"#).expect("decode");
        assert!(matches!(reply.into_result(), Err(DaemonError::Protocol(_))));
    }

    #[test]
    fn summary_payload_decodes_typed() {
        let line = r#"{"ok":true,"data":{"started_at":null,"log_time":null,"clients_seen":1,
            "confirmed":["bob"],"disconnected":[],"sessions_opened":1,"sessions_updated":0,
            "sessions_finalized":0,"unknown_clients":[],"failures":[],"skipped_lines":0,
            "duration_ms":3}}"#;
        let reply: DaemonResponse<CycleSummary> = serde_json::from_str(line).expect("decode");
        let summary = reply.into_result().expect("summary");
        assert_eq!(summary.confirmed, vec!["bob".to_string()]);
        assert_eq!(summary.sessions_opened, 1);
    }

    #[test]
    fn absent_socket_means_not_running() {
        let home = TempDir::new().expect("home");
        let client = DaemonClient::new(home.path());
        assert!(client.socket().ends_with("daemon.sock"));
        let err = client.sync().unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
