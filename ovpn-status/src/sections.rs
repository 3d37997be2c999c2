//! Column layouts, row decoding and the client/route merge.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::format::format_bytes;
use crate::time::parse_pair;
use crate::types::{
    ClientSession, Dialect, ParseOptions, SkipReason, SkippedLine, StatusSnapshot,
    ONLINE_WINDOW_SECS,
};

/// Explicit username values that mean "not supplied".
const USERNAME_PLACEHOLDERS: [&str; 4] = ["UNDEF", "UNKNOWN", "-", ""];

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

/// Position of each client-list column, relative to the first field after the
/// record tag (tagged) or the start of the row (legacy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClientColumns {
    common_name: usize,
    bytes_received: usize,
    bytes_sent: usize,
    real_address: Option<usize>,
    virtual_address: Option<usize>,
    virtual_ipv6_address: Option<usize>,
    connected_since_text: Option<usize>,
    connected_since_epoch: Option<usize>,
    username: Option<usize>,
    client_id: Option<usize>,
    peer_id: Option<usize>,
    cipher: Option<usize>,
}

impl ClientColumns {
    pub(crate) fn tagged_default() -> Self {
        Self {
            common_name: 0,
            real_address: Some(1),
            virtual_address: Some(2),
            virtual_ipv6_address: Some(3),
            bytes_received: 4,
            bytes_sent: 5,
            connected_since_text: Some(6),
            connected_since_epoch: Some(7),
            username: Some(8),
            client_id: Some(9),
            peer_id: Some(10),
            cipher: Some(11),
        }
    }

    pub(crate) fn legacy_default() -> Self {
        Self {
            common_name: 0,
            real_address: Some(1),
            virtual_address: None,
            virtual_ipv6_address: None,
            bytes_received: 2,
            bytes_sent: 3,
            connected_since_text: Some(4),
            connected_since_epoch: None,
            username: None,
            client_id: None,
            peer_id: None,
            cipher: None,
        }
    }

    /// Layout from header column names. `None` unless the common name and
    /// both byte counters are present.
    pub(crate) fn from_header(names: &[&str]) -> Option<Self> {
        let find = |wanted: &str| position(names, wanted);
        Some(Self {
            common_name: find("common name")?,
            bytes_received: find("bytes received")?,
            bytes_sent: find("bytes sent")?,
            real_address: find("real address"),
            virtual_address: find("virtual address"),
            virtual_ipv6_address: find("virtual ipv6 address"),
            connected_since_text: find("connected since"),
            connected_since_epoch: find("connected since (time_t)"),
            username: find("username"),
            client_id: find("client id"),
            peer_id: find("peer id"),
            cipher: find("data channel cipher"),
        })
    }

    fn min_fields(&self) -> usize {
        self.common_name.max(self.bytes_received).max(self.bytes_sent) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteColumns {
    common_name: usize,
    virtual_address: Option<usize>,
    real_address: Option<usize>,
    last_ref_text: Option<usize>,
    last_ref_epoch: Option<usize>,
}

impl RouteColumns {
    pub(crate) fn tagged_default() -> Self {
        Self {
            virtual_address: Some(0),
            common_name: 1,
            real_address: Some(2),
            last_ref_text: Some(3),
            last_ref_epoch: Some(4),
        }
    }

    pub(crate) fn legacy_default() -> Self {
        Self {
            last_ref_epoch: None,
            ..Self::tagged_default()
        }
    }

    pub(crate) fn from_header(names: &[&str]) -> Option<Self> {
        let find = |wanted: &str| position(names, wanted);
        Some(Self {
            common_name: find("common name")?,
            virtual_address: find("virtual address"),
            real_address: find("real address"),
            last_ref_text: find("last ref"),
            last_ref_epoch: find("last ref (time_t)"),
        })
    }

    fn min_fields(&self) -> usize {
        self.common_name + 1
    }
}

fn position(names: &[&str], wanted: &str) -> Option<usize> {
    names
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(wanted))
}

/// Which block of the status file the decoder is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Section {
    None,
    ClientList(ClientColumns),
    RoutingTable(RouteColumns),
    GlobalStats,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ClientRow {
    common_name: String,
    username: Option<String>,
    real_address: String,
    virtual_address: String,
    virtual_ipv6_address: Option<String>,
    bytes_received: u64,
    bytes_sent: u64,
    connected_since: Option<(DateTime<Utc>, i64)>,
    client_id: String,
    peer_id: String,
    cipher: String,
}

#[derive(Debug, Clone)]
struct RouteRow {
    virtual_address: String,
    real_address: String,
    last_ref: Option<(DateTime<Utc>, i64)>,
}

fn field<'a>(fields: &[&'a str], idx: Option<usize>) -> &'a str {
    idx.and_then(|i| fields.get(i)).map_or("", |f| f.trim())
}

fn opt_field<'a>(fields: &[&'a str], idx: Option<usize>) -> Option<&'a str> {
    Some(field(fields, idx)).filter(|f| !f.is_empty())
}

fn parse_counter(fields: &[&str], idx: usize, column: &'static str) -> Result<u64, SkipReason> {
    let raw = field(fields, Some(idx));
    raw.parse().map_err(|_| SkipReason::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

fn decode_client(fields: &[&str], cols: &ClientColumns) -> Result<ClientRow, SkipReason> {
    let expected = cols.min_fields();
    if fields.len() < expected {
        return Err(SkipReason::TooFewFields {
            expected,
            found: fields.len(),
        });
    }
    let common_name = field(fields, Some(cols.common_name));
    if common_name.is_empty() {
        return Err(SkipReason::EmptyCommonName);
    }
    Ok(ClientRow {
        common_name: common_name.to_string(),
        username: cols.username.map(|i| field(fields, Some(i)).to_string()),
        real_address: field(fields, cols.real_address).to_string(),
        virtual_address: field(fields, cols.virtual_address).to_string(),
        virtual_ipv6_address: opt_field(fields, cols.virtual_ipv6_address).map(str::to_string),
        bytes_received: parse_counter(fields, cols.bytes_received, "bytes received")?,
        bytes_sent: parse_counter(fields, cols.bytes_sent, "bytes sent")?,
        connected_since: parse_pair(
            opt_field(fields, cols.connected_since_epoch),
            opt_field(fields, cols.connected_since_text),
        ),
        client_id: field(fields, cols.client_id).to_string(),
        peer_id: field(fields, cols.peer_id).to_string(),
        cipher: field(fields, cols.cipher).to_string(),
    })
}

fn decode_route(fields: &[&str], cols: &RouteColumns) -> Result<(String, RouteRow), SkipReason> {
    let expected = cols.min_fields();
    if fields.len() < expected {
        return Err(SkipReason::TooFewFields {
            expected,
            found: fields.len(),
        });
    }
    let common_name = field(fields, Some(cols.common_name));
    if common_name.is_empty() {
        return Err(SkipReason::EmptyCommonName);
    }
    let row = RouteRow {
        virtual_address: field(fields, cols.virtual_address).to_string(),
        real_address: field(fields, cols.real_address).to_string(),
        last_ref: parse_pair(
            opt_field(fields, cols.last_ref_epoch),
            opt_field(fields, cols.last_ref_text),
        ),
    };
    Ok((common_name.to_string(), row))
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Everything one forward pass collects before the merge.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    pub(crate) log_time: Option<DateTime<Utc>>,
    clients: HashMap<String, ClientRow>,
    routes: HashMap<String, RouteRow>,
    skipped: Vec<SkippedLine>,
}

impl Accumulator {
    pub(crate) fn skip(&mut self, line: usize, reason: SkipReason) {
        self.skipped.push(SkippedLine { line, reason });
    }

    /// Later rows for the same common name replace earlier ones.
    pub(crate) fn client(&mut self, line: usize, fields: &[&str], cols: &ClientColumns) {
        match decode_client(fields, cols) {
            Ok(row) => {
                self.clients.insert(row.common_name.clone(), row);
            }
            Err(reason) => self.skip(line, reason),
        }
    }

    /// Duplicate common names keep the row with the later last-ref.
    pub(crate) fn route(&mut self, line: usize, fields: &[&str], cols: &RouteColumns) {
        let (common_name, row) = match decode_route(fields, cols) {
            Ok(decoded) => decoded,
            Err(reason) => return self.skip(line, reason),
        };
        let incoming = row.last_ref.map(|(at, _)| at);
        let keep_existing = self
            .routes
            .get(&common_name)
            .is_some_and(|existing| existing.last_ref.map(|(at, _)| at) >= incoming);
        if !keep_existing {
            self.routes.insert(common_name, row);
        }
    }

    /// Join client rows with routing rows and derive online state. `now` is
    /// the wall-clock instant used for durations and for the online window
    /// when the file carried no timestamp.
    pub(crate) fn finish(
        self,
        dialect: Option<Dialect>,
        options: &ParseOptions,
        now: DateTime<Utc>,
    ) -> StatusSnapshot {
        let reference = self.log_time.unwrap_or(now);
        let window = Duration::seconds(ONLINE_WINDOW_SECS);
        let routes = self.routes;

        let clients = self
            .clients
            .into_iter()
            .map(|(common_name, row)| {
                let route = routes.get(&common_name);
                let last_ref = route.and_then(|r| r.last_ref);
                let virtual_address = route
                    .map(|r| r.virtual_address.as_str())
                    .filter(|v| !v.is_empty())
                    .unwrap_or(row.virtual_address.as_str())
                    .to_string();
                let real_address = if row.real_address.is_empty() {
                    route.map(|r| r.real_address.clone()).unwrap_or_default()
                } else {
                    row.real_address
                };
                let online_duration_secs = row
                    .connected_since
                    .map_or(0, |(since, _)| (now - since).num_seconds().max(0) as u64);

                let session = ClientSession {
                    username: derive_username(&common_name, row.username.as_deref(), options),
                    common_name: common_name.clone(),
                    real_address,
                    virtual_address,
                    virtual_ipv6_address: row.virtual_ipv6_address,
                    bytes_received: row.bytes_received,
                    bytes_sent: row.bytes_sent,
                    bytes_received_text: format_bytes(row.bytes_received),
                    bytes_sent_text: format_bytes(row.bytes_sent),
                    connected_since: row.connected_since.map(|(at, _)| at),
                    connected_since_epoch: row.connected_since.map_or(0, |(_, raw)| raw),
                    last_ref: last_ref.map(|(at, _)| at),
                    last_ref_epoch: last_ref.map_or(0, |(_, raw)| raw),
                    client_id: row.client_id,
                    peer_id: row.peer_id,
                    cipher: row.cipher,
                    is_online: last_ref.is_some_and(|(at, _)| reference - at <= window),
                    online_duration_secs,
                };
                (common_name, session)
            })
            .collect();

        StatusSnapshot {
            dialect,
            log_time: self.log_time,
            clients,
            skipped: self.skipped,
        }
    }
}

/// Explicit username unless it is a placeholder, otherwise the common name
/// with the configured prefix removed.
pub(crate) fn derive_username(
    common_name: &str,
    explicit: Option<&str>,
    options: &ParseOptions,
) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !is_placeholder(n)) {
        return name.to_string();
    }
    options
        .common_name_prefix
        .as_deref()
        .filter(|prefix| !prefix.is_empty())
        .and_then(|prefix| common_name.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(common_name)
        .to_string()
}

fn is_placeholder(name: &str) -> bool {
    USERNAME_PLACEHOLDERS
        .iter()
        .any(|p| name.eq_ignore_ascii_case(p))
}
