//! Status file decoding.
//!
//! OpenVPN writes its status file in one of two dialects:
//!
//! ```text
//! TITLE,OpenVPN 2.4.4 x86_64-pc-linux-gnu
//! TIME,Thu Jun 18 08:12:15 2015,1434615135
//! HEADER,CLIENT_LIST,Common Name,Real Address,...
//! CLIENT_LIST,alice,203.0.113.7:51234,10.8.0.6,,10240,20480,...
//! HEADER,ROUTING_TABLE,Virtual Address,Common Name,Real Address,Last Ref,Last Ref (time_t)
//! ROUTING_TABLE,10.8.0.6,alice,203.0.113.7:51234,Thu Jun 18 08:12:09 2015,1434615129
//! GLOBAL_STATS,Max bcast/mcast queue length,0
//! END
//! ```
//!
//! and the older untagged layout:
//!
//! ```text
//! OpenVPN CLIENT LIST
//! Updated,Thu Jun 18 08:12:15 2015
//! Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since
//! alice,203.0.113.7:51234,10240,20480,Thu Jun 18 07:02:11 2015
//! ROUTING TABLE
//! Virtual Address,Common Name,Real Address,Last Ref
//! 10.8.0.6,alice,203.0.113.7:51234,Thu Jun 18 08:12:09 2015
//! GLOBAL STATS
//! Max bcast/mcast queue length,0
//! END
//! ```
//!
//! Tagged files may use a tab instead of a comma (`status-version 3`).
//! Malformed lines never fail the parse; they are reported in
//! [`StatusSnapshot::skipped`].

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{io_err, StatusError};
use crate::sections::{Accumulator, ClientColumns, RouteColumns, Section};
use crate::time::{parse_pair, parse_text};
use crate::types::{Dialect, ParseOptions, SkipReason, StatusSnapshot};

const TAGGED_MARKERS: [&str; 6] = [
    "TITLE",
    "TIME",
    "HEADER",
    "CLIENT_LIST",
    "ROUTING_TABLE",
    "GLOBAL_STATS",
];

const LEGACY_TITLE: &str = "OpenVPN CLIENT LIST";
const LEGACY_UPDATED: &str = "Updated";
const LEGACY_CLIENT_HEADER: &str = "Common Name";
const LEGACY_ROUTING_TITLE: &str = "ROUTING TABLE";
const LEGACY_ROUTING_HEADER: &str = "Virtual Address";
const LEGACY_STATS_TITLE: &str = "GLOBAL STATS";
const END: &str = "END";

/// Read and parse the status file at `path`. Only I/O fails.
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<StatusSnapshot, StatusError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_str(&text, options, Utc::now()))
}

/// Parse status text. `now` is the wall-clock instant for durations and the
/// online-window fallback.
pub fn parse_str(text: &str, options: &ParseOptions, now: DateTime<Utc>) -> StatusSnapshot {
    let dialect = sniff_dialect(text);
    let mut acc = Accumulator::default();
    match dialect {
        Some(Dialect::Tagged { separator }) => decode_tagged(text, separator, &mut acc),
        Some(Dialect::Legacy) => decode_legacy(text, &mut acc),
        None => {
            for (line_no, line) in numbered_lines(text) {
                acc.skip(line_no, SkipReason::NoMarker);
            }
        }
    }
    acc.finish(dialect, options, now)
}

/// Dialect of the first line that is a structural marker in either layout.
pub fn sniff_dialect(text: &str) -> Option<Dialect> {
    numbered_lines(text).find_map(|(_, line)| {
        for separator in [',', '\t'] {
            let tag = line.split(separator).next().unwrap_or_default().trim();
            if TAGGED_MARKERS.contains(&tag) {
                return Some(Dialect::Tagged { separator });
            }
        }
        is_legacy_marker(line).then_some(Dialect::Legacy)
    })
}

fn is_legacy_marker(line: &str) -> bool {
    let first = line.split(',').next().unwrap_or_default().trim();
    line == LEGACY_TITLE
        || line == LEGACY_ROUTING_TITLE
        || line == LEGACY_STATS_TITLE
        || (line.contains(',')
            && [LEGACY_UPDATED, LEGACY_CLIENT_HEADER, LEGACY_ROUTING_HEADER].contains(&first))
}

/// Non-blank lines with 1-based numbers, trailing `\r` removed.
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r').trim()))
        .filter(|(_, line)| !line.is_empty())
}

// ---------------------------------------------------------------------------
// Tagged
// ---------------------------------------------------------------------------

/// Rows count only inside the section their `HEADER` opened. `GLOBAL_STATS`
/// and `END` close it.
fn decode_tagged(text: &str, separator: char, acc: &mut Accumulator) {
    let mut section = Section::None;

    for (line_no, line) in numbered_lines(text) {
        let fields: Vec<&str> = line.split(separator).collect();
        let (tag, rest) = fields.split_first().map_or(("", &[][..]), |(t, r)| (t.trim(), r));
        match tag {
            "TITLE" => {}
            "GLOBAL_STATS" => section = Section::GlobalStats,
            END => section = Section::None,
            "TIME" => match parse_pair(rest.get(1).copied(), rest.first().copied()) {
                Some((at, _)) => acc.log_time = Some(at),
                None => acc.skip(line_no, SkipReason::InvalidTimestamp),
            },
            "HEADER" => {
                section = match rest.split_first() {
                    Some((kind, names)) if kind.trim() == "CLIENT_LIST" => Section::ClientList(
                        ClientColumns::from_header(names)
                            .unwrap_or_else(ClientColumns::tagged_default),
                    ),
                    Some((kind, names)) if kind.trim() == "ROUTING_TABLE" => {
                        Section::RoutingTable(
                            RouteColumns::from_header(names)
                                .unwrap_or_else(RouteColumns::tagged_default),
                        )
                    }
                    _ => Section::None,
                }
            }
            "CLIENT_LIST" => match &section {
                Section::ClientList(cols) => acc.client(line_no, rest, cols),
                _ => acc.skip(line_no, SkipReason::OutsideSection),
            },
            "ROUTING_TABLE" => match &section {
                Section::RoutingTable(cols) => acc.route(line_no, rest, cols),
                _ => acc.skip(line_no, SkipReason::OutsideSection),
            },
            other => acc.skip(
                line_no,
                SkipReason::UnknownRecord {
                    tag: other.to_string(),
                },
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Legacy
// ---------------------------------------------------------------------------

fn decode_legacy(text: &str, acc: &mut Accumulator) {
    let mut section = Section::None;

    for (line_no, line) in numbered_lines(text) {
        let fields: Vec<&str> = line.split(',').collect();
        let first = fields[0].trim();

        if line == LEGACY_TITLE || line == LEGACY_ROUTING_TITLE || line == END {
            section = Section::None;
        } else if line == LEGACY_STATS_TITLE {
            section = Section::GlobalStats;
        } else if first == LEGACY_UPDATED && fields.len() > 1 {
            let raw = line.split_once(',').map_or("", |(_, rest)| rest);
            match parse_text(raw) {
                Some(at) => acc.log_time = Some(at),
                None => acc.skip(line_no, SkipReason::InvalidTimestamp),
            }
        } else if first == LEGACY_CLIENT_HEADER && fields.len() > 1 {
            section = Section::ClientList(
                ClientColumns::from_header(&fields).unwrap_or_else(ClientColumns::legacy_default),
            );
        } else if first == LEGACY_ROUTING_HEADER && fields.len() > 1 {
            section = Section::RoutingTable(
                RouteColumns::from_header(&fields).unwrap_or_else(RouteColumns::legacy_default),
            );
        } else {
            match &section {
                Section::ClientList(cols) => acc.client(line_no, &fields, cols),
                Section::RoutingTable(cols) => acc.route(line_no, &fields, cols),
                Section::GlobalStats => {}
                Section::None => acc.skip(line_no, SkipReason::OutsideSection),
            }
        }
    }
}
