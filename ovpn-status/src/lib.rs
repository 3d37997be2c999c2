//! # ovpn-status
//!
//! Parser for the OpenVPN server status file.
//!
//! [`parse_file`] reads the whole file and returns a [`StatusSnapshot`]: one
//! [`ClientSession`] per connected common name plus the file's own "as of"
//! timestamp. Two dialects are understood, picked by the first structural
//! marker in the text:
//!
//! - **tagged** (`status-version 2/3`): every line starts with a record tag
//!   (`TIME`, `HEADER`, `CLIENT_LIST`, `ROUTING_TABLE`, ...), comma or tab
//!   separated.
//! - **legacy** (`status-version 1`): `OpenVPN CLIENT LIST` / `Updated,...`
//!   followed by plain CSV sections introduced by literal header rows.
//!
//! Only I/O fails. Malformed lines are skipped and listed in
//! [`StatusSnapshot::skipped`].

pub mod error;
pub mod format;
pub mod parser;
mod sections;
pub mod time;
pub mod types;

pub use error::StatusError;
pub use format::format_bytes;
pub use parser::{parse_file, parse_str, sniff_dialect};
pub use types::{
    ClientSession, Dialect, ParseOptions, SkipReason, SkippedLine, StatusSnapshot,
    ONLINE_WINDOW_SECS,
};
