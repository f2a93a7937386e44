//! Directory listing formats for LIST, MLSD and NLST

use chrono::{DateTime, Datelike, Utc};
use std::time::SystemTime;

use crate::storage::DirEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    List,
    Mlsd,
    Nlst,
}

/// `YYYYMMDDHHMMSS` in UTC, as used by MLSD and MDTM.
pub fn format_mlsd_time(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified)
        .format("%Y%m%d%H%M%S")
        .to_string()
}

/// `Mon DD HH:MM` for the current year, `Mon DD  YYYY` otherwise.
pub fn format_list_time(modified: SystemTime, now: DateTime<Utc>) -> String {
    let time = DateTime::<Utc>::from(modified);
    if time.year() == now.year() {
        time.format("%b %d %H:%M").to_string()
    } else {
        time.format("%b %d  %Y").to_string()
    }
}

/// One listing line, CRLF terminated.
pub fn format_entry(format: ListFormat, entry: &DirEntry, now: DateTime<Utc>) -> String {
    match format {
        ListFormat::List => {
            let (kind, x, links, size) = if entry.is_dir {
                ('d', 'x', '2', 0)
            } else {
                ('-', '-', '1', entry.size)
            };
            format!(
                "{kind}rw{x}r-{x}r-{x}    {links}    0    0  {size:>8} {} {}\r\n",
                format_list_time(entry.modified, now),
                entry.name
            )
        }
        ListFormat::Mlsd => {
            let facts = if entry.is_dir {
                "UNIX.mode=0755;type=dir".to_string()
            } else {
                format!("UNIX.mode=0644;type=file;size={}", entry.size)
            };
            format!(
                "modify={};UNIX.group=0;UNIX.owner=0;{}; {}\r\n",
                format_mlsd_time(entry.modified),
                facts,
                entry.name
            )
        }
        ListFormat::Nlst => format!("{}\r\n", entry.name),
    }
}

/// Drops a leading option token such as `-la` that some clients send
/// with LIST.
pub fn strip_list_options(params: &str) -> &str {
    let trimmed = params.trim_start();
    if !trimmed.starts_with('-') {
        return params;
    }
    match trimmed.split_once(' ') {
        Some((_, rest)) => rest.trim_start(),
        None => "",
    }
}
