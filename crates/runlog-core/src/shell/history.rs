//! Parsers for the on-disk history formats of the supported shells.

use std::path::Path;

use tracing::debug;

use crate::error::RunlogResult;

/// Zsh escapes bytes 0x83..=0xa2 in its history file as `0x83, byte ^ 32`.
const ZSH_META: u8 = 0x83;

/// Read and parse a history file. A missing file is an empty history.
pub fn read_history_file(path: &Path, parse: fn(&[u8]) -> Vec<String>) -> RunlogResult<Vec<String>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let entries = parse(&bytes);
            debug!(path = %path.display(), entries = entries.len(), "history loaded");
            Ok(entries)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no history file");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// The last `limit` entries, oldest first.
pub fn tail(mut entries: Vec<String>, limit: usize) -> Vec<String> {
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    entries
}

/// Bash history: one command per line, with optional `#<epoch>` lines
/// written when `HISTTIMEFORMAT` is set.
pub fn parse_bash_history(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty() && !is_bash_timestamp(line))
        .map(str::to_string)
        .collect()
}

fn is_bash_timestamp(line: &str) -> bool {
    line.strip_prefix('#')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Zsh history: metafied bytes, optional `: <epoch>:<elapsed>;` prefixes,
/// and multi-line commands stored with a trailing backslash per line.
pub fn parse_zsh_history(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(&unmetafy(bytes)).into_owned();

    let mut entries = Vec::new();
    let mut pending: Option<String> = None;
    for line in text.lines() {
        let line = match pending.take() {
            Some(mut head) => {
                head.push('\n');
                head.push_str(line);
                head
            }
            None => strip_extended_prefix(line).to_string(),
        };

        if let Some(continued) = line.strip_suffix('\\') {
            pending = Some(continued.to_string());
            continue;
        }
        if !line.trim().is_empty() {
            entries.push(line);
        }
    }
    if let Some(rest) = pending {
        if !rest.trim().is_empty() {
            entries.push(rest);
        }
    }
    entries
}

fn unmetafy(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        if b == ZSH_META {
            if let Some(&next) = iter.next() {
                out.push(next ^ 32);
            }
        } else {
            out.push(b);
        }
    }
    out
}

fn strip_extended_prefix(line: &str) -> &str {
    let Some(rest) = line.strip_prefix(": ") else {
        return line;
    };
    let Some((stamp, command)) = rest.split_once(';') else {
        return line;
    };
    let well_formed = stamp
        .split_once(':')
        .is_some_and(|(start, elapsed)| is_digits(start) && is_digits(elapsed));
    if well_formed {
        command
    } else {
        line
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
