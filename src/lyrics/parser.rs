//! LRC parsing.
//!
//! Synced lyrics arrive as `[mm:ss.xx] text` lines, possibly with several
//! timestamps per line and `[ti:…]`-style metadata tags.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrcLine {
    /// Offset from the start of the track.
    pub time_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLyrics {
    pub lines: Vec<LrcLine>,
    pub synced: bool,
    /// The provider says there is nothing to sing.
    pub instrumental: bool,
}

impl ParsedLyrics {
    pub fn parse(content: &str, synced: bool) -> Self {
        let mut lines = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || is_metadata(line) {
                continue;
            }

            if synced && let Some(timed) = parse_timed_line(line) {
                lines.extend(timed);
                continue;
            }

            if !line.starts_with('[') {
                lines.push(LrcLine {
                    time_ms: 0,
                    text: line.to_string(),
                });
            }
        }

        // Stable, so plain lines keep their order.
        lines.sort_by_key(|l| l.time_ms);

        Self {
            lines,
            synced,
            instrumental: false,
        }
    }

    pub fn instrumental() -> Self {
        Self {
            lines: Vec::new(),
            synced: false,
            instrumental: true,
        }
    }

    /// Index of the line being sung `elapsed_ms` into the track.
    pub fn line_index_at(&self, elapsed_ms: u64) -> Option<usize> {
        if !self.synced {
            return None;
        }
        self.lines
            .partition_point(|l| l.time_ms <= elapsed_ms)
            .checked_sub(1)
    }
}

/// `[ti:Title]`, `[ar:Artist]`, `[offset:+100]`: short alphabetic tag names.
fn is_metadata(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else {
        return false;
    };
    let Some(end) = rest.find(']') else {
        return false;
    };
    let Some((tag, _)) = rest[..end].split_once(':') else {
        return false;
    };
    !tag.is_empty() && tag.len() <= 6 && tag.chars().all(|c| c.is_ascii_alphabetic())
}

/// `[00:12.34]text` or `[00:12.34][00:40.00]text`.
fn parse_timed_line(line: &str) -> Option<Vec<LrcLine>> {
    let mut stamps = Vec::new();
    let mut rest = line;

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        let Some(ms) = parse_timestamp(&inner[..end]) else {
            break;
        };
        stamps.push(ms);
        rest = &inner[end + 1..];
    }

    if stamps.is_empty() {
        return None;
    }
    let text = rest.trim();
    Some(
        stamps
            .into_iter()
            .map(|time_ms| LrcLine {
                time_ms,
                text: text.to_string(),
            })
            .collect(),
    )
}

/// `mm:ss`, `mm:ss.xx`, `mm:ss.xxx` or `mm:ss:xx`.
fn parse_timestamp(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.split([':', '.']).collect();
    let (min, sec, frac) = match parts.as_slice() {
        [m, s] => (m, s, None),
        [m, s, f] => (m, s, Some(*f)),
        _ => return None,
    };
    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;
    let ms = match frac {
        None => 0,
        Some(f) => {
            let n: u64 = f.parse().ok()?;
            match f.len() {
                1 => n * 100,
                2 => n * 10,
                3 => n,
                _ => return None,
            }
        }
    };
    Some(min * 60_000 + sec * 1000 + ms)
}
