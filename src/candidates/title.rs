//! Search-title cleanup.
//!
//! Streaming services decorate titles with release annotations ("- 2011
//! Remaster", "(Live at Wembley)", "[Explicit]") that make video search worse.
//! [`clean_track_title`] strips them before the first search attempt.

/// Keywords that mark a " - ..." suffix as an annotation.
const DASH_KEYWORDS: [&str; 4] = ["remaster", "live", "version", "mix"];

/// Strip release annotations from a track title.
///
/// Rules, all ASCII case-insensitive:
/// - a " - " suffix mentioning remaster, live, version or mix;
/// - a " - " suffix starting with a four-digit year;
/// - a parenthesized group starting with "remaster" or "live", or ending in "version";
/// - every "[...]" segment.
///
/// Rules are applied until nothing changes, so the result is a fixed point.
/// A title that cleans down to nothing is returned unchanged (trimmed).
pub fn clean_track_title(title: &str) -> String {
    let mut current = title.trim().to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    if current.is_empty() {
        title.trim().to_string()
    } else {
        current
    }
}

fn clean_once(title: &str) -> String {
    let mut s = title.to_string();
    if let Some(cut) = dash_suffix_start(&s) {
        s.truncate(cut);
    }
    s = remove_paren_groups(&s);
    s = remove_bracket_groups(&s);
    s.trim().to_string()
}

/// Byte offset of the first whitespace-dash-whitespace separator whose suffix
/// is an annotation.
fn dash_suffix_start(s: &str) -> Option<usize> {
    let lower = s.to_ascii_lowercase();
    for (i, _) in lower.match_indices('-') {
        let before = lower[..i].chars().next_back();
        let after = lower[i + 1..].chars().next();
        let (Some(b), Some(a)) = (before, after) else {
            continue;
        };
        if !b.is_whitespace() || !a.is_whitespace() {
            continue;
        }
        let rest = lower[i + 1 + a.len_utf8()..].trim_start();
        let rest_bytes = rest.as_bytes();
        let year = rest_bytes.len() >= 4 && rest_bytes[..4].iter().all(u8::is_ascii_digit);
        if year || DASH_KEYWORDS.iter().any(|k| rest.contains(k)) {
            return Some(i - b.len_utf8());
        }
    }
    None
}

fn remove_paren_groups(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('(') {
        let Some(close_rel) = rest[open..].find(')') else {
            break;
        };
        let close = open + close_rel;
        let inner = rest[open + 1..close].trim().to_ascii_lowercase();
        out.push_str(&rest[..open]);
        let annotation = inner.starts_with("remaster")
            || inner.starts_with("live")
            || inner.ends_with("version");
        if !annotation {
            out.push_str(&rest[open..=close]);
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn remove_bracket_groups(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let Some(close_rel) = rest[open..].find(']') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close_rel + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_dash_remaster() {
        assert_eq!(
            clean_track_title("Bohemian Rhapsody - 2011 Remaster"),
            "Bohemian Rhapsody"
        );
        assert_eq!(
            clean_track_title("Heroes - 2017 Remastered Version"),
            "Heroes"
        );
    }

    #[test]
    fn test_strips_dash_suffixes() {
        assert_eq!(clean_track_title("Song - Live at Wembley"), "Song");
        assert_eq!(clean_track_title("Song - Single Version"), "Song");
        assert_eq!(clean_track_title("Song - 1999"), "Song");
        assert_eq!(clean_track_title("Song - Radio Mix"), "Song");
        assert_eq!(clean_track_title("Song - Extended MIX"), "Song");
    }

    #[test]
    fn test_keeps_plain_dash_titles() {
        assert_eq!(clean_track_title("Hey - Ho"), "Hey - Ho");
        assert_eq!(clean_track_title("Self-Control"), "Self-Control");
        assert_eq!(clean_track_title("A-live"), "A-live");
    }

    #[test]
    fn test_strips_paren_annotations() {
        assert_eq!(clean_track_title("Song (Remastered 2009)"), "Song");
        assert_eq!(clean_track_title("Song (Live)"), "Song");
        assert_eq!(clean_track_title("Song (Acoustic Version)"), "Song");
        assert_eq!(clean_track_title("Song (feat. Someone)"), "Song (feat. Someone)");
        assert_eq!(
            clean_track_title("Song (Live) (feat. Someone)"),
            "Song  (feat. Someone)"
        );
    }

    #[test]
    fn test_strips_all_bracket_segments() {
        assert_eq!(clean_track_title("Song [Explicit] [Bonus]"), "Song");
        assert_eq!(clean_track_title("[Intro] Song"), "Song");
    }

    #[test]
    fn test_empty_result_falls_back_to_original() {
        assert_eq!(clean_track_title("[Untitled]"), "[Untitled]");
        assert_eq!(clean_track_title("  "), "");
    }

    #[test]
    fn test_idempotent() {
        let titles = [
            "Bohemian Rhapsody - 2011 Remaster",
            "Song (Live) (Live at Budokan) [Bonus]",
            "Song [A] - Live (Remaster)",
            "Hey - Ho",
            "[Untitled]",
            "Ünïcode - Live",
        ];
        for t in titles {
            let once = clean_track_title(t);
            assert_eq!(clean_track_title(&once), once, "title: {t}");
        }
    }
}
