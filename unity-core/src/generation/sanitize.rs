//! Plain-text output contract: tools never render markdown, so emphasis and
//! heading markers are stripped from every text response.

/// Remove `*` and `#` everywhere and every `__` pair, keeping all other
/// characters in order.
///
/// Underscores are handled after `*`/`#` removal, so `_*_` cannot leave a
/// `__` behind. A run of `n` underscores keeps `n % 2` of them.
pub fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut underscores = 0usize;
    for c in text.chars().filter(|c| *c != '*' && *c != '#') {
        if c == '_' {
            underscores += 1;
            continue;
        }
        if underscores % 2 == 1 {
            out.push('_');
        }
        underscores = 0;
        out.push(c);
    }
    if underscores % 2 == 1 {
        out.push('_');
    }
    out
}

/// [`strip_markdown`] followed by trimming surrounding whitespace.
pub fn clean_response(text: &str) -> String {
    strip_markdown(text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(output: &str) {
        for marker in ["*", "**", "#", "__"] {
            assert!(!output.contains(marker), "{output:?} still contains {marker:?}");
        }
    }

    #[test]
    fn strips_emphasis_and_headings() {
        assert_eq!(strip_markdown("## Title\n**bold** and *it*"), " Title\nbold and it");
        assert_eq!(strip_markdown("__under__ snake_case"), "under snake_case");
    }

    #[test]
    fn leaves_no_marker_for_any_combination() {
        let pieces = ["*", "**", "#", "__", "_", "a", " ", "é"];
        // Every ordered pair and triple of pieces.
        for a in pieces {
            for b in pieces {
                for c in pieces {
                    let input = format!("{a}{b}{c}");
                    let out = strip_markdown(&input);
                    assert_clean(&out);
                    let kept: String = input
                        .chars()
                        .filter(|ch| !matches!(ch, '*' | '#' | '_'))
                        .collect();
                    let out_kept: String = out.chars().filter(|ch| *ch != '_').collect();
                    assert_eq!(out_kept, kept, "non-marker characters changed for {input:?}");
                }
            }
        }
    }

    #[test]
    fn markers_split_by_stars_do_not_rejoin() {
        assert_eq!(strip_markdown("_*_"), "");
        assert_eq!(strip_markdown("_#_x"), "x");
        assert_eq!(strip_markdown("___"), "_");
    }

    #[test]
    fn clean_response_trims() {
        assert_eq!(clean_response("  # Hello *world*  \n"), "Hello world");
        assert_eq!(clean_response(""), "");
    }
}
