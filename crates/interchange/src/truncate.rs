//! Length-bounded truncation helpers. All lengths are in characters.

pub const ELLIPSIS: &str = "...";

const ELLIPSIS_LEN: usize = ELLIPSIS.len();

/// Hard cut to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Shorten `text` to at most `target` characters.
///
/// Prefers whole sentences, then whole words, then a hard cut; each shortened
/// result ends with an ellipsis. Text that already fits is returned as-is.
pub fn smart_truncate(text: &str, target: usize) -> String {
    if text.chars().count() <= target {
        return text.to_string();
    }
    if target <= ELLIPSIS_LEN {
        return truncate_chars(text, target).to_string();
    }
    let budget = target - ELLIPSIS_LEN;

    if let Some(sentences) = take_while_fits(text.split(". "), ". ", budget) {
        return format!("{}{ELLIPSIS}", sentences.trim_end_matches(['.', ' ']));
    }
    word_truncate(text, target)
}

/// Like [`smart_truncate`], but the result keeps at least `floor` characters
/// whenever `target` allows it: a sentence cut that is too short falls back
/// to whole words, then to a hard cut.
pub fn truncate_with_floor(text: &str, target: usize, floor: usize) -> String {
    let smart = smart_truncate(text, target);
    if smart.chars().count() >= floor || target <= ELLIPSIS_LEN {
        return smart;
    }
    let words = word_truncate(text, target);
    if words.chars().count() >= floor {
        return words;
    }
    hard_truncate(text, target)
}

fn word_truncate(text: &str, target: usize) -> String {
    let budget = target.saturating_sub(ELLIPSIS_LEN);
    match take_while_fits(text.split_whitespace(), " ", budget) {
        Some(words) => format!("{words}{ELLIPSIS}"),
        None => format!("{}{ELLIPSIS}", truncate_chars(text, budget).trim_end()),
    }
}

fn hard_truncate(text: &str, target: usize) -> String {
    let budget = target.saturating_sub(ELLIPSIS_LEN);
    format!("{}{ELLIPSIS}", truncate_chars(text, budget))
}

/// Join leading pieces while the joined length stays within `budget`.
///
/// Returns `None` when not even the first piece fits.
fn take_while_fits<'a>(
    pieces: impl Iterator<Item = &'a str>,
    separator: &str,
    budget: usize,
) -> Option<String> {
    let mut joined = String::new();
    let mut len = 0;
    for piece in pieces {
        if piece.is_empty() {
            continue;
        }
        let sep_len = if joined.is_empty() {
            0
        } else {
            separator.len()
        };
        let piece_len = piece.chars().count();
        if len + sep_len + piece_len > budget {
            break;
        }
        if sep_len > 0 {
            joined.push_str(separator);
        }
        joined.push_str(piece);
        len += sep_len + piece_len;
    }
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn keeps_whole_sentences() {
        let text = "First sentence. Second sentence. Third sentence.";
        assert_eq!(smart_truncate(text, 30), "First sentence...");
    }

    #[test]
    fn falls_back_to_words() {
        let text = "Emergency meeting tonight at 7 PM";
        assert_eq!(smart_truncate(text, 20), "Emergency meeting...");
    }

    #[test]
    fn hard_cuts_a_single_long_word() {
        let text = "Supercalifragilisticexpialidocious";
        assert_eq!(smart_truncate(text, 10), "Superca...");
    }

    #[test]
    fn already_fitting_text_is_unchanged() {
        let once = smart_truncate("First sentence. Second sentence.", 20);
        assert_eq!(smart_truncate(&once, 20), once);
        assert_eq!(smart_truncate("short", 5), "short");
    }

    #[test]
    fn tiny_targets_skip_the_ellipsis() {
        assert_eq!(smart_truncate("abcdef", 3), "abc");
        assert_eq!(smart_truncate("abcdef", 0), "");
    }

    #[test]
    fn truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("📍📍📍", 2), "📍📍");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }

    #[test]
    fn floor_rejects_a_short_sentence_cut() {
        let text = "Hi. this is a much longer trailing sentence here";
        assert_eq!(smart_truncate(text, 29), "Hi...");
        assert_eq!(truncate_with_floor(text, 29, 15), "Hi. this is a much longer...");
        assert_eq!(truncate_with_floor(text, 29, 3), "Hi...");
    }

    #[test]
    fn floor_falls_back_to_a_hard_cut() {
        let text = "Hi. Supercalifragilisticexpialidocious";
        assert_eq!(truncate_with_floor(text, 20, 15), "Hi. Supercalifrag...");
    }

    #[rstest]
    #[case("First sentence. Second sentence. Third sentence.", 30)]
    #[case("Emergency meeting tonight at 7 PM", 12)]
    #[case("🚨 EMERGENCY: need water at the shelter", 15)]
    #[case("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 4)]
    fn never_exceeds_target(#[case] text: &str, #[case] target: usize) {
        let out = smart_truncate(text, target);
        assert!(out.chars().count() <= target, "{out:?} exceeds {target}");
        assert!(out.ends_with(ELLIPSIS));
    }
}
