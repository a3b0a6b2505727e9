//! Splitting narration text into slide-sized segments.
//!
//! Segments are built from whole sentences. A sentence is only broken when it
//! alone is longer than the segment limit, and then at word boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence punctuation, optional closing quotes/brackets, then whitespace or end.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+["'”’)\]]*(?:\s+|$)"#).expect("sentence regex"));

/// A line that finishes on sentence punctuation.
static LINE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[.!?…]+["'”’)\]]*$"#).expect("line end regex"));

const ABBREVIATIONS: [&str; 10] = [
    "mr.", "mrs.", "ms.", "dr.", "vs.", "inc.", "ltd.", "jr.", "st.", "etc.",
];

/// Rejoin wrapped lines. A line break is kept only after sentence
/// punctuation or at a blank line; anywhere else it becomes a space.
fn join_lines(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
        if LINE_END.is_match(line) {
            paragraphs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// Split text into sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in join_lines(text) {
        let line = line.as_str();
        let mut start = 0;
        for m in SENTENCE_END.find_iter(line) {
            let candidate = line[start..m.end()].trim();
            if m.end() < line.len() && is_false_stop(candidate) {
                continue;
            }
            if !candidate.is_empty() {
                sentences.push(candidate.to_string());
            }
            start = m.end();
        }
        let rest = line[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
    }
    sentences
}

/// Punctuation that does not end a sentence: list markers (`1.`),
/// dotted abbreviations (`U.S.`, `e.g.`) and common titles (`Dr.`).
fn is_false_stop(candidate: &str) -> bool {
    let Some(last) = candidate.split_whitespace().last() else {
        return false;
    };
    if !last.ends_with('.') {
        return false;
    }
    let stem = last.trim_end_matches('.');
    if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if stem.contains('.') && stem.len() <= 6 {
        return true;
    }
    ABBREVIATIONS.contains(&last.to_lowercase().as_str())
}

/// Greedy word wrap to `width` characters per line.
///
/// Words longer than `width` are cut into `width`-sized pieces.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Pack sentences into segments of at most `max_chars` characters.
pub fn pack_segments(sentences: &[String], max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let len = sentence.chars().count();
        if len > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            segments.extend(wrap_words(sentence, max_chars));
            continue;
        }
        if current.is_empty() {
            current = sentence.clone();
        } else if current.chars().count() + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(sentence);
        } else {
            segments.push(std::mem::replace(&mut current, sentence.clone()));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Narration script to display segments.
pub fn split_script(script: &str, max_chars: usize) -> Vec<String> {
    pack_segments(&split_sentences(script), max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_basic() {
        let s = split_sentences("AI is here. Is it safe? Yes!  Mostly \"fine.\" End");
        assert_eq!(s, vec!["AI is here.", "Is it safe?", "Yes!", "Mostly \"fine.\"", "End"]);
    }

    #[test]
    fn test_split_sentences_ignores_list_markers_and_abbreviations() {
        let s = split_sentences("1. AI is revolutionizing farming.\n2. The U.S. market grew. Dr. Ng agrees.");
        assert_eq!(
            s,
            vec![
                "1. AI is revolutionizing farming.",
                "2. The U.S. market grew.",
                "Dr. Ng agrees.",
            ]
        );
    }

    #[test]
    fn test_wrapped_line_continues_sentence() {
        let s = split_sentences("First sentence here. AI is changing\nthe world fast.");
        assert_eq!(s, vec!["First sentence here.", "AI is changing the world fast."]);

        let segments = split_script("First sentence here. AI is changing\nthe world fast.", 40);
        assert_eq!(segments, vec!["First sentence here.", "AI is changing the world fast."]);
    }

    #[test]
    fn test_blank_line_ends_unpunctuated_heading() {
        let s = split_sentences("Today in AI\n\nModels shipped.\nChips sold out!");
        assert_eq!(s, vec!["Today in AI", "Models shipped.", "Chips sold out!"]);
    }

    #[test]
    fn test_decimal_numbers_do_not_split() {
        let s = split_sentences("Revenue rose 3.5 percent. Good.");
        assert_eq!(s, vec!["Revenue rose 3.5 percent.", "Good."]);
    }

    #[test]
    fn test_pack_keeps_sentences_whole() {
        let script = "First short one. Second short one. Third sentence is a bit longer than the others. Fourth.";
        let max = 40;
        let sentences = split_sentences(script);
        let segments = split_script(script, max);

        assert!(segments.iter().all(|s| s.chars().count() <= max));
        for sentence in &sentences {
            if sentence.chars().count() <= max {
                let holders = segments.iter().filter(|seg| seg.contains(sentence.as_str())).count();
                assert_eq!(holders, 1, "sentence {sentence:?} split across segments");
            }
        }
        assert_eq!(segments[0], "First short one. Second short one.");
    }

    #[test]
    fn test_only_overlong_sentence_is_hard_broken() {
        let long = "This single sentence keeps going and going well past any reasonable slide limit.";
        let script = format!("Short intro. {long} Short outro.");
        let segments = split_script(&script, 30);

        assert_eq!(segments.first().map(String::as_str), Some("Short intro."));
        assert_eq!(segments.last().map(String::as_str), Some("Short outro."));
        let middle = segments[1..segments.len() - 1].join(" ");
        assert_eq!(middle, long);
        assert!(segments.iter().all(|s| s.chars().count() <= 30));
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(wrap_words("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_words("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_words("ok supercalifragilistic", 5), vec!["ok", "super", "calif", "ragil", "istic"]);
        assert!(wrap_words("   ", 5).is_empty());
    }

    #[test]
    fn test_empty_script() {
        assert!(split_script("", 100).is_empty());
    }
}
