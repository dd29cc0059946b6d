//! Text preparation for voice-cloning synthesis.
//!
//! The cloning engine degrades on long inputs, so replies are split into
//! chunks of roughly [`DEFAULT_MAX_CHUNK_CHARS`] characters. Cut points are
//! chosen in order of preference: sentence boundary, word boundary, and
//! finally a raw character cut for a single word longer than the limit.
//!
//! Splitting only ever moves whitespace: concatenating the chunks and
//! removing whitespace yields the input with whitespace removed.

pub use voxagent_core::DEFAULT_MAX_CHUNK_CHARS;

/// Split `text` into synthesis-sized chunks of at most `max_chars`
/// characters each.
///
/// Short sentences are merged into one chunk while they fit. Returns an
/// empty vector for blank input.
#[must_use]
pub fn split_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(&text) <= max_chars {
        return vec![text];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(&text) {
        let sentence_len = char_len(&sentence);

        if !current.is_empty() && char_len(&current) + 1 + sentence_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        if sentence_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_words(&sentence, max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Collapse runs of whitespace into single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}

// ── Internal helpers ───────────────────────────────────────────────

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into sentences at `.` `!` `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// Split an overly long sentence at word boundaries.
fn split_words(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        let word_len = char_len(word);

        if !current.is_empty() && char_len(&current) + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_split(word, max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Last resort: cut a single word into `max_chars`-sized pieces.
fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn assert_complete(input: &str, chunks: &[String]) {
        assert_eq!(squash(&chunks.concat()), squash(input));
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_for_synthesis("Hello world.", 100), vec!["Hello world."]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(split_for_synthesis("   \n\t ", 100).is_empty());
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(
            split_for_synthesis("  Hi\nthere.   Bye.  ", 100),
            vec!["Hi there. Bye."]
        );
    }

    #[test]
    fn long_reply_splits_at_sentence_boundaries() {
        let sentences: Vec<String> = (1..=12)
            .map(|i| format!("Sentence number {i} has a handful of words in it."))
            .collect();
        let text = sentences.join(" ");
        let chunks = split_for_synthesis(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {chunk}");
            assert!(chunk.ends_with('.'), "cut mid-sentence: {chunk}");
        }
        assert_complete(&text, &chunks);
    }

    #[test]
    fn no_sentence_is_dropped_or_duplicated() {
        let sentences: Vec<String> = (1..=30).map(|i| format!("Item {i} done.")).collect();
        let text = sentences.join(" ");
        let chunks = split_for_synthesis(&text, 40);

        let rejoined = chunks.join(" ");
        for sentence in &sentences {
            assert_eq!(
                rejoined.matches(sentence.as_str()).count(),
                1,
                "{sentence} should appear exactly once"
            );
        }
        assert_complete(&text, &chunks);
    }

    #[test]
    fn oversized_sentence_falls_back_to_word_boundaries() {
        let text = "word ".repeat(60);
        let chunks = split_for_synthesis(&text, 100);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        assert_complete(&text, &chunks);
    }

    #[test]
    fn oversized_word_is_cut_raw() {
        let word = "a".repeat(250);
        let chunks = split_for_synthesis(&word, 100);
        assert_eq!(
            chunks.iter().map(String::len).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
        assert_complete(&word, &chunks);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "é".repeat(150);
        let chunks = split_for_synthesis(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_complete(&text, &chunks);
    }

    #[test]
    fn mixed_punctuation_is_complete() {
        let text = "Really? Yes! Absolutely sure. Well... maybe not: it depends, you see; \
                    on a great many things that are hard to enumerate in one breath.";
        for max in [5, 17, 40, 100] {
            let chunks = split_for_synthesis(text, max);
            for chunk in &chunks {
                assert!(chunk.chars().count() <= max);
            }
            assert_complete(text, &chunks);
        }
    }
}
