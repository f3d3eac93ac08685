//! Phrase matching over transcripts
//!
//! Pure functions over normalized copies; callers' strings are never mutated.
//! Go-words match as whole whitespace-separated tokens, end and wake phrases
//! match as substrings of the lowercased, trimmed transcript.

/// Lowercase and trim a transcript for matching
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Check whether `phrase` occurs anywhere in `transcript`, ignoring case
#[must_use]
pub fn contains_phrase(transcript: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    !phrase.is_empty() && normalize(transcript).contains(&phrase)
}

/// Remove every occurrence of `phrase` from `transcript`, ignoring case
///
/// The surviving text keeps its original casing and is trimmed.
#[must_use]
pub fn strip_phrase(transcript: &str, phrase: &str) -> String {
    let needle: Vec<char> = phrase.trim().chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return transcript.trim().to_string();
    }

    // Fold per char so match offsets map back onto the original text even when
    // lowercasing changes the char count
    let chars: Vec<char> = transcript.chars().collect();
    let folded: Vec<Vec<char>> = chars.iter().map(|c| c.to_lowercase().collect()).collect();

    let mut out = String::with_capacity(transcript.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some(len) = match_at(&folded, i, &needle) {
            i += len;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out.trim().to_string()
}

/// Length in source chars of a match of `needle` starting at `start`
fn match_at(folded: &[Vec<char>], start: usize, needle: &[char]) -> Option<usize> {
    let mut matched = 0;
    let mut consumed = 0;
    for piece in &folded[start..] {
        if matched == needle.len() {
            break;
        }
        let end = matched + piece.len();
        if end > needle.len() || needle[matched..end] != piece[..] {
            return None;
        }
        matched = end;
        consumed += 1;
    }
    (matched == needle.len()).then_some(consumed)
}

/// Find the go-word as whole token(s) and return the transcript without it
///
/// Returns `None` when the go-word is absent. Only the first occurrence is
/// removed; the remaining tokens are joined with single spaces.
#[must_use]
pub fn strip_go_word(transcript: &str, go_word: &str) -> Option<String> {
    let needle: Vec<String> = go_word.split_whitespace().map(str::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = transcript.split_whitespace().collect();
    let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

    let at = lowered
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;

    let remainder: Vec<&str> = tokens[..at]
        .iter()
        .chain(&tokens[at + needle.len()..])
        .copied()
        .collect();

    Some(remainder.join(" "))
}

/// Check whether the go-word appears as whole token(s)
#[must_use]
pub fn contains_go_word(transcript: &str, go_word: &str) -> bool {
    strip_go_word(transcript, go_word).is_some()
}
