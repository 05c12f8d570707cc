//! Sentence segmentation and sentence-aligned chunking.
//!
//! Chunks never split a sentence. A sentence longer than the chunk size
//! becomes its own oversized chunk.

use std::ops::Range;

/// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "eg", "ie", "inc",
    "ltd", "co", "corp", "no", "fig", "approx", "dept", "est", "misc", "jan", "feb", "mar", "apr",
    "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "u.s", "a.m", "p.m",
];

const CLOSERS: &[char] = &['"', '\'', ')', ']', '}', '\u{201d}', '\u{2019}'];

/// Byte ranges of the sentences in `text`, trimmed, in order.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes/brackets)
/// followed by whitespace or end of text, or at a blank line.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary_end = match c {
            '.' | '!' | '?' => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, n)) = chars.peek() {
                    if n == '.' || n == '!' || n == '?' || CLOSERS.contains(&n) {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let at_break = chars.peek().map_or(true, |&(_, n)| n.is_whitespace());
                if at_break && !(c == '.' && is_abbreviation(&text[start..i], &text[end..])) {
                    Some(end)
                } else {
                    None
                }
            }
            '\n' if is_blank_line_after(&text[i + 1..]) => Some(i),
            _ => None,
        };
        if let Some(end) = boundary_end {
            push_trimmed(&mut spans, text, start..end);
            start = end;
        }
    }
    push_trimmed(&mut spans, text, start..text.len());
    spans
}

/// Sentences of `text` with inner whitespace collapsed to single spaces.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_spans(text)
        .into_iter()
        .map(|r| text[r].split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

/// Longest prefix of `text` that ends on a sentence boundary and holds at
/// most `max_chars` characters. `None` when not even the first sentence fits.
pub fn truncate_to_sentence(text: &str, max_chars: usize) -> Option<&str> {
    if text.chars().count() <= max_chars {
        return Some(text);
    }
    let mut best = None;
    for span in sentence_spans(text) {
        let prefix = &text[..span.end];
        if prefix.chars().count() > max_chars {
            break;
        }
        best = Some(prefix);
    }
    best
}

/// Hard cut for text without a sentence boundary inside `max_chars`: the
/// longest prefix ending before a line break, else before whitespace, else at
/// `max_chars` characters. Trailing whitespace is trimmed.
pub fn truncate_at_break(text: &str, max_chars: usize) -> &str {
    let limit = text.char_indices().nth(max_chars).map_or(text.len(), |(i, _)| i);
    let window = &text[..limit];
    if limit == text.len() {
        return window.trim_end();
    }
    let cut = window
        .rfind('\n')
        .filter(|&i| !window[..i].trim().is_empty())
        .or_else(|| window.rfind(char::is_whitespace).filter(|&i| !window[..i].trim().is_empty()))
        .unwrap_or(limit);
    window[..cut].trim_end()
}

fn push_trimmed(spans: &mut Vec<Range<usize>>, text: &str, range: Range<usize>) {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail < slice.len() {
        spans.push(range.start + lead..range.end - trail);
    }
}

fn is_blank_line_after(rest: &str) -> bool {
    for c in rest.chars() {
        if c == '\n' {
            return true;
        }
        if !c.is_whitespace() {
            return false;
        }
    }
    false
}

fn is_abbreviation(before: &str, after: &str) -> bool {
    let word = before
        .rsplit(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true; // initials such as "J. Smith"
    }
    if ABBREVIATIONS.contains(&word.as_str()) {
        return true;
    }
    // "approx. five": a lowercase continuation means the sentence goes on.
    after
        .trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase)
}

/// One chunk of a document: consecutive sentences `start_sentence..=end_sentence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    pub start_sentence: usize,
    pub end_sentence: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), overlap }
    }

    /// Lazy sequence of chunk spans; call again to restart.
    pub fn chunks(&self, text: &str) -> Chunks {
        let spans = sentence_spans(text);
        let word_counts = spans.iter().map(|r| text[r.clone()].split_whitespace().count()).collect();
        Chunks {
            text: text.to_string(),
            spans,
            word_counts,
            next_start: 0,
            first_new: 0,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

/// Chunk texts are verbatim slices of the document, so line breaks and
/// blank lines between sentences survive into the chunk.
#[derive(Debug, Clone)]
pub struct Chunks {
    text: String,
    spans: Vec<Range<usize>>,
    word_counts: Vec<usize>,
    next_start: usize,
    /// First sentence not yet emitted; every chunk must include it.
    first_new: usize,
    chunk_size: usize,
    overlap: usize,
}

impl Iterator for Chunks {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        let n = self.spans.len();
        if self.first_new >= n {
            return None;
        }
        let start = self.next_start;
        let mut end = start;
        let mut size = 0usize;
        while end < n && (end <= self.first_new || size + self.word_counts[end] <= self.chunk_size) {
            size += self.word_counts[end];
            end += 1;
        }

        let span = ChunkSpan {
            text: self.text[self.spans[start].start..self.spans[end - 1].end].to_string(),
            start_sentence: start,
            end_sentence: end - 1,
            word_count: size,
        };

        let mut overlap_start = end;
        let mut carried = 0usize;
        while overlap_start > start && carried + self.word_counts[overlap_start - 1] <= self.overlap {
            carried += self.word_counts[overlap_start - 1];
            overlap_start -= 1;
        }
        self.next_start = overlap_start;
        self.first_new = end;
        Some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators() {
        let s = split_sentences("Refunds take five days. Contact us!  Why wait?\nDone");
        assert_eq!(s, vec!["Refunds take five days.", "Contact us!", "Why wait?", "Done"]);
    }

    #[test]
    fn tolerates_abbreviations_and_initials() {
        let s = split_sentences("Dr. Smith met J. Doe at 3 p.m. today. See e.g. the memo. Values like 3.14 stay.");
        assert_eq!(
            s,
            vec!["Dr. Smith met J. Doe at 3 p.m. today.", "See e.g. the memo.", "Values like 3.14 stay."]
        );
    }

    #[test]
    fn blank_line_ends_a_sentence() {
        let s = split_sentences("Heading without period\n\nBody text here.");
        assert_eq!(s, vec!["Heading without period", "Body text here."]);
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let s = split_sentences("He said \"stop.\" Then left.");
        assert_eq!(s, vec!["He said \"stop.\"", "Then left."]);
    }

    #[test]
    fn chunks_keep_blank_line_boundaries() {
        let text = "Returns policy\n\nItems can be returned. Refunds take five days.";
        let chunks: Vec<_> = Chunker::new(6, 0).chunks(text).collect();
        assert_eq!(chunks[0].text, "Returns policy\n\nItems can be returned.");
        assert_eq!(truncate_to_sentence(&chunks[0].text, 20), Some("Returns policy"));
    }

    #[test]
    fn hard_cut_prefers_line_breaks_then_spaces() {
        let csv = "id,name\n1,widget refund\n2,gadget";
        assert_eq!(truncate_at_break(csv, 26), "id,name\n1,widget refund");
        assert_eq!(truncate_at_break("alpha beta gamma", 12), "alpha beta");
        assert_eq!(truncate_at_break("abcdefghij", 4), "abcd");
        assert_eq!(truncate_at_break("short", 10), "short");
        assert_eq!(truncate_at_break("héllo wörld", 7), "héllo");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert_eq!(Chunker::new(10, 2).chunks("   \n ").count(), 0);
    }

    #[test]
    fn truncation_keeps_whole_sentences() {
        let text = "One two. Three four five. Six.";
        assert_eq!(truncate_to_sentence(text, 100), Some(text));
        assert_eq!(truncate_to_sentence(text, 26), Some("One two. Three four five."));
        assert_eq!(truncate_to_sentence(text, 12), Some("One two."));
        assert_eq!(truncate_to_sentence(text, 5), None);
    }
}
