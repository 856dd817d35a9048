//! Paragraph and sentence splitting plus token estimation

/// Estimate tokens as `ceil(chars / chars_per_token)`
///
/// Counts Unicode scalar values, so the estimate is monotonic in input length
/// and identical for identical input.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    let per_token = chars_per_token.max(1);
    text.chars().count().div_ceil(per_token)
}

/// Split text into paragraphs separated by blank lines
///
/// Blank lines inside a ``` or ~~~ fence do not split; a code block stays in
/// one paragraph. Paragraphs are trimmed and empty ones dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        if trimmed.is_empty() && !in_fence {
            push_paragraph(&mut paragraphs, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut paragraphs, &current);

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<String>, lines: &[&str]) {
    let joined = lines.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
}

/// Split text into sentences ending in `.`, `!` or `?`
///
/// A run of terminators stays with its sentence ("Really?!"). Text after the
/// last terminator forms a final sentence. Sentences are trimmed.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = idx + c.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = next_idx + next.len_utf8();
            chars.next();
        }
        push_sentence(&mut sentences, &text[start..end]);
        start = end;
    }
    push_sentence(&mut sentences, &text[start..]);

    sentences
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_sentence(sentences: &mut Vec<String>, sentence: &str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
