//! Deterministic token accounting shared by the chunker, the context builder
//! and the answer usage report. A token is a run of alphanumeric characters
//! or a single other non-whitespace character, which tracks subword
//! tokenizers closely enough for budgeting without shipping model files.

/// Count tokens in `text`. Pure and stable across runs and platforms.
pub fn count_tokens(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else {
            in_word = false;
            if !c.is_whitespace() {
                count += 1;
            }
        }
    }
    count
}

/// Split `text` right after its first `limit` tokens. Returns the full text
/// when it fits. The cut lands on a char boundary by construction.
pub fn take_tokens(text: &str, limit: usize) -> (&str, &str) {
    if limit == 0 {
        return ("", text);
    }
    let mut count = 0;
    let mut in_word = false;
    for (idx, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if !in_word {
                if count == limit {
                    return (&text[..idx], &text[idx..]);
                }
                count += 1;
                in_word = true;
            }
        } else {
            in_word = false;
            if !c.is_whitespace() {
                if count == limit {
                    return (&text[..idx], &text[idx..]);
                }
                count += 1;
            }
        }
    }
    (text, "")
}

/// Trailing `limit` tokens of `text`, used to seed chunk overlap.
pub fn tail_tokens(text: &str, limit: usize) -> &str {
    let total = count_tokens(text);
    if total <= limit {
        return text;
    }
    let (_, tail) = take_tokens(text, total - limit);
    tail.trim_start()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_punctuation() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("hello world"), 2);
        assert_eq!(count_tokens("hello, world!"), 4);
        assert_eq!(count_tokens("a-b"), 3);
    }

    #[test]
    fn deterministic() {
        let text = "The quick brown fox, it jumps; over 42 lazy dogs.";
        assert_eq!(count_tokens(text), count_tokens(text));
    }

    #[test]
    fn take_splits_on_token_boundary() {
        let (head, tail) = take_tokens("one two three four", 2);
        assert_eq!(head.trim_end(), "one two");
        assert_eq!(tail.trim_start(), "three four");
        assert_eq!(count_tokens(head), 2);
    }

    #[test]
    fn take_returns_all_when_under_limit() {
        let (head, tail) = take_tokens("short", 10);
        assert_eq!(head, "short");
        assert_eq!(tail, "");
    }

    #[test]
    fn tail_keeps_requested_budget() {
        let tail = tail_tokens("one two three four five", 2);
        assert_eq!(tail, "four five");
    }

    #[test]
    fn split_concat_preserves_count() {
        let text = "alpha beta gamma, delta; epsilon zeta.";
        let (head, tail) = take_tokens(text, 4);
        assert_eq!(
            count_tokens(head) + count_tokens(tail),
            count_tokens(text)
        );
    }
}
