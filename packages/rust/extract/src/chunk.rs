//! Greedy paragraph packing into token-budgeted passages.
//!
//! Passages stay paragraph-aligned: a paragraph is never split, even when it
//! exceeds the budget on its own, because citation granularity downstream
//! depends on paragraph boundaries.

use std::sync::LazyLock;

use regex::Regex;

/// Blank-line paragraph boundary.
static PARAGRAPH_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Estimate the token count of a text span as ceil(chars / 4).
pub fn est_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Split `text` into ordered passages of at most `token_budget` estimated
/// tokens each.
///
/// Consecutive paragraphs are accumulated greedily; the buffer is flushed
/// before a paragraph that would push it over budget. A single paragraph
/// larger than the budget still becomes one passage. Returns an empty vec
/// when the text has no paragraphs; the caller decides the fallback.
pub fn chunk(text: &str, token_budget: u32) -> Vec<String> {
    let paragraphs: Vec<&str> = PARAGRAPH_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut passages = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut tokens = 0u32;

    for para in paragraphs {
        let t = est_tokens(para);
        if tokens + t > token_budget && !buf.is_empty() {
            passages.push(buf.join("\n\n"));
            buf.clear();
            tokens = 0;
        }
        buf.push(para);
        tokens += t;
    }
    if !buf.is_empty() {
        passages.push(buf.join("\n\n"));
    }

    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn est_tokens_rounds_up() {
        assert_eq!(est_tokens(""), 0);
        assert_eq!(est_tokens("abcd"), 1);
        assert_eq!(est_tokens("abcde"), 2);
    }

    #[test]
    fn two_small_paragraphs_pack_into_one_passage() {
        let text = "Para A is about visas.\n\nPara B is about legislation.";
        let passages = chunk(text, 500);
        assert_eq!(passages.len(), 1);
        assert_eq!(
            passages[0],
            "Para A is about visas.\n\nPara B is about legislation."
        );
    }

    #[test]
    fn budget_is_respected() {
        // 40-char paragraphs are 10 estimated tokens each; a budget of 25
        // fits at most two per passage.
        let para = "a".repeat(40);
        let text = vec![para.as_str(); 7].join("\n\n");
        let passages = chunk(&text, 25);

        assert_eq!(passages.len(), 4);
        for passage in &passages {
            assert!(est_tokens(passage) <= 25, "passage over budget");
        }
    }

    #[test]
    fn oversize_paragraph_stands_alone() {
        let big = "x".repeat(4000); // ~1000 tokens
        let text = format!("small intro\n\n{big}\n\nsmall outro");
        let passages = chunk(&text, 100);

        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0], "small intro");
        assert_eq!(passages[1], big);
        assert_eq!(passages[2], "small outro");
    }

    #[test]
    fn order_follows_the_source_text() {
        let text = "first\n\nsecond\n\nthird\n\nfourth";
        let passages = chunk(&text, 1);
        assert_eq!(passages, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn text_without_paragraphs_yields_nothing() {
        assert!(chunk("", 500).is_empty());
        assert!(chunk("\n\n\n\n  \n\n", 500).is_empty());
    }

    #[test]
    fn single_newlines_do_not_split() {
        let text = "line one\nline two\nline three";
        let passages = chunk(text, 500);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0], text);
    }
}
