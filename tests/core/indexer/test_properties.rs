// Properties of the tokenizer, skip-gram generator and chunker

use skipdex::core::indexer::{
    compute_text_chunks, compute_text_index, count_lines, skip_grams, tokenize,
};

const SAMPLES: &[&str] = &[
    "",
    "\n",
    "cat dog house",
    "The Quick brown fox\njumps over\n\nthe lazy dog\n",
    "  leading and trailing  \r\nwindows line",
    "a ab abc abcd abcde abcdef abcdefg abcdefgh",
];

#[test]
fn test_chunk_count_matches_line_count() {
    for text in SAMPLES {
        let chunks: Vec<_> = compute_text_chunks(text).collect();
        assert_eq!(chunks.len(), count_lines(text), "text: {text:?}");
        assert_eq!(chunks.len(), text.matches('\n').count() + 1);

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.line_number, position);
        }
    }
}

#[test]
fn test_line_text_is_untouched() {
    let text = "MiXeD Case\n  spaced  \r\n";
    let lines: Vec<String> = compute_text_chunks(text).map(|c| c.line_text).collect();
    assert_eq!(lines, vec!["MiXeD Case", "  spaced  \r", ""]);
}

#[test]
fn test_exact_bucket_holds_only_three_and_four_char_tokens() {
    for text in SAMPLES {
        for chunk in compute_text_chunks(text) {
            let expected: Vec<String> = tokenize(&chunk.line_text)
                .filter(|t| (3..=4).contains(&t.chars().count()))
                .collect();
            assert_eq!(chunk.index.exact_words, expected);
        }
    }
}

#[test]
fn test_short_tokens_contribute_no_fragments() {
    let index = compute_text_index("a ab abc abcd");
    assert!(index.skip_fragments.is_empty());

    // Five characters: the only contiguous window is dropped by the bound
    assert!(skip_grams("abcde").is_empty());
}

#[test]
fn test_fragment_bucket_is_union_of_token_fragments() {
    let index = compute_text_index("Searching archives");
    let mut expected = skip_grams("searching");
    expected.extend(skip_grams("archives"));
    assert_eq!(index.skip_fragments, expected);
}

#[test]
fn test_cat_dog_house_scenario() {
    let index = compute_text_index("cat dog house");
    assert_eq!(index.exact_words, vec!["cat", "dog"]);
    assert_eq!(index.skip_fragments, skip_grams("house"));
}

#[test]
fn test_repeated_short_token_kept_per_occurrence() {
    let index = compute_text_index("the THE the");
    assert_eq!(index.exact_words, vec!["the", "the", "the"]);
}

#[test]
fn test_computation_is_deterministic() {
    for text in SAMPLES {
        let first: Vec<_> = compute_text_chunks(text).collect();
        let second: Vec<_> = compute_text_chunks(text).collect();
        assert_eq!(first, second);
    }
}

#[test]
fn test_single_typo_shares_a_fragment() {
    let original = skip_grams("archive");
    let typo = skip_grams("arhcive");
    assert!(
        typo.iter().any(|f| original.contains(f)),
        "{original:?} vs {typo:?}"
    );
}
