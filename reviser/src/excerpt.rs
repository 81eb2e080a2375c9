//! Excerpt selection for AI revision requests
//!
//! Picks the few sections of a long document most likely to contain the
//! text a revision instruction refers to, so the AI request carries a
//! bounded amount of context instead of the whole document.
//!
//! Pipeline: segment (`##` headers, else fixed chunks) -> tokenize the
//! instruction -> score sections -> greedy pick with neighbours -> restore
//! document order -> optional intro/outro -> cap excerpt size.
//!
//! All sizes are in chars, not bytes.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use shared_types::{ExcerptOptions, SelectionMode};

/// Documents at or under this size are sent whole
pub const WHOLE_DOCUMENT_LIMIT: usize = 6000;
/// Chunk size used when the document has no `##` headers
pub const CHUNK_SIZE: usize = 2500;
/// Upper bound on a single excerpt
pub const MAX_EXCERPT_CHARS: usize = 4000;
/// Size of the intro/outro excerpts
pub const INTRO_OUTRO_CHARS: usize = 1200;

const OVERLAP_SAMPLE_CHARS: usize = 80;
const MAX_KEYWORDS: usize = 24;
const MIN_KEYWORD_CHARS: usize = 3;
const MAX_OCCURRENCE_SCORE: i64 = 10;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "for", "on", "with", "by", "be", "is", "are",
    "as", "at", "from", "it", "this", "that", "these", "those",
];

static HEADER_RE: OnceLock<Regex> = OnceLock::new();
static SECTION_NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn header_re() -> &'static Regex {
    HEADER_RE.get_or_init(|| Regex::new(r"(?m)^##[ \t]+([^\r\n]*\S)").expect("valid regex"))
}

fn section_number_re() -> &'static Regex {
    SECTION_NUMBER_RE
        .get_or_init(|| Regex::new(r"section\s+#?(\d+(?:\.\d+)*)").expect("valid regex"))
}

/// A contiguous slice of the document used as the unit of scoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub header: String,
    /// Byte range within the source document
    pub range: Range<usize>,
    pub content: &'a str,
}

/// Excerpts chosen for one request, with the labels of what was picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcerptSelection {
    pub excerpts: Vec<String>,
    pub headers: Vec<String>,
    pub mode: SelectionMode,
}

/// Select excerpt strings for `instruction` out of `text`.
pub fn select_excerpts(text: &str, instruction: &str, options: &ExcerptOptions) -> Vec<String> {
    select(text, instruction, options).excerpts
}

/// Same as [`select_excerpts`] but also reports which sections were used.
pub fn select(text: &str, instruction: &str, options: &ExcerptOptions) -> ExcerptSelection {
    if text.chars().count() <= WHOLE_DOCUMENT_LIMIT {
        return ExcerptSelection {
            excerpts: vec![text.to_string()],
            headers: vec!["DOCUMENT".to_string()],
            mode: SelectionMode::WholeDocument,
        };
    }

    let (sections, mode) = split_sections(text);
    let keywords = instruction_keywords(instruction);
    let numbers = number_hints(instruction);

    let scores: Vec<i64> = sections
        .iter()
        .enumerate()
        .map(|(index, section)| score_section(section, index, &keywords, &numbers))
        .collect();
    let picked = pick_sections(&scores, options.max_sections.max(1));

    let mut excerpts = Vec::with_capacity(picked.len() + 2);
    let mut headers = Vec::with_capacity(picked.len() + 2);
    // Byte offsets covered by the first and last picked excerpts
    let mut covered_start = text.len();
    let mut covered_end = 0;
    for index in picked {
        let section = &sections[index];
        let excerpt = char_prefix(section.content, MAX_EXCERPT_CHARS);
        covered_start = covered_start.min(section.range.start);
        covered_end = covered_end.max(section.range.start + excerpt.len());
        excerpts.push(excerpt.to_string());
        headers.push(section.header.clone());
    }

    if options.include_intro_outro {
        let intro_covered = text[..covered_start].chars().count() < OVERLAP_SAMPLE_CHARS;
        if !intro_covered {
            excerpts.insert(0, char_prefix(text, INTRO_OUTRO_CHARS).to_string());
            headers.insert(0, "INTRO".to_string());
        }

        let outro_covered = text[covered_end..].chars().count() < OVERLAP_SAMPLE_CHARS;
        if !outro_covered {
            excerpts.push(char_suffix(text, INTRO_OUTRO_CHARS).to_string());
            headers.push("OUTRO".to_string());
        }
    }

    tracing::debug!(
        mode = ?mode,
        sections = sections.len(),
        keywords = keywords.len(),
        number_hints = numbers.len(),
        excerpts = excerpts.len(),
        "Selected excerpts"
    );

    ExcerptSelection {
        excerpts,
        headers,
        mode,
    }
}

/// Split `text` at level-2 markdown headers, falling back to fixed chunks.
///
/// A header section runs from its header line to the next header (or end
/// of text). Text before the first header is not part of any section.
pub fn split_sections(text: &str) -> (Vec<Section<'_>>, SelectionMode) {
    let headers: Vec<(usize, String)> = header_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let label = caps.get(1)?.as_str().trim().to_string();
            Some((start, label))
        })
        .collect();

    if headers.is_empty() {
        return (chunk_sections(text), SelectionMode::Chunks);
    }

    let sections = headers
        .iter()
        .enumerate()
        .map(|(i, (start, label))| {
            let end = headers.get(i + 1).map(|(next, _)| *next).unwrap_or(text.len());
            Section {
                header: label.clone(),
                range: *start..end,
                content: &text[*start..end],
            }
        })
        .collect();
    (sections, SelectionMode::Sections)
}

fn chunk_sections(text: &str) -> Vec<Section<'_>> {
    let mut boundaries: Vec<usize> = text
        .char_indices()
        .step_by(CHUNK_SIZE)
        .map(|(offset, _)| offset)
        .collect();
    boundaries.push(text.len());

    boundaries
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Section {
            header: format!("CHUNK_{}", i + 1),
            range: pair[0]..pair[1],
            content: &text[pair[0]..pair[1]],
        })
        .collect()
}

fn normalize_instruction(instruction: &str) -> String {
    instruction
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '.' | '#') {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Keywords used for scoring: lowercased, stop words and short tokens
/// dropped, deduplicated, at most 24.
pub fn instruction_keywords(instruction: &str) -> Vec<String> {
    let normalized = normalize_instruction(instruction);
    let mut seen = HashSet::new();
    normalized
        .split_whitespace()
        .map(|token| token.trim_end_matches('.'))
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|token| !STOP_WORDS.contains(token))
        .filter(|token| seen.insert(token.to_string()))
        .take(MAX_KEYWORDS)
        .map(ToString::to_string)
        .collect()
}

/// Clause numbers mentioned by the instruction ("section 4", "12").
pub fn number_hints(instruction: &str) -> Vec<String> {
    let normalized = normalize_instruction(instruction);
    let mut seen = HashSet::new();
    let mut hints = Vec::new();

    for caps in section_number_re().captures_iter(&normalized) {
        if let Some(number) = caps.get(1) {
            let number = number.as_str().to_string();
            if seen.insert(number.clone()) {
                hints.push(number);
            }
        }
    }

    for token in normalized.split_whitespace() {
        let bare = token.trim_matches(|c| c == '#' || c == '.');
        let is_short_number =
            (1..=3).contains(&bare.len()) && bare.chars().all(|c| c.is_ascii_digit());
        if is_short_number && seen.insert(bare.to_string()) {
            hints.push(bare.to_string());
        }
    }

    hints
}

fn score_section(
    section: &Section<'_>,
    index: usize,
    keywords: &[String],
    numbers: &[String],
) -> i64 {
    let header = section.header.to_lowercase();
    let body = section.content.to_lowercase();
    let mut score = 0i64;

    for keyword in keywords {
        if header.contains(keyword.as_str()) {
            score += 4;
        }
        let occurrences = count_word_occurrences(&body, keyword) as i64;
        score += occurrences.min(MAX_OCCURRENCE_SCORE);
    }

    for number in numbers {
        if header.contains(number.as_str()) {
            score += 6;
        }
        if has_numbered_reference(&body, number) {
            score += 4;
        }
    }

    score + (2 - (index / 3) as i64).max(0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn count_word_occurrences(haystack: &str, word: &str) -> usize {
    if word.is_empty() {
        return 0;
    }
    let step = word.chars().next().map(char::len_utf8).unwrap_or(1);
    let mut count = 0;
    let mut from = 0;

    while let Some(pos) = haystack[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let bounded_before = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let bounded_after = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_word_char(c));

        if bounded_before && bounded_after {
            count += 1;
            from = end;
        } else {
            from = start + step;
        }
    }
    count
}

/// True when `number` appears as a clause marker: next to `#`, `.` or a
/// line break ("#4", "4.", "section 4\n"), or opening its line.
fn has_numbered_reference(body: &str, number: &str) -> bool {
    for (start, _) in body.match_indices(number) {
        let end = start + number.len();
        let prev = body[..start].chars().next_back();
        let next = body[end..].chars().next();
        if prev.is_some_and(|c| c.is_ascii_digit()) || next.is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        if matches!(prev, Some('#' | '\n')) || matches!(next, Some('.' | '\n')) {
            return true;
        }
        let line_start = body[..start].rfind('\n').map_or(0, |i| i + 1);
        if body[line_start..start]
            .chars()
            .all(|c| c.is_whitespace() || c == '#')
        {
            return true;
        }
    }
    false
}

/// Greedy pick: best sections first, each dragging in its neighbours while
/// budget remains. Stops at the first non-positive score once something is
/// picked.
fn pick_sections(scores: &[i64], max_sections: usize) -> BTreeSet<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|a, b| scores[*b].cmp(&scores[*a]).then(a.cmp(b)));

    let mut chosen = BTreeSet::new();
    for index in ranked {
        if chosen.len() >= max_sections {
            break;
        }
        let score = scores[index];
        if score <= 0 && !chosen.is_empty() {
            break;
        }

        let first_pick = chosen.is_empty();
        chosen.insert(index);
        if score > 0 || first_pick {
            for neighbor in [index.checked_sub(1), Some(index + 1)].into_iter().flatten() {
                if chosen.len() >= max_sections {
                    break;
                }
                if neighbor < scores.len() {
                    chosen.insert(neighbor);
                }
            }
        }
    }
    chosen
}

fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((offset, _)) => &s[..offset],
        None => s,
    }
}

fn char_suffix(s: &str, max_chars: usize) -> &str {
    let total = s.chars().count();
    if total <= max_chars {
        return s;
    }
    match s.char_indices().nth(total - max_chars) {
        Some((offset, _)) => &s[offset..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLES: [&str; 10] = [
        "Definitions",
        "Term",
        "Payment",
        "Confidentiality",
        "Intellectual Property",
        "Warranties",
        "Indemnification",
        "Limitation of Liability",
        "Termination",
        "Governing Law",
    ];

    fn filler() -> String {
        "Lorem ipsum dolor sit amet consectetur. ".repeat(20)
    }

    fn contract(preamble: &str) -> String {
        let mut doc = preamble.to_string();
        for title in TITLES {
            doc.push_str(&format!("## {title}\n{}\n", filler()));
        }
        doc
    }

    fn options(max_sections: usize, include_intro_outro: bool) -> ExcerptOptions {
        ExcerptOptions {
            max_sections,
            include_intro_outro,
        }
    }

    #[test]
    fn test_small_document_is_returned_whole() {
        let doc = "x".repeat(WHOLE_DOCUMENT_LIMIT);
        let selection = select(&doc, "rewrite everything about section 4", &options(1, true));
        assert_eq!(selection.excerpts, vec![doc.clone()]);
        assert_eq!(selection.mode, SelectionMode::WholeDocument);

        let short = "## Term\nThe term is 2 years.\n\n## Confidentiality\nBoth parties agree...";
        assert_eq!(
            select_excerpts(short, "", &ExcerptOptions::default()),
            vec![short.to_string()]
        );
    }

    #[test]
    fn test_limit_is_counted_in_chars() {
        let doc = "é".repeat(WHOLE_DOCUMENT_LIMIT);
        assert!(doc.len() > WHOLE_DOCUMENT_LIMIT);
        assert_eq!(select_excerpts(&doc, "anything", &options(3, false)), vec![doc]);
    }

    #[test]
    fn test_split_sections_on_level_two_headers() {
        let doc = "Preamble\n## One\nbody one\n### Sub\nstill one\n## Two\nbody two";
        let (sections, mode) = split_sections(doc);
        assert_eq!(mode, SelectionMode::Sections);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header, "One");
        assert_eq!(sections[0].content, "## One\nbody one\n### Sub\nstill one\n");
        assert_eq!(sections[1].header, "Two");
        assert_eq!(sections[1].content, "## Two\nbody two");
        assert_eq!(&doc[sections[1].range.clone()], sections[1].content);
    }

    #[test]
    fn test_split_sections_falls_back_to_chunks() {
        let doc = "a".repeat(CHUNK_SIZE * 2 + 10);
        let (sections, mode) = split_sections(&doc);
        assert_eq!(mode, SelectionMode::Chunks);
        let headers: Vec<&str> = sections.iter().map(|s| s.header.as_str()).collect();
        assert_eq!(headers, vec!["CHUNK_1", "CHUNK_2", "CHUNK_3"]);
        assert_eq!(sections[2].content.len(), 10);
    }

    #[test]
    fn test_instruction_keywords() {
        let keywords =
            instruction_keywords("Change the Term to 5 years, and the TERM of payment!");
        assert_eq!(keywords, vec!["change", "term", "years", "payment"]);
    }

    #[test]
    fn test_instruction_keywords_capped() {
        let instruction = (0..40)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(instruction_keywords(&instruction).len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_number_hints() {
        assert_eq!(
            number_hints("Revise Section 12 and clause 4; ignore 2024"),
            vec!["12", "4"]
        );
        assert_eq!(number_hints("update section 4.2"), vec!["4.2"]);
        assert!(number_hints("no numbers here").is_empty());
    }

    #[test]
    fn test_word_occurrences_respect_boundaries() {
        assert_eq!(count_word_occurrences("term terms term. midterm term", "term"), 3);
    }

    #[test]
    fn test_numbered_reference() {
        assert!(has_numbered_reference("see clause\n4. payment", "4"));
        assert!(has_numbered_reference("## 4 payment", "4"));
        assert!(has_numbered_reference("see 4. above", "4"));
        assert!(has_numbered_reference("obligations under clause #4 survive", "4"));
        assert!(has_numbered_reference("as set out in section 4\nthe parties", "4"));
        assert!(!has_numbered_reference("paid within 14 days", "4"));
        assert!(!has_numbered_reference("paid within 4 days", "4"));
        assert!(!has_numbered_reference("clause #14 survives", "4"));
    }

    /// Ten numbered sections. Definitions and Termination both point at
    /// clause 7, one through a line break and one through `#7`.
    fn numbered_contract() -> String {
        let mut doc = String::new();
        for (i, title) in TITLES.iter().enumerate() {
            let reference = match i {
                0 => "Terms are used as set out in Section 7\nunless stated otherwise.",
                8 => "Obligations under clause #7 survive termination.",
                _ => "",
            };
            doc.push_str(&format!("## {}. {title}\n{}{reference}\n", i + 1, filler()));
        }
        doc
    }

    #[test]
    fn test_section_number_selects_numbered_clause() {
        let doc = numbered_contract();
        let selection = select(&doc, "revise section 7", &options(3, false));
        assert_eq!(
            selection.headers,
            vec!["6. Warranties", "7. Indemnification", "8. Limitation of Liability"]
        );
    }

    #[test]
    fn test_clause_cross_references_raise_sections() {
        let doc = numbered_contract();
        let selection = select(&doc, "revise section 7", &options(6, false));
        assert_eq!(
            selection.headers,
            vec![
                "1. Definitions",
                "2. Term",
                "6. Warranties",
                "7. Indemnification",
                "8. Limitation of Liability",
                "9. Termination",
            ]
        );
    }

    #[test]
    fn test_relevant_section_selected_with_neighbors_in_order() {
        let doc = contract("");
        let selection = select(&doc, "Update the payment schedule", &options(3, false));
        assert_eq!(selection.mode, SelectionMode::Sections);
        assert_eq!(selection.headers, vec!["Term", "Payment", "Confidentiality"]);
        assert!(selection.excerpts[1].starts_with("## Payment\n"));
    }

    #[test]
    fn test_excerpt_bound_and_verbatim() {
        let doc = contract("");
        for instruction in ["payment", "governing law", "section 7", "", "zzz qqq"] {
            let excerpts = select_excerpts(&doc, instruction, &options(3, false));
            assert!(!excerpts.is_empty());
            assert!(excerpts.len() <= 3 + 2, "{instruction}: {}", excerpts.len());
            for excerpt in &excerpts {
                assert!(doc.contains(excerpt.as_str()));
            }
        }
    }

    #[test]
    fn test_weak_signal_favors_early_sections() {
        let doc = contract("");
        let selection = select(&doc, "zzz", &options(3, false));
        assert_eq!(selection.headers, vec!["Definitions", "Term", "Payment"]);
    }

    #[test]
    fn test_zero_budget_still_returns_one_excerpt() {
        let doc = contract("");
        assert_eq!(select_excerpts(&doc, "termination", &options(0, false)).len(), 1);
    }

    #[test]
    fn test_intro_and_outro_added() {
        let doc = contract("MASTER SERVICES AGREEMENT between Acme and Example Corp.\n\n");
        let selection = select(&doc, "Update the payment schedule", &options(3, true));
        assert_eq!(selection.headers.first().map(String::as_str), Some("INTRO"));
        assert_eq!(selection.headers.last().map(String::as_str), Some("OUTRO"));
        assert_eq!(selection.excerpts.len(), 5);
        assert!(selection.excerpts[0].starts_with("MASTER SERVICES AGREEMENT"));
        assert_eq!(selection.excerpts[0].chars().count(), INTRO_OUTRO_CHARS);
        assert!(doc.ends_with(selection.excerpts[4].as_str()));
    }

    #[test]
    fn test_intro_skipped_when_first_section_covers_it() {
        let doc = contract("");
        let selection = select(&doc, "definitions", &options(3, true));
        assert!(!selection.headers.contains(&"INTRO".to_string()));
        assert_eq!(selection.headers[0], "Definitions");
        assert_eq!(selection.headers.last().map(String::as_str), Some("OUTRO"));
    }

    #[test]
    fn test_outro_skipped_when_last_section_covers_it() {
        let doc = contract("");
        let selection = select(&doc, "governing law", &options(3, true));
        assert!(selection.headers.contains(&"Governing Law".to_string()));
        assert!(!selection.headers.contains(&"OUTRO".to_string()));
    }

    #[test]
    fn test_outro_kept_when_sections_share_boilerplate() {
        let doc = contract("");
        let selection = select(&doc, "Update the payment schedule", &options(3, true));
        assert_eq!(
            selection.headers,
            vec!["INTRO", "Term", "Payment", "Confidentiality", "OUTRO"]
        );
        assert!(doc.ends_with(selection.excerpts[4].as_str()));
        assert!(selection.excerpts[4].contains("## Governing Law\n"));
    }

    #[test]
    fn test_outro_kept_when_last_section_is_capped() {
        let doc = format!(
            "{}## Schedule A\n{}Final clause.\n",
            contract(""),
            "word ".repeat(1000)
        );
        let selection = select(&doc, "schedule", &options(3, true));
        assert!(selection.headers.contains(&"Schedule A".to_string()));
        assert_eq!(selection.headers.last().map(String::as_str), Some("OUTRO"));
        assert!(selection.excerpts.last().unwrap().ends_with("Final clause.\n"));
    }

    #[test]
    fn test_long_sections_are_capped() {
        let doc = format!("## Scope\n{}", "word ".repeat(1600));
        let excerpts = select_excerpts(&doc, "scope", &options(3, false));
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].chars().count(), MAX_EXCERPT_CHARS);
        assert!(doc.starts_with(excerpts[0].as_str()));
    }

    #[test]
    fn test_chunks_scored_by_keyword() {
        let plain = "abcd ".repeat(500);
        let hit = format!("{}{}", "indemnity ".repeat(5), "abcd ".repeat(490));
        let doc = [plain.as_str(), &plain, &plain, &hit, &plain].concat();

        let selection = select(&doc, "fix indemnity wording", &options(3, false));
        assert_eq!(selection.mode, SelectionMode::Chunks);
        assert_eq!(selection.headers, vec!["CHUNK_3", "CHUNK_4", "CHUNK_5"]);
        assert_eq!(selection.excerpts[1], hit);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let doc = contract("Preamble text.\n");
        let first = select(&doc, "limit liability to fees paid", &options(6, true));
        let second = select(&doc, "limit liability to fees paid", &options(6, true));
        assert_eq!(first, second);
    }

    #[test]
    fn test_pick_sections_stops_at_non_positive_scores() {
        let picked = pick_sections(&[0, 5, 0, 0, 0, 0], 6);
        assert_eq!(picked.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
