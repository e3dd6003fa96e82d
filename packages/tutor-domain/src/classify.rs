use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::normalize::{is_apostrophe_like, normalize};

const MAX_TERM_WORDS: usize = 5;
const TERM_PREFIXES: [&str; 6] =
	["the word ", "the term ", "the phrase ", "the expression ", "word ", "term "];
const POLITE_PREFIXES: [&str; 7] = [
	"please ",
	"hey ",
	"can you tell me ",
	"could you tell me ",
	"do you know ",
	"i want to know ",
	"i wonder ",
];
const CONTRACTION_SUFFIXES: [&str; 7] = ["'s", "'t", "'re", "'ve", "'ll", "'d", "'m"];
// English words whose apostrophe is an elision, not a glottal stop.
const ENGLISH_ELISIONS: [&str; 6] = ["o'clock", "rock'n'roll", "ma'am", "y'all", "ne'er", "e'er"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Lookup,
	Educational,
	General,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lookup => "lookup",
			Self::Educational => "educational",
			Self::General => "general",
		}
	}
}

/// Which way a lookup query asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupDirection {
	/// "What does X mean": X is a word in the language being learned.
	TargetToSource,
	/// "How do you say X": X is a word in the learner's own language.
	SourceToTarget,
	/// No pattern matched; the term was taken from an orthographically marked token.
	Marked,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
	pub intent: Intent,
	pub target_term: Option<String>,
	pub direction: Option<LookupDirection>,
}
impl Classification {
	pub fn general() -> Self {
		Self { intent: Intent::General, target_term: None, direction: None }
	}
}

struct LookupPattern {
	regex: Regex,
	direction: LookupDirection,
}

static LOOKUP_PATTERNS: LazyLock<Vec<LookupPattern>> = LazyLock::new(|| {
	use LookupDirection::{SourceToTarget, TargetToSource};

	let specs = [
		(r"^what(?: does| do| did|'s| is) (.+?) mean(?: in english)?$", TargetToSource),
		(r"^what (.+?) means(?: in english)?$", TargetToSource),
		(r"^what(?: is|'s| are) the meaning of (.+)$", TargetToSource),
		(r"^(?:the )?meaning of (.+)$", TargetToSource),
		(r"^(?:define|definition of) (.+)$", TargetToSource),
		(r"^what(?: is|'s) the (?:word|term) for (.+?)(?: in [a-z' -]+)?$", SourceToTarget),
		(r"^translate (.+?) (?:in|into|to) english$", TargetToSource),
		(r"^what(?: is|'s) (.+?) in english$", TargetToSource),
		(
			r"^how (?:do|would|can|could|should) (?:you|i|we|one) say (.+?)(?: in [a-z' -]+)?$",
			SourceToTarget,
		),
		(
			r"^how (?:do|would|can) (?:you|i|we) translate (.+?)(?: (?:in|into|to) [a-z' -]+)?$",
			SourceToTarget,
		),
		(r"^translate (.+?)(?: (?:in|into|to) [a-z' -]+)?$", SourceToTarget),
	];

	specs
		.into_iter()
		.filter_map(|(pattern, direction)| {
			Regex::new(pattern).ok().map(|regex| LookupPattern { regex, direction })
		})
		.collect()
});

static EDUCATIONAL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"\b(?:conjugat\w*|grammar|plurals?|pluralize|tenses?|verb forms?|sentence structure|word order|usage|suffix\w*|prefix\w*|possessive\w*|pronouns?|how (?:do|would|can|should) (?:i|you|we) (?:use|form|make|build|construct|write)|when (?:do|should|can) (?:i|you|we) use|difference between)\b",
	)
	.ok()
});

/// Labels a raw user utterance with an intent and, for lookups, the term to look up.
///
/// Never fails. The worst case is [`Classification::general`], which routes to pure vector
/// search.
pub fn classify(raw_query: &str) -> Classification {
	let normalized = normalize(raw_query);
	let sentence = strip_polite_prefixes(
		normalized.trim_end_matches(|ch: char| matches!(ch, '?' | '!' | '.' | ' ')),
	);

	if sentence.is_empty() {
		return Classification::general();
	}

	for pattern in LOOKUP_PATTERNS.iter() {
		let Some(captures) = pattern.regex.captures(sentence) else { continue };
		let Some(term) = captures.get(1).and_then(|m| clean_term(m.as_str())) else { continue };

		return Classification {
			intent: Intent::Lookup,
			target_term: Some(term),
			direction: Some(pattern.direction),
		};
	}

	if EDUCATIONAL_PATTERN.as_ref().map(|re| re.is_match(sentence)).unwrap_or(false) {
		return Classification { intent: Intent::Educational, target_term: None, direction: None };
	}
	if let Some(term) = marked_token(raw_query) {
		return Classification {
			intent: Intent::Lookup,
			target_term: Some(term),
			direction: Some(LookupDirection::Marked),
		};
	}

	Classification::general()
}

/// True when the token carries a diacritic or an in-word apostrophe-style glottal marker.
pub fn has_lexical_marker(token: &str) -> bool {
	if token.nfd().any(is_combining_mark) {
		return true;
	}

	let chars: Vec<char> = token.chars().collect();

	for (idx, ch) in chars.iter().enumerate() {
		if !is_apostrophe_like(*ch) {
			continue;
		}
		// Modifier-letter glottal markers are letters in their own right.
		if matches!(*ch, '\u{02BC}' | '\u{02BB}' | '\u{02BE}' | '\u{A78C}') {
			return true;
		}

		let before =
			idx.checked_sub(1).and_then(|i| chars.get(i)).is_some_and(|c| c.is_alphabetic());
		let after = chars.get(idx + 1).is_some_and(|c| c.is_alphabetic());

		if before && after && !is_contraction(token) && !is_english_elision(token) {
			return true;
		}
	}

	false
}

fn marked_token(raw_query: &str) -> Option<String> {
	raw_query
		.split_whitespace()
		.map(trim_edge_punctuation)
		.find(|token| has_lexical_marker(token))
		.and_then(|token| clean_term(&normalize(token)))
}

fn is_contraction(token: &str) -> bool {
	let lowered = apostrophes_to_ascii(&token.to_lowercase());

	CONTRACTION_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix))
}

fn is_english_elision(token: &str) -> bool {
	let lowered = apostrophes_to_ascii(&token.to_lowercase());

	ENGLISH_ELISIONS.contains(&lowered.as_str())
}

fn apostrophes_to_ascii(token: &str) -> String {
	token.chars().map(|ch| if is_apostrophe_like(ch) { '\'' } else { ch }).collect()
}

fn strip_polite_prefixes(sentence: &str) -> &str {
	let mut out = sentence.trim();

	loop {
		let Some(rest) = POLITE_PREFIXES.iter().find_map(|prefix| out.strip_prefix(prefix)) else {
			return out;
		};

		out = rest.trim_start();
	}
}

fn trim_edge_punctuation(token: &str) -> &str {
	token.trim_matches(|ch: char| {
		matches!(ch, '?' | '!' | '.' | ',' | ';' | ':' | '(' | ')' | '"' | '\u{201C}' | '\u{201D}')
	})
}

fn clean_term(raw: &str) -> Option<String> {
	let mut term =
		raw.trim().trim_end_matches(|ch: char| matches!(ch, '?' | '!' | '.' | ',' | ';' | ':'));

	loop {
		let Some(rest) = TERM_PREFIXES.iter().find_map(|prefix| term.strip_prefix(prefix)) else {
			break;
		};

		term = rest.trim_start();
	}

	let term = strip_balanced_quotes(term.trim()).trim();

	if !term.chars().any(char::is_alphanumeric)
		|| term.split_whitespace().count() > MAX_TERM_WORDS
	{
		return None;
	}

	Some(term.to_string())
}

fn strip_balanced_quotes(term: &str) -> &str {
	for quote in ['\'', '"'] {
		if term.len() >= 2 && term.starts_with(quote) && term.ends_with(quote) {
			return &term[1..term.len() - 1];
		}
	}

	term
}
