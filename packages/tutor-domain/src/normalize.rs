use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Characters that stand in for an apostrophe or a glottal stop in practical orthographies.
pub const APOSTROPHE_VARIANTS: [char; 9] = [
	'\u{2019}', // right single quotation mark
	'\u{2018}', // left single quotation mark
	'\u{02BC}', // modifier letter apostrophe
	'\u{02BB}', // modifier letter turned comma (okina)
	'\u{02BE}', // modifier letter right half ring
	'\u{A78C}', // latin small letter saltillo
	'\u{2032}', // prime
	'\u{00B4}', // acute accent used as an apostrophe
	'`',
];

const DOUBLE_QUOTE_VARIANTS: [char; 4] = ['\u{201C}', '\u{201D}', '\u{201E}', '\u{00AB}'];

/// Canonical form used for every lexical comparison.
///
/// Two surface spellings of the same item (with or without diacritics, with any apostrophe-like
/// glottal marker, in any case or spacing) normalize to the same string. The function is
/// idempotent.
pub fn normalize(text: &str) -> String {
	let marked: String = text.chars().map(unify_marker).collect();
	let folded: String = marked.nfkc().collect();
	let lowered = folded.to_lowercase();
	let stripped: String =
		lowered.nfd().filter(|ch| !is_combining_mark(*ch)).map(unify_marker).collect();
	let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

	collapsed.nfc().collect()
}

pub fn is_apostrophe_like(ch: char) -> bool {
	ch == '\'' || APOSTROPHE_VARIANTS.contains(&ch)
}

fn unify_marker(ch: char) -> char {
	if APOSTROPHE_VARIANTS.contains(&ch) {
		'\''
	} else if DOUBLE_QUOTE_VARIANTS.contains(&ch) {
		'"'
	} else {
		ch
	}
}
