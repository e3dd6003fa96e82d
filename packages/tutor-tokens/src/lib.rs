pub use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

pub type TokenizerError = tokenizers::Error;

/// Counts model tokens for budgeting.
pub trait TokenCounter
where
	Self: Send + Sync,
{
	fn count(&self, text: &str) -> usize;
}

/// Exact counts from a Hugging Face tokenizer.
pub struct TokenizerCounter {
	tokenizer: Tokenizer,
}
impl TokenizerCounter {
	pub fn new(tokenizer: Tokenizer) -> Self {
		Self { tokenizer }
	}

	pub fn from_pretrained(repo: &str) -> Result<Self, TokenizerError> {
		Ok(Self::new(load_tokenizer(repo)?))
	}
}
impl TokenCounter for TokenizerCounter {
	fn count(&self, text: &str) -> usize {
		match self.tokenizer.encode(text, false) {
			Ok(encoding) => encoding.len(),
			Err(err) => {
				tracing::error!(error = %err, "Tokenizer failed to encode text; falling back to word count.");

				WordCounter.count(text)
			},
		}
	}
}

/// Approximate counts: one token per Unicode word and per non-space symbol.
///
/// Used when no tokenizer is configured. Counts are additive over whitespace-separated pieces,
/// which keeps budget arithmetic predictable.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;
impl TokenCounter for WordCounter {
	fn count(&self, text: &str) -> usize {
		text.split_word_bounds().filter(|piece| !piece.trim().is_empty()).count()
	}
}

pub fn load_tokenizer(repo: &str) -> Result<Tokenizer, TokenizerError> {
	Tokenizer::from_pretrained(repo, None)
}

/// Longest grapheme-aligned prefix of `text` whose count is at most `max_tokens`, without
/// trailing whitespace.
///
/// The returned prefix is always verified against the counter, so the bound holds even for
/// counters that are not perfectly monotonic over prefixes.
pub fn truncate_to_tokens<'a>(
	counter: &dyn TokenCounter,
	text: &'a str,
	max_tokens: usize,
) -> &'a str {
	if counter.count(text) <= max_tokens {
		return text;
	}
	if max_tokens == 0 {
		return "";
	}

	let boundaries: Vec<usize> = text
		.grapheme_indices(true)
		.map(|(idx, _)| idx)
		.skip(1)
		.chain(std::iter::once(text.len()))
		.collect();
	// Invariant: `text[..boundaries[lo - 1]]` fits (or lo == 0 meaning the empty prefix fits).
	let mut lo = 0_usize;
	let mut hi = boundaries.len();

	while lo < hi {
		let mid = lo + (hi - lo).div_ceil(2);
		let end = boundaries[mid - 1];

		if counter.count(&text[..end]) <= max_tokens {
			lo = mid;
		} else {
			hi = mid - 1;
		}
	}

	if lo == 0 {
		return "";
	}

	let prefix = text[..boundaries[lo - 1]].trim_end();

	if counter.count(prefix) <= max_tokens { prefix } else { "" }
}
