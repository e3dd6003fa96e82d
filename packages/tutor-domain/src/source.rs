use tutor_config::SourceTier;

/// Broad category of the material a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
	/// Dictionary-style entries, keyed by headword.
	Lexical,
	/// Curated lessons and grammar notes.
	Pedagogical,
	/// Articles and other crawled prose.
	Reference,
}
impl SourceKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lexical => "lexical",
			Self::Pedagogical => "pedagogical",
			Self::Reference => "reference",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim() {
			"lexical" => Some(Self::Lexical),
			"pedagogical" => Some(Self::Pedagogical),
			"reference" => Some(Self::Reference),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
struct Tier {
	priority: i32,
	multiplier: f32,
}

/// Lookup table from a chunk's `source_priority` to its ranking multiplier.
///
/// A priority takes the multiplier of the highest tier at or below it, so the mapping is a step
/// function that never decreases as priority grows. Priorities below every tier take the lowest
/// tier's multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTierTable {
	tiers: Vec<Tier>,
}
impl SourceTierTable {
	pub fn from_config(tiers: &[SourceTier]) -> Self {
		let mut tiers: Vec<Tier> = tiers
			.iter()
			.map(|tier| Tier { priority: tier.priority, multiplier: tier.multiplier })
			.collect();

		tiers.sort_by_key(|tier| tier.priority);

		Self { tiers }
	}

	pub fn multiplier(&self, priority: i32) -> f32 {
		self.tier_for(priority).map(|tier| tier.multiplier).unwrap_or(1.0)
	}

	fn tier_for(&self, priority: i32) -> Option<&Tier> {
		self.tiers.iter().rev().find(|tier| tier.priority <= priority).or_else(|| self.tiers.first())
	}
}
