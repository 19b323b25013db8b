//! Mnemonic vocabulary and fuzzy word resolution

use bip39::Language;
use std::collections::HashMap;

/// Index of a word within its wordlist
pub type WordId = u32;

/// Sentinel for a guess word that resolves to nothing in the vocabulary.
/// Candidates carrying it always fail derivation; only a replacement typo
/// can repair such a position.
pub const INVALID_WORD_ID: WordId = u32::MAX;

/// Similarity threshold for close-word replacement on full words
const CLOSE_RATIO: f64 = 0.65;

/// A recovery vocabulary with exact and prefix-based lookup
#[derive(Debug, Clone)]
pub struct Wordlist {
    words: Vec<String>,
    by_word: HashMap<String, WordId>,
    /// First-four-letters index; None when the prefix is ambiguous
    by_prefix: HashMap<String, Option<WordId>>,
}

impl Wordlist {
    /// Build a vocabulary from an explicit word sequence
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        let mut by_word = HashMap::with_capacity(words.len());
        let mut by_prefix: HashMap<String, Option<WordId>> = HashMap::with_capacity(words.len());

        for (id, word) in words.iter().enumerate() {
            let id = id as WordId;
            by_word.insert(word.clone(), id);
            let prefix: String = word.chars().take(4).collect();
            by_prefix
                .entry(prefix)
                .and_modify(|slot| *slot = None)
                .or_insert(Some(id));
        }

        Self {
            words,
            by_word,
            by_prefix,
        }
    }

    /// The standard English BIP39 vocabulary
    pub fn english() -> Self {
        Self::from_words(Language::English.word_list().iter().copied())
    }

    /// Number of words in the vocabulary
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word text for an id. Returns None for the invalid sentinel.
    pub fn word(&self, id: WordId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// All word ids, in vocabulary order
    pub fn ids(&self) -> impl Iterator<Item = WordId> + '_ {
        0..self.words.len() as WordId
    }

    /// Resolve a guess word to an id. Exact matches win; otherwise a
    /// unique first-four-letters prefix resolves (BIP39 guarantees the
    /// first four letters identify English words). Anything else maps
    /// to the invalid sentinel rather than failing, so a search can
    /// still repair the position with a replacement typo.
    pub fn resolve(&self, word: &str) -> WordId {
        let lowered = word.to_lowercase();
        if let Some(&id) = self.by_word.get(&lowered) {
            return id;
        }
        let prefix: String = lowered.chars().take(4).collect();
        match self.by_prefix.get(&prefix) {
            Some(&Some(id)) => id,
            _ => INVALID_WORD_ID,
        }
    }

    /// Whether an id refers to a real vocabulary word
    pub fn is_valid(&self, id: WordId) -> bool {
        (id as usize) < self.words.len()
    }

    /// Ids of vocabulary words "close" to the given word, excluding an
    /// exact match. A word is close when its full-text similarity ratio
    /// reaches the threshold, or when its first-four reduction is
    /// within one edit of the guess's first-four reduction.
    pub fn close_ids(&self, word: &str) -> Vec<WordId> {
        let lowered = word.to_lowercase();
        let prefix: String = lowered.chars().take(4).collect();
        let mut ids = Vec::new();
        for (id, candidate) in self.words.iter().enumerate() {
            if *candidate == lowered {
                continue;
            }
            if similarity_ratio(&lowered, candidate) >= CLOSE_RATIO {
                ids.push(id as WordId);
                continue;
            }
            let cand_prefix: String = candidate.chars().take(4).collect();
            if edit_distance(&prefix, &cand_prefix) <= 1 {
                ids.push(id as WordId);
            }
        }
        ids
    }
}

/// Similarity of two words as 2*LCS / (len_a + len_b), the classic
/// sequence-matcher ratio
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Levenshtein distance over characters
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            curr[j + 1] = sub.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
