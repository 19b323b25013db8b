//! Candidate phrase generation
//!
//! All modes produce the same thing: a finite, lazily evaluated,
//! deterministically ordered sequence of `MnemonicIds`. Determinism is
//! what makes searches resumable and partitionable; `skip_to` plus the
//! strided view give each worker a disjoint slice of the same sequence.

use crate::derivation::MnemonicIds;
use crate::error::{ConfigError, GeneratorError, Result};
use crate::wordlist::{WordId, Wordlist};
use log::debug;

/// Hard cap on enumerable search spaces
const MAX_SEARCH_SPACE: u64 = 1_000_000_000_000;

/// One mutation applied to the guess at a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    /// Small: swap in a word close to the guessed one
    ReplaceClose,
    /// Small: transpose this word with its right neighbor
    Transpose,
    /// Small: drop one of two identical adjacent words
    DupDelete,
    /// Big: swap in any vocabulary word
    Replace,
    /// Big: insert any vocabulary word before this position
    Insert,
    /// Big: drop the word at this position
    Delete,
}

impl EditKind {
    fn is_big(self) -> bool {
        matches!(self, EditKind::Replace | EditKind::Insert | EditKind::Delete)
    }

    fn length_delta(self) -> i64 {
        match self {
            EditKind::Insert => 1,
            EditKind::Delete | EditKind::DupDelete => -1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Edit {
    pos: usize,
    kind: EditKind,
}

/// A set of edits at distinct ascending positions. Each edit spans a
/// space of alternatives (its radix); the plan's candidates are their
/// product.
#[derive(Debug, Clone)]
struct Plan {
    edits: Vec<Edit>,
    radices: Vec<u64>,
    size: u64,
}

impl Plan {
    fn new(edits: Vec<Edit>, close_ids: &[Vec<WordId>], wordlist_len: u32) -> Self {
        let radices: Vec<u64> = edits
            .iter()
            .map(|e| edit_alternatives(e, close_ids, wordlist_len))
            .collect();
        let size = radices.iter().product();
        Self {
            edits,
            radices,
            size,
        }
    }

    /// Decode a flat offset into a choice tuple, last edit fastest
    fn choice_at(&self, offset: u64) -> Vec<usize> {
        let mut choice = vec![0usize; self.edits.len()];
        let mut rem = offset;
        for (i, &radix) in self.radices.iter().enumerate().rev() {
            choice[i] = (rem % radix) as usize;
            rem /= radix;
        }
        choice
    }
}

enum Mode {
    Literal {
        candidates: Vec<MnemonicIds>,
    },
    Positional {
        alternatives: Vec<Vec<WordId>>,
        indices: Vec<usize>,
        exhausted: bool,
    },
    Typo {
        guess: Vec<WordId>,
        close_ids: Vec<Vec<WordId>>,
        wordlist_len: u32,
        plans: Vec<Plan>,
        plan_idx: usize,
        choice: Vec<usize>,
        plan_done: bool,
    },
}

/// Generator over candidate mnemonics; one enum, one contract
pub struct PhraseGenerator {
    mode: Mode,
    position: u64,
    total: u64,
}

impl PhraseGenerator {
    /// Literal mode: one candidate per line, file order preserved.
    /// Lines may be plain whitespace-separated words, bracketed lists
    /// (`['a', 'b']`) or tuples (`('a', 'b')`); the three are
    /// equivalent.
    pub fn from_literal_lines(lines: &[&str], wordlist: &Wordlist) -> Result<Self> {
        let mut candidates = Vec::new();
        for (lineno, line) in lines.iter().enumerate() {
            let words = match parse_phrase_line(line) {
                Some(words) => words,
                None => continue,
            };
            if words.is_empty() {
                return Err(GeneratorError::BadListLine(lineno + 1, line.to_string()).into());
            }
            let ids = words.iter().map(|w| wordlist.resolve(w)).collect();
            candidates.push(MnemonicIds::new(ids));
        }
        if candidates.is_empty() {
            return Err(GeneratorError::EmptyCandidateList.into());
        }
        let total = candidates.len() as u64;
        Ok(Self {
            mode: Mode::Literal { candidates },
            position: 0,
            total,
        })
    }

    /// Positional mode: line `i` lists the alternatives for position
    /// `i`; candidates are the Cartesian product in odometer order with
    /// the last position cycling fastest.
    pub fn from_positional_lines(lines: &[&str], wordlist: &Wordlist) -> Result<Self> {
        let mut alternatives: Vec<Vec<WordId>> = Vec::new();
        for (lineno, line) in lines.iter().enumerate() {
            let words = match parse_phrase_line(line) {
                Some(words) => words,
                None => continue,
            };
            if words.is_empty() {
                return Err(ConfigError::EmptyWordAlternatives(alternatives.len()).into());
            }
            let mut ids = Vec::with_capacity(words.len());
            for word in &words {
                let id = wordlist.resolve(word);
                if !wordlist.is_valid(id) {
                    return Err(GeneratorError::BadListLine(lineno + 1, word.clone()).into());
                }
                ids.push(id);
            }
            alternatives.push(ids);
        }
        if alternatives.is_empty() {
            return Err(GeneratorError::EmptyCandidateList.into());
        }

        let mut total: u64 = 1;
        for alts in &alternatives {
            total = total
                .checked_mul(alts.len() as u64)
                .filter(|&t| t <= MAX_SEARCH_SPACE)
                .ok_or(GeneratorError::SearchSpaceTooLarge(u64::MAX))?;
        }
        debug!("positional search space: {} candidates", total);

        let indices = vec![0; alternatives.len()];
        Ok(Self {
            mode: Mode::Positional {
                alternatives,
                indices,
                exhausted: false,
            },
            position: 0,
            total,
        })
    }

    /// Typo mode: mutations of a guess phrase within an edit budget of
    /// `typos` total edits, of which at most `big_typos` may be big.
    /// Plans are enumerated by ascending edit count, positions left to
    /// right, small kinds before big; only plans landing on
    /// `expected_len` words survive.
    pub fn from_typos(
        wordlist: &Wordlist,
        guess_words: &[String],
        typos: u32,
        big_typos: u32,
        expected_len: usize,
    ) -> Result<Self> {
        if big_typos > typos {
            return Err(ConfigError::MalformedTypoBudget { typos, big_typos }.into());
        }
        let guess: Vec<WordId> = guess_words.iter().map(|w| wordlist.resolve(w)).collect();
        let close_ids: Vec<Vec<WordId>> =
            guess_words.iter().map(|w| wordlist.close_ids(w)).collect();

        let plans = build_plans(
            &guess,
            &close_ids,
            wordlist.len() as u32,
            typos,
            big_typos,
            expected_len,
        )?;
        let total = plans.iter().map(|p| p.size).sum();
        if total > MAX_SEARCH_SPACE {
            return Err(GeneratorError::SearchSpaceTooLarge(total).into());
        }
        debug!(
            "typo search space: {} candidates across {} edit plans",
            total,
            plans.len()
        );

        let choice = Vec::new();
        Ok(Self {
            mode: Mode::Typo {
                guess,
                close_ids,
                wordlist_len: wordlist.len() as u32,
                plans,
                plan_idx: 0,
                choice,
                plan_done: false,
            },
            position: 0,
            total,
        })
    }

    /// Number of candidates this generator will produce in total
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Index of the next candidate to be produced (0-based)
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.total
    }

    /// Jump so the next candidate produced is the one at `offset` in
    /// the deterministic sequence. Offsets at or past the end exhaust
    /// the generator.
    pub fn skip_to(&mut self, offset: u64) {
        self.position = offset.min(self.total);
        match &mut self.mode {
            Mode::Literal { .. } => {}
            Mode::Positional {
                alternatives,
                indices,
                exhausted,
            } => {
                if self.position >= self.total {
                    *exhausted = true;
                    return;
                }
                *exhausted = false;
                // Mixed-radix decode, last position least significant
                let mut rem = self.position;
                for pos in (0..alternatives.len()).rev() {
                    let radix = alternatives[pos].len() as u64;
                    indices[pos] = (rem % radix) as usize;
                    rem /= radix;
                }
            }
            Mode::Typo {
                plans,
                plan_idx,
                choice,
                plan_done,
                ..
            } => {
                let mut rem = self.position;
                *plan_idx = 0;
                while *plan_idx < plans.len() && rem >= plans[*plan_idx].size {
                    rem -= plans[*plan_idx].size;
                    *plan_idx += 1;
                }
                if *plan_idx >= plans.len() {
                    *plan_done = true;
                    return;
                }
                *plan_done = false;
                *choice = plans[*plan_idx].choice_at(rem);
            }
        }
    }

    /// Produce the next candidate, or None when exhausted
    pub fn next_candidate(&mut self) -> Option<MnemonicIds> {
        if self.position >= self.total {
            return None;
        }
        let candidate = match &mut self.mode {
            Mode::Literal { candidates } => candidates[self.position as usize].clone(),
            Mode::Positional {
                alternatives,
                indices,
                exhausted,
            } => {
                if *exhausted {
                    return None;
                }
                let ids = indices
                    .iter()
                    .enumerate()
                    .map(|(pos, &i)| alternatives[pos][i])
                    .collect();
                // Advance the odometer, last position fastest
                let mut pos = alternatives.len();
                loop {
                    if pos == 0 {
                        *exhausted = true;
                        break;
                    }
                    pos -= 1;
                    indices[pos] += 1;
                    if indices[pos] < alternatives[pos].len() {
                        break;
                    }
                    indices[pos] = 0;
                }
                MnemonicIds::new(ids)
            }
            Mode::Typo {
                guess,
                close_ids,
                wordlist_len,
                plans,
                plan_idx,
                choice,
                plan_done,
            } => {
                if *plan_done || *plan_idx >= plans.len() {
                    return None;
                }
                if choice.len() != plans[*plan_idx].edits.len() {
                    *choice = vec![0; plans[*plan_idx].edits.len()];
                }
                let plan = &plans[*plan_idx];
                let ids = apply_plan(guess, close_ids, *wordlist_len, plan, choice);

                // Advance within the plan, last edit fastest; roll over
                // to the next plan on exhaustion.
                let mut pos = plan.edits.len();
                let mut carried = true;
                while pos > 0 {
                    pos -= 1;
                    choice[pos] += 1;
                    if (choice[pos] as u64)
                        < edit_alternatives(&plan.edits[pos], close_ids, *wordlist_len)
                    {
                        carried = false;
                        break;
                    }
                    choice[pos] = 0;
                }
                if carried {
                    *plan_idx += 1;
                    *choice = match plans.get(*plan_idx) {
                        Some(next) => vec![0; next.edits.len()],
                        None => Vec::new(),
                    };
                }
                MnemonicIds::new(ids)
            }
        };
        self.position += 1;
        Some(candidate)
    }

    /// Deterministic slice for worker `offset` of `step`: candidates
    /// `offset, offset+step, offset+2*step, ...`
    pub fn strided(self, offset: u64, step: u64) -> StridedGenerator {
        StridedGenerator {
            inner: self,
            offset,
            step,
            produced: 0,
        }
    }
}

/// Worker view over a generator's stride
pub struct StridedGenerator {
    inner: PhraseGenerator,
    offset: u64,
    step: u64,
    produced: u64,
}

impl StridedGenerator {
    pub fn next_candidate(&mut self) -> Option<MnemonicIds> {
        let target = self.offset + self.produced * self.step;
        if self.inner.position() != target {
            self.inner.skip_to(target);
        }
        let candidate = self.inner.next_candidate()?;
        self.produced += 1;
        Some(candidate)
    }

    /// Generation index of the candidate just produced
    pub fn last_index(&self) -> Option<u64> {
        self.produced
            .checked_sub(1)
            .map(|k| self.offset + k * self.step)
    }
}

/// Endless stream of deterministic wrong candidates with the correct
/// one injected at a fixed interval; only for measuring and exercising
/// the verification plumbing.
pub struct PerformanceIterator {
    wordlist_len: u32,
    phrase_len: usize,
    counter: u64,
    correct: Option<MnemonicIds>,
    inject_every: u64,
}

impl PerformanceIterator {
    pub fn new(
        wordlist: &Wordlist,
        phrase_len: usize,
        correct: Option<MnemonicIds>,
        inject_every: u64,
    ) -> Self {
        Self {
            wordlist_len: wordlist.len() as u32,
            phrase_len,
            counter: 0,
            correct,
            inject_every,
        }
    }
}

impl Iterator for PerformanceIterator {
    type Item = MnemonicIds;

    fn next(&mut self) -> Option<MnemonicIds> {
        self.counter += 1;
        if self.inject_every > 0 && self.counter % self.inject_every == 0 {
            if let Some(correct) = &self.correct {
                return Some(correct.clone());
            }
        }
        // Cheap multiplicative scramble; uniqueness is irrelevant, the
        // candidates only need to be deterministic and nearly always
        // wrong.
        let ids = (0..self.phrase_len)
            .map(|j| {
                let mixed = self
                    .counter
                    .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    .wrapping_add(j as u64 * 0x517C_C1B7);
                (mixed % self.wordlist_len as u64) as WordId
            })
            .collect();
        Some(MnemonicIds::new(ids))
    }
}

// ---------------------------------------------------------------------------
// Typo plan machinery

fn edit_alternatives(edit: &Edit, close_ids: &[Vec<WordId>], wordlist_len: u32) -> u64 {
    match edit.kind {
        EditKind::ReplaceClose => close_ids[edit.pos].len() as u64,
        EditKind::Transpose | EditKind::DupDelete | EditKind::Delete => 1,
        EditKind::Replace | EditKind::Insert => wordlist_len as u64,
    }
}

fn build_plans(
    guess: &[WordId],
    close_ids: &[Vec<WordId>],
    wordlist_len: u32,
    typos: u32,
    big_typos: u32,
    expected_len: usize,
) -> Result<Vec<Plan>> {
    let mut plans = Vec::new();
    if guess.len() == expected_len {
        plans.push(Plan::new(Vec::new(), close_ids, wordlist_len));
    }
    for edit_count in 1..=typos {
        let mut edits = Vec::new();
        extend_plans(
            guess,
            close_ids,
            wordlist_len,
            edit_count,
            big_typos,
            expected_len,
            0,
            0,
            &mut edits,
            &mut plans,
        );
    }
    Ok(plans)
}

/// All valid edits at one position, small kinds first
fn edits_at(guess: &[WordId], close_ids: &[Vec<WordId>], pos: usize) -> Vec<EditKind> {
    let mut kinds = Vec::new();
    if pos < guess.len() {
        if !close_ids[pos].is_empty() {
            kinds.push(EditKind::ReplaceClose);
        }
        if pos + 1 < guess.len() {
            kinds.push(EditKind::Transpose);
        }
        if pos > 0 && guess[pos] == guess[pos - 1] {
            kinds.push(EditKind::DupDelete);
        }
        kinds.push(EditKind::Replace);
        kinds.push(EditKind::Insert);
        kinds.push(EditKind::Delete);
    } else {
        // One past the end: only appending is meaningful
        kinds.push(EditKind::Insert);
    }
    kinds
}

#[allow(clippy::too_many_arguments)]
fn extend_plans(
    guess: &[WordId],
    close_ids: &[Vec<WordId>],
    wordlist_len: u32,
    remaining: u32,
    big_budget: u32,
    expected_len: usize,
    from_pos: usize,
    length_delta: i64,
    edits: &mut Vec<Edit>,
    plans: &mut Vec<Plan>,
) {
    if remaining == 0 {
        if guess.len() as i64 + length_delta == expected_len as i64 {
            let plan = Plan::new(edits.clone(), close_ids, wordlist_len);
            if plan.size > 0 {
                plans.push(plan);
            }
        }
        return;
    }
    for pos in from_pos..=guess.len() {
        for kind in edits_at(guess, close_ids, pos) {
            let big_cost = u32::from(kind.is_big());
            if big_cost > big_budget {
                continue;
            }
            edits.push(Edit { pos, kind });
            extend_plans(
                guess,
                close_ids,
                wordlist_len,
                remaining - 1,
                big_budget - big_cost,
                expected_len,
                pos + 1,
                length_delta + kind.length_delta(),
                edits,
                plans,
            );
            edits.pop();
        }
    }
}

/// Materialize one candidate: edits applied right to left so earlier
/// positions stay stable while later ones shift
fn apply_plan(
    guess: &[WordId],
    close_ids: &[Vec<WordId>],
    _wordlist_len: u32,
    plan: &Plan,
    choice: &[usize],
) -> Vec<WordId> {
    let mut ids: Vec<WordId> = guess.to_vec();
    for (edit, &pick) in plan.edits.iter().zip(choice).rev() {
        match edit.kind {
            EditKind::ReplaceClose => ids[edit.pos] = close_ids[edit.pos][pick],
            EditKind::Transpose => ids.swap(edit.pos, edit.pos + 1),
            EditKind::DupDelete | EditKind::Delete => {
                ids.remove(edit.pos);
            }
            EditKind::Replace => ids[edit.pos] = pick as WordId,
            EditKind::Insert => ids.insert(edit.pos, pick as WordId),
        }
    }
    ids
}

/// Parse one input line into words. Plain lines split on whitespace;
/// bracketed list/tuple lines strip quotes per element. Blank lines
/// and comments yield None.
fn parse_phrase_line(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('(') && trimmed.ends_with(')'))
    {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Some(
            inner
                .split(',')
                .map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        );
    }
    Some(trimmed.split_whitespace().map(str::to_string).collect())
}
