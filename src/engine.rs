//! Batch verification engine
//!
//! Pulls candidates off a generator in batches, hands each batch to a
//! `BatchVerifier`, and reports the outcome. Stop requests are honored
//! between batches, never mid-batch. Partitioned runs give each worker
//! a stride of the candidate sequence; when several workers find
//! matches, the one earliest in generation order wins, so the result is
//! identical for any worker count.

use crate::derivation::{MnemonicIds, WalletDerivation};
use crate::error::{ConfigError, Result};
use crate::generator::PhraseGenerator;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Engine lifecycle, observable from other threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Generating,
    Deriving,
    Matched,
    Exhausted,
    Stopped,
}

impl EnginePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EnginePhase::Generating,
            2 => EnginePhase::Deriving,
            3 => EnginePhase::Matched,
            4 => EnginePhase::Exhausted,
            5 => EnginePhase::Stopped,
            _ => EnginePhase::Idle,
        }
    }
}

/// Terminal result of a search, with the number of candidates examined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Matched {
        candidate: MnemonicIds,
        examined: u64,
    },
    Exhausted {
        examined: u64,
    },
    Stopped {
        examined: u64,
    },
}

/// Verifies a batch of candidates against the match target.
///
/// Returns the first matching candidate (if any) and the number of
/// candidates consumed from the batch. On a hit the count includes the
/// hit itself, so the caller can map it back to a generation index; on
/// a miss the count is the whole batch.
pub trait BatchVerifier: Send + Sync {
    fn verify_batch(&self, batch: &[MnemonicIds]) -> Result<(Option<MnemonicIds>, usize)>;
}

/// CPU verifier: derives every candidate through the configured wallet
pub struct CpuBatchVerifier {
    wallet: Arc<dyn WalletDerivation>,
}

impl CpuBatchVerifier {
    pub fn new(wallet: Arc<dyn WalletDerivation>) -> Self {
        Self { wallet }
    }
}

impl BatchVerifier for CpuBatchVerifier {
    fn verify_batch(&self, batch: &[MnemonicIds]) -> Result<(Option<MnemonicIds>, usize)> {
        for (i, candidate) in batch.iter().enumerate() {
            match self.wallet.derive_and_match(candidate) {
                Ok(Some(found)) => {
                    info!(
                        "match at path {} index {}: {}",
                        found.path, found.index, found.address
                    );
                    return Ok((Some(candidate.clone()), i + 1));
                }
                Ok(None) => {}
                Err(err) => {
                    // A candidate that cannot be derived is a miss, not
                    // a reason to abandon the search
                    warn!("candidate failed derivation, counting as miss: {}", err);
                }
            }
        }
        Ok((None, batch.len()))
    }
}

/// Drives a candidate generator through a verifier
pub struct VerificationEngine {
    verifier: Arc<dyn BatchVerifier>,
    batch_size: usize,
    stop: Arc<AtomicBool>,
    phase: AtomicU8,
    examined: AtomicU64,
}

impl VerificationEngine {
    pub fn new(verifier: Arc<dyn BatchVerifier>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(batch_size).into());
        }
        Ok(Self {
            verifier,
            batch_size,
            stop: Arc::new(AtomicBool::new(false)),
            phase: AtomicU8::new(EnginePhase::Idle as u8),
            examined: AtomicU64::new(0),
        })
    }

    /// Flag shared with callers that want to stop the search, for
    /// example from a signal handler. Checked between batches.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Candidates examined so far across all workers
    pub fn examined(&self) -> u64 {
        self.examined.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    /// Single-threaded search over the full candidate sequence
    pub fn run(&self, mut generator: PhraseGenerator) -> Result<SearchOutcome> {
        info!("searching {} candidates", generator.total());
        loop {
            if self.stop.load(Ordering::SeqCst) {
                self.set_phase(EnginePhase::Stopped);
                return Ok(SearchOutcome::Stopped {
                    examined: self.examined(),
                });
            }

            self.set_phase(EnginePhase::Generating);
            let mut batch = Vec::with_capacity(self.batch_size);
            while batch.len() < self.batch_size {
                match generator.next_candidate() {
                    Some(candidate) => batch.push(candidate),
                    None => break,
                }
            }
            if batch.is_empty() {
                self.set_phase(EnginePhase::Exhausted);
                return Ok(SearchOutcome::Exhausted {
                    examined: self.examined(),
                });
            }

            self.set_phase(EnginePhase::Deriving);
            let (hit, consumed) = self.verifier.verify_batch(&batch)?;
            self.examined.fetch_add(consumed as u64, Ordering::SeqCst);
            if let Some(candidate) = hit {
                self.set_phase(EnginePhase::Matched);
                return Ok(SearchOutcome::Matched {
                    candidate,
                    examined: self.examined(),
                });
            }
        }
    }

    /// Partitioned search: worker `i` of `n` examines candidates
    /// `i, i+n, i+2n, ...` of the same deterministic sequence. The
    /// factory is called once per worker to build an identical
    /// generator. The reported match is always the one with the lowest
    /// generation index, so results do not depend on `workers`.
    pub fn run_partitioned<F>(&self, factory: F, workers: usize) -> Result<SearchOutcome>
    where
        F: Fn() -> Result<PhraseGenerator>,
    {
        let workers = if workers == 0 {
            num_cpus::get()
        } else {
            workers
        };
        if workers == 1 {
            return self.run(factory()?);
        }

        let mut generators = Vec::with_capacity(workers);
        for offset in 0..workers {
            generators.push(factory()?.strided(offset as u64, workers as u64));
        }
        info!("searching with {} workers", workers);

        // Lowest generation index of any match found so far; workers
        // past it stop scanning
        let best_index = AtomicU64::new(u64::MAX);
        let best: Mutex<Option<(u64, MnemonicIds)>> = Mutex::new(None);

        self.set_phase(EnginePhase::Deriving);
        let worker_errors: Mutex<Vec<crate::error::RecoveryError>> = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for (worker, mut generator) in generators.into_iter().enumerate() {
                let best_index = &best_index;
                let best = &best;
                let worker_errors = &worker_errors;
                let engine = &*self;
                scope.spawn(move || {
                    loop {
                        if engine.stop.load(Ordering::SeqCst) {
                            return;
                        }
                        let mut batch = Vec::with_capacity(engine.batch_size);
                        let mut indices = Vec::with_capacity(engine.batch_size);
                        while batch.len() < engine.batch_size {
                            match generator.next_candidate() {
                                Some(candidate) => {
                                    batch.push(candidate);
                                    indices.push(generator.last_index().unwrap_or(0));
                                }
                                None => break,
                            }
                        }
                        if batch.is_empty() {
                            return;
                        }
                        // Nothing in this batch can beat an existing hit
                        if indices[0] > best_index.load(Ordering::SeqCst) {
                            return;
                        }

                        match engine.verifier.verify_batch(&batch) {
                            Ok((hit, consumed)) => {
                                engine
                                    .examined
                                    .fetch_add(consumed as u64, Ordering::SeqCst);
                                if let Some(candidate) = hit {
                                    let index = indices[consumed - 1];
                                    debug!("worker {} hit at generation index {}", worker, index);
                                    let mut slot = best
                                        .lock()
                                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                                    if slot.as_ref().map_or(true, |(i, _)| index < *i) {
                                        *slot = Some((index, candidate));
                                        best_index.store(index, Ordering::SeqCst);
                                    }
                                    return;
                                }
                            }
                            Err(err) => {
                                // Verifier failures are fatal for the search
                                worker_errors
                                    .lock()
                                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                                    .push(err);
                                engine.stop.store(true, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = worker_errors
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .into_iter()
            .next()
        {
            return Err(err);
        }

        let winner = best
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some((_, candidate)) = winner {
            self.set_phase(EnginePhase::Matched);
            return Ok(SearchOutcome::Matched {
                candidate,
                examined: self.examined(),
            });
        }
        if self.stop.load(Ordering::SeqCst) {
            self.set_phase(EnginePhase::Stopped);
            return Ok(SearchOutcome::Stopped {
                examined: self.examined(),
            });
        }
        self.set_phase(EnginePhase::Exhausted);
        Ok(SearchOutcome::Exhausted {
            examined: self.examined(),
        })
    }
}
