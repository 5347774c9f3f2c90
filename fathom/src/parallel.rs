//! Parallel sampling of immutable arbitraries.
//!
//! Arbitraries are shared between worker threads, shrinkables are not: every
//! worker builds its own generator and random source and only hands plain
//! values back.

use crossbeam::thread::ScopedJoinHandle;
use log::debug;

use crate::arbitrary::Arbitrary;
use crate::error::{GenerationError, GenerationResult};
use crate::rng::{Seed, XorShiftRng};
use crate::sampling::{EdgeCasesMode, RandomizedShrinkables};

/// Configuration for parallel sampling
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Generation size passed to every worker's generator
    pub gen_size: usize,
    pub edge_cases: EdgeCasesMode,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            gen_size: 1000,
            edge_cases: EdgeCasesMode::Mixin,
        }
    }
}

impl ParallelConfig {
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }
}

fn sample_worker<T, A>(
    arbitrary: &A,
    seed: u64,
    count: usize,
    config: &ParallelConfig,
) -> GenerationResult<Vec<T>>
where
    T: 'static,
    A: Arbitrary<T>,
{
    let rng = XorShiftRng::new(seed);
    RandomizedShrinkables::new(arbitrary, config.gen_size, rng, config.edge_cases)?
        .take(count)
        .map(|sample| sample.map(|shrinkable| shrinkable.value()))
        .collect()
}

/// Draw `count` values using several threads
///
/// Worker `i` is seeded with `seed + i` and the workers' values are
/// concatenated in worker order, so a seed always yields the same values for
/// the same number of threads.
pub fn sample_parallel<T, A>(
    arbitrary: &A,
    seed: Seed,
    count: usize,
    config: &ParallelConfig,
) -> GenerationResult<Vec<T>>
where
    T: Send + 'static,
    A: Arbitrary<T>,
{
    let num_threads = config.num_threads.max(1);
    let per_thread = count / num_threads;
    let remaining = count % num_threads;
    debug!(
        "Sampling {} values on {} threads with seed {}",
        count, num_threads, seed
    );

    let result = crossbeam::scope(|s| {
        let handles: Vec<ScopedJoinHandle<'_, GenerationResult<Vec<T>>>> = (0..num_threads)
            .map(|thread_id| {
                let thread_count = if thread_id < remaining {
                    per_thread + 1
                } else {
                    per_thread
                };
                let thread_seed = seed.as_u64().wrapping_add(thread_id as u64);
                s.spawn(move |_| sample_worker(arbitrary, thread_seed, thread_count, config))
            })
            .collect();

        let mut values = Vec::with_capacity(count);
        for handle in handles {
            match handle.join() {
                Ok(worker_values) => values.extend(worker_values?),
                Err(_) => {
                    return Err(GenerationError::Aborted {
                        reason: "sampling thread panicked".to_string(),
                    });
                }
            }
        }
        Ok(values)
    });

    result.unwrap_or_else(|_| {
        Err(GenerationError::Aborted {
            reason: "sampling scope panicked".to_string(),
        })
    })
}
