// ============================================================
// Layer 5 — Fork-Join over Replicas
// ============================================================
// Data parallelism is spelled out instead of hidden inside a
// framework wrapper:
//
//   plan_shards  split B rows into ≤ R contiguous shards
//   fork_join    run one scoped thread per shard, then wait
//                for ALL of them (the barrier) before returning
//
// A replica thread that panics is turned into a
// ResourceExhaustion error; backends panic when a device runs
// out of memory, and that must stop the run, not hang it.
//
// Reference: Rust Book §16 (Fearless Concurrency)
//            std::thread::scope

use std::{any::Any, ops::Range, thread};

use crate::domain::error::PipelineError;

/// A contiguous `[start, start + len)` slice of a mini-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub start: usize,
    pub len:   usize,
}

impl Shard {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Split `batch_size` rows across at most `replicas` shards of
/// `ceil(batch_size / replicas)` rows; only the last shard may be smaller.
pub fn plan_shards(batch_size: usize, replicas: usize) -> Vec<Shard> {
    if batch_size == 0 {
        return Vec::new();
    }
    let chunk = batch_size.div_ceil(replicas.max(1));
    (0..batch_size)
        .step_by(chunk)
        .map(|start| Shard { start, len: chunk.min(batch_size - start) })
        .collect()
}

/// Run `task(replica_index, input)` for every input on its own thread and
/// return the outputs in input order once every thread has finished.
pub fn fork_join<T, R, F>(inputs: Vec<T>, task: F) -> Result<Vec<R>, PipelineError>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> R + Sync,
{
    thread::scope(|scope| {
        let task = &task;
        let handles: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(replica, input)| scope.spawn(move || task(replica, input)))
            .collect();

        // Join every handle before inspecting any result
        let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();

        joined
            .into_iter()
            .enumerate()
            .map(|(replica, outcome)| {
                outcome.map_err(|payload| PipelineError::ResourceExhaustion {
                    replica,
                    message: panic_message(payload.as_ref()),
                })
            })
            .collect()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "replica panicked".to_string()
    }
}
