//! Batch validation runner. Small batches run sequentially; large ones fan
//! out to a fixed pool of worker threads pulling jobs off a shared queue.
//! Either way the call is synchronous and preserves the index-to-record
//! correspondence of its input.

use crate::metrics_defs::{BATCH_DURATION, CLIENTS_VALIDATED, DUPLICATE_CLAVES};
use crate::rules;
use crate::types::Client;
use crossbeam::channel;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::thread;
use std::time::Instant;

/// Below this record count the runner stays on the calling thread.
pub const SEQUENTIAL_THRESHOLD: usize = 100;

/// Worker pool size for large batches; capped by the batch size.
pub const MAX_WORKERS: usize = 10;

/// Validates every record, then reconciles duplicate claves across the whole
/// batch. Re-running over its own output produces identical results.
pub fn validate_all(mut clients: Vec<Client>) -> Vec<Client> {
    let start = Instant::now();
    let total = clients.len();

    if total < SEQUENTIAL_THRESHOLD {
        for client in clients.iter_mut() {
            rules::validate(client);
        }
    } else {
        clients = validate_pooled(clients);
    }

    mark_duplicate_claves(&mut clients);

    counter!(CLIENTS_VALIDATED).increment(total as u64);
    histogram!(BATCH_DURATION).record(start.elapsed().as_secs_f64());
    clients
}

/// Fans the batch out to `min(MAX_WORKERS, len)` OS threads. Jobs carry their
/// input index and each result is written back to that slot, so workers own
/// disjoint slots and no ordering is lost. Joining the scope is the
/// completion barrier.
fn validate_pooled(clients: Vec<Client>) -> Vec<Client> {
    let total = clients.len();
    let workers = MAX_WORKERS.min(total);

    let (job_tx, job_rx) = channel::unbounded::<(usize, Client)>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, Client)>();

    let mut slots: Vec<Option<Client>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((index, mut client)) = job_rx.recv() {
                    rules::validate(&mut client);
                    if result_tx.send((index, client)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for job in clients.into_iter().enumerate() {
            // Fails only if every worker died, in which case the slot stays
            // empty and is dropped below.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        for (index, client) in result_rx.iter() {
            slots[index] = Some(client);
        }
    });

    slots.into_iter().flatten().collect()
}

/// Single-threaded reconciliation pass: every clave held by more than one
/// record adds a duplicate error to all of its holders, on top of whatever
/// per-field errors they already carry.
pub fn mark_duplicate_claves(clients: &mut [Client]) {
    let mut holders: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, client) in clients.iter().enumerate() {
        if !client.clave.is_empty() {
            holders.entry(client.clave.clone()).or_default().push(index);
        }
    }

    let mut duplicates = 0u64;
    for (clave, indices) in holders {
        if indices.len() > 1 {
            duplicates += indices.len() as u64;
            for index in indices {
                clients[index].add_error("clave", format!("duplicate clave: {clave}"));
            }
        }
    }

    if duplicates > 0 {
        counter!(DUPLICATE_CLAVES).increment(duplicates);
    }
}
