//! Batch processing with account-group partitioning
//!
//! This module provides the `BatchProcessor` struct, which replays batches of
//! requests concurrently while keeping the outcome identical to a sequential
//! replay.
//!
//! # Design
//!
//! A transfer couples two accounts: its admission depends on the origin's
//! balance and changes the destination's. Requests are therefore grouped by
//! connected component of the "touches the same account" relation, using a
//! union-find over origin and destination numbers. Each group is processed
//! sequentially in input order; different groups run as separate tokio tasks.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── AsyncLedgerEngine  (cloneable, shares an Arc'd store)
//! ```

use std::collections::HashMap;

use super::AsyncLedgerEngine;
use crate::types::{AccountNumber, LedgerError, Transaction, TransactionRecord};
use tokio::task::JoinError;
use tracing::error;

/// Result of processing a single request
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The request that was processed
    pub record: TransactionRecord,

    /// The committed transaction or the refusal
    pub result: Result<Transaction, LedgerError>,
}

/// Batch processor with account-group partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    engine: AsyncLedgerEngine,
}

/// Union-find over account numbers
#[derive(Debug, Default)]
struct AccountGroups {
    parent: HashMap<AccountNumber, AccountNumber>,
}

impl AccountGroups {
    fn find(&mut self, account: AccountNumber) -> AccountNumber {
        let mut root = account;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        // Path compression
        let mut current = account;
        while current != root {
            let next = self.parent.get(&current).copied().unwrap_or(root);
            self.parent.insert(current, root);
            current = next;
        }

        self.parent.entry(root).or_insert(root);
        root
    }

    fn union(&mut self, a: AccountNumber, b: AccountNumber) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_b.max(root_a), root_a.min(root_b));
        }
    }
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine used for every request; clones share its store
    pub fn new(engine: AsyncLedgerEngine) -> Self {
        Self { engine }
    }

    /// Partition a batch into groups of requests sharing accounts
    ///
    /// # Guarantees
    ///
    /// - Each request appears in exactly one group
    /// - Two requests touching a common account (directly or through a chain
    ///   of transfers) land in the same group
    /// - Requests keep their input order inside a group
    /// - Groups are returned in order of their first request
    pub fn partition_by_accounts(
        &self,
        batch: Vec<TransactionRecord>,
    ) -> Vec<Vec<TransactionRecord>> {
        let mut groups = AccountGroups::default();
        for record in &batch {
            let touched = record.request.touched_accounts();
            for pair in touched.windows(2) {
                groups.union(pair[0], pair[1]);
            }
        }

        let mut index: HashMap<AccountNumber, usize> = HashMap::new();
        let mut partitions: Vec<Vec<TransactionRecord>> = Vec::new();
        for record in batch {
            let root = groups.find(record.request.origin);
            let slot = *index.entry(root).or_insert_with(|| {
                partitions.push(Vec::new());
                partitions.len() - 1
            });
            partitions[slot].push(record);
        }

        partitions
    }

    /// Process one group sequentially, in input order
    ///
    /// Requests carrying a timestamp are admitted as of that instant.
    pub async fn process_group(&self, records: Vec<TransactionRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let result = match record.timestamp {
                Some(at) => {
                    self.engine
                        .admit_at(&record.request, &record.actor, at)
                        .await
                }
                None => self.engine.admit(&record.request, &record.actor).await,
            };
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Process a batch with one task per account group
    ///
    /// # Returns
    ///
    /// One `ProcessingResult` per request, including requests of a group
    /// whose task failed. Results of different groups may be interleaved in
    /// any order.
    pub async fn process_batch(&self, batch: Vec<TransactionRecord>) -> Vec<ProcessingResult> {
        let mut tasks = Vec::new();
        for group in self.partition_by_accounts(batch) {
            let processor = self.clone();
            let records = group.clone();
            tasks.push((
                records,
                tokio::spawn(async move { processor.process_group(group).await }),
            ));
        }

        let mut results = Vec::new();
        for (records, task) in tasks {
            results.extend(group_outcome(records, task.await));
        }

        results
    }
}

/// Results of a joined group task
///
/// A failed task reports every request of its group as `Transient`: some of
/// them may have committed before the failure, so their outcome is unknown.
fn group_outcome(
    records: Vec<TransactionRecord>,
    joined: Result<Vec<ProcessingResult>, JoinError>,
) -> Vec<ProcessingResult> {
    match joined {
        Ok(results) => results,
        Err(e) => {
            error!(error = %e, requests = records.len(), "batch task failed");
            records
                .into_iter()
                .map(|record| ProcessingResult {
                    record,
                    result: Err(LedgerError::transient(format!(
                        "batch task failed, outcome unknown: {}",
                        e
                    ))),
                })
                .collect()
        }
    }
}
