use std::sync::Arc;

use crate::{KeyStore, LedgerClient, RuleGraph, TransactionRepository};

/// The bundle of external contracts the orchestrator is wired against.
///
/// Grounded on `nodetools.models.models.Dependencies`, which groups a
/// node's network config, credential manager, PFT utilities, and
/// transaction repository into one object passed down through the
/// review/response pipeline. Here the equivalent bundle is the three
/// trait-object contracts plus the rule graph, all `Arc`-shared across
/// the reviewer, router, and response processor tasks.
#[derive(Clone)]
pub struct Dependencies {
    pub ledger_client: Arc<dyn LedgerClient>,
    pub key_store: Arc<dyn KeyStore>,
    pub repository: Arc<dyn TransactionRepository>,
    pub rules: RuleGraph,
}

impl Dependencies {
    pub fn new(
        ledger_client: Arc<dyn LedgerClient>,
        key_store: Arc<dyn KeyStore>,
        repository: Arc<dyn TransactionRepository>,
        rules: RuleGraph,
    ) -> Self {
        Self { ledger_client, key_store, repository, rules }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies").field("rules", &self.rules).finish_non_exhaustive()
    }
}
