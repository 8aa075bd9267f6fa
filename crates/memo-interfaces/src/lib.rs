//! External contracts consumed (not implemented) by the memo pipeline:
//! the ledger client, key store, transaction repository, and the
//! business-rule capability set, per spec.md §6.

mod dependencies;
mod keystore;
mod ledger;
mod repository;
mod rule;

pub use dependencies::Dependencies;
pub use keystore::{KeyRole, KeyStore, KeyStoreError, PublicKeyHex, SharedSecretBytes};
pub use ledger::{LedgerClient, LedgerClientError, LedgerEvent, SubmitOutcome};
pub use repository::{OrderBy, QueryRow, RepositoryError, ResponseQuery, TransactionRepository};
pub use rule::{Rule, RuleGraph};
