use async_trait::async_trait;
use memo_primitives::{InteractionType, MemoConstructionParameters, MemoPattern, MemoTx};
use serde_json::Value;
use std::sync::Arc;

use crate::ResponseQuery;

/// A business rule bound to a single [`MemoPattern`].
///
/// Modeled as one capability-set trait dispatched by
/// [`Rule::transaction_type`] rather than three separate traits, per
/// DESIGN NOTES §9 ("Dynamic dispatch on rules"): the source's abstract
/// base classes plus duck-typed optional hooks (`find_response`,
/// `get_response_generator`) become default no-op implementations here,
/// exercised only for the variant they apply to. Rule *definitions*
/// themselves are out of scope (spec.md §1); this crate only defines the
/// contract.
#[async_trait]
pub trait Rule: Send + Sync {
    /// A human-readable name, used in logs and `ReviewingResult::rule_name`.
    fn name(&self) -> &str;

    /// The pattern this rule is bound to.
    fn pattern(&self) -> &MemoPattern;

    /// Which of the three interaction types this rule implements.
    fn transaction_type(&self) -> InteractionType;

    /// For a `Request` rule, the patterns of the responses that can
    /// satisfy it, in priority order. The router selects the first.
    fn response_patterns(&self) -> &[MemoPattern] {
        &[]
    }

    /// Validate a matched transaction against this rule's business logic.
    async fn validate(&self, tx: &MemoTx) -> bool;

    /// For a `Request` rule: build the query used to check whether a
    /// response already exists in the repository.
    async fn find_response_query(&self, _tx: &MemoTx) -> Option<ResponseQuery> {
        None
    }

    /// For a `Request` rule: evaluate the request, producing an opaque
    /// evaluation object consumed by [`Rule::construct_response`].
    async fn evaluate_request(&self, _tx: &MemoTx) -> Option<Value> {
        None
    }

    /// For a `Request` rule: construct the response parameters from a
    /// prior evaluation.
    async fn construct_response(
        &self,
        _tx: &MemoTx,
        _evaluation: &Value,
    ) -> Option<MemoConstructionParameters> {
        None
    }
}

/// The full set of patterns and their bound rules, consulted by the
/// reviewer (pattern matching) and the router (response-queue
/// allocation).
///
/// Corresponds to `business_logic.transaction_graph` /
/// `business_logic.pattern_rule_map` in DESIGN NOTES §9's source model.
#[derive(Clone, Default)]
pub struct RuleGraph {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.
    pub fn push(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    /// All registered rules, in registration order.
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// The first rule whose pattern matches `tx`, per spec.md §4.F step 1.
    pub fn find_match(&self, tx: &MemoTx) -> Option<Arc<dyn Rule>> {
        self.rules.iter().find(|rule| rule.pattern().matches(tx)).cloned()
    }

    /// Every rule whose `transaction_type` is `Response`, used by the
    /// router to allocate one queue per response pattern (spec.md §4.G).
    pub fn response_rules(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter().filter(|r| r.transaction_type() == InteractionType::Response)
    }
}

impl std::fmt::Debug for RuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleGraph").field("rule_count", &self.rules.len()).finish()
    }
}
