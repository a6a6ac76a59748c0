use tracing::debug;

use crate::error::{Result, TagflowError};
use crate::inventory::{Inventory, QueryMode};
use crate::types::{describe_conditions, MatchSet, TagCondition};

/// Resolve a single condition against the inventory.
///
/// Used once per condition on the disjunctive path. Conditions share no
/// state, so calls may run concurrently.
pub async fn evaluate(inventory: &dyn Inventory, condition: &TagCondition) -> Result<MatchSet> {
    condition.validate()?;
    let conditions = std::slice::from_ref(condition);
    let ids = inventory
        .query_by_tag(conditions, QueryMode::Any)
        .await
        .map_err(|source| TagflowError::InventoryQuery {
            conditions: condition.to_string(),
            source,
        })?;
    let set: MatchSet = ids.into_iter().collect();
    debug!(condition = %condition, count = set.count(), "evaluated tag condition");
    Ok(set)
}

/// Resolve a conjunction with a single compound inventory query.
pub async fn evaluate_all(
    inventory: &dyn Inventory,
    conditions: &[TagCondition],
) -> Result<MatchSet> {
    for condition in conditions {
        condition.validate()?;
    }
    let ids = inventory
        .query_by_tag(conditions, QueryMode::All)
        .await
        .map_err(|source| TagflowError::InventoryQuery {
            conditions: describe_conditions(conditions),
            source,
        })?;
    let set: MatchSet = ids.into_iter().collect();
    debug!(
        conditions = conditions.len(),
        count = set.count(),
        "evaluated compound tag query"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryError;
    use crate::testing::StubInventory;
    use crate::types::ResourceId;

    fn cond(key: &str, value: &str) -> TagCondition {
        TagCondition::new(key, vec![value.to_string()]).unwrap()
    }

    #[tokio::test]
    async fn evaluate_dedups_inventory_result() {
        let inv = StubInventory::new().with_any("Instance", "Instance A", &["i-1", "i-2", "i-1"]);
        let set = evaluate(&inv, &cond("Instance", "Instance A")).await.unwrap();
        assert_eq!(set.count(), 2);
        assert!(set.contains(&ResourceId::from("i-1")));
    }

    #[tokio::test]
    async fn evaluate_issues_any_query_with_one_condition() {
        let inv = StubInventory::new();
        evaluate(&inv, &cond("env", "dev")).await.unwrap();
        let calls = inv.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, QueryMode::Any);
        assert_eq!(calls[0].1.len(), 1);
    }

    #[tokio::test]
    async fn evaluate_all_is_one_compound_query() {
        let inv = StubInventory::new().with_all(&["i-7"]);
        let set = evaluate_all(&inv, &[cond("a", "1"), cond("b", "2")])
            .await
            .unwrap();
        assert_eq!(set.count(), 1);
        let calls = inv.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, QueryMode::All);
        assert_eq!(calls[0].1.len(), 2);
    }

    #[tokio::test]
    async fn inventory_failure_carries_condition() {
        let inv = StubInventory::new().failing(InventoryError::Throttled("rate exceeded".into()));
        let err = evaluate(&inv, &cond("Instance", "Instance B"))
            .await
            .unwrap_err();
        match err {
            TagflowError::InventoryQuery { conditions, source } => {
                assert_eq!(conditions, "Instance=Instance B");
                assert!(matches!(source, InventoryError::Throttled(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
