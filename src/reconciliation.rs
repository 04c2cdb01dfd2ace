//! Shipment reconciliation planning.
//!
//! Everything in here is pure: given a snapshot of one order's ledger state
//! (committed quantities, due entries, quantities already shipped) and a
//! proposed shipment, [`plan`] either rejects the proposal or describes the
//! exact due-ledger writes and the status that result from applying it. The
//! command layer reads the snapshot and applies the plan inside a single
//! database transaction.

use std::collections::{BTreeMap, HashSet};

use crate::entities::{order::OrderStatus, shipment::ShipmentLine};
use crate::errors::ServiceError;

/// Ledger state of one order as read at the start of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub order_id: i32,
    pub status: OrderStatus,
    /// item id -> committed quantity
    pub committed: BTreeMap<i32, i32>,
    /// item id -> outstanding quantity
    pub due: BTreeMap<i32, i32>,
    /// item id -> quantity summed over all recorded shipments
    pub shipped: BTreeMap<i32, i32>,
    pub shipment_count: usize,
}

/// Due-ledger writes and resulting status for an accepted proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Entries to insert or overwrite, `(item_id, quantity)` with quantity > 0
    pub upserts: Vec<(i32, i32)>,
    /// Item ids whose due entry must be deleted
    pub removals: Vec<i32>,
    /// Full due ledger of the order once the plan is applied
    pub due_after: BTreeMap<i32, i32>,
    pub new_status: OrderStatus,
}

/// Rejects proposals that are malformed regardless of ledger state.
pub fn validate_lines(lines: &[ShipmentLine]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "a shipment must contain at least one item".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "quantity for item {} must be positive, got {}",
                line.item_id, line.quantity
            )));
        }
        if !seen.insert(line.item_id) {
            return Err(ServiceError::ValidationError(format!(
                "item {} appears more than once in the shipment",
                line.item_id
            )));
        }
    }
    Ok(())
}

/// Plans the effect of `lines` on the order described by `snapshot`.
pub fn plan(
    snapshot: &LedgerSnapshot,
    lines: &[ShipmentLine],
    is_due_clearance: bool,
) -> Result<ReconciliationPlan, ServiceError> {
    validate_lines(lines)?;

    if let Some(line) = lines
        .iter()
        .find(|line| !snapshot.committed.contains_key(&line.item_id))
    {
        return Err(ServiceError::UnknownItem {
            order_id: snapshot.order_id,
            item_id: line.item_id,
        });
    }

    if is_due_clearance {
        plan_due_clearance(snapshot, lines)
    } else {
        plan_fresh(snapshot, lines)
    }
}

fn plan_due_clearance(
    snapshot: &LedgerSnapshot,
    lines: &[ShipmentLine],
) -> Result<ReconciliationPlan, ServiceError> {
    if snapshot.status != OrderStatus::ShippedAndDue {
        return Err(ServiceError::StateMismatch {
            order_id: snapshot.order_id,
            expected: OrderStatus::ShippedAndDue,
            actual: snapshot.status,
        });
    }

    for line in lines {
        let outstanding = snapshot.due.get(&line.item_id).copied().unwrap_or(0);
        if outstanding != line.quantity {
            return Err(ServiceError::QuantityMismatch {
                order_id: snapshot.order_id,
                item_id: line.item_id,
                outstanding,
                proposed: line.quantity,
            });
        }
    }

    // The clearance has to settle the whole backlog
    if let Some((&item_id, &outstanding)) = snapshot
        .due
        .iter()
        .find(|(item_id, _)| !lines.iter().any(|line| line.item_id == **item_id))
    {
        return Err(ServiceError::QuantityMismatch {
            order_id: snapshot.order_id,
            item_id,
            outstanding,
            proposed: 0,
        });
    }

    Ok(ReconciliationPlan {
        upserts: Vec::new(),
        removals: snapshot.due.keys().copied().collect(),
        due_after: BTreeMap::new(),
        new_status: OrderStatus::Shipped,
    })
}

fn plan_fresh(
    snapshot: &LedgerSnapshot,
    lines: &[ShipmentLine],
) -> Result<ReconciliationPlan, ServiceError> {
    let mut shipped_after = snapshot.shipped.clone();

    for line in lines {
        let committed = snapshot.committed[&line.item_id];
        let already_shipped = snapshot.shipped.get(&line.item_id).copied().unwrap_or(0);
        // Compared as headroom so a huge quantity cannot overflow the sum
        if line.quantity > committed.saturating_sub(already_shipped) {
            return Err(ServiceError::OverShipment {
                order_id: snapshot.order_id,
                item_id: line.item_id,
                committed,
                already_shipped,
                proposed: line.quantity,
            });
        }
        // Bounded by `committed` after the check above
        shipped_after.insert(line.item_id, already_shipped + line.quantity);
    }

    // Every committed item is re-derived, touched or not
    let due_after: BTreeMap<i32, i32> = snapshot
        .committed
        .iter()
        .filter_map(|(&item_id, &committed)| {
            let shipped = shipped_after.get(&item_id).copied().unwrap_or(0);
            let remaining = committed - shipped;
            (remaining > 0).then_some((item_id, remaining))
        })
        .collect();

    let upserts = due_after
        .iter()
        .filter(|(item_id, quantity)| snapshot.due.get(item_id) != Some(quantity))
        .map(|(&item_id, &quantity)| (item_id, quantity))
        .collect();
    let removals = snapshot
        .due
        .keys()
        .filter(|item_id| !due_after.contains_key(item_id))
        .copied()
        .collect();
    let new_status = OrderStatus::derive(true, !due_after.is_empty());

    Ok(ReconciliationPlan {
        upserts,
        removals,
        due_after,
        new_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn line(item_id: i32, quantity: i32) -> ShipmentLine {
        ShipmentLine { item_id, quantity }
    }

    fn snapshot(committed: &[(i32, i32)]) -> LedgerSnapshot {
        LedgerSnapshot {
            order_id: 1,
            status: OrderStatus::Pending,
            committed: committed.iter().copied().collect(),
            ..Default::default()
        }
    }

    /// Applies an accepted plan the same way the command does.
    fn apply(snapshot: &mut LedgerSnapshot, lines: &[ShipmentLine], plan: &ReconciliationPlan) {
        for line in lines {
            *snapshot.shipped.entry(line.item_id).or_insert(0) += line.quantity;
        }
        for item_id in &plan.removals {
            snapshot.due.remove(item_id);
        }
        for &(item_id, quantity) in &plan.upserts {
            snapshot.due.insert(item_id, quantity);
        }
        snapshot.status = plan.new_status;
        snapshot.shipment_count += 1;
    }

    #[test]
    fn full_fresh_shipment_leaves_nothing_due() {
        let snap = snapshot(&[(1, 5), (2, 3)]);
        let plan = plan(&snap, &[line(1, 5), line(2, 3)], false).unwrap();

        assert!(plan.due_after.is_empty());
        assert!(plan.upserts.is_empty());
        assert_eq!(plan.new_status, OrderStatus::Shipped);
    }

    #[test]
    fn partial_fresh_shipment_records_remainder() {
        let snap = snapshot(&[(1, 5)]);
        let plan = plan(&snap, &[line(1, 2)], false).unwrap();

        assert_eq!(plan.upserts, vec![(1, 3)]);
        assert_eq!(plan.new_status, OrderStatus::ShippedAndDue);
    }

    #[test]
    fn untouched_items_become_due_for_full_quantity() {
        let snap = snapshot(&[(1, 5), (2, 4)]);
        let plan = plan(&snap, &[line(1, 5)], false).unwrap();

        assert_eq!(plan.due_after, BTreeMap::from([(2, 4)]));
        assert_eq!(plan.new_status, OrderStatus::ShippedAndDue);
    }

    #[test]
    fn over_shipment_counts_previous_shipments() {
        let mut snap = snapshot(&[(1, 5)]);
        snap.shipped.insert(1, 4);
        snap.due.insert(1, 1);
        snap.status = OrderStatus::ShippedAndDue;

        assert_matches!(
            plan(&snap, &[line(1, 2)], false),
            Err(ServiceError::OverShipment {
                item_id: 1,
                committed: 5,
                already_shipped: 4,
                proposed: 2,
                ..
            })
        );
    }

    #[test]
    fn huge_quantity_is_an_over_shipment_not_an_overflow() {
        let mut snap = snapshot(&[(1, 10)]);
        snap.shipped.insert(1, 6);
        snap.due.insert(1, 4);
        snap.status = OrderStatus::ShippedAndDue;

        assert_matches!(
            plan(&snap, &[line(1, i32::MAX)], false),
            Err(ServiceError::OverShipment {
                item_id: 1,
                committed: 10,
                already_shipped: 6,
                proposed: i32::MAX,
                ..
            })
        );

        // Saturated shipped totals still reject instead of wrapping
        snap.shipped.insert(1, i32::MAX);
        assert_matches!(
            plan(&snap, &[line(1, 1)], false),
            Err(ServiceError::OverShipment { .. })
        );
    }

    #[test]
    fn second_fresh_shipment_can_settle_remainder() {
        let mut snap = snapshot(&[(1, 5)]);
        snap.shipped.insert(1, 2);
        snap.due.insert(1, 3);
        snap.status = OrderStatus::ShippedAndDue;

        let plan = plan(&snap, &[line(1, 3)], false).unwrap();
        assert_eq!(plan.removals, vec![1]);
        assert_eq!(plan.new_status, OrderStatus::Shipped);
    }

    #[test]
    fn unknown_item_is_rejected_in_both_modes() {
        let mut snap = snapshot(&[(1, 5)]);
        assert_matches!(
            plan(&snap, &[line(1, 1), line(9, 1)], false),
            Err(ServiceError::UnknownItem { item_id: 9, .. })
        );

        // Unknown item wins over the status check
        snap.status = OrderStatus::Shipped;
        assert_matches!(
            plan(&snap, &[line(9, 1)], true),
            Err(ServiceError::UnknownItem { item_id: 9, .. })
        );
    }

    #[test]
    fn due_clearance_requires_shipped_and_due() {
        let mut snap = snapshot(&[(1, 5)]);
        snap.status = OrderStatus::Shipped;
        snap.shipped.insert(1, 5);

        assert_matches!(
            plan(&snap, &[line(1, 1)], true),
            Err(ServiceError::StateMismatch {
                expected: OrderStatus::ShippedAndDue,
                actual: OrderStatus::Shipped,
                ..
            })
        );
    }

    #[test]
    fn due_clearance_requires_exact_quantities() {
        let mut snap = snapshot(&[(1, 10)]);
        snap.status = OrderStatus::ShippedAndDue;
        snap.shipped.insert(1, 6);
        snap.due.insert(1, 4);

        assert_matches!(
            plan(&snap, &[line(1, 3)], true),
            Err(ServiceError::QuantityMismatch {
                item_id: 1,
                outstanding: 4,
                proposed: 3,
                ..
            })
        );
    }

    #[test]
    fn due_clearance_must_cover_every_entry() {
        let mut snap = snapshot(&[(1, 5), (2, 5)]);
        snap.status = OrderStatus::ShippedAndDue;
        snap.shipped.extend([(1, 3), (2, 4)]);
        snap.due.extend([(1, 2), (2, 1)]);

        assert_matches!(
            plan(&snap, &[line(1, 2)], true),
            Err(ServiceError::QuantityMismatch {
                item_id: 2,
                outstanding: 1,
                proposed: 0,
                ..
            })
        );

        let accepted = plan(&snap, &[line(2, 1), line(1, 2)], true).unwrap();
        assert_eq!(accepted.removals, vec![1, 2]);
        assert!(accepted.due_after.is_empty());
        assert_eq!(accepted.new_status, OrderStatus::Shipped);
    }

    #[test]
    fn due_clearance_for_item_without_entry_is_a_mismatch() {
        let mut snap = snapshot(&[(1, 5), (2, 5)]);
        snap.status = OrderStatus::ShippedAndDue;
        snap.shipped.extend([(1, 5), (2, 3)]);
        snap.due.insert(2, 2);

        assert_matches!(
            plan(&snap, &[line(1, 1), line(2, 2)], true),
            Err(ServiceError::QuantityMismatch {
                item_id: 1,
                outstanding: 0,
                proposed: 1,
                ..
            })
        );
    }

    #[test]
    fn malformed_lines_are_validation_errors() {
        let snap = snapshot(&[(1, 5)]);
        assert_matches!(plan(&snap, &[], false), Err(ServiceError::ValidationError(_)));
        assert_matches!(
            plan(&snap, &[line(1, 0)], false),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            plan(&snap, &[line(1, 1), line(1, 1)], false),
            Err(ServiceError::ValidationError(_))
        );
    }

    proptest! {
        #[test]
        fn ledger_invariant_holds_over_random_shipment_sequences(
            committed in prop::collection::vec(1i32..20, 1..5),
            proposals in prop::collection::vec(
                (prop::collection::vec((0usize..5, 1i32..10), 1..4), any::<bool>()),
                1..12,
            ),
        ) {
            let committed: Vec<(i32, i32)> = committed
                .iter()
                .enumerate()
                .map(|(idx, qty)| (idx as i32 + 1, *qty))
                .collect();
            let mut snap = snapshot(&committed);

            for (raw_lines, is_due_clearance) in proposals {
                let mut seen = HashSet::new();
                let lines: Vec<ShipmentLine> = raw_lines
                    .into_iter()
                    .map(|(idx, qty)| line((idx % committed.len()) as i32 + 1, qty))
                    .filter(|l| seen.insert(l.item_id))
                    .collect();

                if let Ok(accepted) = plan(&snap, &lines, is_due_clearance) {
                    apply(&mut snap, &lines, &accepted);
                    prop_assert_eq!(&accepted.due_after, &snap.due);
                }

                for (item_id, committed_qty) in &snap.committed {
                    let shipped = snap.shipped.get(item_id).copied().unwrap_or(0);
                    let due = snap.due.get(item_id).copied().unwrap_or(0);
                    prop_assert!(shipped + due <= *committed_qty);
                }
                prop_assert!(snap.due.values().all(|q| *q > 0));
                prop_assert_eq!(
                    snap.status,
                    OrderStatus::derive(snap.shipment_count > 0, !snap.due.is_empty())
                );
            }
        }
    }
}
