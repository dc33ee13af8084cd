//! Pricing policy: which price/discount changes need a second pair of eyes.

use helmcrm_core::RecordId;

use crate::action::{ApprovalAction, DocumentKind, PricedItem};

/// Discounts above this percentage require approval.
pub const MAX_DISCOUNT_PCT: f64 = 20.0;

/// Unit-price changes beyond this percentage (either direction) require
/// approval.
pub const MAX_PRICE_CHANGE_PCT: f64 = 10.0;

/// Percentage change from `previous` to `current`. `None` when there is no
/// previous price to compare against.
fn price_change_pct(previous: u64, current: u64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some(((current as f64 - previous as f64) / previous as f64) * 100.0)
}

/// Decide whether a document line-item update needs approval.
///
/// Checks each incoming item for a discount above [`MAX_DISCOUNT_PCT`], then
/// for a unit-price change against the existing item (matched by product)
/// beyond [`MAX_PRICE_CHANGE_PCT`]. The first violation wins and is returned
/// as the approval action carrying the complete item set, so the executor can
/// apply the whole update once approved.
pub fn document_approval_trigger(
    document: DocumentKind,
    document_id: RecordId,
    items: &[PricedItem],
    existing_items: &[PricedItem],
) -> Option<ApprovalAction> {
    for item in items {
        if item.discount_pct > MAX_DISCOUNT_PCT {
            return Some(ApprovalAction::DiscountOverride {
                document,
                document_id,
                items: items.to_vec(),
                discount_pct: item.discount_pct,
            });
        }

        let existing = existing_items
            .iter()
            .find(|e| e.product_id == item.product_id);
        if let Some(existing) = existing {
            if let Some(change) = price_change_pct(existing.unit_price, item.unit_price) {
                if change.abs() > MAX_PRICE_CHANGE_PCT {
                    return Some(ApprovalAction::PricingOverride {
                        document,
                        document_id,
                        items: items.to_vec(),
                        price_change_pct: change,
                    });
                }
            }
        }
    }

    None
}

/// Decide whether a product base-price change needs approval.
pub fn product_price_trigger(
    product_id: RecordId,
    unit_price: u64,
    existing_unit_price: u64,
) -> Option<ApprovalAction> {
    let change = price_change_pct(existing_unit_price, unit_price)?;
    if change.abs() > MAX_PRICE_CHANGE_PCT {
        return Some(ApprovalAction::ProductPriceUpdate {
            product_id,
            unit_price,
        });
    }
    None
}
