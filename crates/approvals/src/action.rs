use serde::{Deserialize, Serialize};

use helmcrm_authz::ResourceKind;
use helmcrm_core::{RecordId, UserId};

/// Commercial document kinds whose line items can be rewritten under approval.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quote,
    Invoice,
    SalesOrder,
    ProformaInvoice,
}

impl DocumentKind {
    pub fn resource(&self) -> ResourceKind {
        match self {
            DocumentKind::Quote => ResourceKind::Quote,
            DocumentKind::Invoice => ResourceKind::Invoice,
            DocumentKind::SalesOrder => ResourceKind::SalesOrder,
            DocumentKind::ProformaInvoice => ResourceKind::ProformaInvoice,
        }
    }
}

/// A priced line item carried in an override payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedItem {
    pub product_id: RecordId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    #[serde(default)]
    pub discount_pct: f64,
}

/// A privileged action awaiting approval.
///
/// Closed set of action types with typed payloads; the tag doubles as the
/// executor-registry key. The payload is immutable once a request is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "payload")]
pub enum ApprovalAction {
    /// Rewrite a document's line items with unit prices that deviate beyond
    /// the allowed change threshold.
    PricingOverride {
        document: DocumentKind,
        document_id: RecordId,
        items: Vec<PricedItem>,
        price_change_pct: f64,
    },

    /// Rewrite a document's line items carrying a discount above the allowed
    /// maximum.
    DiscountOverride {
        document: DocumentKind,
        document_id: RecordId,
        items: Vec<PricedItem>,
        discount_pct: f64,
    },

    /// Change a product's base unit price.
    ProductPriceUpdate {
        product_id: RecordId,
        unit_price: u64,
    },

    /// Reassign a lead to a different owner.
    ReassignLead {
        lead_id: RecordId,
        new_owner_id: UserId,
    },
}

impl ApprovalAction {
    /// Registry tag identifying the executor handler and payload schema.
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalAction::PricingOverride { .. } => "pricing_override",
            ApprovalAction::DiscountOverride { .. } => "discount_override",
            ApprovalAction::ProductPriceUpdate { .. } => "product_price_update",
            ApprovalAction::ReassignLead { .. } => "reassign_lead",
        }
    }

    /// The resource an `approve` permission is checked against.
    pub fn resource(&self) -> ResourceKind {
        match self {
            ApprovalAction::PricingOverride { document, .. }
            | ApprovalAction::DiscountOverride { document, .. } => document.resource(),
            ApprovalAction::ProductPriceUpdate { .. } => ResourceKind::Product,
            ApprovalAction::ReassignLead { .. } => ResourceKind::Lead,
        }
    }

    /// The record the action targets.
    pub fn record_id(&self) -> RecordId {
        match self {
            ApprovalAction::PricingOverride { document_id, .. }
            | ApprovalAction::DiscountOverride { document_id, .. } => *document_id,
            ApprovalAction::ProductPriceUpdate { product_id, .. } => *product_id,
            ApprovalAction::ReassignLead { lead_id, .. } => *lead_id,
        }
    }

    /// Headline metric compared against workflow thresholds, when one exists.
    pub fn threshold_metric(&self) -> Option<f64> {
        match self {
            ApprovalAction::PricingOverride {
                price_change_pct, ..
            } => Some(price_change_pct.abs()),
            ApprovalAction::DiscountOverride { discount_pct, .. } => Some(*discount_pct),
            ApprovalAction::ProductPriceUpdate { .. } | ApprovalAction::ReassignLead { .. } => None,
        }
    }
}
