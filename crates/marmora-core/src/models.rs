use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub opening_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub opening_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub sale_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDirection {
    In,
    Out,
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::In => "IN",
            PaymentDirection::Out => "OUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IN" => Some(PaymentDirection::In),
            "OUT" => Some(PaymentDirection::Out),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Upi,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Bank => "BANK",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Cheque => "CHEQUE",
            PaymentMethod::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CASH" => Some(PaymentMethod::Cash),
            "BANK" => Some(PaymentMethod::Bank),
            "UPI" => Some(PaymentMethod::Upi),
            "CHEQUE" => Some(PaymentMethod::Cheque),
            "OTHER" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// Who a payment is booked against: a customer, a supplier, or a free-text
/// name for one-off counterparties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyKind {
    Customer,
    Supplier,
    Other,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Customer => "CUSTOMER",
            PartyKind::Supplier => "SUPPLIER",
            PartyKind::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Some(PartyKind::Customer),
            "SUPPLIER" => Some(PartyKind::Supplier),
            "OTHER" => Some(PartyKind::Other),
            _ => None,
        }
    }
}

/// A cash movement. Immutable once inserted; there is no update or delete
/// path for payments anywhere in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub direction: PaymentDirection,
    pub party_kind: PartyKind,
    pub customer_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub party_name: Option<String>,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub bill_no: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockMoveKind {
    Purchase,
    Sale,
    AdjustmentIn,
    AdjustmentOut,
}

impl StockMoveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMoveKind::Purchase => "PURCHASE",
            StockMoveKind::Sale => "SALE",
            StockMoveKind::AdjustmentIn => "ADJUSTMENT_IN",
            StockMoveKind::AdjustmentOut => "ADJUSTMENT_OUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PURCHASE" => Some(StockMoveKind::Purchase),
            "SALE" => Some(StockMoveKind::Sale),
            "ADJUSTMENT_IN" => Some(StockMoveKind::AdjustmentIn),
            "ADJUSTMENT_OUT" => Some(StockMoveKind::AdjustmentOut),
            _ => None,
        }
    }

    /// Whether the move adds stock on hand.
    pub fn is_inbound(&self) -> bool {
        matches!(self, StockMoveKind::Purchase | StockMoveKind::AdjustmentIn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMove {
    pub id: Uuid,
    pub product_id: Uuid,
    pub kind: StockMoveKind,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub bill_no: Option<String>,
    pub customer_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    Charge,
    Discount,
    Executive,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Charge => "CHARGE",
            AdjustmentKind::Discount => "DISCOUNT",
            AdjustmentKind::Executive => "EXECUTIVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CHARGE" => Some(AdjustmentKind::Charge),
            "DISCOUNT" => Some(AdjustmentKind::Discount),
            "EXECUTIVE" => Some(AdjustmentKind::Executive),
            _ => None,
        }
    }
}

/// A signed addition or reduction tied to a bill, or an EXECUTIVE annotation
/// naming who handled the bill (amount zero by convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillAdjustment {
    pub id: Uuid,
    pub bill_no: String,
    pub customer_id: Uuid,
    pub kind: AdjustmentKind,
    pub amount: Decimal,
    pub label: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(ApprovalStatus::Pending),
            "APPROVED" => Some(ApprovalStatus::Approved),
            "REJECTED" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    /// The one state machine in the system: PENDING may move to APPROVED or
    /// REJECTED, and a decided approval never moves again.
    pub fn transition_to(self, next: ApprovalStatus) -> Result<ApprovalStatus, InvalidTransition> {
        match (self, next) {
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
            | (ApprovalStatus::Pending, ApprovalStatus::Rejected) => Ok(next),
            _ => Err(InvalidTransition { from: self, to: next }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sales approval cannot move from {} to {}", from.as_str(), to.as_str())]
pub struct InvalidTransition {
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
}

/// A staged, not-yet-committed sale. The payload is the record-sale request
/// body as submitted; approval replays it into stock moves, payments, and
/// bill adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesApproval {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub status: ApprovalStatus,
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_transitions_are_one_way() {
        assert_eq!(
            ApprovalStatus::Pending.transition_to(ApprovalStatus::Approved),
            Ok(ApprovalStatus::Approved)
        );
        assert_eq!(
            ApprovalStatus::Pending.transition_to(ApprovalStatus::Rejected),
            Ok(ApprovalStatus::Rejected)
        );

        for decided in [ApprovalStatus::Approved, ApprovalStatus::Rejected] {
            for next in [
                ApprovalStatus::Pending,
                ApprovalStatus::Approved,
                ApprovalStatus::Rejected,
            ] {
                assert!(decided.transition_to(next).is_err());
            }
        }
    }

    #[test]
    fn pending_cannot_reenter_pending() {
        let err = ApprovalStatus::Pending
            .transition_to(ApprovalStatus::Pending)
            .unwrap_err();
        assert_eq!(err.from, ApprovalStatus::Pending);
        assert_eq!(err.to, ApprovalStatus::Pending);
    }

    #[test]
    fn kind_round_trips() {
        for kind in ["PURCHASE", "SALE", "ADJUSTMENT_IN", "ADJUSTMENT_OUT"] {
            assert_eq!(StockMoveKind::parse(kind).unwrap().as_str(), kind);
        }
        assert_eq!(StockMoveKind::parse(" sale "), Some(StockMoveKind::Sale));
        assert_eq!(StockMoveKind::parse("RETURN"), None);

        assert_eq!(PaymentDirection::parse("in"), Some(PaymentDirection::In));
        assert_eq!(PartyKind::parse("customer"), Some(PartyKind::Customer));
        assert_eq!(AdjustmentKind::parse("discount"), Some(AdjustmentKind::Discount));
        assert_eq!(ApprovalStatus::parse("approved"), Some(ApprovalStatus::Approved));
    }

    #[test]
    fn entities_serialize_kind_fields_as_upper_snake() {
        let now = Utc::now();

        let payment = Payment {
            id: Uuid::new_v4(),
            direction: PaymentDirection::In,
            party_kind: PartyKind::Customer,
            customer_id: Some(Uuid::new_v4()),
            supplier_id: None,
            party_name: None,
            method: PaymentMethod::Upi,
            amount: Decimal::new(125, 0),
            bill_no: Some("B-12".to_string()),
            note: None,
            occurred_at: now,
        };
        let value = serde_json::to_value(&payment).unwrap();
        assert_eq!(value["direction"], "IN");
        assert_eq!(value["party_kind"], "CUSTOMER");
        assert_eq!(value["method"], "UPI");

        let stock_move = StockMove {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            kind: StockMoveKind::Sale,
            quantity: Decimal::new(4, 0),
            price_per_unit: Decimal::new(85, 0),
            bill_no: Some("B-12".to_string()),
            customer_id: None,
            supplier_id: None,
            note: None,
            occurred_at: now,
        };
        let value = serde_json::to_value(&stock_move).unwrap();
        assert_eq!(value["kind"], "SALE");

        let approval = SalesApproval {
            id: Uuid::new_v4(),
            payload: serde_json::json!({"bill_no": "B-12"}),
            status: ApprovalStatus::Pending,
            submitted_by: Some("counter".to_string()),
            created_at: now,
            decided_at: None,
            decision_note: None,
        };
        let value = serde_json::to_value(&approval).unwrap();
        assert_eq!(value["status"], "PENDING");
        assert!(value["decided_at"].is_null());
    }

    #[test]
    fn inbound_moves() {
        assert!(StockMoveKind::Purchase.is_inbound());
        assert!(StockMoveKind::AdjustmentIn.is_inbound());
        assert!(!StockMoveKind::Sale.is_inbound());
        assert!(!StockMoveKind::AdjustmentOut.is_inbound());
    }
}
