use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub sale_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
}

/// The sale entry form. Also the payload staged verbatim in a sales
/// approval, so approving one replays exactly what was submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSaleRequest {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub bill_no: String,
    pub items: Vec<SaleItem>,
    pub paid_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub charge: Option<Decimal>,
    pub charge_label: Option<String>,
    pub discount: Option<Decimal>,
    pub executive: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSaleResponse {
    pub bill_no: String,
    pub customer_id: Uuid,
    pub total: Decimal,
    pub paid: Decimal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPurchaseRequest {
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub bill_no: Option<String>,
    pub items: Vec<PurchaseItem>,
    pub paid_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPurchaseResponse {
    pub supplier_id: Uuid,
    pub total: Decimal,
    pub paid: Decimal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAdvanceRequest {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayoutRequest {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub direction: String,
    pub party_kind: String,
    pub customer_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub party_name: Option<String>,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub bill_no: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAdjustmentRequest {
    pub bill_no: String,
    pub customer_id: Uuid,
    pub kind: String,
    pub amount: Option<Decimal>,
    pub label: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSaleApprovalRequest {
    pub sale: RecordSaleRequest,
    pub submitted_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSaleApprovalResponse {
    pub approval_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideSaleApprovalRequest {
    pub decision: String,
    pub decision_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideSaleApprovalResponse {
    pub approval_id: Uuid,
    pub status: String,
    pub bill_no: Option<String>,
    pub customer_id: Option<Uuid>,
    pub dispatched: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleApprovedEvent {
    pub approval_id: Uuid,
    pub bill_no: String,
    pub customer_id: Uuid,
}

fn default_unit() -> String {
    "sqft".to_string()
}
