pub mod config;
pub mod contracts;
pub mod db;
pub mod redis_bus;

pub use config::ServiceConfig;
pub use contracts::{
    CreateCustomerRequest, CreateProductRequest, CreateSupplierRequest, DecideSaleApprovalRequest,
    DecideSaleApprovalResponse, PurchaseItem, RecordAdjustmentRequest, RecordAdvanceRequest,
    RecordPaymentRequest, RecordPayoutRequest, RecordPurchaseRequest, RecordPurchaseResponse,
    RecordSaleRequest, RecordSaleResponse, SaleApprovedEvent, SaleItem, SubmitSaleApprovalRequest,
    SubmitSaleApprovalResponse,
};
pub use db::connect_database;
pub use redis_bus::{Channel, RedisBus};
