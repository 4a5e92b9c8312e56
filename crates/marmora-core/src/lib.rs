pub mod models;

pub use models::{
    AdjustmentKind, ApprovalStatus, BillAdjustment, Customer, InvalidTransition, PartyKind,
    Payment, PaymentDirection, PaymentMethod, Product, SalesApproval, StockMove, StockMoveKind,
    Supplier,
};
