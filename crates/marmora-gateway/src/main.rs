use std::net::SocketAddr;

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use marmora_core::{
    AdjustmentKind, ApprovalStatus, BillAdjustment, Customer, PartyKind, Payment,
    PaymentDirection, PaymentMethod, Product, SalesApproval, StockMove, StockMoveKind, Supplier,
};
use marmora_ledger::{BillGroup, LedgerRow, LedgerRowKind, StatementLine};
use marmora_platform::{
    Channel, CreateCustomerRequest, CreateProductRequest, CreateSupplierRequest,
    DecideSaleApprovalRequest, DecideSaleApprovalResponse, RecordAdjustmentRequest,
    RecordAdvanceRequest, RecordPaymentRequest, RecordPayoutRequest, RecordPurchaseRequest,
    RecordPurchaseResponse, RecordSaleRequest, RecordSaleResponse, RedisBus, SaleApprovedEvent,
    ServiceConfig, SubmitSaleApprovalRequest, SubmitSaleApprovalResponse, connect_database,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    redis: RedisBus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductDetailsView {
    id: Uuid,
    name: String,
    category: Option<String>,
    unit: String,
    sale_price: Decimal,
    stock_qty: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListProductsResponse {
    items: Vec<ProductDetailsView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductStockView {
    product_id: Uuid,
    name: String,
    quantity_on_hand: Decimal,
    average_cost: Decimal,
    stock_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomerTotalsView {
    customer_id: Uuid,
    name: String,
    phone: Option<String>,
    opening_balance: Decimal,
    billed_total: Decimal,
    paid_total: Decimal,
    balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListCustomersResponse {
    items: Vec<CustomerTotalsView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListSuppliersResponse {
    items: Vec<Supplier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomerLedgerResponse {
    customer_id: Uuid,
    name: String,
    opening_balance: Decimal,
    closing_balance: Decimal,
    lines: Vec<StatementLine>,
    bills: Vec<BillGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SupplierLedgerLine {
    entry_type: String,
    bill_no: Option<String>,
    amount: Decimal,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
    running_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SupplierLedgerResponse {
    supplier_id: Uuid,
    name: String,
    opening_balance: Decimal,
    closing_balance: Decimal,
    lines: Vec<SupplierLedgerLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyBillsQuery {
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyBillsResponse {
    date: NaiveDate,
    bills: Vec<BillGroup>,
    net_total: Decimal,
    paid_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartyBalanceView {
    id: Uuid,
    kind: String,
    name: String,
    balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartiesResponse {
    customers: Vec<PartyBalanceView>,
    suppliers: Vec<PartyBalanceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListApprovalsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListApprovalsResponse {
    items: Vec<SalesApproval>,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "marmora_gateway=info,tower_http=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url, config.database_max_connections).await?;
    let redis = RedisBus::connect(&config.redis_url)?;

    let state = AppState { pool, redis };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{product_id}/stock", get(product_stock))
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/{customer_id}/ledger", get(customer_ledger))
        .route("/suppliers", get(list_suppliers).post(create_supplier))
        .route("/suppliers/{supplier_id}/ledger", get(supplier_ledger))
        .route("/purchases", post(record_purchase))
        .route("/sales", post(record_sale))
        .route("/advances", post(record_advance))
        .route("/payouts", post(record_payout))
        .route("/payments", post(record_payment))
        .route("/adjustments", post(record_adjustment))
        .route("/bills/daily", get(daily_bills))
        .route("/parties", get(list_parties))
        .route(
            "/sales/approvals",
            get(list_sale_approvals).post(submit_sale_approval),
        )
        .route(
            "/sales/approvals/{approval_id}/decide",
            post(decide_sale_approval),
        )
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ListProductsResponse>, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, category, unit, sale_price, stock_qty, created_at
        FROM get_products_with_details()
        ORDER BY name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(ProductDetailsView {
            id: row.try_get("id").map_err(internal_error)?,
            name: row.try_get("name").map_err(internal_error)?,
            category: row.try_get("category").map_err(internal_error)?,
            unit: row.try_get("unit").map_err(internal_error)?,
            sale_price: row.try_get("sale_price").map_err(internal_error)?,
            stock_qty: row.try_get("stock_qty").map_err(internal_error)?,
            created_at: row.try_get("created_at").map_err(internal_error)?,
        });
    }

    Ok(Json(ListProductsResponse { items }))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), (StatusCode, String)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }
    if payload.sale_price < Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "sale_price must be non-negative".to_string(),
        ));
    }
    let unit = payload.unit.trim().to_string();
    if unit.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "unit is required".to_string()));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO products (id, name, category, unit, sale_price, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, category, unit, sale_price, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(payload.category.as_deref().map(str::trim))
    .bind(&unit)
    .bind(payload.sale_price)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(map_product(&row)?)))
}

async fn product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductStockView>, (StatusCode, String)> {
    let product_row = sqlx::query("SELECT name FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(internal_error)?;

    let Some(product_row) = product_row else {
        return Err((StatusCode::NOT_FOUND, "product not found".to_string()));
    };
    let name: String = product_row.try_get("name").map_err(internal_error)?;

    let rows = sqlx::query(
        r#"
        SELECT id, product_id, kind, quantity, price_per_unit, bill_no,
               customer_id, supplier_id, note, occurred_at
        FROM stock_moves
        WHERE product_id = $1
        ORDER BY occurred_at ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut moves = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind_raw: String = row.try_get("kind").map_err(internal_error)?;
        let Some(kind) = StockMoveKind::parse(&kind_raw) else {
            warn!("skipping stock move with unknown kind '{kind_raw}'");
            continue;
        };
        moves.push(StockMove {
            id: row.try_get("id").map_err(internal_error)?,
            product_id: row.try_get("product_id").map_err(internal_error)?,
            kind,
            quantity: row.try_get("quantity").map_err(internal_error)?,
            price_per_unit: {
                let price: Option<Decimal> =
                    row.try_get("price_per_unit").map_err(internal_error)?;
                price.unwrap_or(Decimal::ZERO)
            },
            bill_no: row.try_get("bill_no").map_err(internal_error)?,
            customer_id: row.try_get("customer_id").map_err(internal_error)?,
            supplier_id: row.try_get("supplier_id").map_err(internal_error)?,
            note: row.try_get("note").map_err(internal_error)?,
            occurred_at: row.try_get("occurred_at").map_err(internal_error)?,
        });
    }
    let position = marmora_inventory::replay(
        moves
            .iter()
            .map(|stock_move| (stock_move.kind, stock_move.quantity, stock_move.price_per_unit)),
    );

    Ok(Json(ProductStockView {
        product_id,
        name,
        quantity_on_hand: position.quantity_on_hand,
        average_cost: position.average_cost,
        stock_value: position.stock_value(),
    }))
}

async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<ListCustomersResponse>, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT customer_id, name, phone, opening_balance, billed_total, paid_total, balance
        FROM customer_totals
        ORDER BY name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(CustomerTotalsView {
            customer_id: row.try_get("customer_id").map_err(internal_error)?,
            name: row.try_get("name").map_err(internal_error)?,
            phone: row.try_get("phone").map_err(internal_error)?,
            opening_balance: row.try_get("opening_balance").map_err(internal_error)?,
            billed_total: row.try_get("billed_total").map_err(internal_error)?,
            paid_total: row.try_get("paid_total").map_err(internal_error)?,
            balance: row.try_get("balance").map_err(internal_error)?,
        });
    }

    Ok(Json(ListCustomersResponse { items }))
}

async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), (StatusCode, String)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO customers (id, name, phone, opening_balance, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, phone, opening_balance, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(payload.phone.as_deref().map(str::trim))
    .bind(payload.opening_balance)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(map_customer(&row)?)))
}

async fn customer_ledger(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<CustomerLedgerResponse>, (StatusCode, String)> {
    let customer_row = sqlx::query("SELECT name, opening_balance FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(internal_error)?;

    let Some(customer_row) = customer_row else {
        return Err((StatusCode::NOT_FOUND, "customer not found".to_string()));
    };
    let name: String = customer_row.try_get("name").map_err(internal_error)?;
    let opening_balance: Option<Decimal> = customer_row
        .try_get("opening_balance")
        .map_err(internal_error)?;
    let opening_balance = marmora_ledger::amount_or_zero(opening_balance);

    let rows = sqlx::query(
        r#"
        SELECT bill_no, entry_type, amount, quantity, price_per_unit, detail, occurred_at
        FROM bill_transaction_ledger
        WHERE customer_id = $1
        ORDER BY occurred_at ASC
        "#,
    )
    .bind(customer_id)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let ledger_rows = map_ledger_rows(&rows)?;
    let closing_balance = marmora_ledger::closing_balance(opening_balance, &ledger_rows);
    let bills = marmora_ledger::group_bills(ledger_rows.clone());
    let lines = marmora_ledger::statement(opening_balance, ledger_rows);

    Ok(Json(CustomerLedgerResponse {
        customer_id,
        name,
        opening_balance,
        closing_balance,
        lines,
        bills,
    }))
}

async fn list_suppliers(
    State(state): State<AppState>,
) -> Result<Json<ListSuppliersResponse>, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, phone, opening_balance, created_at
        FROM suppliers
        ORDER BY name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(map_supplier(&row)?);
    }

    Ok(Json(ListSuppliersResponse { items }))
}

async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), (StatusCode, String)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO suppliers (id, name, phone, opening_balance, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, phone, opening_balance, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(payload.phone.as_deref().map(str::trim))
    .bind(payload.opening_balance)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(map_supplier(&row)?)))
}

async fn supplier_ledger(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<Json<SupplierLedgerResponse>, (StatusCode, String)> {
    let supplier_row = sqlx::query("SELECT name, opening_balance FROM suppliers WHERE id = $1")
        .bind(supplier_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(internal_error)?;

    let Some(supplier_row) = supplier_row else {
        return Err((StatusCode::NOT_FOUND, "supplier not found".to_string()));
    };
    let name: String = supplier_row.try_get("name").map_err(internal_error)?;
    let opening_balance: Option<Decimal> = supplier_row
        .try_get("opening_balance")
        .map_err(internal_error)?;
    let opening_balance = marmora_ledger::amount_or_zero(opening_balance);

    let rows = sqlx::query(
        r#"
        SELECT entry_type, amount, bill_no, note, occurred_at
        FROM supplier_transactions
        WHERE supplier_id = $1
        ORDER BY occurred_at ASC
        "#,
    )
    .bind(supplier_id)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut lines = Vec::with_capacity(rows.len());
    let mut amounts = Vec::with_capacity(rows.len());
    for row in &rows {
        let amount: Option<Decimal> = row.try_get("amount").map_err(internal_error)?;
        amounts.push(marmora_ledger::amount_or_zero(amount));
    }
    let totals = marmora_ledger::running_totals(opening_balance, amounts.iter().copied());
    for (row, (amount, running_balance)) in rows.iter().zip(amounts.into_iter().zip(totals)) {
        lines.push(SupplierLedgerLine {
            entry_type: row.try_get("entry_type").map_err(internal_error)?,
            bill_no: row.try_get("bill_no").map_err(internal_error)?,
            amount,
            note: row.try_get("note").map_err(internal_error)?,
            occurred_at: row.try_get("occurred_at").map_err(internal_error)?,
            running_balance,
        });
    }
    let closing_balance = lines
        .last()
        .map(|line| line.running_balance)
        .unwrap_or(opening_balance);

    Ok(Json(SupplierLedgerResponse {
        supplier_id,
        name,
        opening_balance,
        closing_balance,
        lines,
    }))
}

async fn record_purchase(
    State(state): State<AppState>,
    Json(payload): Json<RecordPurchaseRequest>,
) -> Result<(StatusCode, Json<RecordPurchaseResponse>), (StatusCode, String)> {
    if payload.items.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "at least one item is required".to_string(),
        ));
    }
    for item in &payload.items {
        if item.quantity <= Decimal::ZERO {
            return Err((
                StatusCode::BAD_REQUEST,
                "item quantity must be positive".to_string(),
            ));
        }
        if item.price_per_unit < Decimal::ZERO {
            return Err((
                StatusCode::BAD_REQUEST,
                "item price must be non-negative".to_string(),
            ));
        }
    }
    let paid = payload.paid_amount.unwrap_or(Decimal::ZERO);
    if paid < Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "paid_amount must be non-negative".to_string(),
        ));
    }
    let method = normalize_payment_method(payload.payment_method.as_deref())
        .map_err(invalid_request)?;
    let bill_no = payload
        .bill_no
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.pool.begin().await.map_err(internal_error)?;

    let supplier_id = resolve_supplier(
        &mut tx,
        payload.supplier_id,
        payload.supplier_name.as_deref(),
    )
    .await?;

    let mut total = Decimal::ZERO;
    for item in &payload.items {
        ensure_product_exists(&mut tx, item.product_id).await?;
        insert_stock_move(
            &mut tx,
            item.product_id,
            StockMoveKind::Purchase,
            item.quantity,
            item.price_per_unit,
            bill_no.as_deref(),
            None,
            Some(supplier_id),
            payload.note.as_deref(),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
        total += item.quantity * item.price_per_unit;
    }

    if paid > Decimal::ZERO {
        insert_payment(
            &mut tx,
            PaymentDirection::Out,
            PartyKind::Supplier,
            None,
            Some(supplier_id),
            None,
            method,
            paid,
            bill_no.as_deref(),
            payload.note.as_deref(),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
    }

    tx.commit().await.map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordPurchaseResponse {
            supplier_id,
            total,
            paid,
            recorded_at: occurred_at,
        }),
    ))
}

async fn record_sale(
    State(state): State<AppState>,
    Json(payload): Json<RecordSaleRequest>,
) -> Result<(StatusCode, Json<RecordSaleResponse>), (StatusCode, String)> {
    validate_sale_shape(&payload).map_err(invalid_request)?;

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    let applied = apply_sale(&mut tx, &payload).await?;
    tx.commit().await.map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordSaleResponse {
            bill_no: applied.bill_no,
            customer_id: applied.customer_id,
            total: applied.total,
            paid: applied.paid,
            recorded_at: applied.occurred_at,
        }),
    ))
}

async fn record_advance(
    State(state): State<AppState>,
    Json(payload): Json<RecordAdvanceRequest>,
) -> Result<(StatusCode, Json<Payment>), (StatusCode, String)> {
    if payload.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "amount must be positive".to_string(),
        ));
    }
    let method = normalize_payment_method(payload.payment_method.as_deref())
        .map_err(invalid_request)?;
    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    let customer_id = resolve_customer(
        &mut tx,
        payload.customer_id,
        payload.customer_name.as_deref(),
    )
    .await?;

    // Advances carry no bill reference; that is what makes them advances.
    let payment = insert_payment(
        &mut tx,
        PaymentDirection::In,
        PartyKind::Customer,
        Some(customer_id),
        None,
        None,
        method,
        payload.amount,
        None,
        payload.note.as_deref(),
        occurred_at,
    )
    .await
    .map_err(internal_error)?;
    tx.commit().await.map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn record_payout(
    State(state): State<AppState>,
    Json(payload): Json<RecordPayoutRequest>,
) -> Result<(StatusCode, Json<Payment>), (StatusCode, String)> {
    if payload.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "amount must be positive".to_string(),
        ));
    }
    let method = normalize_payment_method(payload.payment_method.as_deref())
        .map_err(invalid_request)?;
    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    ensure_customer_exists(&mut tx, payload.customer_id).await?;

    let available = advance_balance(&mut tx, payload.customer_id)
        .await
        .map_err(internal_error)?;
    if payload.amount > available {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("payout {} exceeds available advance {}", payload.amount, available),
        ));
    }

    let payment = insert_payment(
        &mut tx,
        PaymentDirection::Out,
        PartyKind::Customer,
        Some(payload.customer_id),
        None,
        None,
        method,
        payload.amount,
        None,
        payload.note.as_deref(),
        occurred_at,
    )
    .await
    .map_err(internal_error)?;
    tx.commit().await.map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn record_payment(
    State(state): State<AppState>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), (StatusCode, String)> {
    if payload.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "amount must be positive".to_string(),
        ));
    }
    let direction = PaymentDirection::parse(&payload.direction)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "direction must be IN or OUT".to_string()))?;
    let party_kind = PartyKind::parse(&payload.party_kind).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "party_kind must be CUSTOMER, SUPPLIER, or OTHER".to_string(),
        )
    })?;
    let method = normalize_payment_method(payload.payment_method.as_deref())
        .map_err(invalid_request)?;
    let bill_no = payload
        .bill_no
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.pool.begin().await.map_err(internal_error)?;

    let (customer_id, supplier_id, party_name) = match party_kind {
        PartyKind::Customer => {
            let customer_id = payload.customer_id.ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "customer_id is required for CUSTOMER payments".to_string(),
                )
            })?;
            ensure_customer_exists(&mut tx, customer_id).await?;
            (Some(customer_id), None, None)
        }
        PartyKind::Supplier => {
            let supplier_id = payload.supplier_id.ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "supplier_id is required for SUPPLIER payments".to_string(),
                )
            })?;
            ensure_supplier_exists(&mut tx, supplier_id).await?;
            (None, Some(supplier_id), None)
        }
        PartyKind::Other => {
            let party_name = payload
                .party_name
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    (
                        StatusCode::BAD_REQUEST,
                        "party_name is required for OTHER payments".to_string(),
                    )
                })?;
            (None, None, Some(party_name))
        }
    };

    let payment = insert_payment(
        &mut tx,
        direction,
        party_kind,
        customer_id,
        supplier_id,
        party_name.as_deref(),
        method,
        payload.amount,
        bill_no,
        payload.note.as_deref(),
        occurred_at,
    )
    .await
    .map_err(internal_error)?;
    tx.commit().await.map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn record_adjustment(
    State(state): State<AppState>,
    Json(payload): Json<RecordAdjustmentRequest>,
) -> Result<(StatusCode, Json<BillAdjustment>), (StatusCode, String)> {
    let bill_no = payload.bill_no.trim().to_string();
    if bill_no.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "bill_no is required".to_string()));
    }
    let kind = AdjustmentKind::parse(&payload.kind).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "kind must be CHARGE, DISCOUNT, or EXECUTIVE".to_string(),
        )
    })?;

    // Charges are stored positive, discounts negative, executive rows zero:
    // the ledger view passes amounts through as-is.
    let (amount, label) = match kind {
        AdjustmentKind::Charge | AdjustmentKind::Discount => {
            let magnitude = payload.amount.ok_or_else(|| {
                (StatusCode::BAD_REQUEST, "amount is required".to_string())
            })?;
            if magnitude <= Decimal::ZERO {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "amount must be positive".to_string(),
                ));
            }
            let signed = if kind == AdjustmentKind::Discount {
                -magnitude
            } else {
                magnitude
            };
            let label = payload
                .label
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            (signed, label)
        }
        AdjustmentKind::Executive => {
            let label = payload
                .label
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    (
                        StatusCode::BAD_REQUEST,
                        "label is required for EXECUTIVE annotations".to_string(),
                    )
                })?;
            (Decimal::ZERO, Some(label))
        }
    };
    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    ensure_customer_exists(&mut tx, payload.customer_id).await?;
    let adjustment = insert_adjustment(
        &mut tx,
        &bill_no,
        payload.customer_id,
        kind,
        amount,
        label.as_deref(),
        occurred_at,
    )
    .await
    .map_err(internal_error)?;
    tx.commit().await.map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(adjustment)))
}

async fn daily_bills(
    State(state): State<AppState>,
    Query(query): Query<DailyBillsQuery>,
) -> Result<Json<DailyBillsResponse>, (StatusCode, String)> {
    let (day_start, day_end) = day_bounds(query.date).map_err(invalid_request)?;

    let rows = sqlx::query(
        r#"
        SELECT bill_no, entry_type, amount, quantity, price_per_unit, detail, occurred_at
        FROM bill_transaction_ledger
        WHERE occurred_at >= $1 AND occurred_at < $2
        ORDER BY occurred_at ASC
        "#,
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let ledger_rows = map_ledger_rows(&rows)?;
    let bills = marmora_ledger::group_bills(ledger_rows);
    let net_total = bills.iter().map(|bill| bill.net).sum();
    let paid_total = bills.iter().map(|bill| bill.paid).sum();

    Ok(Json(DailyBillsResponse {
        date: query.date,
        bills,
        net_total,
        paid_total,
    }))
}

async fn list_parties(
    State(state): State<AppState>,
) -> Result<Json<PartiesResponse>, (StatusCode, String)> {
    let customer_rows = sqlx::query(
        r#"
        SELECT customer_id, name, balance
        FROM customer_totals
        ORDER BY name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut customers = Vec::with_capacity(customer_rows.len());
    for row in customer_rows {
        customers.push(PartyBalanceView {
            id: row.try_get("customer_id").map_err(internal_error)?,
            kind: PartyKind::Customer.as_str().to_string(),
            name: row.try_get("name").map_err(internal_error)?,
            balance: row.try_get("balance").map_err(internal_error)?,
        });
    }

    let supplier_rows = sqlx::query(
        r#"
        SELECT
            s.id,
            s.name,
            s.opening_balance + COALESCE((
                SELECT SUM(t.amount)
                FROM supplier_transactions t
                WHERE t.supplier_id = s.id
            ), 0) AS balance
        FROM suppliers s
        ORDER BY s.name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut suppliers = Vec::with_capacity(supplier_rows.len());
    for row in supplier_rows {
        suppliers.push(PartyBalanceView {
            id: row.try_get("id").map_err(internal_error)?,
            kind: PartyKind::Supplier.as_str().to_string(),
            name: row.try_get("name").map_err(internal_error)?,
            balance: row.try_get("balance").map_err(internal_error)?,
        });
    }

    Ok(Json(PartiesResponse { customers, suppliers }))
}

async fn submit_sale_approval(
    State(state): State<AppState>,
    Json(payload): Json<SubmitSaleApprovalRequest>,
) -> Result<(StatusCode, Json<SubmitSaleApprovalResponse>), (StatusCode, String)> {
    validate_sale_shape(&payload.sale).map_err(invalid_request)?;

    let approval_id = Uuid::new_v4();
    let now = Utc::now();
    let staged = serde_json::to_value(&payload.sale).map_err(internal_error)?;

    sqlx::query(
        r#"
        INSERT INTO sales_approvals (id, payload, status, submitted_by, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(approval_id)
    .bind(&staged)
    .bind(ApprovalStatus::Pending.as_str())
    .bind(payload.submitted_by.as_deref().map(str::trim))
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitSaleApprovalResponse {
            approval_id,
            status: ApprovalStatus::Pending.as_str().to_string(),
            created_at: now,
        }),
    ))
}

async fn list_sale_approvals(
    State(state): State<AppState>,
    Query(query): Query<ListApprovalsQuery>,
) -> Result<Json<ListApprovalsResponse>, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(|value| {
            ApprovalStatus::parse(value).ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "status must be PENDING, APPROVED, or REJECTED".to_string(),
                )
            })
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let rows = sqlx::query(
        r#"
        SELECT id, payload, status, submitted_by, created_at, decided_at, decision_note
        FROM sales_approvals
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status.map(|value| value.as_str()))
    .bind(limit)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(map_sales_approval(&row)?);
    }

    Ok(Json(ListApprovalsResponse { items }))
}

async fn decide_sale_approval(
    State(state): State<AppState>,
    Path(approval_id): Path<Uuid>,
    Json(payload): Json<DecideSaleApprovalRequest>,
) -> Result<Json<DecideSaleApprovalResponse>, (StatusCode, String)> {
    let decision = ApprovalStatus::parse(&payload.decision)
        .filter(|status| *status != ApprovalStatus::Pending)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "decision must be APPROVED or REJECTED".to_string(),
            )
        })?;

    let now = Utc::now();
    let mut tx = state.pool.begin().await.map_err(internal_error)?;

    let approval_row = sqlx::query(
        r#"
        SELECT payload, status
        FROM sales_approvals
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(approval_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(internal_error)?;

    let Some(approval_row) = approval_row else {
        return Err((StatusCode::NOT_FOUND, "sales approval not found".to_string()));
    };

    let status_raw: String = approval_row.try_get("status").map_err(internal_error)?;
    let current = ApprovalStatus::parse(&status_raw).ok_or_else(|| {
        internal_error(format!("approval {approval_id} has unknown status '{status_raw}'"))
    })?;
    current
        .transition_to(decision)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;

    let mut applied_bill: Option<String> = None;
    let mut applied_customer: Option<Uuid> = None;

    if decision == ApprovalStatus::Approved {
        let staged: serde_json::Value = approval_row.try_get("payload").map_err(internal_error)?;
        let sale: RecordSaleRequest = serde_json::from_value(staged).map_err(|err| {
            internal_error(format!("staged payload is not a valid sale: {err}"))
        })?;
        validate_sale_shape(&sale).map_err(invalid_request)?;

        let applied = apply_sale(&mut tx, &sale).await?;
        applied_bill = Some(applied.bill_no);
        applied_customer = Some(applied.customer_id);
    }

    sqlx::query(
        r#"
        UPDATE sales_approvals
        SET status = $2, decided_at = $3, decision_note = $4
        WHERE id = $1
        "#,
    )
    .bind(approval_id)
    .bind(decision.as_str())
    .bind(now)
    .bind(payload.decision_note.as_deref().map(str::trim))
    .execute(&mut *tx)
    .await
    .map_err(internal_error)?;

    tx.commit().await.map_err(internal_error)?;

    let mut dispatched = false;
    if let (Some(bill_no), Some(customer_id)) = (applied_bill.as_ref(), applied_customer) {
        let event = SaleApprovedEvent {
            approval_id,
            bill_no: bill_no.clone(),
            customer_id,
        };
        // The approval is committed; a lost notification is log-worthy only.
        match state
            .redis
            .publish_json(Channel::SalesApproved, &event)
            .await
        {
            Ok(()) => dispatched = true,
            Err(err) => error!("failed to publish sale approval event: {err}"),
        }
    }

    Ok(Json(DecideSaleApprovalResponse {
        approval_id,
        status: decision.as_str().to_string(),
        bill_no: applied_bill,
        customer_id: applied_customer,
        dispatched,
    }))
}

struct AppliedSale {
    customer_id: Uuid,
    bill_no: String,
    total: Decimal,
    paid: Decimal,
    occurred_at: DateTime<Utc>,
}

/// Writes one sale as ledger rows: SALE stock moves per item, an optional IN
/// payment, and charge/discount/executive adjustments, all under the bill
/// number. Shared by the direct sale entry and the approval conversion.
async fn apply_sale(
    tx: &mut Transaction<'_, Postgres>,
    sale: &RecordSaleRequest,
) -> Result<AppliedSale, (StatusCode, String)> {
    let bill_no = sale.bill_no.trim().to_string();
    let occurred_at = sale.occurred_at.unwrap_or_else(Utc::now);
    let customer_id =
        resolve_customer(tx, sale.customer_id, sale.customer_name.as_deref()).await?;

    let mut total = Decimal::ZERO;
    for item in &sale.items {
        ensure_product_exists(tx, item.product_id).await?;
        insert_stock_move(
            tx,
            item.product_id,
            StockMoveKind::Sale,
            item.quantity,
            item.price_per_unit,
            Some(&bill_no),
            Some(customer_id),
            None,
            sale.note.as_deref(),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
        total += item.quantity * item.price_per_unit;
    }

    if let Some(charge) = sale.charge.filter(|value| *value > Decimal::ZERO) {
        insert_adjustment(
            tx,
            &bill_no,
            customer_id,
            AdjustmentKind::Charge,
            charge,
            sale.charge_label.as_deref().map(str::trim),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
        total += charge;
    }

    if let Some(discount) = sale.discount.filter(|value| *value > Decimal::ZERO) {
        insert_adjustment(
            tx,
            &bill_no,
            customer_id,
            AdjustmentKind::Discount,
            -discount,
            None,
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
        total -= discount;
    }

    if let Some(executive) = sale
        .executive
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        insert_adjustment(
            tx,
            &bill_no,
            customer_id,
            AdjustmentKind::Executive,
            Decimal::ZERO,
            Some(executive),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
    }

    let paid = sale.paid_amount.unwrap_or(Decimal::ZERO);
    if paid > Decimal::ZERO {
        let method = normalize_payment_method(sale.payment_method.as_deref())
            .map_err(invalid_request)?;
        insert_payment(
            tx,
            PaymentDirection::In,
            PartyKind::Customer,
            Some(customer_id),
            None,
            None,
            method,
            paid,
            Some(&bill_no),
            sale.note.as_deref(),
            occurred_at,
        )
        .await
        .map_err(internal_error)?;
    }

    Ok(AppliedSale {
        customer_id,
        bill_no,
        total,
        paid,
        occurred_at,
    })
}

async fn resolve_customer(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Option<Uuid>,
    customer_name: Option<&str>,
) -> Result<Uuid, (StatusCode, String)> {
    if let Some(customer_id) = customer_id {
        ensure_customer_exists(tx, customer_id).await?;
        return Ok(customer_id);
    }

    let name = customer_name
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "customer_id or customer_name is required".to_string(),
            )
        })?;

    // Customers come into existence on first reference from a sale, advance,
    // or payment entry.
    let existing = sqlx::query("SELECT id FROM customers WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal_error)?;
    if let Some(row) = existing {
        return row.try_get("id").map_err(internal_error);
    }

    let customer_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO customers (id, name, opening_balance, created_at)
        VALUES ($1, $2, 0, $3)
        "#,
    )
    .bind(customer_id)
    .bind(name)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(internal_error)?;

    Ok(customer_id)
}

async fn resolve_supplier(
    tx: &mut Transaction<'_, Postgres>,
    supplier_id: Option<Uuid>,
    supplier_name: Option<&str>,
) -> Result<Uuid, (StatusCode, String)> {
    if let Some(supplier_id) = supplier_id {
        ensure_supplier_exists(tx, supplier_id).await?;
        return Ok(supplier_id);
    }

    let name = supplier_name
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "supplier_id or supplier_name is required".to_string(),
            )
        })?;

    let existing = sqlx::query("SELECT id FROM suppliers WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal_error)?;
    if let Some(row) = existing {
        return row.try_get("id").map_err(internal_error);
    }

    let supplier_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO suppliers (id, name, opening_balance, created_at)
        VALUES ($1, $2, 0, $3)
        "#,
    )
    .bind(supplier_id)
    .bind(name)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(internal_error)?;

    Ok(supplier_id)
}

async fn ensure_customer_exists(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> Result<(), (StatusCode, String)> {
    let found = sqlx::query("SELECT 1 FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal_error)?;
    if found.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("customer {customer_id} does not exist"),
        ));
    }
    Ok(())
}

async fn ensure_supplier_exists(
    tx: &mut Transaction<'_, Postgres>,
    supplier_id: Uuid,
) -> Result<(), (StatusCode, String)> {
    let found = sqlx::query("SELECT 1 FROM suppliers WHERE id = $1")
        .bind(supplier_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal_error)?;
    if found.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("supplier {supplier_id} does not exist"),
        ));
    }
    Ok(())
}

async fn ensure_product_exists(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> Result<(), (StatusCode, String)> {
    let found = sqlx::query("SELECT 1 FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal_error)?;
    if found.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("product {product_id} does not exist"),
        ));
    }
    Ok(())
}

/// Outstanding advance: IN minus OUT over the customer's bill-less payments.
async fn advance_balance(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(
            CASE WHEN direction = 'IN' THEN amount ELSE -amount END
        ), 0)::numeric
        FROM payments
        WHERE customer_id = $1 AND bill_no IS NULL
        "#,
    )
    .bind(customer_id)
    .fetch_one(&mut **tx)
    .await
}

#[allow(clippy::too_many_arguments)]
async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    direction: PaymentDirection,
    party_kind: PartyKind,
    customer_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    party_name: Option<&str>,
    method: PaymentMethod,
    amount: Decimal,
    bill_no: Option<&str>,
    note: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> Result<Payment, sqlx::Error> {
    let payment_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, direction, party_kind, customer_id, supplier_id, party_name,
            method, amount, bill_no, note, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(payment_id)
    .bind(direction.as_str())
    .bind(party_kind.as_str())
    .bind(customer_id)
    .bind(supplier_id)
    .bind(party_name)
    .bind(method.as_str())
    .bind(amount)
    .bind(bill_no)
    .bind(note)
    .bind(occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(Payment {
        id: payment_id,
        direction,
        party_kind,
        customer_id,
        supplier_id,
        party_name: party_name.map(str::to_string),
        method,
        amount,
        bill_no: bill_no.map(str::to_string),
        note: note.map(str::to_string),
        occurred_at,
    })
}

#[allow(clippy::too_many_arguments)]
async fn insert_stock_move(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    kind: StockMoveKind,
    quantity: Decimal,
    price_per_unit: Decimal,
    bill_no: Option<&str>,
    customer_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    note: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> Result<Uuid, sqlx::Error> {
    let move_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO stock_moves (
            id, product_id, kind, quantity, price_per_unit, bill_no,
            customer_id, supplier_id, note, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(move_id)
    .bind(product_id)
    .bind(kind.as_str())
    .bind(quantity)
    .bind(price_per_unit)
    .bind(bill_no)
    .bind(customer_id)
    .bind(supplier_id)
    .bind(note)
    .bind(occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(move_id)
}

async fn insert_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    bill_no: &str,
    customer_id: Uuid,
    kind: AdjustmentKind,
    amount: Decimal,
    label: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> Result<BillAdjustment, sqlx::Error> {
    let adjustment_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO bill_adjustments (
            id, bill_no, customer_id, kind, amount, label, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(adjustment_id)
    .bind(bill_no)
    .bind(customer_id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(label)
    .bind(occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(BillAdjustment {
        id: adjustment_id,
        bill_no: bill_no.to_string(),
        customer_id,
        kind,
        amount,
        label: label.map(str::to_string),
        occurred_at,
    })
}

fn map_ledger_rows(rows: &[PgRow]) -> Result<Vec<LedgerRow>, (StatusCode, String)> {
    let mut ledger_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let entry_type: String = row.try_get("entry_type").map_err(internal_error)?;
        let Some(kind) = LedgerRowKind::parse(&entry_type) else {
            warn!("skipping ledger row with unknown entry type '{entry_type}'");
            continue;
        };
        let bill_no: Option<String> = row.try_get("bill_no").map_err(internal_error)?;
        let amount: Option<Decimal> = row.try_get("amount").map_err(internal_error)?;
        let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(internal_error)?;

        let mut ledger_row = LedgerRow::new(kind, bill_no, amount, occurred_at);
        ledger_row.quantity = row.try_get("quantity").map_err(internal_error)?;
        ledger_row.price_per_unit = row.try_get("price_per_unit").map_err(internal_error)?;
        ledger_row.detail = row.try_get("detail").map_err(internal_error)?;
        ledger_rows.push(ledger_row);
    }
    Ok(ledger_rows)
}

fn map_product(row: &PgRow) -> Result<Product, (StatusCode, String)> {
    Ok(Product {
        id: row.try_get("id").map_err(internal_error)?,
        name: row.try_get("name").map_err(internal_error)?,
        category: row.try_get("category").map_err(internal_error)?,
        unit: row.try_get("unit").map_err(internal_error)?,
        sale_price: row.try_get("sale_price").map_err(internal_error)?,
        created_at: row.try_get("created_at").map_err(internal_error)?,
    })
}

fn map_customer(row: &PgRow) -> Result<Customer, (StatusCode, String)> {
    Ok(Customer {
        id: row.try_get("id").map_err(internal_error)?,
        name: row.try_get("name").map_err(internal_error)?,
        phone: row.try_get("phone").map_err(internal_error)?,
        opening_balance: row.try_get("opening_balance").map_err(internal_error)?,
        created_at: row.try_get("created_at").map_err(internal_error)?,
    })
}

fn map_sales_approval(row: &PgRow) -> Result<SalesApproval, (StatusCode, String)> {
    let status_raw: String = row.try_get("status").map_err(internal_error)?;
    let status = ApprovalStatus::parse(&status_raw).ok_or_else(|| {
        internal_error(format!("sales approval has unknown status '{status_raw}'"))
    })?;

    Ok(SalesApproval {
        id: row.try_get("id").map_err(internal_error)?,
        payload: row.try_get("payload").map_err(internal_error)?,
        status,
        submitted_by: row.try_get("submitted_by").map_err(internal_error)?,
        created_at: row.try_get("created_at").map_err(internal_error)?,
        decided_at: row.try_get("decided_at").map_err(internal_error)?,
        decision_note: row.try_get("decision_note").map_err(internal_error)?,
    })
}

fn map_supplier(row: &PgRow) -> Result<Supplier, (StatusCode, String)> {
    Ok(Supplier {
        id: row.try_get("id").map_err(internal_error)?,
        name: row.try_get("name").map_err(internal_error)?,
        phone: row.try_get("phone").map_err(internal_error)?,
        opening_balance: row.try_get("opening_balance").map_err(internal_error)?,
        created_at: row.try_get("created_at").map_err(internal_error)?,
    })
}

fn validate_sale_shape(sale: &RecordSaleRequest) -> AnyResult<()> {
    if sale.bill_no.trim().is_empty() {
        anyhow::bail!("bill_no is required");
    }
    if sale.items.is_empty() {
        anyhow::bail!("at least one item is required");
    }
    for item in &sale.items {
        if item.quantity <= Decimal::ZERO {
            anyhow::bail!("item quantity must be positive");
        }
        if item.price_per_unit < Decimal::ZERO {
            anyhow::bail!("item price must be non-negative");
        }
    }
    if let Some(paid) = sale.paid_amount {
        if paid < Decimal::ZERO {
            anyhow::bail!("paid_amount must be non-negative");
        }
    }
    if let Some(charge) = sale.charge {
        if charge < Decimal::ZERO {
            anyhow::bail!("charge must be non-negative");
        }
    }
    if let Some(discount) = sale.discount {
        if discount < Decimal::ZERO {
            anyhow::bail!("discount must be non-negative");
        }
    }

    Ok(())
}

fn normalize_payment_method(value: Option<&str>) -> AnyResult<PaymentMethod> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(PaymentMethod::Cash);
    };
    match PaymentMethod::parse(value) {
        Some(method) => Ok(method),
        None => anyhow::bail!("payment_method must be one of CASH, BANK, UPI, CHEQUE, OTHER"),
    }
}

fn day_bounds(date: NaiveDate) -> AnyResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start_naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date"))?;
    let next_day = date
        .succ_opt()
        .ok_or_else(|| anyhow::anyhow!("invalid date"))?;
    let end_naive = next_day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date"))?;

    Ok((
        DateTime::<Utc>::from_naive_utc_and_offset(start_naive, Utc),
        DateTime::<Utc>::from_naive_utc_and_offset(end_naive, Utc),
    ))
}

fn invalid_request(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marmora_platform::SaleItem;
    use rust_decimal_macros::dec;

    fn sale(bill_no: &str, items: Vec<SaleItem>) -> RecordSaleRequest {
        RecordSaleRequest {
            customer_id: None,
            customer_name: Some("Asha Marbles".to_string()),
            bill_no: bill_no.to_string(),
            items,
            paid_amount: None,
            payment_method: None,
            charge: None,
            charge_label: None,
            discount: None,
            executive: None,
            note: None,
            occurred_at: None,
        }
    }

    fn item(quantity: Decimal, price_per_unit: Decimal) -> SaleItem {
        SaleItem {
            product_id: Uuid::new_v4(),
            quantity,
            price_per_unit,
        }
    }

    #[test]
    fn sale_shape_requires_bill_and_items() {
        assert!(validate_sale_shape(&sale("B-1", vec![item(dec!(2), dec!(85))])).is_ok());
        assert!(validate_sale_shape(&sale("  ", vec![item(dec!(2), dec!(85))])).is_err());
        assert!(validate_sale_shape(&sale("B-1", vec![])).is_err());
        assert!(validate_sale_shape(&sale("B-1", vec![item(dec!(0), dec!(85))])).is_err());
        assert!(validate_sale_shape(&sale("B-1", vec![item(dec!(2), dec!(-1))])).is_err());
    }

    #[test]
    fn sale_shape_rejects_negative_money_fields() {
        let mut request = sale("B-2", vec![item(dec!(1), dec!(100))]);
        request.paid_amount = Some(dec!(-5));
        assert!(validate_sale_shape(&request).is_err());

        let mut request = sale("B-2", vec![item(dec!(1), dec!(100))]);
        request.discount = Some(dec!(-5));
        assert!(validate_sale_shape(&request).is_err());

        let mut request = sale("B-2", vec![item(dec!(1), dec!(100))]);
        request.charge = Some(dec!(0));
        request.discount = Some(dec!(0));
        assert!(validate_sale_shape(&request).is_ok());
    }

    #[test]
    fn payment_method_defaults_to_cash() {
        assert_eq!(normalize_payment_method(None).unwrap(), PaymentMethod::Cash);
        assert_eq!(normalize_payment_method(Some("  ")).unwrap(), PaymentMethod::Cash);
        assert_eq!(normalize_payment_method(Some("upi")).unwrap(), PaymentMethod::Upi);
        assert!(normalize_payment_method(Some("barter")).is_err());
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(end - start, chrono::Duration::days(1));
        assert_eq!(start.date_naive(), date);
    }
}
