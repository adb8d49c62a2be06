//! Receipt and delivery pages.
//!
//! Line items arrive as repeated `product_id` / `quantity` fields, so the
//! create handlers take the raw body and decode it with [`FormFields`].
//! An `action` field distinguishes the helper buttons (add a row, check
//! stock) from the final submission.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use chrono::NaiveDate;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    filters,
    handlers::{render, server_error},
    middleware::{get_current_user, CurrentUser},
    models::{
        LedgerEntryDisplay, NewTransaction, NewTransactionItem, OperationType, Product,
        Transaction, TransactionItemDisplay, TransactionStatus, TransactionSummary,
        TransactionType, Warehouse,
    },
    services::{
        stock::{self, StockStatus},
        transactions,
    },
    state::AppState,
    utils::FormFields,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub product_id: String,
    pub quantity: String,
}

impl ItemRow {
    fn blank() -> Self {
        Self {
            product_id: String::new(),
            quantity: "1".to_string(),
        }
    }
}

/// Raw values of a receipt or delivery form, echoed back when it is re-rendered.
#[derive(Debug, Clone)]
pub struct OperationForm {
    pub kind: TransactionType,
    pub reference: String,
    pub warehouse_id: String,
    pub supplier: String,
    pub delivery_address: String,
    pub responsible: String,
    pub schedule_date: String,
    pub operation_type: String,
    pub notes: String,
    pub items: Vec<ItemRow>,
}

impl OperationForm {
    pub fn blank(kind: TransactionType) -> Self {
        Self {
            kind,
            reference: String::new(),
            warehouse_id: String::new(),
            supplier: String::new(),
            delivery_address: String::new(),
            responsible: String::new(),
            schedule_date: String::new(),
            operation_type: kind.default_operation().to_string(),
            notes: String::new(),
            items: vec![ItemRow::blank()],
        }
    }

    pub fn from_fields(kind: TransactionType, fields: &FormFields) -> Self {
        let text = |key: &str| fields.get_string(key).unwrap_or_default();

        let mut quantities = fields.all("quantity");
        let items: Vec<ItemRow> = fields
            .all("product_id")
            .map(|product_id| ItemRow {
                product_id: product_id.to_string(),
                quantity: quantities.next().unwrap_or("1").to_string(),
            })
            .collect();

        Self {
            kind,
            reference: text("reference"),
            warehouse_id: text("warehouse_id"),
            supplier: text("supplier"),
            delivery_address: text("delivery_address"),
            responsible: text("responsible"),
            schedule_date: text("schedule_date"),
            operation_type: fields
                .get_string("operation_type")
                .unwrap_or_else(|| kind.default_operation().to_string()),
            notes: text("notes"),
            items: if items.is_empty() { vec![ItemRow::blank()] } else { items },
        }
    }

    /// Drops row `index`. The form always keeps at least one (blank) row.
    pub fn remove_item(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
        if self.items.is_empty() {
            self.items.push(ItemRow::blank());
        }
    }

    /// Rows with a product selected, parsed. Rows without a product are skipped.
    fn parsed_items(&self) -> Result<Vec<(usize, NewTransactionItem)>, AppError> {
        let mut parsed = Vec::new();
        for (index, row) in self.items.iter().enumerate() {
            if row.product_id.is_empty() {
                continue;
            }
            let product_id = Uuid::parse_str(&row.product_id)
                .map_err(|_| AppError::Validation("Select a valid product".to_string()))?;
            let quantity = row
                .quantity
                .parse::<i32>()
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| {
                    AppError::Validation(
                        "Quantity must be a whole number of at least 1".to_string(),
                    )
                })?;
            parsed.push((index, NewTransactionItem { product_id, quantity }));
        }
        Ok(parsed)
    }

    pub fn to_new_transaction(&self) -> Result<NewTransaction, AppError> {
        let warehouse_label = match self.kind {
            TransactionType::In => "Select a target warehouse",
            TransactionType::Out => "Select a source warehouse",
        };
        let warehouse_id = Uuid::parse_str(&self.warehouse_id)
            .map_err(|_| AppError::Validation(warehouse_label.to_string()))?;

        let schedule_date = match self.schedule_date.as_str() {
            "" => None,
            raw => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation("Schedule date must be a valid date".to_string())
            })?),
        };

        let operation_type = self
            .operation_type
            .parse::<OperationType>()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let optional = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());

        Ok(NewTransaction {
            kind: self.kind,
            reference: optional(&self.reference),
            warehouse_id,
            supplier: optional(&self.supplier),
            delivery_address: optional(&self.delivery_address),
            responsible: optional(&self.responsible),
            schedule_date,
            operation_type: Some(operation_type),
            notes: optional(&self.notes),
            items: self.parsed_items()?.into_iter().map(|(_, item)| item).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct ItemLine {
    pub products: Vec<SelectOption>,
    pub quantity: String,
    pub stock_message: String,
    pub stock_ok: bool,
}

#[derive(Debug, Clone)]
pub struct StatusStep {
    pub status: TransactionStatus,
    pub label: &'static str,
    pub active: bool,
}

fn status_steps(current: TransactionStatus) -> Vec<StatusStep> {
    TransactionStatus::ALL
        .iter()
        .map(|status| StatusStep {
            status: *status,
            label: status.label(),
            active: *status == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "operations/form.html")]
struct OperationFormTemplate<'a> {
    current_user: &'a CurrentUser,
    title: &'static str,
    subtitle: &'static str,
    action_path: &'static str,
    list_path: &'static str,
    is_receipt: bool,
    form: OperationForm,
    warehouses: Vec<SelectOption>,
    operation_types: Vec<SelectOption>,
    lines: Vec<ItemLine>,
    steps: Vec<StatusStep>,
    error: String,
}

#[derive(Template)]
#[template(path = "operations/list.html")]
struct OperationsListTemplate<'a> {
    current_user: &'a CurrentUser,
    title: &'static str,
    new_path: String,
    list_path: &'static str,
    operations: Vec<TransactionSummary>,
    status_options: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "operations/detail.html")]
struct OperationDetailTemplate<'a> {
    current_user: &'a CurrentUser,
    transaction: Transaction,
    kind_label: &'static str,
    list_path: &'static str,
    warehouse_name: String,
    operation_label: &'static str,
    items: Vec<TransactionItemDisplay>,
    ledger: Vec<LedgerEntryDisplay>,
    steps: Vec<StatusStep>,
    next_label: String,
    can_advance: bool,
    error: String,
}

#[derive(Deserialize)]
pub struct ListFilters {
    status: Option<String>,
}

async fn load_reference_data(db: &Database) -> Result<(Vec<Product>, Vec<Warehouse>), AppError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active = true ORDER BY name",
    )
    .fetch_all(db);
    let warehouses = sqlx::query_as::<_, Warehouse>("SELECT * FROM warehouses ORDER BY name")
        .fetch_all(db);

    let (products, warehouses) = tokio::try_join!(products, warehouses)?;
    Ok((products, warehouses))
}

/// Advisory stock status per form row (deliveries only). Rows without a
/// parseable product, or a form without a warehouse, get `None`.
async fn stock_statuses(db: &Database, form: &OperationForm) -> Result<Vec<Option<StockStatus>>, AppError> {
    let mut statuses = vec![None; form.items.len()];
    if form.kind != TransactionType::Out {
        return Ok(statuses);
    }
    let Ok(warehouse_id) = Uuid::parse_str(&form.warehouse_id) else {
        return Ok(statuses);
    };

    let rows: Vec<(usize, NewTransactionItem)> = form
        .items
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let product_id = Uuid::parse_str(&row.product_id).ok()?;
            let quantity = row.quantity.parse::<i32>().unwrap_or(0).max(0);
            Some((index, NewTransactionItem { product_id, quantity }))
        })
        .collect();
    if rows.is_empty() {
        return Ok(statuses);
    }

    let items: Vec<NewTransactionItem> = rows.iter().map(|(_, item)| item.clone()).collect();
    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let levels = stock::available_in_warehouse(db, warehouse_id, &product_ids).await?;

    for ((index, _), check) in rows.iter().zip(stock::check_lines(&items, &levels)) {
        statuses[*index] = Some(check.status);
    }
    Ok(statuses)
}

async fn render_form(
    db: &Database,
    current_user: &CurrentUser,
    form: OperationForm,
    error: String,
) -> Result<Html<String>, StatusCode> {
    let (products, warehouses) = load_reference_data(db)
        .await
        .map_err(|e| server_error("Failed to load form data", e))?;
    let statuses = stock_statuses(db, &form)
        .await
        .map_err(|e| server_error("Failed to check stock", e))?;

    let lines = form
        .items
        .iter()
        .zip(statuses)
        .map(|(row, status)| ItemLine {
            products: products
                .iter()
                .map(|p| SelectOption {
                    value: p.id.to_string(),
                    label: format!("{} ({})", p.name, p.sku),
                    selected: p.id.to_string() == row.product_id,
                })
                .collect(),
            quantity: row.quantity.clone(),
            stock_message: status.map(|s| s.message()).unwrap_or_default(),
            stock_ok: status.map_or(false, |s| s.is_ok()),
        })
        .collect();

    let warehouses = warehouses
        .iter()
        .map(|w| SelectOption {
            value: w.id.to_string(),
            label: format!("{} ({})", w.name, w.shortcode),
            selected: w.id.to_string() == form.warehouse_id,
        })
        .collect();

    let operation_types = form
        .kind
        .operations()
        .iter()
        .map(|op| SelectOption {
            value: op.to_string(),
            label: op.label(form.kind).to_string(),
            selected: op.as_str() == form.operation_type,
        })
        .collect();

    let (title, subtitle) = match form.kind {
        TransactionType::In => ("New Receipt", "Create inbound stock receipt"),
        TransactionType::Out => ("New Delivery", "Create outbound stock delivery"),
    };

    let template = OperationFormTemplate {
        current_user,
        title,
        subtitle,
        action_path: form.kind.list_path(),
        list_path: form.kind.list_path(),
        is_receipt: form.kind == TransactionType::In,
        form,
        warehouses,
        operation_types,
        lines,
        steps: status_steps(TransactionStatus::Draft),
        error,
    };
    render(&template)
}

async fn new_operation_form(
    cookies: Cookies,
    state: AppState,
    kind: TransactionType,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    render_form(&state.db, &current_user, OperationForm::blank(kind), String::new()).await
}

pub async fn receipt_form(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    new_operation_form(cookies, state, TransactionType::In).await
}

pub async fn delivery_form(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    new_operation_form(cookies, state, TransactionType::Out).await
}

async fn submit_operation(
    cookies: Cookies,
    state: AppState,
    kind: TransactionType,
    body: String,
) -> Result<Response, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let fields = FormFields::parse(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
    let mut form = OperationForm::from_fields(kind, &fields);

    // Row edits and stock checks redisplay the form without saving
    let editing = match fields.get("action") {
        Some("add_item") => {
            form.items.push(ItemRow::blank());
            true
        }
        Some("check_stock") => true,
        Some(action) => match action.strip_prefix("remove_item:") {
            Some(index) => {
                if let Ok(index) = index.parse::<usize>() {
                    form.remove_item(index);
                }
                true
            }
            None => false,
        },
        None => false,
    };
    if editing {
        let page = render_form(&state.db, &current_user, form, String::new()).await?;
        return Ok(page.into_response());
    }

    let result = match form.to_new_transaction() {
        Ok(new) => transactions::create(&state.db, new, Some(current_user.id)).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(Redirect::to(kind.list_path()).into_response()),
        Err(e) if e.status_code().is_client_error() => {
            let status = e.status_code();
            let page = render_form(&state.db, &current_user, form, e.to_string()).await?;
            Ok((status, page).into_response())
        }
        Err(e) => Err(server_error("Failed to create operation", e)),
    }
}

pub async fn create_receipt(
    cookies: Cookies,
    State(state): State<AppState>,
    body: String,
) -> Result<Response, StatusCode> {
    submit_operation(cookies, state, TransactionType::In, body).await
}

pub async fn create_delivery(
    cookies: Cookies,
    State(state): State<AppState>,
    body: String,
) -> Result<Response, StatusCode> {
    submit_operation(cookies, state, TransactionType::Out, body).await
}

async fn operations_list(
    cookies: Cookies,
    state: AppState,
    kind: TransactionType,
    filters: ListFilters,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let status = match filters.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<TransactionStatus>().map_err(|_| StatusCode::BAD_REQUEST)?),
    };

    let operations = transactions::summaries(&state.db, kind, status)
        .await
        .map_err(|e| server_error("Failed to load operations", e))?;

    let mut status_options = vec![SelectOption {
        value: String::new(),
        label: "All statuses".to_string(),
        selected: status.is_none(),
    }];
    status_options.extend(TransactionStatus::ALL.iter().map(|s| SelectOption {
        value: s.to_string(),
        label: s.label().to_string(),
        selected: Some(*s) == status,
    }));

    let title = match kind {
        TransactionType::In => "Receipts",
        TransactionType::Out => "Deliveries",
    };

    render(&OperationsListTemplate {
        current_user: &current_user,
        title,
        new_path: format!("{}/new", kind.list_path()),
        list_path: kind.list_path(),
        operations,
        status_options,
    })
}

pub async fn receipts_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(filters): Query<ListFilters>,
) -> Result<Html<String>, StatusCode> {
    operations_list(cookies, state, TransactionType::In, filters).await
}

pub async fn deliveries_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(filters): Query<ListFilters>,
) -> Result<Html<String>, StatusCode> {
    operations_list(cookies, state, TransactionType::Out, filters).await
}

async fn render_detail(
    db: &Database,
    current_user: &CurrentUser,
    id: Uuid,
    error: String,
) -> Result<Html<String>, StatusCode> {
    let transaction = match transactions::find(db, id).await {
        Ok(transaction) => transaction,
        Err(AppError::NotFound(_)) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(server_error("Failed to load operation", e)),
    };

    let warehouse_name = sqlx::query_scalar::<_, String>("SELECT name FROM warehouses WHERE id = $1")
        .bind(transaction.warehouse_id)
        .fetch_one(db)
        .await
        .map_err(|e| server_error("Failed to load warehouse", e))?;
    let items = transactions::items(db, id)
        .await
        .map_err(|e| server_error("Failed to load operation items", e))?;
    let ledger = transactions::ledger(db, id)
        .await
        .map_err(|e| server_error("Failed to load ledger", e))?;

    let next = transaction.status.next();
    let next_label = match next {
        Some(TransactionStatus::Done) => "Validate".to_string(),
        Some(status) => format!("Mark as {}", status.label()),
        None => String::new(),
    };
    let can_advance = match next {
        Some(TransactionStatus::Done) => current_user.is_manager,
        Some(_) => true,
        None => false,
    };

    let template = OperationDetailTemplate {
        current_user,
        kind_label: transaction.kind.label(),
        list_path: transaction.kind.list_path(),
        operation_label: transaction.operation_type.label(transaction.kind),
        steps: status_steps(transaction.status),
        transaction,
        warehouse_name,
        items,
        ledger,
        next_label,
        can_advance,
        error,
    };
    render(&template)
}

pub async fn operation_detail(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    render_detail(&state.db, &current_user, id, String::new()).await
}

pub async fn advance_operation(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match transactions::transition(&state.db, id, None, current_user.role).await {
        Ok(transaction) => Ok(Redirect::to(&format!("/operations/{}", transaction.id)).into_response()),
        Err(AppError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) if e.status_code().is_client_error() => {
            let status = e.status_code();
            let page = render_detail(&state.db, &current_user, id, e.to_string()).await?;
            Ok((status, page).into_response())
        }
        Err(e) => Err(server_error("Failed to advance operation", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAREHOUSE: &str = "6f1c2a9e-0c4b-4b8e-9d55-3f0a5a1c2b10";
    const PRODUCT_A: &str = "0b7a4a52-5d1e-4c55-8f0e-2d6f7f0b9a01";
    const PRODUCT_B: &str = "c3e8d1f4-7a2b-4e6c-9b1d-5a8f3e2c1d02";

    fn fields(body: &str) -> FormFields {
        FormFields::parse(body).unwrap()
    }

    #[test]
    fn blank_form_has_one_row_and_default_operation() {
        let form = OperationForm::blank(TransactionType::Out);
        assert_eq!(form.items, vec![ItemRow::blank()]);
        assert_eq!(form.operation_type, "STANDARD");
    }

    #[test]
    fn builds_delivery_from_repeated_fields() {
        let body = format!(
            "warehouse_id={WAREHOUSE}&delivery_address=1+Main+St&schedule_date=2025-03-01\
             &operation_type=EXPRESS&product_id={PRODUCT_A}&quantity=3\
             &product_id=&quantity=1&product_id={PRODUCT_B}&quantity=2"
        );
        let form = OperationForm::from_fields(TransactionType::Out, &fields(&body));
        assert_eq!(form.items.len(), 3);

        let new = form.to_new_transaction().unwrap();
        assert_eq!(new.kind, TransactionType::Out);
        assert_eq!(new.delivery_address.as_deref(), Some("1 Main St"));
        assert_eq!(new.schedule_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(new.operation_type, Some(OperationType::Express));
        assert_eq!(new.reference, None);
        assert_eq!(
            new.items,
            vec![
                NewTransactionItem { product_id: PRODUCT_A.parse().unwrap(), quantity: 3 },
                NewTransactionItem { product_id: PRODUCT_B.parse().unwrap(), quantity: 2 },
            ]
        );
    }

    #[test]
    fn requires_a_warehouse() {
        let form = OperationForm::from_fields(
            TransactionType::In,
            &fields(&format!("product_id={PRODUCT_A}&quantity=1")),
        );
        let err = form.to_new_transaction().unwrap_err();
        assert_eq!(err.to_string(), "Select a target warehouse");
    }

    #[test]
    fn rejects_bad_quantity_and_date() {
        let bad_qty = OperationForm::from_fields(
            TransactionType::In,
            &fields(&format!("warehouse_id={WAREHOUSE}&product_id={PRODUCT_A}&quantity=0")),
        );
        assert!(matches!(bad_qty.to_new_transaction(), Err(AppError::Validation(_))));

        let bad_date = OperationForm::from_fields(
            TransactionType::In,
            &fields(&format!("warehouse_id={WAREHOUSE}&schedule_date=03/01/2025")),
        );
        assert!(matches!(bad_date.to_new_transaction(), Err(AppError::Validation(_))));
    }

    #[test]
    fn removing_rows_keeps_one_line() {
        let body = format!("product_id={PRODUCT_A}&quantity=3&product_id={PRODUCT_B}&quantity=2");
        let mut form = OperationForm::from_fields(TransactionType::Out, &fields(&body));

        form.remove_item(0);
        assert_eq!(
            form.items,
            vec![ItemRow { product_id: PRODUCT_B.to_string(), quantity: "2".to_string() }]
        );

        form.remove_item(5);
        assert_eq!(form.items.len(), 1);

        form.remove_item(0);
        assert_eq!(form.items, vec![ItemRow::blank()]);
    }

    #[test]
    fn status_flow_highlights_current_step() {
        let steps = status_steps(TransactionStatus::Ready);
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps.iter().filter(|s| s.active).map(|s| s.label).collect::<Vec<_>>(),
            vec!["Ready"]
        );
    }
}
