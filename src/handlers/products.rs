use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    handlers::{render, server_error},
    middleware::{get_current_user, CurrentUser},
    models::{NewProduct, Product, ProductStockLine},
    state::AppState,
};

// Largest value the NUMERIC(12,2) price column holds
fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

#[derive(Template)]
#[template(path = "products/list.html")]
struct ProductsTemplate<'a> {
    products: Vec<ProductStockLine>,
    current_user: &'a CurrentUser,
}

#[derive(Template)]
#[template(path = "products/form.html")]
struct ProductFormTemplate<'a> {
    form: ProductForm,
    error: String,
    current_user: &'a CurrentUser,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    sku: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    min_stock: String,
    #[serde(default)]
    uom: String,
    #[serde(default)]
    price: String,
}

impl ProductForm {
    fn to_new_product(&self) -> Result<NewProduct, AppError> {
        let sku = self.sku.trim().to_uppercase();
        let name = self.name.trim().to_string();
        if sku.is_empty() || name.is_empty() {
            return Err(AppError::Validation("SKU and name are required".to_string()));
        }

        let optional = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

        let min_stock = match self.min_stock.trim() {
            "" => 0,
            raw => raw
                .parse::<i32>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| AppError::Validation("Minimum stock must be a whole number".to_string()))?,
        };

        let price = match self.price.trim() {
            "" => Decimal::ZERO,
            raw => Decimal::from_str(raw)
                .ok()
                .filter(|p| !p.is_sign_negative())
                .ok_or_else(|| AppError::Validation("Price must be a positive number".to_string()))?,
        };
        if price > max_price() {
            return Err(AppError::Validation(format!("Price cannot exceed {}", max_price())));
        }

        Ok(NewProduct {
            sku,
            name,
            description: optional(&self.description),
            category: optional(&self.category),
            min_stock,
            uom: optional(&self.uom).unwrap_or_else(|| "UNIT".to_string()),
            price,
        })
    }
}

pub(crate) async fn product_stock_lines(db: &Database) -> Result<Vec<ProductStockLine>, AppError> {
    let rows = sqlx::query_as::<_, ProductStockLine>(
        r#"
        SELECT p.id, p.sku, p.name, p.category, p.uom, p.price, p.min_stock,
               COALESCE(SUM(s.quantity), 0)::BIGINT AS on_hand
        FROM products p
        LEFT JOIN stock s ON s.product_id = p.id
        WHERE p.is_active = true
        GROUP BY p.id
        ORDER BY p.name
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub(crate) async fn insert_product(db: &Database, product: &NewProduct) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (sku, name, description, category, min_stock, uom, price)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.category)
    .bind(product.min_stock)
    .bind(&product.uom)
    .bind(product.price)
    .fetch_one(db)
    .await
    .map_err(|e| {
        if AppError::is_unique_violation(&e) {
            AppError::Conflict(format!("SKU {} already exists", product.sku))
        } else {
            AppError::Database(e)
        }
    })
}

// Handler to display the list of products with their stock on hand
pub async fn products_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let products = product_stock_lines(&state.db)
        .await
        .map_err(|e| server_error("Failed to load products", e))?;

    render(&ProductsTemplate { products, current_user: &current_user })
}

// Handler to show the form for creating a new product
pub async fn product_form(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !current_user.is_manager {
        return Err(StatusCode::FORBIDDEN);
    }

    render(&ProductFormTemplate {
        form: ProductForm {
            uom: "UNIT".to_string(),
            ..Default::default()
        },
        error: String::new(),
        current_user: &current_user,
    })
}

// Handler to create a new product
pub async fn create_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<ProductForm>,
) -> Result<Response, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !current_user.is_manager {
        return Err(StatusCode::FORBIDDEN);
    }

    let result = match form.to_new_product() {
        Ok(product) => insert_product(&state.db, &product).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(product) => {
            log::info!("{} created product {}", current_user.email, product.sku);
            Ok(Redirect::to("/products").into_response())
        }
        Err(e) if e.status_code().is_client_error() => {
            let page = render(&ProductFormTemplate {
                form,
                error: e.to_string(),
                current_user: &current_user,
            })?;
            Ok((e.status_code(), page).into_response())
        }
        Err(e) => Err(server_error("Failed to create product", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(sku: &str, min_stock: &str, price: &str) -> ProductForm {
        ProductForm {
            sku: sku.to_string(),
            name: "Steel Crate".to_string(),
            min_stock: min_stock.to_string(),
            price: price.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_product_input() {
        let product = form(" ab12 ", "", "19.90").to_new_product().unwrap();
        assert_eq!(product.sku, "AB12");
        assert_eq!(product.min_stock, 0);
        assert_eq!(product.uom, "UNIT");
        assert_eq!(product.price, Decimal::new(1990, 2));
        assert_eq!(product.category, None);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(form("A1", "-2", "1").to_new_product().is_err());
        assert!(form("A1", "3", "abc").to_new_product().is_err());
        assert!(form("A1", "3", "-1").to_new_product().is_err());
        assert!(form("", "3", "1").to_new_product().is_err());
    }

    #[test]
    fn bounds_price_to_the_column_range() {
        assert_eq!(
            form("A1", "3", "9999999999.99").to_new_product().unwrap().price,
            Decimal::new(999_999_999_999, 2)
        );

        let err = form("A1", "3", "10000000000").to_new_product().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Price cannot exceed 9999999999.99");
    }
}
