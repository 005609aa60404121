//! Purchase list and the current catalog view of its products

use rust_decimal::Decimal;
use sqlx::MySqlConnection;
use std::collections::HashMap;

use super::placeholders;
use crate::orders::{Catalog, CatalogSku, PurchaseListLine};
use crate::pricing::{ExclusionRule, ExclusionScope};

/// A user's purchase-list rows; `lock` takes them FOR UPDATE for checkout
///
/// An empty `ids` selects the whole list.
pub async fn purchase_lines(
    conn: &mut MySqlConnection,
    user_id: i64,
    ids: &[i64],
    lock: bool,
) -> Result<Vec<PurchaseListLine>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT id, product_id, spec_name, quantity FROM purchase_list_items WHERE user_id = ?",
    );
    if !ids.is_empty() {
        sql.push_str(&format!(" AND id IN ({})", placeholders(ids.len())));
    }
    sql.push_str(" ORDER BY id");
    if lock {
        sql.push_str(" FOR UPDATE");
    }

    let mut query = sqlx::query_as::<_, PurchaseListLine>(&sql).bind(user_id);
    for id in ids {
        query = query.bind(id);
    }
    query.fetch_all(conn).await
}

pub async fn delete_purchase_lines(
    conn: &mut MySqlConnection,
    user_id: i64,
    ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM purchase_list_items WHERE user_id = ? AND id IN ({})",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql).bind(user_id);
    for id in ids {
        query = query.bind(id);
    }
    Ok(query.execute(conn).await?.rows_affected())
}

#[derive(sqlx::FromRow)]
struct SkuRow {
    product_id: i64,
    product_name: String,
    spec_name: String,
    supplier_id: Option<i64>,
    cost_price: Decimal,
    wholesale_price: Decimal,
    retail_price: Decimal,
    delivery_weight: Decimal,
    exclusion_scope: Option<String>,
    exclusion_target_id: Option<i64>,
    min_quantity_for_free: Option<i32>,
    product_deleted: bool,
    spec_deleted: bool,
}

impl SkuRow {
    fn exclusion(&self) -> Option<ExclusionRule> {
        let scope = match self.exclusion_scope.as_deref()? {
            "product" => ExclusionScope::Product(self.product_id),
            "category" => ExclusionScope::Category(self.exclusion_target_id?),
            other => {
                tracing::warn!(product_id = self.product_id, scope = other, "Unknown exclusion scope");
                return None;
            }
        };
        Some(ExclusionRule {
            scope,
            min_quantity_for_free: self.min_quantity_for_free,
        })
    }
}

/// Current catalog entries for the given products, keyed by (product, spec)
pub async fn load_catalog(
    conn: &mut MySqlConnection,
    product_ids: &[i64],
) -> Result<Catalog, sqlx::Error> {
    let mut catalog = Catalog::new();
    if product_ids.is_empty() {
        return Ok(catalog);
    }

    let in_list = placeholders(product_ids.len());
    let sql = format!(
        r#"
        SELECT p.id AS product_id, p.name AS product_name, s.spec_name, p.supplier_id,
               s.cost_price, s.wholesale_price, s.retail_price, p.delivery_weight,
               p.exclusion_scope, p.exclusion_target_id, p.min_quantity_for_free,
               p.is_deleted AS product_deleted, s.is_deleted AS spec_deleted
        FROM products p
        JOIN product_specs s ON s.product_id = p.id
        WHERE p.id IN ({in_list})
        "#
    );
    let mut query = sqlx::query_as::<_, SkuRow>(&sql);
    for id in product_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let sql = format!(
        "SELECT product_id, category_id FROM product_categories WHERE product_id IN ({in_list}) ORDER BY product_id, category_id"
    );
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in product_ids {
        query = query.bind(id);
    }
    let mut categories: HashMap<i64, Vec<i64>> = HashMap::new();
    for (product_id, category_id) in query.fetch_all(&mut *conn).await? {
        categories.entry(product_id).or_default().push(category_id);
    }

    for row in rows {
        let exclusion = row.exclusion();
        catalog.insert(
            (row.product_id, row.spec_name.clone()),
            CatalogSku {
                product_id: row.product_id,
                category_ids: categories.get(&row.product_id).cloned().unwrap_or_default(),
                product_name: row.product_name,
                spec_name: row.spec_name,
                supplier_id: row.supplier_id,
                cost_price: row.cost_price,
                wholesale_price: row.wholesale_price,
                retail_price: row.retail_price,
                delivery_weight: row.delivery_weight,
                exclusion,
                is_deleted: row.product_deleted || row.spec_deleted,
            },
        );
    }
    Ok(catalog)
}
