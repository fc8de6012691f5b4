use sqlx::PgPool;

use crate::{
    error::Result,
    models::{Product, ProductForm},
};

pub async fn list_products(pool: &PgPool) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(products)
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(product)
}

pub async fn create_product(
    pool: &PgPool,
    form: &ProductForm,
    image: Option<&str>,
) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, description, price, image)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(form.price)
    .bind(image)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

/// Partial replace: absent fields keep their stored value. The image column is
/// only touched when the request carried a new file.
pub async fn update_product(
    pool: &PgPool,
    id: i32,
    form: &ProductForm,
    image: Option<&str>,
) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            price = COALESCE($3, price),
            image = COALESCE($4, image),
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(form.price)
    .bind(image)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn delete_product(pool: &PgPool, id: i32) -> Result<u64> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
