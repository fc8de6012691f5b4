use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::{
    error::{AppError, Result},
    models::{Product, ProductForm},
    queries::product_queries,
    services::UploadStore,
    AppState,
};

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = product_queries::list_products(&state.db).await?;

    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Product>> {
    let product = product_queries::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>)> {
    let form = read_form(&state.uploads, multipart).await?;

    if form.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        discard_staged(&state.uploads, &form).await;
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    if form.price.is_none() {
        discard_staged(&state.uploads, &form).await;
        return Err(AppError::BadRequest("price is required".to_string()));
    }

    let image = form.image.as_ref().map(|s| s.public_path.as_str());

    match product_queries::create_product(&state.db, &form, image).await {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(e) => {
            discard_staged(&state.uploads, &form).await;
            Err(e)
        }
    }
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let form = read_form(&state.uploads, multipart).await?;

    if let Some(name) = &form.name {
        if name.trim().is_empty() {
            discard_staged(&state.uploads, &form).await;
            return Err(AppError::BadRequest("name must not be empty".to_string()));
        }
    }

    let old = match product_queries::find_by_id(&state.db, id).await {
        Ok(Some(old)) => old,
        Ok(None) => {
            discard_staged(&state.uploads, &form).await;
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        Err(e) => {
            discard_staged(&state.uploads, &form).await;
            return Err(e);
        }
    };

    let image = form.image.as_ref().map(|s| s.public_path.as_str());

    match product_queries::update_product(&state.db, id, &form, image).await {
        Ok(Some(product)) => {
            // Row committed with the new path; the superseded file can go.
            if form.image.is_some() {
                if let Some(old_image) = &old.image {
                    state.uploads.remove(old_image).await;
                }
            }
            Ok(Json(product))
        }
        Ok(None) => {
            // Deleted between the lookup and the update.
            discard_staged(&state.uploads, &form).await;
            Err(AppError::NotFound("Product not found".to_string()))
        }
        Err(e) => {
            discard_staged(&state.uploads, &form).await;
            Err(e)
        }
    }
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>> {
    let deleted = product_queries::delete_product(&state.db, id).await?;

    if deleted == 0 {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    // The associated file is intentionally left in place.
    Ok(Json(json!({ "message": "Product deleted" })))
}

async fn discard_staged(store: &UploadStore, form: &ProductForm) {
    if let Some(staged) = &form.image {
        store.discard(staged).await;
    }
}

/// Reads the multipart fields of a create/update request. An attached `image`
/// file is staged in the store immediately; if a later field fails to parse the
/// staged file is discarded before the error propagates.
async fn read_form(store: &UploadStore, mut multipart: Multipart) -> Result<ProductForm> {
    let mut form = ProductForm::default();

    match fill_form(store, &mut form, &mut multipart).await {
        Ok(()) => Ok(form),
        Err(e) => {
            discard_staged(store, &form).await;
            Err(e)
        }
    }
}

async fn fill_form(
    store: &UploadStore,
    form: &mut ProductForm,
    multipart: &mut Multipart,
) -> Result<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "name" => form.name = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "price" => {
                let raw = field.text().await?;
                form.price = Some(parse_price(&raw)?);
            }
            "image" => {
                // Browsers send an empty filename for an untouched file input.
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if file_name.is_empty() {
                    continue;
                }

                let bytes = field.bytes().await?;
                form.image = Some(store.stage(&file_name, &bytes).await?);
            }
            _ => {}
        }
    }

    Ok(())
}

fn parse_price(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(AppError::BadRequest("price is required".to_string()));
    }

    raw.parse::<Decimal>()
        .map_err(|_| AppError::BadRequest(format!("price must be a number, got '{}'", raw)))
}
