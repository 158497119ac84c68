//! Model upload and estimate handlers.
//!
//! Upload metadata is kept in the session; the bytes live in the
//! [`UploadStore`](crate::services::uploads::UploadStore) until they expire.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use filamento_core::cart::check_quantity;
use filamento_core::pricing::{FillTier, Material, MaterialQuote, quote_estimate};

use crate::error::{AppError, Result};
use crate::models::session::keys;
use crate::services::print_service::ModelFile;
use crate::services::uploads::{UploadConfiguration, UploadError, UploadedFile};
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Uploads recorded in the session, oldest first.
pub(crate) async fn load_uploads(session: &Session) -> Result<Vec<UploadedFile>> {
    Ok(session
        .get::<Vec<UploadedFile>>(keys::UPLOADS)
        .await?
        .unwrap_or_default())
}

async fn save_uploads(session: &Session, uploads: &[UploadedFile]) -> Result<()> {
    session.insert(keys::UPLOADS, uploads).await?;
    Ok(())
}

/// Find an upload by id.
pub(crate) fn find_upload(uploads: &[UploadedFile], id: Uuid) -> Result<&UploadedFile> {
    uploads
        .iter()
        .find(|u| u.id == id)
        .ok_or(AppError::Upload(UploadError::NotFound))
}

fn multipart_error(e: &axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Envio inválido: {}", e.body_text()))
}

// =============================================================================
// Upload Routes
// =============================================================================

/// Parts read from an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<(String, Bytes)>,
    thumbnails: Vec<String>,
}

/// Read every `file` part and every `thumbnail` part, in order.
async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("modelo.stl").to_owned();
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                form.files.push((name, bytes));
            }
            Some("thumbnail") => {
                let thumbnail = field.text().await.map_err(|e| multipart_error(&e))?;
                form.thumbnails.push(thumbnail);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Upload one or more model files.
///
/// POST /api/uploads (multipart: `file`, optional `thumbnail` per file)
#[instrument(skip(state, session, multipart))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<UploadedFile>>)> {
    let form = read_upload_form(&mut multipart).await?;
    if form.files.is_empty() {
        return Err(AppError::BadRequest("Nenhum arquivo enviado".to_owned()));
    }

    // Reject the whole batch before storing anything
    for (name, bytes) in &form.files {
        state.uploads().validate(name, bytes.len())?;
    }

    let mut thumbnails = form.thumbnails.into_iter();
    let mut created = Vec::with_capacity(form.files.len());
    for (name, bytes) in form.files {
        let thumbnail = thumbnails.next().filter(|t| !t.is_empty());
        created.push(state.uploads().insert(&name, bytes, thumbnail).await?);
    }

    let mut uploads = load_uploads(&session).await?;
    uploads.extend(created.iter().cloned());
    save_uploads(&session, &uploads).await?;

    tracing::info!(count = created.len(), "Models uploaded");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/uploads
pub async fn index(session: Session) -> Result<Json<Vec<UploadedFile>>> {
    Ok(Json(load_uploads(&session).await?))
}

/// Set print options for an upload.
///
/// PUT /api/uploads/{id}
#[instrument(skip(session, config))]
pub async fn configure(
    session: Session,
    Path(id): Path<Uuid>,
    Json(config): Json<UploadConfiguration>,
) -> Result<Json<UploadedFile>> {
    let mut uploads = load_uploads(&session).await?;
    let upload = uploads
        .iter_mut()
        .find(|u| u.id == id)
        .ok_or(AppError::Upload(UploadError::NotFound))?;

    upload.configure(config)?;
    let updated = upload.clone();
    save_uploads(&session, &uploads).await?;

    Ok(Json(updated))
}

/// DELETE /api/uploads/{id}
#[instrument(skip(state, session))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut uploads = load_uploads(&session).await?;
    let before = uploads.len();
    uploads.retain(|u| u.id != id);
    if uploads.len() == before {
        return Err(UploadError::NotFound.into());
    }

    save_uploads(&session, &uploads).await?;
    state.uploads().remove(id).await;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Quotes
// =============================================================================

/// Options for a quote. Missing values come from the upload's configuration.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    pub fill: Option<FillTier>,
    pub quantity: Option<u32>,
}

/// Prices for one model in every material.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    pub fill: FillTier,
    pub quantity: u32,
    pub quotes: Vec<MaterialQuote>,
}

fn valid_quantity(quantity: u32) -> Result<u32> {
    check_quantity(quantity).map_err(|_| UploadError::InvalidQuantity.into())
}

/// Quote an uploaded model in every material.
///
/// POST /api/uploads/{id}/quote?fill=medium&quantity=2
#[instrument(skip(state, session))]
pub async fn quote(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>> {
    let uploads = load_uploads(&session).await?;
    let upload = find_upload(&uploads, id)?;

    let fill = query.fill.or(upload.fill).unwrap_or_default();
    let quantity = valid_quantity(query.quantity.unwrap_or(upload.quantity))?;
    let file = state.uploads().get(id).await?;

    let quotes = state.print_service().quote_all(&file, fill, quantity).await;

    Ok(Json(QuoteResponse {
        file_id: Some(id),
        fill,
        quantity,
        quotes,
    }))
}

/// Fields of a one-shot estimate form.
#[derive(Debug)]
struct EstimateForm {
    file: Option<ModelFile>,
    fill: FillTier,
    material: Option<Material>,
    quantity: u32,
}

async fn read_estimate_form(multipart: &mut Multipart) -> Result<EstimateForm> {
    let mut form = EstimateForm {
        file: None,
        fill: FillTier::default(),
        material: None,
        quantity: 1,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "file" | "stl_file" => {
                let file_name = field.file_name().unwrap_or("modelo.stl").to_owned();
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                form.file = Some(ModelFile {
                    name: file_name,
                    bytes,
                });
            }
            "fill" => {
                let value = field.text().await.map_err(|e| multipart_error(&e))?;
                form.fill = parse_fill(&value)?;
            }
            "material" => {
                let value = field.text().await.map_err(|e| multipart_error(&e))?;
                form.material = Some(
                    value
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("Material inválido: {value}")))?,
                );
            }
            "quantity" => {
                let value = field.text().await.map_err(|e| multipart_error(&e))?;
                form.quantity = value
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest("Quantidade inválida".to_owned()))?;
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_fill(value: &str) -> Result<FillTier> {
    let value = value.trim();
    FillTier::ALL
        .into_iter()
        .find(|f| f.as_str().eq_ignore_ascii_case(value) || f.percent().to_string() == value)
        .ok_or_else(|| AppError::BadRequest(format!("Preenchimento inválido: {value}")))
}

/// Estimate a model without keeping it.
///
/// POST /api/estimate (multipart: `file`, optional `fill`, `material`, `quantity`)
///
/// With `material` the answer holds that material only; otherwise every
/// material is quoted.
#[instrument(skip(state, multipart))]
pub async fn estimate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<QuoteResponse>> {
    let form = read_estimate_form(&mut multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("Nenhum arquivo enviado".to_owned()))?;
    state.uploads().validate(&file.name, file.bytes.len())?;
    let quantity = valid_quantity(form.quantity)?;

    let quotes = match form.material {
        Some(material) => {
            let estimate = state
                .print_service()
                .estimate(&file, form.fill, material, quantity)
                .await?;
            vec![quote_estimate(
                &estimate,
                material,
                quantity,
                state.print_service().rates(),
            )]
        }
        None => {
            state
                .print_service()
                .quote_all(&file, form.fill, quantity)
                .await
        }
    };

    Ok(Json(QuoteResponse {
        file_id: None,
        fill: form.fill,
        quantity,
        quotes,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use filamento_core::cart::MAX_QUANTITY;

    use super::*;

    #[test]
    fn test_parse_fill_accepts_names_and_percentages() {
        assert_eq!(parse_fill("high").unwrap(), FillTier::High);
        assert_eq!(parse_fill(" Solid ").unwrap(), FillTier::Solid);
        assert_eq!(parse_fill("25").unwrap(), FillTier::Low);
        assert_eq!(parse_fill("0").unwrap(), FillTier::Hollow);
        assert!(parse_fill("30").is_err());
    }

    #[test]
    fn test_valid_quantity() {
        assert_eq!(valid_quantity(3).unwrap(), 3);
        assert!(matches!(
            valid_quantity(0),
            Err(AppError::Upload(UploadError::InvalidQuantity))
        ));
    }

    #[test]
    fn test_find_upload() {
        let id = Uuid::new_v4();
        let uploads = vec![UploadedFile {
            id,
            name: "suporte.stl".to_owned(),
            size_bytes: 10,
            quantity: 1,
            fill: None,
            material: None,
            color: None,
            thumbnail: None,
            is_configured: false,
        }];
        assert_eq!(find_upload(&uploads, id).unwrap().name, "suporte.stl");
        assert!(matches!(
            find_upload(&uploads, Uuid::new_v4()),
            Err(AppError::Upload(UploadError::NotFound))
        ));
    }
}
