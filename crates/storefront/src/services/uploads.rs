//! Uploaded model files.
//!
//! Metadata lives in the session as [`UploadedFile`]. The bytes are only
//! needed to call the estimation service, so they sit in a `moka` cache
//! keyed by upload id and expire after an hour; nothing is persisted.

use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use filamento_core::cart::{MAX_QUANTITY, check_quantity};
use filamento_core::pricing::{FillTier, Material};

use crate::services::print_service::ModelFile;

/// Model formats the slicer accepts.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["stl", "obj", "3mf"];

/// Largest thumbnail (a data URL rendered by the browser) kept in the session.
pub const MAX_THUMBNAIL_BYTES: usize = 256 * 1024;

/// Upper bound on the bytes held across all uploads.
const CACHE_CAPACITY_BYTES: u64 = 1024 * 1024 * 1024;

const FILE_TTL: Duration = Duration::from_secs(60 * 60);

/// Upload failures, with messages shown to the buyer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Formato não suportado: {0}. Envie arquivos .stl, .obj ou .3mf")]
    UnsupportedExtension(String),
    #[error("Arquivo muito grande (máximo de {max_mb} MB)")]
    TooLarge { max_mb: usize },
    #[error("Arquivo vazio")]
    Empty,
    #[error("Miniatura muito grande")]
    ThumbnailTooLarge,
    #[error("Arquivo não encontrado")]
    NotFound,
    #[error("O arquivo expirou, envie novamente")]
    Expired,
    #[error("Quantidade deve estar entre 1 e {}", MAX_QUANTITY)]
    InvalidQuantity,
    #[error("Configure preenchimento, material e cor antes de continuar")]
    NotConfigured,
}

/// Metadata for one uploaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: u64,
    pub quantity: u32,
    pub fill: Option<FillTier>,
    pub material: Option<Material>,
    pub color: Option<String>,
    /// Preview image as a data URL.
    pub thumbnail: Option<String>,
    pub is_configured: bool,
}

/// Print options chosen for an upload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfiguration {
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub fill: Option<FillTier>,
    #[serde(default)]
    pub material: Option<Material>,
    #[serde(default)]
    pub color: Option<String>,
}

impl UploadedFile {
    /// Apply a configuration and refresh `is_configured`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidQuantity`] for a quantity outside
    /// `1..=MAX_QUANTITY`.
    pub fn configure(&mut self, config: UploadConfiguration) -> Result<(), UploadError> {
        if let Some(quantity) = config.quantity {
            self.quantity = check_quantity(quantity).map_err(|_| UploadError::InvalidQuantity)?;
        }
        if let Some(fill) = config.fill {
            self.fill = Some(fill);
        }
        if let Some(material) = config.material {
            self.material = Some(material);
        }
        if let Some(color) = config.color {
            let color = color.trim();
            self.color = (!color.is_empty()).then(|| color.to_owned());
        }

        self.is_configured = self.quantity >= 1
            && self.fill.is_some()
            && self.material.is_some()
            && self.color.is_some();
        Ok(())
    }

    /// Fill, material and color of a configured upload.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotConfigured`] otherwise.
    pub fn selection(&self) -> Result<(FillTier, Material, &str), UploadError> {
        match (self.is_configured, self.fill, self.material, self.color.as_deref()) {
            (true, Some(fill), Some(material), Some(color)) => Ok((fill, material, color)),
            _ => Err(UploadError::NotConfigured),
        }
    }
}

/// Lowercase extension if it is one of [`ALLOWED_EXTENSIONS`].
fn allowed_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// In-memory store for upload bytes.
#[derive(Clone)]
pub struct UploadStore {
    files: Cache<Uuid, ModelFile>,
    max_bytes: usize,
}

impl UploadStore {
    /// Create a store accepting files up to `max_bytes`.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        let files = Cache::builder()
            .weigher(|_id: &Uuid, file: &ModelFile| {
                u32::try_from(file.bytes.len()).unwrap_or(u32::MAX)
            })
            .max_capacity(CACHE_CAPACITY_BYTES)
            .time_to_live(FILE_TTL)
            .build();

        Self { files, max_bytes }
    }

    /// Largest accepted file in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check a file name and size before accepting it.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] for an unsupported extension, an empty file or
    /// a file over the limit.
    pub fn validate(&self, name: &str, size: usize) -> Result<(), UploadError> {
        if allowed_extension(name).is_none() {
            let ext = name.rsplit_once('.').map_or("", |(_, e)| e);
            return Err(UploadError::UnsupportedExtension(ext.to_owned()));
        }
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_mb: self.max_bytes / (1024 * 1024),
            });
        }
        Ok(())
    }

    /// Store a file and return its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] if the file or the thumbnail is rejected.
    pub async fn insert(
        &self,
        name: &str,
        bytes: Bytes,
        thumbnail: Option<String>,
    ) -> Result<UploadedFile, UploadError> {
        self.validate(name, bytes.len())?;
        if thumbnail.as_ref().is_some_and(|t| t.len() > MAX_THUMBNAIL_BYTES) {
            return Err(UploadError::ThumbnailTooLarge);
        }

        let id = Uuid::new_v4();
        let size_bytes = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        self.files
            .insert(
                id,
                ModelFile {
                    name: name.to_owned(),
                    bytes,
                },
            )
            .await;

        Ok(UploadedFile {
            id,
            name: name.to_owned(),
            size_bytes,
            quantity: 1,
            fill: None,
            material: None,
            color: None,
            thumbnail,
            is_configured: false,
        })
    }

    /// Bytes of an upload.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Expired`] once the bytes have been evicted.
    pub async fn get(&self, id: Uuid) -> Result<ModelFile, UploadError> {
        self.files.get(&id).await.ok_or(UploadError::Expired)
    }

    /// Drop the bytes of an upload.
    pub async fn remove(&self, id: Uuid) {
        self.files.invalidate(&id).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> UploadStore {
        UploadStore::new(1024)
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert_eq!(allowed_extension("Peça.STL").as_deref(), Some("stl"));
        assert_eq!(allowed_extension("modelo.3mf").as_deref(), Some("3mf"));
        assert!(allowed_extension("foto.png").is_none());
        assert!(allowed_extension("semextensao").is_none());
    }

    #[test]
    fn test_validate_limits() {
        let store = store();
        assert_eq!(store.validate("a.stl", 0), Err(UploadError::Empty));
        assert!(matches!(
            store.validate("a.stl", 2048),
            Err(UploadError::TooLarge { .. })
        ));
        assert_eq!(
            store.validate("a.gcode", 10),
            Err(UploadError::UnsupportedExtension("gcode".to_owned()))
        );
        assert!(store.validate("a.obj", 1024).is_ok());
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = store();
        let file = store
            .insert("cubo.stl", Bytes::from_static(b"solid cubo"), None)
            .await
            .unwrap();
        assert_eq!(file.size_bytes, 10);
        assert_eq!(file.quantity, 1);
        assert!(!file.is_configured);

        assert_eq!(store.get(file.id).await.unwrap().name, "cubo.stl");
        store.remove(file.id).await;
        assert_eq!(store.get(file.id).await.unwrap_err(), UploadError::Expired);
    }

    #[tokio::test]
    async fn test_configure_sets_flag_only_when_complete() {
        let store = store();
        let mut file = store
            .insert("vaso.stl", Bytes::from_static(b"solid vaso"), None)
            .await
            .unwrap();

        file.configure(UploadConfiguration {
            fill: Some(FillTier::Low),
            material: Some(Material::Petg),
            ..Default::default()
        })
        .unwrap();
        assert!(!file.is_configured);
        assert_eq!(file.selection(), Err(UploadError::NotConfigured));

        file.configure(UploadConfiguration {
            color: Some("Vermelho".to_owned()),
            quantity: Some(4),
            ..Default::default()
        })
        .unwrap();
        assert!(file.is_configured);
        assert_eq!(file.quantity, 4);
        assert_eq!(
            file.selection().unwrap(),
            (FillTier::Low, Material::Petg, "Vermelho")
        );

        assert_eq!(
            file.configure(UploadConfiguration {
                quantity: Some(0),
                ..Default::default()
            }),
            Err(UploadError::InvalidQuantity)
        );
        assert_eq!(
            file.configure(UploadConfiguration {
                quantity: Some(u32::MAX),
                ..Default::default()
            }),
            Err(UploadError::InvalidQuantity)
        );
        assert_eq!(file.quantity, 4);

        file.configure(UploadConfiguration {
            color: Some("  ".to_owned()),
            ..Default::default()
        })
        .unwrap();
        assert!(!file.is_configured);
    }
}
