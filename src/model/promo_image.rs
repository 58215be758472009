use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMO_TITLE: &str = "Promotional Event";

/// Admin-uploaded base image. The image bytes are stored Base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoImage {
    pub id: Id,
    pub filename: String,
    pub original_name: String,
    pub image_data: Option<String>,
    pub mime_type: Option<String>,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoImage {
    pub fn new(
        filename: String,
        original_name: String,
        image_data: String,
        mime_type: String,
        title: Option<String>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            filename,
            original_name,
            image_data: Some(image_data),
            mime_type: Some(mime_type),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROMO_TITLE.to_string()),
            description: description.unwrap_or_default(),
            is_active: true,
            event_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_data(&self) -> bool {
        self.image_data.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// `data:` URL of the stored image, if any.
    pub fn data_url(&self) -> Option<String> {
        let data = self.image_data.as_deref().filter(|d| !d.is_empty())?;
        let mime = self.mime_type.as_deref().unwrap_or("image/png");
        Some(format!("data:{};base64,{}", mime, data))
    }

    pub fn view(&self) -> PromoImageView {
        PromoImageView {
            id: self.id.clone(),
            filename: self.filename.clone(),
            original_name: self.original_name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            is_active: self.is_active,
            event_date: self.event_date,
            created_at: self.created_at,
            image_url: self.data_url(),
        }
    }
}

/// Promo image as listed over the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoImageView {
    pub id: Id,
    pub filename: String,
    pub original_name: String,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
}
