//! Promotional images: upload handling and per-member personalisation.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops, DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use log::{info, warn};
use rusttype::{Font, Scale};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Cursor;

use crate::config::ImageConfig;
use crate::logic::error::LogicError;
use crate::model::{Id, MemberRecord, PromoImage, PromoImageView};
use crate::store::traits::PromoImageStore;

const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const NAME_OFFSET: u32 = 30;
const MOBILE_OFFSET: u32 = 100;
const SIDE_PADDING: i32 = 30;

fn parse_color(hex_color: &str) -> Result<Rgba<u8>> {
    let digits = hex_color.trim_start_matches('#');
    let bytes = hex::decode(digits).with_context(|| format!("invalid band colour {:?}", hex_color))?;
    match bytes.as_slice() {
        [r, g, b] => Ok(Rgba([*r, *g, *b, 255])),
        _ => Err(anyhow!("band colour must be RRGGBB, got {:?}", hex_color)),
    }
}

/// Draws the member band under a base image.
pub struct PromoRenderer {
    font: Option<Font<'static>>,
    band_height: u32,
    band_color: Rgba<u8>,
    scale: Scale,
}

impl PromoRenderer {
    /// Without `font_path` the renderer can extend images but not write text.
    pub fn from_config(config: &ImageConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read font {}", path))?;
                let font = Font::try_from_vec(bytes)
                    .ok_or_else(|| anyhow!("{} is not a usable TrueType font", path))?;
                Some(font)
            }
            None => None,
        };
        Ok(Self {
            font,
            band_height: config.band_height,
            band_color: parse_color(&config.band_color)?,
            scale: Scale::uniform(config.font_size),
        })
    }

    pub fn can_render_text(&self) -> bool {
        self.font.is_some()
    }

    /// Copy of `base` with an empty band of the configured colour underneath.
    pub fn extend_with_band(&self, base: &RgbaImage) -> RgbaImage {
        let (width, height) = base.dimensions();
        let mut canvas = RgbaImage::from_pixel(width, height + self.band_height, self.band_color);
        imageops::overlay(&mut canvas, base, 0, 0);
        canvas
    }

    fn draw_centered(&self, canvas: &mut RgbaImage, font: &Font<'static>, y: u32, text: &str) {
        let (text_width, _) = text_size(self.scale, font, text);
        let width = canvas.width() as i32;
        let x = ((width - text_width) / 2).max(SIDE_PADDING);
        draw_text_mut(canvas, TEXT_COLOR, x, y as i32, self.scale, font, text);
    }

    /// Personalised PNG: the base image with display name and mobile centred
    /// in the band.
    pub fn render(&self, base_bytes: &[u8], display_name: &str, mobile: &str) -> Result<Vec<u8>> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| LogicError::Unavailable("Image generation is not configured".into()))?;

        let base = image::load_from_memory(base_bytes)
            .context("stored promotional image could not be decoded")?
            .to_rgba8();
        let base_height = base.height();
        let mut canvas = self.extend_with_band(&base);

        self.draw_centered(&mut canvas, font, base_height + NAME_OFFSET, display_name);
        self.draw_centered(&mut canvas, font, base_height + MOBILE_OFFSET, mobile);

        encode_png(canvas)
    }
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)?;
    Ok(out)
}

/// Storage name for uploaded bytes: `promo-base-<digest>.<ext>`.
pub fn stored_filename(bytes: &[u8], original_name: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let extension = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string());
    format!("promo-base-{}.{}", &digest[..16], extension)
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_name: String,
}

pub async fn store_upload<S: PromoImageStore + ?Sized>(
    store: &S,
    upload: Upload,
    title: Option<String>,
    description: Option<String>,
    max_bytes: usize,
) -> Result<PromoImage> {
    if !upload.content_type.starts_with("image/") {
        return Err(LogicError::invalid("Only image files are allowed!").into());
    }
    if upload.bytes.is_empty() {
        return Err(LogicError::invalid("Please upload an image file").into());
    }
    if upload.bytes.len() > max_bytes {
        return Err(LogicError::invalid(format!(
            "Image exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        ))
        .into());
    }

    let image = PromoImage::new(
        stored_filename(&upload.bytes, &upload.original_name),
        upload.original_name,
        STANDARD.encode(&upload.bytes),
        upload.content_type,
        title,
        description,
    );
    store.upsert_promo_image(image.clone()).await?;
    info!("Stored promotional image {} as {}", image.id, image.filename);
    Ok(image)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_url: String,
    pub base64: String,
    pub user_friendly_filename: String,
    pub language: String,
    pub image_id: Id,
}

pub async fn generate<S: PromoImageStore + ?Sized>(
    store: &S,
    renderer: &PromoRenderer,
    member: &MemberRecord,
    image_id: &Id,
    language: &str,
) -> Result<GeneratedImage> {
    let mut image = store
        .get_promo_image(image_id)
        .await?
        .filter(|img| img.is_active)
        .ok_or_else(|| LogicError::not_found("Promotional image not found or not active"))?;

    let Some(data) = image.image_data.clone().filter(|d| !d.is_empty()) else {
        warn!("Promotional image {} has no data, deactivating it", image.id);
        image.is_active = false;
        image.updated_at = chrono::Utc::now();
        store.upsert_promo_image(image).await?;
        return Err(LogicError::not_found(
            "Image data not found. Please contact admin to re-upload this promotional image.",
        )
        .into());
    };

    if !renderer.can_render_text() {
        return Err(LogicError::Unavailable("Image generation is not configured".into()).into());
    }

    let base_bytes = STANDARD
        .decode(data.as_bytes())
        .context("stored promotional image is not valid Base64")?;
    let png = renderer.render(&base_bytes, member.label(), &member.mobile)?;
    let encoded = STANDARD.encode(&png);

    Ok(GeneratedImage {
        image_url: format!("data:image/png;base64,{}", encoded),
        base64: encoded,
        user_friendly_filename: format!("{}-{}-promotional.png", member.label(), language),
        language: language.to_string(),
        image_id: image_id.clone(),
    })
}

/// Active images that still carry data, as shown to members.
pub async fn public_images<S: PromoImageStore + ?Sized>(store: &S) -> Result<Vec<PromoImageView>> {
    Ok(store
        .list_promo_images(true)
        .await?
        .iter()
        .filter(|img| img.has_data())
        .map(PromoImage::view)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub orphaned_images_removed: usize,
    pub valid_images_remaining: usize,
    pub removed_images: Vec<PromoImageView>,
}

/// Remove image records that lost their data.
pub async fn cleanup_images<S: PromoImageStore + ?Sized>(store: &S) -> Result<CleanupReport> {
    let (orphaned, valid): (Vec<PromoImage>, Vec<PromoImage>) = store
        .list_promo_images(false)
        .await?
        .into_iter()
        .partition(|img| !img.has_data());

    for image in &orphaned {
        store.delete_promo_image(&image.id).await?;
    }

    Ok(CleanupReport {
        orphaned_images_removed: orphaned.len(),
        valid_images_remaining: valid.len(),
        removed_images: orphaned.iter().map(PromoImage::view).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, MemberType};
    use crate::store::MemoryStore;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        encode_png(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))).unwrap()
    }

    fn member() -> MemberRecord {
        MemberRecord::new(
            Collection::ChannelPartner,
            "Priya Shah".into(),
            "Priya".into(),
            "9123456789".into(),
            String::new(),
            Some(MemberType::ChannelPartner),
            None,
        )
    }

    fn upload(bytes: Vec<u8>, content_type: &str) -> Upload {
        Upload {
            bytes,
            content_type: content_type.to_string(),
            original_name: "Diwali.PNG".to_string(),
        }
    }

    #[test]
    fn test_band_extends_image() {
        let renderer = PromoRenderer::from_config(&ImageConfig::default()).unwrap();
        let base = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        let extended = renderer.extend_with_band(&base);

        assert_eq!(extended.dimensions(), (40, 200));
        assert_eq!(*extended.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        assert_eq!(*extended.get_pixel(5, 150), Rgba([0xd1, 0x7a, 0x22, 255]));
    }

    #[test]
    fn test_band_colour_parsing() {
        assert_eq!(parse_color("#000000").unwrap(), Rgba([0, 0, 0, 255]));
        assert!(parse_color("d17a").is_err());
        assert!(parse_color("zzzzzz").is_err());
    }

    #[test]
    fn test_stored_filename_uses_digest_and_extension() {
        let name = stored_filename(b"hello", "Diwali.PNG");
        assert_eq!(name, "promo-base-2cf24dba5fb0a30e.png");
        assert!(stored_filename(b"hello", "noext").ends_with(".png"));
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let store = MemoryStore::new();
        let err = store_upload(&store, upload(b"%PDF".to_vec(), "application/pdf"), None, None, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<LogicError>(), Some(LogicError::Invalid(_))));

        let err = store_upload(&store, upload(vec![0; 2048], "image/png"), None, None, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<LogicError>(), Some(LogicError::Invalid(_))));

        let stored = store_upload(&store, upload(png_bytes(4, 4), "image/png"), Some("Diwali".into()), None, 1024 * 1024)
            .await
            .unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.title, "Diwali");
        assert_eq!(public_images(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_deactivates_image_without_data() {
        let store = MemoryStore::new();
        let renderer = PromoRenderer::from_config(&ImageConfig::default()).unwrap();
        let mut image = PromoImage::new("a.png".into(), "a.png".into(), String::new(), "image/png".into(), None, None);
        image.image_data = None;
        store.upsert_promo_image(image.clone()).await.unwrap();

        let err = generate(&store, &renderer, &member(), &image.id, "en").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LogicError>(), Some(LogicError::NotFound(_))));
        assert!(!store.get_promo_image(&image.id).await.unwrap().unwrap().is_active);

        // Now inactive, so simply not found
        let err = generate(&store, &renderer, &member(), &image.id, "en").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LogicError>(), Some(LogicError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_generate_without_font_is_unavailable() {
        let store = MemoryStore::new();
        let renderer = PromoRenderer::from_config(&ImageConfig::default()).unwrap();
        let stored = store_upload(&store, upload(png_bytes(8, 8), "image/png"), None, None, 1024 * 1024)
            .await
            .unwrap();

        let err = generate(&store, &renderer, &member(), &stored.id, "en").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<LogicError>(), Some(LogicError::Unavailable(_))));
    }

    fn renderer_with_font() -> PromoRenderer {
        let config = ImageConfig {
            font_path: Some(
                concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fonts/DejaVuSansMono.ttf").to_string(),
            ),
            ..ImageConfig::default()
        };
        PromoRenderer::from_config(&config).unwrap()
    }

    #[test]
    fn test_render_writes_text_into_band() {
        let renderer = renderer_with_font();
        assert!(renderer.can_render_text());

        let png = renderer.render(&png_bytes(200, 40), "Priya", "9123456789").unwrap();
        let rendered = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(rendered.dimensions(), (200, 220));

        let band = Rgba([0xd1, 0x7a, 0x22, 255]);
        let inked = (40..220)
            .flat_map(|y| (0..200).map(move |x| (x, y)))
            .filter(|&(x, y)| *rendered.get_pixel(x, y) != band)
            .count();
        assert!(inked > 0);
        // Base image untouched
        assert_eq!(*rendered.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_generate_returns_personalised_png() {
        let store = MemoryStore::new();
        let renderer = renderer_with_font();
        let stored = store_upload(&store, upload(png_bytes(50, 40), "image/png"), None, None, 1024 * 1024)
            .await
            .unwrap();
        let mut long_name = member();
        long_name.display_name = "A very long display name that overflows".into();

        let generated = generate(&store, &renderer, &long_name, &stored.id, "en").await.unwrap();
        assert_eq!(
            generated.user_friendly_filename,
            "A very long display name that overflows-en-promotional.png"
        );
        assert_eq!(generated.language, "en");
        assert_eq!(generated.image_id, stored.id);
        assert!(generated.image_url.starts_with("data:image/png;base64,"));
        assert!(generated.image_url.ends_with(&generated.base64));

        let png = STANDARD.decode(generated.base64.as_bytes()).unwrap();
        let rendered = image::load_from_memory(&png).unwrap();
        assert_eq!((rendered.width(), rendered.height()), (50, 220));
    }

    #[tokio::test]
    async fn test_cleanup_removes_images_without_data() {
        let store = MemoryStore::new();
        store_upload(&store, upload(png_bytes(4, 4), "image/png"), None, None, 1024 * 1024)
            .await
            .unwrap();
        let mut empty = PromoImage::new("b.png".into(), "b.png".into(), String::new(), "image/png".into(), None, None);
        empty.image_data = None;
        store.upsert_promo_image(empty.clone()).await.unwrap();

        let report = cleanup_images(&store).await.unwrap();
        assert_eq!(report.orphaned_images_removed, 1);
        assert_eq!(report.valid_images_remaining, 1);
        assert_eq!(report.removed_images[0].id, empty.id);
        assert!(store.get_promo_image(&empty.id).await.unwrap().is_none());
    }
}
