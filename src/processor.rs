use crate::error::AppError;
use crate::extraction::DocumentExtractor;
use crate::metadata::{detect_mime_type, read_image_metadata, ImageMetadata, DEFAULT_MIME_TYPE};
use crate::receipt::{normalize, NormalizedRecord};
use crate::timestamp::{resolve_master_timestamp, MasterTimestamp};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub success: bool,
    pub receipt: NormalizedRecord,
    pub master_timestamp: Option<MasterTimestamp>,
    pub metadata: ImageMetadata,
}

/// Result of the offline half of the pipeline.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageInspection {
    pub mime_type: String,
    pub master_timestamp: Option<MasterTimestamp>,
    pub metadata: ImageMetadata,
}

/// Standard alphabet, padding optional on decode.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Drops a `data:image/...;base64,` prefix if the client sent a data URL.
fn strip_data_url(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    match trimmed.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => trimmed,
    }
}

/// Reads metadata and MIME type from the encoded image. Undecodable input is
/// not an error here; extraction still gets the original content.
fn inspect_encoded(content_b64: &str) -> (ImageMetadata, String) {
    let compact: String = content_b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match LENIENT_BASE64.decode(compact) {
        Ok(bytes) => (read_image_metadata(&bytes), detect_mime_type(&bytes)),
        Err(e) => {
            log::warn!("Failed to decode base64 image for EXIF parsing: {}", e);
            (ImageMetadata::empty(), DEFAULT_MIME_TYPE.to_string())
        }
    }
}

pub fn inspect_image(bytes: &[u8]) -> ImageInspection {
    let metadata = read_image_metadata(bytes);
    let master_timestamp = resolve_master_timestamp(&metadata, &NormalizedRecord::default());
    ImageInspection {
        mime_type: detect_mime_type(bytes),
        master_timestamp,
        metadata,
    }
}

pub async fn process_receipt(
    extractor: &dyn DocumentExtractor,
    base64_image: &str,
) -> Result<ReceiptResponse, AppError> {
    let content = strip_data_url(base64_image);
    if content.is_empty() {
        return Err(AppError::MissingImage);
    }

    log::info!("Processing receipt image ({} base64 bytes)", content.len());
    let (metadata, mime_type) = inspect_encoded(content);
    log::debug!("Image metadata: {:?}", metadata);

    let fields = extractor.extract_fields(content, &mime_type).await?;
    let receipt = normalize(&fields);
    log::debug!(
        "Normalized {} fields (timestamp: {}, reference: {})",
        receipt.data.len(),
        receipt.has_timestamp,
        receipt.has_reference
    );

    let master_timestamp = resolve_master_timestamp(&metadata, &receipt);
    log::info!("Receipt processed, master timestamp: {:?}", master_timestamp);

    Ok(ReceiptResponse {
        success: true,
        receipt,
        master_timestamp,
        metadata,
    })
}
