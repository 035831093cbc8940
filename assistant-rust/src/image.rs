use crate::AssistantError;
use commune_sdk::{GenerationResponse, ModelProvider, Part};
use serde::Serialize;
use std::sync::Arc;

pub const DESCRIPTION_REQUIRED: &str = "Please enter a description of the image you want to create.";
pub const NO_IMAGE_RETURNED: &str =
    "The model did not return an image. Please try again with a different description.";
pub const DOWNLOAD_FILE_NAME: &str = "generated_image.png";
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";
pub const IMAGE_CAPTION: &str = "Image generated by AI.";

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// An uploaded image sent along with the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    mime_type: &'static str,
    data: Vec<u8>,
}

impl ReferenceImage {
    /// Accept PNG or JPEG bytes, detected from the file signature.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, AssistantError> {
        let mime_type = if data.starts_with(PNG_SIGNATURE) {
            "image/png"
        } else if data.starts_with(JPEG_SIGNATURE) {
            "image/jpeg"
        } else {
            return Err(AssistantError::InvalidInput(
                "reference image must be a PNG or JPEG file".to_string(),
            ));
        };
        Ok(Self { mime_type, data })
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn into_part(self) -> Part {
        Part::image(self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub caption: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The description was blank; nothing was sent.
    Invalid { warning: &'static str },
    Generated(GeneratedImage),
    /// The call succeeded but carried no image. `explanation` is whatever the
    /// model said instead.
    NoImage {
        warning: &'static str,
        explanation: String,
    },
    Failed { diagnostic: String, hint: String },
}

/// Single-shot image generation from a description and an optional reference.
pub struct ImageFlow {
    provider: Arc<dyn ModelProvider>,
}

impl ImageFlow {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate(
        &self,
        description: &str,
        reference: Option<ReferenceImage>,
    ) -> ImageOutcome {
        if description.trim().is_empty() {
            return ImageOutcome::Invalid {
                warning: DESCRIPTION_REQUIRED,
            };
        }

        let mut parts = vec![Part::text(description)];
        if let Some(reference) = reference {
            parts.push(reference.into_part());
        }

        tracing::info!(
            model = %self.provider.model_id(),
            parts = parts.len(),
            "requesting image generation"
        );

        match self.provider.generate_image(parts).await {
            Ok(response) => select_image(response),
            Err(error) => {
                tracing::error!(%error, "image generation failed");
                ImageOutcome::Failed {
                    diagnostic: format!(
                        "Sorry, an error occurred while generating the image: {error}"
                    ),
                    hint: format!(
                        "Make sure your API key has access to the '{}' model and that the uploaded image is not corrupted.",
                        self.provider.model_id()
                    ),
                }
            }
        }
    }
}

/// Take the first image part of the response, ignoring everything after it.
fn select_image(response: GenerationResponse) -> ImageOutcome {
    if let Some(image) = response.first_image() {
        tracing::info!(bytes = image.data.len(), mime_type = %image.mime_type, "image generated");
        return ImageOutcome::Generated(GeneratedImage {
            data: image.data.clone(),
            file_name: DOWNLOAD_FILE_NAME,
            mime_type: DOWNLOAD_MIME_TYPE,
            caption: IMAGE_CAPTION,
        });
    }

    let explanation = response
        .text()
        .or(response.finish_reason)
        .unwrap_or_default();
    tracing::warn!(%explanation, "model returned no image");
    ImageOutcome::NoImage {
        warning: NO_IMAGE_RETURNED,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_image_sniffs_png_and_jpeg() {
        let png_header = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n', 0];
        let png = ReferenceImage::from_bytes(png_header).unwrap();
        assert_eq!(png.mime_type(), "image/png");

        let jpeg = ReferenceImage::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        assert_eq!(jpeg.mime_type(), "image/jpeg");
        assert_eq!(jpeg.data(), &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn reference_image_rejects_other_bytes() {
        assert!(matches!(
            ReferenceImage::from_bytes(b"GIF89a".to_vec()),
            Err(AssistantError::InvalidInput(_))
        ));
        assert!(ReferenceImage::from_bytes(Vec::new()).is_err());
    }

    #[test]
    fn explanation_falls_back_to_finish_reason() {
        let outcome = select_image(GenerationResponse {
            parts: Vec::new(),
            finish_reason: Some("SAFETY".to_string()),
        });

        assert_eq!(
            outcome,
            ImageOutcome::NoImage {
                warning: NO_IMAGE_RETURNED,
                explanation: "SAFETY".to_string(),
            }
        );
    }

    #[test]
    fn explanation_is_empty_without_text_or_reason() {
        let outcome = select_image(GenerationResponse::default());

        assert!(matches!(
            outcome,
            ImageOutcome::NoImage { explanation, .. } if explanation.is_empty()
        ));
    }
}
