use commune_assistant::{
    image::{
        DESCRIPTION_REQUIRED, DOWNLOAD_FILE_NAME, DOWNLOAD_MIME_TYPE, IMAGE_CAPTION,
        NO_IMAGE_RETURNED,
    },
    ImageFlow, ImageOutcome, ReferenceImage,
};
use commune_sdk::{
    sdk_test::{MockImageResult, MockProvider},
    GenerationResponse, Part, ProviderError,
};
use reqwest::StatusCode;
use std::sync::Arc;

const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

fn image_flow(provider: &Arc<MockProvider>) -> ImageFlow {
    ImageFlow::new(provider.clone())
}

#[tokio::test]
async fn blank_description_issues_no_call() {
    let provider = Arc::new(MockProvider::new());
    let flow = image_flow(&provider);

    let outcome = flow.generate("  ", None).await;

    assert_eq!(
        outcome,
        ImageOutcome::Invalid {
            warning: DESCRIPTION_REQUIRED
        }
    );
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn first_image_is_selected_and_later_parts_ignored() {
    let provider = Arc::new(MockProvider::new());
    provider.enqueue_image(GenerationResponse {
        parts: vec![
            Part::text("Here is your poster."),
            Part::image("image/png", vec![1, 2, 3]),
            Part::text("Enjoy!"),
            Part::image("image/png", vec![9, 9, 9]),
        ],
        finish_reason: Some("STOP".to_string()),
    });
    let flow = image_flow(&provider);

    let outcome = flow.generate("Tết poster", None).await;

    let ImageOutcome::Generated(image) = outcome else {
        panic!("expected a generated image");
    };
    assert_eq!(image.data, vec![1, 2, 3]);
    assert_eq!(image.file_name, DOWNLOAD_FILE_NAME);
    assert_eq!(image.mime_type, DOWNLOAD_MIME_TYPE);
    assert_eq!(image.caption, IMAGE_CAPTION);
}

#[tokio::test]
async fn description_is_sent_alone_without_reference() {
    let provider = Arc::new(MockProvider::new());
    provider.enqueue_image(GenerationResponse::default());
    let flow = image_flow(&provider);

    flow.generate("A red lantern", None).await;

    assert_eq!(
        provider.tracked_image_inputs(),
        vec![vec![Part::text("A red lantern")]]
    );
}

#[tokio::test]
async fn reference_image_follows_description() {
    let provider = Arc::new(MockProvider::new());
    provider.enqueue_image(GenerationResponse::default());
    let flow = image_flow(&provider);
    let reference = ReferenceImage::from_bytes(JPEG.to_vec()).expect("valid jpeg");

    flow.generate("Same scene at night", Some(reference)).await;

    assert_eq!(
        provider.tracked_image_inputs(),
        vec![vec![
            Part::text("Same scene at night"),
            Part::image("image/jpeg", JPEG.to_vec()),
        ]]
    );
}

#[tokio::test]
async fn no_image_reports_warning_with_explanation() {
    let provider = Arc::new(MockProvider::new());
    provider.enqueue_image(GenerationResponse {
        parts: vec![Part::text("I can't create images of real people.")],
        finish_reason: Some("IMAGE_SAFETY".to_string()),
    });
    let flow = image_flow(&provider);

    let outcome = flow.generate("A portrait", None).await;

    assert_eq!(
        outcome,
        ImageOutcome::NoImage {
            warning: NO_IMAGE_RETURNED,
            explanation: "I can't create images of real people.".to_string(),
        }
    );
}

#[tokio::test]
async fn provider_failure_reports_diagnostic_and_hint() {
    let mut provider = MockProvider::new();
    provider.set_model_id("gemini-2.5-flash-image");
    let provider = Arc::new(provider);
    provider.enqueue_image(MockImageResult::error(ProviderError::StatusCode(
        StatusCode::FORBIDDEN,
        "permission denied for model".to_string(),
    )));
    let flow = image_flow(&provider);

    let outcome = flow.generate("A lotus pond", None).await;

    let ImageOutcome::Failed { diagnostic, hint } = outcome else {
        panic!("expected a failure");
    };
    assert!(diagnostic.contains("permission denied for model"));
    assert!(hint.contains("gemini-2.5-flash-image"));
    assert!(hint.contains("API key"));
}

#[tokio::test]
async fn each_attempt_is_independent() {
    let provider = Arc::new(MockProvider::new());
    provider
        .enqueue_image(MockImageResult::error(ProviderError::InvalidInput(
            "bad".to_string(),
        )))
        .enqueue_image(GenerationResponse {
            parts: vec![Part::image("image/png", vec![7])],
            finish_reason: None,
        });
    let flow = image_flow(&provider);

    let first = flow.generate("a boat", None).await;
    let second = flow.generate("a boat", None).await;

    assert!(matches!(first, ImageOutcome::Failed { .. }));
    assert!(matches!(second, ImageOutcome::Generated(_)));
    assert_eq!(provider.call_count(), 2);
}
