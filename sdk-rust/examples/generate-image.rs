use commune_sdk::Part;
use dotenvy::dotenv;
use std::fs;

mod common;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let provider = common::get_provider("google", "gemini-2.5-flash-image");

    let response = provider
        .generate_image(vec![Part::text(
            "A watercolor of a village meeting hall at sunrise",
        )])
        .await
        .expect("generate_image failed");

    if let Some(image) = response.first_image() {
        let ext = image.mime_type.split('/').nth(1).unwrap_or("png");
        let file_name = format!("meeting-hall.{ext}");
        fs::write(&file_name, &image.data).expect("failed to write image file");
        println!("Saved image to {file_name}");
    } else {
        eprintln!(
            "No image returned: {}",
            response
                .text()
                .or(response.finish_reason)
                .unwrap_or_default()
        );
    }
}
