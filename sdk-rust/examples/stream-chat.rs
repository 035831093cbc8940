use commune_sdk::{ChatMessage, StreamAccumulator};
use dotenvy::dotenv;
use futures::stream::StreamExt;
use std::io::Write;

mod common;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let provider = common::get_provider("openai-compatible", "gemini-2.5-flash");

    let mut stream = provider
        .stream_chat(vec![
            ChatMessage::system("You answer in one short paragraph."),
            ChatMessage::user("What documents are needed to register a birth?"),
        ])
        .await
        .unwrap();

    let mut accumulator = StreamAccumulator::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if let Some(delta) = &chunk.delta {
            print!("{delta}");
            std::io::stdout().flush().ok();
        }
        accumulator.add_chunk(&chunk);
    }

    println!();
    println!("Received {} chunks", accumulator.chunk_count());
}
