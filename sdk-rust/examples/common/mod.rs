use commune_sdk::{
    google::{GoogleModel, GoogleModelOptions},
    openai::{OpenAIChatModel, OpenAIChatModelOptions},
    ModelProvider,
};

pub fn get_provider(provider: &str, model_id: &str) -> Box<dyn ModelProvider> {
    match provider {
        "openai-compatible" => Box::new(OpenAIChatModel::new(
            model_id.to_string(),
            OpenAIChatModelOptions {
                base_url: Some(
                    "https://generativelanguage.googleapis.com/v1beta/openai/".to_string(),
                ),
                api_key: std::env::var("GOOGLE_API_KEY")
                    .expect("GOOGLE_API_KEY environment variable must be set"),
                ..Default::default()
            },
        )),
        "google" => Box::new(GoogleModel::new(
            model_id.to_string(),
            GoogleModelOptions {
                api_key: std::env::var("GOOGLE_API_KEY_VIP")
                    .expect("GOOGLE_API_KEY_VIP environment variable must be set"),
                ..Default::default()
            },
        )),
        _ => panic!("Unsupported provider: {provider}"),
    }
}
