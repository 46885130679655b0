use std::{env, sync::Arc};

use gateway::GatewayConfig;
use openai_api::OpenAIHandler;
use tracing::*;

const DEFAULT_ASSISTANT_ID: &str = "asst_OprZ49gQ0ckkTF8GoHKwtXDy";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();
    info!(
        "Starting... CARGO_PKG_NAME={}, CARGO_PKG_VERSION={}, version={}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("version").unwrap_or("(not defined at compile)")
    );

    let api_key = read_env_var("OPENAI_API_KEY");
    let assistant_id = env::var("ASSISTANT_RELAY_ASSISTANT_ID")
        .unwrap_or_else(|_| DEFAULT_ASSISTANT_ID.to_string());
    let model =
        env::var("ASSISTANT_RELAY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let addr = env::var("ASSISTANT_RELAY_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    let handler = Arc::new(OpenAIHandler::new(api_key, assistant_id, model));

    gateway::serve(&addr, handler, GatewayConfig::default()).await?;

    info!("Server stopped.");
    Ok(())
}

fn read_env_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("Expected env var: {}", name))
}
