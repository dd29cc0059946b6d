//! Check command handler.
//!
//! Verifies that the chat-completions endpoint is reachable with the
//! configured credentials and that it serves the configured model.

use anyhow::{Context, Result};

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let llm = &ctx.settings.llm;
    if llm.api_key.is_none() {
        println!("⚠️  No API key set (VOXAGENT_API_KEY)");
    }

    let client = ctx.chat_client()?;
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Could not list models at {}", llm.base_url))?;

    println!("✓ Connected to {}", llm.base_url);
    if models.iter().any(|m| m == &llm.model) {
        println!("✓ Model '{}' is available", llm.model);
    } else {
        println!(
            "⚠️  Model '{}' is not listed ({} models available)",
            llm.model,
            models.len()
        );
        for model in &models {
            println!("   {model}");
        }
    }
    Ok(())
}
