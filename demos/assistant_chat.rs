use std::io::{stdin, stdout, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use assistant_runner::{
    assistants::messages::Role, AssistantDirectory, CapabilityCatalog, CapabilityRegistry,
    Credentials, OpenAiClient, RunDriver, RunnerConfig, SessionContext,
};

// Usage: cargo run --example assistant_chat -- "<assistant name>"
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Make sure you have a file named `.env` with either `OPENAI_KEY` or the
    // `AZURE_OPENAI_*` variables defined!
    dotenvy::dotenv().ok();
    let credentials = if std::env::var("AZURE_OPENAI_KEY").is_ok() {
        Credentials::from_azure_env()
    } else {
        Credentials::from_env()
    };
    let config = RunnerConfig::from_env();

    let catalog = match &config.capability_spec_path {
        Some(path) => CapabilityCatalog::with_default(CapabilityRegistry::from_path(path)?),
        None => CapabilityCatalog::new(),
    };
    let catalog = Arc::new(catalog);
    let client = Arc::new(OpenAiClient::new(credentials)?);

    let directory = AssistantDirectory::new(client.clone(), catalog.clone(), config.model.clone());
    let Some(name) = std::env::args().nth(1) else {
        println!("Available assistants:");
        for summary in directory.summaries().await? {
            println!(
                "  {} ({})",
                summary.name.as_deref().unwrap_or("<unnamed>"),
                summary.id
            );
        }
        return Ok(());
    };
    let Some(assistant) = directory.find_by_name(&name).await? else {
        bail!("no assistant named `{name}`");
    };

    for starter in directory.conversation_starters(&assistant.id).await? {
        println!("Try: {starter}");
    }

    let driver = RunDriver::new(client, catalog, config, SessionContext::new())?;

    loop {
        print!("User: ");
        stdout().flush()?;

        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(path) = line.strip_prefix("/upload ") {
            let path = Path::new(path.trim());
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let local_id = path.canonicalize()?.display().to_string();

            let outcome = driver
                .upload_file(&assistant.id, &local_id, &filename, bytes)
                .await?;
            println!("Attached {} as {}", filename, outcome.file_id());
            continue;
        }

        match driver.run_thread(line, &assistant.id).await {
            Ok(messages) => {
                let reply = messages
                    .iter()
                    .rev()
                    .find(|message| message.role == Role::Assistant);
                if let Some(reply) = reply {
                    println!("{}: {}", assistant.display_name(), reply.value);
                }
            }
            Err(error) => eprintln!("Error: {error}"),
        }
    }
}
