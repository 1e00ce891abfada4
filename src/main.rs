use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gemini_bridge::gemini::{EmbedEndpoint, TaskType};
use gemini_bridge::http::{HttpClient, ReqwestHttpClient};
use gemini_bridge::universal::{
    ConversationEntry, GeminiChatDriver, TranslationDriver, UniversalChatRequest,
};
use gemini_bridge::GeminiConfig;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Debug, Parser)]
#[command(name = "gemini-bridge")]
#[command(about = "Talk to Gemini through the universal chat and embeddings schema")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one user message and print the reply.
    Chat {
        #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,

        /// System instruction; may be repeated.
        #[arg(long = "system")]
        system: Vec<String>,

        #[arg(long)]
        max_tokens: Option<i32>,

        #[arg(long)]
        temperature: Option<f64>,

        /// Print the full universal response as JSON.
        #[arg(long)]
        json: bool,

        prompt: String,
    },
    /// Embed texts and print a summary of the vector.
    Embed {
        #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
        model: String,

        #[arg(long, default_value = "RETRIEVAL_QUERY", value_parser = parse_task_type)]
        task_type: TaskType,

        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Embed each text on its own and print pairwise cosine similarity.
    Similarity {
        #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
        model: String,

        #[arg(required = true, num_args = 2..)]
        texts: Vec<String>,
    },
}

fn parse_task_type(input: &str) -> std::result::Result<TaskType, String> {
    input.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = GeminiConfig::from_env();
    if config.api_key().is_none() {
        error!("GEMINI_API_KEY is not set");
        bail!("GEMINI_API_KEY is not set");
    }

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    match args.command {
        Command::Chat {
            model,
            system,
            max_tokens,
            temperature,
            json,
            prompt,
        } => {
            let mut request = UniversalChatRequest::new(model, vec![ConversationEntry::user(prompt)]);
            request.system_instructions = system;
            request.max_tokens = max_tokens;
            request.temperature = temperature;

            let driver = GeminiChatDriver::new(config);
            let wire = driver.to_wire(request)?;
            info!("Sending chat request ({})", wire.debug_summary().model);
            let response = wire.post(client.as_ref()).await?;
            let universal = driver.from_wire(response)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&universal)?);
            } else {
                for choice in &universal.choices {
                    println!("{}", choice.message.content);
                }
            }
        }
        Command::Embed {
            model,
            task_type,
            texts,
        } => {
            let endpoint = EmbedEndpoint::new(&config, model, texts, task_type);
            let result = endpoint.handle(client).await?;
            println!("{}", serde_json::to_string_pretty(&result.to_summary())?);
        }
        Command::Similarity { model, texts } => {
            let vectors = embed_each(&config, &model, &texts, client).await?;
            for (i, j, score) in pairwise_similarity(&vectors) {
                println!("{:.4}\t{}\t{}", score, texts[i], texts[j]);
            }
        }
    }

    Ok(())
}

/// One independent embed flow per text, run concurrently. Results come back
/// in input order.
async fn embed_each(
    config: &GeminiConfig,
    model: &str,
    texts: &[String],
    client: Arc<dyn HttpClient>,
) -> Result<Vec<Vec<f64>>> {
    let mut tasks = JoinSet::new();
    for (index, text) in texts.iter().enumerate() {
        let endpoint = EmbedEndpoint::new(
            config,
            model,
            vec![text.clone()],
            TaskType::SemanticSimilarity,
        );
        let client = client.clone();
        tasks.spawn(async move { (index, endpoint.handle(client).await) });
    }

    let mut vectors = vec![Vec::new(); texts.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined?;
        let response = result?;
        match response.values() {
            Some(values) => vectors[index] = values.to_vec(),
            None => bail!("No embedding returned for '{}'", texts[index]),
        }
    }
    info!("Embedded {} texts", vectors.len());

    Ok(vectors)
}

fn pairwise_similarity(vectors: &[Vec<f64>]) -> Vec<(usize, usize, f64)> {
    let mut pairs = Vec::new();
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            if let Some(score) = gemini_bridge::vector::cosine_similarity(&vectors[i], &vectors[j])
            {
                pairs.push((i, j, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));
    pairs
}
