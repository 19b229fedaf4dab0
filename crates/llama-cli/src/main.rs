use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use llama_cli::{PredictError, Predictor, PredictorConfig};
use llama_runtime::ThreadedEngine;
use llama_tokenizer::{Tokenizer, WhitespaceTokenizer};

/// llama-predict: streaming completions from the command line
#[derive(Parser)]
#[command(name = "llama-cli")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Stream a completion for a prompt using the echo engine.
    Generate {
        /// Input prompt text.
        #[arg(short, long)]
        prompt: String,

        /// JSON predictor config; flags below override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of tokens to generate.
        #[arg(short, long)]
        max_new_tokens: Option<usize>,

        /// Sampling temperature (0 = greedy).
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Nucleus sampling threshold in (0, 1].
        #[arg(long)]
        top_p: Option<f32>,

        /// Top-k cutoff; 0 or -1 disables it.
        #[arg(long, allow_hyphen_values = true)]
        top_k: Option<i32>,

        #[arg(long)]
        presence_penalty: Option<f32>,

        #[arg(long)]
        frequency_penalty: Option<f32>,

        /// Template with a {prompt} placeholder.
        #[arg(long)]
        prompt_template: Option<String>,

        /// Stop string (repeatable).
        #[arg(long)]
        stop: Vec<String>,

        /// Stop token id (repeatable).
        #[arg(long)]
        stop_token_id: Vec<i32>,

        /// Print the full text so far on each step instead of deltas.
        #[arg(long)]
        no_incremental: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            prompt,
            config,
            max_new_tokens,
            temperature,
            top_p,
            top_k,
            presence_penalty,
            frequency_penalty,
            prompt_template,
            stop,
            stop_token_id,
            no_incremental,
        } => {
            let mut cfg = match config {
                Some(path) => match PredictorConfig::from_file(&path) {
                    Ok(cfg) => cfg,
                    Err(e) => {
                        eprintln!("error: {e}");
                        std::process::exit(1);
                    }
                },
                None => PredictorConfig::default(),
            };
            if let Some(n) = max_new_tokens {
                cfg = cfg.with_max_new_tokens(n);
            }
            if let Some(t) = temperature {
                cfg = cfg.with_temperature(t);
            }
            if let Some(p) = top_p {
                cfg = cfg.with_top_p(p);
            }
            if top_k.is_some() {
                cfg = cfg.with_top_k(top_k);
            }
            if let Some(p) = presence_penalty {
                cfg = cfg.with_presence_penalty(p);
            }
            if let Some(p) = frequency_penalty {
                cfg = cfg.with_frequency_penalty(p);
            }
            if let Some(template) = prompt_template {
                cfg = cfg.with_prompt_template(template);
            }
            if no_incremental {
                cfg = cfg.with_incremental(false);
            }
            if let Err(e) = cfg.validate() {
                eprintln!("error: {e}");
                std::process::exit(1);
            }

            let request = cfg
                .request(&prompt)
                .with_stop_sequences(stop)
                .with_stop_token_ids(stop_token_id);

            if let Err(e) = run(cfg, &request).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(
    cfg: PredictorConfig,
    request: &llama_sampling::GenerationRequest,
) -> Result<(), PredictError> {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer::new());
    let engine = Arc::new(ThreadedEngine::echo(Arc::clone(&tokenizer)));
    let incremental = cfg.incremental;
    let predictor = Predictor::new(engine, tokenizer, cfg);

    let mut fragments = predictor.predict_request(request)?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if incremental {
            write!(stdout, "{fragment}")?;
        } else {
            writeln!(stdout, "{fragment}")?;
        }
        stdout.flush()?;
    }
    if incremental {
        writeln!(stdout)?;
    }
    Ok(())
}
