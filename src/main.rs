//! # Sahayak CLI (`sahayak`)
//!
//! Command-line front end over the `sahayak_rag` library.
//!
//! ## Usage
//!
//! ```bash
//! sahayak --config ./config/sahayak.toml <command>
//! ```
//!
//! Without `--config` the built-in defaults are used: offline hashing
//! embeddings and no completion provider.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sahayak extract <pdf>` | Print the text layer of a PDF |
//! | `sahayak ask <pdf> <question>...` | Answer questions grounded in a PDF |
//! | `sahayak tutor <message>` | Route a message through the tutor |
//! | `sahayak calc <expression>` | Evaluate an arithmetic expression |
//!
//! ## Examples
//!
//! ```bash
//! sahayak ask chapter3.pdf "Photosynthesis ante enti?" "Daaniki emi kaavali?"
//! sahayak tutor --pdf chapter3.pdf "/summarize the water cycle"
//! sahayak calc "(12 + 8) * 3"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sahayak_rag::agent::{calc, DisabledSearch, SerperSearch, Tutor, WebSearch};
use sahayak_rag::config::{self, Config};
use sahayak_rag::extract;
use sahayak_rag::models::Document;
use sahayak_rag::pipeline::RagPipeline;
use sahayak_rag::session::DocumentSession;

/// Sahayak: grounded answers from a teacher's own PDFs.
#[derive(Parser)]
#[command(
    name = "sahayak",
    about = "Sahayak: document question answering for teachers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted text of a PDF.
    Extract {
        /// Path to the PDF file.
        pdf: PathBuf,
    },

    /// Index a PDF and answer one or more questions about it.
    ///
    /// Questions are asked in order within one session, so later questions
    /// see the earlier exchange.
    Ask {
        /// Path to the PDF file.
        pdf: PathBuf,

        /// Questions, each as its own argument.
        #[arg(required = true)]
        questions: Vec<String>,

        /// Print the retrieved chunks and their scores after each answer.
        #[arg(long)]
        sources: bool,
    },

    /// Send a message to the tutor (search, calculate, summarize, story, or
    /// document questions).
    Tutor {
        /// Message, optionally starting with /search, /calc, /summarize,
        /// /doc, or /story.
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        message: Vec<String>,

        /// Attach a PDF so questions are answered from it.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Evaluate an arithmetic expression.
    Calc {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        expression: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sahayak=info,sahayak_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Calc { expression } => {
            let value = calc::evaluate(&expression.join(" "))?;
            println!("{}", calc::format_value(value));
            return Ok(());
        }
        Commands::Extract { pdf } => {
            let text = extract::extract(&read_document(pdf)?)?;
            println!("{}", text);
            return Ok(());
        }
        _ => {}
    }

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Ask {
            pdf,
            questions,
            sources,
        } => {
            run_ask(&cfg, &pdf, &questions, sources).await?;
        }
        Commands::Tutor { message, pdf } => {
            run_tutor(&cfg, &message.join(" "), pdf.as_deref()).await?;
        }
        Commands::Calc { .. } | Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(filename, bytes))
}

async fn open_session(pipeline: Arc<RagPipeline>, pdf: &Path) -> anyhow::Result<DocumentSession> {
    let document = read_document(pdf)?;
    DocumentSession::open(pipeline, document)
        .await
        .with_context(|| format!("Failed to index {}", pdf.display()))
}

async fn run_ask(
    cfg: &Config,
    pdf: &Path,
    questions: &[String],
    show_sources: bool,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(cfg)?);
    let mut session = open_session(pipeline, pdf).await?;

    let mut outcome = Ok(());
    for question in questions {
        match session.ask(question).await {
            Ok(answer) => {
                println!("Q: {}", question);
                println!("A: {}", answer.text);
                if show_sources {
                    for source in &answer.sources {
                        let preview: String = source.chunk.text.chars().take(80).collect();
                        println!(
                            "   [chunk {} score {:.3}] {}",
                            source.chunk.index,
                            source.score,
                            preview.replace('\n', " ")
                        );
                    }
                }
                println!();
            }
            Err(e) => {
                outcome = Err(anyhow::Error::new(e).context(format!("Failed to answer: {}", question)));
                break;
            }
        }
    }

    session.close().await?;
    outcome
}

async fn run_tutor(cfg: &Config, message: &str, pdf: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(cfg)?);

    let web: Box<dyn WebSearch> = match SerperSearch::new(&cfg.tools) {
        Ok(serper) => Box::new(serper),
        Err(e) => {
            tracing::warn!(error = %e, "web search disabled");
            Box::new(DisabledSearch)
        }
    };

    let mut tutor = Tutor::new(pipeline.completer().clone(), web)
        .with_service_timeout(pipeline.params().service_timeout);
    if let Some(pdf) = pdf {
        tutor.attach(open_session(pipeline.clone(), pdf).await?);
    }

    let reply = tutor.respond(message).await;
    tutor.close().await?;
    println!("{}", reply?);
    Ok(())
}
