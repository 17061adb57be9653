//! # Sahayak RAG
//!
//! Document question answering for the Sahayak teaching assistant.
//!
//! A teacher uploads a PDF; the pipeline extracts its text, splits it into
//! overlapping windows, embeds them into an index that lives only as long
//! as the teacher's session, and answers questions in English, Telugu,
//! Hindi, or code-mixed speech using only what the document says.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌────────────────┐
//! │ extract  │──▶│  chunk  │──▶│ embedding │──▶│ DocumentIndex  │
//! │ PDF→text │   │ windows │   │ provider  │   │ sqlite / memory│
//! └──────────┘   └─────────┘   └───────────┘   └───────┬────────┘
//!                                                      │ top-k
//!                     ┌────────────────────────────────┘
//!                     ▼
//!               ┌───────────┐   ┌────────────┐
//!  question ───▶│  compose  │──▶│ completion │──▶ answer
//!               └───────────┘   └────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sahayak_rag::config::Config;
//! use sahayak_rag::models::Document;
//! use sahayak_rag::pipeline::RagPipeline;
//! use sahayak_rag::session::DocumentSession;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pipeline = Arc::new(RagPipeline::from_config(&Config::default())?);
//! let bytes = std::fs::read("chapter3.pdf")?;
//! let mut session = DocumentSession::open(pipeline, Document::new("chapter3.pdf", bytes)).await?;
//! let answer = session.ask("Photosynthesis ante enti?").await?;
//! println!("{}", answer.text);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed pipeline errors |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Overlapping fixed-size chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector storage backends |
//! | [`index`] | Session-scoped document index |
//! | [`language`] | Question language heuristics |
//! | [`compose`] | Grounded prompt construction |
//! | [`completion`] | Language-model completion providers |
//! | [`pipeline`] | Build and ask orchestration |
//! | [`session`] | Per-document conversation |
//! | [`agent`] | Tutor capability router |

pub mod agent;
pub mod chunk;
pub mod completion;
pub mod compose;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
mod http;
pub mod index;
pub mod language;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod store;

pub use error::{RagError, RagResult};
