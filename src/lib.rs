//! # Knowledge Assistant
//!
//! A retrieval-augmented question-answering service for enterprise
//! documentation: policies, incident reports, runbooks.
//!
//! Plain-text documents are split into overlapping chunks, embedded once
//! into a flat JSON index, and searched by cosine similarity at query time.
//! The best chunks ground an answer produced by a language model, and a
//! rule-based guardrail layer screens each request before and after
//! retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ docs_dir   │──▶│ Chunk+Embed  │──▶│ index.json   │
//! │ *.txt *.md │   │ (warmup)     │   │ Vec<Indexed> │
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │ cosine top-k
//!          ┌──────────────┐   ┌──────────────▼───┐   ┌───────────┐
//! ask ────▶│ pre_screen   │──▶│ Retriever.search │──▶│ relevance │──▶ prompt ──▶ LLM
//!          └──────────────┘   └──────────────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! ka index build                # embed ./data/docs into ./data/index.json
//! ka search "escalation policy"
//! ka ask "How fast must a P1 incident be escalated?"
//! ka serve                      # POST /v1/ask on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`index_store`] | Document scan, chunking, index file I/O |
//! | [`retriever`] | Single-flight warmup and similarity search |
//! | [`llm`] | OpenAI, Anthropic and Ollama providers |
//! | [`prompts`] | Versioned prompt templates |
//! | [`ask`] | Guardrailed question-answering pipeline |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! Pure logic (chunking, ranking, guardrails, traits, errors) lives in the
//! `knowledge-assistant-core` crate.

pub mod ask;
pub mod commands;
pub mod config;
pub mod index_store;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod retriever;
pub mod server;
