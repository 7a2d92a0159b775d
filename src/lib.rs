//! # Lexfuse
//!
//! A hybrid retrieval engine for legal documents.
//!
//! Lexfuse ingests contracts, statutes, and similar documents into two
//! retrieval backends at once — a vector index for semantic similarity and
//! a keyword index for exact lexical matches like "article 14" — then
//! answers queries by fusing both result sets into a single ranked list of
//! evidence, optionally passed to a chat model for a grounded answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Extract  │──▶│   Segment     │──▶│ Dual Indexer  │
//! │ pdf/docx │   │ 300w / 50w    │   │ embed+upsert  │
//! └──────────┘   └───────────────┘   └───┬───────┬───┘
//!                                        ▼       ▼
//!                                 ┌─────────┐ ┌─────────┐
//!                                 │ Vector  │ │ Keyword │
//!                                 │ (cosine)│ │ (boost) │
//!                                 └────┬────┘ └────┬────┘
//!                                      └────┬─────┘
//!                                           ▼
//!                                   ┌──────────────┐
//!                                   │ Fusion α=0.6 │──▶ answer
//!                                   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexf init                          # provision both indexes
//! lexf ingest lease.pdf              # extract, segment, dual-index
//! lexf search "article 14"           # fused evidence list
//! lexf ask "what is the notice period for termination?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Artifact scrubbing and whitespace/case normalization |
//! | [`segment`] | Sliding-window segmentation |
//! | [`terms`] | Citation/content term extraction, article labels |
//! | [`extract`] | PDF, DOCX, and plain-text extraction |
//! | [`ingest`] | Dual-backend ingestion pipeline |
//! | [`fusion`] | Score normalization, term boost, and fused ranking |
//! | [`answer`] | Evidence formatting and grounded answering |
//! | [`embedding`] | Embedding providers |
//! | [`generate`] | Chat-completion answer generation |
//! | [`traits`] | Capability traits for the external backends |
//! | [`store_pinecone`] | Pinecone vector store client |
//! | [`store_elastic`] | Elasticsearch keyword store client |
//! | [`store_memory`] | In-memory doubles for tests and local use |

pub mod answer;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fusion;
pub mod generate;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod segment;
pub mod store_elastic;
pub mod store_memory;
pub mod store_pinecone;
pub mod terms;
pub mod traits;
