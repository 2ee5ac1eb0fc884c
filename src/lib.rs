//! # Startup Radar
//!
//! Ingests startup investment data produced by a generative chat API and
//! merges it into a local store.
//!
//! For each investor (the *subject*), the upstream is asked for a
//! semicolon-delimited table in a fixed eleven-column layout. The table is
//! parsed into candidate records, which are merged into SQLite by startup
//! name: present fields overwrite, absent fields never do.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  Fetch   │──▶│  Parse   │──▶│  Merge   │──▶│  SQLite  │
//! │ (reqwest)│   │  (csv)   │   │  engine  │   │  (sqlx)  │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                   │
//!                              ┌────────────────────┤
//!                              ▼                    ▼
//!                         ┌──────────┐        ┌──────────┐
//!                         │   CLI    │        │   HTTP   │
//!                         │ (radar)  │        │  (axum)  │
//!                         └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! radar init                    # create database
//! radar sync                    # query every configured investor
//! radar sync --subject Kaszek   # query one investor
//! radar list --limit 20         # print stored startups
//! radar serve                   # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`error`] | Typed errors |
//! | [`models`] | Core data types |
//! | [`normalize`] | Field normalizers |
//! | [`parse`] | Table parsing |
//! | [`fetch`] | Completion API client |
//! | [`store`] | Storage abstraction (SQLite, in-memory) |
//! | [`merge`] | Name-keyed merge engine |
//! | [`pipeline`] | Batch and request-driven orchestration |
//! | [`server`] | HTTP server |
//! | [`list`] | `radar list` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod list;
pub mod logging;
pub mod merge;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod server;
pub mod store;
