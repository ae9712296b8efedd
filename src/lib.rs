//! # Profile Harness
//!
//! Acquires social-media profiles from a prioritized chain of providers,
//! reconciles them into a canonical schema, and tags each visual asset with
//! pixel-level heuristics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │  Providers  │──▶│  Resolver  │──▶│ Normalizer │──▶│Reconciler│──▶ Store
//! │apify/direct/│   │ first hit  │   │ synonyms + │   │ replace +│   (SQLite)
//! │   sample    │   │    wins    │   │ photo/video│   │  stats   │
//! └─────────────┘   └────────────┘   └────────────┘   └──────────┘
//!
//!  image bytes ──▶ Feature Extractor ──▶ Tag Classifier ──▶ (tags, vibe, quality)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! phx init                      # create database
//! phx refresh someone           # fetch and store a profile
//! phx show someone              # profile with live aggregates
//! phx analyze 12                # tag one stored media item
//! phx serve                     # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Contract-violation errors |
//! | [`traits`] | Provider trait and registry |
//! | [`provider_apify`] | Managed scraping service provider |
//! | [`provider_direct`] | Direct public-page provider |
//! | [`provider_sample`] | Bundled sample dataset provider |
//! | [`resolver`] | Ordered, short-circuiting provider chain |
//! | [`normalize`] | Schema normalization and photo/video disambiguation |
//! | [`reconcile`] | Full-replace refresh and engagement statistics |
//! | [`features`] | Image feature extraction |
//! | [`classify`] | Threshold classifiers over features |
//! | [`store`] | Storage trait and in-memory store |
//! | [`sqlite_store`] | SQLite store |
//! | [`refresh`] | Refresh and profile-view orchestration |
//! | [`analyze`] | Per-item enrichment and image fetching |
//! | [`sources`] | Provider status listing |
//! | [`server`] | HTTP JSON API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analyze;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod provider_apify;
pub mod provider_direct;
pub mod provider_sample;
pub mod reconcile;
pub mod refresh;
pub mod resolver;
pub mod server;
pub mod sources;
pub mod sqlite_store;
pub mod store;
pub mod traits;
