//! # tc-search
//!
//! A terminal client for searching a ThreatConnect-style threat-intelligence
//! API. Free text is turned into TQL, indicators and groups are fetched
//! (concurrently when both are requested), duplicate values reported by
//! several owners are merged, and the result is shown as a table, JSON, or
//! an interactive carousel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│ tc-search-core │──▶│ HttpBackend  │──▶ /indicators
//! │  (tcs)   │   │ query + search │   │ HMAC-signed  │──▶ /groups
//! └────┬─────┘   └───────┬────────┘   └──────────────┘
//!      │                 ▼
//!      │         ┌────────────────┐
//!      └────────▶│ aggregate+view │──▶ table / JSON / browse
//!                └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tcs init                          # write ./config/tcs.toml
//! tcs detect 8.8.8.8                # Address
//! tcs query evil.com                # print the TQL
//! tcs search evil.com --sort rating
//! tcs browse APT29 --scope groups
//! tcs show group 10                 # record detail and associations
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`auth`] | HMAC request signing |
//! | [`client`] | HTTP implementation of the search backend |
//! | [`search`] | `query` and `search` commands |
//! | [`browse`] | Interactive carousel |
//! | [`show`] | Record detail with associations |
//! | [`history`] | In-memory search history |
//! | [`render`] | Text formatting for results |
//! | [`progress`] | Progress reporting on stderr |

pub mod auth;
pub mod browse;
pub mod client;
pub mod config;
pub mod history;
pub mod progress;
pub mod render;
pub mod search;
pub mod show;
