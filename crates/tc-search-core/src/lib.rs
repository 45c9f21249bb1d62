//! # tc-search core
//!
//! The search and aggregation engine behind the `tcs` terminal client.
//!
//! This crate performs no network or filesystem I/O of its own. The calling
//! application supplies a [`Backend`](backend::Backend) implementation (the
//! HTTP client lives in the `tc-search` crate) and renders the resulting
//! [`ViewState`](view::ViewState).
//!
//! ```text
//!  input ──▶ query (+ detect) ──▶ search::execute ──▶ Backend
//!                                        │
//!                                        ▼
//!                               aggregate::aggregate
//!                                        │
//!                                        ▼
//!                               view::ViewController ──▶ UI
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`detect`] | Indicator type inference from raw strings |
//! | [`query`] | TQL construction, escaping and validation |
//! | [`backend`] | Backend trait, typed backend errors, in-memory backend |
//! | [`search`] | Single/combined scope orchestration |
//! | [`aggregate`] | Case-insensitive grouping and result statistics |
//! | [`view`] | Carousel cursor, client-side sort and filter |
//! | [`detail`] | Single-record lookup with associations |
//! | [`session`] | Search generations for discarding stale results |

pub mod aggregate;
pub mod backend;
pub mod detail;
pub mod detect;
pub mod models;
pub mod query;
pub mod search;
pub mod session;
pub mod view;
