//! `tcs show`: one record with its associated groups and indicators.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use tc_search_core::backend::Backend;
use tc_search_core::detail::{self, RecordDetail};
use tc_search_core::models::RecordKind;

use crate::client::HttpBackend;
use crate::config::Config;
use crate::render;

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Record kind: indicator or group.
    pub kind: RecordKind,

    /// Record id as reported in search results.
    pub id: i64,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Fetch a record and its associations.
pub async fn load_detail<B: Backend + ?Sized>(
    backend: &B,
    kind: RecordKind,
    id: i64,
) -> Result<RecordDetail> {
    detail::fetch_detail(backend, kind, id)
        .await
        .with_context(|| format!("Failed to load {} {}", kind, id))
}

pub fn write_detail<W: Write>(
    out: &mut W,
    detail: &RecordDetail,
    config: &Config,
    json: bool,
) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(detail)?)?;
    } else {
        write!(
            out,
            "{}",
            render::render_detail(detail, &config.ui.date_format, Utc::now())
        )?;
    }
    Ok(())
}

pub async fn run_show(config: &Config, args: &ShowArgs) -> Result<()> {
    let backend = HttpBackend::from_config(config)?;
    let detail = load_detail(&backend, args.kind, args.id).await?;
    write_detail(&mut std::io::stdout(), &detail, config, args.json)
}
