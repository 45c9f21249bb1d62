//! `tcs browse`: an interactive carousel over search results.
//!
//! Reads one command per line and redraws the focused record after each.
//! A failed search keeps the previous results on screen, and the request
//! (query and page) they came from.
//!
//! | Command | Action |
//! |---------|--------|
//! | `n` / Enter | Next record |
//! | `p` | Previous record |
//! | `s <key>` | Sort: none, date, rating, confidence |
//! | `f <filter>` | Filter: none, active, type:<TypeName> |
//! | `]` / `[` | Next / previous page |
//! | `/ <query>` | New search with the same scope and filters |
//! | `d [n]` | Detail and associations of the focused record's n-th copy |
//! | `l` | List visible records |
//! | `h` | Show search history |
//! | `?` | Help |
//! | `q` | Quit |

use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::Utc;

use tc_search_core::backend::Backend;
use tc_search_core::detail;
use tc_search_core::models::SearchRequest;
use tc_search_core::session::SearchSession;
use tc_search_core::view::{Applied, SortKey, ViewController, ViewFilter};

use crate::client::HttpBackend;
use crate::config::Config;
use crate::history::{HistoryEntry, SearchHistory};
use crate::progress::SearchProgressReporter;
use crate::render;
use crate::search::{build_request, execute_with_progress, QueryArgs};

const HELP: &str = concat!(
    "n next  p prev  s <none|date|rating|confidence>  f <none|active|type:T>  ",
    "] next page  [ prev page  / <query>  d [n] detail  l list  h history  q quit"
);

/// Interactive session state.
pub struct Browser<'a, B: Backend + ?Sized> {
    config: &'a Config,
    backend: &'a B,
    progress: &'a dyn SearchProgressReporter,
    request: SearchRequest,
    view: ViewController,
    session: SearchSession,
    history: SearchHistory,
}

impl<'a, B: Backend + ?Sized> Browser<'a, B> {
    pub fn new(
        config: &'a Config,
        backend: &'a B,
        progress: &'a dyn SearchProgressReporter,
        request: SearchRequest,
    ) -> Result<Self> {
        Ok(Self {
            config,
            backend,
            progress,
            request,
            view: ViewController::new(config.sort_key()?),
            session: SearchSession::new(),
            history: SearchHistory::new(config.defaults.history_size),
        })
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Run the current request and load it if it is still the latest.
    pub async fn search<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.search_with(self.request.clone(), out).await
    }

    /// Run `request`. It replaces the current request only once its results
    /// are loaded.
    async fn search_with<W: Write>(&mut self, request: SearchRequest, out: &mut W) -> Result<()> {
        let ticket = self.session.begin();
        let result = execute_with_progress(&request, self.backend, self.progress).await;
        match self.view.apply(&ticket, result) {
            Applied::Loaded => {
                self.history.add(HistoryEntry::new(
                    request.query.clone(),
                    request.scope,
                    self.view.state().pagination.total,
                ));
                self.request = request;
                self.show_current(out)?;
            }
            Applied::Failed(e) => {
                writeln!(out, "error: {}", e)?;
            }
            Applied::Stale => {}
        }
        Ok(())
    }

    fn show_current<W: Write>(&self, out: &mut W) -> Result<()> {
        let state = self.view.state();
        match self.view.current() {
            Some(group) => write!(
                out,
                "{}",
                render::render_card(
                    group,
                    self.view.position(),
                    &self.config.ui.date_format,
                    Utc::now()
                )
            )?,
            None => writeln!(out, "No results.")?,
        }
        writeln!(
            out,
            "page {}/{}  sort {}  filter {}  ({} unique)",
            state.pagination.page + 1,
            state.pagination.total_pages.max(1),
            state.sort_key,
            state.active_filter,
            state.stats.total_count
        )?;
        Ok(())
    }

    /// Look up the `n`-th (1-based) copy of the focused record.
    async fn show_detail<W: Write>(&self, arg: &str, out: &mut W) -> Result<()> {
        let group = match self.view.current() {
            Some(group) => group,
            None => {
                writeln!(out, "no record selected")?;
                return Ok(());
            }
        };
        let index = if arg.is_empty() {
            1
        } else {
            match arg.parse::<usize>() {
                Ok(n) if (1..=group.members.len()).contains(&n) => n,
                _ => {
                    writeln!(out, "usage: d [1-{}]", group.members.len())?;
                    return Ok(());
                }
            }
        };
        let member = &group.members[index - 1];
        match detail::fetch_detail(self.backend, member.kind, member.id).await {
            Ok(detail) => write!(
                out,
                "{}",
                render::render_detail(&detail, &self.config.ui.date_format, Utc::now())
            )?,
            Err(e) => writeln!(out, "error: {}", e)?,
        }
        Ok(())
    }

    /// Handle one input line. Returns `false` when the user quits.
    pub async fn handle<W: Write>(&mut self, line: &str, out: &mut W) -> Result<bool> {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match cmd {
            "q" | "quit" | "exit" => return Ok(false),
            "" | "n" | "next" => {
                self.view.next();
                self.show_current(out)?;
            }
            "p" | "prev" => {
                self.view.previous();
                self.show_current(out)?;
            }
            "s" | "sort" => match arg.parse::<SortKey>() {
                Ok(key) => {
                    self.view.set_sort(key);
                    self.show_current(out)?;
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            "f" | "filter" => match arg.parse::<ViewFilter>() {
                Ok(filter) => {
                    self.view.set_filter(filter);
                    self.show_current(out)?;
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            "]" => {
                if self.view.state().pagination.has_next {
                    let next = self.request.at_page(self.request.page + 1);
                    self.search_with(next, out).await?;
                } else {
                    writeln!(out, "already on the last page")?;
                }
            }
            "[" => {
                if self.request.page > 0 {
                    let previous = self.request.at_page(self.request.page - 1);
                    self.search_with(previous, out).await?;
                } else {
                    writeln!(out, "already on the first page")?;
                }
            }
            "/" => {
                if arg.is_empty() {
                    writeln!(out, "usage: / <query>")?;
                } else {
                    let mut next = self.request.at_page(0);
                    next.query = arg.to_string();
                    self.search_with(next, out).await?;
                }
            }
            "d" | "detail" => self.show_detail(arg, out).await?,
            "l" | "list" => {
                write!(out, "{}", render::render_list(&self.view, Utc::now()))?;
            }
            "h" | "history" => {
                if self.history.is_empty() {
                    writeln!(out, "no searches yet")?;
                }
                for (i, e) in self.history.entries().enumerate() {
                    writeln!(
                        out,
                        "{:>3}. [{}] {}  ({} results)",
                        i + 1,
                        e.scope,
                        e.query,
                        e.result_count
                    )?;
                }
            }
            "?" | "help" => writeln!(out, "{}", HELP)?,
            other => writeln!(out, "unknown command '{}' (? for help)", other)?,
        }
        Ok(true)
    }

    /// Run the initial search, then process commands until `q` or EOF.
    pub async fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        self.search(out).await?;
        for line in input.lines() {
            let line = line?;
            if !self.handle(&line, out).await? {
                break;
            }
            out.flush()?;
        }
        Ok(())
    }
}

/// `tcs browse`: search, then read commands from stdin.
pub async fn run_browse(
    config: &Config,
    args: &QueryArgs,
    progress: &dyn SearchProgressReporter,
) -> Result<()> {
    let request = build_request(config, args)?;
    let backend = HttpBackend::from_config(config)?;
    let mut browser = Browser::new(config, &backend, progress, request)?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", HELP)?;
    browser.run(stdin.lock(), &mut stdout).await
}
