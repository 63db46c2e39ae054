use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use prompt_search_core::{bootstrap, CoreRuntime, SearchSettings, SearchStatus, SessionState};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "prompt-search",
    version,
    about = "Search prompts and queries on the prompt search service from the shell."
)]
struct Cli {
    /// Settings file (TOML). Defaults to `settings.toml` in the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the search service base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Preferred renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators while requests are in flight.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Fetch autocomplete suggestions for a partial query.
    Suggest { partial: String },
    /// Run a single search and print the highlighted hits.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Report the health of the search service.
    Health,
    /// Drive the search box line by line from stdin (`:help` lists commands).
    Interactive,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }

    fn runtime(&self) -> Result<CoreRuntime> {
        let mut settings = SearchSettings::load(self.config.as_deref())?;
        if let Some(base_url) = &self.base_url {
            settings = settings.with_base_url(base_url.clone());
        }
        bootstrap(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }
    let renderer = Renderer::new(cli.format, !cli.no_color);

    match &cli.command {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "prompt-search", &mut std::io::stdout());
            Ok(())
        }
        Command::Suggest { partial } => {
            handle_suggest(partial, &cli, &renderer, &cli.runtime()?).await
        }
        Command::Search { query } => {
            handle_search(&query.join(" "), &cli, &renderer, &cli.runtime()?).await
        }
        Command::Health => handle_health(&cli, &renderer, &cli.runtime()?).await,
        Command::Interactive => interactive::run(&cli, &renderer, &cli.runtime()?).await,
    }
}

async fn handle_suggest(
    partial: &str,
    cli: &Cli,
    renderer: &Renderer,
    runtime: &CoreRuntime,
) -> Result<()> {
    let fetcher = runtime.fetcher();
    let partial = partial.trim();

    let suggestions = if fetcher.meets_threshold(partial) {
        let spinner = spinner(
            cli.progress_enabled(),
            format!("Looking up suggestions for `{partial}`..."),
        );
        let fetched = fetcher.fetch(partial).await.unwrap_or_default();
        finish_spinner(spinner, None);
        fetched
    } else {
        info!(
            target: "prompt_search_cli",
            min_query_len = fetcher.options().min_query_len,
            "input below suggestion threshold"
        );
        Vec::new()
    };

    if cli.quiet {
        return Ok(());
    }
    print!("{}", renderer.suggestions(partial, &suggestions)?);
    Ok(())
}

async fn handle_search(
    query: &str,
    cli: &Cli,
    renderer: &Renderer,
    runtime: &CoreRuntime,
) -> Result<()> {
    let mut coordinator = runtime.coordinator();
    if coordinator.submit(query).is_none() {
        bail!("search query must not be blank");
    }

    let spinner = spinner(
        cli.progress_enabled(),
        format!("Searching for `{}`...", query.trim()),
    );
    let state = coordinator.settle().await.clone();
    finish_spinner(spinner, search_summary(&state));

    let failed = state.status == SearchStatus::Failed;
    if !cli.quiet || failed {
        print!("{}", renderer.session(&state, &state.rows())?);
    }
    if failed {
        let error = state
            .error
            .ok_or_else(|| anyhow!("search for `{}` failed", query.trim()))?;
        return Err(anyhow::Error::new(error).context(format!("search for `{}` failed", query.trim())));
    }
    Ok(())
}

async fn handle_health(cli: &Cli, renderer: &Renderer, runtime: &CoreRuntime) -> Result<()> {
    let client = runtime.client();
    let spinner = spinner(cli.progress_enabled(), "Checking search service health...");
    let result = client.health().await;
    finish_spinner(spinner, None);

    let report = result.with_context(|| format!("health check against {} failed", client.base_url()))?;
    if !cli.quiet {
        print!("{}", renderer.health(&report)?);
    }
    if !report.is_healthy() {
        bail!("search service reports status `{}`", report.status);
    }
    Ok(())
}

/// Spinner completion line for a finished search; failures clear the spinner instead.
fn search_summary(state: &SessionState) -> Option<String> {
    let results = state.results.as_ref().filter(|_| state.status == SearchStatus::Loaded)?;
    Some(format!(
        "{} results for `{}` in {}ms",
        results.total,
        state.active_query.as_deref().unwrap_or_default(),
        results.took_millis
    ))
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let default_directives = if cli.quiet {
        "error"
    } else {
        "warn,prompt_search_cli=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(progress) = spinner {
        if let Some(msg) = message {
            progress.finish_with_message(msg);
        } else {
            progress.finish_and_clear();
        }
    }
}


mod interactive {
    use anyhow::{anyhow, bail, Context, Result};
    use prompt_search_core::{CoreRuntime, InputEvent, InputHub, SearchApp};
    use tokio::io::{AsyncBufReadExt, BufReader};

    use crate::output::Renderer;
    use crate::progress::spinner;
    use crate::{finish_spinner, Cli};

    const HELP: &str = "\
Type text to edit the search box. Commands:
  :down :up        move the suggestion selection
  :enter           search the selection or the typed text
  :esc             hide the suggestions
  :clear           reset the search box
  :focus :blur     focus the box or click outside it
  :pick N          click suggestion N
  :retry           retry a failed search
  :quit            leave";

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LineCommand {
        Event(InputEvent),
        Pick(usize),
        Retry,
        Help,
        Quit,
    }

    /// Plain lines replace the search text; lines starting with `:` are commands.
    pub fn parse_line(line: &str) -> Result<LineCommand> {
        let Some(command) = line.strip_prefix(':') else {
            return Ok(LineCommand::Event(InputEvent::TextChanged(line.to_string())));
        };

        let mut words = command.split_whitespace();
        let parsed = match words.next().unwrap_or_default() {
            "down" => LineCommand::Event(InputEvent::ArrowDown),
            "up" => LineCommand::Event(InputEvent::ArrowUp),
            "enter" => LineCommand::Event(InputEvent::Enter),
            "esc" => LineCommand::Event(InputEvent::Escape),
            "clear" => LineCommand::Event(InputEvent::ClearInvoked),
            "focus" => LineCommand::Event(InputEvent::FocusGained),
            "blur" => LineCommand::Event(InputEvent::ClickOutside),
            "pick" => {
                let position: usize = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: :pick N"))?
                    .parse()
                    .context("`:pick` expects a suggestion number")?;
                if position == 0 {
                    bail!("suggestions are numbered from 1");
                }
                LineCommand::Pick(position)
            }
            "retry" => LineCommand::Retry,
            "help" => LineCommand::Help,
            "quit" | "q" => LineCommand::Quit,
            other => bail!("unknown command `:{other}` (try `:help`)"),
        };
        Ok(parsed)
    }

    pub async fn run(cli: &Cli, renderer: &Renderer, runtime: &CoreRuntime) -> Result<()> {
        let hub = InputHub::new();
        let mut app = runtime.mount(&hub);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        if !cli.quiet {
            eprintln!("Type to search, `:help` lists commands.");
        }

        while let Some(line) = lines.next_line().await? {
            let command = match parse_line(line.trim_end_matches('\r')) {
                Ok(command) => command,
                Err(error) => {
                    eprintln!("{error:#}");
                    continue;
                }
            };

            match command {
                LineCommand::Event(event) => {
                    hub.publish(&event);
                }
                LineCommand::Pick(position) => {
                    let picked = app
                        .controller()
                        .state()
                        .suggestions
                        .get(position - 1)
                        .map(|item| item.text.clone());
                    let Some(text) = picked else {
                        eprintln!("no suggestion #{position}");
                        continue;
                    };
                    hub.publish(&InputEvent::SuggestionClicked(text));
                }
                LineCommand::Retry => {
                    if !app.retry() {
                        eprintln!("nothing to retry");
                        continue;
                    }
                }
                LineCommand::Help => {
                    eprintln!("{HELP}");
                    continue;
                }
                LineCommand::Quit => break,
            }

            app.drain_input();
            settle(&mut app, cli).await;
            if !cli.quiet {
                print!("{}", renderer.snapshot(&app.snapshot())?);
            }
        }
        Ok(())
    }

    async fn settle(app: &mut SearchApp, cli: &Cli) {
        let progress = if app.session().is_loading() {
            spinner(cli.progress_enabled(), "Searching...")
        } else {
            None
        };
        app.settle().await;
        finish_spinner(progress, None);
    }

}

mod output {
    use std::fmt::Write;

    use anyhow::Result;
    use clap::ValueEnum;
    use prompt_search_client::{HealthReport, SuggestionItem};
    use prompt_search_core::{AppSnapshot, ResultRow, SearchStatus, SessionState, Span};
    use serde_json::json;

    const BOLD: &str = "\u{1b}[1m";
    const RESET: &str = "\u{1b}[0m";

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        Json,
        Markdown,
        Text,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
        color: bool,
    }

    impl Renderer {
        pub fn new(format: OutputFormat, color: bool) -> Self {
            Self { format, color }
        }

        pub fn suggestions(&self, partial: &str, suggestions: &[SuggestionItem]) -> Result<String> {
            let mut out = String::new();
            match self.format {
                OutputFormat::Json => {
                    let payload = json!({ "query": partial, "suggestions": suggestions });
                    writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
                }
                OutputFormat::Markdown => {
                    if suggestions.is_empty() {
                        writeln!(out, "_No suggestions for `{partial}`._")?;
                    }
                    for item in suggestions {
                        writeln!(out, "- {}", item.text)?;
                    }
                }
                OutputFormat::Text => {
                    if suggestions.is_empty() {
                        writeln!(out, "No suggestions for \"{partial}\".")?;
                    }
                    for (index, item) in suggestions.iter().enumerate() {
                        writeln!(out, "{}. {}", index + 1, item.text)?;
                    }
                }
            }
            Ok(out)
        }

        pub fn session(&self, state: &SessionState, rows: &[ResultRow]) -> Result<String> {
            let mut out = String::new();
            if self.format == OutputFormat::Json {
                let payload = json!({ "session": state, "rows": rows });
                writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            } else {
                self.write_session(&mut out, state, rows)?;
            }
            Ok(out)
        }

        /// The search box, its dropdown, and the current results.
        pub fn snapshot(&self, snapshot: &AppSnapshot) -> Result<String> {
            let mut out = String::new();
            let interaction = &snapshot.interaction;
            match self.format {
                OutputFormat::Json => {
                    writeln!(out, "{}", serde_json::to_string_pretty(snapshot)?)?;
                    return Ok(out);
                }
                OutputFormat::Markdown => {
                    writeln!(out, "**Search:** `{}`", interaction.input_text)?;
                    if interaction.dropdown_visible && !interaction.suggestions.is_empty() {
                        writeln!(out)?;
                        for (index, item) in interaction.suggestions.iter().enumerate() {
                            if interaction.selected_index == Some(index) {
                                writeln!(out, "{}. **{}** (selected)", index + 1, item.text)?;
                            } else {
                                writeln!(out, "{}. {}", index + 1, item.text)?;
                            }
                        }
                    }
                }
                OutputFormat::Text => {
                    writeln!(out, "search: {}", interaction.input_text)?;
                    if interaction.dropdown_visible {
                        for (index, item) in interaction.suggestions.iter().enumerate() {
                            let marker = if interaction.selected_index == Some(index) {
                                '>'
                            } else {
                                ' '
                            };
                            writeln!(out, "{marker} {}. {}", index + 1, item.text)?;
                        }
                    }
                }
            }
            writeln!(out)?;
            self.write_session(&mut out, &snapshot.session, &snapshot.rows)?;
            Ok(out)
        }

        pub fn health(&self, report: &HealthReport) -> Result<String> {
            let mut out = String::new();
            let connected = if report.elasticsearch_connected {
                "connected"
            } else {
                "disconnected"
            };
            let cluster = report.cluster_name.as_deref().unwrap_or("n/a");
            let cluster_health = report.cluster_health.as_deref().unwrap_or("n/a");
            match self.format {
                OutputFormat::Json => {
                    writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
                }
                OutputFormat::Markdown => {
                    writeln!(out, "| Property | Value |")?;
                    writeln!(out, "| --- | --- |")?;
                    writeln!(out, "| Status | {} |", report.status)?;
                    writeln!(out, "| Elasticsearch | {connected} |")?;
                    writeln!(out, "| Cluster | `{cluster}` |")?;
                    writeln!(out, "| Cluster health | {cluster_health} |")?;
                }
                OutputFormat::Text => {
                    writeln!(out, "Status: {}", report.status)?;
                    writeln!(out, "Elasticsearch: {connected}")?;
                    writeln!(out, "Cluster: {cluster} ({cluster_health})")?;
                }
            }
            Ok(out)
        }

        fn write_session(
            &self,
            out: &mut String,
            state: &SessionState,
            rows: &[ResultRow],
        ) -> std::fmt::Result {
            let query = state.active_query.as_deref().unwrap_or_default();
            match state.status {
                SearchStatus::Idle => return writeln!(out, "No search yet."),
                SearchStatus::Loading => return writeln!(out, "Searching for \"{query}\"..."),
                SearchStatus::Failed => {
                    if let Some(error) = &state.error {
                        writeln!(out, "Search for \"{query}\" failed: {}", error.message)?;
                        if error.is_retryable() {
                            writeln!(out, "The problem may be temporary; retry the search.")?;
                        }
                    }
                }
                SearchStatus::Loaded => {}
            }

            let Some(results) = &state.results else {
                return Ok(());
            };
            if rows.is_empty() {
                return writeln!(out, "No results for \"{query}\".");
            }

            if self.format == OutputFormat::Markdown {
                writeln!(out, "### Results for `{query}`")?;
                writeln!(out)?;
                writeln!(
                    out,
                    "_{} matches in {}ms_",
                    results.total, results.took_millis
                )?;
                writeln!(out)?;
                for (index, row) in rows.iter().enumerate() {
                    writeln!(out, "{}. {}", index + 1, self.spans(&row.prompt))?;
                    writeln!(out, "   - query: {}", self.spans(&row.query))?;
                    writeln!(
                        out,
                        "   - score: {:.2} ({}% match)",
                        row.score, row.match_percentage
                    )?;
                }
            } else {
                writeln!(
                    out,
                    "{} results for \"{query}\" ({}ms)",
                    results.total, results.took_millis
                )?;
                for (index, row) in rows.iter().enumerate() {
                    writeln!(out, "{:>2}. {}", index + 1, self.spans(&row.prompt))?;
                    writeln!(out, "    query: {}", self.spans(&row.query))?;
                    writeln!(
                        out,
                        "    score {:.2}, {}% match",
                        row.score, row.match_percentage
                    )?;
                }
            }
            Ok(())
        }

        fn spans(&self, spans: &[Span]) -> String {
            let mut line = String::new();
            for span in spans {
                if !span.emphasized {
                    line.push_str(&span.text);
                } else if span.text.is_empty() {
                    continue;
                } else if self.format == OutputFormat::Markdown {
                    let _ = write!(line, "**{}**", span.text);
                } else if self.color {
                    let _ = write!(line, "{BOLD}{}{RESET}", span.text);
                } else {
                    let _ = write!(line, "[{}]", span.text);
                }
            }
            line
        }
    }

    #[cfg(test)]
    mod tests {
        use prompt_search_client::{
            ClientError, Highlight, SearchResultItem, SearchResultSet, StatusCode,
        };
        use prompt_search_core::{InteractionState, SearchError};

        use super::*;

        fn loaded_state() -> SessionState {
            SessionState {
                active_query: Some("summer dress".to_string()),
                results: Some(SearchResultSet {
                    items: vec![
                        SearchResultItem {
                            prompt: "a summer dress for the beach".to_string(),
                            query: "summer dress".to_string(),
                            score: 4.0,
                            match_percentage: 100,
                            highlight: Some(Highlight {
                                prompt: Some(vec![
                                    "a <em>summer dress</em> for the beach".to_string()
                                ]),
                                query: Some(vec!["<em>summer</em> dress".to_string()]),
                            }),
                        },
                        SearchResultItem {
                            prompt: "floral dress".to_string(),
                            query: "dress".to_string(),
                            score: 1.5,
                            match_percentage: 38,
                            highlight: None,
                        },
                    ],
                    total: 1532,
                    took_millis: 42,
                }),
                status: SearchStatus::Loaded,
                error: None,
            }
        }

        #[test]
        fn text_results_bracket_highlights_without_color() {
            let state = loaded_state();
            let rendered = Renderer::new(OutputFormat::Text, false)
                .session(&state, &state.rows())
                .unwrap();
            insta::assert_snapshot!(rendered, @r###"
1532 results for "summer dress" (42ms)
 1. a [summer dress] for the beach
    query: [summer] dress
    score 4.00, 100% match
 2. floral dress
    query: dress
    score 1.50, 38% match
"###);
        }

        #[test]
        fn markdown_results_bold_highlights() {
            let state = loaded_state();
            let rendered = Renderer::new(OutputFormat::Markdown, true)
                .session(&state, &state.rows())
                .unwrap();
            insta::assert_snapshot!(rendered, @r###"
### Results for `summer dress`

_1532 matches in 42ms_

1. a **summer dress** for the beach
   - query: **summer** dress
   - score: 4.00 (100% match)
2. floral dress
   - query: dress
   - score: 1.50 (38% match)
"###);
        }

        #[test]
        fn colored_text_uses_bold_escape() {
            let state = loaded_state();
            let rendered = Renderer::new(OutputFormat::Text, true)
                .session(&state, &state.rows())
                .unwrap();
            assert!(rendered.contains("a \u{1b}[1msummer dress\u{1b}[0m for the beach"));
        }

        #[test]
        fn failure_shows_message_and_retry_hint() {
            let state = SessionState {
                active_query: Some("boots".to_string()),
                results: None,
                status: SearchStatus::Failed,
                error: Some(SearchError::from(ClientError::Status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                ))),
            };
            let rendered = Renderer::new(OutputFormat::Text, false)
                .session(&state, &state.rows())
                .unwrap();
            insta::assert_snapshot!(rendered, @r###"
Search for "boots" failed: The search service returned an error (HTTP 500).
The problem may be temporary; retry the search.
"###);
        }

        #[test]
        fn snapshot_marks_selected_suggestion() {
            let snapshot = AppSnapshot {
                interaction: InteractionState {
                    input_text: "dress".to_string(),
                    suggestions: vec![
                        SuggestionItem::new("dress shoes"),
                        SuggestionItem::new("summer dress"),
                    ],
                    selected_index: Some(1),
                    dropdown_visible: true,
                },
                session: SessionState::default(),
                rows: Vec::new(),
            };
            let rendered = Renderer::new(OutputFormat::Text, false)
                .snapshot(&snapshot)
                .unwrap();
            insta::assert_snapshot!(rendered, @r###"
search: dress
  1. dress shoes
> 2. summer dress

No search yet.
"###);
        }

        #[test]
        fn empty_suggestions_say_so() {
            let rendered = Renderer::new(OutputFormat::Text, false)
                .suggestions("d", &[])
                .unwrap();
            assert_eq!(rendered, "No suggestions for \"d\".\n");
        }

        #[test]
        fn json_suggestions_carry_the_query() {
            let rendered = Renderer::new(OutputFormat::Json, false)
                .suggestions("dr", &[SuggestionItem::new("dress")])
                .unwrap();
            let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
            assert_eq!(value["query"], "dr");
            assert_eq!(value["suggestions"][0]["text"], "dress");
        }

        #[test]
        fn health_text_fills_missing_cluster_fields() {
            let report = HealthReport {
                status: "healthy".to_string(),
                elasticsearch_connected: true,
                cluster_name: None,
                cluster_health: None,
            };
            let rendered = Renderer::new(OutputFormat::Text, false)
                .health(&report)
                .unwrap();
            insta::assert_snapshot!(rendered, @r###"
Status: healthy
Elasticsearch: connected
Cluster: n/a (n/a)
"###);
        }
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    /// Steady spinner on stderr, or nothing when progress output is disabled.
    pub fn spinner(enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(100));
        Some(progress)
    }
}
