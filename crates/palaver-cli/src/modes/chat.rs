//! Interactive chat mode: the render surface for the session core.
//!
//! One event per loop iteration: read a line, parse it into a
//! `SurfaceEvent`, hand it to the engine, re-render from store state.
//! The store is owned here and threaded through explicitly.

use std::io::Write as _;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use palaver_core::config::{Config, paths};
use palaver_core::core::engine::{Engine, Rejected, Submission};
use palaver_core::core::events::SurfaceEvent;
use palaver_core::core::session::{Reply, Selection, SessionStore};
use palaver_core::providers::gemini::{GeminiClient, GeminiConfig};
use palaver_core::providers::resolve_api_key;

pub async fn run(config: &Config) -> Result<()> {
    let _log_guard = init_logging();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let gemini = &config.providers.gemini;
    let mut captured_key: Option<String> = None;
    let api_key = match resolve_api_key(gemini.effective_api_key(), "GEMINI_API_KEY", "gemini") {
        Ok(key) => key,
        Err(_) => {
            let key = prompt_api_key(&mut lines).await?;
            captured_key = Some(key.clone());
            key
        }
    };

    let answerer = GeminiClient::new(GeminiConfig::from_env(
        config.model.clone(),
        config.max_output_tokens,
        gemini.effective_base_url(),
        Some(&api_key),
    )?);
    let titler = GeminiClient::new(GeminiConfig::from_env(
        config.title_model.clone(),
        config.max_output_tokens,
        gemini.effective_base_url(),
        Some(&api_key),
    )?);

    // A rejected credential blocks the whole session up front; it is not an
    // inline conversation error.
    answerer
        .probe()
        .await
        .context("credential check against the provider failed")?;

    if let Some(key) = captured_key
        && config.remember_api_key
    {
        Config::save_api_key(&key).context("save API key to config")?;
        println!("API key saved to config.");
    }

    println!("palaver, chatting with {}", answerer.model());
    println!("Type a message to start a topic; :help lists commands.");

    tracing::info!(
        model = %config.model,
        title_model = %config.title_model,
        policy = config.title_policy.display_name(),
        "chat session started"
    );

    let mut engine = Engine::new(config.title_policy, config.max_input_chars, answerer, titler);

    loop {
        prompt(engine.store())?;
        let Some(line) = lines.next_line().await.context("read input")? else {
            break; // stdin closed
        };
        match parse_line(&line) {
            ParsedLine::Empty => {}
            ParsedLine::Help => print_help(),
            ParsedLine::Unknown(command) => {
                println!("Unknown command: {command} (:help lists commands)");
            }
            ParsedLine::Event(SurfaceEvent::Quit) => break,
            ParsedLine::Event(event) => handle_event(&mut engine, event, &config.model).await?,
        }
    }

    tracing::info!(topics = engine.store().len(), "chat session ended");
    Ok(())
}

async fn handle_event(
    engine: &mut Engine<GeminiClient>,
    event: SurfaceEvent,
    model: &str,
) -> Result<()> {
    match event {
        SurfaceEvent::Submitted { text } => {
            match engine.begin_submission(&text).context("record submission")? {
                Submission::Rejected(Rejected::Empty) => {}
                Submission::Rejected(Rejected::TooLong { limit }) => {
                    println!("Message too long; keep it under {limit} characters.");
                }
                Submission::Pending(pending) => {
                    println!("(waiting for {model}...)");
                    engine.resolve(pending).await.context("resolve submission")?;
                    render_latest_exchange(engine.store());
                }
            }
        }
        SurfaceEvent::TopicSelected { selection } => {
            let label = match &selection {
                Selection::New => "new conversation".to_string(),
                Selection::Topic { id } => id.clone(),
            };
            if engine.select(selection).is_ok() {
                println!("Switched to {label}.");
            } else {
                println!("No such topic: {label}");
            }
        }
        SurfaceEvent::ClearRequested => {
            engine.clear_all();
            println!("Cleared all topics.");
        }
        SurfaceEvent::ListRequested => render_topic_list(engine.store()),
        SurfaceEvent::HistoryRequested => render_history(engine.store()),
        SurfaceEvent::Quit => {}
    }
    Ok(())
}

/// Lines starting with `:` are surface controls; everything else is a
/// submission for the current selection.
#[derive(Debug, PartialEq, Eq)]
enum ParsedLine {
    Empty,
    Event(SurfaceEvent),
    Help,
    Unknown(String),
}

fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParsedLine::Empty;
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return ParsedLine::Event(SurfaceEvent::Submitted {
            text: trimmed.to_string(),
        });
    };

    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("q" | "quit" | "exit") => ParsedLine::Event(SurfaceEvent::Quit),
        Some("clear") => ParsedLine::Event(SurfaceEvent::ClearRequested),
        Some("topics" | "list") => ParsedLine::Event(SurfaceEvent::ListRequested),
        Some("history") => ParsedLine::Event(SurfaceEvent::HistoryRequested),
        Some("new") => ParsedLine::Event(SurfaceEvent::TopicSelected {
            selection: Selection::New,
        }),
        Some("select") => match parts.next() {
            Some(id) => ParsedLine::Event(SurfaceEvent::TopicSelected {
                selection: Selection::Topic { id: id.to_string() },
            }),
            None => ParsedLine::Help,
        },
        Some("help") | None => ParsedLine::Help,
        Some(other) => ParsedLine::Unknown(format!(":{other}")),
    }
}

fn prompt(store: &SessionStore) -> Result<()> {
    let label = match store.current_topic() {
        Some(topic) => format!("{} {}", topic.id, topic.title),
        None => "new".to_string(),
    };
    print!("[{label}] > ");
    std::io::stdout().flush().context("flush prompt")?;
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :topics        list topics (alias :list)");
    println!("  :select <id>   switch to a topic");
    println!("  :new           start a new conversation");
    println!("  :history       show the active topic, most recent first");
    println!("  :clear         delete all topics");
    println!("  :quit          exit (aliases :q, :exit)");
    println!("Anything else is sent as a message.");
}

fn reply_text(reply: &Reply) -> &str {
    match reply {
        Reply::Pending => "(waiting...)",
        Reply::Final { text } => text,
    }
}

fn render_latest_exchange(store: &SessionStore) {
    let Some(topic) = store.current_topic() else {
        return;
    };
    let Some(turn) = topic.turns.last() else {
        return;
    };
    println!();
    println!("you: {}", turn.user_text);
    println!("gemini: {}", reply_text(&turn.reply));
    println!();
}

fn render_topic_list(store: &SessionStore) {
    let marker = |selected: bool| if selected { '*' } else { ' ' };
    println!(
        "{} [new]    new conversation",
        marker(matches!(store.current(), Selection::New))
    );
    for topic in store.topics_in_order() {
        let selected = matches!(store.current(), Selection::Topic { id } if *id == topic.id);
        println!("{} {}  {}", marker(selected), topic.id, topic.title);
    }
}

fn render_history(store: &SessionStore) {
    let Some(topic) = store.current_topic() else {
        println!("No topic selected.");
        return;
    };
    println!("{}  {}", topic.id, topic.title);
    for turn in topic.turns.iter().rev() {
        println!("you: {}", turn.user_text);
        println!("gemini: {}", reply_text(&turn.reply));
        println!("---");
    }
}

async fn prompt_api_key(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    print!("Gemini API key: ");
    std::io::stdout().flush().context("flush prompt")?;
    let line = lines
        .next_line()
        .await
        .context("read API key")?
        .ok_or_else(|| anyhow::anyhow!("input closed before an API key was provided"))?;
    let key = line.trim().to_string();
    if key.is_empty() {
        bail!("An API key is required to chat.");
    }
    Ok(key)
}

/// Diagnostics go to a file under `$PALAVER_HOME/logs`; stdout stays clean
/// for the conversation.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = paths::logs_dir();
    if let Err(err) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("warning: could not create log directory: {err}");
        return None;
    }

    let appender = tracing_appender::rolling::never(&logs_dir, "palaver.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        eprintln!("warning: log init failed: {err}");
    }

    Some(guard)
}
