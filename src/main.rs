//! Terminal chat client.
//!
//! Entry point for the multi-persona streaming chat application: a small
//! REPL that drives one persona session, printing deltas as they arrive.

use std::io::Write as _;
use std::sync::Arc;

use dotenvy::dotenv;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use persona_chat::config::AppConfig;
use persona_chat::{ChatSession, FileStorage, Persona, Sender, TurnUpdate, WebhookBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let Some(mut persona) = Persona::find(&config.persona) else {
        let known: Vec<String> = Persona::builtin().into_iter().map(|p| p.id).collect();
        eprintln!(
            "Unknown persona '{}'. Available: {}",
            config.persona,
            known.join(", ")
        );
        std::process::exit(1);
    };
    if let Some(endpoint) = &config.endpoint {
        persona.endpoint.clone_from(endpoint);
    }

    info!(
        persona = %persona.id,
        endpoint = %persona.endpoint,
        data_dir = %config.data_dir,
        "configuration loaded"
    );

    let backend = Arc::new(WebhookBackend::for_persona(&persona));
    let storage = Arc::new(FileStorage::new(&config.data_dir));
    let session = ChatSession::new(persona, backend, storage);
    session.load().await?;

    // Resume the most recent conversation or open a fresh one.
    let mut chat_id = match session.recent_chats(1).into_iter().next() {
        Some((id, _)) => id,
        None => session.new_chat(),
    };

    println!("{}: type a message, or /help for commands.", session.persona().name);
    print_history(&session, &chat_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => {
                println!("/new            open a fresh conversation");
                println!("/list           list recent conversations");
                println!("/open <id>      switch to a conversation");
                println!("/delete <id>    delete a conversation");
                println!("/quit           leave");
            }
            ("/new", _) => {
                chat_id = session.new_chat();
                print_history(&session, &chat_id);
            }
            ("/list", _) => {
                for (id, conv) in session.recent_chats(config.history_limit) {
                    let marker = if id == chat_id { "*" } else { " " };
                    println!("{marker} {id}  {}", conv.title);
                }
            }
            ("/open", id) if !id.is_empty() => {
                if session.chats().contains(id) {
                    chat_id = id.to_string();
                    print_history(&session, &chat_id);
                } else {
                    println!("no such conversation: {id}");
                }
            }
            ("/delete", id) if !id.is_empty() => {
                session.delete_chat(id).await?;
                if id == chat_id {
                    chat_id = session.new_chat();
                    print_history(&session, &chat_id);
                }
            }
            (cmd @ ("/open" | "/delete"), _) => {
                println!("usage: {cmd} <id>");
            }
            (cmd, _) if cmd.starts_with('/') => {
                println!("unknown command: {cmd}");
            }
            _ => run_turn(&session, &chat_id, line).await?,
        }
    }

    Ok(())
}

/// Drive one turn, printing content deltas as they stream in.
async fn run_turn(session: &ChatSession, chat_id: &str, text: &str) -> anyhow::Result<()> {
    let updates = session.send(chat_id, text);
    futures::pin_mut!(updates);

    let name = session.persona().name.clone();
    let mut printed = 0;
    while let Some(update) = updates.next().await {
        match update {
            TurnUpdate::Started { .. } => {
                print!("{name}: ");
                std::io::stdout().flush()?;
            }
            TurnUpdate::Delta { text } => {
                print!("{}", &text[printed..]);
                std::io::stdout().flush()?;
                printed = text.len();
            }
            TurnUpdate::Completed { .. } => {
                println!();
            }
            TurnUpdate::Failed { notice } => {
                println!("{notice}");
            }
        }
    }
    Ok(())
}

/// Print a conversation transcript.
fn print_history(session: &ChatSession, chat_id: &str) {
    let Some(conv) = session.chats().get(chat_id) else {
        return;
    };
    println!("── {} ({chat_id})", conv.title);
    for message in &conv.messages {
        let who = match message.sender {
            Sender::Ai => session.persona().name.clone(),
            Sender::User => "you".to_string(),
        };
        println!("{who}: {}", message.text);
    }
}
