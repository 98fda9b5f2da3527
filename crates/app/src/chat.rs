use crate::{load_pdf, print_answer};
use anyhow::Context;
use pdf_qa_core::{Answer, ModelChoice, Session, Settings};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};
use std::path::{Path, PathBuf};
use tracing::warn;

const HELP: &str = "\
Type a question, or one of:
  /summary              show the document summary
  /sources              pages used for the last answer
  /history              print the conversation so far
  /clear                forget the conversation (document stays loaded)
  /export <path>        save the conversation as JSON
  /load <path>          load another PDF
  /set <key> <value>    chunk-size, chunk-overlap, temperature, model,
                        hide-reasoning, hide-sources
  /settings             show current settings
  /help                 this message
  /quit                 leave";

const COMMANDS: &[&str] = &[
    "/summary",
    "/sources",
    "/history",
    "/clear",
    "/export",
    "/load",
    "/set",
    "/settings",
    "/help",
    "/quit",
];

fn command_candidates(typed: &str) -> Vec<&'static str> {
    if !typed.starts_with('/') || typed.contains(char::is_whitespace) {
        return Vec::new();
    }
    COMMANDS
        .iter()
        .copied()
        .filter(|command| command.starts_with(typed))
        .collect()
}

/// Tab completion and inline hints for slash commands.
struct ChatHelper;

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = command_candidates(&line[..pos])
            .into_iter()
            .map(|command| Pair {
                display: command.to_string(),
                replacement: command.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        let typed = &line[..pos];
        command_candidates(typed)
            .first()
            .filter(|command| command.len() > typed.len())
            .map(|command| command[typed.len()..].to_string())
    }
}

impl Highlighter for ChatHelper {}

impl Validator for ChatHelper {}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChatCommand {
    Ask(String),
    Summary,
    Sources,
    History,
    Clear,
    Export(PathBuf),
    Load(PathBuf),
    Set { key: String, value: String },
    ShowSettings,
    Help,
    Quit,
}

pub(crate) fn parse_command(line: &str) -> Result<ChatCommand, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ChatCommand::Ask(line.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).unwrap_or_default();

    let require_path = |command: &str| {
        if argument.is_empty() {
            Err(format!("/{command} needs a path"))
        } else {
            Ok(PathBuf::from(argument))
        }
    };

    match name {
        "summary" => Ok(ChatCommand::Summary),
        "sources" => Ok(ChatCommand::Sources),
        "history" => Ok(ChatCommand::History),
        "clear" => Ok(ChatCommand::Clear),
        "export" => require_path("export").map(ChatCommand::Export),
        "load" => require_path("load").map(ChatCommand::Load),
        "set" => {
            let mut pieces = argument.split_whitespace();
            match (pieces.next(), pieces.next(), pieces.next()) {
                (Some(key), Some(value), None) => Ok(ChatCommand::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
                _ => Err("usage: /set <key> <value>".to_string()),
            }
        }
        "settings" => Ok(ChatCommand::ShowSettings),
        "help" | "?" => Ok(ChatCommand::Help),
        "quit" | "exit" | "q" => Ok(ChatCommand::Quit),
        other => Err(format!("unknown command /{other}, try /help")),
    }
}

pub(crate) fn apply_setting(current: &Settings, key: &str, value: &str) -> Result<Settings, String> {
    let mut next = current.clone();
    let parse_bool = |value: &str| match value {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got {other:?}")),
    };

    match key {
        "chunk-size" => {
            next.chunk_size = value.parse().map_err(|_| format!("invalid chunk size {value:?}"))?
        }
        "chunk-overlap" => {
            next.chunk_overlap = value
                .parse()
                .map_err(|_| format!("invalid chunk overlap {value:?}"))?
        }
        "temperature" => {
            next.temperature = value
                .parse()
                .map_err(|_| format!("invalid temperature {value:?}"))?
        }
        "model" => next.model = value.parse::<ModelChoice>()?,
        "hide-reasoning" => next.hide_reasoning = parse_bool(value)?,
        "hide-sources" => next.hide_sources = parse_bool(value)?,
        other => return Err(format!("unknown setting {other:?}")),
    }

    next.validate().map_err(|error| error.to_string())?;
    Ok(next)
}

pub(crate) async fn export_to(session: &Session, path: &Path) -> anyhow::Result<()> {
    let json = session.export_history()?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("unable to write {}", path.display()))?;
    println!(
        "Saved {} turns to {}",
        session.history().len(),
        path.display()
    );
    Ok(())
}

/// Reads commands until `/quit`, Ctrl-C or Ctrl-D.
pub(crate) async fn run(session: &mut Session) -> anyhow::Result<()> {
    let mut editor: Editor<ChatHelper, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(ChatHelper));
    let mut last_answer: Option<Answer> = None;

    println!("{HELP}");
    if session.document().is_none() {
        println!("\nNo document loaded yet, use /load <path>.");
    }

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline("> ")) {
            Ok(line) => line,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(error) => return Err(error.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if command == ChatCommand::Quit {
            break;
        }

        if let Err(error) = handle(session, command, &mut last_answer).await {
            warn!(error = %format!("{error:#}"), "chat command failed");
            println!("Error: {error:#}");
        }
    }

    Ok(())
}

async fn handle(
    session: &mut Session,
    command: ChatCommand,
    last_answer: &mut Option<Answer>,
) -> anyhow::Result<()> {
    match command {
        ChatCommand::Ask(question) => {
            if question.is_empty() {
                return Ok(());
            }
            println!("Searching for the answer...");
            if let Some(answer) = session.ask(&question).await? {
                print_answer(&answer, session.settings());
                *last_answer = Some(answer);
            }
        }
        ChatCommand::Summary => match session.summary() {
            Some(summary) if !summary.is_empty() => println!("{summary}"),
            Some(_) => println!("No summary was generated for this document."),
            None => println!("No document loaded."),
        },
        ChatCommand::Sources => match last_answer {
            Some(answer) => {
                for hit in &answer.sources {
                    let preview: String = hit.chunk.text.chars().take(120).collect();
                    println!("- page {}: {}", hit.chunk.page, preview.replace('\n', " "));
                }
            }
            None => println!("No answer yet."),
        },
        ChatCommand::History => {
            if session.history().is_empty() {
                println!("The conversation is empty.");
            }
            for turn in session.history().turns() {
                println!("Q: {}\nA: {}\n---", turn.question, turn.answer.trim());
            }
        }
        ChatCommand::Clear => {
            session.clear_history();
            *last_answer = None;
            println!("Conversation cleared.");
        }
        ChatCommand::Export(path) => export_to(session, &path).await?,
        ChatCommand::Load(path) => {
            load_pdf(session, &path).await?;
            *last_answer = None;
        }
        ChatCommand::Set { key, value } => {
            let settings =
                apply_setting(session.settings(), &key, &value).map_err(anyhow::Error::msg)?;
            if let Some(chunks) = session.apply_settings(settings).await? {
                println!("Index rebuilt with {chunks} chunks.");
            }
            println!("{key} = {value}");
        }
        ChatCommand::ShowSettings => {
            let settings = session.settings();
            println!(
                "model={} temperature={} chunk-size={} chunk-overlap={} hide-reasoning={} hide-sources={}",
                settings.model,
                settings.temperature,
                settings.chunk_size,
                settings.chunk_overlap,
                settings.hide_reasoning,
                settings.hide_sources
            );
        }
        ChatCommand::Help => println!("{HELP}"),
        ChatCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(
            parse_command("  What is this about?  "),
            Ok(ChatCommand::Ask("What is this about?".to_string()))
        );
        assert_eq!(parse_command(""), Ok(ChatCommand::Ask(String::new())));
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_command("/clear"), Ok(ChatCommand::Clear));
        assert_eq!(parse_command("/q"), Ok(ChatCommand::Quit));
        assert_eq!(
            parse_command("/export  out/chat.json"),
            Ok(ChatCommand::Export(PathBuf::from("out/chat.json")))
        );
        assert_eq!(
            parse_command("/set temperature 0.2"),
            Ok(ChatCommand::Set {
                key: "temperature".to_string(),
                value: "0.2".to_string()
            })
        );
    }

    #[test]
    fn malformed_commands_are_errors() {
        assert!(parse_command("/export").is_err());
        assert!(parse_command("/set temperature").is_err());
        assert!(parse_command("/frobnicate").is_err());
    }

    #[test]
    fn settings_are_updated_by_key() {
        let settings = apply_setting(&Settings::default(), "chunk-size", "800").expect("valid");
        assert_eq!(settings.chunk_size, 800);

        let settings = apply_setting(&Settings::default(), "hide-sources", "on").expect("valid");
        assert!(settings.hide_sources);
        assert_eq!(settings.chunk_size, Settings::default().chunk_size);
    }

    #[test]
    fn slash_prefixes_complete_to_commands() {
        assert_eq!(command_candidates("/s"), vec!["/summary", "/sources", "/set", "/settings"]);
        assert_eq!(command_candidates("/q"), vec!["/quit"]);
        assert!(command_candidates("summary").is_empty());
        assert!(command_candidates("/set chunk").is_empty());
    }

    #[test]
    fn every_completion_is_documented() {
        for command in COMMANDS {
            assert!(HELP.contains(command), "{command} missing from help");
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(apply_setting(&Settings::default(), "chunk-overlap", "1000").is_err());
        assert!(apply_setting(&Settings::default(), "temperature", "hot").is_err());
        assert!(apply_setting(&Settings::default(), "model", "gpt").is_err());
        assert!(apply_setting(&Settings::default(), "colour", "red").is_err());
    }
}
