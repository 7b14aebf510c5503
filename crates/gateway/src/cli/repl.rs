//! `wayfarer chat` — interactive REPL.
//!
//! Each line becomes one turn on a single thread. Slash commands:
//! `/metrics` dumps the counter snapshot, `/why` attaches receipts to
//! the next reply, `/help` lists commands; `exit` (or `/exit`, `/quit`,
//! Ctrl+D) leaves.

use crate::runtime::{run_turn, TurnRequest};
use crate::state::AppState;

pub async fn chat(state: AppState, thread: Option<String>) -> anyhow::Result<()> {
    let thread_id = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".wayfarer")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("Wayfarer travel assistant");
    eprintln!("Thread: {thread_id}  |  /help for commands, exit or Ctrl+D to quit");
    eprintln!();

    // One-shot flag: `/why` makes the next turn carry receipts.
    let mut want_receipts = false;

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed == "exit" {
                    break;
                }
                if let Some(command) = trimmed.strip_prefix('/') {
                    match command {
                        "exit" | "quit" => break,
                        "metrics" => {
                            let snapshot = state.metrics.snapshot();
                            println!(
                                "{}",
                                serde_json::to_string_pretty(&snapshot).unwrap_or_default()
                            );
                        }
                        "why" => {
                            want_receipts = true;
                            eprintln!("(receipts will be attached to the next reply)");
                        }
                        "help" => {
                            eprintln!("Commands:");
                            eprintln!("  /metrics   Dump the metrics snapshot");
                            eprintln!("  /why       Include receipts with the next response");
                            eprintln!("  /help      Show this help");
                            eprintln!("  exit       Leave the chat (also /exit, /quit, Ctrl+D)");
                        }
                        other => eprintln!("Unknown command: /{other}  (type /help)"),
                    }
                    continue;
                }

                let response = run_turn(
                    &state,
                    TurnRequest {
                        message: trimmed.to_owned(),
                        thread_id: Some(thread_id.clone()),
                        receipts: want_receipts,
                    },
                )
                .await;
                want_receipts = false;

                println!("{}", response.reply);
                if !response.citations.is_empty() {
                    eprintln!("\x1B[2msources: {}\x1B[0m", response.citations.join(", "));
                }
                if let Some(receipts) = response.receipts {
                    eprintln!(
                        "\x1B[2mreceipts: {}\x1B[0m",
                        serde_json::to_string_pretty(&receipts).unwrap_or_default()
                    );
                }
                println!();
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(use exit or Ctrl+D to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}
