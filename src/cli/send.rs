//! Send command implementation

use crate::cli::output::{format_completion_json, format_health_table};
use crate::cli::SendArgs;
use crate::config::RelayConfig;
use crate::conversation::{Conversation, Role};
use crate::dispatch::{DispatchError, DispatchOptions, Dispatcher, StreamObserver};
use colored::Colorize;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Prints streamed text to stdout as it arrives.
///
/// A failed attempt after partial output is marked on stderr so the reader
/// knows the next attempt starts over.
#[derive(Default)]
struct TerminalObserver {
    printed: AtomicBool,
}

impl StreamObserver for TerminalObserver {
    fn on_chunk(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
        self.printed.store(true, Ordering::Relaxed);
    }

    fn on_end(&self, _token_count: usize) {
        if self.printed.swap(false, Ordering::Relaxed) {
            println!();
        }
    }

    fn on_error(&self, error: &DispatchError) {
        if self.printed.swap(false, Ordering::Relaxed) {
            println!();
            eprintln!("{} {} (partial output discarded)", "✗".red(), error);
        }
    }
}

/// Assemble the conversation from `--conversation`, `--system` and the prompt.
///
/// Falls back to reading the prompt from stdin when neither a prompt nor a
/// conversation file is given.
pub fn build_conversation(
    args: &SendArgs,
    stdin: &mut dyn Read,
) -> Result<Conversation, Box<dyn std::error::Error>> {
    let mut conversation = Conversation::new();
    if let Some(system) = &args.system {
        conversation.push(Role::System, system.clone());
    }

    if let Some(path) = &args.conversation {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let loaded: Conversation = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid conversation file {}: {}", path.display(), e))?;
        for turn in loaded.turns() {
            conversation.push(turn.role, turn.content.clone());
        }
    }

    match &args.prompt {
        Some(prompt) => conversation.push(Role::User, prompt.clone()),
        None if args.conversation.is_none() => {
            let mut prompt = String::new();
            stdin.read_to_string(&mut prompt)?;
            let prompt = prompt.trim();
            if !prompt.is_empty() {
                conversation.push(Role::User, prompt);
            }
        }
        None => {}
    }

    if conversation.is_empty() {
        return Err("Nothing to send: give a prompt, --conversation or stdin input".into());
    }
    Ok(conversation)
}

/// Handle `relay send` command
///
/// Returns the text to print once the dispatch finishes. In streaming mode
/// the answer has already been written to stdout.
pub async fn handle_send(
    args: &SendArgs,
    config: &RelayConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let conversation = build_conversation(args, &mut io::stdin())?;
    let dispatcher = Dispatcher::from_config(config)?;

    let mut options = DispatchOptions {
        stream: args.stream,
        ..DispatchOptions::default()
    };
    if let Some(endpoint) = &args.endpoint {
        options = options.prefer(endpoint.clone());
    }
    if args.no_failover {
        options = options.without_failover();
    }

    let observer = TerminalObserver::default();
    let result = dispatcher
        .send_with_observer(&conversation, &options, &observer)
        .await;
    let health = dispatcher.health_status();

    let completion = match result {
        Ok(completion) => completion,
        Err(e) => {
            if args.health {
                eprintln!("{}", format_health_table(&health));
            }
            return Err(e.into());
        }
    };

    if args.json {
        let health = args.health.then_some(health.as_slice());
        return Ok(format_completion_json(&completion, health)?);
    }

    let mut output = String::new();
    if !args.stream {
        output.push_str(&completion.text);
    }
    if args.health {
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(&format!(
            "{} answered by {} (~{} tokens)\n",
            "✓".green(),
            completion.endpoint_id,
            completion.token_count
        ));
        output.push_str(&format_health_table(&health));
    }
    Ok(output)
}
