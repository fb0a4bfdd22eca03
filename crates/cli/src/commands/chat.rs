use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::commands::CommandResult;
use mabar_agent::{build_client, Coordinator};
use mabar_baas::{BaasClient, BaasStore, InMemoryMatchStore, MatchStore};
use mabar_core::config::{AppConfig, LoadOptions};

/// Interactive chat loop. `demo` swaps the hosted store for the in-memory
/// demo dataset; the model endpoint is always the configured one.
pub fn run(demo: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let llm = match build_client(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "llm_client",
                format!("could not build model client: {error}"),
                3,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let store: Arc<dyn MatchStore> = if demo {
            Arc::new(InMemoryMatchStore::with_demo_data().await)
        } else {
            let client = BaasClient::from_config(&config.baas)
                .map_err(|error| format!("could not build store client: {error}"))?;
            Arc::new(BaasStore::new(client))
        };

        let coordinator = Coordinator::new(llm, store, None, &config.assistant);
        let session_id = mabar_agent::conversation::generate_session_id();

        println!("MaBar assistant ready (session {session_id}).");
        println!("Type a message, '/reset' to start fresh, or 'exit' to quit.\n");

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line.map_err(|error| format!("could not read input: {error}"))?;
            let input = line.trim();

            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                break;
            }
            if input == "/reset" {
                coordinator.reset_conversation(&session_id).await;
                println!("(conversation reset)\n");
                continue;
            }

            let reply = coordinator.handle_turn(&session_id, input, None).await;
            println!("\n{}", reply.text);
            for card in &reply.session_cards {
                match serde_json::to_string_pretty(card) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(_) => println!("(card could not be rendered)"),
                }
            }
            println!();
            let _ = stdout.flush();
        }

        Ok::<(), String>(())
    });

    match result {
        Ok(()) => CommandResult::success("chat", "chat session ended"),
        Err(message) => CommandResult::failure("chat", "chat_loop", message, 4),
    }
}
