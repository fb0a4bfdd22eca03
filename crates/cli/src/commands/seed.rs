use crate::commands::CommandResult;
use mabar_baas::{load_demo, BaasClient};
use mabar_core::config::{AppConfig, LoadOptions};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let client = match BaasClient::from_config(&config.baas) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "store_client",
                format!("could not build store client: {error}"),
                3,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(load_demo(&client)) {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "seeded demo dataset: {} venues, {} players, {} sessions",
                summary.venues, summary.players, summary.sessions
            ),
        ),
        Err(error) => CommandResult::failure(
            "seed",
            "seed_execution",
            format!("seeding the hosted store failed: {error}"),
            4,
        ),
    }
}
