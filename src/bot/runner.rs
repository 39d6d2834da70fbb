use crate::bot::handlers::{self, is_code_text, Command};
use crate::config::{BotConfig, Settings};
use crate::engine::PythonEngine;
use crate::service::ObfuscatorService;
use crate::session::InMemorySessionStore;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>, config: &BotConfig) {
    let bot = Bot::new(config.token.clone());
    let service = Arc::new(init_service(&settings));
    let handler = setup_handler();

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register command menu: {}", e);
    }

    info!("🚀 Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_service(settings: &Settings) -> ObfuscatorService {
    let sessions = match settings.session_idle_ttl_secs {
        Some(secs) => {
            info!("Sessions expire after {}s of inactivity", secs);
            InMemorySessionStore::with_idle_timeout(Duration::from_secs(secs))
        }
        None => InMemorySessionStore::new(),
    };
    let engine = PythonEngine::new(
        settings.python_bin.clone(),
        settings.engine_dir.clone(),
        settings.engine_module.clone(),
    );
    info!(
        python = %settings.python_bin,
        engine_dir = %settings.engine_dir.display(),
        module = %settings.engine_module,
        "Obfuscation engine configured"
    );
    ObfuscatorService::new(Arc::new(sessions), Arc::new(engine))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.document().is_some()).endpoint(handle_document))
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(is_code_text))
                .endpoint(handle_text),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_command(bot, msg, cmd, service, settings).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_document(
    bot: Bot,
    msg: Message,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_file(bot, msg, service, settings).await {
        error!("Document handler error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, service, settings).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}
