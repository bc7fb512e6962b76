use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod sources;
mod storage;
mod ui;

use crate::audio::ClipPlayer;
use crate::bot::OpenClipsBot;
use crate::config::Config;
use crate::sources::{ClipResolver, LocalClips, TtsEngine, UrlFetcher};
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_clips=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🔊 Iniciando Open Clips Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Inicializar almacenamiento JSON
    let storage = Arc::new(tokio::sync::Mutex::new(
        JsonStorage::new(config.data_dir.clone()).await?,
    ));

    // Fuentes de clips y orquestador de reproducción
    let local = LocalClips::load(config.clips_dir.clone(), config.default_volume).await?;
    let tts = TtsEngine::load(
        config.tts_command.clone(),
        config.temp_dir.clone(),
        config.default_volume,
    )
    .await?;
    let url = UrlFetcher::new(config.temp_dir.clone(), config.default_volume)?;
    let resolver = Arc::new(ClipResolver::new(local, tts, url));
    let player = Arc::new(ClipPlayer::new(resolver));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Crear handler del bot
    let handler = OpenClipsBot::new(config.clone(), storage, player);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {why:?}");
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar que el sintetizador de voz esté disponible
    let tts = async_process::Command::new(&config.tts_command)
        .arg("--version")
        .output()
        .await?;

    if tts.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("El sintetizador tts `{}` no responde", config.tts_command);
    }
}
