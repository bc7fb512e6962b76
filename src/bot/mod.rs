//! # Bot Module
//!
//! Main Discord bot implementation for Open Clips Bot.
//!
//! This module contains the core bot logic, including:
//! - Command registration and handling
//! - Voice connection management
//! - Event handling (ready, interactions, voice state updates, tts channel)
//!
//! ## Architecture
//!
//! The bot is built around the [`OpenClipsBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It manages:
//!
//! - Clip playback through [`ClipPlayer`]
//! - Persistent guild/user settings with [`JsonStorage`]
//! - One voice session per guild, created by `/join` and destroyed by
//!   `/leave`

use serenity::{
    all::{Context, EventHandler, Interaction, Message, Ready, VoiceState},
    async_trait,
    model::id::GuildId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{audio::ClipPlayer, config::Config, storage::JsonStorage};

/// Main Discord bot handler for Open Clips Bot.
///
/// ## Thread Safety
///
/// All fields are wrapped in appropriate synchronization primitives:
/// - [`Arc`] for shared ownership
/// - [`tokio::sync::Mutex`] for async-safe exclusive access to storage
/// - The player serializes per guild internally
pub struct OpenClipsBot {
    /// Bot configuration loaded from environment variables
    pub config: Arc<Config>,
    /// JSON-based persistent storage (guild settings, intros/outros, bans)
    pub storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    /// Orquestador de reproducción de clips por guild
    pub player: Arc<ClipPlayer>,
}

impl OpenClipsBot {
    pub fn new(
        config: Config,
        storage: Arc<tokio::sync::Mutex<JsonStorage>>,
        player: Arc<ClipPlayer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            player,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands can be registered globally (visible in all servers) or
    /// per-guild (faster updates, useful for development). The registration
    /// strategy is determined by the `guild_id` configuration option.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {guild_id}");

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {guild_id}");
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {guild_id}");
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for OpenClipsBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {e:?}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {e:?}");
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) =
                    handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {e:?}");
                }
            }
            _ => {}
        }
    }

    /// Presencia de voz: limpieza si desconectan al bot a mano, e
    /// intros/outros para los demás.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Detectar si el bot fue desconectado desde afuera
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado en guild {guild_id}");
                if let Err(e) = self.player.disconnect(guild_id).await {
                    debug!("limpieza tras desconexión externa: {e}");
                }
            }
            return;
        }

        events::handle_voice_state_update(&ctx, self, old, new).await;
    }

    /// Mensajes de texto: el canal tts configurado se lee por voz.
    async fn message(&self, ctx: Context, msg: Message) {
        events::handle_message(&ctx, self, &msg).await;
    }
}
