use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    builder::{
        CreateAttachment, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{registry::VoiceDirectory, SessionTarget},
    bot::OpenClipsBot,
    storage::JsonStorage,
    ui::{buttons, embeds},
};

/// Vista de presencia y baneos sobre la caché de Discord y el storage;
/// es lo que la resolución de sesiones consulta para el caso "usuario".
pub struct DiscordDirectory<'a> {
    pub ctx: &'a Context,
    pub storage: &'a Arc<tokio::sync::Mutex<JsonStorage>>,
}

#[async_trait]
impl VoiceDirectory for DiscordDirectory<'_> {
    async fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let guild = self.ctx.cache.guild(guild_id)?;
        guild
            .voice_states
            .get(&user_id)
            .and_then(|voice_state| voice_state.channel_id)
    }

    async fn is_banned(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.storage
            .lock()
            .await
            .is_banned(guild_id.get(), user_id.get())
    }
}

/// Contexto de sesión de un comando: la guild donde se usó, o el usuario si
/// llegó por privado.
fn target_for(command: &CommandInteraction) -> SessionTarget {
    match command.guild_id {
        Some(guild_id) => SessionTarget::Guild(guild_id),
        None => SessionTarget::User(command.user.id),
    }
}

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} usado por {} en {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    if let Some(guild_id) = command.guild_id {
        let banned = bot
            .storage
            .lock()
            .await
            .is_banned(guild_id.get(), command.user.id.get());
        if banned {
            return respond_text(ctx, &command, "🚫 Estás baneado del audio en este servidor.")
                .await;
        }
    }

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot).await?,
        "playlist" => handle_playlist(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "replay" => handle_replay(ctx, command, bot).await?,
        "clipinfo" => handle_clipinfo(ctx, command, bot).await?,
        "tts" => handle_tts(ctx, command, bot).await?,
        "ttsclip" => handle_ttsclip(ctx, command, bot).await?,
        "smarttts" => handle_smarttts(ctx, command, bot).await?,
        "setintro" => handle_set_greeting(ctx, command, bot, Greeting::Intro).await?,
        "setoutro" => handle_set_greeting(ctx, command, bot, Greeting::Outro).await?,
        "join" => handle_join(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

/// Maneja interacciones con componentes (botones)
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };
    let target = SessionTarget::Guild(guild_id);

    let content = match component.data.custom_id.as_str() {
        buttons::button_ids::CLIP_REPLAY => match bot.player.replay(target, &directory).await {
            Ok(Some(clip_id)) => format!("🔁 Repitiendo {clip_id}"),
            Ok(None) => "Nadie dijo nada todavía".to_string(),
            Err(e) => e.to_string(),
        },
        buttons::button_ids::CLIP_STOP => match bot.player.stop(target, &directory).await {
            Ok(()) => "⏹️ Audio cortado y cola vaciada".to_string(),
            Err(e) => e.to_string(),
        },
        _ => "❌ Acción no reconocida".to_string(),
    };

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &OpenClipsBot) -> Result<()> {
    let Some(clip) = option_str(&command, "clip") else {
        return respond_text(ctx, &command, "❌ Falta el clip a reproducir").await;
    };
    let clip = clip.to_string();

    // Defer: resolver tts/url puede tardar
    defer(ctx, &command).await?;

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    match bot
        .player
        .play(&clip, target_for(&command), &directory)
        .await
    {
        Ok(clip_id) => {
            let embed = embeds::create_clip_queued_embed(&clip_id);
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new()
                        .embed(embed)
                        .components(buttons::create_clip_buttons()),
                )
                .await?;
        }
        Err(e) => edit_text(ctx, &command, &e.to_string()).await?,
    }

    Ok(())
}

async fn handle_playlist(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    let local = bot.player.resolver().local();
    let embed = match option_str(&command, "section") {
        None => embeds::create_playlist_embed(&local.sections(), &local.all_clips()),
        Some(section) if matches!(section, "new" | "recent" | "latest") => {
            embeds::create_recent_clips_embed(&local.recent_clips(10))
        }
        Some(section) => {
            let clips = local.section_clips(section);
            if clips.is_empty() {
                let sections = local
                    .sections()
                    .iter()
                    .map(|s| format!("`{s}`"))
                    .collect::<Vec<_>>()
                    .join(" ");
                return respond_text(
                    ctx,
                    &command,
                    &format!("Esa sección no existe. Puedes elegir entre: {sections}"),
                )
                .await;
            }
            embeds::create_section_embed(section, &clips)
        }
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &OpenClipsBot) -> Result<()> {
    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    let content = match bot.player.stop(target_for(&command), &directory).await {
        Ok(()) => "⏹️ Audio cortado y cola vaciada".to_string(),
        Err(e) => e.to_string(),
    };
    respond_text(ctx, &command, &content).await
}

async fn handle_replay(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    // Defer: repetir un tts vuelve a sintetizar
    defer(ctx, &command).await?;

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    let content = match bot.player.replay(target_for(&command), &directory).await {
        Ok(Some(clip_id)) => format!("🔁 Repitiendo {clip_id}"),
        Ok(None) => "Nadie dijo nada todavía".to_string(),
        Err(e) => e.to_string(),
    };
    edit_text(ctx, &command, &content).await
}

async fn handle_clipinfo(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    defer(ctx, &command).await?;

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    let identifier = match option_str(&command, "clipid") {
        Some(clipid) => clipid.to_string(),
        None => {
            match bot
                .player
                .last_clip(target_for(&command), &directory)
                .await
            {
                Ok(Some(last)) => last.clip_id,
                Ok(None) => {
                    return edit_text(ctx, &command, "Nadie dijo nada todavía").await;
                }
                Err(e) => return edit_text(ctx, &command, &e.to_string()).await,
            }
        }
    };

    let clip = match bot.player.resolver().resolve(&identifier).await {
        Ok(clip) => clip,
        Err(e) => return edit_text(ctx, &command, &e.to_string()).await,
    };

    let embed = embeds::create_clipinfo_embed(clip.clip_id(), clip.kind(), clip.text());
    let mut response = EditInteractionResponse::new().embed(embed);
    if let Ok(attachment) = CreateAttachment::path(clip.path()).await {
        response = response.new_attachment(attachment);
    }
    command.edit_response(&ctx.http, response).await?;

    // El clip nunca se encoló; si materializó un temporal, se recicla acá
    if clip.is_temporary() {
        if let Err(e) = std::fs::remove_file(clip.path()) {
            warn!("no se pudo borrar el temporal de clipinfo: {e}");
        }
    }

    Ok(())
}

async fn handle_tts(ctx: &Context, command: CommandInteraction, bot: &OpenClipsBot) -> Result<()> {
    let Some(text) = option_str(&command, "text") else {
        return respond_text(ctx, &command, "❌ Falta el texto").await;
    };
    let identifier = format!("tts:{text}");

    defer(ctx, &command).await?;

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    let content = match bot
        .player
        .play(&identifier, target_for(&command), &directory)
        .await
    {
        Ok(_) => "🗣️ Dicho y hecho".to_string(),
        Err(e) => e.to_string(),
    };
    edit_text(ctx, &command, &content).await
}

async fn handle_ttsclip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    let Some(clip_name) = option_str(&command, "clip") else {
        return respond_text(ctx, &command, "❌ Falta el clip").await;
    };
    let clip_name = clip_name.to_string();

    defer(ctx, &command).await?;

    let clip = match bot.player.resolver().resolve(&clip_name).await {
        Ok(clip) => clip,
        Err(e) => return edit_text(ctx, &command, &e.to_string()).await,
    };

    let text = clip.text().to_lowercase();
    if text.is_empty() {
        return edit_text(
            ctx,
            &command,
            "No puedo leer ese clip con tts 😕. Prueba con otro.",
        )
        .await;
    }

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };
    let content = match bot
        .player
        .play(&format!("tts:{text}"), target_for(&command), &directory)
        .await
    {
        Ok(_) => format!("🗣️ Leyendo {}", clip.clip_id()),
        Err(e) => e.to_string(),
    };
    edit_text(ctx, &command, &content).await
}

async fn handle_smarttts(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    let Some(message) = option_str(&command, "message") else {
        return respond_text(ctx, &command, "❌ Falta el mensaje").await;
    };
    let message = message.to_string();

    defer(ctx, &command).await?;

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    let content = match bot
        .player
        .play_smart(&message, target_for(&command), &directory)
        .await
    {
        Ok(clip_id) => format!("🔊 Sonando {clip_id}"),
        Err(e) => e.to_string(),
    };
    edit_text(ctx, &command, &content).await
}

enum Greeting {
    Intro,
    Outro,
}

async fn handle_set_greeting(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
    greeting: Greeting,
) -> Result<()> {
    let user_id = command.user.id.get();
    let (label, example) = match greeting {
        Greeting::Intro => ("intro", "/setintro math"),
        Greeting::Outro => ("outro", "/setoutro farewell"),
    };

    let Some(clip_name) = option_str(&command, "clip").map(str::to_string) else {
        // Sin argumento: muestra la configuración actual
        let mut storage = bot.storage.lock().await;
        let settings = storage.user(user_id);
        let current = match greeting {
            Greeting::Intro => settings.intro.clone(),
            Greeting::Outro => settings.outro.clone(),
        };
        drop(storage);

        let content = match current {
            Some(clip_id) => format!("Tu {label} es: {clip_id}"),
            None => format!("No tienes {label} configurado. Prueba algo como `{example}`"),
        };
        return respond_text(ctx, &command, &content).await;
    };

    defer(ctx, &command).await?;

    // Valida que el clip exista antes de guardarlo
    let clip = match bot.player.resolver().resolve(&clip_name).await {
        Ok(clip) => clip,
        Err(e) => return edit_text(ctx, &command, &e.to_string()).await,
    };
    if !matches!(clip.kind(), "local" | "tts") {
        return edit_text(
            ctx,
            &command,
            "Solo clips locales o tts pueden ser intro/outro.",
        )
        .await;
    }
    // La validación de un tts materializa un temporal que no va a sonar
    if clip.is_temporary() {
        let _ = std::fs::remove_file(clip.path());
    }

    let clip_id = clip.clip_id().to_string();
    {
        let mut storage = bot.storage.lock().await;
        match greeting {
            Greeting::Intro => storage.user(user_id).intro = Some(clip_id.clone()),
            Greeting::Outro => storage.user(user_id).outro = Some(clip_id.clone()),
        }
        storage.save_user(user_id).await?;
    }

    edit_text(ctx, &command, &format!("Tu {label} ahora es {clip_id}")).await
}

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &OpenClipsBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_text(ctx, &command, "❌ Este comando solo funciona en un servidor").await;
    };

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_text(ctx, &command, "Tienes que estar en un canal de voz 📢").await;
    };

    defer(ctx, &command).await?;

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

    let content = match bot
        .player
        .connect(manager, guild_id, voice_channel_id)
        .await
    {
        Ok(()) => "🔊 Conectado a tu canal de voz".to_string(),
        Err(e) => e.to_string(),
    };
    edit_text(ctx, &command, &content).await
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenClipsBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_text(ctx, &command, "❌ Este comando solo funciona en un servidor").await;
    };

    let content = match bot.player.disconnect(guild_id).await {
        Ok(()) => "👋 Desconectado del canal de voz".to_string(),
        Err(e) => e.to_string(),
    };
    respond_text(ctx, &command, &content).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

// Funciones auxiliares

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn edit_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
