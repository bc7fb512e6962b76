use regex::Regex;
use serenity::{
    model::{channel::Message, id::ChannelId, voice::VoiceState},
    prelude::Context,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::audio::{AudioError, SessionTarget};
use crate::bot::handlers::DiscordDirectory;
use crate::bot::OpenClipsBot;

const DEFAULT_INTRO: &str = "local:helloits";
const DEFAULT_OUTRO: &str = "local:farewell";

/// Intros y outros: anuncia entradas y salidas del canal en el que está el
/// bot, con el clip elegido por cada usuario.
pub async fn handle_voice_state_update(
    ctx: &Context,
    bot: &OpenClipsBot,
    old: Option<VoiceState>,
    new: VoiceState,
) {
    let bot_user_id = ctx.cache.current_user().id;
    let user_id = new.user_id;

    // Otros bots no se anuncian; a nosotros mismos tampoco
    let is_bot = new.member.as_ref().map(|m| m.user.bot).unwrap_or(false);
    if is_bot || user_id == bot_user_id {
        return;
    }

    let old_channel = old.as_ref().and_then(|o| o.channel_id);
    if old_channel == new.channel_id {
        return; // no cambió de canal
    }

    let name = new
        .member
        .as_ref()
        .map(|m| fix_name(m.display_name()))
        .unwrap_or_else(|| "alguien".to_string());

    // Outro: el usuario dejó el canal donde estamos
    if let (Some(guild_id), Some(channel_id)) =
        (old.as_ref().and_then(|o| o.guild_id), old_channel)
    {
        let outros_enabled = bot.storage.lock().await.guild(guild_id.get()).outros_enabled;
        if outros_enabled && bot.player.current_channel(guild_id) == Some(channel_id) {
            let outro = bot
                .storage
                .lock()
                .await
                .user(user_id.get())
                .outro
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTRO.to_string());

            info!("👋 {name} dejó el canal {channel_id} en guild {guild_id}");
            tokio::time::sleep(Duration::from_millis(bot.config.outro_delay_ms)).await;

            let directory = DiscordDirectory {
                ctx,
                storage: &bot.storage,
            };
            let target = SessionTarget::Channel(guild_id, channel_id);
            if let Err(e) = bot.player.play(&outro, target, &directory).await {
                debug!("no se pudo sonar el outro: {e}");
            }
            let announce = format!("tts:{name} se ha ido!");
            if let Err(e) = bot.player.play(&announce, target, &directory).await {
                debug!("no se pudo anunciar la salida: {e}");
            }
        }
    }

    // Intro: el usuario entró al canal donde estamos
    if let (Some(guild_id), Some(channel_id)) = (new.guild_id, new.channel_id) {
        let intros_enabled = bot.storage.lock().await.guild(guild_id.get()).intros_enabled;
        if intros_enabled && bot.player.current_channel(guild_id) == Some(channel_id) {
            let custom_intro = bot.storage.lock().await.user(user_id.get()).intro.clone();
            let (intro, announce) = match custom_intro {
                Some(intro) if intro != DEFAULT_INTRO => {
                    (intro, format!("tts:llegó {name}"))
                }
                _ => (DEFAULT_INTRO.to_string(), format!("tts:{name}")),
            };

            info!("🙋 {name} entró al canal {channel_id} en guild {guild_id}");
            // Deja que Discord termine de mover al usuario antes de hablar
            tokio::time::sleep(Duration::from_millis(bot.config.intro_delay_ms)).await;

            let directory = DiscordDirectory {
                ctx,
                storage: &bot.storage,
            };
            let target = SessionTarget::Channel(guild_id, channel_id);
            if let Err(e) = bot.player.play(&intro, target, &directory).await {
                debug!("no se pudo sonar el intro: {e}");
            }
            if let Err(e) = bot.player.play(&announce, target, &directory).await {
                debug!("no se pudo anunciar la entrada: {e}");
            }
        }
    }
}

/// Canal tts: los mensajes del canal configurado se leen por voz.
pub async fn handle_message(ctx: &Context, bot: &OpenClipsBot, msg: &Message) {
    if msg.author.bot {
        return;
    }
    let Some(guild_id) = msg.guild_id else {
        return;
    };
    if msg.content.is_empty() || msg.content.starts_with('/') || msg.content.starts_with('?') {
        return;
    }

    let (banned, tts_channel) = {
        let mut storage = bot.storage.lock().await;
        let settings = storage.guild(guild_id.get());
        (settings.is_banned(msg.author.id.get()), settings.tts_channel_id)
    };
    if tts_channel != Some(msg.channel_id.get()) {
        return;
    }
    if banned {
        return; // los baneados no hablan
    }

    let directory = DiscordDirectory {
        ctx,
        storage: &bot.storage,
    };

    match bot
        .player
        .play_smart(&msg.content, SessionTarget::Guild(guild_id), &directory)
        .await
    {
        Ok(_) => {}
        Err(
            e @ (AudioError::ClipNotFound(_)
            | AudioError::SessionNotFound(_)
            | AudioError::AccessDenied(_)),
        ) => {
            // Errores esperables: se contestan en el canal y listo
            let _ = msg.channel_id.say(&ctx.http, e.to_string()).await;
        }
        Err(e) => {
            // Lo inesperado no tumba el loop de eventos: se avisa en el
            // canal y se reporta a diagnóstico
            error!("💥 error en el canal tts de guild {guild_id}: {e}");
            let _ = msg
                .channel_id
                .say(&ctx.http, "Uh-oh, algo salió mal 😱")
                .await;
            report_diagnostics(ctx, bot, &format!("canal tts de guild {guild_id}: {e}")).await;
        }
    }
}

async fn report_diagnostics(ctx: &Context, bot: &OpenClipsBot, detail: &str) {
    let Some(channel_id) = bot.config.diagnostics_channel_id else {
        return;
    };
    let _ = ChannelId::new(channel_id)
        .say(&ctx.http, format!("💥 {detail}"))
        .await;
}

/// Arregla nombres de usuario para que el tts los pronuncie bien: baja
/// mayúsculas gritadas y deshace los números usados como letras.
pub fn fix_name(name: &str) -> String {
    let mut name = name.to_string();
    if !name.chars().any(|c| c.is_ascii_lowercase()) {
        name = name.to_lowercase();
    }
    for (pattern, replacement) in letter_numbers() {
        name = pattern.replace_all(&name, replacement.as_str()).into_owned();
    }
    name
}

fn letter_numbers() -> &'static Vec<(Regex, String)> {
    static TABLE: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [("0", "o"), ("1", "i"), ("3", "e"), ("4", "a"), ("7", "t")]
            .into_iter()
            .map(|(digit, letter)| {
                (
                    Regex::new(&format!("{digit}([A-Za-z])")).unwrap(),
                    format!("{letter}$1"),
                )
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shouting_names_get_lowercased() {
        assert_eq!(fix_name("PEPE"), "pepe");
        assert_eq!(fix_name("PePe"), "PePe");
    }

    #[test]
    fn digits_acting_as_letters_are_fixed() {
        assert_eq!(fix_name("m4rio"), "mario");
        assert_eq!(fix_name("m1guel"), "miguel");
        assert_eq!(fix_name("n00b"), "n0ob");
        // Un número que no precede a una letra se queda
        assert_eq!(fix_name("pepe99"), "pepe99");
    }
}
