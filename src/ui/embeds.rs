use chrono::{DateTime, Utc};
use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const CLIP_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🔊 Open Clips Bot";

/// Embed de confirmación cuando un clip entra a la cola
pub fn create_clip_queued_embed(clip_id: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("🔊 Clip Encolado")
        .description(format!("**{clip_id}**"))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con la información de un clip (para `/clipinfo`)
pub fn create_clipinfo_embed(clip_id: &str, kind: &str, text: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("ℹ️ Información del Clip")
        .description(format!("ClipID: **{clip_id}**"))
        .color(colors::INFO_BLUE)
        .field("📦 Tipo", kind, true);

    if !text.is_empty() {
        embed = embed.field("💬 Texto", text, false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con las secciones del soundboard y sus clips
pub fn create_playlist_embed(sections: &[String], clips: &[String]) -> CreateEmbed {
    let section_list = if sections.is_empty() {
        "(sin secciones)".to_string()
    } else {
        sections
            .iter()
            .map(|s| format!("`{s}`"))
            .collect::<Vec<_>>()
            .join(" ")
    };

    CreateEmbed::default()
        .title("📻 Clips Disponibles")
        .color(colors::CLIP_PURPLE)
        .field("📂 Secciones", section_list, false)
        .field("🎵 Clips", format_clip_list(clips), false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con los clips de una sección concreta
pub fn create_section_embed(section: &str, clips: &[String]) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("📂 Sección `{section}`"))
        .color(colors::CLIP_PURPLE)
        .description(format_clip_list(clips))
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con los clips agregados más recientemente
pub fn create_recent_clips_embed(entries: &[(String, DateTime<Utc>)]) -> CreateEmbed {
    let listing = if entries.is_empty() {
        "(todavía no hay clips)".to_string()
    } else {
        entries
            .iter()
            .map(|(name, added)| format!("`{name}` ({})", added.format("%Y-%m-%d")))
            .collect::<Vec<_>>()
            .join("\n")
    };

    CreateEmbed::default()
        .title("🆕 Clips Recientes")
        .color(colors::CLIP_PURPLE)
        .description(listing)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🔊 Open Clips Bot - Ayuda")
        .color(colors::INFO_BLUE)
        .description("Soundboard para tu canal de voz: clips locales, tts y URLs.")
        .field(
            "🎵 Reproducción",
            "`/play` reproduce un clip\n\
             `/playlist` lista los clips disponibles\n\
             `/replay` repite el último clip\n\
             `/stop` corta y vacía la cola\n\
             `/clipinfo` muestra info de un clip",
            false,
        )
        .field(
            "🗣️ Voz sintetizada",
            "`/tts` lee un texto\n\
             `/ttsclip` lee el texto de un clip\n\
             `/smarttts` elige solo la mejor forma de decirlo",
            false,
        )
        .field(
            "👋 Intros y outros",
            "`/setintro` y `/setoutro` eligen tu clip de entrada y de salida",
            false,
        )
        .field(
            "🔌 Conexión",
            "`/join` me trae a tu canal de voz\n`/leave` me despide",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn format_clip_list(clips: &[String]) -> String {
    if clips.is_empty() {
        return "(vacío)".to_string();
    }
    let mut listing = String::new();
    for clip in clips {
        // Los embeds de Discord cortan en 1024 por campo
        if listing.len() + clip.len() + 3 > 1000 {
            listing.push_str("…");
            break;
        }
        listing.push_str(&format!("`{clip}` "));
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_list_respects_discord_field_limit() {
        let clips: Vec<String> = (0..500).map(|i| format!("clip_{i:03}")).collect();
        let listing = format_clip_list(&clips);
        assert!(listing.len() <= 1024);
        assert!(listing.ends_with('…'));
    }

    #[test]
    fn empty_clip_list_has_placeholder() {
        assert_eq!(format_clip_list(&[]), "(vacío)");
    }
}
