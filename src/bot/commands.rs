use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        playlist_command(),
        stop_command(),
        replay_command(),
        clipinfo_command(),
        tts_command(),
        ttsclip_command(),
        smarttts_command(),
        setintro_command(),
        setoutro_command(),
        join_command(),
        leave_command(),
        help_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce un clip de audio")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "clip",
                "Nombre o ClipID (local:hola, tts:un texto, url:http://...)",
            )
            .required(true),
        )
}

fn playlist_command() -> CreateCommand {
    CreateCommand::new("playlist")
        .description("Lista los clips disponibles para /play")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "section",
            "Sección concreta, o `new` para los más recientes",
        ))
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Corta el audio actual y vacía la cola")
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay").description("Repite el último clip que sonó")
}

fn clipinfo_command() -> CreateCommand {
    CreateCommand::new("clipinfo")
        .description("Muestra información y el archivo de un clip")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "clipid",
            "ClipID (sin esto, el último clip sonado)",
        ))
}

// Comandos de voz sintetizada

fn tts_command() -> CreateCommand {
    CreateCommand::new("tts")
        .description("Lee un texto en el canal de voz")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "text", "Qué decir")
                .required(true),
        )
}

fn ttsclip_command() -> CreateCommand {
    CreateCommand::new("ttsclip")
        .description("Lee con voz sintetizada el texto de un clip")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "clip", "Clip con texto")
                .required(true),
        )
}

fn smarttts_command() -> CreateCommand {
    CreateCommand::new("smarttts")
        .description("Busca la mejor forma de decir algo (clip local, url o tts)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "message", "Qué decir")
                .required(true),
        )
}

// Intros y outros

fn setintro_command() -> CreateCommand {
    CreateCommand::new("setintro")
        .description("Elige el clip que te presenta al entrar a un canal")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "clip",
            "Nombre del clip (sin esto, muestra tu intro actual)",
        ))
}

fn setoutro_command() -> CreateCommand {
    CreateCommand::new("setoutro")
        .description("Elige el clip que te despide al salir de un canal")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "clip",
            "Nombre del clip (sin esto, muestra tu outro actual)",
        ))
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra información de ayuda")
}
