use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub tts_command: String,

    // Paths
    pub data_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub temp_dir: PathBuf,

    // Intros/outros
    pub intro_delay_ms: u64,
    pub outro_delay_ms: u64,

    // Canal al que reportar errores inesperados del canal tts
    pub diagnostics_channel_id: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.6".to_string())
                .parse()?,
            tts_command: std::env::var("TTS_COMMAND")
                .unwrap_or_else(|_| "espeak-ng".to_string()),

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
            clips_dir: std::env::var("CLIPS_DIR")
                .unwrap_or_else(|_| "/app/clips".to_string())
                .into(),
            temp_dir: std::env::var("TEMP_DIR")
                .unwrap_or_else(|_| "/app/temp".to_string())
                .into(),

            // Intros/outros: el de entrada espera a que Discord termine de
            // mover al usuario, el de salida solo deja respirar al canal
            intro_delay_ms: std::env::var("INTRO_DELAY_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            outro_delay_ms: std::env::var("OUTRO_DELAY_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            diagnostics_channel_id: std::env::var("DIAGNOSTICS_CHANNEL_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.clips_dir)?;
        std::fs::create_dir_all(&config.temp_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 1.0, llegó: {}",
                self.default_volume
            );
        }

        if self.tts_command.trim().is_empty() {
            anyhow::bail!("TTS_COMMAND no puede estar vacío");
        }

        if self.intro_delay_ms > 30_000 || self.outro_delay_ms > 30_000 {
            anyhow::bail!("Los delays de intro/outro no pueden pasar de 30 segundos");
        }

        Ok(())
    }

    /// Resumen sin secretos, apto para loguear.
    pub fn summary(&self) -> String {
        format!(
            "Config:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, tts `{}`\n  \
            Paths: clips={}, temp={}, data={}\n  \
            Intros/outros: {}ms / {}ms",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.tts_command,
            self.clips_dir.display(),
            self.temp_dir.display(),
            self.data_dir.display(),
            self.intro_delay_ms,
            self.outro_delay_ms,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            default_volume: 0.6,
            tts_command: "espeak-ng".to_string(),
            data_dir: "/app/data".into(),
            clips_dir: "/app/clips".into(),
            temp_dir: "/app/temp".into(),
            intro_delay_ms: 3000,
            outro_delay_ms: 500,
            diagnostics_channel_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_volume_is_rejected() {
        let config = Config {
            default_volume: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
