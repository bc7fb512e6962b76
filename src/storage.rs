use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub intros_enabled: bool,
    pub outros_enabled: bool,
    /// Canal de texto cuyos mensajes se leen por voz, si hay uno configurado
    pub tts_channel_id: Option<u64>,
    /// Usuarios con prohibido usar el audio en esta guild
    pub banned_users: Vec<u64>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            guild_id: 0,
            intros_enabled: true,
            outros_enabled: true,
            tts_channel_id: None,
            banned_users: Vec::new(),
        }
    }
}

impl GuildSettings {
    pub fn is_banned(&self, user_id: u64) -> bool {
        self.banned_users.contains(&user_id)
    }
}

/// Preferencias por usuario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: u64,
    /// Clip que suena cuando el usuario entra al canal (id tipo `local:x`)
    pub intro: Option<String>,
    /// Clip que suena cuando el usuario se va
    pub outro: Option<String>,
}

/// Manager de almacenamiento basado en archivos JSON
pub struct JsonStorage {
    data_dir: PathBuf,
    guilds_cache: HashMap<u64, GuildSettings>,
    users_cache: HashMap<u64, UserSettings>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;
        fs::create_dir_all(data_dir.join("guilds")).await?;
        fs::create_dir_all(data_dir.join("users")).await?;

        info!("📁 storage inicializado en: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            guilds_cache: HashMap::new(),
            users_cache: HashMap::new(),
        };
        storage.load_all().await?;
        Ok(storage)
    }

    /// Obtiene la configuración de una guild (por defecto si no existe)
    pub fn guild(&mut self, guild_id: u64) -> &mut GuildSettings {
        self.guilds_cache.entry(guild_id).or_insert_with(|| {
            let mut settings = GuildSettings::default();
            settings.guild_id = guild_id;
            settings
        })
    }

    /// Persiste la configuración de una guild tal como está en caché
    pub async fn save_guild(&mut self, guild_id: u64) -> Result<()> {
        let settings = self.guild(guild_id).clone();
        let path = self.guild_path(guild_id);
        fs::write(&path, serde_json::to_string_pretty(&settings)?).await?;
        info!("💾 configuración guardada para guild {guild_id}");
        Ok(())
    }

    pub fn user(&mut self, user_id: u64) -> &mut UserSettings {
        self.users_cache.entry(user_id).or_insert_with(|| UserSettings {
            user_id,
            ..Default::default()
        })
    }

    pub async fn save_user(&mut self, user_id: u64) -> Result<()> {
        let settings = self.user(user_id).clone();
        let path = self.user_path(user_id);
        fs::write(&path, serde_json::to_string_pretty(&settings)?).await?;
        info!("💾 preferencias guardadas para usuario {user_id}");
        Ok(())
    }

    /// Consulta de baneo usada por la resolución de sesiones
    pub fn is_banned(&self, guild_id: u64, user_id: u64) -> bool {
        self.guilds_cache
            .get(&guild_id)
            .map(|g| g.is_banned(user_id))
            .unwrap_or(false)
    }

    fn guild_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("guilds").join(format!("{guild_id}.json"))
    }

    fn user_path(&self, user_id: u64) -> PathBuf {
        self.data_dir.join("users").join(format!("{user_id}.json"))
    }

    async fn load_all(&mut self) -> Result<()> {
        self.guilds_cache = load_dir(self.data_dir.join("guilds"), |g: &GuildSettings| g.guild_id)
            .await;
        self.users_cache =
            load_dir(self.data_dir.join("users"), |u: &UserSettings| u.user_id).await;
        info!(
            "📂 {} guilds y {} usuarios cargados",
            self.guilds_cache.len(),
            self.users_cache.len()
        );
        Ok(())
    }
}

async fn load_dir<T: serde::de::DeserializeOwned>(
    dir: PathBuf,
    key: impl Fn(&T) -> u64,
) -> HashMap<u64, T> {
    let mut out = HashMap::new();
    let Ok(mut entries) = fs::read_dir(&dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    out.insert(key(&value), value);
                }
                Err(e) => warn!("archivo {} inválido, se ignora: {e}", path.display()),
            },
            Err(e) => warn!("no se pudo leer {}: {e}", path.display()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn defaults_are_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();

        let guild = storage.guild(42);
        assert_eq!(guild.guild_id, 42);
        assert!(guild.intros_enabled);
        assert!(guild.banned_users.is_empty());
    }

    #[tokio::test]
    async fn settings_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
            storage.guild(42).tts_channel_id = Some(1234);
            storage.guild(42).banned_users.push(7);
            storage.save_guild(42).await.unwrap();

            storage.user(7).intro = Some("local:math".into());
            storage.save_user(7).await.unwrap();
        }

        let mut storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(storage.guild(42).tts_channel_id, Some(1234));
        assert!(storage.is_banned(42, 7));
        assert!(!storage.is_banned(42, 8));
        assert_eq!(storage.user(7).intro.as_deref(), Some("local:math"));
    }
}
