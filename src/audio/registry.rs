use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::debug;

use crate::audio::error::AudioError;
use crate::audio::session::GuildSession;

/// Quién está dónde y quién tiene prohibido hablar: la vista de presencia y
/// baneos que necesita la resolución de sesiones. La implementación real sale
/// de la caché de Discord y del almacenamiento de la guild.
#[async_trait]
pub trait VoiceDirectory: Send + Sync {
    /// Canal de voz en el que está el usuario dentro de la guild, si hay.
    async fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;

    /// Lista de baneados de la guild.
    async fn is_banned(&self, guild_id: GuildId, user_id: UserId) -> bool;
}

/// El contexto desde el que un evento busca su sesión.
#[derive(Debug, Clone, Copy)]
pub enum SessionTarget {
    /// Una guild concreta (comandos usados dentro de un servidor).
    Guild(GuildId),
    /// Un canal concreto (eventos de presencia de voz).
    Channel(GuildId, ChannelId),
    /// Solo un usuario (mensajes privados): se busca la sesión cuyo canal
    /// lo contenga.
    User(UserId),
}

/// Colección de sesiones activas, a lo sumo una por guild.
///
/// Las sesiones nacen cuando un connect encuentra la guild sin sesión y
/// mueren cuando alguien desconecta explícitamente.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn insert(&self, session: Arc<GuildSession>) {
        debug!("📒 sesión registrada para guild {}", session.guild_id());
        self.sessions.insert(session.guild_id(), session);
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.remove(&guild_id).map(|(_, s)| s)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resuelve la sesión que corresponde al contexto de un evento.
    ///
    /// `SessionNotFound` y `AccessDenied` se mantienen separados a propósito:
    /// "no estoy en ningún canal contigo" y "estás baneado acá" merecen
    /// respuestas distintas.
    pub async fn resolve(
        &self,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<Arc<GuildSession>, AudioError> {
        match target {
            SessionTarget::Guild(guild_id) | SessionTarget::Channel(guild_id, _) => {
                self.get(guild_id).ok_or_else(|| {
                    AudioError::SessionNotFound(
                        "No estoy en ningún canal de voz de este servidor. \
                         Pedile a un admin que me invoque con `/join`."
                            .to_string(),
                    )
                })
            }
            SessionTarget::User(user_id) => self.resolve_by_user(user_id, directory).await,
        }
    }

    async fn resolve_by_user(
        &self,
        user_id: UserId,
        directory: &dyn VoiceDirectory,
    ) -> Result<Arc<GuildSession>, AudioError> {
        let sessions: Vec<Arc<GuildSession>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();

        for session in sessions {
            let Some(bot_channel) = session.current_channel() else {
                continue;
            };
            let guild_id = session.guild_id();
            if directory.user_channel(guild_id, user_id).await != Some(bot_channel) {
                continue;
            }
            if directory.is_banned(guild_id, user_id).await {
                return Err(AudioError::AccessDenied(
                    "Buen intento, pero estás baneado en el canal de voz en el que estoy."
                        .to_string(),
                ));
            }
            return Ok(session);
        }

        Err(AudioError::SessionNotFound(
            "No estás en ningún canal de voz en el que esté yo.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::connection::{testing::FakeConnection, VoiceConnection};
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};

    struct FakeDirectory {
        channels: HashMap<(GuildId, UserId), ChannelId>,
        banned: HashSet<(GuildId, UserId)>,
    }

    #[async_trait]
    impl VoiceDirectory for FakeDirectory {
        async fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
            self.channels.get(&(guild_id, user_id)).copied()
        }

        async fn is_banned(&self, guild_id: GuildId, user_id: UserId) -> bool {
            self.banned.contains(&(guild_id, user_id))
        }
    }

    async fn registry_with_session(guild: u64, channel: u64) -> SessionRegistry {
        let registry = SessionRegistry::new();
        let conn = FakeConnection::new();
        conn.join(ChannelId::new(channel)).await.unwrap();
        registry.insert(GuildSession::new(GuildId::new(guild), conn));
        registry
    }

    #[tokio::test]
    async fn resolves_by_guild() {
        let registry = registry_with_session(1, 10).await;
        let directory = FakeDirectory {
            channels: HashMap::new(),
            banned: HashSet::new(),
        };

        let session = registry
            .resolve(SessionTarget::Guild(GuildId::new(1)), &directory)
            .await
            .unwrap();
        assert_eq!(session.guild_id(), GuildId::new(1));

        let err = registry
            .resolve(SessionTarget::Guild(GuildId::new(2)), &directory)
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn resolves_by_user_presence() {
        let registry = registry_with_session(1, 10).await;
        let user = UserId::new(7);
        let directory = FakeDirectory {
            channels: HashMap::from([((GuildId::new(1), user), ChannelId::new(10))]),
            banned: HashSet::new(),
        };

        let session = registry
            .resolve(SessionTarget::User(user), &directory)
            .await
            .unwrap();
        assert_eq!(session.guild_id(), GuildId::new(1));
    }

    #[tokio::test]
    async fn user_in_other_channel_is_not_found() {
        let registry = registry_with_session(1, 10).await;
        let user = UserId::new(7);
        let directory = FakeDirectory {
            channels: HashMap::from([((GuildId::new(1), user), ChannelId::new(99))]),
            banned: HashSet::new(),
        };

        let err = registry
            .resolve(SessionTarget::User(user), &directory)
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn banned_user_gets_access_denied_not_not_found() {
        let registry = registry_with_session(1, 10).await;
        let user = UserId::new(7);
        let directory = FakeDirectory {
            channels: HashMap::from([((GuildId::new(1), user), ChannelId::new(10))]),
            banned: HashSet::from([(GuildId::new(1), user)]),
        };

        let err = registry
            .resolve(SessionTarget::User(user), &directory)
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn one_session_per_guild() {
        let registry = registry_with_session(1, 10).await;

        let conn = FakeConnection::new();
        conn.join(ChannelId::new(20)).await.unwrap();
        registry.insert(GuildSession::new(GuildId::new(1), conn));

        assert_eq!(registry.len(), 1);
    }
}
