use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::connection::{SongbirdConnection, VoiceConnection};
use crate::audio::error::AudioError;
use crate::audio::registry::{SessionRegistry, SessionTarget, VoiceDirectory};
use crate::audio::session::{GuildSession, LastClip};
use crate::sources::ClipResolver;

/// La cara pública del audio: comandos y eventos entran por acá.
///
/// Resuelve la sesión que corresponde a cada contexto, resuelve clips contra
/// sus fuentes y delega en la disciplina interna de cada sesión. Operaciones
/// sobre guilds distintas no comparten ningún lock.
pub struct ClipPlayer {
    registry: SessionRegistry,
    resolver: Arc<ClipResolver>,
}

impl ClipPlayer {
    pub fn new(resolver: Arc<ClipResolver>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<ClipResolver> {
        &self.resolver
    }

    /// Conecta el bot al canal indicado, o mueve la conexión existente si la
    /// guild ya tiene sesión. Nunca hay dos conexiones para una guild.
    pub async fn connect(
        &self,
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), AudioError> {
        if let Some(session) = self.registry.get(guild_id) {
            session.connect(channel_id).await?;
            info!("🔀 movido al canal {channel_id} en guild {guild_id}");
            return Ok(());
        }

        let conn: Arc<dyn VoiceConnection> =
            Arc::new(SongbirdConnection::new(manager, guild_id));
        // Si el join falla no queda sesión a medio crear
        conn.join(channel_id).await?;
        self.registry.insert(GuildSession::new(guild_id, conn));
        info!("🔊 conectado al canal {channel_id} en guild {guild_id}");
        Ok(())
    }

    /// Desconecta y destruye la sesión de la guild; la cola pendiente se
    /// descarta.
    pub async fn disconnect(&self, guild_id: GuildId) -> Result<(), AudioError> {
        let session = self.registry.remove(guild_id).ok_or_else(|| {
            AudioError::SessionNotFound(
                "No estoy conectado a ningún canal de voz de este servidor.".to_string(),
            )
        })?;
        session.teardown().await?;
        info!("👋 sesión cerrada en guild {guild_id}");
        Ok(())
    }

    /// Resuelve y encola un clip. No conecta solo: sin sesión para el
    /// contexto, el error llega al usuario tal cual.
    pub async fn play(
        &self,
        identifier: &str,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<String, AudioError> {
        // Sesión primero: resolver tts/url materializa temporales que no
        // queremos huérfanos si el bot no está conectado.
        let session = self.registry.resolve(target, directory).await?;
        let clip = self.resolver.resolve(identifier).await?;
        let clip_id = clip.clip_id().to_string();
        session.enqueue(clip).await?;
        Ok(clip_id)
    }

    /// Como `play`, pero con un mensaje libre: clip local si el texto
    /// simplificado coincide, URL de audio directa, o tts como último
    /// recurso.
    pub async fn play_smart(
        &self,
        message: &str,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<String, AudioError> {
        let session = self.registry.resolve(target, directory).await?;
        let clip = self.resolver.smart_resolve(message).await?;
        let clip_id = clip.clip_id().to_string();
        session.enqueue(clip).await?;
        Ok(clip_id)
    }

    /// Corta el clip actual y vacía la cola del contexto.
    pub async fn stop(
        &self,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<(), AudioError> {
        let session = self.registry.resolve(target, directory).await?;
        session.stop().await;
        Ok(())
    }

    /// Vuelve a encolar el último clip sonado, resolviéndolo de cero (una
    /// síntesis nueva si era tts). Devuelve `None` si todavía no sonó nada.
    pub async fn replay(
        &self,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<Option<String>, AudioError> {
        let session = self.registry.resolve(target, directory).await?;
        let Some(last) = session.last_clip().await else {
            return Ok(None);
        };

        debug!("🔁 replay de {} en guild {}", last.clip_id, session.guild_id());
        let clip = self.resolver.resolve(&last.clip_id).await?;
        let clip_id = clip.clip_id().to_string();
        session.enqueue(clip).await?;
        Ok(Some(clip_id))
    }

    /// El último clip sonado en el contexto, si hay.
    pub async fn last_clip(
        &self,
        target: SessionTarget,
        directory: &dyn VoiceDirectory,
    ) -> Result<Option<LastClip>, AudioError> {
        let session = self.registry.resolve(target, directory).await?;
        Ok(session.last_clip().await)
    }

    /// Canal en el que está la sesión de la guild, si existe.
    pub fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.registry.get(guild_id)?.current_channel()
    }

    #[allow(dead_code)]
    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.registry.get(guild_id).is_some()
    }
}
