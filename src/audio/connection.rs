use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::File,
    tracks::PlayMode,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::audio::error::AudioError;
use crate::sources::Clip;

/// Notificación de que un clip terminó de sonar.
///
/// El backend la invoca exactamente una vez por clip iniciado, haya terminado
/// bien o con error.
#[async_trait]
pub trait PlaybackListener: Send + Sync {
    async fn clip_ended(&self, error: Option<AudioError>);
}

/// Un enlace de audio vivo con un canal de voz de una guild.
///
/// Hay exactamente una conexión por guild, propiedad de su sesión; cambiar de
/// canal reutiliza la conexión en vez de crear otra.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Conecta al canal, o mueve la conexión existente si ya había una.
    async fn join(&self, channel: ChannelId) -> Result<(), AudioError>;

    /// Empieza a reproducir el clip; `listener` se dispara al terminar.
    async fn play(&self, clip: &Clip, listener: Arc<dyn PlaybackListener>)
        -> Result<(), AudioError>;

    /// Corta lo que esté sonando. El callback de fin se dispara igual.
    async fn stop(&self);

    async fn disconnect(&self) -> Result<(), AudioError>;

    #[allow(dead_code)]
    fn is_playing(&self) -> bool;

    fn current_channel(&self) -> Option<ChannelId>;
}

/// Implementación sobre songbird.
pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: parking_lot::Mutex<Option<Arc<tokio::sync::Mutex<Call>>>>,
    current: Arc<parking_lot::Mutex<Option<songbird::tracks::TrackHandle>>>,
    channel: parking_lot::Mutex<Option<ChannelId>>,
}

impl SongbirdConnection {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId) -> Self {
        Self {
            manager,
            guild_id,
            call: parking_lot::Mutex::new(None),
            current: Arc::new(parking_lot::Mutex::new(None)),
            channel: parking_lot::Mutex::new(None),
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn join(&self, channel: ChannelId) -> Result<(), AudioError> {
        // songbird reutiliza el mismo Call al volver a unirse: un join sobre
        // una conexión viva es un move, nunca una segunda conexión.
        match self.manager.join(self.guild_id, channel).await {
            Ok(call) => {
                *self.call.lock() = Some(call);
                *self.channel.lock() = Some(channel);
                debug!("🔊 conexión de voz lista en canal {channel}");
                Ok(())
            }
            Err(e) => {
                error!("error al unirse al canal de voz: {e:?}");
                Err(AudioError::Connection(format!(
                    "No pude unirme al canal de voz: {e}"
                )))
            }
        }
    }

    async fn play(
        &self,
        clip: &Clip,
        listener: Arc<dyn PlaybackListener>,
    ) -> Result<(), AudioError> {
        let call = self.call.lock().clone().ok_or_else(|| {
            AudioError::Connection("No hay conexión de voz activa.".to_string())
        })?;

        let input = File::new(clip.path().to_path_buf());
        let mut handler = call.lock().await;
        let track = handler.play_input(input.into());
        let _ = track.set_volume(clip.volume());

        let watcher = ClipEndHandler {
            listener,
            fired: Arc::new(AtomicBool::new(false)),
            current: self.current.clone(),
        };
        track
            .add_event(Event::Track(TrackEvent::End), watcher.clone())
            .map_err(|e| AudioError::Playback(format!("no se pudo observar el track: {e}")))?;
        track
            .add_event(Event::Track(TrackEvent::Error), watcher)
            .map_err(|e| AudioError::Playback(format!("no se pudo observar el track: {e}")))?;

        *self.current.lock() = Some(track);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(track) = self.current.lock().clone() {
            // stop() hace que el driver dispare el evento End normal
            let _ = track.stop();
        }
    }

    async fn disconnect(&self) -> Result<(), AudioError> {
        self.current.lock().take();
        *self.channel.lock() = None;
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| AudioError::Connection(format!("error al desconectar: {e}")))
    }

    fn is_playing(&self) -> bool {
        self.current.lock().is_some()
    }

    fn current_channel(&self) -> Option<ChannelId> {
        *self.channel.lock()
    }
}

/// Observa el fin de un track y lo traduce a `PlaybackListener`.
///
/// Se registra para End y Error; el flag compartido garantiza una sola
/// notificación por clip.
#[derive(Clone)]
struct ClipEndHandler {
    listener: Arc<dyn PlaybackListener>,
    fired: Arc<AtomicBool>,
    current: Arc<parking_lot::Mutex<Option<songbird::tracks::TrackHandle>>>,
}

#[async_trait]
impl VoiceEventHandler for ClipEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return None;
        }

        let error = if let EventContext::Track(track_list) = ctx {
            track_list.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(AudioError::Playback(e.to_string())),
                _ => None,
            })
        } else {
            None
        };

        self.current.lock().take();
        self.listener.clip_ended(error).await;
        None
    }
}

/// Conexión falsa para tests: registra las llamadas y deja que el test
/// dispare las terminaciones a mano, igual que haría el driver.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Default)]
    pub struct FakeState {
        pub playing: Option<(String, Arc<dyn PlaybackListener>)>,
        pub played: Vec<String>,
        pub joins: Vec<ChannelId>,
        pub stops: usize,
        pub channel: Option<ChannelId>,
        pub disconnected: bool,
        pub overlapped: bool,
    }

    #[derive(Default)]
    pub struct FakeConnection {
        pub state: parking_lot::Mutex<FakeState>,
    }

    impl FakeConnection {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Simula el evento de fin que dispararía el driver.
        pub async fn finish(&self, error: Option<AudioError>) {
            let listener = self.state.lock().playing.take().map(|(_, l)| l);
            if let Some(listener) = listener {
                listener.clip_ended(error).await;
            }
        }

        pub fn now_playing(&self) -> Option<String> {
            self.state.lock().playing.as_ref().map(|(id, _)| id.clone())
        }

        pub fn played(&self) -> Vec<String> {
            self.state.lock().played.clone()
        }
    }

    #[async_trait]
    impl VoiceConnection for FakeConnection {
        async fn join(&self, channel: ChannelId) -> Result<(), AudioError> {
            let mut state = self.state.lock();
            state.joins.push(channel);
            state.channel = Some(channel);
            Ok(())
        }

        async fn play(
            &self,
            clip: &Clip,
            listener: Arc<dyn PlaybackListener>,
        ) -> Result<(), AudioError> {
            let mut state = self.state.lock();
            if state.playing.is_some() {
                // dos clips sonando a la vez: el invariante que los tests vigilan
                state.overlapped = true;
            }
            state.played.push(clip.clip_id().to_string());
            state.playing = Some((clip.clip_id().to_string(), listener));
            Ok(())
        }

        async fn stop(&self) {
            self.state.lock().stops += 1;
        }

        async fn disconnect(&self) -> Result<(), AudioError> {
            let mut state = self.state.lock();
            state.disconnected = true;
            state.channel = None;
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.state.lock().playing.is_some()
        }

        fn current_channel(&self) -> Option<ChannelId> {
            self.state.lock().channel
        }
    }
}
