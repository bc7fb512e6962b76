use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::audio::connection::{PlaybackListener, VoiceConnection};
use crate::audio::error::AudioError;
use crate::audio::queue::ClipQueue;
use crate::sources::Clip;

/// Referencia débil al último clip iniciado: identidad y datos de limpieza,
/// nunca el audio en sí.
#[derive(Debug, Clone)]
pub struct LastClip {
    pub clip_id: String,
    pub path: PathBuf,
    pub temporary: bool,
    #[allow(dead_code)]
    pub text: String,
}

impl LastClip {
    fn of(clip: &Clip) -> Self {
        Self {
            clip_id: clip.clip_id().to_string(),
            path: clip.path().to_path_buf(),
            temporary: clip.is_temporary(),
            text: clip.text().to_string(),
        }
    }
}

#[derive(Default)]
struct SessionState {
    queue: ClipQueue,
    playing: bool,
    /// Se incrementa en stop/teardown; una terminación con generación vieja
    /// limpia pero no avanza la cola.
    generation: u64,
    last_clip: Option<LastClip>,
}

/// La sesión de audio de una guild: dueña de la conexión de voz, de la cola
/// de clips y del último clip sonado.
///
/// Todo el estado mutable vive detrás de un único mutex async, así que
/// enqueue, stop y el callback de terminación quedan serializados por sesión:
/// nunca arrancan dos clips a la vez ni queda un clip varado con la conexión
/// ociosa. El mutex de tokio atiende en orden de llegada, lo que da el orden
/// FIFO entre enqueues que compiten.
pub struct GuildSession {
    guild_id: GuildId,
    conn: Arc<dyn VoiceConnection>,
    state: tokio::sync::Mutex<SessionState>,
    /// Autorreferencia débil para armar los listeners de terminación.
    this: Weak<GuildSession>,
}

impl std::fmt::Debug for GuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildSession")
            .field("guild_id", &self.guild_id)
            .finish_non_exhaustive()
    }
}

impl GuildSession {
    pub fn new(guild_id: GuildId, conn: Arc<dyn VoiceConnection>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            guild_id,
            conn,
            state: tokio::sync::Mutex::new(SessionState::default()),
            this: this.clone(),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Canal en el que está la conexión de esta sesión, si sigue viva.
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.conn.current_channel()
    }

    /// Conecta o mueve la conexión de voz al canal indicado.
    pub async fn connect(&self, channel: ChannelId) -> Result<(), AudioError> {
        self.conn.join(channel).await
    }

    /// Encola un clip; si la conexión está ociosa arranca en el acto.
    ///
    /// El chequeo-y-arranque ocurre bajo el lock de la sesión, así que no
    /// puede cruzarse con el callback de terminación.
    pub async fn enqueue(&self, clip: Clip) -> Result<(), AudioError> {
        let mut state = self.state.lock().await;
        state.queue.push(clip);
        if !state.playing {
            self.start_next(&mut state).await;
        }
        Ok(())
    }

    /// Descarta la cola y corta el clip actual. Idempotente: sobre una sesión
    /// ociosa no hace nada.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.queue.clear();
        state.generation += 1;
        if state.playing {
            self.conn.stop().await;
        }
        if dropped > 0 {
            info!("🗑️ {} clips descartados en guild {}", dropped, self.guild_id);
        }
    }

    /// Desarma la sesión: corta, vacía la cola, recicla el último temporal y
    /// tira la conexión de voz.
    pub async fn teardown(&self) -> Result<(), AudioError> {
        let mut state = self.state.lock().await;
        state.queue.clear();
        state.generation += 1;
        if state.playing {
            self.conn.stop().await;
        }
        // El diferido de un clip dejaría colgado el último temporal de la
        // sesión; al desconectar ya nadie puede repetirlo.
        if let Some(last) = state.last_clip.take() {
            if last.temporary {
                remove_temp_file(&last.path);
            }
        }
        self.conn.disconnect().await
    }

    pub async fn last_clip(&self) -> Option<LastClip> {
        self.state.lock().await.last_clip.clone()
    }

    #[allow(dead_code)]
    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        !state.playing && state.queue.is_empty()
    }

    #[allow(dead_code)]
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Arranca el primer clip de la cola que consiga sonar.
    ///
    /// Se llama con el lock tomado. Un clip que no arranca se descarta (y se
    /// recicla su temporal) y se prueba el siguiente: un clip malo no frena
    /// la sesión.
    async fn start_next(&self, state: &mut SessionState) {
        while let Some(clip) = state.queue.pop() {
            let listener = Arc::new(ClipEndListener {
                session: self.this.clone(),
                generation: state.generation,
            });

            match self.conn.play(&clip, listener).await {
                Ok(()) => {
                    info!("▶️ sonando {} en guild {}", clip.clip_id(), self.guild_id);
                    // Borrado diferido: el temporal anterior recién se
                    // recicla cuando arranca otro clip con distinto archivo,
                    // para que repetir el último siga funcionando.
                    if let Some(prev) = state.last_clip.take() {
                        if prev.temporary && prev.path != clip.path() {
                            remove_temp_file(&prev.path);
                        }
                    }
                    state.last_clip = Some(LastClip::of(&clip));
                    state.playing = true;
                    return;
                }
                Err(e) => {
                    warn!(
                        "⚠️ no se pudo arrancar {} en guild {}: {e}",
                        clip.clip_id(),
                        self.guild_id
                    );
                    if clip.is_temporary() {
                        remove_temp_file(clip.path());
                    }
                }
            }
        }
        state.playing = false;
    }

    /// Callback de terminación del backend: exactamente uno por clip
    /// iniciado.
    async fn on_clip_end(&self, generation: u64, error: Option<AudioError>) {
        let mut state = self.state.lock().await;
        if let Some(e) = error {
            // Un error de reproducción nunca tumba la sesión
            warn!("⚠️ error de reproducción en guild {}: {e}", self.guild_id);
        }
        state.playing = false;

        if generation != state.generation {
            // Hubo un stop entre medio: lo que se haya encolado después
            // espera al próximo enqueue.
            debug!("clip cortado en guild {}; la cola no avanza", self.guild_id);
            return;
        }

        if !state.queue.is_empty() {
            self.start_next(&mut state).await;
        }
    }
}

/// Puentea el callback del backend hacia la sesión, con la generación vista
/// al arrancar el clip.
struct ClipEndListener {
    session: Weak<GuildSession>,
    generation: u64,
}

#[async_trait]
impl PlaybackListener for ClipEndListener {
    async fn clip_ended(&self, error: Option<AudioError>) {
        if let Some(session) = self.session.upgrade() {
            session.on_clip_end(self.generation, error).await;
        }
    }
}

fn remove_temp_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("🗑️ temporal reciclado: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("no se pudo borrar el temporal {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::connection::testing::FakeConnection;
    use pretty_assertions::assert_eq;

    fn clip(id: &str) -> Clip {
        Clip::new(id.to_string(), PathBuf::from(format!("/tmp/{id}.mp3")), 0.5, false)
    }

    fn temp_clip(id: &str, path: &Path) -> Clip {
        Clip::new(id.to_string(), path.to_path_buf(), 0.5, true)
    }

    fn session_with_fake() -> (Arc<GuildSession>, Arc<FakeConnection>) {
        let conn = FakeConnection::new();
        let session = GuildSession::new(GuildId::new(1), conn.clone());
        (session, conn)
    }

    #[tokio::test]
    async fn plays_clips_in_fifo_order_one_at_a_time() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        assert_eq!(conn.now_playing().as_deref(), Some("local:a"));

        // Con la conexión ocupada, b y c esperan en la cola
        session.enqueue(clip("local:b")).await.unwrap();
        session.enqueue(clip("local:c")).await.unwrap();
        assert_eq!(session.queue_len().await, 2);
        assert_eq!(conn.now_playing().as_deref(), Some("local:a"));

        conn.finish(None).await;
        assert_eq!(conn.now_playing().as_deref(), Some("local:b"));

        conn.finish(None).await;
        assert_eq!(conn.now_playing().as_deref(), Some("local:c"));

        conn.finish(None).await;
        assert!(session.is_idle().await);
        assert_eq!(conn.played(), vec!["local:a", "local:b", "local:c"]);
        assert!(!conn.state.lock().overlapped);
    }

    #[tokio::test]
    async fn enqueue_on_idle_starts_synchronously() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        assert_eq!(conn.now_playing().as_deref(), Some("local:a"));
        assert_eq!(session.queue_len().await, 0);
    }

    #[tokio::test]
    async fn stop_clears_queue_and_does_not_advance() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        session.enqueue(clip("local:b")).await.unwrap();
        session.enqueue(clip("local:c")).await.unwrap();

        session.stop().await;
        assert_eq!(session.queue_len().await, 0);
        assert_eq!(conn.state.lock().stops, 1);

        // La terminación del clip cortado llega después del stop
        conn.finish(None).await;
        assert!(session.is_idle().await);
        assert_eq!(conn.played(), vec!["local:a"]);

        // Un enqueue posterior arranca en el acto
        session.enqueue(clip("local:d")).await.unwrap();
        assert_eq!(conn.now_playing().as_deref(), Some("local:d"));
    }

    #[tokio::test]
    async fn completion_after_stop_never_starts_racing_enqueues() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        session.stop().await;

        // Carrera: un enqueue se cuela entre el stop y la terminación de a
        session.enqueue(clip("local:d")).await.unwrap();
        conn.finish(None).await;

        // d no arranca solo; espera al siguiente enqueue
        assert!(conn.now_playing().is_none());
        assert_eq!(session.queue_len().await, 1);

        session.enqueue(clip("local:e")).await.unwrap();
        assert_eq!(conn.now_playing().as_deref(), Some("local:d"));
    }

    #[tokio::test]
    async fn stop_on_idle_session_is_a_noop() {
        let (session, conn) = session_with_fake();

        session.stop().await;
        session.stop().await;
        assert_eq!(conn.state.lock().stops, 0);
        assert!(session.is_idle().await);
    }

    #[tokio::test]
    async fn playback_error_still_advances_queue() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        session.enqueue(clip("local:b")).await.unwrap();

        conn.finish(Some(AudioError::Playback("se rompió el códec".into())))
            .await;
        assert_eq!(conn.now_playing().as_deref(), Some("local:b"));
    }

    #[tokio::test]
    async fn temporary_file_is_deleted_one_clip_late() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = dir.path().join("tts-1.wav");
        let t2 = dir.path().join("tts-2.wav");
        std::fs::write(&t1, b"wav").unwrap();
        std::fs::write(&t2, b"wav").unwrap();

        let (session, conn) = session_with_fake();

        session.enqueue(temp_clip("tts:uno", &t1)).await.unwrap();
        conn.finish(None).await;
        // Terminó pero sigue siendo el último clip: se conserva para replay
        assert!(t1.exists());

        session.enqueue(temp_clip("tts:dos", &t2)).await.unwrap();
        // Arrancó otro clip con otro archivo: ahora sí se recicla
        assert!(!t1.exists());
        assert!(t2.exists());
    }

    #[tokio::test]
    async fn replaying_same_file_does_not_delete_it() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = dir.path().join("tts-1.wav");
        std::fs::write(&t1, b"wav").unwrap();

        let (session, conn) = session_with_fake();

        session.enqueue(temp_clip("tts:uno", &t1)).await.unwrap();
        conn.finish(None).await;
        session.enqueue(temp_clip("tts:uno", &t1)).await.unwrap();

        assert!(t1.exists());
        let _ = std::fs::remove_file(&t1);
    }

    #[tokio::test]
    async fn teardown_cleans_dangling_temporary_and_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = dir.path().join("tts-1.wav");
        std::fs::write(&t1, b"wav").unwrap();

        let (session, conn) = session_with_fake();

        session.enqueue(temp_clip("tts:uno", &t1)).await.unwrap();
        conn.finish(None).await;
        assert!(t1.exists());

        session.teardown().await.unwrap();
        assert!(!t1.exists());
        assert!(conn.state.lock().disconnected);
    }

    #[tokio::test]
    async fn last_clip_survives_completion_for_replay() {
        let (session, conn) = session_with_fake();

        session.enqueue(clip("local:a")).await.unwrap();
        conn.finish(None).await;

        let last = session.last_clip().await.unwrap();
        assert_eq!(last.clip_id, "local:a");
    }
}
