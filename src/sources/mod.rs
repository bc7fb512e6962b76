pub mod local;
pub mod tts;
pub mod url;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::audio::error::AudioError;

pub use local::LocalClips;
pub use tts::TtsEngine;
pub use url::UrlFetcher;

/// Trait común para todas las fuentes de clips
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Resuelve el payload de un identificador a un clip listo para sonar
    async fn resolve(&self, payload: &str) -> Result<Clip, AudioError>;

    /// Nombre de la fuente (el prefijo del identificador)
    #[allow(dead_code)]
    fn source_name(&self) -> &'static str;
}

/// Una unidad de audio ya resuelta, con sus metadatos.
///
/// Cada instancia se reproduce exactamente una vez: volver a pedir el mismo
/// identificador produce una instancia nueva (incluida una captura temporal
/// fresca si el audio se sintetiza).
#[derive(Debug, Clone)]
pub struct Clip {
    clip_id: String,
    path: PathBuf,
    volume: f32,
    temporary: bool,
    text: String,
}

impl Clip {
    pub fn new(clip_id: String, path: PathBuf, volume: f32, temporary: bool) -> Self {
        Self {
            clip_id,
            path,
            volume: volume.clamp(0.0, 1.0),
            temporary,
            text: String::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    // Getters
    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn volume(&self) -> f32 {
        self.volume
    }
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tipo del clip según su identificador (`local`, `tts`, `url`)
    pub fn kind(&self) -> &str {
        split_identifier(&self.clip_id).0
    }
}

/// Separa un identificador `tipo:payload`. Sin `:` se asume `local`.
pub fn split_identifier(identifier: &str) -> (&str, &str) {
    match identifier.split_once(':') {
        Some((kind, payload)) => (kind, payload),
        None => ("local", identifier),
    }
}

fn audio_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://.*\.(mp3|wav)$").unwrap())
}

fn simplify_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s_]").unwrap())
}

/// Despachador de identificadores de clip a su fuente.
pub struct ClipResolver {
    local: LocalClips,
    tts: TtsEngine,
    url: UrlFetcher,
}

impl ClipResolver {
    pub fn new(local: LocalClips, tts: TtsEngine, url: UrlFetcher) -> Self {
        Self { local, tts, url }
    }

    pub fn local(&self) -> &LocalClips {
        &self.local
    }

    /// Resuelve un identificador `tipo:payload` al clip correspondiente.
    pub async fn resolve(&self, identifier: &str) -> Result<Clip, AudioError> {
        let (kind, payload) = split_identifier(identifier);
        debug!("🔎 resolviendo clip {kind}:{payload}");

        match kind {
            "local" => self.local.resolve(payload).await,
            "tts" => self.tts.resolve(payload).await,
            "url" => self.url.resolve(payload).await,
            _ => Err(AudioError::ClipNotFound(format!(
                "'{identifier}' no es un clip válido. 🤦 Prueba `/playlist`."
            ))),
        }
    }

    /// Mejor esfuerzo para un mensaje libre: primero clip local con el texto
    /// simplificado, después URL de audio directa, y si no, tts plano.
    pub async fn smart_resolve(&self, message: &str) -> Result<Clip, AudioError> {
        let simple = simplify_regex()
            .replace_all(&message.to_lowercase(), "")
            .trim()
            .to_string();

        if !simple.is_empty() {
            if let Ok(clip) = self.local.resolve(&simple).await {
                return Ok(clip);
            }
        }

        if audio_url_regex().is_match(message) {
            return self.resolve(&format!("url:{message}")).await;
        }

        self.resolve(&format!("tts:{message}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identifier_splits_on_first_colon() {
        assert_eq!(split_identifier("local:hello"), ("local", "hello"));
        assert_eq!(split_identifier("tts:hola que tal"), ("tts", "hola que tal"));
        assert_eq!(
            split_identifier("url:http://example.com/a.mp3"),
            ("url", "http://example.com/a.mp3")
        );
    }

    #[test]
    fn bare_identifier_defaults_to_local() {
        assert_eq!(split_identifier("hello"), ("local", "hello"));
    }

    #[test]
    fn clip_volume_is_clamped() {
        let clip = Clip::new("local:x".into(), "/tmp/x.mp3".into(), 3.0, false);
        assert_eq!(clip.volume(), 1.0);
        assert_eq!(clip.kind(), "local");
    }

    #[test]
    fn audio_url_detection() {
        assert!(audio_url_regex().is_match("http://example.com/clip.mp3"));
        assert!(audio_url_regex().is_match("https://example.com/clip.wav"));
        assert!(!audio_url_regex().is_match("https://example.com/video"));
        assert!(!audio_url_regex().is_match("clip.mp3"));
    }
}
