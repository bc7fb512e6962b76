use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};
use url::Url;

use super::{Clip, ClipSource};
use crate::audio::error::AudioError;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CLIP_BYTES: usize = 25 * 1024 * 1024;

/// Descarga de clips mp3/wav remotos a un archivo temporal.
pub struct UrlFetcher {
    client: reqwest::Client,
    temp_dir: PathBuf,
    volume: f32,
}

impl UrlFetcher {
    pub fn new(temp_dir: PathBuf, volume: f32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            temp_dir,
            volume,
        })
    }

    fn parse_audio_url(payload: &str) -> Result<Url, AudioError> {
        let parsed = Url::parse(payload).map_err(|_| {
            AudioError::ClipNotFound(format!("'{payload}' no parece una URL válida."))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AudioError::ClipNotFound(
                "Solo URLs http/https, por favor.".to_string(),
            ));
        }
        let suffix = extension_of(&parsed);
        if !matches!(suffix.as_deref(), Some("mp3") | Some("wav")) {
            return Err(AudioError::ClipNotFound(
                "Solo sé reproducir URLs que terminen en .mp3 o .wav".to_string(),
            ));
        }
        Ok(parsed)
    }
}

fn extension_of(url: &Url) -> Option<String> {
    let path = url.path();
    let (_, ext) = path.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[async_trait]
impl ClipSource for UrlFetcher {
    async fn resolve(&self, payload: &str) -> Result<Clip, AudioError> {
        let parsed = Self::parse_audio_url(payload)?;
        let suffix = format!(".{}", extension_of(&parsed).unwrap_or_else(|| "mp3".into()));

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("descarga de clip falló: {e}");
                AudioError::ClipNotFound(format!("No pude descargar ese audio: {e}"))
            })?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::ClipNotFound(format!("No pude descargar ese audio: {e}")))?;
        if bytes.len() > MAX_CLIP_BYTES {
            return Err(AudioError::ClipNotFound(
                "Ese audio es demasiado grande 🐘".to_string(),
            ));
        }

        let file = tempfile::Builder::new()
            .prefix("url-")
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|e| AudioError::ClipNotFound(format!("No pude guardar el audio: {e}")))?;
        let (_, path) = file
            .keep()
            .map_err(|e| AudioError::ClipNotFound(format!("No pude guardar el audio: {e}")))?;

        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            let _ = std::fs::remove_file(&path);
            return Err(AudioError::ClipNotFound(format!(
                "No pude guardar el audio: {e}"
            )));
        }

        debug!("⬇️ clip descargado en {}", path.display());
        Ok(Clip::new(format!("url:{payload}"), path, self.volume, true))
    }

    fn source_name(&self) -> &'static str {
        "url"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_http_audio_urls() {
        assert!(UrlFetcher::parse_audio_url("http://example.com/a.mp3").is_ok());
        assert!(UrlFetcher::parse_audio_url("https://example.com/b.WAV").is_ok());

        assert!(UrlFetcher::parse_audio_url("ftp://example.com/a.mp3").is_err());
        assert!(UrlFetcher::parse_audio_url("https://example.com/a.ogg").is_err());
        assert!(UrlFetcher::parse_audio_url("no-es-url").is_err());
    }

    #[test]
    fn query_string_does_not_confuse_extension() {
        // La extensión sale del path, no de la query
        assert!(UrlFetcher::parse_audio_url("https://example.com/a.mp3?t=1").is_ok());
        assert!(UrlFetcher::parse_audio_url("https://example.com/a?f=.mp3").is_err());
    }
}
