use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{Clip, ClipSource};
use crate::audio::error::AudioError;

/// Metadatos opcionales de un clip local, cargados de `clipinfo.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalClipInfo {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Fuente de clips locales: los mp3/wav bajo el directorio de clips,
/// organizados en secciones (un subdirectorio por sección).
pub struct LocalClips {
    clips_dir: PathBuf,
    default_volume: f32,
    info: HashMap<String, LocalClipInfo>,
}

impl LocalClips {
    pub async fn load(clips_dir: PathBuf, default_volume: f32) -> Result<Self> {
        tokio::fs::create_dir_all(&clips_dir).await?;

        let info_file = clips_dir.join("clipinfo.json");
        let info = match tokio::fs::read_to_string(&info_file).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("clipinfo.json inválido, se ignora: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        info!(
            "📁 clips locales en {} ({} con metadatos)",
            clips_dir.display(),
            info.len()
        );

        Ok(Self {
            clips_dir,
            default_volume,
            info,
        })
    }

    /// Busca `nombre.mp3` o `nombre.wav` en cualquier sección.
    fn find(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return None;
        }
        find_in_dir(&self.clips_dir, name)
    }

    /// Secciones disponibles, ordenadas.
    pub fn sections(&self) -> Vec<String> {
        let mut dirs: Vec<String> = read_dir_entries(&self.clips_dir)
            .into_iter()
            .filter(|e| e.path.is_dir())
            .map(|e| e.name)
            .collect();
        dirs.sort();
        dirs
    }

    /// Clips de una sección, ordenados.
    pub fn section_clips(&self, section: &str) -> Vec<String> {
        if section.contains(['/', '\\', '.']) {
            return Vec::new();
        }
        let mut clips: Vec<String> = read_dir_entries(&self.clips_dir.join(section))
            .into_iter()
            .filter_map(|e| clip_stem(&e.path))
            .collect();
        clips.sort();
        clips
    }

    /// Todos los clips de todas las secciones, ordenados.
    pub fn all_clips(&self) -> Vec<String> {
        let mut clips: Vec<String> = self
            .sections()
            .iter()
            .flat_map(|s| self.section_clips(s))
            .collect();
        clips.sort();
        clips
    }

    /// Los `limit` clips agregados más recientemente, del más nuevo al más
    /// viejo, con su fecha de alta.
    pub fn recent_clips(&self, limit: usize) -> Vec<(String, DateTime<Utc>)> {
        let mut entries: Vec<(String, DateTime<Utc>)> = self
            .sections()
            .iter()
            .flat_map(|s| read_dir_entries(&self.clips_dir.join(s)))
            .filter_map(|e| {
                let stem = clip_stem(&e.path)?;
                let modified = e.path.metadata().ok()?.modified().ok()?;
                Some((stem, DateTime::<Utc>::from(modified)))
            })
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(limit);
        entries
    }

    #[allow(dead_code)]
    pub fn clip_info(&self, name: &str) -> Option<&LocalClipInfo> {
        self.info.get(name)
    }
}

#[async_trait]
impl ClipSource for LocalClips {
    async fn resolve(&self, payload: &str) -> Result<Clip, AudioError> {
        let name = payload.trim();
        let path = self.find(name).ok_or_else(|| {
            AudioError::ClipNotFound(format!(
                "'{name}' no es un clip válido. 🤦 Prueba `/playlist`."
            ))
        })?;

        let info = self.info.get(name).cloned().unwrap_or_default();
        let volume = info.volume.unwrap_or(self.default_volume);

        debug!("🎧 clip local: {}", path.display());
        Ok(Clip::new(format!("local:{name}"), path, volume, false).with_text(info.text))
    }

    fn source_name(&self) -> &'static str {
        "local"
    }
}

struct DirEntry {
    name: String,
    path: PathBuf,
}

fn read_dir_entries(dir: &Path) -> Vec<DirEntry> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    read.filter_map(|e| e.ok())
        .map(|e| DirEntry {
            name: e.file_name().to_string_lossy().into_owned(),
            path: e.path(),
        })
        .collect()
}

/// Nombre del clip si el archivo es un audio soportado.
fn clip_stem(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !matches!(ext, "mp3" | "wav") {
        return None;
    }
    Some(path.file_stem()?.to_string_lossy().into_owned())
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    for entry in read_dir_entries(dir) {
        if entry.path.is_dir() {
            if let Some(found) = find_in_dir(&entry.path, name) {
                return Some(found);
            }
        } else if clip_stem(&entry.path).as_deref() == Some(name) {
            return Some(entry.path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn fixture() -> (tempfile::TempDir, LocalClips) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("saludos")).unwrap();
        std::fs::create_dir(dir.path().join("memes")).unwrap();
        std::fs::write(dir.path().join("saludos/hello.mp3"), b"mp3").unwrap();
        std::fs::write(dir.path().join("saludos/farewell.wav"), b"wav").unwrap();
        std::fs::write(dir.path().join("memes/bruh.mp3"), b"mp3").unwrap();
        std::fs::write(dir.path().join("memes/notas.txt"), b"no audio").unwrap();
        std::fs::write(
            dir.path().join("clipinfo.json"),
            r#"{"hello": {"text": "hola hola", "volume": 0.8}}"#,
        )
        .unwrap();

        let clips = LocalClips::load(dir.path().to_path_buf(), 0.5).await.unwrap();
        (dir, clips)
    }

    #[tokio::test]
    async fn resolves_known_clip_with_metadata() {
        let (_dir, clips) = fixture().await;

        let clip = clips.resolve("hello").await.unwrap();
        assert_eq!(clip.clip_id(), "local:hello");
        assert_eq!(clip.text(), "hola hola");
        assert_eq!(clip.volume(), 0.8);
        assert!(!clip.is_temporary());
        assert!(clip.path().ends_with("saludos/hello.mp3"));
    }

    #[tokio::test]
    async fn unknown_clip_is_clip_not_found() {
        let (_dir, clips) = fixture().await;

        let err = clips.resolve("nope").await.unwrap_err();
        assert!(matches!(err, AudioError::ClipNotFound(_)));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let (_dir, clips) = fixture().await;

        assert!(clips.resolve("../hello").await.is_err());
        assert!(clips.resolve("saludos/hello").await.is_err());
    }

    #[tokio::test]
    async fn lists_sections_and_clips() {
        let (_dir, clips) = fixture().await;

        assert_eq!(clips.sections(), vec!["memes", "saludos"]);
        assert_eq!(clips.section_clips("saludos"), vec!["farewell", "hello"]);
        assert_eq!(clips.all_clips(), vec!["bruh", "farewell", "hello"]);
    }

    #[tokio::test]
    async fn recent_clips_respects_limit() {
        let (_dir, clips) = fixture().await;

        let recent = clips.recent_clips(2);
        assert_eq!(recent.len(), 2);
    }
}
