use async_trait::async_trait;
use std::path::PathBuf;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{Clip, ClipSource};
use crate::audio::error::AudioError;

/// Síntesis de voz vía un comando externo (`<cmd> -w <archivo> <texto>`).
///
/// Cada petición sintetiza a un archivo temporal nuevo; el archivo queda
/// marcado como temporal en el clip y lo recicla la sesión cuando terminó de
/// usarse.
pub struct TtsEngine {
    command: String,
    temp_dir: PathBuf,
    volume: f32,
    fixes: Vec<(Regex, String)>,
}

impl TtsEngine {
    pub async fn load(command: String, temp_dir: PathBuf, volume: f32) -> Result<Self> {
        tokio::fs::create_dir_all(&temp_dir).await?;

        // Tabla de palabras que el sintetizador pronuncia mal
        let fixes_file = temp_dir
            .parent()
            .map(|p| p.join("tts_fixes.json"))
            .unwrap_or_else(|| PathBuf::from("tts_fixes.json"));
        let fixes = match tokio::fs::read_to_string(&fixes_file).await {
            Ok(raw) => parse_fixes(&raw),
            Err(_) => Vec::new(),
        };

        info!("🗣️ tts con `{}` ({} arreglos de texto)", command, fixes.len());

        Ok(Self {
            command,
            temp_dir,
            volume,
            fixes,
        })
    }

    /// Normaliza el texto antes de sintetizar.
    pub fn apply_fixes(&self, text: &str) -> String {
        let mut text = text.replace('\n', " ");
        for (pattern, replacement) in &self.fixes {
            text = pattern.replace_all(&text, replacement.as_str()).into_owned();
        }
        text
    }
}

fn parse_fixes(raw: &str) -> Vec<(Regex, String)> {
    let Ok(table) = serde_json::from_str::<std::collections::HashMap<String, String>>(raw) else {
        warn!("tts_fixes.json inválido, se ignora");
        return Vec::new();
    };
    table
        .into_iter()
        .filter_map(|(word, replacement)| {
            let pattern = format!(r"\b({})\b", regex::escape(&word));
            match Regex::new(&pattern) {
                Ok(re) => Some((re, replacement)),
                Err(e) => {
                    warn!("arreglo tts '{word}' inválido: {e}");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl ClipSource for TtsEngine {
    async fn resolve(&self, payload: &str) -> Result<Clip, AudioError> {
        let text = self.apply_fixes(payload);
        if text.trim().is_empty() {
            return Err(AudioError::ClipNotFound(
                "No hay nada que decir 🤐".to_string(),
            ));
        }

        let file = tempfile::Builder::new()
            .prefix("tts-")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| AudioError::ClipNotFound(format!("No pude crear el audio tts: {e}")))?;
        let (_, path) = file
            .keep()
            .map_err(|e| AudioError::ClipNotFound(format!("No pude crear el audio tts: {e}")))?;

        let output = async_process::Command::new(&self.command)
            .arg("-w")
            .arg(&path)
            .arg(&text)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                debug!("🗣️ tts sintetizado en {}", path.display());
                Ok(
                    Clip::new(format!("tts:{payload}"), path, self.volume, true)
                        .with_text(payload),
                )
            }
            Ok(out) => {
                let _ = std::fs::remove_file(&path);
                let stderr = String::from_utf8_lossy(&out.stderr);
                warn!("el sintetizador tts falló: {stderr}");
                Err(AudioError::ClipNotFound(
                    "El sintetizador de voz no pudo con ese texto 😕".to_string(),
                ))
            }
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                warn!("no se pudo ejecutar `{}`: {e}", self.command);
                Err(AudioError::ClipNotFound(
                    "El sintetizador de voz no está disponible 😕".to_string(),
                ))
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "tts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn engine_with_fixes(command: &str) -> (tempfile::TempDir, TtsEngine) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tts_fixes.json"),
            r#"{"wp": "well played", "gg": "good game"}"#,
        )
        .unwrap();
        let temp_dir = dir.path().join("temp");
        let engine = TtsEngine::load(command.to_string(), temp_dir, 0.6)
            .await
            .unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn fixes_apply_on_word_boundaries() {
        let (_dir, engine) = engine_with_fixes("true").await;

        assert_eq!(engine.apply_fixes("gg wp"), "good game well played");
        // `wp` dentro de otra palabra no se toca
        assert_eq!(engine.apply_fixes("wpm"), "wpm");
        assert_eq!(engine.apply_fixes("línea\nnueva"), "línea nueva");
    }

    #[tokio::test]
    async fn synthesizes_to_fresh_temporary_file() {
        let (_dir, engine) = engine_with_fixes("true").await;

        let clip = engine.resolve("hola").await.unwrap();
        assert_eq!(clip.clip_id(), "tts:hola");
        assert!(clip.is_temporary());
        assert!(clip.path().exists());
        assert_eq!(clip.text(), "hola");

        // Cada resolución captura un archivo nuevo
        let clip2 = engine.resolve("hola").await.unwrap();
        assert_ne!(clip.path(), clip2.path());

        let _ = std::fs::remove_file(clip.path());
        let _ = std::fs::remove_file(clip2.path());
    }

    #[tokio::test]
    async fn failed_synth_cleans_up_and_errors() {
        let (_dir, engine) = engine_with_fixes("false").await;

        let err = engine.resolve("hola").await.unwrap_err();
        assert!(matches!(err, AudioError::ClipNotFound(_)));
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let (_dir, engine) = engine_with_fixes("true").await;

        assert!(engine.resolve("   ").await.is_err());
    }
}
