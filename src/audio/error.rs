use thiserror::Error;

/// Errores del subsistema de audio.
///
/// Las variantes se mantienen separadas para que los handlers puedan dar
/// respuestas distintas al usuario: no es lo mismo "ese clip no existe" que
/// "estás baneado en ese canal".
#[derive(Debug, Error)]
pub enum AudioError {
    /// El identificador no resolvió a ningún clip reproducible.
    #[error("{0}")]
    ClipNotFound(String),

    /// No hay sesión de voz para el contexto del evento.
    #[error("{0}")]
    SessionNotFound(String),

    /// Hay sesión, pero el usuario tiene prohibido usarla.
    #[error("{0}")]
    AccessDenied(String),

    /// Falló conectar o mover la conexión de voz.
    #[error("{0}")]
    Connection(String),

    /// El backend reportó un fallo al reproducir. Se loguea, nunca se
    /// propaga como error duro: la cola sigue avanzando.
    #[error("{0}")]
    Playback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_remain_distinguishable() {
        let not_found = AudioError::SessionNotFound("no estoy ahí".into());
        let denied = AudioError::AccessDenied("baneado".into());

        assert!(matches!(not_found, AudioError::SessionNotFound(_)));
        assert!(matches!(denied, AudioError::AccessDenied(_)));
        assert_eq!(denied.to_string(), "baneado");
    }
}
