use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const CLIP_REPLAY: &str = "clip_replay";
    pub const CLIP_STOP: &str = "clip_stop";
}

/// Controles que acompañan la respuesta de un clip encolado
pub fn create_clip_buttons() -> Vec<CreateActionRow> {
    let replay_btn = CreateButton::new(button_ids::CLIP_REPLAY)
        .emoji('🔁')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(button_ids::CLIP_STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    vec![CreateActionRow::Buttons(vec![replay_btn, stop_btn])]
}
