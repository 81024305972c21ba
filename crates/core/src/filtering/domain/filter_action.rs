use crate::shared::face_id::FaceId;

/// What to draw over one tracked face in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterAction {
    Blur,
    Pixelate,
    Sticker(FaceId),
    /// Identity not settled yet. Rendered as [`FilterAction::Blur`] so a
    /// face is never left unfiltered.
    Unresolved,
}

impl FilterAction {
    /// The action actually drawn; `Unresolved` collapses to `Blur`.
    pub fn effective(self) -> FilterAction {
        match self {
            FilterAction::Unresolved => FilterAction::Blur,
            other => other,
        }
    }
}
