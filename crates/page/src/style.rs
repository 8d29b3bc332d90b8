//! The computed-style subset the interaction engine cares about.

/// `display` values that change interaction semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Block,
    Inline,
    /// Generates no box but its children still render.
    Contents,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Scroll,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerEvents {
    #[default]
    Auto,
    None,
}

/// Resolved style for one element. Defaults match an ordinary visible
/// block element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub display: Display,
    pub visibility: Visibility,
    pub opacity: f64,
    pub overflow_y: Overflow,
    pub position: Position,
    pub pointer_events: PointerEvents,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            display: Display::default(),
            visibility: Visibility::default(),
            opacity: 1.0,
            overflow_y: Overflow::default(),
            position: Position::default(),
            pointer_events: PointerEvents::default(),
        }
    }
}

impl Style {
    /// Whether the element's overflow clips content (anything but visible).
    pub fn clips_overflow(&self) -> bool {
        self.overflow_y != Overflow::Visible
    }
}
