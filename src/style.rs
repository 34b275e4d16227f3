use iced::{button, container, slider, Background, Color, Vector};

const SURFACE: Color = Color {
    r: 0.08,
    g: 0.08,
    b: 0.08,
    a: 1.0,
};

const ACCENT: Color = Color {
    r: 0.0,
    g: 0.6,
    b: 0.0,
    a: 1.0,
};

const ACCENT_BRIGHT: Color = Color {
    r: 0.0,
    g: 1.0,
    b: 0.0,
    a: 1.0,
};

pub struct Sidebar;

impl container::StyleSheet for Sidebar {
    fn style(&self) -> container::Style {
        container::Style {
            text_color: Some(Color::WHITE),
            background: Some(Background::Color(SURFACE)),
            ..container::Style::default()
        }
    }
}

pub struct Stage;

impl container::StyleSheet for Stage {
    fn style(&self) -> container::Style {
        container::Style {
            background: Some(Background::Color(Color::BLACK)),
            ..container::Style::default()
        }
    }
}

/// Toggle button; `active` mirrors the flag it flips.
pub struct Toggle {
    pub active: bool,
}

impl button::StyleSheet for Toggle {
    fn active(&self) -> button::Style {
        let (background, text_color) = if self.active {
            (ACCENT, Color::BLACK)
        } else {
            (Color::from_rgb(0.2, 0.2, 0.2), Color::WHITE)
        };
        button::Style {
            shadow_offset: Vector::new(0.0, 0.0),
            background: Some(Background::Color(background)),
            border_radius: 4.0,
            border_width: 1.0,
            border_color: ACCENT,
            text_color,
        }
    }

    fn hovered(&self) -> button::Style {
        button::Style {
            border_color: ACCENT_BRIGHT,
            ..self.active()
        }
    }
}

pub struct Slider;

impl slider::StyleSheet for Slider {
    fn active(&self) -> slider::Style {
        slider::Style {
            rail_colors: (ACCENT, Color::from_rgb(0.3, 0.3, 0.3)),
            handle: slider::Handle {
                shape: slider::HandleShape::Circle { radius: 7.0 },
                color: ACCENT,
                border_width: 1.0,
                border_color: Color::BLACK,
            },
        }
    }

    fn hovered(&self) -> slider::Style {
        let active = self.active();
        slider::Style {
            handle: slider::Handle {
                color: ACCENT_BRIGHT,
                ..active.handle
            },
            ..active
        }
    }

    fn dragging(&self) -> slider::Style {
        self.hovered()
    }
}
