use ratatui::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub header_accent_bg: Color,
    pub header_accent_fg: Color,
    pub status_ok: Color,
    pub status_err: Color,
    pub statusbar_bg: Color,
    pub overlay_border: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub pill_key_bg: Color,
    pub pill_key_fg: Color,
    pub pill_desc_fg: Color,
    pub surface_bg: Color,
    pub selection_bg: Color,
    pub gauge_filled: Color,
    pub gauge_unfilled: Color,
    pub download: Color,
    pub upload: Color,
    /// Low to high load.
    pub heat_colors: [Color; 5],
}

impl Default for Theme {
    fn default() -> Self {
        Theme::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Theme {
            header_accent_bg: Color::Green,
            header_accent_fg: Color::Black,
            status_ok: Color::Green,
            status_err: Color::Red,
            statusbar_bg: Color::DarkGray,
            overlay_border: Color::DarkGray,
            text_primary: Color::White,
            text_secondary: Color::Gray,
            accent: Color::Green,
            pill_key_bg: Color::Yellow,
            pill_key_fg: Color::Black,
            pill_desc_fg: Color::White,
            surface_bg: Color::DarkGray,
            selection_bg: Color::Rgb(51, 65, 85),
            gauge_filled: Color::Rgb(103, 232, 249),
            gauge_unfilled: Color::DarkGray,
            download: Color::Rgb(52, 211, 153),
            upload: Color::Rgb(251, 146, 60),
            heat_colors: [
                Color::Rgb(71, 85, 105),
                Color::Rgb(16, 185, 129),
                Color::Rgb(249, 115, 22),
                Color::Rgb(239, 68, 68),
                Color::Rgb(236, 72, 153),
            ],
        }
    }

    /// Color for a 0-100 load value. Values above 100 (per-core accounting)
    /// use the hottest color.
    pub fn heat(&self, percent: f64) -> Color {
        let bucket = match percent {
            p if p < 5.0 => 0,
            p if p < 30.0 => 1,
            p if p < 60.0 => 2,
            p if p < 90.0 => 3,
            _ => 4,
        };
        self.heat_colors[bucket]
    }
}
