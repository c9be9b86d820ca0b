use ratatui::style::Color;
use streamchat_core::Theme;

/// Resolved colours for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub dark: bool,
    pub user: Color,
    pub assistant: Color,
    pub system: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub code: Color,
    pub link: Color,
    pub header_bg: Color,
    pub key_bg: Color,
    pub selection_bg: Color,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            dark: true,
            user: Color::Cyan,
            assistant: Color::Yellow,
            system: Color::Magenta,
            text: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
            error: Color::LightRed,
            warning: Color::Yellow,
            success: Color::LightGreen,
            code: Color::LightGreen,
            link: Color::LightBlue,
            header_bg: Color::DarkGray,
            key_bg: Color::DarkGray,
            selection_bg: Color::Rgb(40, 44, 52),
        }
    }

    pub fn light() -> Self {
        Self {
            dark: false,
            user: Color::Blue,
            assistant: Color::Rgb(150, 90, 0),
            system: Color::Magenta,
            text: Color::Black,
            muted: Color::Gray,
            accent: Color::Blue,
            error: Color::Red,
            warning: Color::Rgb(180, 110, 0),
            success: Color::Green,
            code: Color::Rgb(0, 110, 60),
            link: Color::Blue,
            header_bg: Color::Gray,
            key_bg: Color::Gray,
            selection_bg: Color::Rgb(225, 230, 240),
        }
    }

    /// Palette for `theme`. `Auto` follows the terminal background reported
    /// in `COLORFGBG`, defaulting to dark.
    pub fn for_theme(theme: Theme) -> Self {
        Self::resolve(theme, std::env::var("COLORFGBG").ok().as_deref())
    }

    pub fn resolve(theme: Theme, colorfgbg: Option<&str>) -> Self {
        match theme {
            Theme::Light => Self::light(),
            Theme::Dark => Self::dark(),
            Theme::Auto => {
                if colorfgbg.map(background_is_light).unwrap_or(false) {
                    Self::light()
                } else {
                    Self::dark()
                }
            }
        }
    }
}

/// `COLORFGBG` is `fg;bg` (sometimes `fg;default;bg`); ANSI 7 and 9..=15 are
/// light backgrounds.
fn background_is_light(value: &str) -> bool {
    value
        .rsplit(';')
        .next()
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg == 7 || (9..=15).contains(&bg))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_themes() {
        assert!(Palette::resolve(Theme::Dark, Some("0;15")).dark);
        assert!(!Palette::resolve(Theme::Light, Some("15;0")).dark);
    }

    #[test]
    fn test_auto_follows_terminal_background() {
        assert!(!Palette::resolve(Theme::Auto, Some("0;15")).dark);
        assert!(!Palette::resolve(Theme::Auto, Some("0;default;7")).dark);
        assert!(Palette::resolve(Theme::Auto, Some("15;0")).dark);
        assert!(Palette::resolve(Theme::Auto, Some("garbage")).dark);
        assert!(Palette::resolve(Theme::Auto, None).dark);
    }
}
