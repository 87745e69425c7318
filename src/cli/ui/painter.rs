use owo_colors::{OwoColorize, Style as OwoStyle};

/// Applies colour and style to terminal text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    /// Creates a painter with explicit colour control.
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().yellow())
    }

    pub(crate) fn failure<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().red())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn styles(painter: &Painter, text: &str) -> [String; 6] {
        [
            painter.heading(text),
            painter.success(text),
            painter.warning(text),
            painter.failure(text),
            painter.muted(text),
            painter.value(text),
        ]
    }

    #[rstest]
    #[case::word("frame")]
    #[case::hex("0x0C61")]
    fn plain_returns_unstyled_text(#[case] input: &str) {
        for styled in styles(&Painter::new(false), input) {
            assert_eq!(input, styled);
        }
    }

    #[rstest]
    #[case::word("frame")]
    #[case::hex("0x0C61")]
    fn coloured_wraps_text_in_escapes(#[case] input: &str) {
        for styled in styles(&Painter::new(true), input) {
            assert_ne!(input, styled);
            assert!(styled.contains(input));
        }
    }
}
