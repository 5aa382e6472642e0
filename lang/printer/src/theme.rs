use pretty::DocAllocator;
use pretty::termcolor::{Color, ColorSpec};

use super::types::*;

fn paint(color: Color, bold: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    if bold {
        spec.set_bold(true);
    }
    spec
}

/// Syntax highlighting for rendered terms, judgements and values.
///
/// The connectives of the theory are set apart from the ML layer so that a
/// judgement embedded in a trace or error message reads at a glance.
pub trait ThemeExt<'a> {
    /// Term formers of the theory: `λ`, `Π`, `refl`, `sig`, `struct`, `Type`
    fn former(&'a self, text: &str) -> Builder<'a>;
    /// Tag constructors and field labels
    fn tag(&'a self, text: &str) -> Builder<'a>;
    /// The turnstile and judgement classifiers
    fn judgement(&'a self, text: &str) -> Builder<'a>;
}

impl<'a> ThemeExt<'a> for Alloc<'a> {
    fn former(&'a self, text: &str) -> Builder<'a> {
        self.text(text.to_owned()).annotate(paint(Color::Blue, false))
    }

    fn tag(&'a self, text: &str) -> Builder<'a> {
        self.text(text.to_owned()).annotate(paint(Color::Green, false))
    }

    fn judgement(&'a self, text: &str) -> Builder<'a> {
        self.text(text.to_owned()).annotate(paint(Color::Cyan, true))
    }
}
