use pretty::termcolor::ColorSpec;

use crate::DEFAULT_WIDTH;

pub type Alloc<'a> = pretty::Arena<'a, ColorSpec>;
pub type Builder<'a> = pretty::DocBuilder<'a, Alloc<'a>, ColorSpec>;

/// Operator precedence of the term being printed.
///
/// Used to decide whether a subterm has to be parenthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Precedence {
    /// Binders and other constructs which extend as far to the right as possible
    #[default]
    Exp,
    /// Left-associative application spines
    App,
    /// Variables, constants and other atomic pieces
    Atom,
}

#[derive(Debug, Clone)]
pub struct PrintCfg {
    /// The width of the output terminal/device
    pub width: usize,
    /// Whether to print the de Bruijn representation of variables
    pub de_bruijn: bool,
    /// How many spaces of indentation are used
    pub indent: isize,
}

impl Default for PrintCfg {
    fn default() -> Self {
        Self { width: DEFAULT_WIDTH, de_bruijn: false, indent: 4 }
    }
}

pub trait Print {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a>;

    fn print<'a>(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>) -> Builder<'a> {
        self.print_prec(cfg, alloc, Precedence::default())
    }

    fn print_to_string(&self, cfg: Option<&PrintCfg>) -> String {
        let alloc = Alloc::new();
        let cfg = cfg.cloned().unwrap_or_default();
        let mut buf = Vec::new();
        let doc_builder = self.print(&cfg, &alloc);
        doc_builder.1.render(cfg.width, &mut buf).expect("Failed to print to string");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<T: Print> Print for Box<T> {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        (**self).print_prec(cfg, alloc, prec)
    }
}

impl<T: Print> Print for std::rc::Rc<T> {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        (**self).print_prec(cfg, alloc, prec)
    }
}
