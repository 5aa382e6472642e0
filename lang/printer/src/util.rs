use super::types::*;

pub trait ParensIfExt<'a> {
    fn parens_if(self, condition: bool) -> Builder<'a>;
}

impl<'a> ParensIfExt<'a> for Builder<'a> {
    /// Wrap the document in parentheses if the subterm's precedence requires it.
    fn parens_if(self, condition: bool) -> Builder<'a> {
        if condition { self.enclose("(", ")") } else { self }
    }
}
