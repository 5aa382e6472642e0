// Symbols

pub const SEMI: &str = ";";
pub const EQ: &str = "=";
pub const JUDG_EQ: &str = "==";
pub const FAT_ARROW: &str = "=>";
pub const ARROW: &str = "->";
pub const COMMA: &str = ",";
pub const COLON: &str = ":";
pub const DOT: &str = ".";
pub const AT: &str = "@";
pub const UNDERSCORE: &str = "_";
pub const TURNSTILE: &str = "|-";
pub const LAMBDA: &str = "λ";
pub const PROD: &str = "Π";

// Keywords

pub const TYPE: &str = "Type";
pub const REFL: &str = "refl";
pub const SIG: &str = "sig";
pub const STRUCT: &str = "struct";
pub const LET: &str = "let";
pub const REC: &str = "rec";
pub const MATCH: &str = "match";
pub const WITH: &str = "with";
pub const HANDLE: &str = "handle";
pub const HANDLER: &str = "handler";
pub const YIELD: &str = "yield";
pub const NOW: &str = "now";
pub const CURRENT: &str = "current";
pub const REF: &str = "ref";
pub const FUN: &str = "fun";
