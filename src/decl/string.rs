//! String declarations.

use super::Encoding;

/// A NUL-terminated string field. Always byte aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct StringDeclaration {
    pub encoding: Encoding,
}

impl StringDeclaration {
    pub fn new(encoding: Encoding) -> Self {
        StringDeclaration { encoding }
    }
}

impl Default for StringDeclaration {
    fn default() -> Self {
        StringDeclaration::new(Encoding::Utf8)
    }
}
