//! The generic parse tree produced by the TSDL grammar parser.
//!
//! These types carry the metadata text's structure without interpreting
//! it: numbers keep their written radix and sign tokens, type specifiers
//! keep their attribute statements unevaluated. The struct generator walks
//! this tree and the scalar parsers evaluate its leaves.

/// Radix of an integer literal as written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hexadecimal,
    Octal,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
            Radix::Octal => 8,
        }
    }
}

/// An integer literal plus the prefix sign tokens that preceded it.
/// An odd number of signs negates the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnaryNumber {
    pub radix: Radix,
    pub digits: String,
    pub signs: usize,
}

/// A TSDL unary expression: the value form used for attribute values,
/// enumerator values and array subscripts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnaryExpression {
    Number(UnaryNumber),
    Ident(String),
    Quoted(String),
}

/// Right-hand side of an `=` assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Expr(UnaryExpression),
    /// A dotted identifier path, e.g. `clock.monotonic.value`.
    Path(Vec<String>),
}

/// One enumerator in an enum body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enumerator {
    pub label: String,
    pub value: Option<EnumeratorValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumeratorValue {
    Single(UnaryNumber),
    Range(UnaryNumber, UnaryNumber),
}

/// An array/sequence subscript on a declarator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayLen {
    Fixed(UnaryNumber),
    /// Length named by a (possibly scope-prefixed) field path.
    Dynamic(Vec<String>),
}

/// A declared name with its trailing subscripts, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declarator {
    pub name: String,
    pub lengths: Vec<ArrayLen>,
}

/// A type specifier as written.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    /// `integer { ... }`
    Integer(Vec<Statement>),
    /// `floating_point { ... }`
    Float(Vec<Statement>),
    /// `string` or `string { ... }`
    Str(Vec<Statement>),
    /// `struct name? { ... }? align(n)?`
    Struct {
        name: Option<String>,
        body: Option<Vec<Statement>>,
        align: Option<UnaryNumber>,
    },
    /// `variant name? <tag>? { ... }?`
    Variant {
        name: Option<String>,
        tag: Option<Vec<String>>,
        body: Option<Vec<Statement>>,
    },
    /// `enum name? : container? { ... }?`
    Enum {
        name: Option<String>,
        container: Option<Box<TypeSpec>>,
        body: Option<Vec<Enumerator>>,
    },
    /// A reference to a previously registered alias, e.g. `uint32_t` or
    /// `unsigned long`.
    Named(String),
}

/// One parsed statement, at the top level or inside a block body.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `path = value ;`
    Assignment {
        path: Vec<String>,
        value: AttributeValue,
    },
    /// `path := type ;` (also accepted with `=` for tolerance)
    TypeAssignment { path: Vec<String>, spec: TypeSpec },
    /// `typedef spec declarators ;`
    TypeDef {
        spec: TypeSpec,
        declarators: Vec<Declarator>,
    },
    /// `typealias spec := alias ;`
    TypeAlias { spec: TypeSpec, alias: Declarator },
    /// `spec declarators? ;`: a field declaration, or a bare named
    /// struct/variant/enum declaration when there are no declarators.
    Declaration {
        spec: TypeSpec,
        declarators: Vec<Declarator>,
    },
    Trace(Vec<Statement>),
    Stream(Vec<Statement>),
    Event(Vec<Statement>),
    Clock(Vec<Statement>),
    Env(Vec<Statement>),
    Callsite(Vec<Statement>),
}
