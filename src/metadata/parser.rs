//! TSDL grammar parser: token stream in, parse tree out.
//!
//! Recursive descent over the token stream from [`super::lexer`]. The
//! grammar surface covered is the one the struct generator consumes:
//! trace/stream/event/clock/env/callsite blocks, typedef, typealias, and
//! the full type grammar (integer, floating_point, string, struct,
//! variant, enum, alias references, array/sequence declarators).

use crate::error::MetadataError;

use super::ast::{
    ArrayLen, AttributeValue, Declarator, Enumerator, EnumeratorValue, Statement, TypeSpec,
    UnaryExpression, UnaryNumber,
};
use super::lexer::{tokenize, SpannedToken, Token};

pub fn parse(text: &str) -> Result<Vec<Statement>, MetadataError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, idx: 0 };
    let mut statements = Vec::new();
    while !parser.at_end() {
        statements.push(parser.parse_top_statement()?);
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    idx: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.idx >= self.tokens.len()
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.idx.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> MetadataError {
        MetadataError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.idx + offset).map(|t| &t.token)
    }

    fn next(&mut self) -> Result<Token, MetadataError> {
        let t = self
            .tokens
            .get(self.idx)
            .map(|t| t.token.clone())
            .ok_or_else(|| self.error("unexpected end of metadata"))?;
        self.idx += 1;
        Ok(t)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), MetadataError> {
        let line = self.line();
        let t = self.next()?;
        if &t == expected {
            Ok(())
        } else {
            Err(MetadataError::Syntax {
                line,
                message: format!("expected {expected:?}, found {t:?}"),
            })
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn expect_ident(&mut self) -> Result<String, MetadataError> {
        let line = self.line();
        match self.next()? {
            Token::Ident(s) => Ok(s),
            t => Err(MetadataError::Syntax {
                line,
                message: format!("expected identifier, found {t:?}"),
            }),
        }
    }

    // trace { ... }; stream { ... }; typedef ...; typealias ...;
    fn parse_top_statement(&mut self) -> Result<Statement, MetadataError> {
        if let Some(name) = self.peek_ident() {
            let is_block = matches!(
                name,
                "trace" | "stream" | "event" | "clock" | "env" | "callsite"
            ) && self.peek_at(1) == Some(&Token::LBrace);
            if is_block {
                let name = self.expect_ident()?;
                let body = self.parse_block_body()?;
                self.expect(&Token::Semi)?;
                return Ok(match name.as_str() {
                    "trace" => Statement::Trace(body),
                    "stream" => Statement::Stream(body),
                    "event" => Statement::Event(body),
                    "clock" => Statement::Clock(body),
                    "env" => Statement::Env(body),
                    _ => Statement::Callsite(body),
                });
            }
        }
        self.parse_block_statement()
    }

    fn parse_block_body(&mut self) -> Result<Vec<Statement>, MetadataError> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error("unterminated block"));
            }
            body.push(self.parse_block_statement()?);
        }
        Ok(body)
    }

    // A statement inside a block body (or a top-level declaration):
    // assignment, type assignment, typedef, typealias, or declaration.
    fn parse_block_statement(&mut self) -> Result<Statement, MetadataError> {
        match self.peek_ident() {
            Some("typedef") => return self.parse_typedef(),
            Some("typealias") => return self.parse_typealias(),
            Some("integer") | Some("floating_point") | Some("string") | Some("struct")
            | Some("variant") | Some("enum") | Some("const") => {
                return self.parse_declaration_statement()
            }
            _ => {}
        }

        // Leading identifier: look ahead past the dotted path to decide
        // between an assignment and an alias-reference declaration.
        let saved = self.idx;
        if matches!(self.peek(), Some(Token::Ident(_))) {
            let path = self.parse_dotted_path()?;
            match self.peek() {
                Some(Token::Eq) => {
                    self.idx += 1;
                    if self.peek_is_type_keyword() {
                        let spec = self.parse_type_specifier()?;
                        self.expect(&Token::Semi)?;
                        return Ok(Statement::TypeAssignment { path, spec });
                    }
                    let value = self.parse_attribute_value()?;
                    self.expect(&Token::Semi)?;
                    return Ok(Statement::Assignment { path, value });
                }
                Some(Token::ColonEq) => {
                    self.idx += 1;
                    let spec = self.parse_type_specifier()?;
                    self.expect(&Token::Semi)?;
                    return Ok(Statement::TypeAssignment { path, spec });
                }
                _ => {
                    self.idx = saved;
                    return self.parse_declaration_statement();
                }
            }
        }
        Err(self.error(format!("unexpected token {:?}", self.peek())))
    }

    fn peek_is_type_keyword(&self) -> bool {
        matches!(
            self.peek_ident(),
            Some("integer") | Some("floating_point") | Some("string") | Some("struct")
                | Some("variant") | Some("enum")
        ) && self.peek_at(1) != Some(&Token::Semi)
    }

    // a.b.c or a->b->c (mixing allowed, as the grammar does)
    fn parse_dotted_path(&mut self) -> Result<Vec<String>, MetadataError> {
        let mut path = vec![self.expect_ident()?];
        while matches!(self.peek(), Some(Token::Dot) | Some(Token::Arrow)) {
            self.idx += 1;
            path.push(self.expect_ident()?);
        }
        Ok(path)
    }

    fn parse_attribute_value(&mut self) -> Result<AttributeValue, MetadataError> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let path = self.parse_dotted_path()?;
                if path.len() == 1 {
                    Ok(AttributeValue::Expr(UnaryExpression::Ident(
                        path.into_iter().next().unwrap(),
                    )))
                } else {
                    Ok(AttributeValue::Path(path))
                }
            }
            Some(Token::LitString(_)) => match self.next()? {
                Token::LitString(s) => Ok(AttributeValue::Expr(UnaryExpression::Quoted(s))),
                _ => unreachable!(),
            },
            _ => Ok(AttributeValue::Expr(UnaryExpression::Number(
                self.parse_unary_number()?,
            ))),
        }
    }

    fn parse_unary_number(&mut self) -> Result<UnaryNumber, MetadataError> {
        let mut signs = 0;
        loop {
            match self.peek() {
                Some(Token::Minus) => {
                    signs += 1;
                    self.idx += 1;
                }
                Some(Token::Plus) => {
                    self.idx += 1;
                }
                _ => break,
            }
        }
        let line = self.line();
        match self.next()? {
            Token::Number { radix, digits } => Ok(UnaryNumber {
                radix,
                digits,
                signs,
            }),
            t => Err(MetadataError::Syntax {
                line,
                message: format!("expected number, found {t:?}"),
            }),
        }
    }

    fn parse_typedef(&mut self) -> Result<Statement, MetadataError> {
        self.expect_ident()?; // typedef
        let spec = self.parse_type_specifier()?;
        let declarators = self.parse_declarator_list()?;
        self.expect(&Token::Semi)?;
        if declarators.is_empty() {
            return Err(self.error("typedef requires at least one declarator"));
        }
        Ok(Statement::TypeDef { spec, declarators })
    }

    fn parse_typealias(&mut self) -> Result<Statement, MetadataError> {
        self.expect_ident()?; // typealias
        let spec = self.parse_type_specifier()?;
        self.expect(&Token::ColonEq)?;
        // Alias names may be multi-word ("unsigned long") and may carry
        // subscripts.
        let mut words = vec![self.expect_ident()?];
        while matches!(self.peek(), Some(Token::Ident(_))) {
            words.push(self.expect_ident()?);
        }
        let lengths = self.parse_subscripts()?;
        self.expect(&Token::Semi)?;
        Ok(Statement::TypeAlias {
            spec,
            alias: Declarator {
                name: words.join(" "),
                lengths,
            },
        })
    }

    // spec declarator-list? ;
    fn parse_declaration_statement(&mut self) -> Result<Statement, MetadataError> {
        // `const` adds nothing to the decoded layout.
        while self.peek_ident() == Some("const") {
            self.idx += 1;
        }
        if self.peek_is_type_keyword() || self.peek_ident() == Some("string") {
            let spec = self.parse_type_specifier()?;
            let declarators = self.parse_declarator_list()?;
            self.expect(&Token::Semi)?;
            return Ok(Statement::Declaration { spec, declarators });
        }

        // Alias reference: `uint32_t len;`, `unsigned long addr[8];`,
        // `string msg;` was handled above. The final identifier before a
        // subscript/semi/comma is the declarator name; everything before
        // it is the (possibly multi-word) type name.
        let mut words = vec![self.expect_ident()?];
        while matches!(self.peek(), Some(Token::Ident(_))) {
            words.push(self.expect_ident()?);
        }
        if words.len() < 2 {
            return Err(self.error(format!(
                "expected a declaration, found lone identifier {}",
                words[0]
            )));
        }
        let field = words.pop().unwrap();
        let spec = TypeSpec::Named(words.join(" "));
        let mut declarators = vec![Declarator {
            name: field,
            lengths: self.parse_subscripts()?,
        }];
        while self.eat(&Token::Comma) {
            let name = self.expect_ident()?;
            declarators.push(Declarator {
                name,
                lengths: self.parse_subscripts()?,
            });
        }
        self.expect(&Token::Semi)?;
        Ok(Statement::Declaration { spec, declarators })
    }

    fn parse_declarator_list(&mut self) -> Result<Vec<Declarator>, MetadataError> {
        let mut declarators = Vec::new();
        if !matches!(self.peek(), Some(Token::Ident(_)) | Some(Token::Star)) {
            return Ok(declarators);
        }
        loop {
            while self.eat(&Token::Star) {}
            let name = self.expect_ident()?;
            declarators.push(Declarator {
                name,
                lengths: self.parse_subscripts()?,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(declarators)
    }

    fn parse_subscripts(&mut self) -> Result<Vec<ArrayLen>, MetadataError> {
        let mut lengths = Vec::new();
        while self.eat(&Token::LBracket) {
            let len = match self.peek() {
                Some(Token::Ident(_)) => ArrayLen::Dynamic(self.parse_dotted_path()?),
                _ => ArrayLen::Fixed(self.parse_unary_number()?),
            };
            self.expect(&Token::RBracket)?;
            lengths.push(len);
        }
        Ok(lengths)
    }

    fn parse_type_specifier(&mut self) -> Result<TypeSpec, MetadataError> {
        while self.peek_ident() == Some("const") {
            self.idx += 1;
        }
        match self.peek_ident() {
            Some("integer") => {
                self.idx += 1;
                let body = self.parse_block_body()?;
                Ok(TypeSpec::Integer(body))
            }
            Some("floating_point") => {
                self.idx += 1;
                let body = self.parse_block_body()?;
                Ok(TypeSpec::Float(body))
            }
            Some("string") => {
                self.idx += 1;
                let body = if self.peek() == Some(&Token::LBrace) {
                    self.parse_block_body()?
                } else {
                    Vec::new()
                };
                Ok(TypeSpec::Str(body))
            }
            Some("struct") => {
                self.idx += 1;
                let name = if matches!(self.peek(), Some(Token::Ident(s)) if s != "align") {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                let body = if self.peek() == Some(&Token::LBrace) {
                    Some(self.parse_block_body()?)
                } else {
                    None
                };
                let align = if self.peek_ident() == Some("align") {
                    self.idx += 1;
                    self.expect(&Token::LParen)?;
                    let n = self.parse_unary_number()?;
                    self.expect(&Token::RParen)?;
                    Some(n)
                } else {
                    None
                };
                if name.is_none() && body.is_none() {
                    return Err(self.error("struct requires a name or a body"));
                }
                Ok(TypeSpec::Struct { name, body, align })
            }
            Some("variant") => {
                self.idx += 1;
                let name = if matches!(self.peek(), Some(Token::Ident(_))) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                let tag = if self.eat(&Token::Lt) {
                    let path = self.parse_dotted_path()?;
                    self.expect(&Token::Gt)?;
                    Some(path)
                } else {
                    None
                };
                let body = if self.peek() == Some(&Token::LBrace) {
                    Some(self.parse_block_body()?)
                } else {
                    None
                };
                if name.is_none() && body.is_none() {
                    return Err(self.error("variant requires a name or a body"));
                }
                Ok(TypeSpec::Variant { name, tag, body })
            }
            Some("enum") => {
                self.idx += 1;
                let name = if matches!(self.peek(), Some(Token::Ident(_))) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                let container = if self.eat(&Token::Colon) {
                    Some(Box::new(self.parse_type_specifier()?))
                } else {
                    None
                };
                let body = if self.peek() == Some(&Token::LBrace) {
                    Some(self.parse_enum_body()?)
                } else {
                    None
                };
                if name.is_none() && body.is_none() {
                    return Err(self.error("enum requires a name or a body"));
                }
                Ok(TypeSpec::Enum {
                    name,
                    container,
                    body,
                })
            }
            Some(_) => {
                // Alias reference, possibly multi-word.
                let mut words = vec![self.expect_ident()?];
                while matches!(self.peek(), Some(Token::Ident(_))) {
                    words.push(self.expect_ident()?);
                }
                Ok(TypeSpec::Named(words.join(" ")))
            }
            None => Err(self.error(format!("expected type specifier, found {:?}", self.peek()))),
        }
    }

    fn parse_enum_body(&mut self) -> Result<Vec<Enumerator>, MetadataError> {
        self.expect(&Token::LBrace)?;
        let mut enumerators = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            let label = match self.next()? {
                Token::Ident(s) => s,
                Token::LitString(s) => s,
                t => return Err(self.error(format!("expected enumerator label, found {t:?}"))),
            };
            let value = if self.eat(&Token::Eq) {
                let low = self.parse_unary_number()?;
                if self.eat(&Token::Ellipsis) {
                    let high = self.parse_unary_number()?;
                    Some(EnumeratorValue::Range(low, high))
                } else {
                    Some(EnumeratorValue::Single(low))
                }
            } else {
                None
            };
            enumerators.push(Enumerator { label, value });
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(enumerators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_block() {
        let stmts = parse("trace { major = 1; minor = 8; byte_order = le; };").unwrap();
        assert_eq!(stmts.len(), 1);
        let body = match &stmts[0] {
            Statement::Trace(body) => body,
            other => panic!("expected trace block, got {other:?}"),
        };
        assert_eq!(body.len(), 3);
        assert!(matches!(
            &body[2],
            Statement::Assignment { path, value: AttributeValue::Expr(UnaryExpression::Ident(v)) }
                if path == &["byte_order"] && v == "le"
        ));
    }

    #[test]
    fn test_type_assignment() {
        let stmts = parse(
            "trace { packet.header := struct { uint32_t magic; }; };",
        )
        .unwrap();
        let body = match &stmts[0] {
            Statement::Trace(body) => body,
            _ => panic!(),
        };
        match &body[0] {
            Statement::TypeAssignment { path, spec } => {
                assert_eq!(path, &["packet", "header"]);
                assert!(matches!(spec, TypeSpec::Struct { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_typealias() {
        let stmts =
            parse("typealias integer { size = 32; align = 8; signed = false; } := uint32_t;")
                .unwrap();
        match &stmts[0] {
            Statement::TypeAlias { spec, alias } => {
                assert!(matches!(spec, TypeSpec::Integer(body) if body.len() == 3));
                assert_eq!(alias.name, "uint32_t");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_field_declarations() {
        let stmts = parse("struct s { uint32_t a; unsigned long b[8]; uint8_t c[len]; };").unwrap();
        let (name, body) = match &stmts[0] {
            Statement::Declaration {
                spec: TypeSpec::Struct { name, body, .. },
                declarators,
            } => {
                assert!(declarators.is_empty());
                (name.clone(), body.clone().unwrap())
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(name.as_deref(), Some("s"));
        assert_eq!(body.len(), 3);
        match &body[1] {
            Statement::Declaration { spec, declarators } => {
                assert_eq!(spec, &TypeSpec::Named("unsigned long".to_string()));
                assert_eq!(declarators[0].name, "b");
                assert!(matches!(declarators[0].lengths[0], ArrayLen::Fixed(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &body[2] {
            Statement::Declaration { declarators, .. } => {
                assert!(
                    matches!(&declarators[0].lengths[0], ArrayLen::Dynamic(p) if p == &["len"])
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_variant_with_tag() {
        let stmts = parse("variant v <id> { uint32_t a; uint64_t b; } x;").unwrap();
        match &stmts[0] {
            Statement::Declaration {
                spec: TypeSpec::Variant { name, tag, body },
                declarators,
            } => {
                assert_eq!(name.as_deref(), Some("v"));
                assert_eq!(tag.as_ref().unwrap(), &["id"]);
                assert_eq!(body.as_ref().unwrap().len(), 2);
                assert_eq!(declarators[0].name, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_enum_body_forms() {
        let stmts = parse("enum e : uint8_t { A, B = 5, C, D = 7 ... 9, \"quoted label\" };")
            .unwrap();
        match &stmts[0] {
            Statement::Declaration {
                spec: TypeSpec::Enum { body, container, .. },
                ..
            } => {
                assert!(matches!(**container.as_ref().unwrap(), TypeSpec::Named(_)));
                let body = body.as_ref().unwrap();
                assert_eq!(body.len(), 5);
                assert_eq!(body[0].value, None);
                assert!(matches!(body[3].value, Some(EnumeratorValue::Range(_, _))));
                assert_eq!(body[4].label, "quoted label");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_struct_align_suffix() {
        let stmts = parse("struct { uint5_t id; } align(8) hdr;").unwrap();
        match &stmts[0] {
            Statement::Declaration {
                spec: TypeSpec::Struct { align, .. },
                declarators,
            } => {
                assert!(align.is_some());
                assert_eq!(declarators[0].name, "hdr");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_negative_enum_value() {
        let stmts = parse("enum e : int8_t { A = -1, B };").unwrap();
        match &stmts[0] {
            Statement::Declaration {
                spec: TypeSpec::Enum { body, .. },
                ..
            } => {
                let body = body.as_ref().unwrap();
                match &body[0].value {
                    Some(EnumeratorValue::Single(n)) => assert_eq!(n.signs, 1),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = parse("trace {\n major = ;\n};").unwrap_err();
        match err {
            MetadataError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
