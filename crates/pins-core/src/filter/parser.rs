//! Recursive-descent parser producing the untyped expression tree.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, relations
//! (`== != < <= > >= in`), `+ -`, `* / %`, unary `! -`, member calls.

use super::lexer::{tokenize, Token, TokenKind};
use crate::error::CompileError;

/// Deepest nesting accepted, counting both parser recursion and tree height.
pub(crate) const MAX_DEPTH: usize = 250;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Int(i64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// CEL's overload name, used in diagnostics.
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "_||_",
            BinaryOp::And => "_&&_",
            BinaryOp::Eq => "_==_",
            BinaryOp::Ne => "_!=_",
            BinaryOp::Lt => "_<_",
            BinaryOp::Le => "_<=_",
            BinaryOp::Gt => "_>_",
            BinaryOp::Ge => "_>=_",
            BinaryOp::In => "@in",
            BinaryOp::Add => "_+_",
            BinaryOp::Sub => "_-_",
            BinaryOp::Mul => "_*_",
            BinaryOp::Div => "_/_",
            BinaryOp::Rem => "_%_",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Literal(Literal),
    Ident(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `function(args)` or `target.function(args)`.
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub offset: usize,
    /// Height of the tree rooted here; a leaf is 1.
    pub depth: usize,
}

impl Expr {
    fn new(kind: ExprKind, offset: usize) -> Self {
        let children = match &kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => 0,
            ExprKind::List(items) => items.iter().map(|e| e.depth).max().unwrap_or(0),
            ExprKind::Unary(_, e) => e.depth,
            ExprKind::Binary(_, l, r) => l.depth.max(r.depth),
            ExprKind::Conditional(c, t, e) => c.depth.max(t.depth).max(e.depth),
            ExprKind::Call { target, args, .. } => args
                .iter()
                .chain(target.as_deref())
                .map(|e| e.depth)
                .max()
                .unwrap_or(0),
        };
        Self {
            kind,
            offset,
            depth: children + 1,
        }
    }
}

pub(crate) fn parse(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match &parser.peek().kind {
        TokenKind::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected {}", describe(other)))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current recursion depth.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = describe(&self.peek().kind);
            Err(self.error(format!("expected {}, found {}", what, found)))
        }
    }

    fn error(&self, message: String) -> CompileError {
        CompileError::Syntax {
            offset: self.peek().offset,
            message,
        }
    }

    fn too_deep(&self) -> CompileError {
        self.error("expression exceeds maximum nesting depth".to_string())
    }

    /// Run `rule` one level deeper, failing past [`MAX_DEPTH`].
    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    /// Build a node, rejecting trees taller than [`MAX_DEPTH`].
    fn node(&self, kind: ExprKind, offset: usize) -> Result<Expr, CompileError> {
        let expr = Expr::new(kind, offset);
        if expr.depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr, CompileError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.or()?;
        if self.peek().kind != TokenKind::Question {
            return Ok(cond);
        }
        self.advance();
        let then = self.or()?;
        self.expect(TokenKind::Colon, "':'")?;
        let otherwise = self.conditional()?;
        let offset = cond.offset;
        self.node(
            ExprKind::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise)),
            offset,
        )
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and()?;
        while self.peek().kind == TokenKind::OrOr {
            let op = self.advance();
            let rhs = self.and()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs, op.offset)?;
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.relation()?;
        while self.peek().kind == TokenKind::AndAnd {
            let op = self.advance();
            let rhs = self.relation()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs, op.offset)?;
        }
        Ok(lhs)
    }

    fn relation(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Ident(word) if word == "in" => BinaryOp::In,
                _ => return Ok(lhs),
            };
            let token = self.advance();
            let rhs = self.additive()?;
            lhs = self.binary(op, lhs, rhs, token.offset)?;
        }
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let token = self.advance();
            let rhs = self.multiplicative()?;
            lhs = self.binary(op, lhs, rhs, token.offset)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            let token = self.advance();
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs, token.offset)?;
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.member(),
        };
        let token = self.advance();

        // `-<int literal>` becomes a negative literal, which reaches i64::MIN.
        if op == UnaryOp::Negate {
            if let TokenKind::Int(n) = self.peek().kind {
                self.advance();
                let value = int_literal(-i128::from(n), token.offset)?;
                return self.node(ExprKind::Literal(Literal::Int(value)), token.offset);
            }
        }

        let operand = self.nested(Self::unary)?;
        self.node(ExprKind::Unary(op, Box::new(operand)), token.offset)
    }

    fn member(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::Dot) {
            let name = self.advance();
            let function = match name.kind {
                TokenKind::Ident(ident) => ident,
                other => {
                    return Err(CompileError::Syntax {
                        offset: name.offset,
                        message: format!("expected method name, found {}", describe(&other)),
                    })
                }
            };
            if self.peek().kind != TokenKind::LParen {
                return Err(self.error(format!(
                    "field selection '.{}' is not supported, expected '('",
                    function
                )));
            }
            self.advance();
            let args = self.arguments(TokenKind::RParen, "')'")?;
            expr = self.node(
                ExprKind::Call {
                    target: Some(Box::new(expr)),
                    function,
                    args,
                },
                name.offset,
            )?;
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.advance();
        let offset = token.offset;
        match token.kind {
            TokenKind::Int(n) => Ok(Expr::new(
                ExprKind::Literal(Literal::Int(int_literal(i128::from(n), offset)?)),
                offset,
            )),
            TokenKind::Str(s) => Ok(Expr::new(ExprKind::Literal(Literal::String(s)), offset)),
            TokenKind::Ident(word) => {
                if word == "true" || word == "false" {
                    Ok(Expr::new(
                        ExprKind::Literal(Literal::Bool(word == "true")),
                        offset,
                    ))
                } else if word == "in" {
                    Err(CompileError::Syntax {
                        offset,
                        message: "unexpected 'in'".to_string(),
                    })
                } else if self.eat(&TokenKind::LParen) {
                    let args = self.arguments(TokenKind::RParen, "')'")?;
                    self.node(
                        ExprKind::Call {
                            target: None,
                            function: word,
                            args,
                        },
                        offset,
                    )
                } else {
                    Ok(Expr::new(ExprKind::Ident(word), offset))
                }
            }
            TokenKind::LParen => {
                let inner = self.conditional()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let items = self.arguments(TokenKind::RBracket, "']'")?;
                self.node(ExprKind::List(items), offset)
            }
            other => Err(CompileError::Syntax {
                offset,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }

    /// Parse a comma-separated list up to and including `close`.
    fn arguments(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.conditional()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(close.clone(), what)?;
            return Ok(items);
        }
    }
}

impl Parser {
    fn binary(
        &self,
        op: BinaryOp,
        lhs: Expr,
        rhs: Expr,
        offset: usize,
    ) -> Result<Expr, CompileError> {
        self.node(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), offset)
    }
}

fn int_literal(value: i128, offset: usize) -> Result<i64, CompileError> {
    i64::try_from(value).map_err(|_| CompileError::InvalidLiteral {
        offset,
        kind: "int",
        literal: value.to_string(),
        reason: "out of range for a 64-bit integer".to_string(),
    })
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(n) => format!("integer {}", n),
        TokenKind::Str(s) => format!("string {:?}", s),
        TokenKind::Ident(name) => format!("'{}'", name),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Question => "'?'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::AndAnd => "'&&'".to_string(),
        TokenKind::OrOr => "'||'".to_string(),
        TokenKind::Bang => "'!'".to_string(),
        TokenKind::EqEq => "'=='".to_string(),
        TokenKind::NotEq => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Percent => "'%'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(n)) => n.to_string(),
            ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
            ExprKind::Literal(Literal::String(s)) => format!("{:?}", s),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::List(items) => {
                let inner: Vec<String> = items.iter().map(shape).collect();
                format!("[{}]", inner.join(", "))
            }
            ExprKind::Unary(UnaryOp::Not, e) => format!("!{}", shape(e)),
            ExprKind::Unary(UnaryOp::Negate, e) => format!("-{}", shape(e)),
            ExprKind::Binary(op, l, r) => format!("({} {} {})", shape(l), op.symbol(), shape(r)),
            ExprKind::Conditional(c, t, e) => {
                format!("({} ? {} : {})", shape(c), shape(t), shape(e))
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let args: Vec<String> = args.iter().map(shape).collect();
                match target {
                    Some(t) => format!("{}.{}({})", shape(t), function, args.join(", ")),
                    None => format!("{}({})", function, args.join(", ")),
                }
            }
        }
    }

    fn parsed(source: &str) -> String {
        shape(&parse(source).unwrap())
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parsed("a || b && c == 1 + 2 * 3"),
            "(a _||_ (b _&&_ (c _==_ (1 _+_ (2 _*_ 3)))))"
        );
        assert_eq!(parsed("!a && -b < 3"), "(!a _&&_ (-b _<_ 3))");
        assert_eq!(parsed("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
    }

    #[test]
    fn calls_lists_and_membership() {
        assert_eq!(
            parsed("text.contains('x') && channel_id in [1, 2]"),
            "(text.contains(\"x\") _&&_ (channel_id @in [1, 2]))"
        );
        assert_eq!(
            parsed("timestamp(\"2024-01-01T00:00:00Z\").getFullYear()"),
            "timestamp(\"2024-01-01T00:00:00Z\").getFullYear()"
        );
        assert_eq!(parsed("(a)"), "a");
        assert_eq!(parsed("[]"), "[]");
        assert_eq!(parsed("-9223372036854775807"), "-9223372036854775807");
    }

    #[test]
    fn int_literal_range() {
        assert_eq!(parsed("-9223372036854775808"), "-9223372036854775808");
        assert_eq!(parsed("9223372036854775807"), "9223372036854775807");
        assert!(matches!(
            parse("9223372036854775808"),
            Err(CompileError::InvalidLiteral { kind: "int", .. })
        ));
        assert!(matches!(
            parse("-9223372036854775809"),
            Err(CompileError::InvalidLiteral { kind: "int", .. })
        ));
    }

    fn too_deep(source: &str) -> bool {
        matches!(
            parse(source),
            Err(CompileError::Syntax { ref message, .. }) if message.contains("maximum nesting depth")
        )
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let parens = format!("{}true{}", "(".repeat(300), ")".repeat(300));
        assert!(too_deep(&parens));
        assert!(too_deep(&format!("{}true", "!".repeat(5000))));
        assert!(too_deep(&format!("{}1", "-".repeat(5000))));
        assert!(too_deep(&format!("{}1{}", "[".repeat(300), "]".repeat(300))));
        assert!(too_deep(&vec!["a"; 5000].join(" || ")));
        assert!(too_deep(&format!("text{}", ".size()".repeat(5000))));

        let shallow = format!("{}true{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parsed(&shallow), "true");
        assert!(parse(&vec!["a"; 200].join(" && ")).is_ok());
    }

    #[test]
    fn syntax_errors_report_offsets() {
        match parse("channel_name ==") {
            Err(CompileError::Syntax { offset, message }) => {
                assert_eq!(offset, 15);
                assert!(message.contains("end of input"), "{}", message);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(matches!(
            parse("a b"),
            Err(CompileError::Syntax { offset: 2, .. })
        ));
        assert!(parse("(a").is_err());
        assert!(parse("f(a,").is_err());
        assert!(parse("a.b").is_err());
        assert!(parse("a ? b").is_err());
        assert!(parse("").is_err());
    }
}
