// Formula parser - converts formula body text into the typed AST.
// Supports: numbers, string literals, cell refs (A1), ranges (A1:B5),
// the fixed function set (SUM/AVERAGE/COUNT/MIN/MAX/IF) and comparison
// operators inside IF conditions.

use crate::addr::{Bounds, Coord, RangeRef};
use crate::error::EngineError;

use super::ast::{AggArg, AggFunc, CmpOp, Condition, Expr, Literal, Operand};

/// Parse a formula body (text after the `=` marker) into a typed AST.
///
/// References are bound-checked against `bounds` during parse; a reference
/// outside the sheet is reported as a syntax error on the owning formula.
pub fn parse(body: &str, bounds: Bounds) -> Result<Expr, EngineError> {
    let tokens = tokenize(body)?;
    if tokens.is_empty() {
        return Err(syntax_error("", 0, "empty formula"));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        bounds,
    };
    let expr = parser.parse_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(syntax_error(
            &extra.text,
            extra.offset,
            "unexpected trailing input",
        ));
    }
    Ok(expr)
}

fn syntax_error(fragment: &str, position: usize, detail: &str) -> EngineError {
    EngineError::FormulaSyntax {
        fragment: fragment.to_string(),
        position,
        detail: detail.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    /// A1-shaped token, already resolved to a coordinate (not yet bound-checked).
    CellRef(Coord),
    /// Alphabetic identifier, uppercased (candidate function name).
    Ident(String),
    LParen,
    RParen,
    Colon,
    Comma,
    Cmp(CmpOp),
}

/// A token plus its source lexeme and byte offset, for error reporting.
#[derive(Debug, Clone)]
struct Lexeme {
    token: Token,
    text: String,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Lexeme>, EngineError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    let mut push = |token: Token, text: &str, offset: usize| {
        tokens.push(Lexeme {
            token,
            text: text.to_string(),
            offset,
        });
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                push(Token::LParen, "(", i);
                i += 1;
            }
            ')' => {
                push(Token::RParen, ")", i);
                i += 1;
            }
            ':' => {
                push(Token::Colon, ":", i);
                i += 1;
            }
            ',' => {
                push(Token::Comma, ",", i);
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(Token::Cmp(CmpOp::Le), "<=", i);
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'>') {
                    push(Token::Cmp(CmpOp::Ne), "<>", i);
                    i += 2;
                } else {
                    push(Token::Cmp(CmpOp::Lt), "<", i);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(Token::Cmp(CmpOp::Ge), ">=", i);
                    i += 2;
                } else {
                    push(Token::Cmp(CmpOp::Gt), ">", i);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(Token::Cmp(CmpOp::Eq), "==", i);
                    i += 2;
                } else {
                    push(Token::Cmp(CmpOp::Eq), "=", i);
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push(Token::Cmp(CmpOp::Ne), "!=", i);
                    i += 2;
                } else {
                    return Err(syntax_error("!", i, "unexpected character"));
                }
            }
            '"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(syntax_error(
                        &input[start..],
                        start,
                        "unterminated string literal",
                    ));
                }
                i += 1; // consume closing quote
                let s = input[start + 1..i - 1].to_string();
                push(Token::StringLit(s), &input[start..i], start);
            }
            'A'..='Z' | 'a'..='z' => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                    i += 1;
                }
                let word = &input[start..i];
                if let Some(coord) = try_parse_cell_ref(word) {
                    push(Token::CellRef(coord), word, start);
                } else {
                    push(Token::Ident(word.to_ascii_uppercase()), word, start);
                }
            }
            '0'..='9' | '.' | '-' => {
                let start = i;
                if c == '-' {
                    // Only a numeric literal sign; the grammar has no arithmetic.
                    let starts_number = bytes
                        .get(i + 1)
                        .is_some_and(|&b| b.is_ascii_digit() || b == b'.');
                    if !starts_number {
                        return Err(syntax_error("-", i, "unexpected character"));
                    }
                    i += 1;
                }
                while i < bytes.len() && matches!(bytes[i], b'0'..=b'9' | b'.') {
                    i += 1;
                }
                let text = &input[start..i];
                let num: f64 = text
                    .parse()
                    .map_err(|_| syntax_error(text, start, "invalid number"))?;
                push(Token::Number(num), text, start);
            }
            _ => {
                return Err(syntax_error(&c.to_string(), i, "unexpected character"));
            }
        }
    }

    Ok(tokens)
}

/// Classify an alphanumeric word as a cell reference: letters then digits,
/// nothing else.
fn try_parse_cell_ref(word: &str) -> Option<Coord> {
    let letters = word.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let digits = &word[letters..];
    if letters == 0 || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Coord::parse(word).ok()
}

struct Parser<'a> {
    tokens: &'a [Lexeme],
    pos: usize,
    bounds: Bounds,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Lexeme> {
        let lex = self.tokens.get(self.pos);
        if lex.is_some() {
            self.pos += 1;
        }
        lex
    }

    fn end_offset(&self) -> usize {
        self.tokens
            .last()
            .map(|l| l.offset + l.text.len())
            .unwrap_or(0)
    }

    fn expect(&mut self, want: Token, what: &str) -> Result<(), EngineError> {
        match self.next() {
            Some(lex) if lex.token == want => Ok(()),
            Some(lex) => Err(syntax_error(&lex.text, lex.offset, what)),
            None => Err(syntax_error("", self.end_offset(), what)),
        }
    }

    /// Bound-check a coordinate parsed from `lex`. Out-of-bounds references
    /// surface as syntax errors on the owning formula.
    fn check_bounds(&self, coord: Coord, lex: &Lexeme) -> Result<Coord, EngineError> {
        if self.bounds.contains(coord) {
            Ok(coord)
        } else {
            Err(syntax_error(&lex.text, lex.offset, "malformed reference"))
        }
    }

    /// expr := funcCall | literal | reference | range
    fn parse_expr(&mut self) -> Result<Expr, EngineError> {
        let Some(lex) = self.next() else {
            return Err(syntax_error(
                "",
                self.end_offset(),
                "unexpected end of formula",
            ));
        };

        match &lex.token {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(*n))),
            Token::StringLit(s) => Ok(Expr::Literal(Literal::Text(s.clone()))),
            Token::CellRef(coord) => {
                let start = self.check_bounds(*coord, lex)?;
                if let Some(range) = self.try_finish_range(start)? {
                    Ok(Expr::Range(range))
                } else {
                    Ok(Expr::Ref(start))
                }
            }
            Token::Ident(name) => self.parse_call(name, lex),
            _ => Err(syntax_error(&lex.text, lex.offset, "expected expression")),
        }
    }

    /// If the next tokens are `: CellRef`, consume them and produce a
    /// normalized range starting at `start`.
    fn try_finish_range(&mut self, start: Coord) -> Result<Option<RangeRef>, EngineError> {
        if !matches!(self.peek().map(|l| &l.token), Some(Token::Colon)) {
            return Ok(None);
        }
        self.next(); // consume ':'
        match self.next() {
            Some(lex) => match &lex.token {
                Token::CellRef(end) => {
                    let end = self.check_bounds(*end, lex)?;
                    Ok(Some(RangeRef::normalized(start, end)))
                }
                _ => Err(syntax_error(&lex.text, lex.offset, "malformed reference")),
            },
            None => Err(syntax_error(":", self.end_offset(), "malformed reference")),
        }
    }

    /// funcCall := NAME '(' args ')' with NAME restricted to the fixed set.
    fn parse_call(&mut self, name: &str, name_lex: &Lexeme) -> Result<Expr, EngineError> {
        if name == "IF" {
            self.expect(Token::LParen, "expected '(' after function name")?;
            return self.parse_if();
        }

        let Some(func) = AggFunc::from_name(name) else {
            return Err(syntax_error(
                &name_lex.text,
                name_lex.offset,
                "unknown function",
            ));
        };

        self.expect(Token::LParen, "expected '(' after function name")?;

        let mut args = Vec::new();
        loop {
            args.push(self.parse_agg_arg()?);
            match self.next() {
                Some(lex) if lex.token == Token::Comma => continue,
                Some(lex) if lex.token == Token::RParen => break,
                Some(lex) => {
                    return Err(syntax_error(
                        &lex.text,
                        lex.offset,
                        "expected ',' or ')' in argument list",
                    ));
                }
                None => {
                    return Err(syntax_error(
                        &name_lex.text,
                        name_lex.offset,
                        "missing closing parenthesis",
                    ));
                }
            }
        }

        Ok(Expr::Agg { func, args })
    }

    /// Aggregate argument: reference, range, or literal. No nested calls.
    fn parse_agg_arg(&mut self) -> Result<AggArg, EngineError> {
        let Some(lex) = self.next() else {
            return Err(syntax_error("", self.end_offset(), "expected argument"));
        };
        match &lex.token {
            Token::Number(n) => Ok(AggArg::Literal(Literal::Number(*n))),
            Token::StringLit(s) => Ok(AggArg::Literal(Literal::Text(s.clone()))),
            Token::CellRef(coord) => {
                let start = self.check_bounds(*coord, lex)?;
                if let Some(range) = self.try_finish_range(start)? {
                    Ok(AggArg::Range(range))
                } else {
                    Ok(AggArg::Ref(start))
                }
            }
            _ => Err(syntax_error(
                &lex.text,
                lex.offset,
                "expected reference, range, or literal",
            )),
        }
    }

    /// ifCall := 'IF' '(' condition ',' expr ',' expr ')'
    /// (the opening paren is already consumed)
    fn parse_if(&mut self) -> Result<Expr, EngineError> {
        let lhs = self.parse_operand()?;
        let op = match self.next() {
            Some(lex) => match &lex.token {
                Token::Cmp(op) => *op,
                _ => {
                    return Err(syntax_error(
                        &lex.text,
                        lex.offset,
                        "IF condition must be a comparison",
                    ));
                }
            },
            None => {
                return Err(syntax_error(
                    "",
                    self.end_offset(),
                    "IF condition must be a comparison",
                ));
            }
        };
        let rhs = self.parse_operand()?;

        self.expect(Token::Comma, "IF expects 3 arguments")?;
        let then_branch = self.parse_expr()?;
        self.expect(Token::Comma, "IF expects 3 arguments")?;
        let else_branch = self.parse_expr()?;
        self.expect(Token::RParen, "IF expects 3 arguments")?;

        Ok(Expr::If {
            cond: Condition { lhs, op, rhs },
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// operand := reference | literal
    fn parse_operand(&mut self) -> Result<Operand, EngineError> {
        let Some(lex) = self.next() else {
            return Err(syntax_error("", self.end_offset(), "expected operand"));
        };
        match &lex.token {
            Token::Number(n) => Ok(Operand::Literal(Literal::Number(*n))),
            Token::StringLit(s) => Ok(Operand::Literal(Literal::Text(s.clone()))),
            Token::CellRef(coord) => Ok(Operand::Ref(self.check_bounds(*coord, lex)?)),
            _ => Err(syntax_error(
                &lex.text,
                lex.offset,
                "expected reference or literal operand",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(body: &str) -> Expr {
        parse(body, Bounds::default()).unwrap()
    }

    fn parse_err(body: &str) -> EngineError {
        parse(body, Bounds::default()).unwrap_err()
    }

    fn coord(token: &str) -> Coord {
        Coord::parse(token).unwrap()
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_ok("A1"), Expr::Ref(coord("A1")));
        assert_eq!(parse_ok("  b3 "), Expr::Ref(coord("B3")));
    }

    #[test]
    fn test_parse_range() {
        let expr = parse_ok("A1:B2");
        assert_eq!(expr, Expr::Range(RangeRef::parse("A1:B2").unwrap()));

        // Endpoint order normalizes.
        assert_eq!(parse_ok("B2:A1"), parse_ok("A1:B2"));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_ok("42"), Expr::Literal(Literal::Number(42.0)));
        assert_eq!(parse_ok("-1.5"), Expr::Literal(Literal::Number(-1.5)));
        assert_eq!(
            parse_ok("\"hello\""),
            Expr::Literal(Literal::Text("hello".to_string()))
        );
    }

    #[test]
    fn test_parse_sum_call() {
        let expr = parse_ok("SUM(A1:A3,B1,5)");
        match expr {
            Expr::Agg { func, args } => {
                assert_eq!(func, AggFunc::Sum);
                assert_eq!(args.len(), 3);
                assert_eq!(args[0], AggArg::Range(RangeRef::parse("A1:A3").unwrap()));
                assert_eq!(args[1], AggArg::Ref(coord("B1")));
                assert_eq!(args[2], AggArg::Literal(Literal::Number(5.0)));
            }
            other => panic!("expected Agg, got {other:?}"),
        }
    }

    #[test]
    fn test_function_names_case_insensitive() {
        assert_eq!(parse_ok("sum(A1)"), parse_ok("SUM(A1)"));
        assert_eq!(parse_ok("If(A1>1,1,2)"), parse_ok("IF(A1>1,1,2)"));
    }

    #[test]
    fn test_parse_if_call() {
        let expr = parse_ok("IF(A1>5,\"big\",\"small\")");
        match expr {
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                assert_eq!(cond.lhs, Operand::Ref(coord("A1")));
                assert_eq!(cond.op, CmpOp::Gt);
                assert_eq!(cond.rhs, Operand::Literal(Literal::Number(5.0)));
                assert_eq!(*then_branch, Expr::Literal(Literal::Text("big".to_string())));
                assert_eq!(
                    *else_branch,
                    Expr::Literal(Literal::Text("small".to_string()))
                );
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_if_nested_branch() {
        // Branches are full expressions; aggregates nest there.
        let expr = parse_ok("IF(A1>=10,SUM(B1:B3),C1)");
        match expr {
            Expr::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(matches!(
                    *then_branch,
                    Expr::Agg {
                        func: AggFunc::Sum,
                        ..
                    }
                ));
                assert_eq!(*else_branch, Expr::Ref(coord("C1")));
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_comparison_operator_aliases() {
        for (body, op) in [
            ("IF(A1=1,1,0)", CmpOp::Eq),
            ("IF(A1==1,1,0)", CmpOp::Eq),
            ("IF(A1!=1,1,0)", CmpOp::Ne),
            ("IF(A1<>1,1,0)", CmpOp::Ne),
            ("IF(A1<=1,1,0)", CmpOp::Le),
            ("IF(A1>=1,1,0)", CmpOp::Ge),
            ("IF(A1<1,1,0)", CmpOp::Lt),
            ("IF(A1>1,1,0)", CmpOp::Gt),
        ] {
            match parse_ok(body) {
                Expr::If { cond, .. } => assert_eq!(cond.op, op, "for {body}"),
                other => panic!("expected If for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_function_rejected() {
        let err = parse_err("MEDIAN(A1:A3)");
        match err {
            EngineError::FormulaSyntax {
                fragment, detail, ..
            } => {
                assert_eq!(fragment, "MEDIAN");
                assert_eq!(detail, "unknown function");
            }
            other => panic!("expected FormulaSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_parens_rejected() {
        assert!(matches!(
            parse_err("SUM(A1:A3"),
            EngineError::FormulaSyntax { .. }
        ));
        assert!(matches!(
            parse_err("SUM(A1))"),
            EngineError::FormulaSyntax { .. }
        ));
    }

    #[test]
    fn test_if_arity_enforced() {
        assert!(matches!(
            parse_err("IF(A1>1,2)"),
            EngineError::FormulaSyntax { .. }
        ));
        assert!(matches!(
            parse_err("IF(A1>1,2,3,4)"),
            EngineError::FormulaSyntax { .. }
        ));
    }

    #[test]
    fn test_if_requires_comparison() {
        let err = parse_err("IF(A1,2,3)");
        match err {
            EngineError::FormulaSyntax { detail, .. } => {
                assert_eq!(detail, "IF condition must be a comparison");
            }
            other => panic!("expected FormulaSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_arg_list_rejected() {
        assert!(matches!(
            parse_err("SUM()"),
            EngineError::FormulaSyntax { .. }
        ));
    }

    #[test]
    fn test_nested_call_in_agg_arg_rejected() {
        // Aggregate args are flat: reference/range/literal only.
        assert!(matches!(
            parse_err("SUM(MAX(A1:A3))"),
            EngineError::FormulaSyntax { .. }
        ));
    }

    #[test]
    fn test_out_of_bounds_reference_rejected() {
        // Default bounds are 26x100: column AA and row 101 are outside.
        let err = parse_err("AA1");
        match err {
            EngineError::FormulaSyntax {
                fragment, detail, ..
            } => {
                assert_eq!(fragment, "AA1");
                assert_eq!(detail, "malformed reference");
            }
            other => panic!("expected FormulaSyntax, got {other:?}"),
        }
        assert!(parse("A101", Bounds::default()).is_err());
        assert!(parse("SUM(A1:A101)", Bounds::default()).is_err());
    }

    #[test]
    fn test_reference_with_huge_column_is_syntax_error() {
        // Column letters past the machine-word range must not panic the
        // tokenizer; the word degrades to an unknown name.
        assert!(parse("AAAAAAAAAAAAAAAA1", Bounds::default()).is_err());
        assert!(parse("SUM(AAAAAAAAAAAAAAAA1)", Bounds::default()).is_err());
    }

    #[test]
    fn test_error_position_reported() {
        let err = parse_err("SUM(A1,@)");
        match err {
            EngineError::FormulaSyntax { position, .. } => assert_eq!(position, 7),
            other => panic!("expected FormulaSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse_err("A1 B2");
        match err {
            EngineError::FormulaSyntax { detail, .. } => {
                assert_eq!(detail, "unexpected trailing input");
            }
            other => panic!("expected FormulaSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_string_rejected() {
        assert!(matches!(
            parse_err("\"oops"),
            EngineError::FormulaSyntax { .. }
        ));
    }

    #[test]
    fn test_bare_identifier_rejected() {
        // No named ranges in this grammar.
        assert!(matches!(parse_err("TOTAL"), EngineError::FormulaSyntax { .. }));
    }
}
