//! Direct evaluation of VFR expression source, independent of the compiler
//! and the IFR evaluator. The fixture matches `evaluate_condition`: question
//! `Count` holds 42 as a `UINT16` and rule `Double` is `questionref(Count) * 2`.

use vfr::lexer::{Token, TokenKind, tokenize};
use vfr::vm::Value;

/// Binary operators by precedence, loosest first.
const LEVELS: [&[&str]; 9] = [
    &["OR"],
    &["AND"],
    &["|"],
    &["&"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

pub fn evaluate_source(expr: &str) -> Value {
    let tokens = tokenize(expr).unwrap_or_else(|_| panic!("cannot tokenize {:?}", expr));
    let mut eval = SourceEval {
        tokens: &tokens,
        pos: 0,
    };
    let value = eval.level(0);
    assert_eq!(eval.pos, tokens.len(), "trailing input in {:?}", expr);
    value
}

fn question(name: &str) -> Value {
    match name {
        "Count" => Value::uint(42, 2),
        other => panic!("no question {}", other),
    }
}

fn rule(name: &str) -> Value {
    match name {
        "Double" => binary("*", question("Count"), Value::uint(2, 1)),
        other => panic!("no rule {}", other),
    }
}

/// Integer literals keep the narrowest width holding them.
fn constant(value: u64) -> Value {
    let width = if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFFFF_FFFF {
        4
    } else {
        8
    };
    Value::uint(value, width)
}

fn uint(value: &Value) -> u64 {
    value
        .as_uint()
        .unwrap_or_else(|| panic!("expected an integer, got {:?}", value))
}

fn boolean(value: &Value) -> bool {
    value
        .as_bool()
        .unwrap_or_else(|| panic!("expected a boolean, got {:?}", value))
}

fn binary(op: &str, a: Value, b: Value) -> Value {
    match op {
        "OR" => Value::Bool(boolean(&a) || boolean(&b)),
        "AND" => Value::Bool(boolean(&a) && boolean(&b)),
        "==" | "!=" => {
            let equal = match (&a, &b) {
                (Value::Bool(x), Value::Bool(y)) => x == y,
                _ => uint(&a) == uint(&b),
            };
            Value::Bool(equal == (op == "=="))
        }
        "<" => Value::Bool(uint(&a) < uint(&b)),
        "<=" => Value::Bool(uint(&a) <= uint(&b)),
        ">" => Value::Bool(uint(&a) > uint(&b)),
        ">=" => Value::Bool(uint(&a) >= uint(&b)),
        _ => {
            let (x, y) = (uint(&a), uint(&b));
            let shift = u32::try_from(y).unwrap_or(u32::MAX);
            let result = match op {
                "|" => x | y,
                "&" => x & y,
                "<<" => x.checked_shl(shift).unwrap_or(0),
                ">>" => x.checked_shr(shift).unwrap_or(0),
                "+" => x.wrapping_add(y),
                "-" => x.wrapping_sub(y),
                "*" => x.wrapping_mul(y),
                "/" => x / y,
                "%" => x % y,
                other => panic!("unknown operator {}", other),
            };
            Value::uint(result, 8)
        }
    }
}

struct SourceEval<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
}

impl<'a, 'src> SourceEval<'a, 'src> {
    fn peek(&self) -> Option<&'a Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> &'a Token<'src> {
        let token = self
            .tokens
            .get(self.pos)
            .unwrap_or_else(|| panic!("unexpected end of expression"));
        self.pos += 1;
        token
    }

    fn expect(&mut self, kind: TokenKind) -> &'a Token<'src> {
        let token = self.next();
        assert_eq!(token.kind, kind, "unexpected {:?}", token.text);
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn level(&mut self, level: usize) -> Value {
        if level == LEVELS.len() {
            return self.cast();
        }
        let mut value = self.level(level + 1);
        while let Some(token) = self
            .peek()
            .filter(|t| LEVELS[level].iter().any(|op| *op == t.text))
        {
            self.pos += 1;
            let right = self.level(level + 1);
            value = binary(token.text, value, right);
        }
        value
    }

    fn cast(&mut self) -> Value {
        let target = match self.tokens.get(self.pos..self.pos + 3) {
            Some([open, name, close])
                if open.kind == TokenKind::LParen
                    && close.kind == TokenKind::RParen
                    && matches!(name.text, "BOOLEAN" | "UINT8" | "UINT16" | "UINT32" | "UINT64") =>
            {
                name.text
            }
            _ => return self.atom(),
        };
        self.pos += 3;
        let value = self.cast();
        match (target, value) {
            ("BOOLEAN", Value::Bool(b)) => Value::Bool(b),
            ("BOOLEAN", v) => Value::Bool(uint(&v) != 0),
            (_, Value::Bool(b)) => Value::uint(u64::from(b), 1),
            (_, v) => v,
        }
    }

    fn atom(&mut self) -> Value {
        let token = self.next();
        match token.kind {
            TokenKind::Number => constant(token.number().unwrap_or_else(|| panic!("bad number"))),
            TokenKind::LParen => {
                let value = self.level(0);
                self.expect(TokenKind::RParen);
                value
            }
            TokenKind::Tilde => {
                let value = self.atom();
                Value::uint(!uint(&value), 8)
            }
            _ => self.word(token.text),
        }
    }

    fn word(&mut self, word: &str) -> Value {
        match word {
            "TRUE" => Value::Bool(true),
            "FALSE" => Value::Bool(false),
            "ZERO" => Value::uint(0, 1),
            "ONE" => Value::uint(1, 1),
            "ONES" => Value::uint(u64::MAX, 8),
            "NOT" => Value::Bool(!boolean(&self.atom())),
            "questionref" => {
                self.expect(TokenKind::LParen);
                let name = self.expect(TokenKind::Ident).text;
                self.expect(TokenKind::RParen);
                question(name)
            }
            "ruleref" => {
                self.expect(TokenKind::LParen);
                let name = self.expect(TokenKind::Ident).text;
                self.expect(TokenKind::RParen);
                rule(name)
            }
            "cond" => {
                self.expect(TokenKind::LParen);
                let test = self.level(0);
                self.expect(TokenKind::Question);
                let if_true = self.level(0);
                self.expect(TokenKind::Colon);
                let if_false = self.level(0);
                self.expect(TokenKind::RParen);
                if boolean(&test) {
                    if_true
                } else {
                    if_false
                }
            }
            "map" => {
                self.expect(TokenKind::LParen);
                let operand = uint(&self.level(0));
                self.expect(TokenKind::Colon);
                let mut found = None;
                while !self.at(TokenKind::RParen) {
                    let key = uint(&self.level(0));
                    self.expect(TokenKind::Comma);
                    let value = self.level(0);
                    self.expect(TokenKind::Semi);
                    if found.is_none() && key == operand {
                        found = Some(value);
                    }
                }
                self.expect(TokenKind::RParen);
                found.unwrap_or(Value::Undefined)
            }
            "ideqval" => {
                let left = question(self.expect(TokenKind::Ident).text);
                let op = self.next().text;
                let right = constant(self.expect(TokenKind::Number).number().unwrap_or_default());
                binary(op, left, right)
            }
            "ideqid" => {
                let left = question(self.expect(TokenKind::Ident).text);
                let op = self.next().text;
                let right = question(self.expect(TokenKind::Ident).text);
                binary(op, left, right)
            }
            "ideqvallist" => {
                let left = uint(&question(self.expect(TokenKind::Ident).text));
                self.expect(TokenKind::EqEq);
                let mut any = false;
                while self.at(TokenKind::Number) {
                    any |= self.next().number() == Some(left);
                }
                Value::Bool(any)
            }
            other => panic!("unsupported word {:?}", other),
        }
    }
}
