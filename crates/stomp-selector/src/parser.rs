use crate::ast::{Expr, Operator, Right, Value};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token};

/// Recursive-descent parser for the selector grammar:
///
/// ```text
/// expr        := value comparison (AND expr | OR expr)?
/// comparison  := [NOT] op (value | '(' value (',' value)* ')')
/// op          := '=' | '==' | '!=' | '<' | '<=' | '>' | '>=' | IN | GLOB | REGEXP
/// value       := IDENT | INTEGER | TEXT | TRUE | FALSE
/// ```
///
/// `AND`/`OR` chains are right-leaning (`a AND b AND c` parses as
/// `a AND (b AND c)`) and there is no top-level EOF check: any tokens left
/// over once the first `expr` production is satisfied are simply ignored.
struct Parser {
    lexer: Lexer,
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        lexer: Lexer::new(input),
    };
    parser.parse_expr()
}

impl Parser {
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_value()?;
        let node = self.parse_comparison(left)?;
        match self.lexer.next_token()? {
            Token::And => Ok(Expr::And(Box::new(node), Box::new(self.parse_expr()?))),
            Token::Or => Ok(Expr::Or(Box::new(node), Box::new(self.parse_expr()?))),
            _ => Ok(node),
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.lexer.next_token()? {
            Token::Ident(s) => Ok(Value::Field(s)),
            Token::Text(s) => Ok(Value::Text(s)),
            Token::Number(s) => Ok(Value::Number(s)),
            Token::True => Ok(Value::Bool(true)),
            Token::False => Ok(Value::Bool(false)),
            other => Err(ParseError::Syntax {
                pos: 0,
                reason: format!("expected a value, found {other:?}"),
            }),
        }
    }

    fn parse_comparison(&mut self, left: Value) -> Result<Expr, ParseError> {
        let negate = if self.lexer.peek_token()? == Token::Not {
            self.lexer.next_token()?;
            true
        } else {
            false
        };

        let mut op = match self.lexer.next_token()? {
            Token::Eq => Operator::Eq,
            Token::Neq => Operator::Neq,
            Token::Lt => Operator::Lt,
            Token::Lte => Operator::Lte,
            Token::Gt => Operator::Gt,
            Token::Gte => Operator::Gte,
            Token::In => Operator::In,
            Token::Glob => Operator::Glob,
            Token::Regexp => Operator::Regexp,
            other => {
                return Err(ParseError::Syntax {
                    pos: 0,
                    reason: format!("expected a comparison operator, found {other:?}"),
                });
            }
        };

        // NOT only changes the meaning of IN / GLOB / REGEXP; on every
        // other operator it is parsed but has no effect.
        if negate {
            op = match op {
                Operator::In => Operator::NotIn,
                Operator::Glob => Operator::NotGlob,
                Operator::Regexp => Operator::NotRegexp,
                other => other,
            };
        }

        let right = match op {
            Operator::In | Operator::NotIn => Right::List(self.parse_list()?),
            _ => Right::Single(self.parse_value()?),
        };

        Ok(Expr::Comparison { op, left, right })
    }

    fn parse_list(&mut self) -> Result<Vec<Value>, ParseError> {
        match self.lexer.next_token()? {
            Token::LParen => {}
            other => {
                return Err(ParseError::Syntax {
                    pos: 0,
                    reason: format!("expected '(', found {other:?}"),
                });
            }
        }

        let mut values = vec![self.parse_value()?];
        loop {
            match self.lexer.peek_token()? {
                Token::Comma => {
                    self.lexer.next_token()?;
                    values.push(self.parse_value()?);
                }
                Token::RParen => {
                    self.lexer.next_token()?;
                    break;
                }
                other => {
                    return Err(ParseError::Syntax {
                        pos: 0,
                        reason: format!("expected ',' or ')', found {other:?}"),
                    });
                }
            }
        }
        Ok(values)
    }
}
