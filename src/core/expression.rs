use super::error::ExpressionError;
use regex::Regex;
use std::f64::consts::PI;
use std::sync::OnceLock;

/// Evaluation stack depth. Compilation rejects formulas that would need more.
const STACK_SIZE: usize = 32;

/// Parser recursion limit: parentheses, calls and unary signs each add a level.
const MAX_NESTING: usize = 256;

/// Built-in scalar functions available to formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sqrt,
    Exp,
    Ln,
    Abs,
    Sin,
    Cos,
    Tan,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(Self::Sqrt),
            "exp" => Some(Self::Exp),
            "ln" | "log" => Some(Self::Ln),
            "abs" => Some(Self::Abs),
            "sin" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "tan" => Some(Self::Tan),
            _ => None,
        }
    }

    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sqrt => x.sqrt(),
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Abs => x.abs(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
        }
    }
}

/// Compact bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq)]
enum OpCode {
    Load(u32),
    LoadConst(u32),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Call(Function),
}

/// Compiled formula - postfix bytecode over a slot table of node values.
///
/// Slots are resolved at compile time by the caller, so evaluation is a
/// plain walk over the instructions with a fixed-size stack. IEEE semantics
/// are kept: division by zero yields `inf`/`NaN` rather than an error.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledExpression {
    source: String,
    instructions: Vec<OpCode>,
    constants: Vec<f64>, // Constant pool
    inputs: Vec<u32>,
}

impl CompiledExpression {
    /// Compile `expr`, mapping every identifier to a slot through `resolve`.
    ///
    /// `resolve` is called once per identifier occurrence, in source order.
    pub fn compile<R>(expr: &str, resolve: R) -> Result<Self, ExpressionError>
    where
        R: FnMut(&str) -> u32,
    {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }

        let mut compiler = Compiler {
            tokens,
            pos: 0,
            instructions: Vec::with_capacity(32),
            constants: Vec::with_capacity(8),
            inputs: Vec::new(),
            depth: 0,
            nesting: 0,
            resolve,
        };
        compiler.parse_additive()?;

        if let Some(&(offset, token)) = compiler.tokens.get(compiler.pos) {
            return Err(ExpressionError::UnexpectedToken {
                token: token.to_string(),
                offset,
            });
        }

        let mut inputs = compiler.inputs;
        inputs.sort_unstable();
        inputs.dedup();

        Ok(Self {
            source: expr.to_string(),
            instructions: compiler.instructions,
            constants: compiler.constants,
            inputs,
        })
    }

    /// Evaluate against a slot table indexed by the slots handed out at compile time.
    #[inline]
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let mut stack = [0.0f64; STACK_SIZE]; // Fixed-size stack (no allocations)
        let mut sp = 0usize;

        for &inst in &self.instructions {
            match inst {
                OpCode::Load(idx) => {
                    stack[sp] = values[idx as usize];
                    sp += 1;
                }
                OpCode::LoadConst(idx) => {
                    stack[sp] = self.constants[idx as usize];
                    sp += 1;
                }
                OpCode::Add => {
                    sp -= 1;
                    stack[sp - 1] += stack[sp];
                }
                OpCode::Sub => {
                    sp -= 1;
                    stack[sp - 1] -= stack[sp];
                }
                OpCode::Mul => {
                    sp -= 1;
                    stack[sp - 1] *= stack[sp];
                }
                OpCode::Div => {
                    sp -= 1;
                    stack[sp - 1] /= stack[sp];
                }
                OpCode::Pow => {
                    sp -= 1;
                    stack[sp - 1] = stack[sp - 1].powf(stack[sp]);
                }
                OpCode::Neg => stack[sp - 1] = -stack[sp - 1],
                OpCode::Call(f) => stack[sp - 1] = f.apply(stack[sp - 1]),
            }
        }

        debug_assert_eq!(sp, 1);
        stack[0]
    }

    /// Distinct slots read by this formula, ascending.
    pub fn inputs(&self) -> &[u32] {
        &self.inputs
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Number(f64),
    Ident(&'a str),
    Op(char),
    LParen,
    RParen,
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => f.write_str(s),
            Token::Op(c) => write!(f, "{c}"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<num>(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)|(?P<op>\*\*|[-+*/^()]))",
        )
        .expect("token pattern is valid")
    })
}

fn tokenize(expr: &str) -> Result<Vec<(usize, Token<'_>)>, ExpressionError> {
    let pattern = token_pattern();
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < expr.len() {
        let rest = &expr[offset..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        offset += rest.len() - trimmed.len();

        let caps = pattern
            .captures(trimmed)
            .ok_or_else(|| ExpressionError::UnexpectedToken {
                token: trimmed.chars().next().map(String::from).unwrap_or_default(),
                offset,
            })?;

        let token = if let Some(m) = caps.name("num") {
            let value = m
                .as_str()
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(m.as_str().to_string()))?;
            Token::Number(value)
        } else if let Some(m) = caps.name("ident") {
            Token::Ident(m.as_str())
        } else {
            match caps.name("op").map(|m| m.as_str()) {
                Some("(") => Token::LParen,
                Some(")") => Token::RParen,
                Some("**") | Some("^") => Token::Op('^'),
                Some(op) => Token::Op(op.chars().next().unwrap_or('?')),
                None => unreachable!("token pattern has exactly three groups"),
            }
        };

        let len = caps.get(0).map(|m| m.end()).unwrap_or(1);
        tokens.push((offset, token));
        offset += len;
    }

    Ok(tokens)
}

struct Compiler<'a, R> {
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
    instructions: Vec<OpCode>,
    constants: Vec<f64>,
    inputs: Vec<u32>,
    depth: usize,
    nesting: usize,
    resolve: R,
}

impl<'a, R> Compiler<'a, R>
where
    R: FnMut(&str) -> u32,
{
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).map(|&(_, t)| t)
    }

    fn advance(&mut self) -> Result<Token<'a>, ExpressionError> {
        let token = self.peek().ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, token: Token<'a>) -> ExpressionError {
        let offset = self.tokens[self.pos - 1].0;
        ExpressionError::UnexpectedToken {
            token: token.to_string(),
            offset,
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.advance()? {
            Token::RParen => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    fn add_const(&mut self, val: f64) -> u32 {
        // Reuse existing constants
        if let Some(idx) = self.constants.iter().position(|&v| v == val) {
            return idx as u32;
        }
        let idx = self.constants.len();
        self.constants.push(val);
        idx as u32
    }

    fn push_value(&mut self, op: OpCode) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > STACK_SIZE {
            return Err(ExpressionError::TooDeep(STACK_SIZE));
        }
        self.instructions.push(op);
        Ok(())
    }

    fn push_binary(&mut self, op: OpCode) {
        self.depth -= 1;
        self.instructions.push(op);
    }

    fn nested<F>(&mut self, parse: F) -> Result<(), ExpressionError>
    where
        F: FnOnce(&mut Self) -> Result<(), ExpressionError>,
    {
        if self.nesting >= MAX_NESTING {
            return Err(ExpressionError::TooNested(MAX_NESTING));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn parse_additive(&mut self) -> Result<(), ExpressionError> {
        self.nested(|this| {
            this.parse_multiplicative()?;
            while let Some(Token::Op(c @ ('+' | '-'))) = this.peek() {
                this.pos += 1;
                this.parse_multiplicative()?;
                this.push_binary(if c == '+' { OpCode::Add } else { OpCode::Sub });
            }
            Ok(())
        })
    }

    fn parse_multiplicative(&mut self) -> Result<(), ExpressionError> {
        self.parse_unary()?;
        while let Some(Token::Op(c @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            self.parse_unary()?;
            self.push_binary(if c == '*' { OpCode::Mul } else { OpCode::Div });
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<(), ExpressionError> {
        self.nested(|this| match this.peek() {
            Some(Token::Op('-')) => {
                this.pos += 1;
                this.parse_unary()?;
                this.instructions.push(OpCode::Neg);
                Ok(())
            }
            Some(Token::Op('+')) => {
                this.pos += 1;
                this.parse_unary()
            }
            _ => this.parse_power(),
        })
    }

    // Right associative, and tighter than unary minus: -a^b == -(a^b).
    fn parse_power(&mut self) -> Result<(), ExpressionError> {
        self.parse_atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.parse_unary()?;
            self.push_binary(OpCode::Pow);
        }
        Ok(())
    }

    fn parse_atom(&mut self) -> Result<(), ExpressionError> {
        match self.advance()? {
            Token::Number(value) => {
                let idx = self.add_const(value);
                self.push_value(OpCode::LoadConst(idx))
            }
            Token::Ident(name) if self.peek() == Some(Token::LParen) => {
                let function = Function::lookup(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
                self.pos += 1;
                self.parse_additive()?;
                self.expect_rparen()?;
                self.instructions.push(OpCode::Call(function));
                Ok(())
            }
            Token::Ident("pi") => {
                let idx = self.add_const(PI);
                self.push_value(OpCode::LoadConst(idx))
            }
            Token::Ident(name) => {
                let slot = (self.resolve)(name);
                self.inputs.push(slot);
                self.push_value(OpCode::Load(slot))
            }
            Token::LParen => {
                self.parse_additive()?;
                self.expect_rparen()
            }
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NAMES: [&str; 3] = ["x", "y", "z"];

    fn compile(expr: &str) -> Result<CompiledExpression, ExpressionError> {
        CompiledExpression::compile(expr, |name| {
            NAMES.iter().position(|&n| n == name).expect("test name") as u32
        })
    }

    fn eval(expr: &str, values: &[f64]) -> f64 {
        compile(expr).expect("compiles").evaluate(values)
    }

    #[test]
    fn respects_precedence() {
        assert_relative_eq!(eval("1 + 2 * 3", &[]), 7.0);
        assert_relative_eq!(eval("(1 + 2) * 3", &[]), 9.0);
        assert_relative_eq!(eval("10 - 4 - 3", &[]), 3.0);
        assert_relative_eq!(eval("12 / 3 / 2", &[]), 2.0);
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        assert_relative_eq!(eval("2^3^2", &[]), 512.0);
        assert_relative_eq!(eval("2**3", &[]), 8.0);
        assert_relative_eq!(eval("-2^2", &[]), -4.0);
        assert_relative_eq!(eval("2^-1", &[]), 0.5);
    }

    #[test]
    fn loads_slots_and_functions() {
        let values = [3.0, 4.0, 0.0];
        assert_relative_eq!(eval("sqrt(x^2 + y^2)", &values), 5.0);
        assert_relative_eq!(eval("pi * x", &values), PI * 3.0);
        assert_relative_eq!(eval("abs(z - x)", &values), 3.0);
        assert_relative_eq!(eval("exp(ln(y))", &values), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn collects_distinct_inputs() {
        let expr = compile("y * x + y / 2").unwrap();
        assert_eq!(expr.inputs(), &[0, 1]);
        assert_eq!(expr.source(), "y * x + y / 2");
    }

    #[test]
    fn division_by_zero_propagates() {
        assert!(eval("x / z", &[1.0, 0.0, 0.0]).is_infinite());
        assert!(eval("z / z", &[1.0, 0.0, 0.0]).is_nan());
    }

    #[test]
    fn scientific_notation() {
        assert_relative_eq!(eval("3e4 * 1.5E-2", &[]), 450.0);
        assert_relative_eq!(eval(".5 + 1.", &[]), 1.5);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(compile("   "), Err(ExpressionError::Empty));
        assert_eq!(compile("1 +"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(compile("(1 + 2"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            compile("foo(2)"),
            Err(ExpressionError::UnknownFunction("foo".into()))
        );
        assert!(matches!(
            compile("2 $ 3"),
            Err(ExpressionError::UnexpectedToken { offset: 2, .. })
        ));
        assert!(matches!(
            compile("1 2"),
            Err(ExpressionError::UnexpectedToken { offset: 2, .. })
        ));
        assert!(matches!(
            compile(")"),
            Err(ExpressionError::UnexpectedToken { offset: 0, .. })
        ));
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let parens = "(".repeat(5_000) + "x" + &")".repeat(5_000);
        assert_eq!(compile(&parens), Err(ExpressionError::TooNested(MAX_NESTING)));

        let signs = "-".repeat(5_000) + "x";
        assert_eq!(compile(&signs), Err(ExpressionError::TooNested(MAX_NESTING)));

        let calls = "sqrt(".repeat(5_000) + "x" + &")".repeat(5_000);
        assert_eq!(compile(&calls), Err(ExpressionError::TooNested(MAX_NESTING)));

        // Moderate nesting still compiles
        let fine = "(".repeat(60) + "x" + &")".repeat(60);
        assert_eq!(eval(&fine, &[2.0, 0.0, 0.0]), 2.0);
    }

    #[test]
    fn rejects_formulas_deeper_than_the_stack() {
        let deep = (0..40).map(|_| "(1+").collect::<String>() + "1" + &")".repeat(40);
        assert_eq!(compile(&deep), Err(ExpressionError::TooDeep(STACK_SIZE)));
    }
}
