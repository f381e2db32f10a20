//! 表达式解析与求值
//!
//! 计算度量节点与参数曲线使用的小型算术表达式：
//! - 数值字面量: `2`, `0.5`, `1e-3`
//! - 记号: `M1`, `M2`（引用其他度量节点）, `t`（参数曲线的参数）
//! - 常量: `pi`, `e`
//! - 运算符: `+ - * / ^`（`^` 右结合），一元负号，括号
//! - 函数: `sin cos tan asin acos atan atan2 sinh cosh tanh exp ln log sqrt abs sgn floor ceil min max`
//!
//! 求值错误是带类型的，不会以 NaN 的形式静默传播。

use std::collections::BTreeSet;
use thiserror::Error;

/// 表达式错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("function {name} expects {expected} argument(s), got {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("undefined token: {0}")]
    UndefinedToken(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{function} is undefined at {argument}")]
    Domain { function: String, argument: f64 },
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// 内置函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log,
    Sqrt,
    Abs,
    Sgn,
    Floor,
    Ceil,
    Min,
    Max,
}

impl Function {
    /// 根据名称查找函数
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" | "arcsin" => Function::Asin,
            "acos" | "arccos" => Function::Acos,
            "atan" | "arctan" => Function::Atan,
            "atan2" => Function::Atan2,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "log" => Function::Log,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "sgn" | "sign" => Function::Sgn,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "min" => Function::Min,
            "max" => Function::Max,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Atan2 => "atan2",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Sgn => "sgn",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Min => "min",
            Function::Max => "max",
        }
    }

    /// 参数个数
    pub fn arity(&self) -> usize {
        match self {
            Function::Atan2 | Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    fn apply(&self, args: &[f64]) -> Result<f64, ExprError> {
        let x = args[0];
        let domain = |argument: f64| ExprError::Domain {
            function: self.name().to_string(),
            argument,
        };
        let value = match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin | Function::Acos => {
                if x.abs() > 1.0 + 1e-12 {
                    return Err(domain(x));
                }
                let clamped = x.clamp(-1.0, 1.0);
                if *self == Function::Asin {
                    clamped.asin()
                } else {
                    clamped.acos()
                }
            }
            Function::Atan => x.atan(),
            Function::Atan2 => x.atan2(args[1]),
            Function::Sinh => x.sinh(),
            Function::Cosh => x.cosh(),
            Function::Tanh => x.tanh(),
            Function::Exp => x.exp(),
            Function::Ln | Function::Log => {
                if x <= 0.0 {
                    return Err(domain(x));
                }
                if *self == Function::Ln {
                    x.ln()
                } else {
                    x.log10()
                }
            }
            Function::Sqrt => {
                if x < 0.0 {
                    return Err(domain(x));
                }
                x.sqrt()
            }
            Function::Abs => x.abs(),
            Function::Sgn => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Function::Floor => x.floor(),
            Function::Ceil => x.ceil(),
            Function::Min => x.min(args[1]),
            Function::Max => x.max(args[1]),
        };
        Ok(value)
    }
}

/// 表达式语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Token(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// 解析表达式文本
    pub fn parse(text: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: text.len(),
        };
        let expr = parser.expression()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(ExprError::Syntax {
                position: *position,
                message: format!("unexpected {}", token.describe()),
            });
        }
        Ok(expr)
    }

    /// 表达式引用的全部记号（不含常量 `pi`、`e`）
    pub fn tokens(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Token(name) => {
                if constant(name).is_none() {
                    out.insert(name.clone());
                }
            }
            Expr::Negate(inner) => inner.collect_tokens(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_tokens(out);
                rhs.collect_tokens(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_tokens(out);
                }
            }
        }
    }

    /// 求值
    ///
    /// `lookup` 为记号提供数值；未绑定的记号先尝试常量，再报告 `UndefinedToken`
    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64, ExprError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Token(name) => lookup(name)
                .or_else(|| constant(name))
                .ok_or_else(|| ExprError::UndefinedToken(name.clone())),
            Expr::Negate(inner) => Ok(-inner.evaluate(lookup)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.evaluate(lookup)?;
                let b = rhs.evaluate(lookup)?;
                match op {
                    BinaryOp::Add => Ok(a + b),
                    BinaryOp::Sub => Ok(a - b),
                    BinaryOp::Mul => Ok(a * b),
                    BinaryOp::Div => {
                        if b == 0.0 {
                            Err(ExprError::DivisionByZero)
                        } else {
                            Ok(a / b)
                        }
                    }
                    BinaryOp::Pow => {
                        let value = a.powf(b);
                        if value.is_nan() {
                            Err(ExprError::Domain {
                                function: "^".to_string(),
                                argument: a,
                            })
                        } else if value.is_infinite() && a == 0.0 {
                            Err(ExprError::DivisionByZero)
                        } else {
                            Ok(value)
                        }
                    }
                }
            }
            Expr::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(lookup)?);
                }
                function.apply(&values)
            }
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "PI" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number {}", v),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Op(c) => format!("operator '{}'", c),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // 指数部分: 1e-3, 2E5
            if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j].1 == '+' || chars[j].1 == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(text.len());
            let literal = &text[position..end];
            let value = literal.parse::<f64>().map_err(|_| ExprError::Syntax {
                position: chars[start].0,
                message: format!("invalid number '{}'", literal),
            })?;
            tokens.push((position, Token::Number(value)));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(text.len());
            tokens.push((chars[start].0, Token::Ident(text[position..end].to_string())));
            continue;
        }

        let token = match c {
            '+' | '-' | '*' | '/' | '^' => Token::Op(c),
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            _ => {
                return Err(ExprError::Syntax {
                    position,
                    message: format!("unexpected character '{}'", c),
                })
            }
        };
        tokens.push((position, token));
        i += 1;
    }

    Ok(tokens)
}

/// 递归下降解析器
///
/// ```text
/// expression := term (('+' | '-') term)*
/// term       := unary (('*' | '/') unary)*
/// unary      := '-' unary | power
/// power      := primary ('^' unary)?
/// primary    := number | ident | ident '(' args ')' | '(' expression ')'
/// ```
struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn syntax(&self, message: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => {
                let message = format!("expected {}, found {}", expected.describe(), token.describe());
                Err(self.syntax(message))
            }
            None => Err(self.syntax(format!("expected {}, found end of input", expected.describe()))),
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/'))) = self.peek() {
            let op = if *c == '*' { BinaryOp::Mul } else { BinaryOp::Div };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        if let Some(Token::Op('+')) = self.peek() {
            self.pos += 1;
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            // -2^2 = -(2^2)，而 2^-1 合法
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.syntax("unexpected end of input")),
        };

        match token {
            Token::Number(value) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Token::Ident(name) => {
                self.pos += 1;
                if let Some(Token::LParen) = self.peek() {
                    let function = Function::from_name(&name)
                        .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                    self.pos += 1;
                    let args = self.arguments()?;
                    if args.len() != function.arity() {
                        return Err(ExprError::ArgumentCount {
                            name,
                            expected: function.arity(),
                            found: args.len(),
                        });
                    }
                    Ok(Expr::Call { function, args })
                } else {
                    Ok(Expr::Token(name))
                }
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(self.syntax(format!("unexpected {}", other.describe()))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                _ => break,
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}
