// ==========================================
// 报价材料引擎 - 派生公式求值引擎
// ==========================================
// 依据: 报价引擎业务规则 v0.2 - 派生公式口径
// 红线: 禁止动态执行任意代码; 公式只允许受限算术文法
// 红线: 求值失败绝不向调用方抛出, 统一回退 baseQty 并记录诊断
// ==========================================
// 文法: + - * / 括号 一元负号 数字字面量
//       变量 baseQty, 函数 ceil/floor/round/min/max
// ==========================================

use thiserror::Error;
use tracing::warn;

/// 公式中唯一的自由变量名(配置契约的一部分, 区分大小写)
pub const BASE_QTY_VAR: &str = "baseQty";

// ==========================================
// FormulaError - 公式错误类型
// ==========================================
// 仅作为内部诊断与配置校验输出, 运行期对外不可见
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("表达式为空")]
    Empty,

    #[error("非法字符: '{0}'")]
    UnexpectedChar(char),

    #[error("数字字面量非法: {0}")]
    BadNumber(String),

    #[error("语法错误: {0}")]
    Syntax(String),

    #[error("未知标识符: {0}")]
    UnknownIdentifier(String),

    #[error("未知函数: {0}")]
    UnknownFunction(String),

    #[error("函数 {name} 参数个数错误: 期望 {expected}, 实际 {actual}")]
    BadArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("计算结果非有限数值")]
    NonFinite,
}

// ==========================================
// 词法记号
// ==========================================
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::BadNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(FormulaError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

// ==========================================
// 抽象语法树
// ==========================================
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    BaseQty,
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Ceil,
    Floor,
    Round,
    Min,
    Max,
}

impl Func {
    fn resolve(name: &str) -> Option<(Func, usize)> {
        match name {
            "ceil" => Some((Func::Ceil, 1)),
            "floor" => Some((Func::Floor, 1)),
            "round" => Some((Func::Round, 1)),
            "min" => Some((Func::Min, 2)),
            "max" => Some((Func::Max, 2)),
            _ => None,
        }
    }
}

// ==========================================
// 递归下降解析器
// ==========================================
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token, context: &str) -> Result<(), FormulaError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            _ => Err(FormulaError::Syntax(format!("{} 处缺少 {:?}", context, expected))),
        }
    }

    /// expr := term (('+'|'-') term)*
    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// term := factor (('*'|'/') factor)*
    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// factor := NUMBER | baseQty | FUNC '(' expr (',' expr)* ')'
    ///         | '(' expr ')' | '-' factor
    fn parse_factor(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.parse_factor()?))),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.eat(&Token::RParen, "括号表达式")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let args = self.parse_args()?;
                    let (func, expected) = Func::resolve(&name)
                        .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
                    if args.len() != expected {
                        return Err(FormulaError::BadArity {
                            name,
                            expected,
                            actual: args.len(),
                        });
                    }
                    Ok(Expr::Call(func, args))
                } else if name == BASE_QTY_VAR {
                    Ok(Expr::BaseQty)
                } else {
                    Err(FormulaError::UnknownIdentifier(name))
                }
            }
            Some(other) => Err(FormulaError::Syntax(format!("意外的记号 {:?}", other))),
            None => Err(FormulaError::Syntax("表达式不完整".to_string())),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = vec![self.parse_expr()?];
        loop {
            match self.advance() {
                Some(Token::Comma) => args.push(self.parse_expr()?),
                Some(Token::RParen) => return Ok(args),
                _ => return Err(FormulaError::Syntax("函数参数列表未闭合".to_string())),
            }
        }
    }
}

fn parse(expression: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }

    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(FormulaError::Syntax("表达式末尾存在多余记号".to_string()));
    }
    Ok(expr)
}

fn eval(expr: &Expr, base_qty: f64) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::BaseQty => Ok(base_qty),
        Expr::Neg(inner) => Ok(-eval(inner, base_qty)?),
        Expr::Add(lhs, rhs) => Ok(eval(lhs, base_qty)? + eval(rhs, base_qty)?),
        Expr::Sub(lhs, rhs) => Ok(eval(lhs, base_qty)? - eval(rhs, base_qty)?),
        Expr::Mul(lhs, rhs) => Ok(eval(lhs, base_qty)? * eval(rhs, base_qty)?),
        Expr::Div(lhs, rhs) => {
            // 除法是唯一能产生 NaN/Inf 的节点, 立即拦截,
            // 避免非有限值被后续 min/max 吞掉
            let value = eval(lhs, base_qty)? / eval(rhs, base_qty)?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(FormulaError::NonFinite)
            }
        }
        Expr::Call(func, args) => {
            let values: Vec<f64> = args
                .iter()
                .map(|a| eval(a, base_qty))
                .collect::<Result<_, _>>()?;
            match func {
                Func::Ceil => Ok(values[0].ceil()),
                Func::Floor => Ok(values[0].floor()),
                Func::Round => Ok(values[0].round()),
                Func::Min => Ok(values[0].min(values[1])),
                Func::Max => Ok(values[0].max(values[1])),
            }
        }
    }
}

// ==========================================
// FormulaEvaluator - 公式求值引擎
// ==========================================
pub struct FormulaEvaluator;

impl FormulaEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// 仅做语法检查(配置校验用), 不求值
    pub fn check(&self, expression: &str) -> Result<(), FormulaError> {
        parse(expression).map(|_| ())
    }

    /// 解析并求值, 失败时返回具体错误
    ///
    /// 对给定 (expression, base_qty) 结果确定且无副作用
    pub fn try_evaluate(&self, expression: &str, base_qty: f64) -> Result<f64, FormulaError> {
        let expr = parse(expression)?;
        let value = eval(&expr, base_qty)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }

    /// 求值, 失败时回退 baseQty
    ///
    /// # 失败策略
    /// - 任何解析/求值失败都不向调用方传播, 统一回退 base_qty
    /// - 失败通过 warn 日志输出诊断, 供规则维护者排查
    pub fn evaluate(&self, expression: &str, base_qty: f64) -> f64 {
        match self.try_evaluate(expression, base_qty) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    expression = %expression,
                    base_qty = base_qty,
                    error = %e,
                    "公式求值失败, 回退 baseQty"
                );
                base_qty
            }
        }
    }
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
