//! A tree-walking evaluator for lowered units.
//!
//! Not part of the compilation pipeline: it runs lowered code directly so
//! tests can observe what the emitted dispatch does (constructor and
//! predicate round trips, guard fall-through, match results).

use std::fmt;

use rustc_hash::FxHashMap;
use tagc_ast::{BinOp, Literal, UnaryOp};

use crate::lir::{LExpr, LExprKind, LFunction, LStmt, LStmtKind, LoweredUnit};

/// Calls nested deeper than this fail instead of exhausting the stack.
const MAX_CALL_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
    Tuple(Vec<Value>),
    Carrier {
        type_name: String,
        fields: Vec<(String, Value)>,
    },
    Tag {
        enum_name: String,
        ordinal: usize,
    },
    Present(Box<Value>),
    Absent,
    Boxed(Box<Value>),
    ArmSet(Vec<usize>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::Unit => "()",
            Value::Tuple(_) => "tuple",
            Value::Carrier { .. } => "carrier",
            Value::Tag { .. } => "tag",
            Value::Present(_) | Value::Absent => "optional",
            Value::Boxed(_) => "box",
            Value::ArmSet(_) => "arm set",
        }
    }

    /// The tag ordinal of a carrier value.
    pub fn tag_ordinal(&self) -> Option<usize> {
        match self {
            Value::Carrier { fields, .. } => fields.iter().find_map(|(_, v)| match v {
                Value::Tag { ordinal, .. } => Some(*ordinal),
                _ => None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownFunction(String),
    UnboundVariable(String),
    TypeMismatch { expected: &'static str, found: &'static str },
    MissingField(String),
    AbsentSlot,
    DivisionByZero,
    /// An `Unreachable` statement executed or a switch found no case.
    Unreachable(String),
    CallDepthExceeded,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownFunction(name) => write!(f, "unknown function `{}`", name),
            EvalError::UnboundVariable(name) => write!(f, "unbound variable `{}`", name),
            EvalError::TypeMismatch { expected, found } => {
                write!(f, "expected a value of kind {}, found {}", expected, found)
            }
            EvalError::MissingField(name) => write!(f, "carrier has no field `{}`", name),
            EvalError::AbsentSlot => write!(f, "read of an absent slot"),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Unreachable(msg) => write!(f, "unreachable: {}", msg),
            EvalError::CallDepthExceeded => write!(f, "call depth exceeded"),
        }
    }
}

impl std::error::Error for EvalError {}

enum Flow {
    Normal,
    Return(Value),
}

#[derive(Default)]
struct Env {
    scopes: Vec<FxHashMap<String, Value>>,
}

impl Env {
    fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, value: Value) {
        if self.scopes.is_empty() {
            self.push();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(EvalError::UnboundVariable(name.to_string()))
    }

    fn get(&self, name: &str) -> Result<Value, EvalError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(name.to_string()))
    }
}

pub struct Evaluator<'u> {
    functions: FxHashMap<&'u str, &'u LFunction>,
    /// (carrier type, method) -> method.
    methods: FxHashMap<(&'u str, &'u str), &'u LFunction>,
    depth: usize,
}

impl<'u> Evaluator<'u> {
    pub fn new(unit: &'u LoweredUnit) -> Self {
        let mut functions = FxHashMap::default();
        let mut methods = FxHashMap::default();
        for sum in &unit.sum_types {
            for ctor in &sum.constructors {
                functions.insert(ctor.name.as_str(), ctor);
            }
            for pred in &sum.predicates {
                methods.insert((sum.decl_name.as_str(), pred.name.as_str()), pred);
            }
        }
        for func in &unit.functions {
            functions.insert(func.name.as_str(), func);
        }
        Evaluator {
            functions,
            methods,
            depth: 0,
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let func = *self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        self.invoke(func, None, args)
    }

    pub fn call_method(
        &mut self,
        receiver: Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let type_name = match &receiver {
            Value::Carrier { type_name, .. } => type_name.clone(),
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "carrier",
                    found: other.kind(),
                })
            }
        };
        let func = *self
            .methods
            .get(&(type_name.as_str(), method))
            .ok_or_else(|| EvalError::UnknownFunction(format!("{}.{}", type_name, method)))?;
        self.invoke(func, Some(receiver), args)
    }

    fn invoke(
        &mut self,
        func: &'u LFunction,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepthExceeded);
        }
        self.depth += 1;

        let mut env = Env::default();
        env.push();
        if let Some(receiver) = receiver {
            env.define("self", receiver);
        }
        for (param, arg) in func.params.iter().zip(args) {
            env.define(&param.name, arg);
        }
        let result = self.exec_block(&func.body, &mut env);

        self.depth -= 1;
        Ok(match result? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Unit,
        })
    }

    fn exec_block(&mut self, stmts: &[LStmt], env: &mut Env) -> Result<Flow, EvalError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[LStmt], env: &mut Env) -> Result<Flow, EvalError> {
        env.push();
        let flow = self.exec_block(stmts, env);
        env.pop();
        flow
    }

    fn exec(&mut self, stmt: &LStmt, env: &mut Env) -> Result<Flow, EvalError> {
        match &stmt.kind {
            LStmtKind::Let { name, value, .. } => {
                let value = self.eval(value, env)?;
                env.define(name, value);
            }
            LStmtKind::Declare { name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init, env)?,
                    None => Value::Unit,
                };
                env.define(name, value);
            }
            LStmtKind::Assign { name, value } => {
                let value = self.eval(value, env)?;
                env.assign(name, value)?;
            }
            LStmtKind::Expr(expr) => {
                self.eval(expr, env)?;
            }
            LStmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let branch = if self.eval_bool(cond, env)? {
                    then_body
                } else {
                    else_body
                };
                return self.exec_scoped(branch, env);
            }
            LStmtKind::Switch {
                subject,
                cases,
                default,
            } => {
                let ordinal = match self.eval(subject, env)? {
                    Value::Tag { ordinal, .. } => ordinal,
                    other => {
                        return Err(EvalError::TypeMismatch {
                            expected: "tag",
                            found: other.kind(),
                        })
                    }
                };
                let body = cases
                    .iter()
                    .find(|(tag, _)| tag.ordinal == ordinal)
                    .map(|(_, body)| body)
                    .or(default.as_ref())
                    .ok_or_else(|| {
                        EvalError::Unreachable(format!("no switch case for tag {}", ordinal))
                    })?;
                return self.exec_scoped(body, env);
            }
            LStmtKind::Scope(body) => return self.exec_scoped(body, env),
            LStmtKind::Return(value) => {
                let value = match value {
                    Some(v) => self.eval(v, env)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            LStmtKind::Unreachable(msg) => return Err(EvalError::Unreachable(msg.clone())),
        }
        Ok(Flow::Normal)
    }

    fn eval_bool(&mut self, expr: &LExpr, env: &mut Env) -> Result<bool, EvalError> {
        match self.eval(expr, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::TypeMismatch {
                expected: "Bool",
                found: other.kind(),
            }),
        }
    }

    fn eval(&mut self, expr: &LExpr, env: &mut Env) -> Result<Value, EvalError> {
        Ok(match &expr.kind {
            LExprKind::Lit(lit) => match lit {
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(x) => Value::Float(*x),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::String(s) => Value::Str(s.clone()),
            },
            LExprKind::Unit => Value::Unit,
            LExprKind::Var(name) => env.get(name)?,
            LExprKind::Binary { op, lhs, rhs } => match op {
                BinOp::And => Value::Bool(self.eval_bool(lhs, env)? && self.eval_bool(rhs, env)?),
                BinOp::Or => Value::Bool(self.eval_bool(lhs, env)? || self.eval_bool(rhs, env)?),
                _ => {
                    let l = self.eval(lhs, env)?;
                    let r = self.eval(rhs, env)?;
                    binary(*op, l, r)?
                }
            },
            LExprKind::Unary { op, operand } => match (op, self.eval(operand, env)?) {
                (UnaryOp::Neg, Value::Int(n)) => Value::Int(n.wrapping_neg()),
                (UnaryOp::Neg, Value::Float(x)) => Value::Float(-x),
                (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
                (_, other) => {
                    return Err(EvalError::TypeMismatch {
                        expected: "number or Bool",
                        found: other.kind(),
                    })
                }
            },
            LExprKind::Call { callee, args } => {
                let args = self.eval_all(args, env)?;
                self.call(callee, args)?
            }
            LExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver, env)?;
                let args = self.eval_all(args, env)?;
                self.call_method(receiver, method, args)?
            }
            LExprKind::Tuple(elems) => Value::Tuple(self.eval_all(elems, env)?),
            LExprKind::TupleField { base, index } => match self.eval(base, env)? {
                Value::Tuple(mut elems) if *index < elems.len() => elems.swap_remove(*index),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "tuple",
                        found: other.kind(),
                    })
                }
            },
            LExprKind::Field { base, field } => match self.eval(base, env)? {
                Value::Carrier { fields, .. } => fields
                    .into_iter()
                    .find(|(name, _)| name == field)
                    .map(|(_, v)| v)
                    .ok_or_else(|| EvalError::MissingField(field.clone()))?,
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "carrier",
                        found: other.kind(),
                    })
                }
            },
            LExprKind::Tag(tag) => Value::Tag {
                enum_name: tag.enum_name.clone(),
                ordinal: tag.ordinal,
            },
            LExprKind::Carrier { type_name, fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    values.push((name.clone(), self.eval(e, env)?));
                }
                Value::Carrier {
                    type_name: type_name.clone(),
                    fields: values,
                }
            }
            LExprKind::Present(inner) => Value::Present(Box::new(self.eval(inner, env)?)),
            LExprKind::Absent => Value::Absent,
            LExprKind::Unwrap(inner) => match self.eval(inner, env)? {
                Value::Present(v) => *v,
                Value::Absent => return Err(EvalError::AbsentSlot),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "optional",
                        found: other.kind(),
                    })
                }
            },
            LExprKind::MakeBox(inner) => Value::Boxed(Box::new(self.eval(inner, env)?)),
            LExprKind::Unbox(inner) => match self.eval(inner, env)? {
                Value::Boxed(v) => *v,
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "box",
                        found: other.kind(),
                    })
                }
            },
            LExprKind::ArmSet(arms) => Value::ArmSet(arms.clone()),
            LExprKind::ArmSetContains { set, arm } => match self.eval(set, env)? {
                Value::ArmSet(arms) => Value::Bool(arms.contains(arm)),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "arm set",
                        found: other.kind(),
                    })
                }
            },
        })
    }

    fn eval_all(&mut self, exprs: &[LExpr], env: &mut Env) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    use Value::{Bool, Float, Int, Str};

    if op == BinOp::Eq {
        return Ok(Bool(numeric_eq(&l, &r).unwrap_or(l == r)));
    }
    if op == BinOp::Ne {
        return Ok(Bool(!numeric_eq(&l, &r).unwrap_or(l == r)));
    }

    Ok(match (l, r) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => Int(a.wrapping_add(b)),
            BinOp::Sub => Int(a.wrapping_sub(b)),
            BinOp::Mul => Int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Rem if b == 0 => return Err(EvalError::DivisionByZero),
            BinOp::Div => Int(a.wrapping_div(b)),
            BinOp::Rem => Int(a.wrapping_rem(b)),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            _ => return Err(mismatch("Bool", "Int")),
        },
        (Str(a), Str(b)) => match op {
            BinOp::Add => Str(a + &b),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            _ => return Err(mismatch("number", "String")),
        },
        (l, r) => {
            let (a, b) = match (as_float(&l), as_float(&r)) {
                (Some(a), Some(b)) => (a, b),
                (None, _) => return Err(mismatch("number", l.kind())),
                (_, None) => return Err(mismatch("number", r.kind())),
            };
            match op {
                BinOp::Add => Float(a + b),
                BinOp::Sub => Float(a - b),
                BinOp::Mul => Float(a * b),
                BinOp::Div => Float(a / b),
                BinOp::Rem => Float(a % b),
                BinOp::Lt => Bool(a < b),
                BinOp::Le => Bool(a <= b),
                BinOp::Gt => Bool(a > b),
                BinOp::Ge => Bool(a >= b),
                _ => return Err(mismatch("Bool", "Float")),
            }
        }
    })
}

fn mismatch(expected: &'static str, found: &'static str) -> EvalError {
    EvalError::TypeMismatch { expected, found }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Mixed Int/Float equality compares numerically.
fn numeric_eq(l: &Value, r: &Value) -> Option<bool> {
    match (l, r) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            Some(as_float(l)? == as_float(r)?)
        }
        _ => None,
    }
}
