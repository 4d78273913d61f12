//! Expression model consumed by the resolver.
//!
//! Parsing is external: embedders lower their syntax tree into an
//! `ExprArena`. Each node is addressed by its `ExprId`, which is also the key
//! of the resolution cache.

use kres_common::{Atom, Span};
use kres_solver::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Long(i64),
    Double(f64),
    String(Atom),
    Bool(bool),
    Char(char),
    Null,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Div,
    Rem,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

impl BinaryOp {
    /// Name of the operator function the expression desugars to.
    pub fn operator_name(self) -> &'static str {
        match self {
            BinaryOp::Plus => "plus",
            BinaryOp::Minus => "minus",
            BinaryOp::Times => "times",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEq | BinaryOp::GreaterEq => {
                "compareTo"
            }
        }
    }

    /// Comparisons call `compareTo` and yield `Boolean`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEq | BinaryOp::GreaterEq
        )
    }
}

/// One value argument at a call site.
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub name: Option<Atom>,
    /// `*array` spread into a vararg parameter.
    pub spread: bool,
    pub value: ExprId,
}

impl Argument {
    pub fn positional(value: ExprId) -> Self {
        Argument {
            name: None,
            spread: false,
            value,
        }
    }

    pub fn named(name: Atom, value: ExprId) -> Self {
        Argument {
            name: Some(name),
            spread: false,
            value,
        }
    }

    pub fn spread(value: ExprId) -> Self {
        Argument {
            name: None,
            spread: true,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LambdaParam {
    pub name: Atom,
    pub declared_type: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Variable or property reference, `receiver?.name` when `safe`.
    Access {
        receiver: Option<ExprId>,
        safe: bool,
        name: Atom,
    },
    Call {
        receiver: Option<ExprId>,
        safe: bool,
        callee: Atom,
        type_args: Vec<TypeId>,
        args: Vec<Argument>,
        trailing_lambda: Option<ExprId>,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// `params == None` is a lambda without a parameter list, which binds
    /// `it` when the expected function type has exactly one parameter.
    Lambda {
        params: Option<Vec<LambdaParam>>,
        body: ExprId,
    },
    /// `Type::name` or `::name`.
    CallableRef {
        receiver_type: Option<TypeId>,
        name: Atom,
    },
    This {
        label: Option<Atom>,
    },
    NotNull(ExprId),
    Block(Vec<ExprId>),
}

#[derive(Clone, Debug)]
struct ExprNode {
    expr: Expr,
    span: Span,
}

/// Arena of expression nodes.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
}

impl ExprArena {
    pub fn new() -> Self {
        ExprArena { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, expr: Expr, span: Span) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(ExprNode { expr, span });
        id
    }

    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.nodes.get(id.0 as usize).map(|node| &node.expr)
    }

    pub fn span(&self, id: ExprId) -> Span {
        self.nodes
            .get(id.0 as usize)
            .map_or(Span::dummy(), |node| node.span)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // Construction helpers
    // =========================================================================

    pub fn int(&mut self, value: i64, span: Span) -> ExprId {
        self.alloc(Expr::Literal(Literal::Int(value)), span)
    }

    pub fn string(&mut self, value: Atom, span: Span) -> ExprId {
        self.alloc(Expr::Literal(Literal::String(value)), span)
    }

    pub fn null(&mut self, span: Span) -> ExprId {
        self.alloc(Expr::Literal(Literal::Null), span)
    }

    pub fn name_ref(&mut self, name: Atom, span: Span) -> ExprId {
        self.alloc(
            Expr::Access {
                receiver: None,
                safe: false,
                name,
            },
            span,
        )
    }

    pub fn access(&mut self, receiver: ExprId, name: Atom, safe: bool, span: Span) -> ExprId {
        self.alloc(
            Expr::Access {
                receiver: Some(receiver),
                safe,
                name,
            },
            span,
        )
    }

    /// `callee(args...)` without receiver, type arguments or trailing lambda.
    pub fn call(&mut self, callee: Atom, args: Vec<Argument>, span: Span) -> ExprId {
        self.alloc(
            Expr::Call {
                receiver: None,
                safe: false,
                callee,
                type_args: Vec::new(),
                args,
                trailing_lambda: None,
            },
            span,
        )
    }

    pub fn method_call(
        &mut self,
        receiver: ExprId,
        callee: Atom,
        args: Vec<Argument>,
        trailing_lambda: Option<ExprId>,
        span: Span,
    ) -> ExprId {
        self.alloc(
            Expr::Call {
                receiver: Some(receiver),
                safe: false,
                callee,
                type_args: Vec::new(),
                args,
                trailing_lambda,
            },
            span,
        )
    }

    pub fn lambda(&mut self, params: Option<Vec<LambdaParam>>, body: ExprId, span: Span) -> ExprId {
        self.alloc(Expr::Lambda { params, body }, span)
    }
}
