use bitflags::bitflags;

use crate::token::{ID, QID, QQID};

bitflags! {
    /// Node properties computed by the checker.
    ///
    /// A single flag set is shared between node kinds; each kind only ever
    /// sets the flags that make sense for it (a `while` loop has no use for
    /// `CALL_SUSPENDIBLE`, an expression none for `HAS_BREAK`).
    #[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
    pub struct Flags: u32 {
        /// The expression contains a call that may suspend.
        const SUSPENDIBLE = 1 << 0;
        /// The expression itself is a call that may suspend.
        const CALL_SUSPENDIBLE = 1 << 1;
        /// The static analyzer proved that, although marked suspendible,
        /// this call cannot actually suspend.
        const PROVEN_NOT_TO_SUSPEND = 1 << 2;
        /// The function is `pub` (as opposed to `pri`).
        const PUBLIC = 1 << 3;
        /// The loop body contains a `break` targeting it.
        const HAS_BREAK = 1 << 4;
        /// The loop body contains a `continue` targeting it.
        const HAS_CONTINUE = 1 << 5;
    }
}

/// The flag subset that participates in expression equality.
pub const FLAGS_THAT_MATTER_FOR_EQ: Flags = Flags::SUSPENDIBLE.union(Flags::CALL_SUSPENDIBLE);

/// A typed expression.
///
/// Expressions keep the compact three-ID shape of the token layer: `op` is
/// the (disambiguated) operator, `pkg` an optional qualifier and `ident` the
/// identifier, literal or method name. Leaves have an invalid `op`. Calls use
/// [`ID::OPEN_PAREN`] (or [`ID::TRY`] for `try` calls) as their `op`, with
/// the callee in `lhs` and the arguments in `args`.
#[derive(Clone, Default, Debug)]
pub struct Expr {
    pub flags: Flags,
    pub op: ID,
    pub pkg: ID,
    pub ident: ID,
    /// Filled in by constant folding. Two expressions with constant values
    /// compare equal iff the values are numerically equal.
    pub const_value: Option<i128>,
    /// The expression's type, filled in by the checker.
    pub mtype: Option<Box<TypeExpr>>,
    pub lhs: Option<Box<Expr>>,
    pub mhs: Option<Box<Expr>>,
    pub rhs: Option<Operand>,
    pub args: Vec<Expr>,
}

/// The right operand slot of an [`Expr`]: for an `as` cast it holds a type
/// expression, for everything else an expression.
#[derive(Clone, Debug)]
pub enum Operand {
    Expr(Box<Expr>),
    Type(Box<TypeExpr>),
}

impl Operand {
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Operand::Expr(e) => Some(e),
            Operand::Type(_) => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeExpr> {
        match self {
            Operand::Expr(_) => None,
            Operand::Type(t) => Some(t),
        }
    }
}

impl Expr {
    pub fn suspendible(&self) -> bool {
        self.flags.contains(Flags::SUSPENDIBLE)
    }

    pub fn call_suspendible(&self) -> bool {
        self.flags.contains(Flags::CALL_SUSPENDIBLE)
    }

    pub fn proven_not_to_suspend(&self) -> bool {
        self.flags.contains(Flags::PROVEN_NOT_TO_SUSPEND)
    }

    pub fn is_call(&self) -> bool {
        self.op == ID::OPEN_PAREN || self.op == ID::TRY
    }

    pub fn rhs_expr(&self) -> Option<&Expr> {
        self.rhs.as_ref().and_then(Operand::as_expr)
    }

    pub fn rhs_type(&self) -> Option<&TypeExpr> {
        self.rhs.as_ref().and_then(Operand::as_type)
    }

    /// Returns whether `self` and `other` are equal.
    ///
    /// May report false negatives: in general it will not report that
    /// `x + y` equals `y + x`. However, if both are constant expressions
    /// (i.e. every node, including the sum nodes, has a `const_value`), both
    /// sums have the same value and compare equal.
    pub fn eq(&self, other: &Expr) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if let (Some(n), Some(o)) = (self.const_value, other.const_value) {
            return n == o;
        }

        if (self.flags & FLAGS_THAT_MATTER_FOR_EQ) != (other.flags & FLAGS_THAT_MATTER_FOR_EQ)
            || self.op != other.op
            || self.pkg != other.pkg
            || self.ident != other.ident
        {
            return false;
        }
        if !eq_opt(self.lhs.as_deref(), other.lhs.as_deref()) {
            return false;
        }
        if !eq_opt(self.mhs.as_deref(), other.mhs.as_deref()) {
            return false;
        }

        if self.op == ID::X_BINARY_AS {
            if !eq_opt_type(self.rhs_type(), other.rhs_type()) {
                return false;
            }
        } else if !eq_opt(self.rhs_expr(), other.rhs_expr()) {
            return false;
        }

        if self.args.len() != other.args.len() {
            return false;
        }
        self.args
            .iter()
            .zip(other.args.iter())
            .all(|(x, y)| x.eq(y))
    }

    /// Returns whether `other` appears somewhere within `self`: the closure
    /// of [`Expr::eq`] under "is a subexpression of".
    pub fn mentions(&self, other: &Expr) -> bool {
        if self.eq(other) {
            return true;
        }
        if let Some(lhs) = self.lhs.as_deref() {
            if lhs.mentions(other) {
                return true;
            }
        }
        if let Some(mhs) = self.mhs.as_deref() {
            if mhs.mentions(other) {
                return true;
            }
        }
        if self.op != ID::X_BINARY_AS {
            if let Some(rhs) = self.rhs_expr() {
                if rhs.mentions(other) {
                    return true;
                }
            }
        }
        self.args.iter().any(|x| x.mentions(other))
    }
}

fn eq_opt(n: Option<&Expr>, o: Option<&Expr>) -> bool {
    match (n, o) {
        (None, None) => true,
        (Some(n), Some(o)) => n.eq(o),
        _ => false,
    }
}

fn eq_opt_type(n: Option<&TypeExpr>, o: Option<&TypeExpr>) -> bool {
    match (n, o) {
        (None, None) => true,
        (Some(n), Some(o)) => n.eq(o),
        _ => false,
    }
}

/// A type expression: a chain of decorators (`ptr`, `slice`, `array[N]`, …)
/// around a base type, which may carry refinement bounds (`u32[i:j]`).
///
/// For an array type, `min` holds the array length.
#[derive(Clone, Default, Debug)]
pub struct TypeExpr {
    /// [`ID::INVALID`] for an undecorated base type.
    pub decorator: ID,
    /// The base type's qualified name. Only meaningful on the innermost
    /// (undecorated) level.
    pub qid: QID,
    pub min: Option<Box<Expr>>,
    pub max: Option<Box<Expr>>,
    pub inner: Option<Box<TypeExpr>>,
}

impl TypeExpr {
    pub fn is_array_type(&self) -> bool {
        self.decorator == ID::ARRAY
    }

    pub fn is_slice_type(&self) -> bool {
        self.decorator == ID::SLICE
    }

    pub fn is_table_type(&self) -> bool {
        self.decorator == ID::TABLE
    }

    pub fn is_ptr_type(&self) -> bool {
        self.decorator == ID::PTR || self.decorator == ID::NPTR
    }

    pub fn is_io_type(&self) -> bool {
        self.decorator == ID::INVALID
            && self.qid.0[0] == ID::BASE
            && (self.qid.0[1] == ID::IO_READER || self.qid.0[1] == ID::IO_WRITER)
    }

    pub fn is_io_writer_type(&self) -> bool {
        self.decorator == ID::INVALID && self.qid.0 == [ID::BASE, ID::IO_WRITER]
    }

    pub fn is_refined(&self) -> bool {
        !self.is_array_type() && (self.min.is_some() || self.max.is_some())
    }

    pub fn bounds(&self) -> [Option<&Expr>; 2] {
        [self.min.as_deref(), self.max.as_deref()]
    }

    /// Returns whether `self` and `other` are equal.
    pub fn eq(&self, other: &TypeExpr) -> bool {
        self.eq_impl(other, false)
    }

    /// Returns whether `self` and `other` are equal, ignoring the `[i:j]` in
    /// `u32[i:j]`. Array lengths still participate.
    pub fn eq_ignoring_refinements(&self, other: &TypeExpr) -> bool {
        self.eq_impl(other, true)
    }

    fn eq_impl(&self, other: &TypeExpr, ignore_refinements: bool) -> bool {
        let (mut n, mut o) = (self, other);
        loop {
            if std::ptr::eq(n, o) {
                return true;
            }
            if n.decorator != o.decorator || n.qid != o.qid {
                return false;
            }
            if n.is_array_type() || !ignore_refinements {
                if !eq_opt(n.min.as_deref(), o.min.as_deref())
                    || !eq_opt(n.max.as_deref(), o.max.as_deref())
                {
                    return false;
                }
            }
            match (n.inner.as_deref(), o.inner.as_deref()) {
                (None, None) => return true,
                (Some(a), Some(b)) => {
                    n = a;
                    o = b;
                }
                _ => return false,
            }
        }
    }
}

/// A unique label for a loop statement within one function, used to connect
/// `break`/`continue` statements with their targets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LoopId(pub u32);

/// A statement.
#[derive(Clone, Debug)]
pub enum Stmt {
    Assert(Assert),
    Assign(Assign),
    Expr(ExprStmt),
    IOBind(IOBind),
    If(If),
    Iterate(Iterate),
    Jump(Jump),
    Ret(Ret),
    Var(Var),
    While(While),
}

/// An `assert`, `pre`, `inv` or `post` statement. Assertions apply at
/// compile time only and produce no code.
#[derive(Clone, Debug)]
pub struct Assert {
    pub keyword: ID,
    pub condition: Expr,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct Assign {
    /// An assignment operator: `=`, `+=`, `~sat+=`, …
    pub op: ID,
    pub lhs: Expr,
    pub rhs: Expr,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
    pub line: u32,
}

/// An `io_bind (a, b) { … }` statement: the body runs with the named I/O
/// readers/writers temporarily retargeted.
#[derive(Clone, Debug)]
pub struct IOBind {
    pub in_fields: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct If {
    pub condition: Expr,
    pub body_if_true: Vec<Stmt>,
    pub body_if_false: Vec<Stmt>,
    pub else_if: Option<Box<If>>,
    pub line: u32,
}

/// An `iterate (x in s) length L unroll U { … }` statement.
#[derive(Clone, Debug)]
pub struct Iterate {
    pub loop_id: LoopId,
    pub flags: Flags,
    pub vars: Vec<Var>,
    /// A small-power-of-two literal ID.
    pub length: ID,
    /// A small-power-of-two literal ID.
    pub unroll: ID,
    pub body: Vec<Stmt>,
    pub else_iterate: Option<Box<Iterate>>,
    pub line: u32,
}

/// A `break` or `continue` statement.
#[derive(Clone, Debug)]
pub struct Jump {
    /// [`ID::BREAK`] or [`ID::CONTINUE`].
    pub keyword: ID,
    pub target: LoopId,
    pub line: u32,
}

/// A `return` or `yield` statement.
#[derive(Clone, Debug)]
pub struct Ret {
    /// [`ID::RETURN`] or [`ID::YIELD`].
    pub keyword: ID,
    pub value: Option<Expr>,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct Var {
    pub name: ID,
    pub xtype: TypeExpr,
    pub value: Option<Expr>,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub struct While {
    pub loop_id: LoopId,
    pub flags: Flags,
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub line: u32,
}

impl Iterate {
    pub fn has_break(&self) -> bool {
        self.flags.contains(Flags::HAS_BREAK)
    }

    pub fn has_continue(&self) -> bool {
        self.flags.contains(Flags::HAS_CONTINUE)
    }
}

impl While {
    pub fn has_break(&self) -> bool {
        self.flags.contains(Flags::HAS_BREAK)
    }

    pub fn has_continue(&self) -> bool {
        self.flags.contains(Flags::HAS_CONTINUE)
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: ID,
    pub xtype: TypeExpr,
}

/// A function definition, as seen by the code generator: fully checked, with
/// every operator in its disambiguated x-form.
#[derive(Clone, Debug)]
pub struct Func {
    pub flags: Flags,
    pub filename: String,
    pub line: u32,
    /// `(pkg, struct)` of the receiver; zero for a free function.
    pub receiver: QID,
    pub name: ID,
    pub in_fields: Vec<Field>,
    pub out_fields: Vec<Field>,
    pub body: Vec<Stmt>,
}

impl Func {
    pub fn public(&self) -> bool {
        self.flags.contains(Flags::PUBLIC)
    }

    pub fn suspendible(&self) -> bool {
        self.flags.contains(Flags::SUSPENDIBLE)
    }

    pub fn qqid(&self) -> QQID {
        QQID([self.receiver.0[0], self.receiver.0[1], self.name])
    }
}
