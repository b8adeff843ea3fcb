use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};

use crate::{
    ast,
    token::{Map, ID, QQID},
};

mod expr;
mod func;
mod statement;
#[cfg(test)]
mod tests;

// Structural limits. Exceeding one aborts emission of the current function
// with a descriptive error.
const MAX_BODY_DEPTH: u32 = 255;
const MAX_EXPR_DEPTH: u32 = 255;
const MAX_TEMP: u32 = 10_000;
const MAX_IO_BINDS: u32 = 100;
const MAX_IO_BIND_IN_FIELDS: usize = 8;
const MAX_JUMP_TARGETS: u32 = 1_000_000;
const MAX_NESTED_IFS: u32 = 1_000;
const MAX_CORO_SUSP_POINT: u32 = u32::MAX;

#[derive(Debug, thiserror::Error)]
#[error("func {func}: {kind}")]
pub struct Error {
    pub func: String,
    pub kind: ErrorKind,
}

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("statement recursion depth too large")]
    BodyTooDeep,
    #[error("expression recursion depth too large")]
    ExprTooDeep,
    #[error("too many jump targets")]
    TooManyJumpTargets,
    #[error("too many temporary variables required")]
    TooManyTemporaries,
    #[error("too many io_bind scopes required")]
    TooManyIOBinds,
    #[error("too many coroutine suspension points required")]
    TooManySuspensionPoints,
    #[error("too many nested if statements")]
    TooManyNestedIfs,
    #[error("iterating over more than one variable is unsupported")]
    MultiVariableIterate,
    #[error("iterate length/unroll hint is not a small power of two")]
    BadIterateHint,
    #[error("multiple return values are unsupported")]
    MultipleReturnValues,
    #[error("unrecognized operator {0:?}")]
    UnrecognizedOperator(String),
    #[error("unsupported type {0:?} for saturating arithmetic")]
    UnsupportedSaturatingType(String),
    #[error("array initializers with non-zero default values are unsupported")]
    ArrayInitializer,
    #[error("unsupported builtin {0:?}")]
    UnsupportedBuiltin(String),
    #[error("return expression incompatible with empty return type")]
    ReturnValueFromVoidFunc,
    #[error("empty return expression incompatible with non-empty return type")]
    BareReturnFromValueFunc,
    #[error("internal error: temporary variable count out of sync")]
    TempCountMismatch,
    #[error("internal error: function was not gathered before emission")]
    FuncNotGathered,
    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// An append-only text buffer.
///
/// The generator only ever appends; it never inspects what it has already
/// emitted (the one exception, trimming redundant parentheses from an `if`
/// or `while` condition, works on a standalone buffer before it is spliced
/// in).
#[derive(Clone, Default)]
pub(crate) struct Buffer(String);

impl Buffer {
    fn writes(&mut self, s: &str) {
        self.0.push_str(s);
    }

    fn printf(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a String cannot fail.
        let _ = self.0.write_fmt(args);
    }

    fn writex(&mut self, other: &Buffer) {
        self.0.push_str(&other.0);
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn into_string(self) -> String {
        self.0
    }
}

/// Trims one level of redundant parentheses, so that `if ((x == y))` (which
/// draws a -Wparentheses-equality warning from clang) comes out as
/// `if (x == y)`.
fn trim_parens(s: &str) -> &str {
    if s.len() > 1 && s.starts_with('(') && s.ends_with(')') {
        return &s[1..s.len() - 1];
    }
    s
}

/// Whether a derived cursor pair views an `io_reader` or an `io_writer`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum IOKind {
    Reader,
    Writer,
}

impl IOKind {
    fn of(xtype: &ast::TypeExpr) -> IOKind {
        if xtype.is_io_writer_type() {
            IOKind::Writer
        } else {
            IOKind::Reader
        }
    }
}

/// Per-function emission state.
///
/// The five buffers are appended in order (header, body-resume, body,
/// body-suspend, footer) when the function is finally written out.
#[derive(Default)]
pub(crate) struct Funk {
    b_header: Buffer,
    b_body_resume: Buffer,
    b_body: Buffer,
    b_body_suspend: Buffer,
    b_footer: Buffer,

    c_name: String,
    /// The unqualified function name; the coroutine frame lives at
    /// `self->private_impl.c_<func_name>[0]`.
    func_name: String,
    filename: String,
    out_fields: Vec<ast::Field>,
    /// The function's argument names.
    args: std::collections::BTreeSet<ID>,
    /// The I/O cursor variables derived from `io_reader`/`io_writer`
    /// arguments, keyed by argument name. BTreeMap, so that save/load order
    /// is deterministic.
    derived_vars: BTreeMap<ID, IOKind>,
    jump_targets: HashMap<ast::LoopId, u32>,
    coro_susp_point: u32,
    io_binds: u32,
    temp_w: u32,
    temp_r: u32,
    public: bool,
    suspendible: bool,
    uses_scratch: bool,
    has_goto_ok: bool,
    short_reads: Vec<String>,
}

impl Funk {
    /// Returns the jump-target number for the given loop, allocating the
    /// next one on first use.
    fn jump_target(&mut self, loop_id: ast::LoopId) -> Result<u32, ErrorKind> {
        if let Some(&jt) = self.jump_targets.get(&loop_id) {
            return Ok(jt);
        }
        let jt = self.jump_targets.len() as u32;
        if jt == MAX_JUMP_TARGETS {
            return Err(ErrorKind::TooManyJumpTargets);
        }
        self.jump_targets.insert(loop_id, jt);
        Ok(jt)
    }
}

#[derive(Clone, Copy, Default)]
pub struct Options {
    /// Whether to interleave `// foo.sift:123` comments into the emitted
    /// text. Useful when debugging the generator, but off by default as it
    /// leads to many spurious diffs in the generated C when editing Sift
    /// code.
    pub filename_line_comments: bool,
}

/// The coroutine-lowering C code generator.
///
/// One `Generator` handles one translation unit: construct it with the
/// unit's interning [`Map`] and package name, then call
/// [`generate`](Generator::generate) with the checked functions. The AST is
/// read-only to the generator; everything it owns is text buffers and
/// per-function bookkeeping.
pub struct Generator<'m> {
    tm: &'m Map,
    /// `sift_gif__` for package `gif`.
    pkg_prefix: String,
    /// `SIFT_GIF__` for package `gif`.
    pkg_prefix_upper: String,
    options: Options,
    funks: HashMap<QQID, Funk>,
    curr: Funk,
}

impl<'m> Generator<'m> {
    pub fn new(tm: &'m Map, pkg_name: &str, options: Options) -> Generator<'m> {
        Generator {
            tm,
            pkg_prefix: format!("sift_{pkg_name}__"),
            pkg_prefix_upper: format!("SIFT_{}__", pkg_name.to_ascii_uppercase()),
            options,
            funks: HashMap::new(),
            curr: Funk::default(),
        }
    }

    /// Emits one translation unit: prototypes for every function, then the
    /// function bodies.
    ///
    /// Emission is deterministic: generating the same functions twice yields
    /// byte-identical output.
    pub fn generate(&mut self, funcs: &[ast::Func]) -> Result<String, Error> {
        let attach = |n: &ast::Func, tm: &Map| {
            let func = n.qqid().str(tm);
            move |kind| Error { func, kind }
        };

        for n in funcs {
            self.gather_func_impl(n).map_err(attach(n, self.tm))?;
            if let Some(k) = self.funks.get(&n.qqid()) {
                tracing::debug!(
                    func = %k.c_name,
                    susp_points = k.coro_susp_point,
                    uses_scratch = k.uses_scratch,
                    "gathered func"
                );
            }
        }

        let mut b = Buffer::default();
        for n in funcs {
            self.write_func_prototype(&mut b, n).map_err(attach(n, self.tm))?;
        }
        for n in funcs {
            self.write_func_impl(&mut b, n).map_err(attach(n, self.tm))?;
        }
        Ok(b.into_string())
    }

    /// Allocates the next temporary's number.
    fn new_temp(&mut self) -> Result<u32, ErrorKind> {
        if self.curr.temp_w >= MAX_TEMP {
            return Err(ErrorKind::TooManyTemporaries);
        }
        let temp = self.curr.temp_w;
        self.curr.temp_w += 1;
        Ok(temp)
    }

    /// Turns a status message literal (with its surrounding quotes) into the
    /// C constant name: `"bad receiver"` becomes `ERROR_BAD_RECEIVER` under
    /// the `error` keyword.
    fn status_c_name(&self, keyword: ID, msg: &str) -> String {
        let category = if keyword == ID::SUSPENSION {
            "SUSPENSION"
        } else {
            "ERROR"
        };
        let mut out = format!("{}{category}_", self.pkg_prefix_upper);
        for c in msg.trim_matches('"').chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push('_');
            }
        }
        out
    }
}

/// The C spelling of an assignment or (x-form) binary operator, padded with
/// spaces. The modular-arithmetic forms lower to the plain C operators,
/// which already wrap for the unsigned types the checker allows them on;
/// the saturating forms have no direct C spelling and are handled
/// separately.
fn c_op_name(op: ID) -> Option<&'static str> {
    match op {
        ID::EQ | ID::EQ_COLON => Some(" = "),
        ID::PLUS_EQ | ID::TILDE_MOD_PLUS_EQ => Some(" += "),
        ID::MINUS_EQ | ID::TILDE_MOD_MINUS_EQ => Some(" -= "),
        ID::STAR_EQ => Some(" *= "),
        ID::SLASH_EQ => Some(" /= "),
        ID::SHIFT_L_EQ => Some(" <<= "),
        ID::SHIFT_R_EQ => Some(" >>= "),
        ID::AMP_EQ => Some(" &= "),
        ID::PIPE_EQ => Some(" |= "),
        ID::HAT_EQ => Some(" ^= "),
        ID::PERCENT_EQ => Some(" %= "),

        ID::X_BINARY_PLUS | ID::X_BINARY_TILDE_MOD_PLUS => Some(" + "),
        ID::X_BINARY_MINUS | ID::X_BINARY_TILDE_MOD_MINUS => Some(" - "),
        ID::X_BINARY_STAR => Some(" * "),
        ID::X_BINARY_SLASH => Some(" / "),
        ID::X_BINARY_SHIFT_L => Some(" << "),
        ID::X_BINARY_SHIFT_R => Some(" >> "),
        ID::X_BINARY_AMP => Some(" & "),
        ID::X_BINARY_PIPE => Some(" | "),
        ID::X_BINARY_HAT => Some(" ^ "),
        ID::X_BINARY_PERCENT => Some(" % "),
        ID::X_BINARY_NOT_EQ => Some(" != "),
        ID::X_BINARY_LESS_THAN => Some(" < "),
        ID::X_BINARY_LESS_EQ => Some(" <= "),
        ID::X_BINARY_EQ_EQ => Some(" == "),
        ID::X_BINARY_GREATER_EQ => Some(" >= "),
        ID::X_BINARY_GREATER_THAN => Some(" > "),
        ID::X_BINARY_AND => Some(" && "),
        ID::X_BINARY_OR => Some(" || "),

        ID::X_ASSOCIATIVE_PLUS => Some(" + "),
        ID::X_ASSOCIATIVE_STAR => Some(" * "),
        ID::X_ASSOCIATIVE_AMP => Some(" & "),
        ID::X_ASSOCIATIVE_PIPE => Some(" | "),
        ID::X_ASSOCIATIVE_HAT => Some(" ^ "),
        ID::X_ASSOCIATIVE_AND => Some(" && "),
        ID::X_ASSOCIATIVE_OR => Some(" || "),

        _ => None,
    }
}

/// The natural integer range of each base type, used to elide redundant
/// refinement checks on public-function arguments.
fn num_type_bounds(id: ID) -> Option<(i128, i128)> {
    match id {
        ID::I8 => Some((-(1 << 7), (1 << 7) - 1)),
        ID::I16 => Some((-(1 << 15), (1 << 15) - 1)),
        ID::I32 => Some((-(1 << 31), (1 << 31) - 1)),
        ID::I64 => Some((-(1 << 63), (1 << 63) - 1)),
        ID::U8 => Some((0, (1 << 8) - 1)),
        ID::U16 => Some((0, (1 << 16) - 1)),
        ID::U32 => Some((0, (1 << 32) - 1)),
        ID::U64 => Some((0, (1 << 64) - 1)),
        ID::BOOL => Some((0, 1)),
        _ => None,
    }
}

/// The bit width of the unsigned base type named by `qid`, or 0 for any
/// other type.
fn uint_bits(qid: crate::token::QID) -> u32 {
    if qid.0[0] != ID::BASE {
        return 0;
    }
    match qid.0[1] {
        ID::U8 => 8,
        ID::U16 => 16,
        ID::U32 => 32,
        ID::U64 => 64,
        _ => 0,
    }
}
