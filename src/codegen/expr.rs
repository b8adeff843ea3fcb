use std::format_args as f;

use crate::{
    ast::{self, Expr},
    codegen::{c_op_name, uint_bits, Buffer, ErrorKind, Generator, MAX_EXPR_DEPTH},
    token::ID,
};

/// Whether suspendible calls inside an expression are replaced by the
/// temporary that [`write_call_suspendibles`] assigned their result to.
///
/// [`write_call_suspendibles`]: Generator::write_call_suspendibles
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum ReplacePolicy {
    ReplaceCallSuspendibles,
    ReplaceNothing,
}

impl Generator<'_> {
    pub(super) fn write_expr(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        rp: ReplacePolicy,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if depth > MAX_EXPR_DEPTH {
            return Err(ErrorKind::ExprTooDeep);
        }
        let depth = depth + 1;

        if rp == ReplacePolicy::ReplaceCallSuspendibles && n.call_suspendible() {
            if self.curr.temp_r >= self.curr.temp_w {
                return Err(ErrorKind::TempCountMismatch);
            }
            let temp = self.curr.temp_r;
            self.curr.temp_r += 1;
            b.printf(f!("t{temp}"));
            return Ok(());
        }

        if let Some(cv) = n.const_value {
            b.printf(f!("{cv}"));
            return Ok(());
        }

        match n.op {
            ID::INVALID => self.write_expr_ident(b, n),
            op if op.is_x_unary_op() => {
                let operand = n
                    .rhs_expr()
                    .ok_or(ErrorKind::Internal("unary operator has no operand"))?;
                b.writes("(");
                b.writes(unary_c_op_name(op, self)?);
                self.write_expr(b, operand, rp, depth)?;
                b.writes(")");
                Ok(())
            }
            op if op.is_x_binary_op() => self.write_expr_binary(b, n, rp, depth),
            op if op.is_x_associative_op() => {
                let op_name = c_op_name(op).ok_or_else(|| {
                    ErrorKind::UnrecognizedOperator(self.tm.by_id(op.ambiguous_form()).to_string())
                })?;
                b.writes("(");
                for (i, o) in n.args.iter().enumerate() {
                    if i != 0 {
                        b.writes(op_name);
                    }
                    self.write_expr(b, o, rp, depth)?;
                }
                b.writes(")");
                Ok(())
            }
            _ => self.write_expr_other(b, n, rp, depth),
        }
    }

    fn write_expr_ident(&mut self, b: &mut Buffer, n: &Expr) -> Result<(), ErrorKind> {
        match n.ident {
            ID::THIS => b.writes("self"),
            ID::TRUE => b.writes("true"),
            ID::FALSE => b.writes("false"),
            ID::STATUS => b.writes("status"),
            id if id.is_literal(self.tm) => b.writes(self.tm.by_id(id)),
            id => {
                let name = self.tm.by_id(id);
                if self.curr.args.contains(&id) {
                    b.printf(f!("a_{name}"));
                } else {
                    b.printf(f!("v_{name}"));
                }
            }
        }
        Ok(())
    }

    fn write_expr_binary(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        rp: ReplacePolicy,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        let lhs = n
            .lhs
            .as_deref()
            .ok_or(ErrorKind::Internal("binary operator has no LHS"))?;

        if n.op == ID::X_BINARY_AS {
            let typ = n
                .rhs_type()
                .ok_or(ErrorKind::Internal("cast has no type operand"))?;
            b.writes("((");
            self.write_c_type_name(b, typ, "", "")?;
            b.writes(")(");
            self.write_expr(b, lhs, rp, depth)?;
            b.writes("))");
            return Ok(());
        }

        if n.op == ID::X_BINARY_TILDE_SAT_PLUS || n.op == ID::X_BINARY_TILDE_SAT_MINUS {
            let qid = n.mtype.as_deref().map(|t| t.qid).unwrap_or_default();
            let bits = uint_bits(qid);
            if bits == 0 {
                return Err(ErrorKind::UnsupportedSaturatingType(qid.str(self.tm)));
            }
            let u_op = if n.op == ID::X_BINARY_TILDE_SAT_PLUS {
                "add"
            } else {
                "sub"
            };
            let rhs = n
                .rhs_expr()
                .ok_or(ErrorKind::Internal("binary operator has no RHS"))?;
            b.printf(f!("sift_base__u{bits}__sat_{u_op}("));
            self.write_expr(b, lhs, rp, depth)?;
            b.writes(", ");
            self.write_expr(b, rhs, rp, depth)?;
            b.writes(")");
            return Ok(());
        }

        let rhs = n
            .rhs_expr()
            .ok_or(ErrorKind::Internal("binary operator has no RHS"))?;
        let op_name = c_op_name(n.op).ok_or_else(|| {
            ErrorKind::UnrecognizedOperator(self.tm.by_id(n.op.ambiguous_form()).to_string())
        })?;
        b.writes("(");
        self.write_expr(b, lhs, rp, depth)?;
        b.writes(op_name);
        self.write_expr(b, rhs, rp, depth)?;
        b.writes(")");
        Ok(())
    }

    fn write_expr_other(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        rp: ReplacePolicy,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        match n.op {
            ID::DOT => {
                let lhs = n
                    .lhs
                    .as_deref()
                    .ok_or(ErrorKind::Internal("selector has no receiver"))?;
                let name = self.tm.by_id(n.ident);
                if lhs.op == ID::INVALID && lhs.ident == ID::THIS {
                    // Struct fields live in the receiver's private_impl.
                    b.printf(f!("self->private_impl.f_{name}"));
                } else if lhs.op == ID::INVALID && lhs.ident == ID::IN {
                    b.printf(f!("a_{name}"));
                } else {
                    self.write_expr(b, lhs, rp, depth)?;
                    b.printf(f!(".{name}"));
                }
                Ok(())
            }
            ID::OPEN_BRACKET => {
                let lhs = n
                    .lhs
                    .as_deref()
                    .ok_or(ErrorKind::Internal("index has no receiver"))?;
                let index = n
                    .rhs_expr()
                    .ok_or(ErrorKind::Internal("index has no index"))?;
                self.write_expr(b, lhs, rp, depth)?;
                if lhs.mtype.as_deref().is_some_and(ast::TypeExpr::is_slice_type) {
                    b.writes(".ptr");
                }
                b.writes("[");
                self.write_expr(b, index, rp, depth)?;
                b.writes("]");
                Ok(())
            }
            ID::ERROR | ID::SUSPENSION => {
                let msg = self.tm.by_id(n.ident);
                let name = self.status_c_name(n.op, msg);
                b.writes(&name);
                Ok(())
            }
            ID::OPEN_PAREN | ID::TRY => self.write_expr_call(b, n, rp, depth),
            op => Err(ErrorKind::UnrecognizedOperator(
                self.tm.by_id(op.ambiguous_form()).to_string(),
            )),
        }
    }

    /// A call in plain expression position: either one of the cursor-query
    /// I/O intrinsics, or a user-defined call.
    fn write_expr_call(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        rp: ReplacePolicy,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        let callee = n
            .lhs
            .as_deref()
            .ok_or(ErrorKind::Internal("call has no callee"))?;
        if callee.op != ID::DOT {
            return self.write_expr_user_defined_call(b, n, rp, depth);
        }
        let recv = callee
            .lhs
            .as_deref()
            .ok_or(ErrorKind::Internal("method call has no receiver"))?;

        match callee.ident {
            ID::AVAILABLE => {
                let name = self.tm.by_id(recv.ident);
                b.printf(f!("((uint64_t)(iobounds1_{name} - ioptr_{name}))"));
                Ok(())
            }
            ID::LENGTH => {
                b.writes("((uint64_t)(");
                self.write_expr(b, recv, rp, depth)?;
                b.writes(".len))");
                Ok(())
            }
            ID::SET_LIMIT => {
                let name = self.tm.by_id(recv.ident).to_string();
                let rw = self.io_helper_kind(recv);
                b.printf(f!("sift_base__io_{rw}__set_limit(&"));
                self.write_expr(b, recv, rp, depth)?;
                b.printf(f!(", ioptr_{name}, "));
                let arg = n
                    .args
                    .first()
                    .ok_or(ErrorKind::Internal("set_limit has no argument"))?;
                self.write_expr(b, arg, rp, depth)?;
                b.writes(")");
                Ok(())
            }
            ID::SET_MARK => {
                let name = self.tm.by_id(recv.ident).to_string();
                let rw = self.io_helper_kind(recv);
                b.printf(f!("sift_base__io_{rw}__set_mark(&"));
                self.write_expr(b, recv, rp, depth)?;
                b.printf(f!(", ioptr_{name})"));
                Ok(())
            }
            ID::SINCE_MARK => {
                let name = self.tm.by_id(recv.ident).to_string();
                let rw = self.io_helper_kind(recv);
                b.printf(f!("sift_base__io_{rw}__since_mark(&"));
                self.write_expr(b, recv, rp, depth)?;
                b.printf(f!(", ioptr_{name})"));
                Ok(())
            }
            ID::HIGH_BITS | ID::LOW_BITS | ID::COPY_FROM_HISTORY32 | ID::COPY_FROM_READER32
            | ID::COPY_FROM_SLICE | ID::COPY_FROM_SLICE32 | ID::UNREAD_U8 => Err(
                ErrorKind::UnsupportedBuiltin(self.tm.by_id(callee.ident).to_string()),
            ),
            _ => self.write_expr_user_defined_call(b, n, rp, depth),
        }
    }

    pub(super) fn write_expr_user_defined_call(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        rp: ReplacePolicy,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        let callee = n
            .lhs
            .as_deref()
            .ok_or(ErrorKind::Internal("call has no callee"))?;

        if callee.op != ID::DOT {
            // A free function in the current package.
            b.printf(f!("{}{}(", self.pkg_prefix, self.tm.by_id(callee.ident)));
            for (i, o) in n.args.iter().enumerate() {
                if i != 0 {
                    b.writes(",");
                }
                self.write_expr(b, o, rp, depth)?;
            }
            b.writes(")");
            return Ok(());
        }

        let recv = callee
            .lhs
            .as_deref()
            .ok_or(ErrorKind::Internal("method call has no receiver"))?;
        let recv_type = recv
            .mtype
            .as_deref()
            .map(|t| t.qid.0[1])
            .unwrap_or(ID::INVALID);
        b.printf(f!(
            "{}{}__{}(",
            self.pkg_prefix,
            self.tm.by_id(recv_type),
            self.tm.by_id(callee.ident)
        ));
        if recv.op == ID::INVALID && recv.ident == ID::THIS {
            b.writes("self");
        } else if recv.op == ID::DOT
            && recv
                .lhs
                .as_deref()
                .is_some_and(|e| e.op == ID::INVALID && e.ident == ID::THIS)
        {
            b.printf(f!("&self->private_impl.f_{}", self.tm.by_id(recv.ident)));
        } else {
            b.writes("&");
            self.write_expr(b, recv, rp, depth)?;
        }
        for o in &n.args {
            b.writes(",");
            self.write_expr(b, o, rp, depth)?;
        }
        b.writes(")");
        Ok(())
    }

    /// Which `sift_base__io_*` helper family serves the receiver.
    fn io_helper_kind(&self, recv: &Expr) -> &'static str {
        if recv
            .mtype
            .as_deref()
            .is_some_and(ast::TypeExpr::is_io_writer_type)
        {
            "writer"
        } else {
            "reader"
        }
    }
}

fn unary_c_op_name(op: ID, g: &Generator<'_>) -> Result<&'static str, ErrorKind> {
    match op {
        ID::X_UNARY_PLUS => Ok("+"),
        ID::X_UNARY_MINUS => Ok("-"),
        ID::X_UNARY_NOT => Ok("!"),
        _ => Err(ErrorKind::UnrecognizedOperator(
            g.tm.by_id(op.ambiguous_form()).to_string(),
        )),
    }
}
