use std::format_args as f;

use crate::{
    ast::{self, Expr},
    codegen::{
        c_op_name, expr::ReplacePolicy, trim_parens, uint_bits, Buffer, ErrorKind, Generator,
        MAX_BODY_DEPTH, MAX_CORO_SUSP_POINT, MAX_EXPR_DEPTH, MAX_IO_BINDS,
        MAX_IO_BIND_IN_FIELDS, MAX_NESTED_IFS, MAX_TEMP,
    },
    token::{ID, QID},
};

impl Generator<'_> {
    pub(super) fn write_statement(
        &mut self,
        b: &mut Buffer,
        n: &ast::Stmt,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if depth > MAX_BODY_DEPTH {
            return Err(ErrorKind::BodyTooDeep);
        }
        let depth = depth + 1;

        if let ast::Stmt::Assert(_) = n {
            // Assertions only apply at compile time.
            return Ok(());
        }

        // Statements that introduce temporaries go into their own block, to
        // restrict the temporaries' scope. This helps avoid "jump bypasses
        // variable initialization" warnings around the coroutine suspension
        // points.
        let own_block = match n {
            ast::Stmt::Assign(a) => a.lhs.suspendible() || a.rhs.suspendible(),
            ast::Stmt::Var(v) => v.value.as_ref().is_some_and(Expr::suspendible),
            _ => false,
        };
        if own_block {
            b.writes("{\n");
        }

        if self.options.filename_line_comments {
            b.printf(f!("// {}:{}\n", self.curr.filename, stmt_line(n)));
        }

        let result = match n {
            ast::Stmt::Assert(_) => Ok(()),
            ast::Stmt::Assign(a) => self.write_statement_assign(b, a, depth),
            ast::Stmt::Expr(e) => self.write_statement_expr(b, e, depth),
            ast::Stmt::IOBind(x) => self.write_statement_io_bind(b, x, depth),
            ast::Stmt::If(i) => self.write_statement_if(b, i, depth),
            ast::Stmt::Iterate(it) => self.write_statement_iterate(b, it, depth),
            ast::Stmt::Jump(j) => self.write_statement_jump(b, j),
            ast::Stmt::Ret(r) => self.write_statement_ret(b, r, depth),
            ast::Stmt::Var(v) => self.write_statement_var(b, v, depth),
            ast::Stmt::While(w) => self.write_statement_while(b, w, depth),
        };

        if own_block {
            b.writes("}\n");
        }
        result
    }

    fn write_statement_assign(
        &mut self,
        b: &mut Buffer,
        n: &ast::Assign,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        self.write_suspendibles(b, &n.lhs, depth)?;
        self.write_suspendibles(b, &n.rhs, depth)?;

        let mut tilde = false;
        let op_name = match n.op {
            ID::TILDE_SAT_PLUS_EQ | ID::TILDE_SAT_MINUS_EQ => {
                let qid = n.lhs.mtype.as_deref().map(|t| t.qid).unwrap_or_default();
                let bits = uint_bits(qid);
                if bits == 0 {
                    return Err(ErrorKind::UnsupportedSaturatingType(qid.str(self.tm)));
                }
                let u_op = if n.op == ID::TILDE_SAT_PLUS_EQ {
                    "add"
                } else {
                    "sub"
                };
                b.printf(f!("sift_base__u{bits}__sat_{u_op}_indirect(&"));
                tilde = true;
                ","
            }
            op => c_op_name(op).ok_or_else(|| {
                ErrorKind::UnrecognizedOperator(self.tm.by_id(op.ambiguous_form()).to_string())
            })?,
        };

        self.write_expr(b, &n.lhs, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        b.writes(op_name);
        self.write_expr(b, &n.rhs, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        if tilde {
            b.writes(")");
        }
        b.writes(";\n");
        Ok(())
    }

    fn write_statement_expr(
        &mut self,
        b: &mut Buffer,
        n: &ast::ExprStmt,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        self.write_suspendibles(b, &n.expr, depth)?;
        if n.expr.call_suspendible() {
            // The call emission already produced its semicolon.
            return Ok(());
        }
        self.write_expr(b, &n.expr, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        b.writes(";\n");
        Ok(())
    }

    fn write_statement_io_bind(
        &mut self,
        b: &mut Buffer,
        n: &ast::IOBind,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if self.curr.io_binds > MAX_IO_BINDS || n.in_fields.len() > MAX_IO_BIND_IN_FIELDS {
            return Err(ErrorKind::TooManyIOBinds);
        }
        let io_bind_num = self.curr.io_binds;
        self.curr.io_binds += 1;

        b.writes("{\n");
        for e in &n.in_fields {
            // Arguments reach io_bind as `in.foo` selectors; anything with
            // an invalid op is a plain local.
            let prefix = if e.op != ID::INVALID { "a_" } else { "v_" };
            let c_typ = match e.mtype.as_deref() {
                Some(t) if t.is_io_writer_type() => "writer",
                _ => "reader",
            };
            let name = self.tm.by_id(e.ident);
            b.printf(f!(
                "sift_base__io_{c_typ} o{io_bind_num}_{prefix}{name} = {prefix}{name};\n"
            ));
            if e.op == ID::INVALID {
                b.printf(f!(
                    "uint8_t *o{io_bind_num}_ioptr_{prefix}{name} = ioptr_{name};\n"
                ));
                b.printf(f!(
                    "uint8_t *o{io_bind_num}_iobounds1_{prefix}{name} = iobounds1_{name};\n"
                ));
            }
        }

        for o in &n.body {
            self.write_statement(b, o, depth)?;
        }

        for e in n.in_fields.iter().rev() {
            let prefix = if e.op != ID::INVALID { "a_" } else { "v_" };
            let name = self.tm.by_id(e.ident);
            b.printf(f!("{prefix}{name} = o{io_bind_num}_{prefix}{name};\n"));
            if e.op == ID::INVALID {
                b.printf(f!("ioptr_{name} = o{io_bind_num}_ioptr_{prefix}{name};\n"));
                b.printf(f!(
                    "iobounds1_{name} = o{io_bind_num}_iobounds1_{prefix}{name};\n"
                ));
            }
        }
        b.writes("}\n");
        Ok(())
    }

    fn write_statement_if(
        &mut self,
        b: &mut Buffer,
        n: &ast::If,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        let mut n = n;
        let mut n_close_curly = 1u32;
        let mut first = true;
        loop {
            if n.condition.suspendible() {
                // Each successive suspendible condition lives inside its own
                // block, so its temporaries do not outlive the chain.
                if !first {
                    b.writes("{");
                    if n_close_curly == MAX_NESTED_IFS {
                        return Err(ErrorKind::TooManyNestedIfs);
                    }
                    n_close_curly += 1;
                }
                self.write_suspendibles(b, &n.condition, depth)?;
            }

            let mut condition = Buffer::default();
            self.write_expr(
                &mut condition,
                &n.condition,
                ReplacePolicy::ReplaceCallSuspendibles,
                0,
            )?;
            // Trimming parentheses avoids clang's -Wparentheses-equality
            // warning.
            b.printf(f!("if ({}) {{\n", trim_parens(condition.as_str())));
            for o in &n.body_if_true {
                self.write_statement(b, o, depth)?;
            }
            if !n.body_if_false.is_empty() {
                b.writes("} else {\n");
                for o in &n.body_if_false {
                    self.write_statement(b, o, depth)?;
                }
                break;
            }
            match n.else_if.as_deref() {
                Some(e) => {
                    b.writes("} else ");
                    n = e;
                    first = false;
                }
                None => break,
            }
        }
        for _ in 0..n_close_curly {
            b.writes("}\n");
        }
        Ok(())
    }

    fn write_statement_iterate(
        &mut self,
        b: &mut Buffer,
        n: &ast::Iterate,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if n.vars.is_empty() {
            return Ok(());
        }
        if n.vars.len() != 1 {
            return Err(ErrorKind::MultiVariableIterate);
        }
        let v = &n.vars[0];
        let value = v
            .value
            .as_ref()
            .ok_or(ErrorKind::Internal("iterate variable has no value"))?;
        let name = self.tm.by_id(v.name).to_string();
        b.writes("{\n");

        b.printf(f!("sift_base__slice_u8 i_slice_{name} = "));
        self.write_expr(b, value, ReplacePolicy::ReplaceCallSuspendibles, 0)?;
        b.writes(";\n");
        b.printf(f!("sift_base__slice_u8 v_{name} = i_slice_{name};\n"));

        let mut round = 0u32;
        let mut cur = Some(n);
        while let Some(it) = cur {
            let length = it.length.small_power_of_2_value();
            let mut unroll = it.unroll.small_power_of_2_value();
            if length == 0 || unroll == 0 {
                return Err(ErrorKind::BadIterateHint);
            }
            // Each length/unroll round falls through to a tail round of
            // unroll 1.
            loop {
                self.write_iterate_round(b, &name, &it.body, round, depth, length, unroll)?;
                round += 1;
                if unroll == 1 {
                    break;
                }
                unroll = 1;
            }
            cur = it.else_iterate.as_deref();
        }

        b.writes("}\n");
        Ok(())
    }

    fn write_iterate_round(
        &mut self,
        b: &mut Buffer,
        name: &str,
        body: &[ast::Stmt],
        round: u32,
        depth: u32,
        length: u32,
        unroll: u32,
    ) -> Result<(), ErrorKind> {
        b.printf(f!("v_{name}.len = {length};\n"));
        let lu = length * unroll;
        b.printf(f!(
            "uint8_t* i_end{round}_{name} = i_slice_{name}.ptr + (i_slice_{name}.len / {lu}) * {lu};\n"
        ));
        b.printf(f!("while (v_{name}.ptr < i_end{round}_{name}) {{\n"));
        for _ in 0..unroll {
            for o in body {
                self.write_statement(b, o, depth)?;
            }
            b.printf(f!("v_{name}.ptr += {length};\n"));
        }
        b.writes("}\n");
        Ok(())
    }

    fn write_statement_jump(&mut self, b: &mut Buffer, n: &ast::Jump) -> Result<(), ErrorKind> {
        let jt = self.curr.jump_target(n.target)?;
        let keyword = if n.keyword == ID::BREAK {
            "break"
        } else {
            "continue"
        };
        b.printf(f!("goto label_{jt}_{keyword};\n"));
        Ok(())
    }

    fn write_statement_ret(
        &mut self,
        b: &mut Buffer,
        n: &ast::Ret,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if self.curr.suspendible {
            b.writes("status = ");
            let mut ret_keyword = ID::STATUS;
            match &n.value {
                None => b.printf(f!("{}STATUS_OK", self.pkg_prefix_upper)),
                Some(value) => {
                    ret_keyword = value.op;
                    self.write_expr(b, value, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
                }
            }
            b.writes(";");

            if n.keyword == ID::YIELD {
                // A yield both suspends and numbers the restart point it
                // falls through to.
                return self.write_coro_susp_point(b, true);
            }

            match ret_keyword {
                ID::ERROR => b.writes("goto exit;"),
                ID::STATUS => {
                    self.curr.has_goto_ok = true;
                    b.writes("goto ok;");
                }
                _ => {
                    self.curr.has_goto_ok = true;
                    b.printf(f!(
                        "if (status == 0) {{ goto ok; }} else if (status > 0) {{ \
                         status = {}ERROR_CANNOT_RETURN_A_SUSPENSION; }} goto exit;",
                        self.pkg_prefix_upper
                    ));
                }
            }
            return Ok(());
        }

        b.writes("return ");
        if self.curr.out_fields.is_empty() {
            if n.value.is_some() {
                return Err(ErrorKind::ReturnValueFromVoidFunc);
            }
        } else if let Some(value) = &n.value {
            self.write_expr(b, value, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        } else {
            // TODO: should a bare "return" imply "return out"?
            return Err(ErrorKind::BareReturnFromValueFunc);
        }
        b.writes(";");
        Ok(())
    }

    fn write_statement_var(
        &mut self,
        b: &mut Buffer,
        n: &ast::Var,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if let Some(v) = &n.value {
            self.write_suspendibles(b, v, depth)?;
        }
        let name = self.tm.by_id(n.name);

        if n.xtype.is_array_type() {
            if n.value.is_some() {
                return Err(ErrorKind::ArrayInitializer);
            }
            b.printf(f!("memset(v_{name}, 0, sizeof(v_{name}));\n"));
            return Ok(());
        }

        b.printf(f!("v_{name} = "));
        if let Some(v) = &n.value {
            self.write_expr(b, v, ReplacePolicy::ReplaceCallSuspendibles, 0)?;
        } else if n.xtype.is_slice_type() {
            b.writes("((sift_base__slice_u8){0})");
        } else if n.xtype.is_table_type() {
            b.writes("((sift_base__table_u8){0})");
        } else if n.xtype.is_io_type() {
            if n.xtype.is_io_writer_type() {
                b.writes("((sift_base__io_writer){0})");
            } else {
                b.writes("((sift_base__io_reader){0})");
            }
        } else {
            b.writes("0");
        }
        b.writes(";\n");
        Ok(())
    }

    fn write_statement_while(
        &mut self,
        b: &mut Buffer,
        n: &ast::While,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if n.has_continue() {
            let jt = self.curr.jump_target(n.loop_id)?;
            b.printf(f!("label_{jt}_continue:;\n"));
        }
        let mut condition = Buffer::default();
        self.write_expr(
            &mut condition,
            &n.condition,
            ReplacePolicy::ReplaceCallSuspendibles,
            0,
        )?;
        b.printf(f!("while ({}) {{\n", trim_parens(condition.as_str())));
        for o in &n.body {
            self.write_statement(b, o, depth)?;
        }
        b.writes("}\n");
        if n.has_break() {
            let jt = self.curr.jump_target(n.loop_id)?;
            b.printf(f!("label_{jt}_break:;\n"));
        }
        Ok(())
    }

    /// Numbers and emits the next coroutine suspension point.
    pub(super) fn write_coro_susp_point(
        &mut self,
        b: &mut Buffer,
        maybe_suspend: bool,
    ) -> Result<(), ErrorKind> {
        self.curr.coro_susp_point += 1;
        if self.curr.coro_susp_point == MAX_CORO_SUSP_POINT {
            return Err(ErrorKind::TooManySuspensionPoints);
        }
        let suffix = if maybe_suspend { "_MAYBE_SUSPEND" } else { "" };
        b.printf(f!(
            "SIFT_BASE__COROUTINE_SUSPENSION_POINT{suffix}({});\n",
            self.curr.coro_susp_point
        ));
        Ok(())
    }

    /// Emits the suspendible calls contained in `n`.
    pub(super) fn write_suspendibles(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if !n.suspendible() {
            return Ok(());
        }
        self.write_call_suspendibles(b, n, depth)
    }

    pub(super) fn write_call_suspendibles(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        if depth > MAX_EXPR_DEPTH {
            return Err(ErrorKind::ExprTooDeep);
        }
        let depth = depth + 1;

        // The evaluation order for suspendible calls (which can have side
        // effects) is important here: LHS, MHS, RHS, args and finally the
        // node itself.
        if !n.call_suspendible() {
            for o in sub_exprs(n) {
                self.write_call_suspendibles(b, o, depth)?;
            }
            return Ok(());
        }

        // The call site becomes a coroutine resumption point, unless the
        // static analyzer proved the call cannot actually suspend.
        if !n.proven_not_to_suspend() {
            self.write_coro_susp_point(b, false)?;
        }

        self.write_save_expr_derived_vars(b);

        if self.write_builtin_call_suspendibles(b, n, depth)? {
            return Ok(());
        }

        if n.op == ID::TRY {
            let temp = self.new_temp()?;
            b.printf(f!("{}status t{temp} = ", self.pkg_prefix));
        } else {
            b.writes("status = ");
        }

        self.write_expr_user_defined_call(b, n, ReplacePolicy::ReplaceNothing, depth)?;
        b.writes(";\n");

        self.write_load_expr_derived_vars(b);

        if n.op != ID::TRY {
            b.writes("if (status) { goto suspend; }\n");
        }
        Ok(())
    }

    /// Expands the suspendible I/O intrinsics (integer reads and writes,
    /// skips). Returns false when `n` is not such a call, leaving the
    /// user-defined-call path to handle it.
    fn write_builtin_call_suspendibles(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        depth: u32,
    ) -> Result<bool, ErrorKind> {
        let Some(callee) = n.lhs.as_deref() else {
            return Ok(false);
        };
        if callee.op != ID::DOT {
            return Ok(false);
        }
        let Some(recv) = callee.lhs.as_deref() else {
            return Ok(false);
        };
        let name = self.tm.by_id(recv.ident).to_string();

        match callee.ident {
            ID::READ_U8 => {
                self.write_read_u8(b, n, &name)?;
                Ok(true)
            }
            ID::WRITE_U8 => {
                self.write_write_u8(b, n, &name, depth)?;
                Ok(true)
            }
            ID::SKIP32 | ID::SKIP64 => {
                self.write_skip(b, n, &name, depth)?;
                Ok(true)
            }
            method => {
                if let Some((size, endianness)) = read_method_size(method) {
                    self.write_read_uxx(b, n, &name, size, endianness)?;
                    Ok(true)
                } else if let Some((size, endianness)) = write_method_size(method) {
                    self.write_write_uxx(b, n, &name, size, endianness, depth)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn write_read_u8(&mut self, b: &mut Buffer, n: &Expr, name: &str) -> Result<(), ErrorKind> {
        // The produced temporary is consumed by whichever expression
        // contains this call.
        let temp = self.new_temp()?;

        b.printf(f!(
            "if (SIFT_BASE__UNLIKELY(ioptr_{name} == iobounds1_{name})) {{ goto short_read_{name}; }}\n"
        ));
        self.curr.short_reads.push(name.to_string());

        let u8_type = u8_type();
        let typ = n.mtype.as_deref().unwrap_or(&u8_type);
        self.write_c_type_name(b, typ, "t", &temp.to_string())?;
        b.printf(f!(" = *ioptr_{name}++;\n"));
        Ok(())
    }

    fn write_read_uxx(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        name: &str,
        size: u32,
        endianness: &str,
    ) -> Result<(), ErrorKind> {
        if self.curr.temp_w > MAX_TEMP - 1 {
            return Err(ErrorKind::TooManyTemporaries);
        }
        // temp0 is read by the code generated here. temp1 is read elsewhere,
        // by whichever expression contains this call.
        let temp0 = self.curr.temp_w;
        let temp1 = self.curr.temp_w + 1;
        self.curr.temp_w += 2;
        self.curr.temp_r += 1;

        let u8_type = u8_type();
        let typ = n.mtype.as_deref().unwrap_or(&u8_type);
        self.write_c_type_name(b, typ, "t", &temp1.to_string())?;
        b.writes(";");

        self.curr.uses_scratch = true;
        let scratch = format!(
            "self->private_impl.c_{}[0].scratch",
            self.curr.func_name
        );

        b.printf(f!(
            "if (SIFT_BASE__LIKELY(iobounds1_{name} - ioptr_{name} >= {})) {{",
            size / 8
        ));
        b.printf(f!(
            "t{temp1} = sift_base__load_u{size}{endianness}(ioptr_{name});\n"
        ));
        b.printf(f!("ioptr_{name} += {};\n", size / 8));
        b.writes("} else {");
        b.printf(f!("{scratch} = 0;\n"));
        self.write_coro_susp_point(b, false)?;
        b.writes("while (true) {");

        b.printf(f!(
            "if (SIFT_BASE__UNLIKELY(ioptr_{name} == iobounds1_{name})) {{ goto short_read_{name}; }}"
        ));
        self.curr.short_reads.push(name.to_string());

        b.printf(f!("uint64_t *scratch = &{scratch};"));
        b.printf(f!("uint32_t t{temp0} = *scratch"));
        match endianness {
            "be" => {
                b.writes("& 0xFF; *scratch >>= 8; *scratch <<= 8;");
                b.printf(f!(
                    "*scratch |= ((uint64_t)(*ioptr_{name}++)) << (56 - t{temp0});"
                ));
            }
            _ => {
                b.writes(">> 56; *scratch <<= 8; *scratch >>= 8;");
                b.printf(f!("*scratch |= ((uint64_t)(*ioptr_{name}++)) << t{temp0};"));
            }
        }

        b.printf(f!("if (t{temp0} == {}) {{", size - 8));
        match endianness {
            "be" => b.printf(f!("t{temp1} = *scratch >> (64 - {size});")),
            _ => b.printf(f!("t{temp1} = *scratch;")),
        }
        b.writes("break;");
        b.writes("}");

        b.printf(f!("t{temp0} += 8;"));
        match endianness {
            "be" => b.printf(f!("*scratch |= ((uint64_t)(t{temp0}));")),
            _ => b.printf(f!("*scratch |= ((uint64_t)(t{temp0})) << 56;")),
        }

        b.writes("}}\n");
        Ok(())
    }

    fn write_write_u8(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        name: &str,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        b.printf(f!(
            "if (ioptr_{name} == iobounds1_{name}) {{\nstatus = {}SUSPENSION_SHORT_WRITE;\ngoto suspend;\n}}\n",
            self.pkg_prefix_upper
        ));
        b.printf(f!("*ioptr_{name}++ = "));
        let arg = n
            .args
            .first()
            .ok_or(ErrorKind::Internal("write_u8 has no argument"))?;
        self.write_expr(b, arg, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        b.writes(";\n");
        Ok(())
    }

    fn write_write_uxx(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        name: &str,
        size: u32,
        endianness: &str,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        b.printf(f!(
            "if (iobounds1_{name} - ioptr_{name} < {}) {{\nstatus = {}SUSPENSION_SHORT_WRITE;\ngoto suspend;\n}}\n",
            size / 8,
            self.pkg_prefix_upper
        ));
        b.printf(f!("sift_base__store_u{size}{endianness}(ioptr_{name}, "));
        let arg = n
            .args
            .first()
            .ok_or(ErrorKind::Internal("integer write has no argument"))?;
        self.write_expr(b, arg, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        b.writes(");\n");
        b.printf(f!("ioptr_{name} += {};\n", size / 8));
        Ok(())
    }

    fn write_skip(
        &mut self,
        b: &mut Buffer,
        n: &Expr,
        name: &str,
        depth: u32,
    ) -> Result<(), ErrorKind> {
        self.curr.uses_scratch = true;
        let scratch = format!(
            "self->private_impl.c_{}[0].scratch",
            self.curr.func_name
        );

        b.printf(f!("{scratch} = "));
        let arg = n
            .args
            .first()
            .ok_or(ErrorKind::Internal("skip has no argument"))?;
        self.write_expr(b, arg, ReplacePolicy::ReplaceCallSuspendibles, depth)?;
        b.writes(";\n");

        self.write_coro_susp_point(b, false)?;
        b.printf(f!(
            "if ({scratch} > ((uint64_t)(iobounds1_{name} - ioptr_{name}))) {{\n"
        ));
        b.printf(f!(
            "{scratch} -= (uint64_t)(iobounds1_{name} - ioptr_{name});\n"
        ));
        b.printf(f!("ioptr_{name} = iobounds1_{name};\n"));
        b.printf(f!(
            "status = {}SUSPENSION_SHORT_READ;\ngoto suspend;\n}}\n",
            self.pkg_prefix_upper
        ));
        b.printf(f!("ioptr_{name} += {scratch};\n"));
        Ok(())
    }
}

/// The LHS/MHS/RHS/args traversal order shared by the suspendible-call
/// walkers. The type operand of an `as` cast contains no calls and is
/// skipped.
fn sub_exprs(n: &Expr) -> impl Iterator<Item = &Expr> {
    [n.lhs.as_deref(), n.mhs.as_deref(), n.rhs_expr()]
        .into_iter()
        .flatten()
        .chain(n.args.iter())
}

fn read_method_size(method: ID) -> Option<(u32, &'static str)> {
    match method {
        ID::READ_U16BE => Some((16, "be")),
        ID::READ_U16LE => Some((16, "le")),
        ID::READ_U24BE => Some((24, "be")),
        ID::READ_U24LE => Some((24, "le")),
        ID::READ_U32BE => Some((32, "be")),
        ID::READ_U32LE => Some((32, "le")),
        ID::READ_U40BE => Some((40, "be")),
        ID::READ_U40LE => Some((40, "le")),
        ID::READ_U48BE => Some((48, "be")),
        ID::READ_U48LE => Some((48, "le")),
        ID::READ_U56BE => Some((56, "be")),
        ID::READ_U56LE => Some((56, "le")),
        ID::READ_U64BE => Some((64, "be")),
        ID::READ_U64LE => Some((64, "le")),
        _ => None,
    }
}

fn write_method_size(method: ID) -> Option<(u32, &'static str)> {
    match method {
        ID::WRITE_U16BE => Some((16, "be")),
        ID::WRITE_U16LE => Some((16, "le")),
        ID::WRITE_U24BE => Some((24, "be")),
        ID::WRITE_U24LE => Some((24, "le")),
        ID::WRITE_U32BE => Some((32, "be")),
        ID::WRITE_U32LE => Some((32, "le")),
        ID::WRITE_U40BE => Some((40, "be")),
        ID::WRITE_U40LE => Some((40, "le")),
        ID::WRITE_U48BE => Some((48, "be")),
        ID::WRITE_U48LE => Some((48, "le")),
        ID::WRITE_U56BE => Some((56, "be")),
        ID::WRITE_U56LE => Some((56, "le")),
        ID::WRITE_U64BE => Some((64, "be")),
        ID::WRITE_U64LE => Some((64, "le")),
        _ => None,
    }
}

fn u8_type() -> ast::TypeExpr {
    ast::TypeExpr {
        qid: QID([ID::BASE, ID::U8]),
        ..ast::TypeExpr::default()
    }
}

fn stmt_line(n: &ast::Stmt) -> u32 {
    match n {
        ast::Stmt::Assert(x) => x.line,
        ast::Stmt::Assign(x) => x.line,
        ast::Stmt::Expr(x) => x.line,
        ast::Stmt::IOBind(x) => x.line,
        ast::Stmt::If(x) => x.line,
        ast::Stmt::Iterate(x) => x.line,
        ast::Stmt::Jump(x) => x.line,
        ast::Stmt::Ret(x) => x.line,
        ast::Stmt::Var(x) => x.line,
        ast::Stmt::While(x) => x.line,
    }
}
