use std::{collections::HashSet, format_args as f};

use crate::{
    ast,
    codegen::{num_type_bounds, Buffer, ErrorKind, Funk, Generator, IOKind},
    token::ID,
};

/// What a walk over a function's declared variables should emit.
#[derive(Clone, Copy, PartialEq, Eq)]
enum VarsOp {
    /// First-entry defaults.
    Initialize,
    /// Read the saved values back out of the coroutine frame.
    Restore,
    /// Write the values into the coroutine frame.
    Save,
}

impl Generator<'_> {
    pub(super) fn func_c_name(&self, n: &ast::Func) -> String {
        if !n.receiver.is_zero() {
            return format!(
                "{}{}__{}",
                self.pkg_prefix,
                self.tm.by_id(n.receiver.0[1]),
                self.tm.by_id(n.name)
            );
        }
        format!("{}{}", self.pkg_prefix, self.tm.by_id(n.name))
    }

    pub(super) fn write_func_signature(
        &self,
        b: &mut Buffer,
        n: &ast::Func,
    ) -> Result<(), ErrorKind> {
        if !n.public() {
            b.writes("static ");
        }

        if n.suspendible() {
            b.printf(f!("{}status ", self.pkg_prefix));
        } else if n.out_fields.is_empty() {
            b.writes("void ");
        } else if n.out_fields.len() == 1 {
            self.write_c_type_name(b, &n.out_fields[0].xtype, "", "")?;
            b.writes(" ");
        } else {
            return Err(ErrorKind::MultipleReturnValues);
        }

        b.writes(&self.func_c_name(n));
        b.writes("(");

        let mut comma = false;
        if !n.receiver.is_zero() {
            b.printf(f!(
                "{}{} *self",
                self.pkg_prefix,
                self.tm.by_id(n.receiver.0[1])
            ));
            comma = true;
        }
        for o in &n.in_fields {
            if comma {
                b.writes(",");
            }
            comma = true;
            self.write_c_type_name(b, &o.xtype, "a_", self.tm.by_id(o.name))?;
        }

        b.writes(")");
        Ok(())
    }

    pub(super) fn write_func_prototype(
        &self,
        b: &mut Buffer,
        n: &ast::Func,
    ) -> Result<(), ErrorKind> {
        self.write_func_signature(b, n)?;
        b.writes(";\n\n");
        Ok(())
    }

    /// Splices the gathered per-function buffers into `b`, in header,
    /// body-resume, body, body-suspend, footer order.
    pub(super) fn write_func_impl(&self, b: &mut Buffer, n: &ast::Func) -> Result<(), ErrorKind> {
        let k = self.funks.get(&n.qqid()).ok_or(ErrorKind::FuncNotGathered)?;

        b.printf(f!("// -------- func {}\n\n", n.qqid().str(self.tm)));
        self.write_func_signature(b, n)?;
        b.writes("{\n");
        b.writex(&k.b_header);
        if k.suspendible && k.coro_susp_point > 0 {
            b.writex(&k.b_body_resume);
        }
        b.writex(&k.b_body);
        if k.suspendible && k.coro_susp_point > 0 {
            b.writex(&k.b_body_suspend);
        } else if k.has_goto_ok {
            // The goto avoids the "unused label" warning.
            b.writes("\ngoto ok;ok:\n");
        }
        b.writex(&k.b_footer);
        b.writes("}\n\n");
        Ok(())
    }

    /// Emits the whole of one function into fresh per-function buffers,
    /// stashing the result for [`write_func_impl`](Self::write_func_impl).
    pub(super) fn gather_func_impl(&mut self, n: &ast::Func) -> Result<(), ErrorKind> {
        self.curr = Funk {
            c_name: self.func_c_name(n),
            func_name: self.tm.by_id(n.name).to_string(),
            filename: basename(&n.filename).to_string(),
            out_fields: n.out_fields.clone(),
            args: n.in_fields.iter().map(|o| o.name).collect(),
            public: n.public(),
            suspendible: n.suspendible(),
            ..Funk::default()
        };

        let mut b = Buffer::default();
        self.write_func_impl_header(&mut b, n)?;
        self.curr.b_header = b;

        let mut b = Buffer::default();
        self.write_func_impl_body_resume(&mut b, n)?;
        self.curr.b_body_resume = b;

        let mut b = Buffer::default();
        for o in &n.body {
            self.write_statement(&mut b, o, 0)?;
        }
        self.curr.b_body = b;

        let mut b = Buffer::default();
        self.write_func_impl_body_suspend(&mut b, n)?;
        self.curr.b_body_suspend = b;

        let mut b = Buffer::default();
        self.write_func_impl_footer(&mut b, n);
        self.curr.b_footer = b;

        // Every temporary that was produced must have been consumed exactly
        // once.
        if self.curr.temp_w != self.curr.temp_r {
            return Err(ErrorKind::TempCountMismatch);
        }
        self.funks.insert(n.qqid(), std::mem::take(&mut self.curr));
        Ok(())
    }

    fn write_func_impl_header(&mut self, b: &mut Buffer, n: &ast::Func) -> Result<(), ErrorKind> {
        // Check the previous status and the "self" arg.
        if self.curr.public && !n.receiver.is_zero() {
            b.writes("if (!self) {");
            if self.curr.suspendible {
                b.printf(f!("return {}ERROR_BAD_RECEIVER;", self.pkg_prefix_upper));
            } else if n.out_fields.is_empty() {
                b.writes("return;");
            } else if n.out_fields.len() == 1 {
                b.writes("return 0;");
            } else {
                return Err(ErrorKind::MultipleReturnValues);
            }
            b.writes("}");

            b.printf(f!(
                "if (self->private_impl.magic != SIFT_BASE__MAGIC) {{\
                 self->private_impl.status = {}ERROR_INITIALIZE_NOT_CALLED; }}",
                self.pkg_prefix_upper
            ));

            b.writes("if (self->private_impl.status < 0) {");
            if self.curr.suspendible {
                b.writes("return self->private_impl.status;");
            } else if n.out_fields.is_empty() {
                b.writes("return;");
            } else {
                b.writes("return 0;");
            }
            b.writes("}\n");
        }

        // For public functions, check (at runtime) the other args for bounds
        // and null-ness. For private functions, those checks were done at
        // compile time.
        if self.curr.public {
            self.write_func_impl_arg_checks(b, n);
        }

        if self.curr.suspendible {
            b.printf(f!(
                "{}status status = {}STATUS_OK;\n",
                self.pkg_prefix, self.pkg_prefix_upper
            ));
        }
        b.writes("\n");

        self.write_vars(b, &n.body)?;
        b.writes("\n");

        if self.curr.suspendible {
            self.find_derived_vars(n);
            for o in &n.in_fields {
                if let Some(&kind) = self.curr.derived_vars.get(&o.name) {
                    self.write_load_derived_var(b, o.name, kind, true);
                }
            }
            b.writes("\n");
        }
        Ok(())
    }

    fn write_func_impl_body_resume(
        &mut self,
        b: &mut Buffer,
        n: &ast::Func,
    ) -> Result<(), ErrorKind> {
        if !self.curr.suspendible {
            return Ok(());
        }
        b.printf(f!(
            "uint32_t coro_susp_point = self->private_impl.c_{}[0].coro_susp_point;\n",
            self.curr.func_name
        ));
        b.writes("if (coro_susp_point) {\n");
        self.write_resume_suspend(b, &n.body, VarsOp::Restore);
        b.writes("} else {\n");
        self.write_resume_suspend(b, &n.body, VarsOp::Initialize);
        b.writes("}\n");
        // Open the coroutine switch, in the style of Duff's-device
        // resumption. The matching } is written by
        // write_func_impl_body_suspend.
        b.writes("switch (coro_susp_point) {\nSIFT_BASE__COROUTINE_SUSPENSION_POINT_0;\n\n");
        Ok(())
    }

    fn write_func_impl_body_suspend(
        &mut self,
        b: &mut Buffer,
        n: &ast::Func,
    ) -> Result<(), ErrorKind> {
        if !self.curr.suspendible {
            return Ok(());
        }
        // We've reached the end of the function body. Reset the coroutine
        // suspension point so that the next call starts at the top. The
        // gotos avoid the "unused label" warning.
        b.writes("\ngoto ok;ok:");
        b.printf(f!(
            "self->private_impl.c_{}[0].coro_susp_point = 0;\n",
            self.curr.func_name
        ));
        b.writes("goto exit; }\n\n"); // Close the coroutine switch.

        b.writes("goto suspend;suspend:");
        b.printf(f!(
            "self->private_impl.c_{}[0].coro_susp_point = coro_susp_point;\n",
            self.curr.func_name
        ));
        self.write_resume_suspend(b, &n.body, VarsOp::Save);
        b.writes("\n");
        Ok(())
    }

    fn write_func_impl_footer(&mut self, b: &mut Buffer, n: &ast::Func) {
        if !self.curr.suspendible {
            return;
        }
        b.writes("goto exit;exit:"); // The goto avoids the "unused label" warning.

        for o in &n.in_fields {
            if let Some(&kind) = self.curr.derived_vars.get(&o.name) {
                self.write_save_derived_var(b, o.name, kind);
            }
        }
        b.writes("\n");

        if self.curr.public {
            b.writes("self->private_impl.status = status;\n");
        }
        b.writes("return status;\n\n");

        let mut seen = HashSet::new();
        for sr in &self.curr.short_reads {
            if !seen.insert(sr.as_str()) {
                continue;
            }
            write_short_read_stub(b, &self.pkg_prefix_upper, sr);
        }
    }

    fn write_func_impl_arg_checks(&self, b: &mut Buffer, n: &ast::Func) {
        let mut checks: Vec<String> = vec![];

        for o in &n.in_fields {
            let typ = &o.xtype;
            if !typ.is_ptr_type() && !typ.is_refined() {
                continue;
            }
            let name = self.tm.by_id(o.name);

            if typ.is_ptr_type() {
                checks.push(format!("!a_{name}"));
                continue;
            }

            let mut bounds = [None, None];
            for (i, bound) in typ.bounds().iter().enumerate() {
                bounds[i] = bound.and_then(|e| e.const_value);
            }
            // A refinement that matches the base type's natural range needs
            // no runtime check.
            if typ.qid.0[0] == ID::BASE {
                if let Some((natural_min, natural_max)) = num_type_bounds(typ.qid.0[1]) {
                    if bounds[0] == Some(natural_min) {
                        bounds[0] = None;
                    }
                    if bounds[1] == Some(natural_max) {
                        bounds[1] = None;
                    }
                }
            }
            for (i, bound) in bounds.iter().enumerate() {
                if let Some(v) = bound {
                    let op = if i == 0 { '<' } else { '>' };
                    checks.push(format!("a_{name} {op} {v}"));
                }
            }
        }

        if checks.is_empty() {
            return;
        }

        b.writes("if (");
        for (i, c) in checks.iter().enumerate() {
            if i != 0 {
                b.writes(" || ");
            }
            b.writes(c);
        }
        b.writes(") {");
        if self.curr.suspendible {
            if self.curr.public {
                b.printf(f!(
                    "self->private_impl.status = {}ERROR_BAD_ARGUMENT;\n",
                    self.pkg_prefix_upper
                ));
            }
            b.printf(f!("return {}ERROR_BAD_ARGUMENT;\n\n", self.pkg_prefix_upper));
        } else if !n.receiver.is_zero() {
            b.printf(f!(
                "self->private_impl.status = {}ERROR_BAD_ARGUMENT; return;",
                self.pkg_prefix_upper
            ));
        } else {
            b.writes("return;");
        }
        b.writes("}\n");
    }

    /// Declares the function's local variables, walking nested statement
    /// bodies. Iterate-bound variables are not included; they are declared
    /// as slice views by the iterate lowering itself.
    fn write_vars(&self, b: &mut Buffer, body: &[ast::Stmt]) -> Result<(), ErrorKind> {
        for stmt in body {
            match stmt {
                ast::Stmt::Var(v) => {
                    self.write_c_type_name(b, &v.xtype, "v_", self.tm.by_id(v.name))?;
                    b.writes(";\n");
                }
                ast::Stmt::If(i) => {
                    let mut i = i;
                    loop {
                        self.write_vars(b, &i.body_if_true)?;
                        self.write_vars(b, &i.body_if_false)?;
                        match i.else_if.as_deref() {
                            Some(e) => i = e,
                            None => break,
                        }
                    }
                }
                ast::Stmt::While(w) => self.write_vars(b, &w.body)?,
                ast::Stmt::Iterate(it) => {
                    let mut it = it;
                    loop {
                        self.write_vars(b, &it.body)?;
                        match it.else_iterate.as_deref() {
                            Some(e) => it = e,
                            None => break,
                        }
                    }
                }
                ast::Stmt::IOBind(iob) => self.write_vars(b, &iob.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Walks the function's declared variables, emitting the save, restore
    /// or first-entry-initialization step for each. The save/restore list is
    /// a function-level fact: the same walk serves the suspend epilogue and
    /// the resume prologue.
    fn write_resume_suspend(&self, b: &mut Buffer, body: &[ast::Stmt], op: VarsOp) {
        for stmt in body {
            match stmt {
                ast::Stmt::Var(v) => self.write_resume_suspend_var(b, v, op),
                ast::Stmt::If(i) => {
                    let mut i = i;
                    loop {
                        self.write_resume_suspend(b, &i.body_if_true, op);
                        self.write_resume_suspend(b, &i.body_if_false, op);
                        match i.else_if.as_deref() {
                            Some(e) => i = e,
                            None => break,
                        }
                    }
                }
                ast::Stmt::While(w) => self.write_resume_suspend(b, &w.body, op),
                ast::Stmt::Iterate(it) => {
                    let mut it = it;
                    loop {
                        self.write_resume_suspend(b, &it.body, op);
                        match it.else_iterate.as_deref() {
                            Some(e) => it = e,
                            None => break,
                        }
                    }
                }
                ast::Stmt::IOBind(iob) => self.write_resume_suspend(b, &iob.body, op),
                _ => {}
            }
        }
    }

    fn write_resume_suspend_var(&self, b: &mut Buffer, v: &ast::Var, op: VarsOp) {
        let name = self.tm.by_id(v.name);
        let frame = format!("self->private_impl.c_{}[0]", self.curr.func_name);

        if v.xtype.is_array_type() {
            match op {
                VarsOp::Initialize => {
                    b.printf(f!("memset(v_{name}, 0, sizeof(v_{name}));\n"));
                }
                VarsOp::Restore => {
                    b.printf(f!("memcpy(v_{name}, {frame}.v_{name}, sizeof(v_{name}));\n"));
                }
                VarsOp::Save => {
                    b.printf(f!("memcpy({frame}.v_{name}, v_{name}, sizeof(v_{name}));\n"));
                }
            }
            return;
        }
        match op {
            VarsOp::Initialize => {
                if v.xtype.is_slice_type() {
                    b.printf(f!("v_{name} = ((sift_base__slice_u8){{0}});\n"));
                } else if v.xtype.is_table_type() {
                    b.printf(f!("v_{name} = ((sift_base__table_u8){{0}});\n"));
                } else if v.xtype.is_io_type() {
                    let s = match IOKind::of(&v.xtype) {
                        IOKind::Reader => "reader",
                        IOKind::Writer => "writer",
                    };
                    b.printf(f!("v_{name} = ((sift_base__io_{s}){{0}});\n"));
                } else {
                    b.printf(f!("v_{name} = 0;\n"));
                }
            }
            VarsOp::Restore => b.printf(f!("v_{name} = {frame}.v_{name};\n")),
            VarsOp::Save => b.printf(f!("{frame}.v_{name} = v_{name};\n")),
        }
    }

    fn find_derived_vars(&mut self, n: &ast::Func) {
        for o in &n.in_fields {
            if o.xtype.is_io_type() {
                self.curr.derived_vars.insert(o.name, IOKind::of(&o.xtype));
            }
        }
    }

    /// Loads the derived cursor variables (`ioptr_x`, `iobounds1_x`) from
    /// their owning I/O object; with `decl`, also declares them.
    pub(super) fn write_load_derived_var(&self, b: &mut Buffer, name: ID, kind: IOKind, decl: bool) {
        let name = self.tm.by_id(name);
        if decl {
            b.printf(f!("uint8_t* ioptr_{name} = NULL;\n"));
            b.printf(f!("uint8_t* iobounds1_{name} = NULL;\n"));
        }
        b.printf(f!("if (a_{name}.buf) {{\n"));
        match kind {
            IOKind::Reader => {
                b.printf(f!("ioptr_{name} = a_{name}.buf->ptr + a_{name}.buf->ri;\n"));
                b.printf(f!("iobounds1_{name} = a_{name}.buf->ptr + a_{name}.buf->wi;\n"));
            }
            IOKind::Writer => {
                b.printf(f!("ioptr_{name} = a_{name}.buf->ptr + a_{name}.buf->wi;\n"));
                b.printf(f!("iobounds1_{name} = a_{name}.buf->ptr + a_{name}.buf->len;\n"));
            }
        }
        b.writes("}\n");
    }

    /// Saves the derived cursor variables back into their owning I/O object.
    pub(super) fn write_save_derived_var(&self, b: &mut Buffer, name: ID, kind: IOKind) {
        let name = self.tm.by_id(name);
        b.printf(f!("if (a_{name}.buf) {{\n"));
        match kind {
            IOKind::Reader => {
                b.printf(f!("a_{name}.buf->ri = (size_t)(ioptr_{name} - a_{name}.buf->ptr);\n"));
            }
            IOKind::Writer => {
                b.printf(f!("a_{name}.buf->wi = (size_t)(ioptr_{name} - a_{name}.buf->ptr);\n"));
            }
        }
        b.writes("}\n");
    }

    /// Emits the C spelling of a Sift type, followed (when a variable name
    /// is given) by the declared name. Array lengths print after the name,
    /// C-style; pointers print after the base type.
    pub(super) fn write_c_type_name(
        &self,
        b: &mut Buffer,
        typ: &ast::TypeExpr,
        prefix: &str,
        name: &str,
    ) -> Result<(), ErrorKind> {
        let mut array_lengths = vec![];
        let mut n_pointers = 0usize;
        let mut t = typ;
        loop {
            match t.decorator {
                ID::ARRAY => {
                    let len = t
                        .min
                        .as_deref()
                        .and_then(|e| e.const_value)
                        .ok_or(ErrorKind::Internal("array type has no constant length"))?;
                    array_lengths.push(len);
                }
                ID::PTR | ID::NPTR => n_pointers += 1,
                _ => break,
            }
            match t.inner.as_deref() {
                Some(inner) => t = inner,
                None => break,
            }
        }

        if t.is_slice_type() {
            b.writes("sift_base__slice_u8");
        } else if t.is_table_type() {
            b.writes("sift_base__table_u8");
        } else if t.qid.0[0] == ID::BASE {
            match t.qid.0[1] {
                ID::BOOL => b.writes("bool"),
                ID::I8 => b.writes("int8_t"),
                ID::I16 => b.writes("int16_t"),
                ID::I32 => b.writes("int32_t"),
                ID::I64 => b.writes("int64_t"),
                ID::U8 => b.writes("uint8_t"),
                ID::U16 => b.writes("uint16_t"),
                ID::U32 => b.writes("uint32_t"),
                ID::U64 => b.writes("uint64_t"),
                ID::STATUS => b.printf(f!("{}status", self.pkg_prefix)),
                other => b.printf(f!("sift_base__{}", self.tm.by_id(other))),
            }
        } else if t.qid.0[0] == ID::INVALID {
            // A struct in the current package.
            b.printf(f!("{}{}", self.pkg_prefix, self.tm.by_id(t.qid.0[1])));
        } else {
            b.printf(f!(
                "sift_{}__{}",
                self.tm.by_id(t.qid.0[0]),
                self.tm.by_id(t.qid.0[1])
            ));
        }

        for _ in 0..n_pointers {
            b.writes("*");
        }
        if !(prefix.is_empty() && name.is_empty()) {
            b.printf(f!(" {prefix}{name}"));
        }
        for len in array_lengths {
            b.printf(f!("[{len}]"));
        }
        Ok(())
    }

    /// Saves every derived cursor before a suspendible call, so the callee
    /// sees up-to-date cursors.
    pub(super) fn write_save_expr_derived_vars(&self, b: &mut Buffer) {
        for (&name, &kind) in &self.curr.derived_vars {
            self.write_save_derived_var(b, name, kind);
        }
    }

    /// Reloads every derived cursor after a suspendible call returns.
    pub(super) fn write_load_expr_derived_vars(&self, b: &mut Buffer) {
        for (&name, &kind) in &self.curr.derived_vars {
            self.write_load_derived_var(b, name, kind, false);
        }
    }
}

/// The per-cursor fallback for integer reads that could not complete on the
/// fast path. The partial-read state lives in the coroutine frame's scratch
/// field; the stub only has to classify the stall as end-of-input or a
/// plain short read, then suspend.
fn write_short_read_stub(b: &mut Buffer, pkg_prefix_upper: &str, name: &str) {
    b.printf(f!("\nshort_read_{name}:\n"));
    b.printf(f!("if (a_{name}.buf && a_{name}.buf->closed) {{\n"));
    b.printf(f!("status = {pkg_prefix_upper}ERROR_UNEXPECTED_EOF;\n"));
    b.writes("goto exit;\n}\n");
    b.printf(f!("status = {pkg_prefix_upper}SUSPENSION_SHORT_READ;\n"));
    b.writes("goto suspend;\n");
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
