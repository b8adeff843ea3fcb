use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::{
    ast::{
        Assign, Expr, ExprStmt, Field, Flags, Func, IOBind, Iterate, Jump, LoopId, Operand, Ret,
        Stmt, TypeExpr, Var, While,
    },
    codegen::{ErrorKind, Generator, Options},
    token::{Map, ID, QID},
};

fn ident(x: ID) -> Expr {
    Expr {
        ident: x,
        ..Expr::default()
    }
}

fn constant(v: i128) -> Expr {
    Expr {
        const_value: Some(v),
        ..Expr::default()
    }
}

fn binary(op: ID, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        op,
        lhs: Some(Box::new(lhs)),
        rhs: Some(Operand::Expr(Box::new(rhs))),
        ..Expr::default()
    }
}

fn base_type(qid: [ID; 2]) -> TypeExpr {
    TypeExpr {
        qid: QID(qid),
        ..TypeExpr::default()
    }
}

fn u8_type() -> TypeExpr {
    base_type([ID::BASE, ID::U8])
}

fn u32_type() -> TypeExpr {
    base_type([ID::BASE, ID::U32])
}

fn io_reader_type() -> TypeExpr {
    base_type([ID::BASE, ID::IO_READER])
}

fn io_writer_type() -> TypeExpr {
    base_type([ID::BASE, ID::IO_WRITER])
}

fn typed(mut e: Expr, t: TypeExpr) -> Expr {
    e.mtype = Some(Box::new(t));
    e
}

/// A `recv.method?(args)` call, optionally wrapped in `try`.
fn susp_call(recv: Expr, method: ID, args: Vec<Expr>, try_: bool) -> Expr {
    let callee = Expr {
        op: ID::DOT,
        ident: method,
        lhs: Some(Box::new(recv)),
        ..Expr::default()
    };
    Expr {
        op: if try_ { ID::TRY } else { ID::OPEN_PAREN },
        flags: Flags::SUSPENDIBLE | Flags::CALL_SUSPENDIBLE,
        lhs: Some(Box::new(callee)),
        args,
        ..Expr::default()
    }
}

fn func(m: &mut Map, name: &str, flags: Flags, body: Vec<Stmt>) -> Func {
    Func {
        flags,
        filename: "test.sift".to_string(),
        line: 1,
        receiver: QID([ID::INVALID, m.intern("lzw_decoder").unwrap()]),
        name: m.intern(name).unwrap(),
        in_fields: vec![],
        out_fields: vec![],
        body,
    }
}

fn generate(m: &Map, funcs: &[Func]) -> String {
    Generator::new(m, "gif", Options::default())
        .generate(funcs)
        .unwrap()
}

fn generate_err(m: &Map, funcs: &[Func]) -> super::Error {
    Generator::new(m, "gif", Options::default())
        .generate(funcs)
        .unwrap_err()
}

#[track_caller]
fn index_of(haystack: &str, needle: &str) -> usize {
    match haystack.find(needle) {
        Some(i) => i,
        None => panic!("{needle:?} not found in output:\n{haystack}"),
    }
}

#[test]
fn non_suspendible_function() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let mut f = func(
        m,
        "clamp",
        Flags::empty(),
        vec![Stmt::Ret(Ret {
            keyword: ID::RETURN,
            value: Some(ident(x)),
            line: 2,
        })],
    );
    f.receiver = QID::default();
    f.in_fields = vec![Field {
        name: x,
        xtype: u32_type(),
    }];
    f.out_fields = vec![Field {
        name: ID::OUT,
        xtype: u32_type(),
    }];

    let out = generate(m, &[f]);
    assert_eq!(
        out,
        indoc! {"
            static uint32_t sift_gif__clamp(uint32_t a_x);

            // -------- func clamp

            static uint32_t sift_gif__clamp(uint32_t a_x){


            return a_x;}

        "}
    );
}

#[test]
fn generation_is_deterministic() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let src = m.intern("src").unwrap();
    let build = |m: &mut Map| {
        let mut f = func(
            m,
            "decode",
            Flags::SUSPENDIBLE,
            vec![
                Stmt::Var(Var {
                    name: x,
                    xtype: u8_type(),
                    value: None,
                    line: 2,
                }),
                Stmt::Assign(Assign {
                    op: ID::EQ,
                    lhs: ident(x),
                    rhs: typed(susp_call(ident(src), ID::READ_U8, vec![], true), u8_type()),
                    line: 3,
                }),
            ],
        );
        f.in_fields = vec![Field {
            name: src,
            xtype: io_reader_type(),
        }];
        f
    };
    let f1 = build(m);
    let f2 = build(m);
    assert_eq!(generate(m, &[f1.clone()]), generate(m, &[f2]));
    // Generating the same function through the same generator twice is also
    // byte-identical.
    let mut g = Generator::new(m, "gif", Options::default());
    let once = g.generate(std::slice::from_ref(&f1)).unwrap();
    let twice = g.generate(std::slice::from_ref(&f1)).unwrap();
    assert_eq!(once, twice);
}

// A function body containing exactly one `x = try src.read_u8?()`.
#[test]
fn try_read_u8() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let src = m.intern("src").unwrap();
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![
            Stmt::Var(Var {
                name: x,
                xtype: u8_type(),
                value: None,
                line: 2,
            }),
            Stmt::Assign(Assign {
                op: ID::EQ,
                lhs: ident(x),
                rhs: typed(susp_call(ident(src), ID::READ_U8, vec![], true), u8_type()),
                line: 3,
            }),
        ],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);

    // One suspension point, numbered 1.
    assert!(out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(1);"));
    assert!(!out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(2);"));

    // The fast path byte load, assigned to the temporary; the temporary is
    // then consumed by the assignment.
    assert!(out.contains("uint8_t t0 = *ioptr_src++;"));
    assert!(out.contains("v_x = t0;"));

    // The short-read fallback, and its stub at the function tail.
    let fallback = index_of(&out, "goto short_read_src;");
    let stub = index_of(&out, "\nshort_read_src:");
    assert!(fallback < stub);
    assert!(out.contains("SIFT_GIF__SUSPENSION_SHORT_READ;"));

    // Derived cursors for src: declared and loaded in the header, saved
    // before the read.
    let load = index_of(&out, "ioptr_src = a_src.buf->ptr + a_src.buf->ri;");
    let save = index_of(&out, "a_src.buf->ri = (size_t)(ioptr_src - a_src.buf->ptr);");
    let read = index_of(&out, "uint8_t t0 = *ioptr_src++;");
    assert!(load < save && save < read);

    // Inside a try, the status is never branched on.
    assert!(!out.contains("if (status) { goto suspend; }"));
}

// `while x < 10 { continue }` with a live continue.
#[test]
fn while_with_continue() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let f = func(
        m,
        "spin",
        Flags::empty(),
        vec![
            Stmt::Var(Var {
                name: x,
                xtype: u32_type(),
                value: None,
                line: 2,
            }),
            Stmt::While(While {
                loop_id: LoopId(0),
                flags: Flags::HAS_CONTINUE,
                condition: binary(ID::X_BINARY_LESS_THAN, ident(x), constant(10)),
                body: vec![Stmt::Jump(Jump {
                    keyword: ID::CONTINUE,
                    target: LoopId(0),
                    line: 4,
                })],
                line: 3,
            }),
        ],
    );

    let out = generate(m, &[f]);
    let label = index_of(&out, "label_0_continue:;\n");
    let cond = index_of(&out, "while (v_x < 10) {");
    let jump = index_of(&out, "goto label_0_continue;\n");
    assert!(label < cond && cond < jump);
    // No break label without a live break.
    assert!(!out.contains("label_0_break"));
}

// A public suspendible member function taking a `ptr image_buffer` and a
// refined integer.
#[test]
fn public_function_header() {
    let m = &mut Map::new();
    let ib = m.intern("ib").unwrap();
    let x = m.intern("x").unwrap();
    let i = m.intern("i").unwrap();
    let mut f = func(
        m,
        "decode",
        Flags::PUBLIC | Flags::SUSPENDIBLE,
        vec![Stmt::Var(Var {
            name: i,
            xtype: u32_type(),
            value: None,
            line: 2,
        })],
    );
    f.in_fields = vec![
        Field {
            name: ib,
            xtype: TypeExpr {
                decorator: ID::PTR,
                inner: Some(Box::new(base_type([ID::BASE, ID::IMAGE_BUFFER]))),
                ..TypeExpr::default()
            },
        },
        Field {
            name: x,
            xtype: TypeExpr {
                min: Some(Box::new(constant(0))),
                max: Some(Box::new(constant(255))),
                ..u32_type()
            },
        },
    ];

    let out = generate(m, &[f]);

    assert!(out.contains("sift_gif__status sift_gif__lzw_decoder__decode(\
                          sift_gif__lzw_decoder *self,\
                          sift_base__image_buffer* a_ib,uint32_t a_x)"));

    // Null check, magic check, cached-status short-circuit, arg checks, then
    // local declarations, in that order.
    let null_check = index_of(&out, "if (!self) {return SIFT_GIF__ERROR_BAD_RECEIVER;}");
    let magic = index_of(&out, "if (self->private_impl.magic != SIFT_BASE__MAGIC)");
    let cached = index_of(&out, "if (self->private_impl.status < 0) {");
    let args = index_of(&out, "if (!a_ib || a_x > 255) {");
    let locals = index_of(&out, "uint32_t v_i;");
    assert!(null_check < magic && magic < cached && cached < args && args < locals);

    assert!(out.contains("return SIFT_GIF__ERROR_BAD_ARGUMENT;"));
    // The refinement's lower bound matches u32's natural bound, so no
    // `a_x < 0` check is emitted.
    assert!(!out.contains("a_x < 0"));
    // Public functions store the status back into the receiver.
    assert!(out.contains("self->private_impl.status = status;\n"));
}

// `iterate (x in s) length 8 unroll 2 { }` plus the implicit length-8 tail.
#[test]
fn iterate_length_unroll() {
    let m = &mut Map::new();
    let s = m.intern("s").unwrap();
    let x = m.intern("x").unwrap();
    let slice_u8 = TypeExpr {
        decorator: ID::SLICE,
        inner: Some(Box::new(u8_type())),
        ..TypeExpr::default()
    };
    let f = func(
        m,
        "sweep",
        Flags::empty(),
        vec![
            Stmt::Var(Var {
                name: s,
                xtype: slice_u8.clone(),
                value: None,
                line: 2,
            }),
            Stmt::Iterate(Iterate {
                loop_id: LoopId(0),
                flags: Flags::empty(),
                vars: vec![Var {
                    name: x,
                    xtype: slice_u8,
                    value: Some(ident(s)),
                    line: 3,
                }],
                length: ID::LIT_8,
                unroll: ID::LIT_2,
                body: vec![],
                else_iterate: None,
                line: 3,
            }),
        ],
    );

    let out = generate(m, &[f]);

    assert!(out.contains("sift_base__slice_u8 i_slice_x = v_s;\n"));
    assert!(out.contains("sift_base__slice_u8 v_x = i_slice_x;\n"));
    // Round 0: the end pointer is at len / 16 * 16 and the body advances the
    // view pointer by 8 twice per test.
    assert!(out.contains(
        "uint8_t* i_end0_x = i_slice_x.ptr + (i_slice_x.len / 16) * 16;\n"
    ));
    assert!(out.contains("while (v_x.ptr < i_end0_x) {\nv_x.ptr += 8;\nv_x.ptr += 8;\n}\n"));
    // The fall-through tail round of unroll 1.
    assert!(out.contains(
        "uint8_t* i_end1_x = i_slice_x.ptr + (i_slice_x.len / 8) * 8;\n"
    ));
    assert_eq!(out.matches("v_x.ptr += 8;\n").count(), 3);
}

#[test]
fn user_defined_call_saves_and_reloads_cursors() {
    let m = &mut Map::new();
    let src = m.intern("src").unwrap();
    let helper = m.intern("fill_bits").unwrap();
    let lzw = m.intern("lzw_decoder").unwrap();
    let this = typed(ident(ID::THIS), base_type([ID::INVALID, lzw]));
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![Stmt::Expr(ExprStmt {
            expr: susp_call(this, helper, vec![ident(src)], false),
            line: 2,
        })],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);

    let susp_point = index_of(&out, "SIFT_BASE__COROUTINE_SUSPENSION_POINT(1);");
    let save = index_of(&out, "a_src.buf->ri = (size_t)(ioptr_src - a_src.buf->ptr);");
    let call = index_of(&out, "status = sift_gif__lzw_decoder__fill_bits(self,a_src);");
    let reload_header = index_of(&out, "ioptr_src = a_src.buf->ptr + a_src.buf->ri;");
    let reload_after = out[call..]
        .find("ioptr_src = a_src.buf->ptr + a_src.buf->ri;")
        .map(|i| i + call)
        .expect("no reload after the call");
    let branch = index_of(&out, "if (status) { goto suspend; }");

    assert!(reload_header < susp_point);
    assert!(susp_point < save && save < call && call < reload_after && reload_after < branch);
}

#[test]
fn proven_not_to_suspend_elides_the_suspension_point() {
    let m = &mut Map::new();
    let src = m.intern("src").unwrap();
    let helper = m.intern("fill_bits").unwrap();
    let lzw = m.intern("lzw_decoder").unwrap();
    let this = typed(ident(ID::THIS), base_type([ID::INVALID, lzw]));
    let mut call = susp_call(this, helper, vec![], false);
    call.flags |= Flags::PROVEN_NOT_TO_SUSPEND;
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![Stmt::Expr(ExprStmt {
            expr: call,
            line: 2,
        })],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);
    assert!(!out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(1);"));
    assert!(out.contains("status = sift_gif__lzw_decoder__fill_bits(self);"));
}

#[test]
fn read_u32le_has_fast_and_slow_paths() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let src = m.intern("src").unwrap();
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![
            Stmt::Var(Var {
                name: x,
                xtype: u32_type(),
                value: None,
                line: 2,
            }),
            Stmt::Assign(Assign {
                op: ID::EQ,
                lhs: ident(x),
                rhs: typed(
                    susp_call(ident(src), ID::READ_U32LE, vec![], false),
                    u32_type(),
                ),
                line: 3,
            }),
        ],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);

    // Fast path: four contiguous bytes, one unaligned load.
    assert!(out.contains("if (SIFT_BASE__LIKELY(iobounds1_src - ioptr_src >= 4)) {"));
    assert!(out.contains("t1 = sift_base__load_u32le(ioptr_src);"));
    assert!(out.contains("ioptr_src += 4;"));
    // Slow path: the byte-at-a-time accumulator in the persistent scratch,
    // with its own suspension point.
    assert!(out.contains("self->private_impl.c_decode[0].scratch = 0;"));
    assert!(out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(2);"));
    assert!(out.contains("if (t0 == 24) {"));
    assert!(out.contains("goto short_read_src;"));
    // The result temporary is consumed by the assignment.
    assert!(out.contains("v_x = t1;"));
}

#[test]
fn write_u8_and_write_u16le_short_write() {
    let m = &mut Map::new();
    let dst = m.intern("dst").unwrap();
    let mut f = func(
        m,
        "encode",
        Flags::SUSPENDIBLE,
        vec![
            Stmt::Expr(ExprStmt {
                expr: susp_call(ident(dst), ID::WRITE_U8, vec![constant(42)], false),
                line: 2,
            }),
            Stmt::Expr(ExprStmt {
                expr: susp_call(ident(dst), ID::WRITE_U16LE, vec![constant(513)], false),
                line: 3,
            }),
        ],
    );
    f.in_fields = vec![Field {
        name: dst,
        xtype: io_writer_type(),
    }];

    let out = generate(m, &[f]);

    // Writer cursors load from the write index and bound at len.
    assert!(out.contains("ioptr_dst = a_dst.buf->ptr + a_dst.buf->wi;"));
    assert!(out.contains("iobounds1_dst = a_dst.buf->ptr + a_dst.buf->len;"));

    assert!(out.contains("*ioptr_dst++ = 42;"));
    assert!(out.contains("status = SIFT_GIF__SUSPENSION_SHORT_WRITE;\ngoto suspend;"));
    assert!(out.contains("if (iobounds1_dst - ioptr_dst < 2) {"));
    assert!(out.contains("sift_base__store_u16le(ioptr_dst, 513);"));
    assert!(out.contains("ioptr_dst += 2;"));
    assert!(out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(1);"));
    assert!(out.contains("SIFT_BASE__COROUTINE_SUSPENSION_POINT(2);"));
}

#[test]
fn skip32_uses_scratch() {
    let m = &mut Map::new();
    let src = m.intern("src").unwrap();
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![Stmt::Expr(ExprStmt {
            expr: susp_call(ident(src), ID::SKIP32, vec![constant(6)], false),
            line: 2,
        })],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);
    assert!(out.contains("self->private_impl.c_decode[0].scratch = 6;"));
    assert!(out.contains(
        "if (self->private_impl.c_decode[0].scratch > ((uint64_t)(iobounds1_src - ioptr_src))) {"
    ));
    assert!(out.contains("ioptr_src = iobounds1_src;"));
    assert!(out.contains("status = SIFT_GIF__SUSPENSION_SHORT_READ;\ngoto suspend;"));
    assert!(out.contains("ioptr_src += self->private_impl.c_decode[0].scratch;"));
}

#[test]
fn io_bind_shadows_and_restores() {
    let m = &mut Map::new();
    let src = m.intern("src").unwrap();
    let w = m.intern("w").unwrap();
    let arg_ref = Expr {
        op: ID::DOT,
        ident: src,
        lhs: Some(Box::new(ident(ID::IN))),
        mtype: Some(Box::new(io_reader_type())),
        ..Expr::default()
    };
    let local_ref = typed(ident(w), io_reader_type());
    let mut f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![
            Stmt::Var(Var {
                name: w,
                xtype: io_reader_type(),
                value: None,
                line: 2,
            }),
            Stmt::IOBind(IOBind {
                in_fields: vec![arg_ref, local_ref],
                body: vec![],
                line: 3,
            }),
        ],
    );
    f.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];

    let out = generate(m, &[f]);

    // The shadow copies, depth-prefixed.
    let save_arg = index_of(&out, "sift_base__io_reader o0_a_src = a_src;\n");
    let save_local = index_of(&out, "sift_base__io_reader o0_v_w = v_w;\n");
    assert!(out.contains("uint8_t *o0_ioptr_v_w = ioptr_w;\n"));
    assert!(out.contains("uint8_t *o0_iobounds1_v_w = iobounds1_w;\n"));
    // Argument references do not shadow cursor variables.
    assert!(!out.contains("o0_ioptr_a_src"));

    // Restores run in reverse order.
    let restore_local = index_of(&out, "v_w = o0_v_w;\n");
    let restore_arg = index_of(&out, "a_src = o0_a_src;\n");
    assert!(save_arg < save_local);
    assert!(restore_local < restore_arg);
    assert!(out.contains("ioptr_w = o0_ioptr_v_w;\n"));
}

#[test]
fn yield_and_returns() {
    let m = &mut Map::new();
    let msg = m.intern("\"bad header\"").unwrap();
    let f = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![
            Stmt::Ret(Ret {
                keyword: ID::YIELD,
                value: None,
                line: 2,
            }),
            Stmt::Ret(Ret {
                keyword: ID::RETURN,
                value: Some(Expr {
                    op: ID::ERROR,
                    ident: msg,
                    ..Expr::default()
                }),
                line: 3,
            }),
            Stmt::Ret(Ret {
                keyword: ID::RETURN,
                value: None,
                line: 4,
            }),
        ],
    );

    let out = generate(m, &[f]);

    // A yield sets the status and falls through to a fresh restart point.
    let yield_status = index_of(&out, "status = SIFT_GIF__STATUS_OK;");
    let restart = index_of(&out, "SIFT_BASE__COROUTINE_SUSPENSION_POINT_MAYBE_SUSPEND(1);");
    assert!(yield_status < restart);

    // `return error "bad header"` goes straight to exit.
    assert!(out.contains("status = SIFT_GIF__ERROR_BAD_HEADER;goto exit;"));

    // A bare `return` in a suspendible function resets the suspension point
    // through the ok label.
    assert!(out.contains("goto ok;"));
    assert!(out.contains("self->private_impl.c_decode[0].coro_susp_point = 0;\n"));
    assert!(out.contains("goto suspend;suspend:"));
    assert!(out.contains("self->private_impl.c_decode[0].coro_susp_point = coro_susp_point;\n"));
}

#[test]
fn saturating_compound_assignment() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let f = func(
        m,
        "bump",
        Flags::empty(),
        vec![
            Stmt::Var(Var {
                name: x,
                xtype: u32_type(),
                value: None,
                line: 2,
            }),
            Stmt::Assign(Assign {
                op: ID::TILDE_SAT_PLUS_EQ,
                lhs: typed(ident(x), u32_type()),
                rhs: constant(1),
                line: 3,
            }),
            Stmt::Assign(Assign {
                op: ID::SHIFT_L_EQ,
                lhs: typed(ident(x), u32_type()),
                rhs: constant(2),
                line: 4,
            }),
        ],
    );

    let out = generate(m, &[f]);
    assert!(out.contains("sift_base__u32__sat_add_indirect(&v_x,1);\n"));
    assert!(out.contains("v_x <<= 2;\n"));
}

#[test]
fn assertions_emit_nothing() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let f = func(
        m,
        "quiet",
        Flags::empty(),
        vec![
            Stmt::Var(Var {
                name: x,
                xtype: u32_type(),
                value: None,
                line: 2,
            }),
            Stmt::Assert(crate::ast::Assert {
                keyword: ID::ASSERT,
                condition: binary(ID::X_BINARY_LESS_THAN, ident(x), constant(10)),
                line: 3,
            }),
        ],
    );

    let out = generate(m, &[f]);
    assert!(!out.contains("v_x < 10"));
}

#[test]
fn filename_line_comments_are_opt_in() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let body = vec![Stmt::Var(Var {
        name: x,
        xtype: u32_type(),
        value: None,
        line: 7,
    })];
    let f = func(m, "quiet", Flags::empty(), body);

    let plain = generate(m, &[f.clone()]);
    assert!(!plain.contains("// test.sift:7"));

    let noisy = Generator::new(
        m,
        "gif",
        Options {
            filename_line_comments: true,
        },
    )
    .generate(&[f])
    .unwrap();
    assert!(noisy.contains("// test.sift:7\n"));
}

#[test]
fn structural_errors() {
    let m = &mut Map::new();
    let x = m.intern("x").unwrap();
    let y = m.intern("y").unwrap();
    let s = m.intern("s").unwrap();
    let slice_u8 = TypeExpr {
        decorator: ID::SLICE,
        inner: Some(Box::new(u8_type())),
        ..TypeExpr::default()
    };

    // Iterating over more than one variable is unsupported.
    let multi = func(
        m,
        "sweep",
        Flags::empty(),
        vec![Stmt::Iterate(Iterate {
            loop_id: LoopId(0),
            flags: Flags::empty(),
            vars: vec![
                Var {
                    name: x,
                    xtype: slice_u8.clone(),
                    value: Some(ident(s)),
                    line: 2,
                },
                Var {
                    name: y,
                    xtype: slice_u8,
                    value: Some(ident(s)),
                    line: 2,
                },
            ],
            length: ID::LIT_8,
            unroll: ID::LIT_1,
            body: vec![],
            else_iterate: None,
            line: 2,
        })],
    );
    let err = generate_err(m, &[multi]);
    assert_eq!(err.kind, ErrorKind::MultiVariableIterate);
    assert_eq!(err.func, "lzw_decoder.sweep");

    // A bare return from a value-returning function.
    let mut bare = func(
        m,
        "get",
        Flags::empty(),
        vec![Stmt::Ret(Ret {
            keyword: ID::RETURN,
            value: None,
            line: 2,
        })],
    );
    bare.out_fields = vec![Field {
        name: ID::OUT,
        xtype: u32_type(),
    }];
    assert_eq!(
        generate_err(m, &[bare]).kind,
        ErrorKind::BareReturnFromValueFunc
    );

    // Multiple return values.
    let mut multi_out = func(m, "get2", Flags::empty(), vec![]);
    multi_out.out_fields = vec![
        Field {
            name: x,
            xtype: u32_type(),
        },
        Field {
            name: y,
            xtype: u32_type(),
        },
    ];
    assert_eq!(
        generate_err(m, &[multi_out]).kind,
        ErrorKind::MultipleReturnValues
    );

    // An unconsumed temporary is an internal error.
    let src = m.intern("src").unwrap();
    let mut dangling = func(
        m,
        "decode",
        Flags::SUSPENDIBLE,
        vec![Stmt::Expr(ExprStmt {
            expr: typed(susp_call(ident(src), ID::READ_U8, vec![], true), u8_type()),
            line: 2,
        })],
    );
    dangling.in_fields = vec![Field {
        name: src,
        xtype: io_reader_type(),
    }];
    assert_eq!(
        generate_err(m, &[dangling]).kind,
        ErrorKind::TempCountMismatch
    );
}

#[test]
fn if_chain_with_suspendible_conditions() {
    let m = &mut Map::new();
    let src = m.intern("src").unwrap();
    let full = m.intern("full").unwrap();
    let lzw = m.intern("lzw_decoder").unwrap();
    let this = typed(ident(ID::THIS), base_type([ID::INVALID, lzw]));

    let mut cond = susp_call(this, full, vec![], true);
    cond.mtype = Some(Box::new(base_type([ID::BASE, ID::BOOL])));
    let f = {
        let mut f = func(
            m,
            "decode",
            Flags::SUSPENDIBLE,
            vec![Stmt::If(crate::ast::If {
                condition: cond,
                body_if_true: vec![Stmt::Ret(Ret {
                    keyword: ID::RETURN,
                    value: None,
                    line: 3,
                })],
                body_if_false: vec![],
                else_if: None,
                line: 2,
            })],
        );
        f.in_fields = vec![Field {
            name: src,
            xtype: io_reader_type(),
        }];
        f
    };

    let out = generate(m, &[f]);
    // The try call's status lands in a temporary, which the condition then
    // consumes.
    assert!(out.contains("sift_gif__status t0 = sift_gif__lzw_decoder__full(self);"));
    assert!(out.contains("if (t0) {\n"));
}

#[test]
fn prototypes_precede_implementations() {
    let m = &mut Map::new();
    let f = func(m, "reset", Flags::PUBLIC, vec![]);
    let out = generate(m, &[f]);

    let proto = index_of(&out, "void sift_gif__lzw_decoder__reset(sift_gif__lzw_decoder *self);\n\n");
    let banner = index_of(&out, "// -------- func lzw_decoder.reset");
    assert!(proto < banner);
    // Public functions are not static.
    assert!(!out.contains("static void sift_gif__lzw_decoder__reset"));
}
