use std::{collections::HashMap, fmt};

/// A token type. Every identifier (in the programming language sense),
/// keyword, operator and literal has its own ID.
///
/// Some IDs are built-in: the `func` keyword always has the same numerical ID
/// value. Others are mapped at runtime. For example, the ID value for the
/// `foobar` identifier (e.g. a variable name) is looked up in a [`Map`].
///
/// The numerical values are packed into fixed ranges so that classification
/// is a range check:
///
///  - Zero is invalid.
///  - `[0x01, 0x0F]` are squiggly punctuation, such as `(`, `)` and `;`.
///  - `[0x10, 0x1F]` are squiggly assignments, such as `=` and `+=`.
///  - `[0x20, 0x3F]` are operators, such as `+`, `==` and `not`.
///  - `[0x40, 0x6F]` are x-ops (disambiguation forms): unary vs binary `+`.
///  - `[0x70, 0x8F]` are keywords, such as `if` and `return`.
///  - `[0x90, 0x9F]` are type modifiers, such as `ptr` and `slice`.
///  - `[0xA0, 0xAF]` are literals, such as `false` and `true`.
///  - `[0xB0, 0xFF]` are reserved.
///  - `[0x100, 0x3FF]` are built-in identifiers, such as `bool`, `u32` and
///    `read_u8`.
///  - `[0x400, ...)` are user-defined identifiers, assigned on first
///    interning.
///
/// "Squiggly" means a sequence of non-alpha-numeric characters, such as `+`
/// and `&=`. Roughly speaking, their IDs range in `[0x01, 0x3F]`, but vice
/// versa does not necessarily hold: the `and` operator is not squiggly but it
/// is within `[0x01, 0x3F]`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ID(u32);

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID(0x{:03X})", self.0)
    }
}

/// The number of symbolic (squiggle, assignment, operator and x-op) IDs.
const N_BUILT_IN_SYMBOLIC_IDS: usize = 0x70; // 112

/// The number of built-in IDs. Everything at or above this value is a
/// user-defined identifier.
const N_BUILT_IN_IDS: u32 = 0x400; // 1024

const MIN_ASSIGN: u32 = 0x10;
const MAX_ASSIGN: u32 = 0x1F;

const MIN_OP: u32 = 0x20;
const MIN_X_OP: u32 = 0x40;
const MAX_X_OP: u32 = 0x6F;
const MAX_OP: u32 = 0x6F;

const MIN_BUILT_IN_LITERAL: u32 = 0xA0;
const MIN_BUILT_IN_NUM_LITERAL: u32 = 0xA2;
const MAX_BUILT_IN_NUM_LITERAL: u32 = 0xAF;
const MAX_BUILT_IN_LITERAL: u32 = 0xAF;

const MIN_BUILT_IN_IDENT: u32 = 0x100;
const MIN_NUM_TYPE_OR_IDEAL: u32 = 0x11F;
const MIN_NUM_TYPE: u32 = 0x120;
const MAX_NUM_TYPE: u32 = 0x127;
const MAX_NUM_TYPE_OR_IDEAL: u32 = 0x127;
const MAX_BUILT_IN_IDENT: u32 = 0x3FF;

impl ID {
    pub const INVALID: ID = ID(0x00);

    pub const OPEN_PAREN: ID = ID(0x02);
    pub const CLOSE_PAREN: ID = ID(0x03);
    pub const OPEN_BRACKET: ID = ID(0x04);
    pub const CLOSE_BRACKET: ID = ID(0x05);
    pub const OPEN_CURLY: ID = ID(0x06);
    pub const CLOSE_CURLY: ID = ID(0x07);

    pub const DOT: ID = ID(0x08);
    pub const DOT_DOT: ID = ID(0x09);
    pub const COMMA: ID = ID(0x0A);
    pub const EXCLAM: ID = ID(0x0B);
    pub const QUESTION: ID = ID(0x0C);
    pub const COLON: ID = ID(0x0D);
    pub const SEMICOLON: ID = ID(0x0E);
    pub const DOLLAR: ID = ID(0x0F);

    pub const EQ: ID = ID(0x10);
    pub const PLUS_EQ: ID = ID(0x11);
    pub const MINUS_EQ: ID = ID(0x12);
    pub const STAR_EQ: ID = ID(0x13);
    pub const SLASH_EQ: ID = ID(0x14);
    pub const SHIFT_L_EQ: ID = ID(0x15);
    pub const SHIFT_R_EQ: ID = ID(0x16);
    pub const AMP_EQ: ID = ID(0x17);
    pub const PIPE_EQ: ID = ID(0x18);
    pub const HAT_EQ: ID = ID(0x19);
    pub const PERCENT_EQ: ID = ID(0x1A);
    pub const TILDE_MOD_PLUS_EQ: ID = ID(0x1B);
    pub const TILDE_MOD_MINUS_EQ: ID = ID(0x1C);
    pub const TILDE_SAT_PLUS_EQ: ID = ID(0x1D);
    pub const TILDE_SAT_MINUS_EQ: ID = ID(0x1E);
    pub const EQ_COLON: ID = ID(0x1F);

    pub const PLUS: ID = ID(0x21);
    pub const MINUS: ID = ID(0x22);
    pub const STAR: ID = ID(0x23);
    pub const SLASH: ID = ID(0x24);
    pub const SHIFT_L: ID = ID(0x25);
    pub const SHIFT_R: ID = ID(0x26);
    pub const AMP: ID = ID(0x27);
    pub const PIPE: ID = ID(0x28);
    pub const HAT: ID = ID(0x29);
    pub const PERCENT: ID = ID(0x2A);
    pub const TILDE_MOD_PLUS: ID = ID(0x2B);
    pub const TILDE_MOD_MINUS: ID = ID(0x2C);
    pub const TILDE_SAT_PLUS: ID = ID(0x2D);
    pub const TILDE_SAT_MINUS: ID = ID(0x2E);

    pub const NOT_EQ: ID = ID(0x30);
    pub const LESS_THAN: ID = ID(0x31);
    pub const LESS_EQ: ID = ID(0x32);
    pub const EQ_EQ: ID = ID(0x33);
    pub const GREATER_EQ: ID = ID(0x34);
    pub const GREATER_THAN: ID = ID(0x35);

    pub const AND: ID = ID(0x38);
    pub const OR: ID = ID(0x39);
    pub const NOT: ID = ID(0x3A);
    pub const AS: ID = ID(0x3B);

    // TODO: are these unused? Can we drop them (and their x-unary forms)?
    pub const REF: ID = ID(0x3C);
    pub const DEREF: ID = ID(0x3D);

    // The X_FOO IDs are not returned by the lexer. They are used by the AST
    // node ID-typed fields to disambiguate e.g. unary vs binary plus.

    pub const X_UNARY_PLUS: ID = ID(0x40);
    pub const X_UNARY_MINUS: ID = ID(0x41);
    pub const X_UNARY_NOT: ID = ID(0x42);
    pub const X_UNARY_REF: ID = ID(0x43);
    pub const X_UNARY_DEREF: ID = ID(0x44);

    pub const X_BINARY_PLUS: ID = ID(0x48);
    pub const X_BINARY_MINUS: ID = ID(0x49);
    pub const X_BINARY_STAR: ID = ID(0x4A);
    pub const X_BINARY_SLASH: ID = ID(0x4B);
    pub const X_BINARY_SHIFT_L: ID = ID(0x4C);
    pub const X_BINARY_SHIFT_R: ID = ID(0x4D);
    pub const X_BINARY_AMP: ID = ID(0x4E);
    pub const X_BINARY_PIPE: ID = ID(0x4F);
    pub const X_BINARY_HAT: ID = ID(0x50);
    pub const X_BINARY_PERCENT: ID = ID(0x51);
    pub const X_BINARY_TILDE_MOD_PLUS: ID = ID(0x52);
    pub const X_BINARY_TILDE_MOD_MINUS: ID = ID(0x53);
    pub const X_BINARY_TILDE_SAT_PLUS: ID = ID(0x54);
    pub const X_BINARY_TILDE_SAT_MINUS: ID = ID(0x55);
    pub const X_BINARY_NOT_EQ: ID = ID(0x56);
    pub const X_BINARY_LESS_THAN: ID = ID(0x57);
    pub const X_BINARY_LESS_EQ: ID = ID(0x58);
    pub const X_BINARY_EQ_EQ: ID = ID(0x59);
    pub const X_BINARY_GREATER_EQ: ID = ID(0x5A);
    pub const X_BINARY_GREATER_THAN: ID = ID(0x5B);
    pub const X_BINARY_AND: ID = ID(0x5C);
    pub const X_BINARY_OR: ID = ID(0x5D);
    pub const X_BINARY_AS: ID = ID(0x5E);

    pub const X_ASSOCIATIVE_PLUS: ID = ID(0x60);
    pub const X_ASSOCIATIVE_STAR: ID = ID(0x61);
    pub const X_ASSOCIATIVE_AMP: ID = ID(0x62);
    pub const X_ASSOCIATIVE_PIPE: ID = ID(0x63);
    pub const X_ASSOCIATIVE_HAT: ID = ID(0x64);
    pub const X_ASSOCIATIVE_AND: ID = ID(0x65);
    pub const X_ASSOCIATIVE_OR: ID = ID(0x66);

    pub const FUNC: ID = ID(0x70);
    pub const ASSERT: ID = ID(0x71);
    pub const WHILE: ID = ID(0x72);
    pub const IF: ID = ID(0x73);
    pub const ELSE: ID = ID(0x74);
    pub const RETURN: ID = ID(0x75);
    pub const BREAK: ID = ID(0x76);
    pub const CONTINUE: ID = ID(0x77);
    pub const STRUCT: ID = ID(0x78);
    pub const USE: ID = ID(0x79);
    pub const VAR: ID = ID(0x7A);
    pub const PRE: ID = ID(0x7B);
    pub const INV: ID = ID(0x7C);
    pub const POST: ID = ID(0x7D);
    pub const VIA: ID = ID(0x7E);
    pub const PUB: ID = ID(0x7F);
    pub const PRI: ID = ID(0x80);
    pub const ERROR: ID = ID(0x81);
    pub const SUSPENSION: ID = ID(0x82);
    pub const PACKAGE_ID: ID = ID(0x83);
    pub const CONST: ID = ID(0x84);
    pub const TRY: ID = ID(0x85);
    pub const ITERATE: ID = ID(0x86);
    pub const YIELD: ID = ID(0x87);
    pub const IO_BIND: ID = ID(0x88);

    pub const ARRAY: ID = ID(0x90);
    pub const NPTR: ID = ID(0x91);
    pub const PTR: ID = ID(0x92);
    pub const SLICE: ID = ID(0x93);
    pub const TABLE: ID = ID(0x94);

    pub const FALSE: ID = ID(0xA0);
    pub const TRUE: ID = ID(0xA1);
    pub const LIT_0: ID = ID(0xA2);
    pub const LIT_1: ID = ID(0xA3);
    pub const LIT_2: ID = ID(0xA4);
    pub const LIT_4: ID = ID(0xA5);
    pub const LIT_8: ID = ID(0xA6);
    pub const LIT_16: ID = ID(0xA7);
    pub const LIT_32: ID = ID(0xA8);
    pub const LIT_64: ID = ID(0xA9);
    pub const LIT_128: ID = ID(0xAA);
    pub const LIT_256: ID = ID(0xAB);

    // -------- 0x100 block.

    pub const EMPTY_STRUCT: ID = ID(0x100);
    pub const BOOL: ID = ID(0x101);

    pub const RECT_IE_U32: ID = ID(0x108);
    pub const RECT_II_U32: ID = ID(0x109);

    pub const IMAGE_BUFFER: ID = ID(0x110);
    pub const IMAGE_CONFIG: ID = ID(0x111);
    pub const IO_READER: ID = ID(0x112);
    pub const IO_WRITER: ID = ID(0x113);
    pub const STATUS: ID = ID(0x114);

    // The generic-placeholder and ideal-type IDs are used by the checker;
    // their string forms are deliberately non-ASCII (where they are not plain
    // names) so no user-defined identifier can collide with them.
    pub const T1: ID = ID(0x11A);
    pub const T2: ID = ID(0x11B);
    pub const DAGGER_1: ID = ID(0x11C);
    pub const DAGGER_2: ID = ID(0x11D);
    pub const PILCROW: ID = ID(0x11E);

    // It is important that IDEAL is right next to the I8..U64 block. See
    // [`ID::is_num_type_or_ideal`].
    pub const IDEAL: ID = ID(0x11F);

    pub const I8: ID = ID(0x120);
    pub const I16: ID = ID(0x121);
    pub const I32: ID = ID(0x122);
    pub const I64: ID = ID(0x123);
    pub const U8: ID = ID(0x124);
    pub const U16: ID = ID(0x125);
    pub const U32: ID = ID(0x126);
    pub const U64: ID = ID(0x127);

    pub const UNDERSCORE: ID = ID(0x130);
    pub const THIS: ID = ID(0x131);
    pub const IN: ID = ID(0x132);
    pub const OUT: ID = ID(0x133);
    pub const BASE: ID = ID(0x134);

    pub const UNREAD_U8: ID = ID(0x140);
    pub const READ_U8: ID = ID(0x141);
    pub const READ_U16BE: ID = ID(0x142);
    pub const READ_U16LE: ID = ID(0x143);
    pub const READ_U24BE: ID = ID(0x144);
    pub const READ_U24LE: ID = ID(0x145);
    pub const READ_U32BE: ID = ID(0x146);
    pub const READ_U32LE: ID = ID(0x147);
    pub const READ_U40BE: ID = ID(0x148);
    pub const READ_U40LE: ID = ID(0x149);
    pub const READ_U48BE: ID = ID(0x14A);
    pub const READ_U48LE: ID = ID(0x14B);
    pub const READ_U56BE: ID = ID(0x14C);
    pub const READ_U56LE: ID = ID(0x14D);
    pub const READ_U64BE: ID = ID(0x14E);
    pub const READ_U64LE: ID = ID(0x14F);

    pub const WRITE_U8: ID = ID(0x161);
    pub const WRITE_U16BE: ID = ID(0x162);
    pub const WRITE_U16LE: ID = ID(0x163);
    pub const WRITE_U24BE: ID = ID(0x164);
    pub const WRITE_U24LE: ID = ID(0x165);
    pub const WRITE_U32BE: ID = ID(0x166);
    pub const WRITE_U32LE: ID = ID(0x167);
    pub const WRITE_U40BE: ID = ID(0x168);
    pub const WRITE_U40LE: ID = ID(0x169);
    pub const WRITE_U48BE: ID = ID(0x16A);
    pub const WRITE_U48LE: ID = ID(0x16B);
    pub const WRITE_U56BE: ID = ID(0x16C);
    pub const WRITE_U56LE: ID = ID(0x16D);
    pub const WRITE_U64BE: ID = ID(0x16E);
    pub const WRITE_U64LE: ID = ID(0x16F);

    pub const SET_LIMIT: ID = ID(0x180);
    pub const SET_MARK: ID = ID(0x181);
    pub const SINCE_MARK: ID = ID(0x182);
    pub const SKIP32: ID = ID(0x183);
    pub const SKIP64: ID = ID(0x184);

    pub const COPY_FROM_HISTORY32: ID = ID(0x190);
    pub const COPY_FROM_READER32: ID = ID(0x191);
    pub const COPY_FROM_SLICE: ID = ID(0x192);
    pub const COPY_FROM_SLICE32: ID = ID(0x193);

    // -------- 0x200 block.

    pub const RESET: ID = ID(0x200);
    pub const SET: ID = ID(0x201);
    pub const UNROLL: ID = ID(0x202);

    pub const SET_MAX_EXCLUSIVE_X: ID = ID(0x210);
    pub const SET_MAX_EXCLUSIVE_Y: ID = ID(0x211);
    pub const SET_MAX_INCLUSIVE_X: ID = ID(0x212);
    pub const SET_MAX_INCLUSIVE_Y: ID = ID(0x213);
    pub const SET_MIN_INCLUSIVE_X: ID = ID(0x214);
    pub const SET_MIN_INCLUSIVE_Y: ID = ID(0x215);

    pub const HIGH_BITS: ID = ID(0x220);
    pub const LOW_BITS: ID = ID(0x221);
    pub const MAX: ID = ID(0x222);
    pub const MIN: ID = ID(0x223);

    pub const IS_ERROR: ID = ID(0x230);
    pub const IS_OK: ID = ID(0x231);
    pub const IS_SUSPENSION: ID = ID(0x232);

    pub const AVAILABLE: ID = ID(0x240);
    pub const HEIGHT: ID = ID(0x241);
    pub const LENGTH: ID = ID(0x242);
    pub const PREFIX: ID = ID(0x243);
    pub const ROW: ID = ID(0x244);
    pub const STRIDE: ID = ID(0x245);
    pub const SUFFIX: ID = ID(0x246);
    pub const WIDTH: ID = ID(0x247);
}

impl ID {
    /// Returns a string form of this ID.
    pub fn str(self, m: &Map) -> &str {
        m.by_id(self)
    }

    fn form(self, table: &'static [ID; N_BUILT_IN_SYMBOLIC_IDS]) -> ID {
        if self.0 as usize >= N_BUILT_IN_SYMBOLIC_IDS {
            return ID::INVALID;
        }
        table[self.0 as usize]
    }

    pub fn ambiguous_form(self) -> ID {
        self.form(&AMBIGUOUS_FORMS)
    }

    pub fn unary_form(self) -> ID {
        self.form(&UNARY_FORMS)
    }

    pub fn binary_form(self) -> ID {
        self.form(&BINARY_FORMS)
    }

    pub fn associative_form(self) -> ID {
        self.form(&ASSOCIATIVE_FORMS)
    }

    pub fn is_built_in(self) -> bool {
        self.0 < N_BUILT_IN_IDS
    }

    pub fn is_unary_op(self) -> bool {
        (MIN_OP..=MAX_OP).contains(&self.0) && self.unary_form() != ID::INVALID
    }

    pub fn is_binary_op(self) -> bool {
        (MIN_OP..=MAX_OP).contains(&self.0) && self.binary_form() != ID::INVALID
    }

    pub fn is_associative_op(self) -> bool {
        (MIN_OP..=MAX_OP).contains(&self.0) && self.associative_form() != ID::INVALID
    }

    pub fn is_literal(self, m: &Map) -> bool {
        if self.is_built_in() {
            return (MIN_BUILT_IN_LITERAL..=MAX_BUILT_IN_LITERAL).contains(&self.0);
        }
        match m.by_id(self).bytes().next() {
            Some(b) => !alpha(b),
            None => false,
        }
    }

    pub fn is_num_literal(self, m: &Map) -> bool {
        if self.is_built_in() {
            return (MIN_BUILT_IN_NUM_LITERAL..=MAX_BUILT_IN_NUM_LITERAL).contains(&self.0);
        }
        match m.by_id(self).bytes().next() {
            Some(b) => numeric(b),
            None => false,
        }
    }

    pub fn is_str_literal(self, m: &Map) -> bool {
        if self.is_built_in() {
            return false;
        }
        m.by_id(self).bytes().next() == Some(b'"')
    }

    pub fn is_ident(self, m: &Map) -> bool {
        if self.is_built_in() {
            return (MIN_BUILT_IN_IDENT..=MAX_BUILT_IN_IDENT).contains(&self.0);
        }
        match m.by_id(self).bytes().next() {
            Some(b) => alpha(b),
            None => false,
        }
    }

    pub fn is_open(self) -> bool {
        flag(self, &IS_OPEN)
    }

    pub fn is_close(self) -> bool {
        flag(self, &IS_CLOSE)
    }

    pub fn is_tight_left(self) -> bool {
        flag(self, &IS_TIGHT_LEFT)
    }

    pub fn is_tight_right(self) -> bool {
        flag(self, &IS_TIGHT_RIGHT)
    }

    pub fn is_assign(self) -> bool {
        (MIN_ASSIGN..=MAX_ASSIGN).contains(&self.0)
    }

    pub fn is_num_type(self) -> bool {
        (MIN_NUM_TYPE..=MAX_NUM_TYPE).contains(&self.0)
    }

    pub fn is_num_type_or_ideal(self) -> bool {
        (MIN_NUM_TYPE_OR_IDEAL..=MAX_NUM_TYPE_OR_IDEAL).contains(&self.0)
    }

    /// Whether a line break after this token should be read as a `;`.
    pub fn is_implicit_semicolon(self, m: &Map) -> bool {
        self.is_literal(m) || self.is_ident(m) || flag(self, &IS_IMPLICIT_SEMICOLON)
    }

    pub fn is_x_op(self) -> bool {
        (MIN_X_OP..=MAX_X_OP).contains(&self.0)
    }

    pub fn is_x_unary_op(self) -> bool {
        self.is_x_op() && self.unary_form() != ID::INVALID
    }

    pub fn is_x_binary_op(self) -> bool {
        self.is_x_op() && self.binary_form() != ID::INVALID
    }

    pub fn is_x_associative_op(self) -> bool {
        self.is_x_op() && self.associative_form() != ID::INVALID
    }

    /// The numeric value of the built-in small-power-of-two literals, or 0
    /// for any other ID.
    pub fn small_power_of_2_value(self) -> u32 {
        match self {
            ID::LIT_1 => 1,
            ID::LIT_2 => 2,
            ID::LIT_4 => 4,
            ID::LIT_8 => 8,
            ID::LIT_16 => 16,
            ID::LIT_32 => 32,
            ID::LIT_64 => 64,
            ID::LIT_128 => 128,
            ID::LIT_256 => 256,
            _ => 0,
        }
    }
}

fn alpha(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn numeric(b: u8) -> bool {
    b.is_ascii_digit()
}

/// A qualified ID, such as `foo.bar`. `QID([foo, bar])`, where the first
/// element may be zero for a plain `bar`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QID(pub [ID; 2]);

impl QID {
    pub fn is_zero(self) -> bool {
        self == QID::default()
    }

    /// Returns a string form of this QID.
    pub fn str(self, m: &Map) -> String {
        let QID([q, n]) = self;
        if q != ID::INVALID {
            return format!("{}.{}", m.by_id(q), m.by_id(n));
        }
        m.by_id(n).to_string()
    }
}

/// A double-qualified ID, such as `receiverPkg.receiverName.funcName`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QQID(pub [ID; 3]);

impl QQID {
    pub fn is_zero(self) -> bool {
        self == QQID::default()
    }

    /// Returns a string form of this QQID.
    pub fn str(self, m: &Map) -> String {
        let QQID([q, r, n]) = self;
        if q != ID::INVALID {
            return format!("{}.{}.{}", m.by_id(q), m.by_id(r), m.by_id(n));
        }
        if r != ID::INVALID {
            return format!("{}.{}", m.by_id(r), m.by_id(n));
        }
        m.by_id(n).to_string()
    }
}

/// An ID combined with the line number it was seen on. Line numbers begin at
/// 1 for diagnostic output.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub id: ID,
    pub line: u32,
}

/// Interning was asked to issue more distinct IDs than fit the ID space.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
#[error("too many distinct tokens")]
pub struct TooManyTokens;

/// The string interning map.
///
/// Built-in names resolve to their fixed IDs; user identifiers are assigned
/// the next free ID (starting at 0x400) on first interning. IDs are stable
/// for the lifetime of a `Map`, and there is no removal.
#[derive(Default)]
pub struct Map {
    by_name: HashMap<String, ID>,
    by_id: Vec<String>,
}

impl Map {
    pub fn new() -> Map {
        Map::default()
    }

    /// Returns the ID for the given name, issuing a new one if the name has
    /// not been seen before. Interning the empty string returns
    /// [`ID::INVALID`].
    pub fn intern(&mut self, name: &str) -> Result<ID, TooManyTokens> {
        if name.is_empty() {
            return Ok(ID::INVALID);
        }
        if let Some(&id) = BUILT_INS_BY_NAME.get(name) {
            return Ok(id);
        }
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        let id = u32::try_from(self.by_id.len())
            .ok()
            .and_then(|n| n.checked_add(N_BUILT_IN_IDS))
            .ok_or(TooManyTokens)?;
        self.by_id.push(name.to_string());
        self.by_name.insert(name.to_string(), ID(id));
        Ok(ID(id))
    }

    /// Returns the string form of the given ID, or `""` if the ID was never
    /// issued.
    pub fn by_id(&self, x: ID) -> &str {
        if x.is_built_in() {
            return BUILT_INS_BY_ID[x.0 as usize];
        }
        self.by_id
            .get((x.0 - N_BUILT_IN_IDS) as usize)
            .map_or("", String::as_str)
    }
}

static BUILT_INS_BY_NAME: phf::Map<&'static str, ID> = phf::phf_map! {
    "(" => ID::OPEN_PAREN,
    ")" => ID::CLOSE_PAREN,
    "[" => ID::OPEN_BRACKET,
    "]" => ID::CLOSE_BRACKET,
    "{" => ID::OPEN_CURLY,
    "}" => ID::CLOSE_CURLY,

    "." => ID::DOT,
    ".." => ID::DOT_DOT,
    "," => ID::COMMA,
    "!" => ID::EXCLAM,
    "?" => ID::QUESTION,
    ":" => ID::COLON,
    ";" => ID::SEMICOLON,
    "$" => ID::DOLLAR,

    "=" => ID::EQ,
    "+=" => ID::PLUS_EQ,
    "-=" => ID::MINUS_EQ,
    "*=" => ID::STAR_EQ,
    "/=" => ID::SLASH_EQ,
    "<<=" => ID::SHIFT_L_EQ,
    ">>=" => ID::SHIFT_R_EQ,
    "&=" => ID::AMP_EQ,
    "|=" => ID::PIPE_EQ,
    "^=" => ID::HAT_EQ,
    "%=" => ID::PERCENT_EQ,
    "~mod+=" => ID::TILDE_MOD_PLUS_EQ,
    "~mod-=" => ID::TILDE_MOD_MINUS_EQ,
    "~sat+=" => ID::TILDE_SAT_PLUS_EQ,
    "~sat-=" => ID::TILDE_SAT_MINUS_EQ,
    "=:" => ID::EQ_COLON,

    "+" => ID::PLUS,
    "-" => ID::MINUS,
    "*" => ID::STAR,
    "/" => ID::SLASH,
    "<<" => ID::SHIFT_L,
    ">>" => ID::SHIFT_R,
    "&" => ID::AMP,
    "|" => ID::PIPE,
    "^" => ID::HAT,
    "%" => ID::PERCENT,
    "~mod+" => ID::TILDE_MOD_PLUS,
    "~mod-" => ID::TILDE_MOD_MINUS,
    "~sat+" => ID::TILDE_SAT_PLUS,
    "~sat-" => ID::TILDE_SAT_MINUS,

    "!=" => ID::NOT_EQ,
    "<" => ID::LESS_THAN,
    "<=" => ID::LESS_EQ,
    "==" => ID::EQ_EQ,
    ">=" => ID::GREATER_EQ,
    ">" => ID::GREATER_THAN,

    "and" => ID::AND,
    "or" => ID::OR,
    "not" => ID::NOT,
    "as" => ID::AS,
    "ref" => ID::REF,
    "deref" => ID::DEREF,

    "func" => ID::FUNC,
    "assert" => ID::ASSERT,
    "while" => ID::WHILE,
    "if" => ID::IF,
    "else" => ID::ELSE,
    "return" => ID::RETURN,
    "break" => ID::BREAK,
    "continue" => ID::CONTINUE,
    "struct" => ID::STRUCT,
    "use" => ID::USE,
    "var" => ID::VAR,
    "pre" => ID::PRE,
    "inv" => ID::INV,
    "post" => ID::POST,
    "via" => ID::VIA,
    "pub" => ID::PUB,
    "pri" => ID::PRI,
    "error" => ID::ERROR,
    "suspension" => ID::SUSPENSION,
    "packageid" => ID::PACKAGE_ID,
    "const" => ID::CONST,
    "try" => ID::TRY,
    "iterate" => ID::ITERATE,
    "yield" => ID::YIELD,
    "io_bind" => ID::IO_BIND,

    "array" => ID::ARRAY,
    "nptr" => ID::NPTR,
    "ptr" => ID::PTR,
    "slice" => ID::SLICE,
    "table" => ID::TABLE,

    "false" => ID::FALSE,
    "true" => ID::TRUE,
    "0" => ID::LIT_0,
    "1" => ID::LIT_1,
    "2" => ID::LIT_2,
    "4" => ID::LIT_4,
    "8" => ID::LIT_8,
    "16" => ID::LIT_16,
    "32" => ID::LIT_32,
    "64" => ID::LIT_64,
    "128" => ID::LIT_128,
    "256" => ID::LIT_256,

    "empty_struct" => ID::EMPTY_STRUCT,
    "bool" => ID::BOOL,

    "rect_ie_u32" => ID::RECT_IE_U32,
    "rect_ii_u32" => ID::RECT_II_U32,

    "image_buffer" => ID::IMAGE_BUFFER,
    "image_config" => ID::IMAGE_CONFIG,
    "io_reader" => ID::IO_READER,
    "io_writer" => ID::IO_WRITER,
    "status" => ID::STATUS,

    "T1" => ID::T1,
    "T2" => ID::T2,
    "†" => ID::DAGGER_1,
    "‡" => ID::DAGGER_2,
    "¶" => ID::PILCROW,
    "ℤ" => ID::IDEAL,

    "i8" => ID::I8,
    "i16" => ID::I16,
    "i32" => ID::I32,
    "i64" => ID::I64,
    "u8" => ID::U8,
    "u16" => ID::U16,
    "u32" => ID::U32,
    "u64" => ID::U64,

    "_" => ID::UNDERSCORE,
    "this" => ID::THIS,
    "in" => ID::IN,
    "out" => ID::OUT,
    "base" => ID::BASE,

    "unread_u8" => ID::UNREAD_U8,
    "read_u8" => ID::READ_U8,
    "read_u16be" => ID::READ_U16BE,
    "read_u16le" => ID::READ_U16LE,
    "read_u24be" => ID::READ_U24BE,
    "read_u24le" => ID::READ_U24LE,
    "read_u32be" => ID::READ_U32BE,
    "read_u32le" => ID::READ_U32LE,
    "read_u40be" => ID::READ_U40BE,
    "read_u40le" => ID::READ_U40LE,
    "read_u48be" => ID::READ_U48BE,
    "read_u48le" => ID::READ_U48LE,
    "read_u56be" => ID::READ_U56BE,
    "read_u56le" => ID::READ_U56LE,
    "read_u64be" => ID::READ_U64BE,
    "read_u64le" => ID::READ_U64LE,

    "write_u8" => ID::WRITE_U8,
    "write_u16be" => ID::WRITE_U16BE,
    "write_u16le" => ID::WRITE_U16LE,
    "write_u24be" => ID::WRITE_U24BE,
    "write_u24le" => ID::WRITE_U24LE,
    "write_u32be" => ID::WRITE_U32BE,
    "write_u32le" => ID::WRITE_U32LE,
    "write_u40be" => ID::WRITE_U40BE,
    "write_u40le" => ID::WRITE_U40LE,
    "write_u48be" => ID::WRITE_U48BE,
    "write_u48le" => ID::WRITE_U48LE,
    "write_u56be" => ID::WRITE_U56BE,
    "write_u56le" => ID::WRITE_U56LE,
    "write_u64be" => ID::WRITE_U64BE,
    "write_u64le" => ID::WRITE_U64LE,

    "set_limit" => ID::SET_LIMIT,
    "set_mark" => ID::SET_MARK,
    "since_mark" => ID::SINCE_MARK,
    "skip32" => ID::SKIP32,
    "skip64" => ID::SKIP64,

    "copy_from_history32" => ID::COPY_FROM_HISTORY32,
    "copy_from_reader32" => ID::COPY_FROM_READER32,
    "copy_from_slice" => ID::COPY_FROM_SLICE,
    "copy_from_slice32" => ID::COPY_FROM_SLICE32,

    "reset" => ID::RESET,
    "set" => ID::SET,
    "unroll" => ID::UNROLL,

    "set_max_exclusive_x" => ID::SET_MAX_EXCLUSIVE_X,
    "set_max_exclusive_y" => ID::SET_MAX_EXCLUSIVE_Y,
    "set_max_inclusive_x" => ID::SET_MAX_INCLUSIVE_X,
    "set_max_inclusive_y" => ID::SET_MAX_INCLUSIVE_Y,
    "set_min_inclusive_x" => ID::SET_MIN_INCLUSIVE_X,
    "set_min_inclusive_y" => ID::SET_MIN_INCLUSIVE_Y,

    "high_bits" => ID::HIGH_BITS,
    "low_bits" => ID::LOW_BITS,
    "max" => ID::MAX,
    "min" => ID::MIN,

    "is_error" => ID::IS_ERROR,
    "is_ok" => ID::IS_OK,
    "is_suspension" => ID::IS_SUSPENSION,

    "available" => ID::AVAILABLE,
    "height" => ID::HEIGHT,
    "length" => ID::LENGTH,
    "prefix" => ID::PREFIX,
    "row" => ID::ROW,
    "stride" => ID::STRIDE,
    "suffix" => ID::SUFFIX,
    "width" => ID::WIDTH,
};

static BUILT_INS_BY_ID: [&str; N_BUILT_IN_IDS as usize] = built_ins_by_id();

const fn built_ins_by_id() -> [&'static str; N_BUILT_IN_IDS as usize] {
    let mut t = [""; N_BUILT_IN_IDS as usize];
    macro_rules! entries {
        ($($id:expr => $name:literal,)*) => {
            $(t[$id.0 as usize] = $name;)*
        };
    }
    entries! {
        ID::OPEN_PAREN => "(",
        ID::CLOSE_PAREN => ")",
        ID::OPEN_BRACKET => "[",
        ID::CLOSE_BRACKET => "]",
        ID::OPEN_CURLY => "{",
        ID::CLOSE_CURLY => "}",

        ID::DOT => ".",
        ID::DOT_DOT => "..",
        ID::COMMA => ",",
        ID::EXCLAM => "!",
        ID::QUESTION => "?",
        ID::COLON => ":",
        ID::SEMICOLON => ";",
        ID::DOLLAR => "$",

        ID::EQ => "=",
        ID::PLUS_EQ => "+=",
        ID::MINUS_EQ => "-=",
        ID::STAR_EQ => "*=",
        ID::SLASH_EQ => "/=",
        ID::SHIFT_L_EQ => "<<=",
        ID::SHIFT_R_EQ => ">>=",
        ID::AMP_EQ => "&=",
        ID::PIPE_EQ => "|=",
        ID::HAT_EQ => "^=",
        ID::PERCENT_EQ => "%=",
        ID::TILDE_MOD_PLUS_EQ => "~mod+=",
        ID::TILDE_MOD_MINUS_EQ => "~mod-=",
        ID::TILDE_SAT_PLUS_EQ => "~sat+=",
        ID::TILDE_SAT_MINUS_EQ => "~sat-=",
        ID::EQ_COLON => "=:",

        ID::PLUS => "+",
        ID::MINUS => "-",
        ID::STAR => "*",
        ID::SLASH => "/",
        ID::SHIFT_L => "<<",
        ID::SHIFT_R => ">>",
        ID::AMP => "&",
        ID::PIPE => "|",
        ID::HAT => "^",
        ID::PERCENT => "%",
        ID::TILDE_MOD_PLUS => "~mod+",
        ID::TILDE_MOD_MINUS => "~mod-",
        ID::TILDE_SAT_PLUS => "~sat+",
        ID::TILDE_SAT_MINUS => "~sat-",

        ID::NOT_EQ => "!=",
        ID::LESS_THAN => "<",
        ID::LESS_EQ => "<=",
        ID::EQ_EQ => "==",
        ID::GREATER_EQ => ">=",
        ID::GREATER_THAN => ">",

        ID::AND => "and",
        ID::OR => "or",
        ID::NOT => "not",
        ID::AS => "as",
        ID::REF => "ref",
        ID::DEREF => "deref",

        ID::FUNC => "func",
        ID::ASSERT => "assert",
        ID::WHILE => "while",
        ID::IF => "if",
        ID::ELSE => "else",
        ID::RETURN => "return",
        ID::BREAK => "break",
        ID::CONTINUE => "continue",
        ID::STRUCT => "struct",
        ID::USE => "use",
        ID::VAR => "var",
        ID::PRE => "pre",
        ID::INV => "inv",
        ID::POST => "post",
        ID::VIA => "via",
        ID::PUB => "pub",
        ID::PRI => "pri",
        ID::ERROR => "error",
        ID::SUSPENSION => "suspension",
        ID::PACKAGE_ID => "packageid",
        ID::CONST => "const",
        ID::TRY => "try",
        ID::ITERATE => "iterate",
        ID::YIELD => "yield",
        ID::IO_BIND => "io_bind",

        ID::ARRAY => "array",
        ID::NPTR => "nptr",
        ID::PTR => "ptr",
        ID::SLICE => "slice",
        ID::TABLE => "table",

        ID::FALSE => "false",
        ID::TRUE => "true",
        ID::LIT_0 => "0",
        ID::LIT_1 => "1",
        ID::LIT_2 => "2",
        ID::LIT_4 => "4",
        ID::LIT_8 => "8",
        ID::LIT_16 => "16",
        ID::LIT_32 => "32",
        ID::LIT_64 => "64",
        ID::LIT_128 => "128",
        ID::LIT_256 => "256",

        ID::EMPTY_STRUCT => "empty_struct",
        ID::BOOL => "bool",

        ID::RECT_IE_U32 => "rect_ie_u32",
        ID::RECT_II_U32 => "rect_ii_u32",

        ID::IMAGE_BUFFER => "image_buffer",
        ID::IMAGE_CONFIG => "image_config",
        ID::IO_READER => "io_reader",
        ID::IO_WRITER => "io_writer",
        ID::STATUS => "status",

        ID::T1 => "T1",
        ID::T2 => "T2",
        ID::DAGGER_1 => "†",
        ID::DAGGER_2 => "‡",
        ID::PILCROW => "¶",
        ID::IDEAL => "ℤ",

        ID::I8 => "i8",
        ID::I16 => "i16",
        ID::I32 => "i32",
        ID::I64 => "i64",
        ID::U8 => "u8",
        ID::U16 => "u16",
        ID::U32 => "u32",
        ID::U64 => "u64",

        ID::UNDERSCORE => "_",
        ID::THIS => "this",
        ID::IN => "in",
        ID::OUT => "out",
        ID::BASE => "base",

        ID::UNREAD_U8 => "unread_u8",
        ID::READ_U8 => "read_u8",
        ID::READ_U16BE => "read_u16be",
        ID::READ_U16LE => "read_u16le",
        ID::READ_U24BE => "read_u24be",
        ID::READ_U24LE => "read_u24le",
        ID::READ_U32BE => "read_u32be",
        ID::READ_U32LE => "read_u32le",
        ID::READ_U40BE => "read_u40be",
        ID::READ_U40LE => "read_u40le",
        ID::READ_U48BE => "read_u48be",
        ID::READ_U48LE => "read_u48le",
        ID::READ_U56BE => "read_u56be",
        ID::READ_U56LE => "read_u56le",
        ID::READ_U64BE => "read_u64be",
        ID::READ_U64LE => "read_u64le",

        ID::WRITE_U8 => "write_u8",
        ID::WRITE_U16BE => "write_u16be",
        ID::WRITE_U16LE => "write_u16le",
        ID::WRITE_U24BE => "write_u24be",
        ID::WRITE_U24LE => "write_u24le",
        ID::WRITE_U32BE => "write_u32be",
        ID::WRITE_U32LE => "write_u32le",
        ID::WRITE_U40BE => "write_u40be",
        ID::WRITE_U40LE => "write_u40le",
        ID::WRITE_U48BE => "write_u48be",
        ID::WRITE_U48LE => "write_u48le",
        ID::WRITE_U56BE => "write_u56be",
        ID::WRITE_U56LE => "write_u56le",
        ID::WRITE_U64BE => "write_u64be",
        ID::WRITE_U64LE => "write_u64le",

        ID::SET_LIMIT => "set_limit",
        ID::SET_MARK => "set_mark",
        ID::SINCE_MARK => "since_mark",
        ID::SKIP32 => "skip32",
        ID::SKIP64 => "skip64",

        ID::COPY_FROM_HISTORY32 => "copy_from_history32",
        ID::COPY_FROM_READER32 => "copy_from_reader32",
        ID::COPY_FROM_SLICE => "copy_from_slice",
        ID::COPY_FROM_SLICE32 => "copy_from_slice32",

        ID::RESET => "reset",
        ID::SET => "set",
        ID::UNROLL => "unroll",

        ID::SET_MAX_EXCLUSIVE_X => "set_max_exclusive_x",
        ID::SET_MAX_EXCLUSIVE_Y => "set_max_exclusive_y",
        ID::SET_MAX_INCLUSIVE_X => "set_max_inclusive_x",
        ID::SET_MAX_INCLUSIVE_Y => "set_max_inclusive_y",
        ID::SET_MIN_INCLUSIVE_X => "set_min_inclusive_x",
        ID::SET_MIN_INCLUSIVE_Y => "set_min_inclusive_y",

        ID::HIGH_BITS => "high_bits",
        ID::LOW_BITS => "low_bits",
        ID::MAX => "max",
        ID::MIN => "min",

        ID::IS_ERROR => "is_error",
        ID::IS_OK => "is_ok",
        ID::IS_SUSPENSION => "is_suspension",

        ID::AVAILABLE => "available",
        ID::HEIGHT => "height",
        ID::LENGTH => "length",
        ID::PREFIX => "prefix",
        ID::ROW => "row",
        ID::STRIDE => "stride",
        ID::SUFFIX => "suffix",
        ID::WIDTH => "width",
    }
    t
}

/// The unambiguous single-byte squiggles. [`ID::INVALID`] for bytes which
/// start a multi-byte squiggle (or no squiggle at all).
fn squiggle(first: u8) -> ID {
    match first {
        b'(' => ID::OPEN_PAREN,
        b')' => ID::CLOSE_PAREN,
        b'[' => ID::OPEN_BRACKET,
        b']' => ID::CLOSE_BRACKET,
        b'{' => ID::OPEN_CURLY,
        b'}' => ID::CLOSE_CURLY,

        b',' => ID::COMMA,
        b'?' => ID::QUESTION,
        b':' => ID::COLON,
        b';' => ID::SEMICOLON,
        b'$' => ID::DOLLAR,

        _ => ID::INVALID,
    }
}

/// The suffix lists for ambiguous 1-byte squiggles. For example, `&` might be
/// the start of `&=`, or stand on its own.
///
/// The order of the elements matters. The first match wins, so to lex
/// greedily, longer suffixes come earlier; an empty suffix, when present, is
/// last and acts as the single-byte fallback.
fn suffix_lexers(first: u8) -> &'static [(&'static str, ID)] {
    match first {
        b'.' => &[(".", ID::DOT_DOT), ("", ID::DOT)],
        b'!' => &[("=", ID::NOT_EQ), ("", ID::EXCLAM)],
        b'&' => &[("=", ID::AMP_EQ), ("", ID::AMP)],
        b'|' => &[("=", ID::PIPE_EQ), ("", ID::PIPE)],
        b'^' => &[("=", ID::HAT_EQ), ("", ID::HAT)],
        b'+' => &[("=", ID::PLUS_EQ), ("", ID::PLUS)],
        b'-' => &[("=", ID::MINUS_EQ), ("", ID::MINUS)],
        b'*' => &[("=", ID::STAR_EQ), ("", ID::STAR)],
        b'/' => &[("=", ID::SLASH_EQ), ("", ID::SLASH)],
        b'%' => &[("=", ID::PERCENT_EQ), ("", ID::PERCENT)],
        b'=' => &[("=", ID::EQ_EQ), (":", ID::EQ_COLON), ("", ID::EQ)],
        b'<' => &[
            ("<=", ID::SHIFT_L_EQ),
            ("<", ID::SHIFT_L),
            ("=", ID::LESS_EQ),
            ("", ID::LESS_THAN),
        ],
        b'>' => &[
            (">=", ID::SHIFT_R_EQ),
            (">", ID::SHIFT_R),
            ("=", ID::GREATER_EQ),
            ("", ID::GREATER_THAN),
        ],
        b'~' => &[
            ("mod+=", ID::TILDE_MOD_PLUS_EQ),
            ("mod+", ID::TILDE_MOD_PLUS),
            ("mod-=", ID::TILDE_MOD_MINUS_EQ),
            ("mod-", ID::TILDE_MOD_MINUS),
            ("sat+=", ID::TILDE_SAT_PLUS_EQ),
            ("sat+", ID::TILDE_SAT_PLUS),
            ("sat-=", ID::TILDE_SAT_MINUS_EQ),
            ("sat-", ID::TILDE_SAT_MINUS),
        ],
        _ => &[],
    }
}

/// Lexes the squiggle token starting at `src[0]`, returning the ID and the
/// number of bytes consumed. Returns `(ID::INVALID, 0)` if `src` does not
/// start with a squiggle.
pub fn next_squiggle(src: &[u8]) -> (ID, usize) {
    let Some(&first) = src.first() else {
        return (ID::INVALID, 0);
    };
    let id = squiggle(first);
    if id != ID::INVALID {
        return (id, 1);
    }
    for &(suffix, id) in suffix_lexers(first) {
        if src[1..].starts_with(suffix.as_bytes()) {
            return (id, 1 + suffix.len());
        }
    }
    (ID::INVALID, 0)
}

/// Completes `table` so that, if `table[x] == y`, then `table[y] == y`.
///
/// For example, for the unary-forms table, the explicit entries are like
/// `PLUS => X_UNARY_PLUS`, and this function adds the implicit fixed point
/// `X_UNARY_PLUS => X_UNARY_PLUS`. This lets "is this ID a legal unary
/// operator?" share a single lookup whether or not the ID was already
/// disambiguated.
const fn close_over_x_forms(
    mut table: [ID; N_BUILT_IN_SYMBOLIC_IDS],
) -> [ID; N_BUILT_IN_SYMBOLIC_IDS] {
    let mut is_x_form = [false; N_BUILT_IN_SYMBOLIC_IDS];
    let mut i = 0;
    while i < N_BUILT_IN_SYMBOLIC_IDS {
        let y = table[i].0 as usize;
        if y != 0 {
            is_x_form[y] = true;
        }
        i += 1;
    }
    let mut y = 0;
    while y < N_BUILT_IN_SYMBOLIC_IDS {
        if is_x_form[y] {
            table[y] = ID(y as u32);
        }
        y += 1;
    }
    table
}

macro_rules! form_table {
    ($($from:expr => $to:expr,)*) => {{
        let mut t = [ID::INVALID; N_BUILT_IN_SYMBOLIC_IDS];
        $(t[$from.0 as usize] = $to;)*
        t
    }};
}

static AMBIGUOUS_FORMS: [ID; N_BUILT_IN_SYMBOLIC_IDS] = form_table! {
    ID::X_UNARY_PLUS => ID::PLUS,
    ID::X_UNARY_MINUS => ID::MINUS,
    ID::X_UNARY_NOT => ID::NOT,
    ID::X_UNARY_REF => ID::REF,
    ID::X_UNARY_DEREF => ID::DEREF,

    ID::X_BINARY_PLUS => ID::PLUS,
    ID::X_BINARY_MINUS => ID::MINUS,
    ID::X_BINARY_STAR => ID::STAR,
    ID::X_BINARY_SLASH => ID::SLASH,
    ID::X_BINARY_SHIFT_L => ID::SHIFT_L,
    ID::X_BINARY_SHIFT_R => ID::SHIFT_R,
    ID::X_BINARY_AMP => ID::AMP,
    ID::X_BINARY_PIPE => ID::PIPE,
    ID::X_BINARY_HAT => ID::HAT,
    ID::X_BINARY_PERCENT => ID::PERCENT,
    ID::X_BINARY_TILDE_MOD_PLUS => ID::TILDE_MOD_PLUS,
    ID::X_BINARY_TILDE_MOD_MINUS => ID::TILDE_MOD_MINUS,
    ID::X_BINARY_TILDE_SAT_PLUS => ID::TILDE_SAT_PLUS,
    ID::X_BINARY_TILDE_SAT_MINUS => ID::TILDE_SAT_MINUS,
    ID::X_BINARY_NOT_EQ => ID::NOT_EQ,
    ID::X_BINARY_LESS_THAN => ID::LESS_THAN,
    ID::X_BINARY_LESS_EQ => ID::LESS_EQ,
    ID::X_BINARY_EQ_EQ => ID::EQ_EQ,
    ID::X_BINARY_GREATER_EQ => ID::GREATER_EQ,
    ID::X_BINARY_GREATER_THAN => ID::GREATER_THAN,
    ID::X_BINARY_AND => ID::AND,
    ID::X_BINARY_OR => ID::OR,
    ID::X_BINARY_AS => ID::AS,

    ID::X_ASSOCIATIVE_PLUS => ID::PLUS,
    ID::X_ASSOCIATIVE_STAR => ID::STAR,
    ID::X_ASSOCIATIVE_AMP => ID::AMP,
    ID::X_ASSOCIATIVE_PIPE => ID::PIPE,
    ID::X_ASSOCIATIVE_HAT => ID::HAT,
    ID::X_ASSOCIATIVE_AND => ID::AND,
    ID::X_ASSOCIATIVE_OR => ID::OR,
};

static UNARY_FORMS: [ID; N_BUILT_IN_SYMBOLIC_IDS] = close_over_x_forms(form_table! {
    ID::PLUS => ID::X_UNARY_PLUS,
    ID::MINUS => ID::X_UNARY_MINUS,
    ID::NOT => ID::X_UNARY_NOT,
    ID::REF => ID::X_UNARY_REF,
    ID::DEREF => ID::X_UNARY_DEREF,
});

static BINARY_FORMS: [ID; N_BUILT_IN_SYMBOLIC_IDS] = close_over_x_forms(form_table! {
    ID::PLUS_EQ => ID::X_BINARY_PLUS,
    ID::MINUS_EQ => ID::X_BINARY_MINUS,
    ID::STAR_EQ => ID::X_BINARY_STAR,
    ID::SLASH_EQ => ID::X_BINARY_SLASH,
    ID::SHIFT_L_EQ => ID::X_BINARY_SHIFT_L,
    ID::SHIFT_R_EQ => ID::X_BINARY_SHIFT_R,
    ID::AMP_EQ => ID::X_BINARY_AMP,
    ID::PIPE_EQ => ID::X_BINARY_PIPE,
    ID::HAT_EQ => ID::X_BINARY_HAT,
    ID::PERCENT_EQ => ID::X_BINARY_PERCENT,
    ID::TILDE_MOD_PLUS_EQ => ID::X_BINARY_TILDE_MOD_PLUS,
    ID::TILDE_MOD_MINUS_EQ => ID::X_BINARY_TILDE_MOD_MINUS,
    ID::TILDE_SAT_PLUS_EQ => ID::X_BINARY_TILDE_SAT_PLUS,
    ID::TILDE_SAT_MINUS_EQ => ID::X_BINARY_TILDE_SAT_MINUS,

    ID::PLUS => ID::X_BINARY_PLUS,
    ID::MINUS => ID::X_BINARY_MINUS,
    ID::STAR => ID::X_BINARY_STAR,
    ID::SLASH => ID::X_BINARY_SLASH,
    ID::SHIFT_L => ID::X_BINARY_SHIFT_L,
    ID::SHIFT_R => ID::X_BINARY_SHIFT_R,
    ID::AMP => ID::X_BINARY_AMP,
    ID::PIPE => ID::X_BINARY_PIPE,
    ID::HAT => ID::X_BINARY_HAT,
    ID::PERCENT => ID::X_BINARY_PERCENT,
    ID::TILDE_MOD_PLUS => ID::X_BINARY_TILDE_MOD_PLUS,
    ID::TILDE_MOD_MINUS => ID::X_BINARY_TILDE_MOD_MINUS,
    ID::TILDE_SAT_PLUS => ID::X_BINARY_TILDE_SAT_PLUS,
    ID::TILDE_SAT_MINUS => ID::X_BINARY_TILDE_SAT_MINUS,

    ID::NOT_EQ => ID::X_BINARY_NOT_EQ,
    ID::LESS_THAN => ID::X_BINARY_LESS_THAN,
    ID::LESS_EQ => ID::X_BINARY_LESS_EQ,
    ID::EQ_EQ => ID::X_BINARY_EQ_EQ,
    ID::GREATER_EQ => ID::X_BINARY_GREATER_EQ,
    ID::GREATER_THAN => ID::X_BINARY_GREATER_THAN,
    ID::AND => ID::X_BINARY_AND,
    ID::OR => ID::X_BINARY_OR,
    ID::AS => ID::X_BINARY_AS,
});

static ASSOCIATIVE_FORMS: [ID; N_BUILT_IN_SYMBOLIC_IDS] = close_over_x_forms(form_table! {
    ID::PLUS => ID::X_ASSOCIATIVE_PLUS,
    ID::STAR => ID::X_ASSOCIATIVE_STAR,
    ID::AMP => ID::X_ASSOCIATIVE_AMP,
    ID::PIPE => ID::X_ASSOCIATIVE_PIPE,
    ID::HAT => ID::X_ASSOCIATIVE_HAT,
    ID::AND => ID::X_ASSOCIATIVE_AND,
    ID::OR => ID::X_ASSOCIATIVE_OR,
});

/// The number of IDs covered by the adjacency-flag tables.
const N_FLAG_IDS: usize = 0x90;

fn flag(x: ID, table: &'static [bool; N_FLAG_IDS]) -> bool {
    (x.0 as usize) < N_FLAG_IDS && table[x.0 as usize]
}

macro_rules! flag_table {
    ($($id:expr,)*) => {{
        let mut t = [false; N_FLAG_IDS];
        $(t[$id.0 as usize] = true;)*
        t
    }};
}

static IS_OPEN: [bool; N_FLAG_IDS] = flag_table! {
    ID::OPEN_PAREN,
    ID::OPEN_BRACKET,
    ID::OPEN_CURLY,
};

static IS_CLOSE: [bool; N_FLAG_IDS] = flag_table! {
    ID::CLOSE_PAREN,
    ID::CLOSE_BRACKET,
    ID::CLOSE_CURLY,
};

static IS_TIGHT_LEFT: [bool; N_FLAG_IDS] = flag_table! {
    ID::CLOSE_PAREN,
    ID::OPEN_BRACKET,
    ID::CLOSE_BRACKET,

    ID::DOT,
    ID::DOT_DOT,
    ID::COMMA,
    ID::EXCLAM,
    ID::QUESTION,
    ID::COLON,
    ID::SEMICOLON,
};

static IS_TIGHT_RIGHT: [bool; N_FLAG_IDS] = flag_table! {
    ID::OPEN_PAREN,
    ID::OPEN_BRACKET,

    ID::DOT,
    ID::DOT_DOT,
    ID::EXCLAM,
    ID::QUESTION,
    ID::COLON,
    ID::DOLLAR,
};

static IS_IMPLICIT_SEMICOLON: [bool; N_FLAG_IDS] = flag_table! {
    ID::CLOSE_PAREN,
    ID::CLOSE_BRACKET,
    ID::CLOSE_CURLY,

    ID::RETURN,
    ID::BREAK,
    ID::CONTINUE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_tables_are_inverses() {
        for (name, &id) in BUILT_INS_BY_NAME.entries() {
            assert_eq!(BUILT_INS_BY_ID[id.0 as usize], *name, "for {id:?}");
        }
        for (i, &name) in BUILT_INS_BY_ID.iter().enumerate() {
            if !name.is_empty() {
                assert_eq!(
                    BUILT_INS_BY_NAME.get(name),
                    Some(&ID(i as u32)),
                    "for {name:?}"
                );
            }
        }
    }

    #[test]
    fn range_partitioning() {
        let m = Map::new();

        assert!(ID::PLUS_EQ.is_assign());
        assert!(ID::SHIFT_L_EQ.is_assign());
        assert!(ID::TILDE_SAT_PLUS_EQ.is_assign());
        assert!(ID::EQ_COLON.is_assign());
        assert!(!ID::PLUS.is_assign());
        assert!(!ID::EQ_EQ.is_assign());

        assert!(ID::U32.is_num_type());
        assert!(ID::I8.is_num_type());
        assert!(!ID::BOOL.is_num_type());
        assert!(ID::IDEAL.is_num_type_or_ideal());
        assert!(!ID::IDEAL.is_num_type());

        assert!(ID::OPEN_PAREN.is_open());
        assert!(ID::OPEN_PAREN.is_tight_right());
        assert!(!ID::OPEN_PAREN.is_tight_left());
        assert!(ID::CLOSE_CURLY.is_close());

        assert!(ID::TRUE.is_literal(&m));
        assert!(ID::LIT_256.is_num_literal(&m));
        assert!(!ID::TRUE.is_num_literal(&m));
        assert!(ID::READ_U32LE.is_ident(&m));
        assert!(!ID::READ_U32LE.is_literal(&m));

        assert!(ID::PLUS.is_unary_op());
        assert!(ID::PLUS.is_binary_op());
        assert!(ID::PLUS.is_associative_op());
        assert!(ID::SLASH.is_binary_op());
        assert!(!ID::SLASH.is_unary_op());
        assert!(!ID::SLASH.is_associative_op());
        assert!(ID::NOT.is_unary_op());
        assert!(ID::AS.is_binary_op());
    }

    #[test]
    fn user_id_classification() {
        let mut m = Map::new();
        let ident = m.intern("foobar").unwrap();
        let num = m.intern("123").unwrap();
        let string = m.intern("\"hello\"").unwrap();

        assert!(ident.is_ident(&m));
        assert!(!ident.is_literal(&m));

        assert!(num.is_literal(&m));
        assert!(num.is_num_literal(&m));
        assert!(!num.is_str_literal(&m));
        assert!(!num.is_ident(&m));

        assert!(string.is_literal(&m));
        assert!(string.is_str_literal(&m));
        assert!(!string.is_num_literal(&m));
    }

    #[test]
    fn implicit_semicolons() {
        let mut m = Map::new();
        let user = m.intern("frame_count").unwrap();

        for id in [
            ID::CLOSE_PAREN,
            ID::CLOSE_BRACKET,
            ID::CLOSE_CURLY,
            ID::RETURN,
            ID::BREAK,
            ID::CONTINUE,
            ID::TRUE,
            ID::LIT_0,
            ID::U8,
            user,
        ] {
            assert!(id.is_implicit_semicolon(&m), "for {id:?}");
        }
        for id in [ID::OPEN_PAREN, ID::COMMA, ID::PLUS, ID::IF, ID::SEMICOLON] {
            assert!(!id.is_implicit_semicolon(&m), "for {id:?}");
        }
    }

    #[test]
    fn form_table_fixed_points() {
        for table in [&UNARY_FORMS, &BINARY_FORMS, &ASSOCIATIVE_FORMS] {
            for &y in table.iter() {
                if y != ID::INVALID {
                    assert_eq!(table[y.0 as usize], y, "fixed point for {y:?}");
                }
            }
        }
    }

    #[test]
    fn form_lookups() {
        assert_eq!(ID::PLUS.unary_form(), ID::X_UNARY_PLUS);
        assert_eq!(ID::PLUS.binary_form(), ID::X_BINARY_PLUS);
        assert_eq!(ID::PLUS.associative_form(), ID::X_ASSOCIATIVE_PLUS);
        assert_eq!(ID::PLUS_EQ.binary_form(), ID::X_BINARY_PLUS);
        assert_eq!(ID::X_BINARY_PLUS.ambiguous_form(), ID::PLUS);
        assert_eq!(ID::X_UNARY_PLUS.ambiguous_form(), ID::PLUS);
        assert_eq!(ID::SLASH.unary_form(), ID::INVALID);
        assert_eq!(ID::FUNC.binary_form(), ID::INVALID);
        assert!(ID::X_BINARY_SHIFT_L.is_x_binary_op());
        assert!(!ID::X_BINARY_SHIFT_L.is_x_unary_op());
        assert!(ID::X_ASSOCIATIVE_AND.is_x_associative_op());
    }

    #[test]
    fn interner_round_trip() {
        let mut m = Map::new();

        let foobar = m.intern("foobar").unwrap();
        assert!(!foobar.is_built_in());
        assert!(foobar.0 >= N_BUILT_IN_IDS);
        assert_eq!(m.intern("foobar").unwrap(), foobar);
        assert_eq!(m.by_id(foobar), "foobar");

        // Built-in names resolve to their fixed IDs.
        assert_eq!(m.intern("func").unwrap(), ID::FUNC);
        assert_eq!(m.intern("<<=").unwrap(), ID::SHIFT_L_EQ);
        assert_eq!(m.intern("u32").unwrap(), ID::U32);

        // Distinct strings get distinct IDs; round-trips hold both ways.
        let other = m.intern("foobaz").unwrap();
        assert_ne!(other, foobar);
        for s in ["foobar", "foobaz", "read_u32le", "+", "iterate"] {
            let id = m.intern(s).unwrap();
            assert_eq!(m.by_id(id), s);
            let name = m.by_id(id).to_string();
            assert_eq!(m.intern(&name).unwrap(), id);
        }

        // Never-issued IDs map to the empty string.
        assert_eq!(m.by_id(ID(0xB7)), "");
        assert_eq!(m.by_id(ID(0x7FFF_FFFF)), "");
        assert_eq!(m.intern("").unwrap(), ID::INVALID);
    }

    #[test]
    fn squiggle_maximal_munch() {
        let cases: &[(&str, ID, usize)] = &[
            ("<<", ID::SHIFT_L, 2),
            ("<<=", ID::SHIFT_L_EQ, 3),
            ("<=", ID::LESS_EQ, 2),
            ("<", ID::LESS_THAN, 1),
            ("<x", ID::LESS_THAN, 1),
            ("<<x", ID::SHIFT_L, 2),
            (">>=", ID::SHIFT_R_EQ, 3),
            ("~sat+=", ID::TILDE_SAT_PLUS_EQ, 6),
            ("~sat+", ID::TILDE_SAT_PLUS, 5),
            ("~mod-", ID::TILDE_MOD_MINUS, 5),
            ("~mod-=", ID::TILDE_MOD_MINUS_EQ, 6),
            ("=:", ID::EQ_COLON, 2),
            ("==", ID::EQ_EQ, 2),
            ("=", ID::EQ, 1),
            ("..", ID::DOT_DOT, 2),
            (".", ID::DOT, 1),
            ("(", ID::OPEN_PAREN, 1),
            ("~", ID::INVALID, 0),
            ("abc", ID::INVALID, 0),
            ("", ID::INVALID, 0),
        ];
        for &(input, want_id, want_len) in cases {
            let (id, len) = next_squiggle(input.as_bytes());
            assert_eq!((id, len), (want_id, want_len), "for input {input:?}");
        }
    }

    #[test]
    fn small_power_of_2_values() {
        assert_eq!(ID::LIT_1.small_power_of_2_value(), 1);
        assert_eq!(ID::LIT_8.small_power_of_2_value(), 8);
        assert_eq!(ID::LIT_256.small_power_of_2_value(), 256);
        assert_eq!(ID::LIT_0.small_power_of_2_value(), 0);
        assert_eq!(ID::U8.small_power_of_2_value(), 0);
    }

    #[test]
    fn qualified_ids() {
        let mut m = Map::new();
        let lzw = m.intern("lzw_decoder").unwrap();
        let decode = m.intern("decode").unwrap();
        let pkg = m.intern("gif").unwrap();

        assert_eq!(QID([ID::INVALID, decode]).str(&m), "decode");
        assert_eq!(QID([pkg, lzw]).str(&m), "gif.lzw_decoder");
        assert!(QID::default().is_zero());

        assert_eq!(QQID([ID::INVALID, ID::INVALID, decode]).str(&m), "decode");
        assert_eq!(
            QQID([ID::INVALID, lzw, decode]).str(&m),
            "lzw_decoder.decode"
        );
        assert_eq!(QQID([pkg, lzw, decode]).str(&m), "gif.lzw_decoder.decode");
        assert!(QQID::default().is_zero());
    }
}
