/// The token layer: dense numeric token IDs, the string interning map, the
/// greedy punctuation lexer tables and the operator-form disambiguation
/// tables.
pub mod token;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The typed AST the code generator consumes, plus structural equality over
/// expressions and type expressions.
pub mod ast;

/// The coroutine-lowering code generator: takes a checked AST, producing C
/// source text.
pub mod codegen;
