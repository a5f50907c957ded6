// Make clippy as annoying as possible
#![deny(
    // All typically enabled warnings are converted into errors
    // includes correctness, suspicious, style, complexity, and perf
    clippy::all,
    // Error on cargo lints
    clippy::cargo,
)]
#![warn(
    // Warn on pedantic and in-development nursery lints
    clippy::pedantic,
    clippy::nursery,
    // Lints from "restriction" group - enforce a consistent if arbitrary style
    clippy::alloc_instead_of_core,
    clippy::arithmetic_side_effects,
    clippy::unnecessary_cast,
    clippy::as_underscore,
    clippy::assertions_on_result_states,
    clippy::clone_on_ref_ptr,
    clippy::create_dir,
    clippy::dbg_macro,
    clippy::decimal_literal_representation,
    clippy::default_numeric_fallback,
    clippy::deref_by_slicing,
    clippy::empty_drop,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::expect_used,
    clippy::filetype_is_file,
    clippy::float_arithmetic,
    clippy::fn_to_numeric_cast_any,
    clippy::format_push_string,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::large_include_file,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::missing_docs_in_private_items,
    clippy::missing_enforced_import_renames,
    clippy::mixed_read_write_in_expression,
    clippy::mod_module_files,
    clippy::multiple_inherent_impl,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::partial_pub_fields,
    clippy::pattern_type_mismatch,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::unseparated_literal_suffix,
    clippy::shadow_unrelated,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::str_to_string,
    clippy::string_slice,
    clippy::string_to_string,
    clippy::suspicious_xor_used_as_pow,
    clippy::todo,
    clippy::try_err,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unnecessary_safety_comment,
    clippy::unnecessary_safety_doc,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::unreachable,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::verbose_file_reads,
)]
#![allow(
    clippy::needless_pass_by_value,
    reason = "Internal Compiler Error bug workaround: https://github.com/rust-lang/rust-clippy/issues/10344"
)]
// require reason="..." #[allow(...)]
#![feature(lint_reasons)]

//! A two-pass compiler for the redcode assembly language, turning source
//! text into a [`redcode::WarriorData`].
//!
//! Compilation runs in four stages: [`lexer::tokenize`] produces a flat
//! token stream, [`parser::parse`] groups it into [`parser::SourceLine`]s
//! and catches grammar errors, [`graph`] detects `equ` reference cycles
//! before any expression is evaluated, and [`compiler::compile`] resolves
//! every label and `equ` reference and assembles each instruction.

use core::fmt;

use tracing::instrument;

/// Character-by-character tokenization of redcode source text.
pub mod lexer;
pub use lexer::{ExprOp, LexError, Token, TokenKind};

/// Grammar-level grouping of a token stream into source lines.
pub mod parser;
pub use parser::{LineKind, ParseError, ParsedProgram, SourceLine};

/// Detection of cyclic `equ` symbol references.
pub mod graph;

/// Expression substitution and evaluation.
pub mod expr;
pub use expr::ExprError;

/// Two-pass assembly of a parsed program into a compiled warrior.
pub mod compiler;
pub use compiler::{AssembleError, CompileError};

/// Which ICWS standard governs opcode, addressing mode, and modifier
/// validity during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The original 1988 standard: 11 opcodes, 4 address modes, modifiers
    /// are always inferred, never written.
    Icws88,
    /// The 1994 standard: 17 opcodes, 8 address modes, explicit
    /// `.modifier` suffixes with the same inference table as a fallback.
    #[default]
    Icws94,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icws88 => write!(f, "ICWS'88"),
            Self::Icws94 => write!(f, "ICWS'94"),
        }
    }
}

/// A compile-time error tagged with the stage that produced it: lexing,
/// parsing, or assembly (cycle detection and assembly proper are merged
/// into [`CompileError`] already; this wraps that with the lexer's own
/// error type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The lexer rejected the source
    Lex(LexError),
    /// A later stage rejected the source
    Compile(CompileError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Compile(e) => write!(f, "{e}"),
        }
    }
}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

/// Compiles a complete redcode source file into a [`redcode::WarriorData`].
///
/// `core_size` bounds field-value reduction; `dialect` selects which ICWS
/// standard governs opcode, mode, and modifier validity.
///
/// # Errors
///
/// Returns [`Error::Lex`] if an unrecognized character is encountered, or
/// [`Error::Compile`] if the grammar is violated, an `equ` chain is
/// cyclic, an expression fails to resolve or evaluate, or an instruction
/// fails to assemble.
#[instrument(skip(source))]
pub fn compile(
    source: &str,
    core_size: u32,
    dialect: Dialect,
) -> Result<redcode::WarriorData, Error> {
    let tokens = lexer::tokenize(source)?;
    let program =
        parser::parse(&tokens).map_err(CompileError::Parse)?;
    let warrior = compiler::compile(&program, core_size, dialect)?;
    Ok(warrior)
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn compiles_a_minimal_warrior() {
        let warrior =
            compile("MOV.I $0, $1\n", 8000, Dialect::Icws94).unwrap();
        assert_eq!(warrior.warrior.code.len(), 1);
    }

    #[test]
    fn lexical_errors_surface_as_error_lex() {
        let err = compile("MOV $0, $1 ^\n", 8000, Dialect::Icws94)
            .unwrap_err();
        assert!(matches!(err, Error::Lex(_)));
    }

    #[test]
    fn assemble_errors_surface_as_error_compile() {
        let err = compile("BOGUS $0, $1\n", 8000, Dialect::Icws94)
            .unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn dialect_display_names_match_icws_standards() {
        assert_eq!(Dialect::Icws88.to_string(), "ICWS'88");
        assert_eq!(Dialect::Icws94.to_string(), "ICWS'94");
    }
}
