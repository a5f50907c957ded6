use core::fmt;
use std::collections::HashMap;

use redcode::{
    default_modifiers, AddrMode, CompleteInstruction, Instruction, Modifier,
    Opcode, Warrior, WarriorData,
};

use crate::{
    expr::{self, ExprError},
    graph::{build_reference_graph, graph_contains_cycle},
    lexer::{Token, TokenKind},
    parser::{LineKind, ParsedProgram, SourceLine},
    Dialect,
};

/// An error encountered assembling a single instruction: an unrecognized
/// mnemonic, an address mode invalid for the dialect, or a field that
/// doesn't resolve to a legal operand for the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// The mnemonic is not a valid opcode (optionally `.modifier`-suffixed)
    /// for the active dialect.
    UnknownOpcode {
        /// 1-indexed source line
        line: usize,
        /// the offending mnemonic text
        mnemonic: String,
    },
    /// An explicit address mode character is not a legal `AddrMode` (always
    /// an internal error, since the lexer only emits valid mode characters).
    InvalidAddressMode {
        /// 1-indexed source line
        line: usize,
    },
    /// A `.modifier` suffix, or an address mode combination, is not valid
    /// for this opcode under ICWS'88.
    InvalidModeFor88 {
        /// 1-indexed source line
        line: usize,
        /// the opcode the mode was invalid for
        opcode: Opcode,
    },
    /// `for`/`rof` loop expansion was used; loop pseudo-ops are recognized by
    /// the grammar but not expanded by this compiler.
    UnsupportedLoop {
        /// 1-indexed source line
        line: usize,
    },
    /// The `org`/`end` start expression evaluated outside `[0, code.len()]`.
    InvalidStart {
        /// resolved start value
        value: i64,
        /// number of assembled instructions
        code_len: usize,
    },
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { line, mnemonic } => {
                write!(f, "line {line}: invalid opcode '{mnemonic}'")
            }
            Self::InvalidAddressMode { line } => {
                write!(f, "line {line}: invalid address mode")
            }
            Self::InvalidModeFor88 { line, opcode } => {
                write!(
                    f,
                    "line {line}: invalid address mode for '{opcode}' under \
                     ICWS'88"
                )
            }
            Self::UnsupportedLoop { line } => {
                write!(f, "line {line}: 'for'/'rof' loops are not supported")
            }
            Self::InvalidStart { value, code_len } => {
                write!(
                    f,
                    "start value {value} is outside the assembled program \
                     (length {code_len})"
                )
            }
        }
    }
}

/// `ICWS'88` recognizes 11 opcodes; the remaining 6 (`MUL`, `DIV`, `MOD`
/// being 88-only omissions aside, `SEQ`, `SNE`, `NOP`) don't exist in the
/// dialect.
const OPCODES_88: [Opcode; 11] = [
    Opcode::Dat,
    Opcode::Mov,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Jmp,
    Opcode::Jmz,
    Opcode::Jmn,
    Opcode::Djn,
    Opcode::Cmp,
    Opcode::Slt,
    Opcode::Spl,
];

/// `ICWS'88` recognizes only 4 of the 8 addressing modes.
const MODES_88: [AddrMode; 4] = [
    AddrMode::Immediate,
    AddrMode::Direct,
    AddrMode::IndirectB,
    AddrMode::PredecB,
];

/// Case-insensitively matches `name` against the full set of opcode
/// mnemonics.
fn opcode_from_mnemonic(name: &str) -> Option<Opcode> {
    redcode::test_utils::OPCODES
        .iter()
        .find(|op| op.to_string().eq_ignore_ascii_case(name))
        .copied()
}

/// Case-insensitively matches `name` against the full set of modifier
/// suffixes.
fn modifier_from_suffix(name: &str) -> Option<Modifier> {
    redcode::test_utils::MODIFIERS
        .iter()
        .find(|m| m.to_string().eq_ignore_ascii_case(name))
        .copied()
}

/// Resolves a (possibly `.modifier`-suffixed) mnemonic into an opcode and
/// explicit modifier, validating dialect-specific opcode/mode restrictions.
///
/// `88` mode: the mnemonic never carries a modifier suffix (none is
/// produced by the '88 grammar); the modifier is always inferred from the
/// opcode and resolved address modes, and additionally validated per-opcode
/// (e.g. `DAT` requires both modes be `#` or `<`; the jump family rejects an
/// immediate A-mode).
///
/// `94` mode: an explicit `.modifier` suffix is used if present, otherwise
/// the modifier is inferred the same way as `88`.
fn resolve_op(
    dialect: Dialect,
    line: usize,
    mnemonic: &str,
    a_mode: AddrMode,
    b_mode: AddrMode,
) -> Result<(Opcode, Modifier), AssembleError> {
    let (bare, suffix) = mnemonic.split_once('.').unwrap_or((mnemonic, ""));
    let opcode = opcode_from_mnemonic(bare).ok_or_else(|| {
        AssembleError::UnknownOpcode {
            line,
            mnemonic: mnemonic.to_owned(),
        }
    })?;

    if dialect == Dialect::Icws88 {
        if !OPCODES_88.contains(&opcode) {
            return Err(AssembleError::UnknownOpcode {
                line,
                mnemonic: mnemonic.to_owned(),
            });
        }
        validate_88_modes(line, opcode, a_mode, b_mode)?;
        return Ok((opcode, default_modifiers(opcode, a_mode, b_mode)));
    }

    if suffix.is_empty() {
        return Ok((opcode, default_modifiers(opcode, a_mode, b_mode)));
    }
    let modifier = modifier_from_suffix(suffix).ok_or_else(|| {
        AssembleError::UnknownOpcode {
            line,
            mnemonic: mnemonic.to_owned(),
        }
    })?;
    Ok((opcode, modifier))
}

/// Validates the address-mode restrictions ICWS'88 places on each opcode,
/// beyond the dialect's 4-mode addressing subset (checked separately by the
/// caller resolving each explicit mode character).
fn validate_88_modes(
    line: usize,
    opcode: Opcode,
    a_mode: AddrMode,
    b_mode: AddrMode,
) -> Result<(), AssembleError> {
    let invalid = || AssembleError::InvalidModeFor88 { line, opcode };
    match opcode {
        Opcode::Dat => {
            let ok = |m| m == AddrMode::Immediate || m == AddrMode::PredecB;
            if !ok(a_mode) || !ok(b_mode) {
                return Err(invalid());
            }
        }
        Opcode::Mov | Opcode::Cmp | Opcode::Add | Opcode::Sub | Opcode::Slt => {
            if b_mode == AddrMode::Immediate {
                return Err(invalid());
            }
        }
        Opcode::Jmp | Opcode::Jmn | Opcode::Jmz | Opcode::Djn | Opcode::Spl => {
            if a_mode == AddrMode::Immediate {
                return Err(invalid());
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolves an explicit address mode token (if any) to an `AddrMode`,
/// defaulting to `Direct`, and validating it's a member of the dialect's
/// addressing subset.
fn resolve_mode(
    dialect: Dialect,
    line: usize,
    mode: Option<AddrMode>,
) -> Result<AddrMode, AssembleError> {
    let mode = mode.unwrap_or(AddrMode::Direct);
    if dialect == Dialect::Icws88 && !MODES_88.contains(&mode) {
        return Err(AssembleError::InvalidAddressMode { line });
    }
    Ok(mode)
}

/// `;name`/`;author`/`;strategy` metadata extracted while walking the
/// parsed line list, folded into the same pass as symbol loading rather
/// than a second scan over raw source text.
#[derive(Debug, Clone, Default)]
struct Metadata {
    /// text following the last `;name` comment
    name: Option<String>,
    /// text following the last `;author` comment
    author: Option<String>,
    /// text following every `;strategy` comment, newline-joined
    strategy: Option<String>,
}

/// If `comment`'s text starts with `tag` (case-insensitively), returns the
/// trimmed remainder of the line.
fn tag_value<'a>(comment: &'a str, tag: &str) -> Option<&'a str> {
    let trimmed = comment.trim_start();
    let prefix = trimmed.get(..tag.len())?;
    if !prefix.eq_ignore_ascii_case(tag) {
        return None;
    }
    Some(trimmed[tag.len()..].trim())
}

/// Scans every comment attached to `lines` (standalone or trailing) for
/// `;name`, `;author`, and `;strategy` tags.
fn extract_metadata(lines: &[SourceLine]) -> Metadata {
    let mut metadata = Metadata::default();
    for line in lines {
        let Some(comment) = &line.comment else {
            continue;
        };
        if let Some(v) = tag_value(comment, "name") {
            metadata.name = Some(v.to_owned());
        } else if let Some(v) = tag_value(comment, "author") {
            metadata.author = Some(v.to_owned());
        } else if let Some(v) = tag_value(comment, "strategy") {
            metadata.strategy = Some(match metadata.strategy.take() {
                Some(mut existing) => {
                    existing.push('\n');
                    existing.push_str(v);
                    existing
                }
                None => v.to_owned(),
            });
        }
    }
    metadata
}

/// Holds the symbol tables built by pass 1, ready for pass 2 to resolve
/// instructions against.
struct SymbolTable {
    /// `equ` symbol name to its (unexpanded) token body
    equs: HashMap<String, Vec<Token>>,
    /// label name to the code line it addresses
    labels: HashMap<String, usize>,
    /// the `org`/`end` start expression, defaulting to `0`
    start_expr: Vec<Token>,
}

/// Pass 1: collects `equ` bodies, label addresses, and the start expression.
fn load_symbols(lines: &[SourceLine]) -> SymbolTable {
    let mut equs = HashMap::new();
    let mut labels = HashMap::new();
    let mut start_expr = vec![Token {
        kind: TokenKind::Number(0),
        line: 0,
    }];

    for line in lines {
        if line.kind == Some(LineKind::PseudoOp) {
            let op = line.op.as_deref().unwrap_or_default().to_lowercase();
            match op.as_str() {
                "equ" => {
                    for label in &line.labels {
                        equs.insert(label.clone(), line.a_expr.clone());
                    }
                }
                "org" => start_expr = line.a_expr.clone(),
                "end" => {
                    if !line.a_expr.is_empty() {
                        start_expr = line.a_expr.clone();
                    }
                }
                _ => {}
            }
        }
        if line.kind == Some(LineKind::Instruction) {
            for label in &line.labels {
                labels.insert(label.clone(), line.code_line);
            }
        }
    }

    SymbolTable {
        equs,
        labels,
        start_expr,
    }
}

/// Resolves an operand expression at `current_line` and evaluates it to a
/// field value, reduced into `[0, core_size)`.
fn resolve_field(
    expr_tokens: &[Token],
    symbols: &SymbolTable,
    current_line: usize,
    core_size: u32,
    fallback_line: usize,
) -> Result<u32, ExprError> {
    let substituted = expr::substitute_symbols(
        expr_tokens,
        &symbols.equs,
        &symbols.labels,
        current_line,
        core_size,
    )?;
    let value = expr::evaluate(&substituted, fallback_line)?;
    Ok(redcode::normalize(value, core_size))
}

/// Assembles a single instruction line against pass-1 symbol tables.
fn assemble_line(
    dialect: Dialect,
    core_size: u32,
    symbols: &SymbolTable,
    line: &SourceLine,
) -> Result<CompleteInstruction, CompileError> {
    let mnemonic = line.op.as_deref().unwrap_or_default();

    let mut a_mode =
        resolve_mode(dialect, line.line, line.a_mode).map_err(CompileError::Assemble)?;
    let mut b_mode =
        resolve_mode(dialect, line.line, line.b_mode).map_err(CompileError::Assemble)?;

    let (opcode, modifier) =
        resolve_op(dialect, line.line, mnemonic, a_mode, b_mode)
            .map_err(CompileError::Assemble)?;

    let a_val = resolve_field(
        &line.a_expr,
        symbols,
        line.code_line,
        core_size,
        line.line,
    )
    .map_err(CompileError::Expression)?;

    let (b_mode_final, b_val) = if line.b_expr.is_empty() {
        if opcode == Opcode::Dat {
            // The DAT special rule: a single-operand DAT moves its operand
            // to the B-field and zeroes A to an immediate 0.
            let moved_mode = a_mode;
            let moved_val = a_val;
            a_mode = AddrMode::Immediate;
            (moved_mode, moved_val)
        } else {
            (b_mode, 0)
        }
    } else {
        let b_val = resolve_field(
            &line.b_expr,
            symbols,
            line.code_line,
            core_size,
            line.line,
        )
        .map_err(CompileError::Expression)?;
        (b_mode, b_val)
    };
    b_mode = b_mode_final;

    Ok(CompleteInstruction {
        instr: Instruction {
            opcode,
            modifier,
            a_addr_mode: a_mode,
            b_addr_mode: b_mode,
        },
        a_field: a_val,
        b_field: b_val,
    })
}

/// A compile-time error, tagged with the stage it was produced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The grammar rejected the source (see [`crate::parser::ParseError`])
    Parse(crate::parser::ParseError),
    /// An `equ` symbol's expression referenced itself, directly or
    /// transitively
    Cycle {
        /// the symbol participating in the cycle
        symbol: String,
    },
    /// A symbol expression failed to resolve or evaluate
    Expression(ExprError),
    /// An instruction failed to assemble
    Assemble(AssembleError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Cycle { symbol } => {
                write!(f, "expression '{symbol}' is cyclic")
            }
            Self::Expression(e) => write!(f, "expression error: {e}"),
            Self::Assemble(e) => write!(f, "assemble error: {e}"),
        }
    }
}

/// Compiles an already-parsed program against `core_size` and `dialect`.
///
/// # Errors
///
/// Returns a [`CompileError`] if an `equ` chain is cyclic, an expression
/// fails to resolve or evaluate, or an instruction fails to assemble.
pub fn compile(
    program: &ParsedProgram,
    core_size: u32,
    dialect: Dialect,
) -> Result<WarriorData, CompileError> {
    let symbols = load_symbols(&program.lines);

    let graph = build_reference_graph(&symbols.equs);
    if let Some(symbol) = graph_contains_cycle(&graph) {
        return Err(CompileError::Cycle { symbol });
    }

    let mut code = Vec::new();
    for line in &program.lines {
        if line.kind != Some(LineKind::Instruction) {
            continue;
        }
        code.push(assemble_line(dialect, core_size, &symbols, line)?);
    }

    let start_substituted = expr::substitute_symbols(
        &symbols.start_expr,
        &symbols.equs,
        &symbols.labels,
        0,
        core_size,
    )
    .map_err(CompileError::Expression)?;
    let start_val = expr::evaluate(&start_substituted, 0)
        .map_err(CompileError::Expression)?;
    let start = u32::try_from(start_val)
        .ok()
        .filter(|&start| (start as usize) <= code.len())
        .ok_or(CompileError::Assemble(AssembleError::InvalidStart {
            value: start_val,
            code_len: code.len(),
        }))?;

    let metadata = extract_metadata(&program.lines);

    Ok(WarriorData {
        name: metadata.name.unwrap_or_default(),
        author: metadata.author.unwrap_or_default(),
        strategy: metadata.strategy.unwrap_or_default(),
        warrior: Warrior { code, start },
    })
}
