//! The round-trip law of §8: compiling a '94 source warrior, rendering its
//! assembled code back out as loadfile syntax, and re-parsing that loadfile
//! yields the same instruction vector the compiler produced.

use coverage_helper::test;
use redcode_compiler::{compile, Dialect};
use redcode_parser::{parse_warrior_data, ParseOptions};

const CORE_SIZE: u32 = 8000;

fn render_as_loadfile(code: &[redcode::CompleteInstruction]) -> String {
    let mut out = String::new();
    for instr in code {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out.push_str("end 0\n");
    out
}

fn assert_round_trips(source: &str) {
    let compiled = compile(source, CORE_SIZE, Dialect::Icws94).unwrap();
    let rendered = render_as_loadfile(&compiled.warrior.code);
    let reparsed = parse_warrior_data(
        &rendered,
        ParseOptions::ICWS_94_OPTIONS,
        CORE_SIZE,
    )
    .unwrap();
    assert_eq!(reparsed.warrior.code, compiled.warrior.code);
}

#[test]
fn imp_round_trips_through_loadfile_syntax() {
    assert_round_trips("MOV.I $0, $1\nend 0\n");
}

#[test]
fn dwarf_round_trips_through_loadfile_syntax() {
    assert_round_trips(
        "ADD.AB #4, $3\nMOV.I $2, @2\nJMP.A $-2, $0\nDAT.F #0, #0\nend 0\n",
    );
}

#[test]
fn a_warrior_using_every_addressing_mode_round_trips() {
    assert_round_trips(
        "MOV.I #1, $1\n\
         MOV.I *1, @1\n\
         MOV.I {1, <1\n\
         MOV.I }1, >1\n\
         end 0\n",
    );
}
