use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::space0,
    combinator::rest,
    error::VerboseError,
    sequence::{pair, preceded},
    IResult,
};

/// Warrior metadata captured from `;name`, `;author`, and `;strategy` comment
/// lines while scanning a loadfile.
///
/// Unlike the instruction grammar, metadata comments may appear anywhere in
/// the file, in any order, and any number of times; the last occurrence of
/// each tag wins.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Metadata {
    /// Text following the last `;name` comment, if any
    pub name: Option<String>,
    /// Text following the last `;author` comment, if any
    pub author: Option<String>,
    /// Text following the last `;strategy` comment, if any. `;strategy` may
    /// appear on multiple lines; each line is appended.
    pub strategy: Option<String>,
}

/// A single recognized metadata tag and its value, parsed from one comment
/// line's content (the text following the leading `;`).
enum Tag {
    /// `;name VALUE`
    Name(String),
    /// `;author VALUE`
    Author(String),
    /// `;strategy VALUE`
    Strategy(String),
}

/// Parses the content of a single comment line (without the leading `;`) for
/// a `name`, `author`, or `strategy` tag.
fn tag_line(input: &str) -> IResult<&str, Tag, VerboseError<&str>> {
    let name_tag = pair(tag_no_case("name"), preceded(space0, rest));
    let author_tag = pair(tag_no_case("author"), preceded(space0, rest));
    let strategy_tag = pair(tag_no_case("strategy"), preceded(space0, rest));
    alt((
        nom::combinator::map(name_tag, |(_, v): (&str, &str)| {
            Tag::Name(v.trim_end().to_owned())
        }),
        nom::combinator::map(author_tag, |(_, v): (&str, &str)| {
            Tag::Author(v.trim_end().to_owned())
        }),
        nom::combinator::map(strategy_tag, |(_, v): (&str, &str)| {
            Tag::Strategy(v.trim_end().to_owned())
        }),
    ))(input.trim_start())
}

/// Extracts `;name`, `;author`, and `;strategy` metadata from the comment
/// lines of a loadfile or redcode source file.
///
/// This scans every line independently; it does not need to share a parse
/// pass with [`crate::parse`] and tolerates lines that `parse` would reject
/// (e.g. lines after `END`, or non-comment lines, which are simply skipped).
/// Leading whitespace before the `;` is ignored. Only comment lines matching
/// one of the three recognized tags contribute; any other comment is
/// ignored.
#[must_use]
pub fn parse_metadata(input: &str) -> Metadata {
    let mut metadata = Metadata::default();
    for line in input.lines() {
        let Some(comment) = line.trim_start().strip_prefix(';') else {
            continue;
        };
        let Ok((_, tag)) = tag_line(comment) else {
            continue;
        };
        match tag {
            Tag::Name(v) => metadata.name = Some(v),
            Tag::Author(v) => metadata.author = Some(v),
            Tag::Strategy(v) => {
                metadata.strategy = Some(match metadata.strategy.take() {
                    Some(mut existing) => {
                        existing.push('\n');
                        existing.push_str(&v);
                        existing
                    }
                    None => v,
                });
            }
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn extracts_all_three_tags() {
        let src = ";name Imp\n;author A. K. Dewdney\nMOV.I $0, $1\n;strategy \
                   copies itself forward\nEND\n";
        let meta = parse_metadata(src);
        assert_eq!(meta.name.as_deref(), Some("Imp"));
        assert_eq!(meta.author.as_deref(), Some("A. K. Dewdney"));
        assert_eq!(
            meta.strategy.as_deref(),
            Some("copies itself forward")
        );
    }

    #[test]
    fn last_occurrence_of_name_wins() {
        let src = ";name first\n;name second\n";
        let meta = parse_metadata(src);
        assert_eq!(meta.name.as_deref(), Some("second"));
    }

    #[test]
    fn multiple_strategy_lines_are_joined() {
        let src = ";strategy line one\n;strategy line two\n";
        let meta = parse_metadata(src);
        assert_eq!(meta.strategy.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn unrecognized_comments_are_ignored() {
        let src = "; just a comment\nMOV.I $0, $1\n";
        let meta = parse_metadata(src);
        assert_eq!(meta, Metadata::default());
    }

    #[test]
    fn indented_tag_is_still_recognized() {
        let meta = parse_metadata("   ;name Indented\n");
        assert_eq!(meta.name.as_deref(), Some("Indented"));
    }
}
