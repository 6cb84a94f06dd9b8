/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Serialize a document back to WCL text.

use crate::document::Document;
use crate::value::{Node, Section};
use std::io;

/// Section whose entries are never reordered: argument order matters there.
const UNSORTED_SECTION: &str = "cmdline";

/// Render `doc` as WCL text.
///
/// With `sort`, entries are written in key order, except inside `cmdline`
/// sections which keep their insertion order. Each nesting level is
/// indented by `indent` spaces.
pub fn serialize(doc: &Document, sort: bool, indent: usize) -> String {
    let mut out = String::new();
    write_section(&mut out, doc.root(), sort, indent, 0);
    out
}

/// Write `doc` as WCL text to `writer`.
pub fn write_to<W: io::Write>(
    writer: &mut W,
    doc: &Document,
    sort: bool,
    indent: usize,
) -> io::Result<()> {
    writer.write_all(serialize(doc, sort, indent).as_bytes())
}

fn write_section(out: &mut String, section: &Section, sort: bool, indent: usize, level: usize) {
    let pad = " ".repeat(indent * level);
    let mut entries: Vec<(&String, &Node)> = section.iter().collect();
    if sort {
        entries.sort_by(|a, b| a.0.cmp(b.0));
    }

    for (key, node) in entries {
        match node {
            Node::Scalar(value) => {
                out.push_str(&format!("{}{} = {}\n", pad, key, value.replace('#', "\\#")));
            }
            Node::Section(child) => {
                out.push_str(&format!("{}<{}>\n", pad, key));
                let sort_child = sort && key != UNSORTED_SECTION;
                write_section(out, child, sort_child, indent, level + 1);
                out.push_str(&format!("{}</{}>\n", pad, key));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    const JOB: &str = "\
zeta = 1
<module>
    <exec_1>
        execname = coadd
        <cmdline>
            Zfile = out.fits
            -V = 1
        </cmdline>
    </exec_1>
    <empty>
    </empty>
</module>
alpha = 2 \\# not a comment
";

    #[test]
    fn test_serialize_keeps_order() {
        let doc = parse(JOB).unwrap();
        insta::assert_snapshot!(
            serialize(&doc, false, 2).lines().next().unwrap_or_default(),
            @"zeta = 1"
        );
        let text = serialize(&doc, false, 2);
        assert!(text.contains("  <exec_1>\n    execname = coadd\n"));
        assert!(text.contains("  <empty>\n  </empty>\n"));
        assert!(text.ends_with("alpha = 2 \\# not a comment\n"));
    }

    #[test]
    fn test_sort_skips_cmdline() {
        let doc = parse(JOB).unwrap();
        let text = serialize(&doc, true, 4);
        let expected = "\
alpha = 2 \\# not a comment
<module>
    <empty>
    </empty>
    <exec_1>
        <cmdline>
            Zfile = out.fits
            -V = 1
        </cmdline>
        execname = coadd
    </exec_1>
</module>
zeta = 1
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_round_trip() {
        let doc = parse(JOB).unwrap();
        for sort in [false, true] {
            let reparsed = parse(&serialize(&doc, sort, 3)).unwrap();
            assert_eq!(reparsed, doc);
        }
    }

    #[test]
    fn test_write_to() {
        let doc = parse("a = 1\n").unwrap();
        let mut buf = Vec::new();
        write_to(&mut buf, &doc, false, 4).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a = 1\n");
    }
}
