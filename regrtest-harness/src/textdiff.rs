//! Line-level diffs between expected and actual output.
//!
//! Opcodes come from a longest-matching-block matcher: the longest run of
//! lines common to both sides is found, and the regions on either side of it
//! are matched recursively. Replaced regions are then rendered with a plain
//! line diff.

use std::{collections::HashMap, hash::Hash, io::Write};

use crate::reporting::Painter;

/// Minimum length of the second sequence before popular elements are ignored.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Width of the rule framing a diff report.
const RULE_WIDTH: usize = 70;

/// Classification of one edit operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpTag {
    /// `a[a_start..a_end] == b[b_start..b_end]`.
    Equal,
    /// `a[a_start..a_end]` should be deleted.
    Delete,
    /// `b[b_start..b_end]` should be inserted at `a_start`.
    Insert,
    /// `a[a_start..a_end]` should be replaced by `b[b_start..b_end]`.
    Replace,
}

/// One edit operation between two sequences, as 0-based half-open ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    /// Kind of edit.
    pub tag: OpTag,
    /// Start of the range in the first sequence.
    pub a_start: usize,
    /// End of the range in the first sequence.
    pub a_end: usize,
    /// Start of the range in the second sequence.
    pub b_start: usize,
    /// End of the range in the second sequence.
    pub b_end: usize,
}

/// A run of `len` elements with `a[a..a + len] == b[b..b + len]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Match {
    a: usize,
    b: usize,
    len: usize,
}

/// Finds matching blocks and edit operations between two sequences.
pub struct SequenceMatcher<'a, T> {
    a: &'a [T],
    b: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    /// Indexes `b` for matching against `a`.
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, elt) in b.iter().enumerate() {
            b2j.entry(elt).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let max_occurrences = b.len() / 100 + 1;
            b2j.retain(|_, indices| indices.len() <= max_occurrences);
        }

        Self { a, b, b2j }
    }

    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let mut best = Match {
            a: alo,
            b: blo,
            len: 0,
        };

        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut new_j2len = HashMap::new();
            if let Some(indices) = self.b2j.get(&self.a[i]) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }

                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    new_j2len.insert(j, k);

                    if k > best.len {
                        best = Match {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            j2len = new_j2len;
        }

        // Popular elements never seed a match, but they may extend one.
        while best.a > alo && best.b > blo && self.a[best.a - 1] == self.b[best.b - 1] {
            best.a -= 1;
            best.b -= 1;
            best.len += 1;
        }
        while best.a + best.len < ahi
            && best.b + best.len < bhi
            && self.a[best.a + best.len] == self.b[best.b + best.len]
        {
            best.len += 1;
        }

        best
    }

    fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());

        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = vec![];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.len > 0 {
                blocks.push(m);
                if alo < m.a && blo < m.b {
                    queue.push((alo, m.a, blo, m.b));
                }
                if m.a + m.len < ahi && m.b + m.len < bhi {
                    queue.push((m.a + m.len, ahi, m.b + m.len, bhi));
                }
            }
        }
        blocks.sort();

        let mut merged: Vec<Match> = vec![];
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.a + last.len == block.a && last.b + last.len == block.b => {
                    last.len += block.len;
                }
                _ => merged.push(block),
            }
        }

        merged.push(Match {
            a: la,
            b: lb,
            len: 0,
        });
        merged
    }

    /// Returns the edit operations turning `a` into `b`, covering both fully.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut opcodes = vec![];
        let (mut i, mut j) = (0, 0);

        for m in self.matching_blocks() {
            let tag = match (i < m.a, j < m.b) {
                (true, true) => Some(OpTag::Replace),
                (true, false) => Some(OpTag::Delete),
                (false, true) => Some(OpTag::Insert),
                (false, false) => None,
            };

            if let Some(tag) = tag {
                opcodes.push(Opcode {
                    tag,
                    a_start: i,
                    a_end: m.a,
                    b_start: j,
                    b_end: m.b,
                });
            }

            i = m.a + m.len;
            j = m.b + m.len;

            if m.len > 0 {
                opcodes.push(Opcode {
                    tag: OpTag::Equal,
                    a_start: m.a,
                    a_end: i,
                    b_start: m.b,
                    b_end: j,
                });
            }
        }

        opcodes
    }
}

/// Splits text into lines, keeping each line's terminator.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Returns the line-level edit operations between two texts.
pub fn line_opcodes(expected: &str, actual: &str) -> Vec<Opcode> {
    let a = split_lines(expected);
    let b = split_lines(actual);
    SequenceMatcher::new(&a, &b).opcodes()
}

/// Describes the 0-based half-open range `start..end` as 1-based line numbers.
fn pair(start: usize, end: usize) -> String {
    let first = start + 1;
    if first >= end {
        std::format!("line {first}")
    } else {
        std::format!("lines {first}-{end}")
    }
}

fn write_line(
    writer: &mut impl Write,
    prefix: &str,
    line: &str,
    paint: impl Fn(&str) -> String,
) -> std::io::Result<()> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    writeln!(writer, "{}", paint(&std::format!("{prefix}{line}")))
}

/// Writes a human-readable report of the differences between two texts.
pub fn write_report(
    writer: &mut impl Write,
    expected: &str,
    actual: &str,
    painter: &Painter,
) -> std::io::Result<()> {
    let rule = "*".repeat(RULE_WIDTH);
    let a = split_lines(expected);
    let b = split_lines(actual);

    writeln!(writer, "{rule}")?;

    for op in SequenceMatcher::new(&a, &b).opcodes() {
        match op.tag {
            OpTag::Equal => (),
            OpTag::Delete => {
                writeln!(
                    writer,
                    "*** {} of expected output missing:",
                    pair(op.a_start, op.a_end)
                )?;
                for line in &a[op.a_start..op.a_end] {
                    write_line(writer, "- ", line, |s| painter.removed(s))?;
                }
            }
            OpTag::Replace => {
                writeln!(
                    writer,
                    "*** mismatch between {} of expected output and {} of actual output:",
                    pair(op.a_start, op.a_end),
                    pair(op.b_start, op.b_end)
                )?;
                for d in diff::slice(&a[op.a_start..op.a_end], &b[op.b_start..op.b_end]) {
                    match d {
                        diff::Result::Left(l) => {
                            write_line(writer, "- ", l, |s| painter.removed(s))?;
                        }
                        diff::Result::Both(l, _) => {
                            write_line(writer, "  ", l, |s| painter.unchanged(s))?;
                        }
                        diff::Result::Right(r) => {
                            write_line(writer, "+ ", r, |s| painter.added(s))?;
                        }
                    }
                }
            }
            OpTag::Insert => {
                writeln!(
                    writer,
                    "*** {} of actual output doesn't appear in expected output after line {}:",
                    pair(op.b_start, op.b_end),
                    op.a_end
                )?;
                for line in &b[op.b_start..op.b_end] {
                    write_line(writer, "+ ", line, |s| painter.added(s))?;
                }
            }
        }
    }

    writeln!(writer, "{rule}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn non_equal(expected: &str, actual: &str) -> Vec<Opcode> {
        line_opcodes(expected, actual)
            .into_iter()
            .filter(|op| op.tag != OpTag::Equal)
            .collect()
    }

    fn report(expected: &str, actual: &str) -> Result<String> {
        let mut out = vec![];
        write_report(&mut out, expected, actual, &Painter::plain())?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn single_changed_line_is_one_replace() {
        assert_eq!(
            non_equal("a\nb\nc\n", "a\nx\nc\n"),
            vec![Opcode {
                tag: OpTag::Replace,
                a_start: 1,
                a_end: 2,
                b_start: 1,
                b_end: 2,
            }]
        );
    }

    #[test]
    fn identical_texts_are_all_equal() {
        assert_eq!(non_equal("a\nb\n", "a\nb\n"), vec![]);
        assert_eq!(non_equal("", ""), vec![]);
    }

    #[test]
    fn opcodes_cover_both_sequences() {
        let ops = line_opcodes("a\nb\nc\nd\n", "b\nc\ne\nf\nd\n");

        assert_eq!(ops.first().map(|op| (op.a_start, op.b_start)), Some((0, 0)));
        assert_eq!(ops.last().map(|op| (op.a_end, op.b_end)), Some((4, 5)));
        for pair in ops.windows(2) {
            assert_eq!(pair[0].a_end, pair[1].a_start);
            assert_eq!(pair[0].b_end, pair[1].b_start);
        }
    }

    #[test]
    fn report_for_replace() -> Result<()> {
        let expected = [
            "*".repeat(70).as_str(),
            "*** mismatch between line 2 of expected output and line 2 of actual output:",
            "- b",
            "+ x",
            "*".repeat(70).as_str(),
            "",
        ]
        .join("\n");

        assert_eq!(report("a\nb\nc\n", "a\nx\nc\n")?, expected);
        Ok(())
    }

    #[test]
    fn report_for_delete_and_insert() -> Result<()> {
        let deleted = report("test_a\none\ntwo\n", "test_a\n")?;
        assert!(deleted.contains("*** lines 2-3 of expected output missing:\n- one\n- two\n"));

        let inserted = report("test_a\n", "test_a\nextra\n")?;
        assert!(inserted.contains(
            "*** line 2 of actual output doesn't appear in expected output after line 1:\n+ extra\n"
        ));
        Ok(())
    }

    #[test]
    fn missing_final_newline_still_ends_lines() -> Result<()> {
        let text = report("a\n", "a\nb")?;
        assert!(text.contains("+ b\n"));
        Ok(())
    }
}
