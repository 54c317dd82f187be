//! Unified diff generation and HTML rendering

use similar::TextDiff;
use std::fmt::Write as _;

/// HTML layout of a rendered diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    SideBySide,
    LineByLine,
}

/// Produces unified diffs and turns them into HTML
pub trait DiffRenderer: Send + Sync {
    /// Full-context unified diff of two texts
    fn unified_diff(&self, old_name: &str, new_name: &str, old: &str, new: &str) -> String {
        unified_diff(old_name, new_name, old, new)
    }

    fn render(&self, unified_diff: &str, format: OutputFormat) -> String;
}

/// Unified diff of two texts with whole-file context.
///
/// The context radius exceeds both line counts so every line of both files
/// ends up in a single hunk.
pub fn unified_diff(old_name: &str, new_name: &str, old: &str, new: &str) -> String {
    let radius = old.lines().count().max(new.lines().count()) + 1;
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(radius)
        .header(old_name, new_name)
        .to_string()
}

/// One body line of a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
enum DiffLine<'a> {
    Context { old_no: usize, new_no: usize, text: &'a str },
    Deleted { old_no: usize, text: &'a str },
    Inserted { new_no: usize, text: &'a str },
}

/// Parse the body lines of a unified diff, numbering both sides
fn parse_unified(unified_diff: &str) -> Vec<DiffLine<'_>> {
    let mut lines = Vec::new();
    let (mut old_no, mut new_no) = (0usize, 0usize);
    let mut in_hunk = false;

    for line in unified_diff.lines() {
        if let Some(header) = line.strip_prefix("@@") {
            if let Some((old_start, new_start)) = parse_hunk_header(header) {
                old_no = old_start;
                new_no = new_start;
            }
            in_hunk = true;
            continue;
        }
        // `---`/`+++` file headers; inside a hunk they are content
        if !in_hunk {
            continue;
        }
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        }

        if let Some(text) = line.strip_prefix('-') {
            lines.push(DiffLine::Deleted { old_no, text });
            old_no += 1;
        } else if let Some(text) = line.strip_prefix('+') {
            lines.push(DiffLine::Inserted { new_no, text });
            new_no += 1;
        } else {
            let text = line.strip_prefix(' ').unwrap_or(line);
            lines.push(DiffLine::Context { old_no, new_no, text });
            old_no += 1;
            new_no += 1;
        }
    }

    lines
}

/// `-a,b +c,d @@` -> (a, c), with empty ranges starting at 0 mapped to 1
fn parse_hunk_header(header: &str) -> Option<(usize, usize)> {
    let mut parts = header.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let start = |range: &str| -> Option<usize> {
        let n: usize = range.split(',').next()?.parse().ok()?;
        Some(n.max(1))
    };
    Some((start(old)?, start(new)?))
}

/// Self-contained HTML tables in the `d2h-*` class vocabulary
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDiffRenderer;

impl HtmlDiffRenderer {
    fn line_by_line(&self, lines: &[DiffLine<'_>]) -> String {
        let mut html = String::from("<table class=\"d2h-diff-table d2h-line-by-line\"><tbody>");
        for line in lines {
            let (class, old_no, new_no, prefix, text) = match line {
                DiffLine::Context { old_no, new_no, text } => {
                    ("d2h-cntx", Some(*old_no), Some(*new_no), " ", *text)
                }
                DiffLine::Deleted { old_no, text } => ("d2h-del", Some(*old_no), None, "-", *text),
                DiffLine::Inserted { new_no, text } => ("d2h-ins", None, Some(*new_no), "+", *text),
            };
            let _ = write!(
                html,
                "<tr class=\"{}\"><td class=\"d2h-num\">{}</td><td class=\"d2h-num\">{}</td><td class=\"d2h-code\">{}{}</td></tr>",
                class,
                number(old_no),
                number(new_no),
                prefix,
                escape_html(text)
            );
        }
        html.push_str("</tbody></table>");
        html
    }

    fn side_by_side(&self, lines: &[DiffLine<'_>]) -> String {
        let mut html = String::from("<table class=\"d2h-diff-table d2h-side-by-side\"><tbody>");
        let mut i = 0;
        while i < lines.len() {
            if let DiffLine::Context { old_no, new_no, text } = &lines[i] {
                let cell = escape_html(text);
                let _ = write!(
                    html,
                    "<tr class=\"d2h-cntx\"><td class=\"d2h-num\">{}</td><td class=\"d2h-code\">{}</td><td class=\"d2h-num\">{}</td><td class=\"d2h-code\">{}</td></tr>",
                    old_no, cell, new_no, cell
                );
                i += 1;
                continue;
            }

            // A change block: consecutive deletions then insertions, paired row by row
            let mut deleted = Vec::new();
            while let Some(DiffLine::Deleted { old_no, text }) = lines.get(i) {
                deleted.push((*old_no, *text));
                i += 1;
            }
            let mut inserted = Vec::new();
            while let Some(DiffLine::Inserted { new_no, text }) = lines.get(i) {
                inserted.push((*new_no, *text));
                i += 1;
            }

            for row in 0..deleted.len().max(inserted.len()) {
                let left = deleted.get(row);
                let right = inserted.get(row);
                let _ = write!(
                    html,
                    "<tr><td class=\"d2h-num\">{}</td><td class=\"d2h-code {}\">{}</td><td class=\"d2h-num\">{}</td><td class=\"d2h-code {}\">{}</td></tr>",
                    number(left.map(|(n, _)| *n)),
                    if left.is_some() { "d2h-del" } else { "d2h-emptyplaceholder" },
                    left.map(|(_, t)| escape_html(t)).unwrap_or_default(),
                    number(right.map(|(n, _)| *n)),
                    if right.is_some() { "d2h-ins" } else { "d2h-emptyplaceholder" },
                    right.map(|(_, t)| escape_html(t)).unwrap_or_default(),
                );
            }
        }
        html.push_str("</tbody></table>");
        html
    }
}

impl DiffRenderer for HtmlDiffRenderer {
    fn render(&self, unified_diff: &str, format: OutputFormat) -> String {
        let lines = parse_unified(unified_diff);
        match format {
            OutputFormat::SideBySide => self.side_by_side(&lines),
            OutputFormat::LineByLine => self.line_by_line(&lines),
        }
    }
}

fn number(n: Option<usize>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}

/// Escape text for HTML element content and attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_has_full_context() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let new = "a\nb\nc\nd\ne\nf\ng\nH\n";
        let diff = unified_diff("X.sol", "X.sol", old, new);

        assert!(diff.starts_with("--- X.sol\n+++ X.sol\n"));
        assert_eq!(diff.matches("@@").count(), 2, "single hunk expected");
        // The first line is far from the change but still present as context
        assert!(diff.lines().any(|l| l == " a"));
        assert!(diff.lines().any(|l| l == "-h"));
        assert!(diff.lines().any(|l| l == "+H"));
    }

    #[test]
    fn test_identical_texts_produce_no_hunks() {
        let diff = unified_diff("A", "A", "same\n", "same\n");
        assert!(!diff.contains("@@"));
    }

    #[test]
    fn test_parse_numbers_lines() {
        let diff = unified_diff("A", "A", "one\ntwo\n", "one\n2\n");
        let lines = parse_unified(&diff);
        assert_eq!(
            lines,
            vec![
                DiffLine::Context { old_no: 1, new_no: 1, text: "one" },
                DiffLine::Deleted { old_no: 2, text: "two" },
                DiffLine::Inserted { new_no: 2, text: "2" },
            ]
        );
    }

    #[test]
    fn test_added_file_numbers_from_one() {
        let diff = unified_diff("A", "A", "", "x\ny\n");
        let lines = parse_unified(&diff);
        assert_eq!(lines[0], DiffLine::Inserted { new_no: 1, text: "x" });
        assert_eq!(lines[1], DiffLine::Inserted { new_no: 2, text: "y" });
    }

    #[test]
    fn test_dash_and_plus_content_lines_kept() {
        let diff = unified_diff("A", "A", "uint i;\n--x;\n", "uint i;\n++i;\n");
        let lines = parse_unified(&diff);
        assert_eq!(
            lines,
            vec![
                DiffLine::Context { old_no: 1, new_no: 1, text: "uint i;" },
                DiffLine::Deleted { old_no: 2, text: "--x;" },
                DiffLine::Inserted { new_no: 2, text: "++i;" },
            ]
        );

        let html = HtmlDiffRenderer.render(&diff, OutputFormat::LineByLine);
        assert!(html.contains("++i;"));
        assert!(html.contains("--x;"));
    }

    #[test]
    fn test_html_is_escaped() {
        let diff = unified_diff("A", "A", "a < b\n", "a > b && c\n");
        let html = HtmlDiffRenderer.render(&diff, OutputFormat::LineByLine);
        assert!(html.contains("a &lt; b"));
        assert!(html.contains("a &gt; b &amp;&amp; c"));
        assert!(!html.contains("a < b"));
    }

    #[test]
    fn test_side_by_side_pairs_changes() {
        let diff = unified_diff("A", "A", "keep\nold\n", "keep\nnew\nextra\n");
        let html = HtmlDiffRenderer.render(&diff, OutputFormat::SideBySide);
        assert!(html.contains("d2h-side-by-side"));
        assert!(html.contains("d2h-del\">old"));
        assert!(html.contains("d2h-ins\">new"));
        // Unpaired insertion gets an empty left cell
        assert!(html.contains("d2h-emptyplaceholder"));
    }
}
