use std::borrow::Cow;
use std::io::{self, Write};

use report::{FeedbackList, ReportSet};
use tracing::debug;

/// Line-oriented text sink.
pub trait Output {
    /// Writes `line` followed by a newline.
    fn writeln(&mut self, line: &str) -> io::Result<()>;
}

impl<O: Output + ?Sized> Output for &mut O {
    fn writeln(&mut self, line: &str) -> io::Result<()> {
        (**self).writeln(line)
    }
}

/// Forwards lines to any `io::Write`, e.g. a locked stdout.
pub struct WriterOutput<W: Write> {
    writer: W,
}

impl<W: Write> WriterOutput<W> {
    pub fn new(writer: W) -> Self {
        WriterOutput { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Output for WriterOutput<W> {
    fn writeln(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)
    }
}

/// Keeps every written line in memory.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    lines: Vec<String>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined, each terminated by a newline.
    pub fn contents(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }
}

impl Output for BufferedOutput {
    fn writeln(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_owned());
        Ok(())
    }
}

/// Prints feedback per file, folding runs of lines with identical feedback
/// into a single "also occurs on lines" notice.
pub struct TerminalPrinter<O: Output> {
    output: O,
    base_path: String,
}

impl<O: Output> TerminalPrinter<O> {
    pub fn new(output: O, base_path: impl Into<String>) -> Self {
        TerminalPrinter {
            output,
            base_path: base_path.into(),
        }
    }

    pub fn into_output(self) -> O {
        self.output
    }

    pub fn print(&mut self, reports: &ReportSet) -> io::Result<()> {
        let path_offset = self.base_path.len() + 1;

        for (path, report) in reports.iter() {
            let Some(report) = report.filter(|report| !report.is_empty()) else {
                debug!(path, "no feedback, skipping");
                continue;
            };
            debug!(path, lines = report.len(), "printing feedback");

            self.output.writeln(&strip_leading(path, path_offset))?;

            let mut previous: Option<&FeedbackList> = None;
            let mut same_error_lines: Vec<u32> = Vec::new();

            for (line, feedback) in report.iter() {
                if previous == Some(feedback) {
                    same_error_lines.push(line);
                    continue;
                }

                if !same_error_lines.is_empty() {
                    self.output.writeln("")?;
                    self.write_repeated_lines(&same_error_lines)?;
                    self.output.writeln("")?;
                }

                self.output.writeln(&format!("  line {}:", line))?;
                self.write_feedback(feedback)?;

                previous = Some(feedback);
                same_error_lines.clear();
            }

            if !same_error_lines.is_empty() {
                self.output.writeln("")?;
                self.write_repeated_lines(&same_error_lines)?;
            }

            self.output.writeln("")?;
        }

        Ok(())
    }

    fn write_feedback(&mut self, feedback: &FeedbackList) -> io::Result<()> {
        // An empty list still renders its bullet, as the joined form would.
        if feedback.is_empty() {
            return self.output.writeln("    - .");
        }
        for message in feedback.messages() {
            self.output.writeln(&format!("    - {}.", message))?;
        }
        Ok(())
    }

    fn write_repeated_lines(&mut self, lines: &[u32]) -> io::Result<()> {
        let lines = lines
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.output.writeln(&format!(
            "  ... the previous set of errors also occurs on lines: {}",
            lines
        ))
    }
}

/// Drops the first `count` bytes of `path` without checking what they are.
fn strip_leading(path: &str, count: usize) -> Cow<'_, str> {
    match path.get(count..) {
        Some(rest) => Cow::Borrowed(rest),
        None if count >= path.len() => Cow::Borrowed(""),
        None => String::from_utf8_lossy(&path.as_bytes()[count..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use report::FileReport;

    fn feedback(messages: &[&str]) -> FeedbackList {
        messages.iter().copied().collect()
    }

    fn render(base_path: &str, reports: &ReportSet) -> String {
        let mut printer = TerminalPrinter::new(BufferedOutput::new(), base_path);
        printer.print(reports).unwrap();
        printer.into_output().contents()
    }

    #[test]
    fn empty_report_set_writes_nothing() {
        assert_eq!(render("/base", &ReportSet::new()), "");
    }

    #[test]
    fn empty_or_absent_reports_are_skipped() {
        let mut reports = ReportSet::new();
        reports.insert("/base/empty.feature", FileReport::new());
        reports.insert_absent("/base/absent.feature");
        assert_eq!(render("/base", &reports), "");
    }

    #[test]
    fn single_line_block() {
        let reports: ReportSet = [(
            "/base/login.feature",
            [(4, feedback(&["Missing tag", "Trailing whitespace"]))]
                .into_iter()
                .collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        assert_eq!(
            render("/base", &reports),
            "login.feature\n\
             \x20 line 4:\n\
             \x20   - Missing tag.\n\
             \x20   - Trailing whitespace.\n\
             \n"
        );
    }

    #[test]
    fn identical_consecutive_lines_are_grouped() {
        let same = feedback(&["Empty step"]);
        let reports: ReportSet = [(
            "/base/cart.feature",
            [
                (1, same.clone()),
                (2, same.clone()),
                (3, same),
                (4, feedback(&["Bad indentation"])),
            ]
            .into_iter()
            .collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        let mut printer = TerminalPrinter::new(BufferedOutput::new(), "/base");
        printer.print(&reports).unwrap();
        let output = printer.into_output();
        assert_eq!(
            output.lines(),
            [
                "cart.feature",
                "  line 1:",
                "    - Empty step.",
                "",
                "  ... the previous set of errors also occurs on lines: 2, 3",
                "",
                "  line 4:",
                "    - Bad indentation.",
                "",
            ]
        );
    }

    #[test]
    fn trailing_group_is_flushed_before_file_ends() {
        let same = feedback(&["Empty step"]);
        let reports: ReportSet = [(
            "/base/cart.feature",
            [(5, same.clone()), (9, same)].into_iter().collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        let mut printer = TerminalPrinter::new(BufferedOutput::new(), "/base");
        printer.print(&reports).unwrap();
        let output = printer.into_output();
        assert_eq!(
            output.lines(),
            [
                "cart.feature",
                "  line 5:",
                "    - Empty step.",
                "",
                "  ... the previous set of errors also occurs on lines: 9",
                "",
            ]
        );
    }

    #[test]
    fn reordered_messages_are_not_grouped() {
        let reports: ReportSet = [(
            "/base/a.feature",
            [(1, feedback(&["x", "y"])), (2, feedback(&["y", "x"]))]
                .into_iter()
                .collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        let output = render("/base", &reports);
        assert!(!output.contains("also occurs"));
        assert!(output.contains("  line 2:\n    - y.\n    - x.\n"));
    }

    #[test]
    fn grouping_resets_per_file() {
        let same = feedback(&["Empty step"]);
        let reports: ReportSet = [
            ("/base/a.feature", [(1, same.clone())].into_iter().collect::<FileReport>()),
            ("/base/b.feature", [(1, same)].into_iter().collect::<FileReport>()),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            render("/base", &reports),
            "a.feature\n  line 1:\n    - Empty step.\n\n\
             b.feature\n  line 1:\n    - Empty step.\n\n"
        );
    }

    #[test]
    fn path_strip_counts_bytes_not_prefix() {
        let one_line = || [(1, feedback(&["x"]))].into_iter().collect::<FileReport>();
        let reports: ReportSet = [
            ("/elsewhere/a.feature", one_line()),
            ("/b", one_line()),
        ]
        .into_iter()
        .collect();

        let mut printer = TerminalPrinter::new(BufferedOutput::new(), "/base");
        printer.print(&reports).unwrap();
        let output = printer.into_output();
        assert_eq!(output.lines()[0], "here/a.feature");
        assert_eq!(output.lines()[4], "");
    }

    #[test]
    fn empty_feedback_list_keeps_its_bullet() {
        let reports: ReportSet = [(
            "/base/a.feature",
            [(2, FeedbackList::new())].into_iter().collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        assert_eq!(render("/base", &reports), "a.feature\n  line 2:\n    - .\n\n");
    }

    #[test]
    fn printing_twice_is_identical() {
        let same = feedback(&["Empty step"]);
        let reports: ReportSet = [(
            "/base/a.feature",
            [(1, same.clone()), (2, same)].into_iter().collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        let mut printer = TerminalPrinter::new(BufferedOutput::new(), "/base");
        printer.print(&reports).unwrap();
        let first = printer.into_output().contents();

        let mut sink = BufferedOutput::new();
        let mut printer = TerminalPrinter::new(&mut sink, "/base");
        printer.print(&reports).unwrap();
        printer.print(&reports).unwrap();
        assert_eq!(sink.contents(), format!("{}{}", first, first));
    }

    #[test]
    fn writer_output_appends_newlines() {
        let mut output = WriterOutput::new(Vec::new());
        output.writeln("a").unwrap();
        output.writeln("").unwrap();
        assert_eq!(output.into_inner(), b"a\n\n");
    }

    struct FailingOutput;

    impl Output for FailingOutput {
        fn writeln(&mut self, _line: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn sink_errors_propagate() {
        let reports: ReportSet = [(
            "/base/a.feature",
            [(1, feedback(&["x"]))].into_iter().collect::<FileReport>(),
        )]
        .into_iter()
        .collect();

        let err = TerminalPrinter::new(FailingOutput, "/base")
            .print(&reports)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
