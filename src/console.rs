use std::io::{self, BufRead, Write};

use log::warn;

/// The operator side of a batch run: where previews and results are shown
/// and where the confirmation answer comes from.
pub trait Console {
    /// Shows one line to the operator.
    fn print(&mut self, line: &str);

    /// Asks a yes/no question. Only an explicit yes returns `true`.
    fn confirm(&mut self, question: &str) -> bool;
}

/// Console backed by a reader/writer pair, usually stdin and stdout.
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Terminal { input, output }
    }

    /// Gives back the writer, mostly useful to inspect what was printed.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl Terminal<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Terminal::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console for Terminal<R, W> {
    fn print(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{line}") {
            warn!("Failed to write to console: {}", e);
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        if let Err(e) = write!(self.output, "{question}").and_then(|_| self.output.flush()) {
            warn!("Failed to write to console: {}", e);
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!("Failed to read the answer, assuming no: {}", e);
                false
            }
        }
    }
}

/// `y` in any case, surrounding whitespace ignored. Everything else is a no.
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_y_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" Y\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yes"));
        assert!(!is_yes("n"));
    }

    #[test]
    fn terminal_reads_answer_and_writes_question() {
        let mut terminal = Terminal::new(&b"Y\n"[..], Vec::new());
        terminal.print("hello");
        assert!(terminal.confirm("go? "));
        let output = String::from_utf8(terminal.into_output()).unwrap();
        assert_eq!(output, "hello\ngo? ");
    }

    #[test]
    fn terminal_declines_on_eof() {
        let mut terminal = Terminal::new(&b""[..], Vec::new());
        assert!(!terminal.confirm("go? "));
    }
}
