//! Yes/no confirmation prompts.
use std::{
    collections::VecDeque,
    io::{self, BufRead, Write},
};

/// Normalised response to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// `y`
    Yes,
    /// `n`
    No,
}

impl Answer {
    /// Single-character form.
    pub fn as_char(&self) -> char {
        match self {
            Answer::Yes => 'y',
            Answer::No => 'n',
        }
    }

    /// Interprets a typed line. Blank input picks `default`; anything that
    /// does not start with `y` is a no.
    pub fn parse(input: &str, default: Answer) -> Answer {
        match input.trim().chars().next() {
            None => default,
            Some(c) if c.eq_ignore_ascii_case(&'y') => Answer::Yes,
            Some(_) => Answer::No,
        }
    }

    fn hint(default: Answer) -> &'static str {
        match default {
            Answer::Yes => "[Y/n]",
            Answer::No => "[y/N]",
        }
    }
}

/// Asks the operator to confirm a step.
pub trait ConfirmReader {
    /// Presents `question` and returns the answer, `default` on blank input.
    fn confirm(&mut self, question: &str, default: Answer) -> io::Result<Answer>;
}

/// Reads answers from a line-oriented input, usually the terminal.
pub struct TerminalReader<R, W> {
    input: R,
    output: W,
}

impl TerminalReader<io::StdinLock<'static>, io::Stdout> {
    /// Prompts on stdout and reads stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalReader<R, W> {
    /// Creates a reader over arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ConfirmReader for TerminalReader<R, W> {
    fn confirm(&mut self, question: &str, default: Answer) -> io::Result<Answer> {
        write!(self.output, "{question} {}", Answer::hint(default))?;
        self.output.flush()?;

        // EOF counts as blank input so non-interactive runs take the default.
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(Answer::parse(&line, default))
    }
}

/// Replays a fixed list of answers; used in place of a terminal.
#[derive(Debug, Default)]
pub struct ScriptedAnswers {
    answers: VecDeque<Answer>,
    asked: Vec<String>,
}

impl ScriptedAnswers {
    /// Answers are handed out in order.
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl ConfirmReader for ScriptedAnswers {
    fn confirm(&mut self, question: &str, _default: Answer) -> io::Result<Answer> {
        self.asked.push(question.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for '{question}'"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_input() {
        assert_eq!(Answer::parse("Y\n", Answer::No), Answer::Yes);
        assert_eq!(Answer::parse("yes", Answer::No), Answer::Yes);
        assert_eq!(Answer::parse("nope", Answer::Yes), Answer::No);
        assert_eq!(Answer::parse("  \n", Answer::Yes), Answer::Yes);
        assert_eq!(Answer::parse("", Answer::No).as_char(), 'n');
    }

    #[test]
    fn terminal_reader_prints_hint_and_reads_line() {
        let mut output = Vec::new();
        let mut reader = TerminalReader::new("y\n".as_bytes(), &mut output);

        let answer = reader.confirm("Erase data?", Answer::No).unwrap();

        assert_eq!(answer, Answer::Yes);
        assert_eq!(String::from_utf8(output).unwrap(), "Erase data? [y/N]");
    }

    #[test]
    fn terminal_reader_uses_default_on_eof() {
        let mut reader = TerminalReader::new(io::empty(), io::sink());
        assert_eq!(reader.confirm("Continue?", Answer::Yes).unwrap(), Answer::Yes);
    }

    #[test]
    fn scripted_answers_run_out() {
        let mut answers = ScriptedAnswers::new([Answer::Yes]);
        assert_eq!(answers.confirm("first", Answer::No).unwrap(), Answer::Yes);
        assert!(answers.confirm("second", Answer::No).is_err());
        assert_eq!(answers.asked(), ["first", "second"]);
    }
}
