//! Interactive selection on the terminal.

use std::cell::RefCell;
use std::io::{BufRead, Write};

use subgrab_core::selector::{parse_select_spec, SelectError, Selection, Selector};
use subgrab_core::Candidate;

use crate::output::candidate_table;

/// What the user asked for at the selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectCommand {
    All,
    Skip,
    /// Everything except these positions.
    Invert(Vec<usize>),
    Positions(Vec<usize>),
}

/// Parse one line typed at the prompt.
///
/// `all` or `*` selects everything, an empty line, `none` or `skip` selects
/// nothing, `invert SPEC` (or `!SPEC`) selects everything not in `SPEC`, and
/// anything else is a select spec such as `0,2,5` or `1-4`.
pub fn parse_select_command(line: &str) -> Result<SelectCommand, SelectError> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" | "none" | "skip" | "s" => return Ok(SelectCommand::Skip),
        "all" | "a" | "*" => return Ok(SelectCommand::All),
        _ => {}
    }
    if let Some(rest) = line
        .strip_prefix("invert ")
        .or_else(|| line.strip_prefix('!'))
    {
        return Ok(SelectCommand::Invert(parse_select_spec(rest)?));
    }
    Ok(SelectCommand::Positions(parse_select_spec(line)?))
}

fn apply(command: &SelectCommand, items: &[Candidate]) -> Selection {
    match command {
        SelectCommand::All => items.iter().cloned().collect(),
        SelectCommand::Skip => Selection::new(),
        SelectCommand::Invert(excluded) => items
            .iter()
            .enumerate()
            .filter(|(i, _)| !excluded.contains(i))
            .map(|(_, c)| c.clone())
            .collect(),
        SelectCommand::Positions(positions) => positions
            .iter()
            .filter_map(|&i| items.get(i))
            .cloned()
            .collect(),
    }
}

/// Prompts for a selection, re-asking on invalid input. End of input
/// selects nothing.
pub struct InteractiveSelector<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> InteractiveSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn read_line(&self) -> Result<Option<String>, SelectError> {
        let mut line = String::new();
        let read = self.input.borrow_mut().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }

    /// Ask a yes/no question; an empty answer means yes.
    pub fn confirm(&self, question: &str) -> Result<bool, SelectError> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{} [Y/n] ", question)?;
            out.flush()?;
        }
        Ok(match self.read_line()? {
            Some(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes"),
            None => false,
        })
    }
}

impl<R: BufRead, W: Write> Selector for InteractiveSelector<R, W> {
    fn select(&self, query: &str, items: &[Candidate]) -> Result<Selection, SelectError> {
        {
            let mut out = self.output.borrow_mut();
            writeln!(out, "\nResults for {:?}:", query)?;
            write!(out, "{}", candidate_table(items))?;
        }

        loop {
            {
                let mut out = self.output.borrow_mut();
                write!(
                    out,
                    "Select (e.g. 0,2 or 1-3; all; invert SPEC; empty to skip): "
                )?;
                out.flush()?;
            }
            let Some(line) = self.read_line()? else {
                return Ok(Selection::new());
            };
            match parse_select_command(&line) {
                Ok(command) => return Ok(apply(&command, items)),
                Err(e) => writeln!(self.output.borrow_mut(), "{}", e)?,
            }
        }
    }
}
