//! Backtracking matcher with full capture history.
//!
//! A [`Pattern`] is lowered once into a flat [`Program`]. Matching runs that
//! program in a loop with an explicit checkpoint stack, so neither the length
//! of the input nor the nesting of the pattern grows the native stack.
//!
//! Every named capture completed on the successful path is recorded, not only
//! the last iteration of a repeated group. Capture boundaries are appended to
//! a log; a checkpoint remembers the log length, and backtracking truncates
//! the log back to it.

use std::sync::Arc;

use super::pattern::{CharClass, Pattern};
use crate::capture::Capture;

/// Steps every match attempt may take regardless of input length.
const BASE_STEP_BUDGET: usize = 1 << 20;

/// Additional steps granted per byte of input.
const STEPS_PER_BYTE: usize = 1 << 10;

/// Result of an anchored match attempt.
#[derive(Debug)]
pub(crate) enum MatchOutcome {
    /// The whole input matched. Captures are sorted by start, outermost first.
    Matched(Vec<Capture>),
    /// The input does not match.
    NoMatch,
    /// The step budget ran out before a decision was reached.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Inst {
    Char(char),
    Class(CharClass),
    AnyChar,
    Start,
    End,
    /// Continue at `preferred`; on backtrack, resume at `fallback`.
    Split { preferred: usize, fallback: usize },
    Jump(usize),
    /// Remember where the current loop iteration began.
    Mark(usize),
    /// Fail if the iteration begun at the matching `Mark` consumed nothing.
    Progress(usize),
    Open(Arc<str>),
    Close,
    /// Succeed if the whole input has been consumed.
    Match,
}

/// A pattern lowered to instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Program {
    insts: Vec<Inst>,
    loop_slots: usize,
}

impl Program {
    pub(crate) fn compile(pattern: &Pattern) -> Self {
        let mut program = Self {
            insts: Vec::new(),
            loop_slots: 0,
        };
        program.emit(pattern);
        let _ = program.push(Inst::Match);
        program
    }

    fn push(&mut self, inst: Inst) -> usize {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    /// Reserve a split whose targets are patched once the fallback is known.
    fn push_split(&mut self) -> usize {
        self.push(Inst::Split {
            preferred: 0,
            fallback: 0,
        })
    }

    fn patch_split(&mut self, at: usize, fallback: usize) {
        self.insts[at] = Inst::Split {
            preferred: at + 1,
            fallback,
        };
    }

    fn emit(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Empty => {}
            Pattern::Char(c) => {
                let _ = self.push(Inst::Char(*c));
            }
            Pattern::Class(class) => {
                let _ = self.push(Inst::Class(class.clone()));
            }
            Pattern::AnyChar => {
                let _ = self.push(Inst::AnyChar);
            }
            Pattern::Start => {
                let _ = self.push(Inst::Start);
            }
            Pattern::End => {
                let _ = self.push(Inst::End);
            }
            Pattern::Sequence(items) => {
                for item in items {
                    self.emit(item);
                }
            }
            Pattern::Choice(alternatives) => self.emit_choice(alternatives),
            Pattern::Repeat { inner, min, max } => self.emit_repeat(inner, *min, *max),
            Pattern::Capture { name, inner } => {
                let _ = self.push(Inst::Open(Arc::clone(name)));
                self.emit(inner);
                let _ = self.push(Inst::Close);
            }
        }
    }

    fn emit_choice(&mut self, alternatives: &[Pattern]) {
        let Some((last, init)) = alternatives.split_last() else {
            return;
        };
        let mut exits = Vec::with_capacity(init.len());
        for alternative in init {
            let split = self.push_split();
            self.emit(alternative);
            exits.push(self.push(Inst::Jump(0)));
            let next = self.insts.len();
            self.patch_split(split, next);
        }
        self.emit(last);
        let end = self.insts.len();
        for exit in exits {
            self.insts[exit] = Inst::Jump(end);
        }
    }

    /// Greedy repetition: mandatory copies, then a loop or nested optionals.
    fn emit_repeat(&mut self, inner: &Pattern, min: usize, max: Option<usize>) {
        for _ in 0..min {
            self.emit(inner);
        }
        match max {
            None => {
                let slot = self.loop_slots;
                self.loop_slots += 1;
                let split = self.push_split();
                let _ = self.push(Inst::Mark(slot));
                self.emit(inner);
                // An empty iteration past the minimum can repeat forever.
                let _ = self.push(Inst::Progress(slot));
                let _ = self.push(Inst::Jump(split));
                let exit = self.insts.len();
                self.patch_split(split, exit);
            }
            Some(max) => {
                let splits: Vec<usize> = (min..max)
                    .map(|_| {
                        let split = self.push_split();
                        self.emit(inner);
                        split
                    })
                    .collect();
                let exit = self.insts.len();
                for split in splits {
                    self.patch_split(split, exit);
                }
            }
        }
    }
}

#[derive(Debug)]
enum LogEntry {
    Open(Arc<str>, usize),
    Close(usize),
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    ip: usize,
    pos: usize,
    log_watermark: usize,
    undo_watermark: usize,
}

/// Execution state for one match attempt.
struct Vm<'p, 'i> {
    program: &'p Program,
    input: &'i str,
    ip: usize,
    pos: usize,
    checkpoints: Vec<Checkpoint>,
    log: Vec<LogEntry>,
    /// Loop-entry positions, indexed by loop slot.
    marks: Vec<usize>,
    /// Previous values of overwritten marks, as `(slot, position)`.
    undo: Vec<(usize, usize)>,
    fuel: usize,
}

/// Match `program` against the entire `input`.
pub(crate) fn match_full(program: &Program, input: &str) -> MatchOutcome {
    let mut vm = Vm {
        program,
        input,
        ip: 0,
        pos: 0,
        checkpoints: Vec::new(),
        log: Vec::new(),
        marks: vec![usize::MAX; program.loop_slots],
        undo: Vec::new(),
        fuel: BASE_STEP_BUDGET.saturating_add(input.len().saturating_mul(STEPS_PER_BYTE)),
    };
    let outcome = vm.run();
    tracing::trace!(
        input_len = input.len(),
        checkpoints = vm.checkpoints.len(),
        matched = matches!(outcome, MatchOutcome::Matched(_)),
        "match finished"
    );
    outcome
}

impl Vm<'_, '_> {
    fn char_here(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Consume one character if `accept` allows it.
    fn consume(&mut self, accept: impl FnOnce(char) -> bool) -> bool {
        match self.char_here() {
            Some(c) if accept(c) => {
                self.pos += c.len_utf8();
                self.ip += 1;
                true
            }
            _ => false,
        }
    }

    fn advance_if(&mut self, holds: bool) -> bool {
        if holds {
            self.ip += 1;
        }
        holds
    }

    fn run(&mut self) -> MatchOutcome {
        loop {
            if self.fuel == 0 {
                return MatchOutcome::Exhausted;
            }
            self.fuel -= 1;

            let program = self.program;
            let proceeded = match &program.insts[self.ip] {
                Inst::Char(expected) => {
                    let expected = *expected;
                    self.consume(|c| c == expected)
                }
                Inst::Class(class) => self.consume(|c| class.contains(c)),
                Inst::AnyChar => self.consume(|_| true),
                Inst::Start => self.advance_if(self.pos == 0),
                Inst::End => self.advance_if(self.pos == self.input.len()),
                Inst::Split {
                    preferred,
                    fallback,
                } => {
                    self.checkpoints.push(Checkpoint {
                        ip: *fallback,
                        pos: self.pos,
                        log_watermark: self.log.len(),
                        undo_watermark: self.undo.len(),
                    });
                    self.ip = *preferred;
                    true
                }
                Inst::Jump(target) => {
                    self.ip = *target;
                    true
                }
                Inst::Mark(slot) => {
                    let slot = *slot;
                    self.undo.push((slot, self.marks[slot]));
                    self.marks[slot] = self.pos;
                    self.ip += 1;
                    true
                }
                Inst::Progress(slot) => self.advance_if(self.marks[*slot] != self.pos),
                Inst::Open(name) => {
                    self.log.push(LogEntry::Open(Arc::clone(name), self.pos));
                    self.ip += 1;
                    true
                }
                Inst::Close => {
                    self.log.push(LogEntry::Close(self.pos));
                    self.ip += 1;
                    true
                }
                Inst::Match => {
                    if self.pos == self.input.len() {
                        return MatchOutcome::Matched(self.captures());
                    }
                    false
                }
            };

            if !proceeded && !self.backtrack() {
                return MatchOutcome::NoMatch;
            }
        }
    }

    /// Resume from the most recent checkpoint, undoing everything after it.
    fn backtrack(&mut self) -> bool {
        let Some(checkpoint) = self.checkpoints.pop() else {
            return false;
        };
        self.log.truncate(checkpoint.log_watermark);
        while self.undo.len() > checkpoint.undo_watermark {
            if let Some((slot, previous)) = self.undo.pop() {
                self.marks[slot] = previous;
            }
        }
        self.ip = checkpoint.ip;
        self.pos = checkpoint.pos;
        true
    }

    /// Pair the logged boundaries into captures.
    fn captures(&mut self) -> Vec<Capture> {
        let mut open: Vec<(Arc<str>, usize)> = Vec::new();
        let mut captures = Vec::new();
        for entry in self.log.drain(..) {
            match entry {
                LogEntry::Open(name, start) => open.push((name, start)),
                LogEntry::Close(end) => {
                    if let Some((name, start)) = open.pop() {
                        captures.push(Capture::new(name, start, end));
                    }
                }
            }
        }
        captures.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        captures
    }
}
