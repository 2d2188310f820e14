//! Pattern syntax tree and parser.
//!
//! Patterns use a small regular-expression dialect: literals, escapes,
//! character classes, `.`, `^`, `$`, groups, alternation and the greedy
//! quantifiers `*`, `+`, `?`. Plain groups do not capture; only named groups
//! `(?<Name>...)` do. Braces are ordinary characters, so a `{Name}`
//! placeholder left unexpanded matches itself literally.

use std::iter::Peekable;
use std::str::CharIndices;
use std::sync::Arc;

use crate::error::GrammarError;

/// A compiled pattern node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pattern {
    /// Matches the empty string.
    Empty,
    /// Matches one exact character.
    Char(char),
    /// Matches one character from a class.
    Class(CharClass),
    /// Matches any one character, newlines included.
    AnyChar,
    /// Matches at the start of the input.
    Start,
    /// Matches at the end of the input.
    End,
    /// Matches each item in turn.
    Sequence(Vec<Pattern>),
    /// Matches the first alternative that lets the rest of the pattern match.
    Choice(Vec<Pattern>),
    /// Greedy repetition.
    Repeat {
        inner: Box<Pattern>,
        min: usize,
        max: Option<usize>,
    },
    /// Named capture region.
    Capture { name: Arc<str>, inner: Box<Pattern> },
}

/// A set of characters, possibly negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CharClass {
    negated: bool,
    items: Vec<ClassItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassItem {
    Range(char, char),
    Space,
    Digit,
    Word,
}

impl ClassItem {
    fn contains(self, c: char) -> bool {
        match self {
            Self::Range(lo, hi) => lo <= c && c <= hi,
            Self::Space => c.is_whitespace(),
            Self::Digit => c.is_ascii_digit(),
            Self::Word => c.is_alphanumeric() || c == '_',
        }
    }
}

impl CharClass {
    fn single(item: ClassItem, negated: bool) -> Self {
        Self {
            negated,
            items: vec![item],
        }
    }

    /// Check whether `c` belongs to this class.
    pub(crate) fn contains(&self, c: char) -> bool {
        self.items.iter().any(|item| item.contains(c)) != self.negated
    }
}

/// Parse a fully expanded pattern.
pub(crate) fn parse(source: &str) -> Result<Pattern, GrammarError> {
    let mut parser = PatternParser {
        source,
        chars: source.char_indices().peekable(),
    };
    let pattern = parser.parse_alternation()?;
    match parser.chars.next() {
        None => Ok(pattern),
        Some((offset, _)) => Err(parser.error_at(offset, "unmatched `)`")),
    }
}

struct PatternParser<'s> {
    source: &'s str,
    chars: Peekable<CharIndices<'s>>,
}

impl PatternParser<'_> {
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn error_at(&self, offset: usize, message: &str) -> GrammarError {
        GrammarError::Pattern {
            offset,
            message: message.to_string(),
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            let _ = self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), GrammarError> {
        if self.eat(expected) {
            Ok(())
        } else {
            let offset = self.offset();
            Err(self.error_at(offset, &format!("expected `{expected}`")))
        }
    }

    /// alternation := sequence ('|' sequence)*
    fn parse_alternation(&mut self) -> Result<Pattern, GrammarError> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.eat('|') {
            alternatives.push(self.parse_sequence()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.swap_remove(0)
        } else {
            Pattern::Choice(alternatives)
        })
    }

    /// sequence := (atom quantifier*)*
    fn parse_sequence(&mut self) -> Result<Pattern, GrammarError> {
        let mut items = Vec::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            items.push(self.parse_quantifiers(atom));
        }
        Ok(match items.len() {
            0 => Pattern::Empty,
            1 => items.swap_remove(0),
            _ => Pattern::Sequence(items),
        })
    }

    fn parse_quantifiers(&mut self, mut atom: Pattern) -> Pattern {
        loop {
            let (min, max) = match self.chars.peek() {
                Some((_, '*')) => (0, None),
                Some((_, '+')) => (1, None),
                Some((_, '?')) => (0, Some(1)),
                _ => return atom,
            };
            let _ = self.chars.next();
            atom = Pattern::Repeat {
                inner: Box::new(atom),
                min,
                max,
            };
        }
    }

    fn parse_atom(&mut self) -> Result<Pattern, GrammarError> {
        let Some((offset, c)) = self.chars.next() else {
            return Err(self.error_at(self.source.len(), "unexpected end of pattern"));
        };
        match c {
            '(' => self.parse_group(),
            '[' => self.parse_class().map(Pattern::Class),
            '.' => Ok(Pattern::AnyChar),
            '^' => Ok(Pattern::Start),
            '$' => Ok(Pattern::End),
            '\\' => self.parse_escape(offset),
            '*' | '+' | '?' => Err(self.error_at(offset, "quantifier has nothing to repeat")),
            _ => Ok(Pattern::Char(c)),
        }
    }

    /// Called after the opening `(`.
    fn parse_group(&mut self) -> Result<Pattern, GrammarError> {
        let name = if self.eat('?') {
            if self.eat(':') {
                None
            } else {
                let _ = self.eat('P');
                self.expect('<')?;
                Some(self.parse_group_name()?)
            }
        } else {
            None
        };
        let inner = self.parse_alternation()?;
        self.expect(')')?;
        Ok(match name {
            Some(name) => Pattern::Capture {
                name: Arc::from(name),
                inner: Box::new(inner),
            },
            None => inner,
        })
    }

    fn parse_group_name(&mut self) -> Result<String, GrammarError> {
        let start = self.offset();
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '>' {
                break;
            }
            if !(c.is_ascii_alphanumeric() || c == '_') {
                let offset = self.offset();
                return Err(self.error_at(offset, "invalid character in group name"));
            }
            name.push(c);
            let _ = self.chars.next();
        }
        self.expect('>')?;
        if name.is_empty() {
            return Err(self.error_at(start, "empty group name"));
        }
        Ok(name)
    }

    /// Called after the backslash.
    fn parse_escape(&mut self, offset: usize) -> Result<Pattern, GrammarError> {
        let Some((_, c)) = self.chars.next() else {
            return Err(self.error_at(offset, "dangling escape"));
        };
        Ok(match c {
            's' => Pattern::Class(CharClass::single(ClassItem::Space, false)),
            'S' => Pattern::Class(CharClass::single(ClassItem::Space, true)),
            'd' => Pattern::Class(CharClass::single(ClassItem::Digit, false)),
            'D' => Pattern::Class(CharClass::single(ClassItem::Digit, true)),
            'w' => Pattern::Class(CharClass::single(ClassItem::Word, false)),
            'W' => Pattern::Class(CharClass::single(ClassItem::Word, true)),
            _ => Pattern::Char(self.escaped_char(offset, c)?),
        })
    }

    /// Resolve a single-character escape (shared by atoms and classes).
    fn escaped_char(&mut self, offset: usize, c: char) -> Result<char, GrammarError> {
        match c {
            't' => Ok('\t'),
            'r' => Ok('\r'),
            'n' => Ok('\n'),
            'u' => self.parse_unicode_escape(offset),
            _ if c.is_ascii_alphanumeric() => {
                Err(self.error_at(offset, &format!("unknown escape `\\{c}`")))
            }
            _ => Ok(c),
        }
    }

    /// `\u{HEX}`, called after the `u`.
    fn parse_unicode_escape(&mut self, offset: usize) -> Result<char, GrammarError> {
        self.expect('{')?;
        let mut digits = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '}' {
                break;
            }
            digits.push(c);
            let _ = self.chars.next();
        }
        self.expect('}')?;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_at(offset, "invalid unicode escape"))
    }

    /// Called after the opening `[`.
    fn parse_class(&mut self) -> Result<CharClass, GrammarError> {
        let negated = self.eat('^');
        let mut items = Vec::new();
        let mut first = true;
        loop {
            let Some((offset, c)) = self.chars.next() else {
                return Err(self.error_at(self.source.len(), "unterminated character class"));
            };
            if c == ']' && !first {
                break;
            }
            first = false;

            let lo = match c {
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(self.error_at(offset, "dangling escape"));
                    };
                    match escaped {
                        's' => {
                            items.push(ClassItem::Space);
                            continue;
                        }
                        'd' => {
                            items.push(ClassItem::Digit);
                            continue;
                        }
                        'w' => {
                            items.push(ClassItem::Word);
                            continue;
                        }
                        _ => self.escaped_char(offset, escaped)?,
                    }
                }
                _ => c,
            };

            // A '-' forms a range unless it is the last character of the class.
            let forms_range = self.chars.peek().is_some_and(|&(_, next)| next == '-') && {
                let mut lookahead = self.chars.clone();
                let _ = lookahead.next();
                lookahead.peek().is_some_and(|&(_, after)| after != ']')
            };
            if forms_range {
                let _ = self.chars.next();
                let Some((hi_offset, hi)) = self.chars.next() else {
                    return Err(self.error_at(self.source.len(), "unterminated range"));
                };
                let hi = if hi == '\\' {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(self.error_at(hi_offset, "dangling escape"));
                    };
                    self.escaped_char(hi_offset, escaped)?
                } else {
                    hi
                };
                if hi < lo {
                    return Err(self.error_at(hi_offset, "character range is out of order"));
                }
                items.push(ClassItem::Range(lo, hi));
            } else {
                items.push(ClassItem::Range(lo, lo));
            }
        }
        Ok(CharClass { negated, items })
    }
}
