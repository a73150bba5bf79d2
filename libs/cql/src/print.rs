//! Print context shared by every printable CQL construct
//!
//! Printing is driven by two pieces of state: the indentation of continuation lines and the
//! precedence demanded by the enclosing construct. A node whose own precedence is lower than
//! the demanded one wraps itself in parentheses.

/// Indent step used for nested where/return/with bodies.
pub const INDENT_STEP: usize = 2;

/// Operator precedences (higher binds tighter)
pub mod precedence {
    /// Query expressions are parenthesized wherever an operator demands any precedence.
    pub const QUERY: u8 = 0;
    pub const UNION: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const MEMBERSHIP: u8 = 5;
    pub const OVERLAPS: u8 = 5;
    pub const COMPARATOR: u8 = 6;
    pub const CONCATENATION: u8 = 7;
    pub const NOT: u8 = 9;
    pub const BETWEEN: u8 = 10;
    pub const EXISTS: u8 = 11;
    pub const TYPE_CAST: u8 = 12;
    pub const INVOCATION: u8 = 14;
    /// Leaves never need parentheses.
    pub const ATOM: u8 = u8::MAX;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintContext {
    indent: usize,
    precedence: u8,
}

impl PrintContext {
    pub const ZERO: PrintContext = PrintContext {
        indent: 0,
        precedence: 0,
    };

    pub fn new(indent: usize, precedence: u8) -> Self {
        Self { indent, precedence }
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn precedence(&self) -> u8 {
        self.precedence
    }

    pub fn increase_indent(self) -> Self {
        Self {
            indent: self.indent + INDENT_STEP,
            ..self
        }
    }

    pub fn with_precedence(self, precedence: u8) -> Self {
        Self { precedence, ..self }
    }

    pub fn reset_precedence(self) -> Self {
        self.with_precedence(0)
    }

    /// Newline followed by the current indentation.
    pub fn newline(&self) -> String {
        format!("\n{}", " ".repeat(self.indent))
    }

    /// Wraps `text` in parentheses if `precedence` is lower than the demanded precedence.
    pub fn parenthesize(&self, precedence: u8, text: String) -> String {
        if precedence < self.precedence {
            format!("({text})")
        } else {
            text
        }
    }

    pub fn print(&self, printable: &impl Print) -> String {
        printable.print(*self)
    }
}

/// Anything that renders to CQL text.
pub trait Print {
    fn print(&self, ctx: PrintContext) -> String;
}
