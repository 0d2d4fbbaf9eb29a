//! Declarative TRE layouts and the walker that applies them to a payload.

use crate::{Tre, TreError, TreField};
use bcs::{Field, Kind, Value};
use log::debug;
use std::collections::HashMap;

/// Upper bound on walker steps for one TRE. A count field of 999 nested
/// three deep stays well below it.
const STEP_BUDGET: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(i64),
    /// Value of a previously decoded field.
    Field(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn field(name: &str) -> Expr {
        Expr::Field(name.to_owned())
    }

    pub fn add(self, other: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Expr {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Expr) -> Expr {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: Expr) -> Expr {
        Expr::Div(Box::new(self), Box::new(other))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Length {
    Fixed(usize),
    Computed(Expr),
    /// Whatever is left of the payload.
    Remaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: Comparison,
        operand: Operand,
    },
    /// True when `field & mask` is nonzero.
    BitSet { field: String, mask: u64 },
}

impl Condition {
    pub fn compare(field: &str, op: Comparison, operand: Operand) -> Condition {
        Condition::Compare {
            field: field.to_owned(),
            op,
            operand,
        }
    }

    pub fn bit_set(field: &str, mask: u64) -> Condition {
        Condition::BitSet {
            field: field.to_owned(),
            mask,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Field {
        name: String,
        kind: Kind,
        length: Length,
    },
    Loop {
        count: Expr,
        body: Vec<Item>,
    },
    If {
        condition: Condition,
        body: Vec<Item>,
    },
}

impl Item {
    pub fn field(name: &str, kind: Kind, width: usize) -> Item {
        Item::Field {
            name: name.to_owned(),
            kind,
            length: Length::Fixed(width),
        }
    }

    pub fn computed(name: &str, kind: Kind, length: Expr) -> Item {
        Item::Field {
            name: name.to_owned(),
            kind,
            length: Length::Computed(length),
        }
    }

    pub fn remaining(name: &str, kind: Kind) -> Item {
        Item::Field {
            name: name.to_owned(),
            kind,
            length: Length::Remaining,
        }
    }

    pub fn repeat(count: Expr, body: Vec<Item>) -> Item {
        Item::Loop { count, body }
    }

    pub fn when(condition: Condition, body: Vec<Item>) -> Item {
        Item::If { condition, body }
    }
}

/// Field layout of one TRE tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    tag: String,
    items: Vec<Item>,
}

impl Descriptor {
    pub fn new(tag: &str, items: Vec<Item>) -> Descriptor {
        Descriptor {
            tag: tag.to_owned(),
            items,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Walks the descriptor over `payload`. The walk must consume the
    /// payload exactly.
    pub fn decode(&self, tag: &str, payload: &[u8]) -> Result<Tre, TreError> {
        let mut walker = Walker {
            tag,
            data: payload,
            offset: 0,
            steps: 0,
            fields: Vec::new(),
            index: HashMap::new(),
            scopes: Vec::new(),
        };
        walker.walk(&self.items)?;

        if walker.offset != payload.len() {
            return Err(walker.format(format!(
                "descriptor consumed {} of {} bytes",
                walker.offset,
                payload.len()
            )));
        }
        debug!("TRE {} decoded into {} fields", tag, walker.fields.len());
        Tre::from_fields(tag, walker.fields)
    }
}

struct Walker<'a> {
    tag: &'a str,
    data: &'a [u8],
    offset: usize,
    steps: usize,
    fields: Vec<TreField>,
    // Full field name to its position in `fields`.
    index: HashMap<String, usize>,
    // Loop counters, outermost first.
    scopes: Vec<i64>,
}

impl<'a> Walker<'a> {
    fn format(&self, reason: String) -> TreError {
        TreError::Format {
            tag: self.tag.to_owned(),
            reason,
        }
    }

    fn tick(&mut self) -> Result<(), TreError> {
        self.steps += 1;
        if self.steps > STEP_BUDGET {
            return Err(self.format("descriptor walk exceeded its step budget".to_owned()));
        }
        Ok(())
    }

    fn scoped_name(&self, name: &str, depth: usize) -> String {
        let mut full = name.to_owned();
        for i in &self.scopes[..depth] {
            full.push_str(&format!("[{}]", i));
        }
        full
    }

    fn walk(&mut self, items: &[Item]) -> Result<(), TreError> {
        for item in items {
            self.tick()?;
            match item {
                Item::Field { name, kind, length } => self.read_field(name, *kind, length)?,
                Item::Loop { count, body } => {
                    let count = self.eval(count)?;
                    if count < 0 {
                        return Err(self.format(format!("negative loop count {}", count)));
                    }
                    for i in 0..count {
                        self.tick()?;
                        self.scopes.push(i);
                        self.walk(body)?;
                        self.scopes.pop();
                    }
                }
                Item::If { condition, body } => {
                    if self.test(condition)? {
                        self.walk(body)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_field(&mut self, name: &str, kind: Kind, length: &Length) -> Result<(), TreError> {
        let remaining = self.data.len() - self.offset;
        let width = match length {
            Length::Fixed(width) => *width,
            Length::Remaining => remaining,
            Length::Computed(expr) => {
                let value = self.eval(expr)?;
                usize::try_from(value)
                    .map_err(|_| self.format(format!("field {} has length {}", name, value)))?
            }
        };

        let full = self.scoped_name(name, self.scopes.len());
        if width > remaining {
            return Err(self.format(format!(
                "field {} needs {} bytes, {} remain",
                full, width, remaining
            )));
        }
        let end = self.offset + width;
        let field = bcs::decode(&self.data[self.offset..end], width, kind).map_err(|source| {
            TreError::Field {
                tag: self.tag.to_owned(),
                name: full.clone(),
                source,
            }
        })?;

        self.index.insert(full.clone(), self.fields.len());
        self.fields.push(TreField::new(&full, field));
        self.offset = end;
        Ok(())
    }

    // Innermost scope first, then outward to the unindexed name.
    fn resolve(&self, name: &str) -> Result<&Field, TreError> {
        (0..=self.scopes.len())
            .rev()
            .find_map(|depth| self.index.get(&self.scoped_name(name, depth)))
            .map(|&i| self.fields[i].field())
            .ok_or_else(|| self.format(format!("reference to undecoded field {}", name)))
    }

    fn number(&self, name: &str) -> Result<i64, TreError> {
        let field = self.resolve(name)?;
        if let Some(value) = field.as_i64() {
            return Ok(value);
        }
        field
            .as_str()
            .and_then(|text| text.trim().parse::<i64>().ok())
            .ok_or_else(|| self.format(format!("field {} is not an integer", name)))
    }

    fn eval(&self, expr: &Expr) -> Result<i64, TreError> {
        match expr {
            Expr::Const(value) => Ok(*value),
            Expr::Field(name) => self.number(name),
            Expr::Add(a, b) => self
                .eval(a)?
                .checked_add(self.eval(b)?)
                .ok_or(TreError::SizeOverflow),
            Expr::Sub(a, b) => self
                .eval(a)?
                .checked_sub(self.eval(b)?)
                .ok_or(TreError::SizeOverflow),
            Expr::Mul(a, b) => self
                .eval(a)?
                .checked_mul(self.eval(b)?)
                .ok_or(TreError::SizeOverflow),
            Expr::Div(a, b) => {
                let divisor = self.eval(b)?;
                if divisor == 0 {
                    return Err(self.format("division by zero in length".to_owned()));
                }
                self.eval(a)?
                    .checked_div(divisor)
                    .ok_or(TreError::SizeOverflow)
            }
        }
    }

    fn test(&self, condition: &Condition) -> Result<bool, TreError> {
        match condition {
            Condition::BitSet { field, mask } => {
                let value = self.number(field)?;
                Ok((value as u64) & mask != 0)
            }
            Condition::Compare {
                field,
                op,
                operand: Operand::Number(n),
            } => Ok(op.holds(&self.number(field)?, n)),
            Condition::Compare {
                field,
                op,
                operand: Operand::Text(text),
            } => {
                let value = self.resolve(field)?;
                let actual = match value.value() {
                    Value::Text(actual) => actual.clone(),
                    Value::Undefined => String::new(),
                    Value::Unsigned(v) => v.to_string(),
                    Value::Signed(v) => v.to_string(),
                    Value::Real(v) => v.to_string(),
                    Value::Bytes(_) => {
                        return Err(self.format(format!("field {} is binary", field)))
                    }
                };
                Ok(op.holds(&actual.as_str(), &text.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Descriptor {
        Descriptor::new(
            "NEST",
            vec![
                Item::field("N", Kind::Numeric, 1),
                Item::repeat(
                    Expr::field("N"),
                    vec![
                        Item::field("M", Kind::Numeric, 1),
                        Item::repeat(
                            Expr::field("M"),
                            vec![Item::field("X", Kind::Alphanumeric, 1)],
                        ),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_nested_loops_index_names() {
        let tre = nested().decode("NEST", b"22ab1c").unwrap();
        assert_eq!(tre.field("M[0]").and_then(|f| f.as_u64()), Some(2));
        assert_eq!(tre.field("X[0][1]").and_then(|f| f.as_str()), Some("b"));
        assert_eq!(tre.field("X[1][0]").and_then(|f| f.as_str()), Some("c"));
        assert_eq!(tre.length(), 6);
    }

    #[test]
    fn test_short_payload_is_format_error() {
        let result = nested().decode("NEST", b"22ab1");
        assert!(matches!(result, Err(TreError::Format { .. })));
    }

    #[test]
    fn test_trailing_bytes_are_format_error() {
        let result = nested().decode("NEST", b"0zz");
        assert!(matches!(result, Err(TreError::Format { .. })));
    }

    #[test]
    fn test_conditions() {
        let descriptor = Descriptor::new(
            "COND",
            vec![
                Item::field("FLAGS", Kind::Numeric, 1),
                Item::field("TYPE", Kind::Alphanumeric, 1),
                Item::when(
                    Condition::bit_set("FLAGS", 0b10),
                    vec![Item::field("A", Kind::Alphanumeric, 2)],
                ),
                Item::when(
                    Condition::compare("TYPE", Comparison::Eq, Operand::Text("R".to_owned())),
                    vec![Item::remaining("REST", Kind::Binary)],
                ),
            ],
        );

        let tre = descriptor.decode("COND", b"2RxyZZ").unwrap();
        assert_eq!(tre.field("A").and_then(|f| f.as_str()), Some("xy"));
        assert_eq!(tre.field("REST").and_then(|f| f.as_bytes()), Some(&b"ZZ"[..]));

        let tre = descriptor.decode("COND", b"1Q").unwrap();
        assert!(tre.field("A").is_none());
        assert!(tre.field("REST").is_none());
    }

    #[test]
    fn test_runaway_loop_hits_budget() {
        let descriptor = Descriptor::new(
            "SPIN",
            vec![Item::repeat(
                Expr::Const(1 << 30),
                vec![Item::field("E", Kind::Binary, 0)],
            )],
        );
        let result = descriptor.decode("SPIN", b"");
        assert!(matches!(result, Err(TreError::Format { .. })));
    }

    #[test]
    fn test_overflowing_length_expression() {
        let descriptor = Descriptor::new(
            "HUGE",
            vec![Item::computed(
                "D",
                Kind::Binary,
                Expr::Const(i64::MAX).mul(Expr::Const(2)),
            )],
        );
        assert_eq!(descriptor.decode("HUGE", b""), Err(TreError::SizeOverflow));
    }
}
