//! A pair of tiny languages used only by the integration tests: a
//! four-operator arithmetic language and a propositional-logic language,
//! standing in for whatever real term language an embedder would supply.

use eqsat::{Construct, Id};

/// Initializes a logger so `RUST_LOG=trace cargo test -- --nocapture`
/// surfaces the crate's `trace!`/`debug!` rebuild and search output.
/// Safe to call from every test: `env_logger::Builder::is_test` makes
/// repeated init attempts across test binaries non-fatal.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arith {
    Num(i64),
    Sym(&'static str),
    Add([Id; 2]),
    Mul([Id; 2]),
}

/// For an atom, the discriminant carries the atom's own value, so two
/// atoms only "match" each other (as e.g. a pattern literal) when they
/// are literally equal; for an operator it carries just the tag, since
/// its operands are unified separately by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArithDisc {
    Num(i64),
    Sym(&'static str),
    Add,
    Mul,
}

impl Construct for Arith {
    type Discriminant = ArithDisc;

    fn discriminant(&self) -> ArithDisc {
        match self {
            Arith::Num(n) => ArithDisc::Num(*n),
            Arith::Sym(s) => ArithDisc::Sym(s),
            Arith::Add(_) => ArithDisc::Add,
            Arith::Mul(_) => ArithDisc::Mul,
        }
    }

    fn matches(&self, other: &Self) -> bool {
        self.discriminant() == other.discriminant()
    }

    fn operands(&self) -> &[Id] {
        match self {
            Arith::Num(_) | Arith::Sym(_) => &[],
            Arith::Add(ids) | Arith::Mul(ids) => ids,
        }
    }

    fn operands_mut(&mut self) -> &mut [Id] {
        match self {
            Arith::Num(_) | Arith::Sym(_) => &mut [],
            Arith::Add(ids) | Arith::Mul(ids) => ids,
        }
    }
}

impl std::fmt::Display for Arith {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arith::Num(n) => write!(f, "{n}"),
            Arith::Sym(s) => write!(f, "{s}"),
            Arith::Add(_) => write!(f, "+"),
            Arith::Mul(_) => write!(f, "*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prop {
    True,
    False,
    Var(&'static str),
    Not([Id; 1]),
    And([Id; 2]),
    Or([Id; 2]),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropDisc {
    True,
    False,
    Var(&'static str),
    Not,
    And,
    Or,
}

impl Construct for Prop {
    type Discriminant = PropDisc;

    fn discriminant(&self) -> PropDisc {
        match self {
            Prop::True => PropDisc::True,
            Prop::False => PropDisc::False,
            Prop::Var(s) => PropDisc::Var(s),
            Prop::Not(_) => PropDisc::Not,
            Prop::And(_) => PropDisc::And,
            Prop::Or(_) => PropDisc::Or,
        }
    }

    fn matches(&self, other: &Self) -> bool {
        self.discriminant() == other.discriminant()
    }

    fn operands(&self) -> &[Id] {
        match self {
            Prop::True | Prop::False | Prop::Var(_) => &[],
            Prop::Not(ids) => ids,
            Prop::And(ids) | Prop::Or(ids) => ids,
        }
    }

    fn operands_mut(&mut self) -> &mut [Id] {
        match self {
            Prop::True | Prop::False | Prop::Var(_) => &mut [],
            Prop::Not(ids) => ids,
            Prop::And(ids) | Prop::Or(ids) => ids,
        }
    }
}

impl std::fmt::Display for Prop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prop::True => write!(f, "true"),
            Prop::False => write!(f, "false"),
            Prop::Var(s) => write!(f, "{s}"),
            Prop::Not(_) => write!(f, "not"),
            Prop::And(_) => write!(f, "and"),
            Prop::Or(_) => write!(f, "or"),
        }
    }
}
