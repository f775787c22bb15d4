//! A small selection language over atoms.
//!
//! Terms:
//! - `all`, `*`: every atom
//! - `_C`: element
//! - `[G]`: residue name
//! - `10`, `10-20`: residue number or inclusive range
//! - `:A`: chain
//! - `.CA`: atom name
//!
//! Residue name, number, chain and atom name can be chained into one term such as
//! `[G]10:A.N1`. Terms combine with `and`, `or`, `not` and parentheses; `and` binds
//! tighter than `or`.

use molscope_core::{MolscopeError, Result};

use crate::structure::Atom;

/// Atom fields matched by a single term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomSpec {
    pub resname: Option<String>,
    pub resno: Option<(i32, i32)>,
    pub chain: Option<String>,
    pub name: Option<String>,
}

impl AtomSpec {
    fn matches(&self, atom: &Atom) -> bool {
        self.resname
            .as_ref()
            .is_none_or(|r| r.eq_ignore_ascii_case(&atom.resname))
            && self
                .resno
                .is_none_or(|(lo, hi)| (lo..=hi).contains(&atom.resno))
            && self.chain.as_ref().is_none_or(|c| *c == atom.chain)
            && self
                .name
                .as_ref()
                .is_none_or(|n| n.eq_ignore_ascii_case(&atom.name))
    }
}

/// A parsed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    Element(String),
    Atom(AtomSpec),
    Not(Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Parses a selection string. The empty string selects everything.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return Ok(Filter::All);
        }
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let filter = parser.or()?;
        if let Some(extra) = parser.peek() {
            return Err(parser.error(format!("unexpected '{extra}'")));
        }
        Ok(filter)
    }

    /// Tests one atom.
    #[must_use]
    pub fn matches(&self, atom: &Atom) -> bool {
        match self {
            Filter::All => true,
            Filter::Element(e) => e.eq_ignore_ascii_case(&atom.element),
            Filter::Atom(spec) => spec.matches(atom),
            Filter::Not(inner) => !inner.matches(atom),
            Filter::And(a, b) => a.matches(atom) && b.matches(atom),
            Filter::Or(a, b) => a.matches(atom) || b.matches(atom),
        }
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in input.chars() {
        match c {
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<String>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn keyword(&mut self, word: &str) -> bool {
        if self.peek().is_some_and(|t| t.eq_ignore_ascii_case(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> MolscopeError {
        MolscopeError::InvalidSelection {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn or(&mut self) -> Result<Filter> {
        let mut left = self.and()?;
        while self.keyword("or") {
            let right = self.and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Filter> {
        let mut left = self.unary()?;
        while self.keyword("and") {
            let right = self.unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Filter> {
        if self.keyword("not") {
            return Ok(Filter::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Filter> {
        let Some(token) = self.peek().map(str::to_string) else {
            return Err(self.error("unexpected end of selection"));
        };
        self.pos += 1;
        match token.as_str() {
            "(" => {
                let inner = self.or()?;
                if self.peek() != Some(")") {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            ")" => Err(self.error("unexpected ')'")),
            _ => self.term(&token),
        }
    }

    fn term(&self, token: &str) -> Result<Filter> {
        if token == "*" || token.eq_ignore_ascii_case("all") {
            return Ok(Filter::All);
        }
        if let Some(element) = token.strip_prefix('_') {
            if element.is_empty() {
                return Err(self.error("empty element"));
            }
            return Ok(Filter::Element(element.to_string()));
        }
        if ["and", "or", "not"].iter().any(|k| token.eq_ignore_ascii_case(k)) {
            return Err(self.error(format!("misplaced '{token}'")));
        }

        let mut spec = AtomSpec::default();
        let mut rest = token;
        if let Some(after) = rest.strip_prefix('[') {
            let Some(end) = after.find(']') else {
                return Err(self.error("missing ']'"));
            };
            spec.resname = Some(after[..end].to_string());
            rest = &after[end + 1..];
        }
        let (head, name) = match rest.split_once('.') {
            Some((head, name)) => (head, Some(name)),
            None => (rest, None),
        };
        let (number, chain) = match head.split_once(':') {
            Some((number, chain)) => (number, Some(chain)),
            None => (head, None),
        };
        if !number.is_empty() {
            spec.resno = Some(self.resno_range(number)?);
        }
        spec.chain = chain.filter(|c| !c.is_empty()).map(str::to_string);
        spec.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        if spec == AtomSpec::default() {
            return Err(self.error(format!("empty term '{token}'")));
        }
        Ok(Filter::Atom(spec))
    }

    fn resno_range(&self, text: &str) -> Result<(i32, i32)> {
        let parse = |s: &str| {
            s.parse::<i32>()
                .map_err(|_| self.error(format!("bad residue number '{s}'")))
        };
        // a leading '-' is a sign, the range separator comes after the first digit
        let split = text
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i);
        match split {
            Some(i) => {
                let (lo, hi) = (parse(&text[..i])?, parse(&text[i + 1..])?);
                Ok((lo.min(hi), lo.max(hi)))
            }
            None => {
                let n = parse(text)?;
                Ok((n, n))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use proptest::prelude::*;

    fn atom(name: &str, element: &str, resname: &str, resno: i32, chain: &str) -> Atom {
        Atom {
            name: name.to_string(),
            element: element.to_string(),
            resname: resname.to_string(),
            resno,
            chain: chain.to_string(),
            position: Vec3::ZERO,
        }
    }

    #[test]
    fn test_empty_is_all() {
        assert_eq!(Filter::parse("  ").unwrap(), Filter::All);
        assert_eq!(Filter::parse("*").unwrap(), Filter::All);
    }

    #[test]
    fn test_combined_term() {
        let f = Filter::parse("[G]10:A.N1").unwrap();
        assert!(f.matches(&atom("N1", "N", "G", 10, "A")));
        assert!(!f.matches(&atom("N1", "N", "G", 10, "B")));
        assert!(!f.matches(&atom("N3", "N", "G", 10, "A")));
    }

    #[test]
    fn test_ranges_and_negative_numbers() {
        let f = Filter::parse("20-10").unwrap();
        assert!(f.matches(&atom("CA", "C", "ALA", 15, "A")));
        assert!(!f.matches(&atom("CA", "C", "ALA", 21, "A")));
        let neg = Filter::parse("-3--1").unwrap();
        assert!(neg.matches(&atom("CA", "C", "ALA", -2, "A")));
    }

    #[test]
    fn test_boolean_precedence() {
        // not _C and 1 or :B  ==  ((not _C) and 1) or :B
        let f = Filter::parse("not _C and 1 or :B").unwrap();
        assert!(f.matches(&atom("N", "N", "ALA", 1, "A")));
        assert!(!f.matches(&atom("C", "C", "ALA", 1, "A")));
        assert!(f.matches(&atom("C", "C", "ALA", 5, "B")));
        let grouped = Filter::parse("not (_C or _N)").unwrap();
        assert!(grouped.matches(&atom("O", "O", "ALA", 1, "A")));
        assert!(!grouped.matches(&atom("N", "N", "ALA", 1, "A")));
    }

    #[test]
    fn test_errors() {
        for bad in ["(", "_C and", "[G", "x1", "and _C", "_C )", "."] {
            assert!(
                matches!(Filter::parse(bad), Err(MolscopeError::InvalidSelection { .. })),
                "{bad} should not parse"
            );
        }
    }

    proptest! {
        #[test]
        fn parse_never_panics(input in "[ _CNO\\[\\]():.0-9a-z*-]{0,24}") {
            let _ = Filter::parse(&input);
        }

        #[test]
        fn not_is_complement(
            element in "[CNOPS]",
            resno in -5i32..30,
            lo in -5i32..30,
            hi in -5i32..30,
        ) {
            let a = atom("X", &element, "ALA", resno, "A");
            for query in [format!("_{element}"), format!("{lo}-{hi}"), format!("_C or {lo}")] {
                let f = Filter::parse(&query).unwrap();
                let negated = Filter::parse(&format!("not ({query})")).unwrap();
                prop_assert_ne!(f.matches(&a), negated.matches(&a));
            }
        }
    }
}
