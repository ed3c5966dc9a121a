//! Dice-formula term model.
//!
//! A formula is a flat list of terms ("2d6 + 3", "{1d6, 1d8} + @mod").
//! Later stages tag terms with damage types, rewrite dice for advantage or
//! critical hits, and re-derive the canonical string after every mutation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::damage::DamageType;
use crate::{Dice, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Plus,
    Minus,
    Times,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Times => "*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    Highest,
    Lowest,
}

/// Metadata shared by every non-operator term. Operator terms carry none,
/// which keeps the "operators never have a damage type" invariant structural.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMeta {
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub is_critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieTerm {
    pub count: u32,
    pub faces: u32,
    #[serde(default)]
    pub keep: Option<Keep>,
    /// Original count captured before critical mutation, so reconfiguring
    /// the roll resets cleanly.
    #[serde(default)]
    pub base_count: Option<u32>,
    #[serde(default)]
    pub critical: Option<i32>,
    #[serde(default)]
    pub fumble: Option<i32>,
    #[serde(default)]
    pub target_value: Option<i32>,
    #[serde(default)]
    pub meta: TermMeta,
}

impl DieTerm {
    pub fn new(count: u32, faces: u32) -> Self {
        Self {
            count,
            faces,
            keep: None,
            base_count: None,
            critical: None,
            fumble: None,
            target_value: None,
            meta: TermMeta::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantTerm {
    pub value: i32,
    /// Original value captured before critical multiplication.
    #[serde(default)]
    pub base_value: Option<i32>,
    /// Unresolved placeholder ("@mod"); evaluates to 0 until substituted.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub meta: TermMeta,
}

impl ConstantTerm {
    pub fn new(value: i32) -> Self {
        Self {
            value,
            base_value: None,
            symbol: None,
            meta: TermMeta::default(),
        }
    }

    pub fn placeholder(symbol: impl Into<String>) -> Self {
        Self {
            value: 0,
            base_value: None,
            symbol: Some(symbol.into()),
            meta: TermMeta::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolTerm {
    /// Comma-separated sub-formulas inside the braces.
    pub groups: Vec<Vec<Term>>,
    #[serde(default)]
    pub meta: TermMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Die(DieTerm),
    Operator(Op),
    Constant(ConstantTerm),
    Pool(PoolTerm),
}

impl Term {
    pub fn is_operator(&self) -> bool {
        matches!(self, Term::Operator(_))
    }

    pub fn meta(&self) -> Option<&TermMeta> {
        match self {
            Term::Die(d) => Some(&d.meta),
            Term::Constant(c) => Some(&c.meta),
            Term::Pool(p) => Some(&p.meta),
            Term::Operator(_) => None,
        }
    }

    pub fn meta_mut(&mut self) -> Option<&mut TermMeta> {
        match self {
            Term::Die(d) => Some(&mut d.meta),
            Term::Constant(c) => Some(&mut c.meta),
            Term::Pool(p) => Some(&mut p.meta),
            Term::Operator(_) => None,
        }
    }

    pub fn damage_type(&self) -> Option<&DamageType> {
        self.meta().and_then(|m| m.damage_type.as_ref())
    }
}

/* ---------------- parsing ---------------- */

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, reason: impl Into<String>) -> EngineError {
        EngineError::invalid_formula(self.src, reason)
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.src[start..self.pos].parse().ok()
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn terms(&mut self, stop: &[u8]) -> Result<Vec<Term>, EngineError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else { break };
            if stop.contains(&c) {
                break;
            }
            match c {
                b'+' => {
                    self.pos += 1;
                    out.push(Term::Operator(Op::Plus));
                }
                b'-' => {
                    self.pos += 1;
                    out.push(Term::Operator(Op::Minus));
                }
                b'*' => {
                    self.pos += 1;
                    out.push(Term::Operator(Op::Times));
                }
                b'{' => {
                    self.pos += 1;
                    out.push(self.pool()?);
                }
                b'@' => {
                    self.pos += 1;
                    let name = self.ident();
                    if name.is_empty() {
                        return Err(self.err("'@' must be followed by a placeholder name"));
                    }
                    out.push(Term::Constant(ConstantTerm::placeholder(name)));
                }
                _ => out.push(self.value()?),
            }
        }
        Ok(out)
    }

    fn pool(&mut self) -> Result<Term, EngineError> {
        let mut groups = Vec::new();
        loop {
            let group = self.terms(&[b',', b'}'])?;
            if group.is_empty() {
                return Err(self.err("empty pool group"));
            }
            groups.push(group);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.err("unterminated pool")),
            }
        }
        Ok(Term::Pool(PoolTerm {
            groups,
            meta: TermMeta::default(),
        }))
    }

    fn value(&mut self) -> Result<Term, EngineError> {
        let count = self.number();
        let is_die = matches!(self.peek(), Some(b'd') | Some(b'D'))
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit());
        if is_die {
            self.pos += 1;
            let faces = self
                .number()
                .ok_or_else(|| self.err("die term is missing a face count"))?;
            if faces == 0 {
                return Err(self.err("die face count must be at least 1"));
            }
            let mut die = DieTerm::new(count.unwrap_or(1), faces);
            if self.peek() == Some(b'k') {
                die.keep = match self.peek_at(1) {
                    Some(b'h') => Some(Keep::Highest),
                    Some(b'l') => Some(Keep::Lowest),
                    _ => return Err(self.err("keep modifier must be 'kh' or 'kl'")),
                };
                self.pos += 2;
            }
            return Ok(Term::Die(die));
        }
        match count {
            Some(n) => Ok(Term::Constant(ConstantTerm::new(n as i32))),
            None => Err(self.err(format!(
                "unexpected character '{}'",
                self.src[self.pos..].chars().next().unwrap_or(' ')
            ))),
        }
    }
}

/// Parse a dice formula into its term list.
pub fn parse(src: &str) -> Result<Vec<Term>, EngineError> {
    let mut parser = Parser::new(src);
    let terms = parser.terms(&[])?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(parser.err("trailing characters after formula"));
    }
    if terms.is_empty() {
        return Err(EngineError::invalid_formula(src, "formula is empty"));
    }
    Ok(terms)
}

/* ---------------- traversal & serialization ---------------- */

/// Depth-first traversal, recursing into pool groups. The visitor receives
/// the term's index within its own list and the operator immediately
/// preceding it (None when the previous term is not an operator).
pub fn walk<F>(terms: &[Term], visitor: &mut F)
where
    F: FnMut(usize, &Term, Option<Op>),
{
    let mut prev_op = None;
    for (i, term) in terms.iter().enumerate() {
        visitor(i, term, prev_op);
        if let Term::Pool(pool) = term {
            for group in &pool.groups {
                walk(group, visitor);
            }
        }
        prev_op = match term {
            Term::Operator(op) => Some(*op),
            _ => None,
        };
    }
}

pub fn walk_mut<F>(terms: &mut [Term], visitor: &mut F)
where
    F: FnMut(usize, &mut Term, Option<Op>),
{
    let mut prev_op = None;
    for (i, term) in terms.iter_mut().enumerate() {
        visitor(i, term, prev_op);
        if let Term::Pool(pool) = term {
            for group in &mut pool.groups {
                walk_mut(group, visitor);
            }
        }
        prev_op = match term {
            Term::Operator(op) => Some(*op),
            _ => None,
        };
    }
}

fn term_string(term: &Term) -> String {
    match term {
        Term::Die(d) => {
            let keep = match d.keep {
                Some(Keep::Highest) => "kh",
                Some(Keep::Lowest) => "kl",
                None => "",
            };
            format!("{}d{}{}", d.count, d.faces, keep)
        }
        Term::Operator(op) => op.as_str().to_string(),
        Term::Constant(c) => match &c.symbol {
            Some(symbol) => format!("@{}", symbol),
            None => c.value.to_string(),
        },
        Term::Pool(p) => {
            let groups: Vec<String> = p.groups.iter().map(|g| derive_formula(g)).collect();
            format!("{{{}}}", groups.join(", "))
        }
    }
}

/// Canonical re-serialization of a term list. Called after every mutation
/// so the displayed formula matches the mutated terms.
pub fn derive_formula(terms: &[Term]) -> String {
    terms
        .iter()
        .map(term_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assign damage types positionally. Operator terms are skipped; the type
/// for term `i` is `types[i-1]` when term `i-1` is an operator, else
/// `types[i]`. This keeps "+"-joined groups aligned with the flat type
/// list supplied by the caller.
pub fn assign_damage_types(terms: &mut [Term], types: &[DamageType]) {
    for i in 0..terms.len() {
        if terms[i].is_operator() {
            continue;
        }
        let idx = if i > 0 && terms[i - 1].is_operator() {
            i - 1
        } else {
            i
        };
        if let Some(damage_type) = types.get(idx) {
            if let Some(meta) = terms[i].meta_mut() {
                meta.damage_type = Some(damage_type.clone());
            }
        }
    }
}

/// Substitute every unresolved placeholder constant with a concrete value.
pub fn substitute_placeholders(terms: &mut [Term], value: i32) {
    walk_mut(terms, &mut |_, term, _| {
        if let Term::Constant(c) = term {
            if c.symbol.take().is_some() {
                c.value = value;
            }
        }
    });
}

/* ---------------- evaluation ---------------- */

/// Evaluated state of one value term (operators produce no entry).
#[derive(Debug, Clone, PartialEq)]
pub struct TermEval {
    /// The term's own value before the preceding operator is applied.
    pub value: i32,
    /// Contribution to the total after sign and `*` folding.
    pub signed: i32,
    pub rolls: Vec<i32>,
    /// The single die kept under a kh/kl modifier.
    pub kept: Option<i32>,
    pub damage_type: Option<DamageType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub total: i32,
    pub terms: Vec<TermEval>,
}

fn eval_value(term: &Term, dice: &mut Dice) -> (i32, Vec<i32>, Option<i32>) {
    match term {
        Term::Die(d) => {
            let rolls: Vec<i32> = (0..d.count).map(|_| dice.roll(d.faces)).collect();
            match d.keep {
                Some(Keep::Highest) => {
                    let kept = rolls.iter().copied().max().unwrap_or(0);
                    (kept, rolls, Some(kept))
                }
                Some(Keep::Lowest) => {
                    let kept = rolls.iter().copied().min().unwrap_or(0);
                    (kept, rolls, Some(kept))
                }
                None => (rolls.iter().sum(), rolls, None),
            }
        }
        Term::Constant(c) => (if c.symbol.is_some() { 0 } else { c.value }, Vec::new(), None),
        Term::Pool(p) => {
            let mut value = 0;
            let mut rolls = Vec::new();
            for group in &p.groups {
                let eval = evaluate(group, dice);
                value += eval.total;
                for t in eval.terms {
                    rolls.extend(t.rolls);
                }
            }
            (value, rolls, None)
        }
        Term::Operator(_) => (0, Vec::new(), None),
    }
}

/// Left-to-right fold over the term list. `*` multiplies into the previous
/// term's contribution (its own entry is kept with a zero contribution so
/// indices still line up with the non-operator terms).
pub fn evaluate(terms: &[Term], dice: &mut Dice) -> Evaluation {
    let mut evals: Vec<TermEval> = Vec::new();
    let mut pending = Op::Plus;
    for term in terms {
        if let Term::Operator(op) = term {
            pending = *op;
            continue;
        }
        let (value, rolls, kept) = eval_value(term, dice);
        let damage_type = term.damage_type().cloned();
        let signed = match pending {
            Op::Plus => value,
            Op::Minus => -value,
            Op::Times => {
                if let Some(last) = evals.last_mut() {
                    last.signed *= value;
                    0
                } else {
                    value
                }
            }
        };
        evals.push(TermEval {
            value,
            signed,
            rolls,
            kept,
            damage_type,
        });
        pending = Op::Plus;
    }
    Evaluation {
        total: evals.iter().map(|e| e.signed).sum(),
        terms: evals,
    }
}

/// Collapse an evaluation into per-damage-type totals, first-seen order.
pub fn typed_totals(eval: &Evaluation) -> Vec<(DamageType, i32)> {
    let mut totals: IndexMap<DamageType, i32> = IndexMap::new();
    for term in &eval.terms {
        if let Some(damage_type) = &term.damage_type {
            *totals.entry(damage_type.clone()).or_insert(0) += term.signed;
        }
    }
    totals.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dice_and_constants() {
        let terms = parse("2d6 + 3").unwrap();
        assert_eq!(terms.len(), 3);
        assert!(matches!(&terms[0], Term::Die(d) if d.count == 2 && d.faces == 6));
        assert!(matches!(&terms[1], Term::Operator(Op::Plus)));
        assert!(matches!(&terms[2], Term::Constant(c) if c.value == 3));
    }

    #[test]
    fn parse_implicit_count_and_keep() {
        let terms = parse("d20kh").unwrap();
        assert!(matches!(&terms[0], Term::Die(d) if d.count == 1 && d.keep == Some(Keep::Highest)));
    }

    #[test]
    fn parse_placeholder() {
        let terms = parse("1d20 + @mod").unwrap();
        assert!(matches!(&terms[2], Term::Constant(c) if c.symbol.as_deref() == Some("mod")));
    }

    #[test]
    fn parse_pool() {
        let terms = parse("{1d6, 1d8} + 2").unwrap();
        let Term::Pool(pool) = &terms[0] else {
            panic!("expected pool");
        };
        assert_eq!(pool.groups.len(), 2);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("2d").is_err());
        assert!(parse("2d6 %").is_err());
        assert!(parse("{1d6").is_err());
        assert!(parse("@").is_err());
    }

    #[test]
    fn derive_round_trips() {
        for src in ["2d6 + 3", "1d20kh - 2 * 3", "{1d6, 1d8} + @mod"] {
            let terms = parse(src).unwrap();
            let derived = derive_formula(&terms);
            assert_eq!(parse(&derived).unwrap(), terms, "round trip for {src}");
        }
    }

    #[test]
    fn walk_reports_preceding_operator() {
        let terms = parse("2d6 + 3 - 1d4").unwrap();
        let mut seen = Vec::new();
        walk(&terms, &mut |i, term, prev| {
            if !term.is_operator() {
                seen.push((i, prev));
            }
        });
        assert_eq!(
            seen,
            vec![(0, None), (2, Some(Op::Plus)), (4, Some(Op::Minus))]
        );
    }
}
