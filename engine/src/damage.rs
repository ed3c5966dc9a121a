//! Critical-aware multi-term damage roll and damage-type value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::check::RollMode;
use crate::formula::{self, ConstantTerm, Op, Term, TermMeta};
use crate::{Dice, EngineError};

/// A (category, subtype) pair such as ("phys", "slash") or ("elem", "fire").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageType {
    pub category: String,
    pub subtype: String,
}

impl DamageType {
    pub fn new(category: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            subtype: subtype.into(),
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.subtype)
    }
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, subtype) = s
            .split_once(':')
            .ok_or_else(|| format!("damage type '{}' must be 'category:subtype'", s))?;
        if category.is_empty() || subtype.is_empty() {
            return Err(format!("damage type '{}' has an empty part", s));
        }
        Ok(Self::new(category, subtype))
    }
}

/// One formula fragment with the damage types for its terms, replacing the
/// loose `[part, [[category, subtype], ...]]` arrays of older data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageComponent {
    pub formula: String,
    pub types: Vec<DamageType>,
}

impl DamageComponent {
    /// Join components into one formula and build the positional type list
    /// for it, so that after type assignment every value term carries the
    /// type of the component it came from. An optional flat bonus is
    /// appended last and inherits the final component's type.
    pub fn combine(
        components: &[DamageComponent],
        bonus: i32,
    ) -> Result<(String, Vec<DamageType>), EngineError> {
        if components.is_empty() {
            return Err(EngineError::invalid_formula("", "no damage components"));
        }
        let mut formula_src = String::new();
        let mut value_types: Vec<DamageType> = Vec::new();
        for (i, component) in components.iter().enumerate() {
            if i > 0 {
                formula_src.push_str(" + ");
            }
            formula_src.push_str(component.formula.trim());
            let terms = formula::parse(component.formula.trim())?;
            let values = terms.iter().filter(|t| !t.is_operator()).count();
            for k in 0..values {
                let damage_type = component
                    .types
                    .get(k)
                    .or_else(|| component.types.last())
                    .cloned()
                    .unwrap_or_else(|| DamageType::new("untyped", "untyped"));
                value_types.push(damage_type);
            }
        }
        if bonus != 0 {
            let op = if bonus > 0 { '+' } else { '-' };
            formula_src.push_str(&format!(" {} {}", op, bonus.abs()));
            let damage_type = value_types
                .last()
                .cloned()
                .unwrap_or_else(|| DamageType::new("untyped", "untyped"));
            value_types.push(damage_type);
        }
        let combined = formula::parse(&formula_src)?;
        let positional = positional_types(&combined, &value_types);
        Ok((formula_src, positional))
    }
}

/// Expand one-type-per-value-term into the positional array the assignment
/// pass indexes into: a value term at position i reads index i - 1 when an
/// operator precedes it, index i otherwise. Gaps left by that scheme are
/// padded with the nearest earlier type.
fn positional_types(terms: &[Term], per_value: &[DamageType]) -> Vec<DamageType> {
    let mut slots: Vec<Option<DamageType>> = vec![None; terms.len()];
    let mut next = 0usize;
    for (i, term) in terms.iter().enumerate() {
        if term.is_operator() {
            continue;
        }
        let index = if i > 0 && terms[i - 1].is_operator() {
            i - 1
        } else {
            i
        };
        if let Some(damage_type) = per_value.get(next) {
            slots[index] = Some(damage_type.clone());
        }
        next += 1;
    }
    let mut out = Vec::with_capacity(slots.len());
    let mut last: Option<DamageType> = None;
    for slot in slots {
        match slot {
            Some(damage_type) => {
                last = Some(damage_type.clone());
                out.push(damage_type);
            }
            None => out.push(
                last.clone()
                    .unwrap_or_else(|| DamageType::new("untyped", "untyped")),
            ),
        }
    }
    out
}

/// A single typed contribution of an evaluated damage roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDamage {
    pub damage_type: DamageType,
    pub amount: i32,
}

fn default_critical_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageOptions {
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub critical_bonus_dice: u32,
    #[serde(default = "default_critical_multiplier")]
    pub critical_multiplier: f64,
    #[serde(default)]
    pub multiply_numeric: bool,
    /// One entry per non-operator term, aligned positionally.
    #[serde(default)]
    pub types: Vec<DamageType>,
    #[serde(default)]
    pub roll_mode: RollMode,
}

impl Default for DamageOptions {
    fn default() -> Self {
        Self {
            is_critical: false,
            critical_bonus_dice: 0,
            critical_multiplier: default_critical_multiplier(),
            multiply_numeric: false,
            types: Vec::new(),
            roll_mode: RollMode::Public,
        }
    }
}

/// Dialog-confirmed reconfiguration; unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DamageConfiguration {
    #[serde(default)]
    pub is_critical: Option<bool>,
    #[serde(default)]
    pub critical_bonus_dice: Option<u32>,
    #[serde(default)]
    pub critical_multiplier: Option<f64>,
    #[serde(default)]
    pub multiply_numeric: Option<bool>,
    #[serde(default)]
    pub roll_mode: Option<RollMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageOutcome {
    pub total: i32,
    pub components: Vec<TypedDamage>,
}

#[derive(Debug, Clone)]
pub struct DamageRoll {
    terms: Vec<Term>,
    formula: String,
    options: DamageOptions,
    /// Index of the single tracked critical-bonus constant, if inserted.
    bonus_slot: Option<usize>,
    outcome: Option<DamageOutcome>,
}

impl DamageRoll {
    pub fn new(formula_src: &str, options: DamageOptions) -> Result<Self, EngineError> {
        let terms = formula::parse(formula_src)?;
        let mut roll = Self {
            terms,
            formula: String::new(),
            options,
            bonus_slot: None,
            outcome: None,
        };
        roll.configure_damage();
        Ok(roll)
    }

    pub fn apply_configuration(&mut self, cfg: &DamageConfiguration) {
        if let Some(v) = cfg.is_critical {
            self.options.is_critical = v;
        }
        if let Some(v) = cfg.critical_bonus_dice {
            self.options.critical_bonus_dice = v;
        }
        if let Some(v) = cfg.critical_multiplier {
            self.options.critical_multiplier = v;
        }
        if let Some(v) = cfg.multiply_numeric {
            self.options.multiply_numeric = v;
        }
        if let Some(v) = cfg.roll_mode {
            self.options.roll_mode = v;
        }
        self.configure_damage();
    }

    /// Tag every non-operator term with its damage type, reset dice and
    /// constants to their base state, then apply critical mutations. Safe
    /// to run again after reconfiguration.
    ///
    /// Dice inside pool groups are left alone: the critical pass rewrites
    /// top-level terms only, so a pool contributes no bonus dice and no
    /// flat face total.
    pub fn configure_damage(&mut self) {
        // Undo a previous critical pass before mutating anything.
        if let Some(slot) = self.bonus_slot.take() {
            // Remove the bonus constant and the operator in front of it.
            self.terms.remove(slot);
            self.terms.remove(slot - 1);
        }
        for term in &mut self.terms {
            match term {
                Term::Die(die) => {
                    let base = *die.base_count.get_or_insert(die.count);
                    die.count = base;
                    die.meta.is_critical = false;
                }
                Term::Constant(constant) => {
                    let base = *constant.base_value.get_or_insert(constant.value);
                    constant.value = base;
                    constant.meta.is_critical = false;
                }
                _ => {}
            }
        }

        formula::assign_damage_types(&mut self.terms, &self.options.types);

        if self.options.is_critical {
            self.apply_critical();
        }
        self.formula = formula::derive_formula(&self.terms);
    }

    /// Critical mutation: every dice term contributes its full face total
    /// to one shared flat bonus constant, inserted immediately after
    /// position 0 the first time and updated in place afterwards. Bonus
    /// dice are added to the first dice term only; numeric terms are
    /// multiplied when `multiply_numeric` is set.
    fn apply_critical(&mut self) {
        let first_type = self
            .terms
            .iter()
            .find(|t| !t.is_operator())
            .and_then(|t| t.damage_type().cloned());
        let mut crit_bonus = 0i32;
        let mut first_die = true;
        let mut i = 0;
        while i < self.terms.len() {
            if self.bonus_slot.is_some_and(|slot| i + 1 == slot || i == slot) {
                i += 1;
                continue;
            }
            let die_faces = match &mut self.terms[i] {
                Term::Die(die) => {
                    let base = die.base_count.unwrap_or(die.count);
                    die.meta.is_critical = true;
                    if first_die {
                        die.count = base + self.options.critical_bonus_dice;
                        first_die = false;
                    }
                    Some((base, die.faces))
                }
                Term::Constant(constant) => {
                    if self.options.multiply_numeric && constant.symbol.is_none() {
                        let base = constant.base_value.unwrap_or(constant.value);
                        constant.value = (base as f64 * self.options.critical_multiplier) as i32;
                        constant.meta.is_critical = true;
                    }
                    None
                }
                _ => None,
            };
            if let Some((base, faces)) = die_faces {
                crit_bonus += (base * faces) as i32;
                match self.bonus_slot {
                    Some(slot) => {
                        if let Term::Constant(constant) = &mut self.terms[slot] {
                            constant.value = crit_bonus;
                        }
                    }
                    None => {
                        let constant = ConstantTerm {
                            value: crit_bonus,
                            base_value: None,
                            symbol: None,
                            meta: TermMeta {
                                damage_type: first_type.clone(),
                                is_critical: true,
                            },
                        };
                        self.terms.insert(1, Term::Operator(Op::Plus));
                        self.terms.insert(2, Term::Constant(constant));
                        self.bonus_slot = Some(2);
                        if i >= 1 {
                            i += 2;
                        }
                    }
                }
            }
            i += 1;
        }
    }

    pub fn evaluate(&mut self, dice: &mut Dice) -> &DamageOutcome {
        let eval = formula::evaluate(&self.terms, dice);
        let components = formula::typed_totals(&eval)
            .into_iter()
            .map(|(damage_type, amount)| TypedDamage {
                damage_type,
                amount,
            })
            .collect();
        self.outcome.insert(DamageOutcome {
            total: eval.total,
            components,
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn options(&self) -> &DamageOptions {
        &self.options
    }

    pub fn outcome(&self) -> Option<&DamageOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_critical(&self) -> bool {
        self.options.is_critical
    }
}
