//! Advantage-aware d20 check roll.

use serde::{Deserialize, Serialize};

use crate::formula::{self, Keep, Op, Term};
use crate::{AdMode, Dice, EngineError};

/// Visibility of a roll. Carried through to the rendering collaborator,
/// never interpreted by the engine itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    #[default]
    Public,
    Private,
    Blind,
    SelfRoll,
}

fn default_critical() -> i32 {
    20
}

fn default_fumble() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOptions {
    #[serde(default)]
    pub advantage: AdMode,
    #[serde(default = "default_critical")]
    pub critical: i32,
    #[serde(default = "default_fumble")]
    pub fumble: i32,
    #[serde(default)]
    pub target_value: Option<i32>,
    #[serde(default)]
    pub roll_mode: RollMode,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            advantage: AdMode::Normal,
            critical: default_critical(),
            fumble: default_fumble(),
            target_value: None,
            roll_mode: RollMode::Public,
        }
    }
}

/// Externally supplied configuration, usually collected from a dialog.
/// A dismissed dialog yields no configuration at all (`None` at the
/// collaborator boundary), which aborts the surrounding resolution step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfiguration {
    /// Concrete modifier substituted for the formula's placeholder term.
    #[serde(default)]
    pub modifier: Option<i32>,
    /// Free-text bonus sub-formula appended to the check.
    #[serde(default)]
    pub bonus: Option<String>,
    #[serde(default)]
    pub roll_mode: Option<RollMode>,
    #[serde(default)]
    pub advantage: Option<AdMode>,
    /// Re-roll per target instead of reusing one evaluation for all.
    #[serde(default)]
    pub multi_roll: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub raw_rolls: Vec<i32>,
    pub kept: i32,
    pub total: i32,
    pub is_critical: bool,
    pub is_fumble: bool,
}

#[derive(Debug, Clone)]
pub struct CheckRoll {
    terms: Vec<Term>,
    formula: String,
    options: CheckOptions,
    outcome: Option<CheckOutcome>,
}

impl CheckRoll {
    /// Build a check from a base formula. The first term must be exactly
    /// one d20 or construction fails.
    pub fn new(formula_src: &str, options: CheckOptions) -> Result<Self, EngineError> {
        let terms = formula::parse(formula_src)?;
        match terms.first() {
            Some(Term::Die(d)) if d.count == 1 && d.faces == 20 => {}
            _ => {
                return Err(EngineError::invalid_formula(
                    formula_src,
                    "check rolls must start with a single d20",
                ));
            }
        }
        let mut roll = Self {
            terms,
            formula: String::new(),
            options,
            outcome: None,
        };
        roll.configure_modifiers();
        Ok(roll)
    }

    /// Rewrite the d20 term for the current advantage mode and copy the
    /// threshold options onto it, then re-derive the formula string.
    pub fn configure_modifiers(&mut self) {
        if let Some(Term::Die(die)) = self.terms.first_mut() {
            die.keep = None;
            match self.options.advantage {
                AdMode::Advantage => {
                    die.count = 2;
                    die.keep = Some(Keep::Highest);
                }
                AdMode::Disadvantage => {
                    die.count = 2;
                    die.keep = Some(Keep::Lowest);
                }
                AdMode::Normal => die.count = 1,
            }
            die.critical = Some(self.options.critical);
            die.fumble = Some(self.options.fumble);
            die.target_value = self.options.target_value;
        }
        self.formula = formula::derive_formula(&self.terms);
    }

    /// Apply a dialog-confirmed configuration and re-run the modifier pass.
    pub fn apply_configuration(&mut self, cfg: &CheckConfiguration) -> Result<(), EngineError> {
        if let Some(modifier) = cfg.modifier {
            formula::substitute_placeholders(&mut self.terms, modifier);
        }
        if let Some(bonus) = &cfg.bonus {
            let bonus = bonus.trim();
            if !bonus.is_empty() {
                let bonus_terms = formula::parse(bonus)?;
                if !bonus_terms[0].is_operator() {
                    self.terms.push(Term::Operator(Op::Plus));
                }
                self.terms.extend(bonus_terms);
            }
        }
        if let Some(mode) = cfg.roll_mode {
            self.options.roll_mode = mode;
        }
        if let Some(advantage) = cfg.advantage {
            self.options.advantage = advantage;
        }
        self.configure_modifiers();
        Ok(())
    }

    pub fn evaluate(&mut self, dice: &mut Dice) -> &CheckOutcome {
        let eval = formula::evaluate(&self.terms, dice);
        let die = &eval.terms[0];
        let kept = die.kept.unwrap_or(die.value);
        self.outcome.insert(CheckOutcome {
            raw_rolls: die.rolls.clone(),
            kept,
            total: eval.total,
            is_critical: kept >= self.options.critical,
            is_fumble: kept <= self.options.fumble,
        })
    }

    /// Re-evaluate with the same formula and options. The roll keeps its
    /// identity; only the evaluated outcome is replaced.
    pub fn reroll(&mut self, dice: &mut Dice) -> &CheckOutcome {
        self.evaluate(dice)
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn outcome(&self) -> Option<&CheckOutcome> {
        self.outcome.as_ref()
    }

    /// Derived from the stored advantage mode, not live die state, so
    /// repeated reconfiguration stays consistent.
    pub fn has_advantage(&self) -> bool {
        self.options.advantage == AdMode::Advantage
    }

    pub fn has_disadvantage(&self) -> bool {
        self.options.advantage == AdMode::Disadvantage
    }
}
