use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Parser, Subcommand, ValueEnum};
use engine::api::{self, ScenarioConfig};
use engine::{
    AdMode, CheckConfiguration, CheckOptions, CheckRoll, DamageOptions, DamageRoll, DamageType,
    Dice,
};

#[derive(Copy, Clone, ValueEnum)]
enum Adv {
    Normal,
    Advantage,
    Disadvantage,
}

#[derive(Subcommand)]
enum Cmd {
    /// Evaluate a dice formula and print the result
    Roll {
        /// Formula such as "2d6 + 3" or "2d20kh"
        formula: String,
        /// RNG seed for determinism
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Number of evaluations
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Roll a d20 check with advantage handling and a modifier
    Check {
        /// Base formula; must start with a single d20
        #[arg(default_value = "1d20 + @mod")]
        formula: String,
        /// RNG seed for determinism
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Advantage mode
        #[arg(long, value_enum, default_value_t = Adv::Normal)]
        adv: Adv,
        /// Modifier substituted for the formula's placeholder
        #[arg(long, default_value_t = 0)]
        modifier: i32,
        /// Extra bonus sub-formula appended to the check
        #[arg(long)]
        bonus: Option<String>,
    },
    /// Roll a damage formula, optionally as a critical hit
    Damage {
        /// Formula such as "1d6 + 1d8 + 2"
        formula: String,
        /// RNG seed for determinism
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Damage types as "category:subtype", one per term position
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
        /// Apply critical-hit mutations
        #[arg(long)]
        crit: bool,
        /// Extra dice added to the first dice term on a critical
        #[arg(long, default_value_t = 0)]
        bonus_dice: u32,
        /// Also multiply flat numeric terms on a critical
        #[arg(long)]
        multiply_numeric: bool,
    },
    /// Resolve a scenario file (JSON or YAML) and print the result
    Resolve {
        /// Path to a scenario file
        #[arg(long, conflicts_with = "builtin")]
        file: Option<PathBuf>,
        /// Name of a compiled-in demo scenario
        #[arg(long)]
        builtin: Option<String>,
        /// Override the scenario's RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Pretty-print the result JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Parser)]
#[command(name = "resolve-cli")]
#[command(about = "Action resolution CLI harness")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

fn to_mode(a: Adv) -> AdMode {
    match a {
        Adv::Normal => AdMode::Normal,
        Adv::Advantage => AdMode::Advantage,
        Adv::Disadvantage => AdMode::Disadvantage,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Roll {
            formula,
            seed,
            count,
        } => {
            let terms = engine::formula::parse(&formula)?;
            let mut dice = Dice::from_seed(seed);
            for _ in 0..count {
                let eval = engine::formula::evaluate(&terms, &mut dice);
                let rolls: Vec<String> = eval
                    .terms
                    .iter()
                    .filter(|t| !t.rolls.is_empty())
                    .map(|t| format!("{:?}", t.rolls))
                    .collect();
                println!("{} = {} {}", formula, eval.total, rolls.join(" "));
            }
        }
        Cmd::Check {
            formula,
            seed,
            adv,
            modifier,
            bonus,
        } => {
            let mut dice = Dice::from_seed(seed);
            let mut roll = CheckRoll::new(&formula, CheckOptions::default())?;
            roll.apply_configuration(&CheckConfiguration {
                modifier: Some(modifier),
                bonus,
                advantage: Some(to_mode(adv)),
                ..CheckConfiguration::default()
            })?;
            let outcome = roll.evaluate(&mut dice).clone();
            println!(
                "{} → rolls={:?} kept={} total={}{}{}",
                roll.formula(),
                outcome.raw_rolls,
                outcome.kept,
                outcome.total,
                if outcome.is_critical { " CRIT!" } else { "" },
                if outcome.is_fumble { " FUMBLE" } else { "" },
            );
        }
        Cmd::Damage {
            formula,
            seed,
            types,
            crit,
            bonus_dice,
            multiply_numeric,
        } => {
            let types = types
                .iter()
                .map(|s| DamageType::from_str(s).map_err(|e| anyhow!(e)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut dice = Dice::from_seed(seed);
            let mut roll = DamageRoll::new(
                &formula,
                DamageOptions {
                    is_critical: crit,
                    critical_bonus_dice: bonus_dice,
                    multiply_numeric,
                    types,
                    ..DamageOptions::default()
                },
            )?;
            let outcome = roll.evaluate(&mut dice).clone();
            println!("{} = {}", roll.formula(), outcome.total);
            for component in &outcome.components {
                println!("  {} {}", component.damage_type, component.amount);
            }
        }
        Cmd::Resolve {
            file,
            builtin,
            seed,
            pretty,
        } => {
            let mut cfg: ScenarioConfig = match (&file, &builtin) {
                (Some(path), _) => api::load_scenario(path)?,
                (None, Some(name)) => api::builtin_scenario(name)?,
                (None, None) => return Err(anyhow!("pass --file or --builtin")),
            };
            if let Some(seed) = seed {
                cfg.seed = seed;
                cfg.rolls.clear();
            }
            let result = api::run_scenario(cfg)?;
            if pretty {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", serde_json::to_string(&result)?);
            }
        }
    }
    Ok(())
}
