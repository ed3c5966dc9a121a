use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("cli").expect("binary builds")
}

#[test]
fn roll_is_seed_deterministic() {
    let first = cli()
        .args(["roll", "2d6 + 3", "--seed", "42"])
        .assert()
        .success();
    let out = String::from_utf8(first.get_output().stdout.clone()).unwrap();

    cli()
        .args(["roll", "2d6 + 3", "--seed", "42"])
        .assert()
        .success()
        .stdout(predicate::eq(out));
}

#[test]
fn roll_rejects_garbage_formulas() {
    cli().args(["roll", "2d6 %"]).assert().failure();
}

#[test]
fn check_reports_kept_die_and_total() {
    cli()
        .args(["check", "--modifier", "3", "--adv", "advantage", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2d20kh + 3"))
        .stdout(predicate::str::contains("total="));
}

#[test]
fn damage_crit_shows_the_mutated_formula() {
    cli()
        .args([
            "damage",
            "2d6",
            "--crit",
            "--bonus-dice",
            "1",
            "--type",
            "phys:slash",
            "--seed",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("3d6 + 12"))
        .stdout(predicate::str::contains("phys:slash"));
}

#[test]
fn resolve_runs_a_builtin_scenario() {
    cli()
        .args(["resolve", "--builtin", "goblin_skirmish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("summaries"))
        .stdout(predicate::str::contains("goblin"));
}

#[test]
fn resolve_requires_a_source() {
    cli().arg("resolve").assert().failure();
}

#[test]
fn resolve_rejects_unknown_builtins() {
    cli()
        .args(["resolve", "--builtin", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}
