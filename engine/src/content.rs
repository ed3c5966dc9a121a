use std::collections::HashMap;

pub fn builtin_scenarios() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (
            "goblin_skirmish",
            include_str!("../content/scenarios/goblin_skirmish.json"),
        ),
        (
            "firebolt_volley",
            include_str!("../content/scenarios/firebolt_volley.json"),
        ),
    ])
}
