//! Build script for tweezer-rig
//!
//! Validates the embedded rig.toml and schedule.toml at compile time.

use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    validate_rig_config();
    validate_schedule();
}

/// Read and parse a TOML file, panicking with a framed message on failure
fn load(name: &str) -> toml::Table {
    println!("cargo:rerun-if-changed={}", name);

    let content = match fs::read_to_string(Path::new(name)) {
        Ok(content) => content,
        Err(e) => fail(&format!("Failed to read {}", name), &[e.to_string()]),
    };
    match toml::from_str(&content) {
        Ok(table) => table,
        Err(e) => fail(
            &format!("Invalid TOML syntax in {}", name),
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    }
}

fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|line| {
                let truncated = if line.len() > 62 {
                    format!("{}...", &line[..59])
                } else {
                    line.clone()
                };
                format!("║  • {:<62} ║", truncated)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn positive(section: &toml::Table, section_name: &str, key: &str, errors: &mut Vec<String>) {
    match section.get(key) {
        Some(toml::Value::Integer(v)) if *v <= 0 => {
            errors.push(format!("[{}] {} must be positive", section_name, key))
        }
        Some(toml::Value::Float(v)) if *v <= 0.0 => {
            errors.push(format!("[{}] {} must be positive", section_name, key))
        }
        Some(toml::Value::Integer(_)) | Some(toml::Value::Float(_)) | None => {}
        Some(_) => errors.push(format!("[{}] {} must be a number", section_name, key)),
    }
}

/// Validate rig.toml
fn validate_rig_config() {
    let config = load("rig.toml");
    let mut errors = Vec::new();

    const SECTIONS: &[&str] = &[
        "sequencer",
        "planner",
        "scan",
        "detection",
        "camera",
        "slm",
        "focus",
        "stage",
        "runtime",
        "simulation",
    ];
    for (name, value) in &config {
        if !SECTIONS.contains(&name.as_str()) {
            errors.push(format!("Unknown section [{}]", name));
        } else if !value.is_table() {
            errors.push(format!("[{}] must be a table", name));
        }
    }

    let empty = toml::Table::new();
    let section = |name: &str| config.get(name).and_then(|v| v.as_table()).unwrap_or(&empty);

    positive(section("planner"), "planner", "cell_width", &mut errors);
    positive(section("camera"), "camera", "frame_interval_ms", &mut errors);
    positive(section("runtime"), "runtime", "tick_interval_ms", &mut errors);
    positive(section("runtime"), "runtime", "health_interval_ms", &mut errors);
    positive(section("sequencer"), "sequencer", "lift_step_ticks", &mut errors);

    if let Some(toml::Value::String(model)) = section("camera").get("model") {
        if !["basler", "thorlabs"].contains(&model.as_str()) {
            errors.push("[camera] model must be 'basler' or 'thorlabs'".to_string());
        }
    }
    if let Some(toml::Value::String(dir)) = section("scan").get("initial_direction") {
        if !["up", "down", "left", "right"].contains(&dir.as_str()) {
            errors.push("[scan] initial_direction must be up, down, left or right".to_string());
        }
    }

    if !errors.is_empty() {
        fail("Invalid rig configuration", &errors);
    }
}

/// Validate schedule.toml
fn validate_schedule() {
    let schedule = load("schedule.toml");
    let mut errors = Vec::new();

    match schedule.get("experiment") {
        Some(toml::Value::Array(steps)) => {
            for (i, step) in steps.iter().enumerate() {
                let Some(step) = step.as_table() else {
                    errors.push(format!("experiment step {} must be a table", i));
                    continue;
                };
                let xm = step.get("xm").and_then(|v| v.as_array()).map(Vec::len);
                let ym = step.get("ym").and_then(|v| v.as_array()).map(Vec::len);
                if xm.is_some() != ym.is_some() {
                    errors.push(format!("experiment step {} needs both xm and ym", i));
                }
                let gx = step.get("ghost_traps_x").is_some();
                let gy = step.get("ghost_traps_y").is_some();
                if gx != gy {
                    errors.push(format!(
                        "experiment step {} needs both ghost_traps_x and ghost_traps_y",
                        i
                    ));
                }
            }
        }
        Some(_) => errors.push("experiment must be an array of tables".to_string()),
        None => errors.push("Missing [[experiment]] - at least one step is required".to_string()),
    }

    if !errors.is_empty() {
        fail("Invalid experiment schedule", &errors);
    }
}
