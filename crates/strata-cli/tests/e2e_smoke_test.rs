use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::tempdir;

use strata_cli::{Args, run};

/// Collects all .toml files from a directory
fn collect_toml_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

/// Demos are at workspace root, relative to workspace not the crate
fn demos_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
}

/// Writes a configuration pointing at a `dot` that does not exist, so runs
/// do not depend on a local Graphviz installation.
fn write_missing_dot_config(dir: &Path) -> String {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        "[engine]\ndot_path = \"/nonexistent/strata/dot\"\ntimeout_secs = 5\n",
    )
    .expect("Failed to write config");
    path.to_string_lossy().to_string()
}

fn args_for(input: &Path, output: &Path, config: &str) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        output: output.to_string_lossy().to_string(),
        config: Some(config.to_string()),
        log_level: "off".to_string(),
        trace_dir: None,
    }
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config = write_missing_dot_config(temp_dir.path());

    let valid_demos = collect_toml_files(demos_path());
    assert!(!valid_demos.is_empty(), "No valid demos found in demos/");

    let mut failed_demos = Vec::new();

    for demo_path in &valid_demos {
        let output_filename = format!("{}.svg", demo_path.file_stem().unwrap().to_string_lossy());
        let output_path = temp_dir.path().join(output_filename);

        match run(&args_for(demo_path, &output_path, &config)) {
            Ok(()) => {
                let svg = fs::read_to_string(&output_path).expect("Output should exist");
                assert!(
                    svg.contains("Cannot find Graphviz."),
                    "{} should render the missing engine diagnostic",
                    demo_path.display()
                );
            }
            Err(e) => failed_demos.push((demo_path.clone(), e)),
        }
    }

    if !failed_demos.is_empty() {
        eprintln!("\nValid demos that failed:");
        for (path, err) in &failed_demos {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} valid demo(s) failed unexpectedly", failed_demos.len());
    }

    println!("✅ All {} valid demos passed", valid_demos.len());
}

#[test]
fn e2e_smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config = write_missing_dot_config(temp_dir.path());

    let error_demos = collect_toml_files(demos_path().join("errors"));
    assert!(
        !error_demos.is_empty(),
        "No error demos found in demos/errors/"
    );

    let mut unexpectedly_succeeded = Vec::new();

    for demo_path in &error_demos {
        let output_filename = format!(
            "error_{}.svg",
            demo_path.file_stem().unwrap().to_string_lossy()
        );
        let output_path = temp_dir.path().join(output_filename);

        if run(&args_for(demo_path, &output_path, &config)).is_ok() {
            unexpectedly_succeeded.push(demo_path.clone());
        }
    }

    if !unexpectedly_succeeded.is_empty() {
        eprintln!("\nError demos that unexpectedly succeeded:");
        for path in &unexpectedly_succeeded {
            eprintln!("  - {}", path.display());
        }
        panic!(
            "{} error demo(s) succeeded unexpectedly",
            unexpectedly_succeeded.len()
        );
    }

    println!(
        "✅ All {} error demos failed as expected",
        error_demos.len()
    );
}

#[test]
fn e2e_missing_input_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config = write_missing_dot_config(temp_dir.path());

    let input = temp_dir.path().join("absent.toml");
    let output = temp_dir.path().join("absent.svg");
    assert!(run(&args_for(&input, &output, &config)).is_err());
    assert!(!output.exists());
}

#[test]
fn e2e_missing_config_fails() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = demos_path().join("activity_flow.toml");
    let output = temp_dir.path().join("out.svg");
    let config = temp_dir.path().join("absent.toml");

    let result = run(&args_for(&input, &output, &config.to_string_lossy()));
    assert!(result.is_err(), "A missing explicit config should fail");
}
