use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use walkdir::WalkDir;

/// Runs every script under tests/data/ and compares its stdout against the
/// `// expect:` comments embedded in the script.
#[test]
fn run_all_scripts() {
    let dir = "./tests/data/";

    let entries = WalkDir::new(dir)
        .into_iter()
        .filter_map(|o| o.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|x| x == "lox").unwrap_or(false));

    let mut ran = 0;
    for entry in entries {
        let filename = entry.path();
        print!("{} ... ", filename.display());

        let expected = find_expects(filename).join("\n");

        let output = run_file(filename);
        let stdout = String::from_utf8(output.stdout).unwrap();
        let stdout = stdout.trim_end();

        let stderr = String::from_utf8(output.stderr).unwrap();
        let stderr = stderr.trim_end();

        assert_eq!(expected, stdout, "stdout={}, stderr={}", stdout, stderr);

        println!("OK");
        ran += 1;
    }

    assert!(ran > 0, "no scripts found under {}", dir);
}

#[test]
fn static_error_exits_with_65() {
    let output = run_source("static_error", "var a = ;");
    assert_eq!(output.status.code(), Some(65));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Error"), "stderr={}", stderr);
}

#[test]
fn runtime_fault_exits_with_70() {
    let output = run_source("runtime_fault", "print 1 + nil;");
    assert_eq!(output.status.code(), Some(70));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Operands must be"), "stderr={}", stderr);
}

#[test]
fn too_many_arguments_exits_with_64() {
    let mut cmd = Command::cargo_bin("treelox").unwrap();
    let output = cmd.arg("one").arg("two").output().unwrap();
    assert_eq!(output.status.code(), Some(64));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Usage"), "stderr={}", stderr);
}

fn run_file(filename: &Path) -> Output {
    let mut cmd = Command::cargo_bin("treelox").unwrap();
    cmd.arg(filename).output().unwrap()
}

fn run_source(name: &str, source: &str) -> Output {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("treelox-{}-{}.lox", name, std::process::id()));
    std::fs::write(&path, source).unwrap();

    let mut cmd = Command::cargo_bin("treelox").unwrap();
    let output = cmd.arg(&path).output().unwrap();
    let _ = std::fs::remove_file(&path);
    output
}

fn find_expects(filename: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let expect_str = "// expect: ";
    let mut result = vec![];
    for line in content.lines() {
        let mut indices: Vec<_> = line.match_indices(expect_str).collect();
        if indices.is_empty() {
            continue;
        }

        let (idx, _) = indices.pop().unwrap();
        let target = &line[idx + expect_str.len()..];
        result.push(target.into());
    }

    result
}
