use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::process::Command;

struct Run {
    code: i32,
    labels: Vec<String>,
    stderr: String,
}

fn find_phishwatch_binary() -> PathBuf {
    if let Ok(path) = env::var("PHISHWATCH_BIN") {
        let p = PathBuf::from(path);
        if p.is_file() {
            return p;
        }
    }

    // Relative to this tester's directory, then the repo root
    let candidates = [
        "../../target/release/phishwatch",
        "../../target/debug/phishwatch",
        "./target/release/phishwatch",
        "./target/debug/phishwatch",
    ];

    for cand in candidates {
        let p = PathBuf::from(cand);
        if p.is_file() {
            return p;
        }
    }

    if let Ok(paths) = env::var("PATH") {
        for dir in paths.split(':') {
            let mut p = PathBuf::from(dir);
            p.push("phishwatch");
            if p.is_file() {
                return p;
            }
        }
    }

    panic!("Unable to locate phishwatch binary. Set PHISHWATCH_BIN to the path of ./target/release/phishwatch.");
}

fn run_generate(args: &[&str]) -> Run {
    let output = Command::new(find_phishwatch_binary())
        .arg("generate")
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to execute phishwatch");

    Run {
        code: output.status.code().unwrap_or(-1),
        labels: String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn assert_success(run: &Run) -> Result<(), String> {
    if run.code == 0 {
        Ok(())
    } else {
        Err(format!("exit code {}: {}", run.code, run.stderr.trim()))
    }
}

fn assert_contains(run: &Run, expected: &str) -> Result<(), String> {
    if run.labels.iter().any(|l| l == expected) {
        Ok(())
    } else {
        Err(format!("Expected label '{}' not found in output", expected))
    }
}

fn assert_absent(run: &Run, unexpected: &str) -> Result<(), String> {
    if run.labels.iter().any(|l| l == unexpected) {
        Err(format!("Unexpected label '{}' present in output", unexpected))
    } else {
        Ok(())
    }
}

fn assert_all(run: &Run, what: &str, pred: impl Fn(&str) -> bool) -> Result<(), String> {
    match run.labels.iter().find(|l| !pred(l)) {
        Some(label) => Err(format!("'{}' is not {}", label, what)),
        None => Ok(()),
    }
}

fn reported_count(run: &Run) -> Option<usize> {
    run.stderr
        .lines()
        .find_map(|l| l.strip_prefix("Generated "))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

fn is_ldh(label: &str) -> bool {
    label.split('.').all(|seg| {
        !seg.is_empty()
            && !seg.starts_with('-')
            && !seg.ends_with('-')
            && seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

// ====== Individual attack tests ======
fn test_addition() -> Result<(), String> {
    let run = run_generate(&["--addition", "paypal.com"]);
    assert_success(&run)?;
    assert_contains(&run, "paypala")?;
    assert_contains(&run, "paypalz")?;
    // 26 appended letters plus the label itself
    if run.labels.len() != 27 {
        return Err(format!("Expected 27 labels, got {}", run.labels.len()));
    }
    Ok(())
}

fn test_homograph() -> Result<(), String> {
    let run = run_generate(&["--homograph", "paypal.com"]);
    assert_success(&run)?;
    // Cyrillic er for both 'p's
    assert_contains(&run, "\u{0440}ay\u{0440}al")?;
    assert_contains(&run, "paypa1")?;
    assert_all(&run, "lowercase", |l| !l.chars().any(char::is_uppercase))
}

fn test_subdomain_and_hyphenation() -> Result<(), String> {
    let run = run_generate(&["--subdomain", "--hyphenation", "paypal.com"]);
    assert_success(&run)?;
    assert_contains(&run, "pay.pal")?;
    assert_contains(&run, "pay-pal")?;
    assert_absent(&run, ".paypal")?;
    assert_absent(&run, "paypal-")?;

    let run = run_generate(&["--subdomain", "my-bank.com"]);
    assert_success(&run)?;
    assert_contains(&run, "m.y-bank")?;
    assert_absent(&run, "my.-bank")?;
    assert_absent(&run, "my-.bank")?;
    Ok(())
}

fn test_bitsquatting() -> Result<(), String> {
    let run = run_generate(&["--bitsquatting", "paypal.com"]);
    assert_success(&run)?;
    assert_contains(&run, "paypcl")?;
    assert_all(&run, "a hostname label", is_ldh)
}

fn test_transposition() -> Result<(), String> {
    let run = run_generate(&["--transposition", "paypal.com"]);
    assert_success(&run)?;
    assert_contains(&run, "apypal")?;
    assert_contains(&run, "paypla")?;
    Ok(())
}

// ====== Full set tests ======
fn test_default_runs_every_attack() -> Result<(), String> {
    let run = run_generate(&["paypal.com"]);
    assert_success(&run)?;
    for expected in ["paypal", "paypala", "aypal", "pay.pal", "peypal", "ppaypal", "pay-pal", "oaypal", "apypal", "paypa1"] {
        assert_contains(&run, expected)?;
    }

    let unique: HashSet<&String> = run.labels.iter().collect();
    if unique.len() != run.labels.len() {
        return Err("Output contains duplicate labels".to_string());
    }

    let mut sorted = run.labels.clone();
    sorted.sort();
    if sorted != run.labels {
        return Err("Output is not sorted".to_string());
    }

    match reported_count(&run) {
        Some(n) if n == run.labels.len() => Ok(()),
        other => Err(format!("Reported count {:?} does not match {} labels", other, run.labels.len())),
    }
}

fn test_max_variations_enforced() -> Result<(), String> {
    let run = run_generate(&["--max-variations", "5", "paypal.com"]);
    assert_success(&run)?;
    if run.labels.len() != 5 {
        return Err(format!("Expected 5 labels, got {}", run.labels.len()));
    }
    match reported_count(&run) {
        Some(n) if n > 5 => Ok(()),
        other => Err(format!("Expected the full count on stderr, got {:?}", other)),
    }
}

fn test_valid_only() -> Result<(), String> {
    let run = run_generate(&["--valid-only", "PayPal.com"]);
    assert_success(&run)?;
    assert_contains(&run, "paypal")?;
    assert_absent(&run, "\u{0440}aypal")?;
    assert_all(&run, "a hostname label", is_ldh)
}

fn test_rejects_bad_domain() -> Result<(), String> {
    let run = run_generate(&["paypal.com/login"]);
    if run.code == 0 {
        return Err("Expected a non-zero exit for a domain with a path".to_string());
    }
    if !run.labels.is_empty() {
        return Err("Expected no output for a rejected domain".to_string());
    }
    Ok(())
}

fn main() {
    let bin = find_phishwatch_binary();
    eprintln!("Using phishwatch binary: {}", bin.display());

    let mut failures: Vec<String> = Vec::new();

    let tests: Vec<(&str, fn() -> Result<(), String>)> = vec![
        ("addition", test_addition),
        ("homograph", test_homograph),
        ("subdomain and hyphenation", test_subdomain_and_hyphenation),
        ("bitsquatting", test_bitsquatting),
        ("transposition", test_transposition),
        ("default runs every attack", test_default_runs_every_attack),
        ("max variations enforced", test_max_variations_enforced),
        ("valid only", test_valid_only),
        ("rejects bad domain", test_rejects_bad_domain),
    ];

    for (name, f) in &tests {
        match f() {
            Ok(()) => println!("[PASS] {}", name),
            Err(err) => {
                println!("[FAIL] {} -> {}", name, err);
                failures.push(format!("{}: {}", name, err));
            }
        }
    }

    if failures.is_empty() {
        println!("\nAll tests passed");
        std::process::exit(0);
    } else {
        println!("\n{} test(s) failed:", failures.len());
        for f in &failures {
            println!(" - {}", f);
        }
        std::process::exit(1);
    }
}
