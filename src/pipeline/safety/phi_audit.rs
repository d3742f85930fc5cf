// Static scan of every source file for tracing calls that carry patient
// data. Logs may name ids, counts, sources and statuses, never clinical
// values.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    /// Fragments that must not appear inside a tracing macro call.
    const PHI_PATTERNS: &[&str] = &[
        "chief_complaint",
        "symptoms",
        "symptom.name",
        "symptom.notes",
        "vitals",
        "labs",
        "lab.value",
        "lab.unit",
        "history",
        "medications",
        "allergies",
        "prior_diagnoses",
        "demographics",
        "age_years",
        "correction",
        "snippet",
        "clinical_reasoning",
        "candidate.name",
        "candidate.reasoning",
        "query.",
    ];

    const ALLOWLIST: &[&str] = &["phi_audit.rs"];

    #[test]
    fn no_phi_in_tracing_calls() {
        let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
        assert!(src_dir.exists(), "Source directory not found: {}", src_dir.display());

        let mut violations = Vec::new();
        scan_directory(&src_dir, &mut violations);

        if !violations.is_empty() {
            let report = violations
                .iter()
                .map(|(file, line_num, call, pattern)| {
                    format!("  {file}:{line_num}: found '{pattern}' in: {call}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "PHI audit failed, {} violation(s) in tracing calls:\n{}\n\n\
                 Log ids and counts instead of patient values.",
                violations.len(),
                report
            );
        }
    }

    #[test]
    fn scanner_detects_known_violation() {
        let line = r#"tracing::info!(complaint = %query.chief_complaint, "received");"#;
        assert!(!patterns_in(line).is_empty());
    }

    #[test]
    fn scanner_passes_clean_tracing() {
        let line = r#"tracing::info!(result_id = %result.id, candidates = 3, "ranked");"#;
        assert!(patterns_in(line).is_empty());
    }

    #[test]
    fn multi_line_calls_are_joined() {
        let source = "tracing::warn!(\n    source = %kind,\n    note = %lab.value,\n    \"x\"\n);\n";
        let calls = tracing_calls(source);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 1);
        assert_eq!(patterns_in(&calls[0].1), vec!["lab.value"]);
    }

    fn patterns_in(call: &str) -> Vec<&'static str> {
        PHI_PATTERNS
            .iter()
            .copied()
            .filter(|p| call.contains(p))
            .collect()
    }

    fn scan_directory(dir: &Path, violations: &mut Vec<(String, usize, String, String)>) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                scan_directory(&path, violations);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                scan_file(&path, violations);
            }
        }
    }

    fn scan_file(path: &Path, violations: &mut Vec<(String, usize, String, String)>) {
        let filename = path.file_name().unwrap_or_default().to_string_lossy();
        if ALLOWLIST.iter().any(|a| filename.contains(a)) {
            return;
        }

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };

        let relative_path = path
            .strip_prefix(Path::new(env!("CARGO_MANIFEST_DIR")).join("src"))
            .unwrap_or(path)
            .display()
            .to_string();

        for (line_num, call) in tracing_calls(&content) {
            for pattern in patterns_in(&call) {
                violations.push((relative_path.clone(), line_num, call.clone(), pattern.to_string()));
            }
        }
    }

    /// Every tracing macro call in `content` as (1-indexed start line,
    /// call text joined onto one line).
    fn tracing_calls(content: &str) -> Vec<(usize, String)> {
        const MACROS: &[&str] = &[
            "tracing::info!",
            "tracing::warn!",
            "tracing::error!",
            "tracing::debug!",
            "tracing::trace!",
            "tracing::info_span!",
            "tracing::debug_span!",
        ];

        let lines: Vec<&str> = content.lines().collect();
        let mut calls = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            let Some(start) = MACROS.iter().find_map(|m| trimmed.find(m)) else {
                i += 1;
                continue;
            };

            let mut call = trimmed[start..].to_string();
            let mut depth = paren_balance(&call);
            let mut j = i + 1;
            while depth > 0 && j < lines.len() {
                let next = lines[j].trim();
                call.push(' ');
                call.push_str(next);
                depth += paren_balance(next);
                j += 1;
            }

            calls.push((i + 1, call));
            i = j;
        }
        calls
    }

    fn paren_balance(text: &str) -> i32 {
        text.chars().fold(0, |depth, ch| match ch {
            '(' => depth + 1,
            ')' => depth - 1,
            _ => depth,
        })
    }
}
