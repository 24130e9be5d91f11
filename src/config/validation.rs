//! Unknown-key warnings for monitor config files.
//!
//! The config is two levels deep (`[section]` then `key = value`), so the
//! raw TOML is checked section by section against the field table below.
//! A misspelled section is reported once, not once per key inside it, and
//! key suggestions only come from the section the key was written in.
//! Warnings never stop a config from loading.

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Dotted path as written in the file
    pub field: String,
    pub message: String,
    /// Dotted path of the closest known key or section
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suggestion {
            Some(s) => write!(f, "{} (did you mean '{}'?)", self.message, s),
            None => f.write_str(&self.message),
        }
    }
}

/// Field names per section, kept in step with the structs in monitor_config.rs.
const SECTIONS: &[(&str, &[&str])] = &[
    ("site", &["name", "machine_separator"]),
    ("window", &["hours_back"]),
    ("cycles", &["min_duration_minutes"]),
    ("downtime", &["min_duration_minutes"]),
    ("timeline", &["min_width_pct", "fill_leading_edge"]),
    ("alerts", &["enabled", "threshold_minutes", "report_url"]),
    ("history", &["db_path", "days"]),
    ("ingest", &["timestamp_format"]),
];

/// Largest edit distance still offered as a suggestion
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Whether `section.key` names a config field.
pub fn is_known_key(section: &str, key: &str) -> bool {
    SECTIONS
        .iter()
        .any(|(name, fields)| *name == section && fields.contains(&key))
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + usize::from(ca != *cb));
            diag = above;
        }
    }
    row[b.len()]
}

/// Closest candidate within the suggestion distance; ties go to the earlier
/// candidate.
fn nearest<'a>(word: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (edit_distance(word, c), c))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Unparseable input yields no warnings; the serde pass reports it.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(root) = raw_toml.parse::<toml::Table>() else {
        return Vec::new();
    };

    let mut warnings = Vec::new();
    for (section, value) in &root {
        let Some(fields) = SECTIONS.iter().find(|(name, _)| *name == section.as_str()).map(|(_, f)| *f) else {
            warnings.push(ValidationWarning {
                field: section.clone(),
                message: format!("Unknown config section '{section}'"),
                suggestion: nearest(section, SECTIONS.iter().map(|(name, _)| *name)).map(str::to_string),
            });
            continue;
        };

        let Some(table) = value.as_table() else {
            warnings.push(ValidationWarning {
                field: section.clone(),
                message: format!("Config key '{section}' must be a [{section}] table"),
                suggestion: None,
            });
            continue;
        };

        for key in table.keys().filter(|k| !fields.contains(&k.as_str())) {
            warnings.push(ValidationWarning {
                field: format!("{section}.{key}"),
                message: format!("Unknown config key '{section}.{key}'"),
                suggestion: nearest(key, fields.iter().copied()).map(|f| format!("{section}.{f}")),
            });
        }
    }
    warnings
}
