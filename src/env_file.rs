use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::Result;

pub type EnvMap = HashMap<String, String>;

/// Reads `KEY=VALUE` pairs from `path`. A missing file yields an empty map.
pub fn load(path: &Path) -> Result<EnvMap> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let env = parse(&content);
            debug!(path = %path.display(), count = env.len(), "loaded env file");
            Ok(env)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(EnvMap::new()),
        Err(err) => Err(err.into()),
    }
}

pub fn parse(content: &str) -> EnvMap {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim().to_string(), value.trim().to_string()))
}

/// Rewrites `path` with the given assignments. Existing keys keep their
/// position, keys not yet present are appended, every other line is kept as is.
pub fn set_values(path: &Path, values: &[(&str, String)]) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let updated = apply_values(&content, values);
    std::fs::write(path, updated)?;
    debug!(path = %path.display(), count = values.len(), "updated env file");
    Ok(())
}

/// Line endings are kept per line; appended keys use the file's style.
fn apply_values(content: &str, values: &[(&str, String)]) -> String {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut written = vec![false; values.len()];
    let mut out = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        let slot = parse_line(body).and_then(|(key, _)| {
            values
                .iter()
                .enumerate()
                .position(|(idx, (name, _))| !written[idx] && *name == key)
        });
        match slot {
            Some(idx) => {
                written[idx] = true;
                out.push_str(&format!("{}={}{}", values[idx].0, values[idx].1, ending));
            }
            None => out.push_str(line),
        }
    }

    if !out.is_empty() && !out.ends_with('\n') {
        out.push_str(newline);
    }
    for (idx, (key, value)) in values.iter().enumerate() {
        if !written[idx] {
            out.push_str(&format!("{key}={value}{newline}"));
        }
    }
    out
}
