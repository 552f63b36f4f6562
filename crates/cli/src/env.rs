use std::fs;
use std::path::Path;

/// Loads `KEY=VALUE` pairs from an optional env file into the process
/// environment before `Settings::load()` reads them. Mirrors the teacher's
/// env-manager approach, trimmed to the one thing the core's configuration
/// layer needs: getting overrides into `std::env` ahead of time.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let pairs = parse(&content).map_err(|reason| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{}: {reason}", path.display()))
    })?;
    for (key, value) in pairs {
        // SAFETY boundary is process-wide env mutation: fine here since this
        // runs once, single-threaded, before any tokio runtime is started.
        unsafe { std::env::set_var(key, value) };
    }
    Ok(())
}

fn parse(content: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            return Err(format!("malformed line {} (expected KEY=VALUE)", line_num + 1));
        };
        let key = line[..eq_pos].trim();
        if key.is_empty() {
            return Err(format!("empty key at line {}", line_num + 1));
        }
        let value = unquote(line[eq_pos + 1..].trim());
        pairs.push((key.to_string(), value));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_and_unquoted_values_parse() {
        let pairs = parse("# comment\nMES_TICK_PERIOD_SECS=5\nMES_ERP_BASE_URL=\"http://erp.local\"").unwrap();
        assert_eq!(pairs, vec![
            ("MES_TICK_PERIOD_SECS".to_string(), "5".to_string()),
            ("MES_ERP_BASE_URL".to_string(), "http://erp.local".to_string()),
        ]);
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(parse("NOT_A_KEY_VALUE_LINE").is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(parse("=value").is_err());
    }
}
