// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
    /// `key=value` property files, as used for `efw.properties`.
    Properties,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            "properties" => Some(FileFormat::Properties),
            _ => None,
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file extension.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    /// Read and parse a configuration file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => self.parse_json(content),
            FileFormat::Toml => self.parse_toml(content),
            FileFormat::Env => self.parse_env(content),
            FileFormat::Properties => Ok(parse_properties(content)),
        }
    }

    fn parse_json(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))
    }

    fn parse_toml(&self, content: &str) -> Result<Value> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        serde_json::to_value(toml_value)
            .map_err(|e| ConfigError::ParseError(format!("TOML to JSON conversion error: {}", e)))
    }

    fn parse_env(&self, content: &str) -> Result<Value> {
        let mut map = serde_json::Map::new();
        for entry in dotenvy::from_read_iter(content.as_bytes()) {
            let (key, value) =
                entry.map_err(|e| ConfigError::ParseError(format!(".env parse error: {}", e)))?;
            map.insert(key, Value::String(value));
        }
        Ok(Value::Object(map))
    }
}

/// Parse a property file into a flat object of string values.
///
/// Handles `#`/`!` comments, `=`, `:` or whitespace separators, backslash
/// line continuations and the usual escapes (`\t`, `\n`, `\uXXXX`, ...).
fn parse_properties(content: &str) -> Value {
    let mut map = serde_json::Map::new();
    let mut logical = String::new();

    for raw in content.lines() {
        let line = if logical.is_empty() { raw.trim() } else { raw.trim_start() };
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        // An odd number of trailing backslashes continues the line.
        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }
        logical.push_str(line);

        let (key, value) = split_property(&logical);
        map.insert(unescape(key), Value::String(unescape(value)));
        logical.clear();
    }

    if !logical.is_empty() {
        let (key, value) = split_property(&logical);
        map.insert(unescape(key), Value::String(unescape(value)));
    }

    Value::Object(map)
}

fn split_property(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (line[..idx].trim_end(), line[idx + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..idx], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let result = loader.parse(r#"{"key": "value", "number": 42}"#).unwrap();
        assert_eq!(result["number"], 42);
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let result = loader
            .parse(
                r#"
                [efw.jdbc]
                resource = "jdbc/app"
                "#,
            )
            .unwrap();
        assert_eq!(result["efw"]["jdbc"]["resource"], "jdbc/app");
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let result = loader
            .parse(
                r#"
KEY=value
# Comment
QUOTED="quoted value # not a comment"
export EXPORTED=yes
ESCAPED="line\nbreak"
"#,
            )
            .unwrap();
        assert_eq!(result["KEY"], "value");
        assert_eq!(result["QUOTED"], "quoted value # not a comment");
        assert_eq!(result["EXPORTED"], "yes");
        assert_eq!(result["ESCAPED"], "line\nbreak");
    }

    #[test]
    fn test_parse_env_rejects_unterminated_quote() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let err = loader.parse("BROKEN=\"no end\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_parse_properties() {
        let loader = ConfigLoader::new(FileFormat::Properties);
        let result = loader
            .parse(
                "# database\n\
                 efw.jdbc.resource=jdbc/efw\n\
                 ! other comment\n\
                 efw.jdbc.resource.url : jdbc:postgresql://db/efw\n\
                 efw.jdbc.resource.username   admin\n\
                 greeting = hello \\\n    world\n\
                 path=C\\:\\\\data\\tx\n\
                 unicode=\\u00e9t\\u00e9\n\
                 empty=\n",
            )
            .unwrap();

        assert_eq!(result["efw.jdbc.resource"], "jdbc/efw");
        assert_eq!(result["efw.jdbc.resource.url"], "jdbc:postgresql://db/efw");
        assert_eq!(result["efw.jdbc.resource.username"], "admin");
        assert_eq!(result["greeting"], "hello world");
        assert_eq!(result["path"], "C:\\data\tx");
        assert_eq!(result["unicode"], "été");
        assert_eq!(result["empty"], "");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("properties"), Some(FileFormat::Properties));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert!(ConfigLoader::auto("efw.properties").is_ok());
        assert!(ConfigLoader::auto("efw").is_err());
    }
}
