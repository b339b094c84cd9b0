//! Connection option strings.
//!
//! Two formats are handled here. The `connect-options` option is a
//! comma-separated list of `name=value` session settings, where values may be
//! quoted. Connection params are query-string encoded (`a=1&b=2`) and are what
//! the applier attaches to a direct-execution statement.

use std::collections::BTreeMap;

use crate::error::{ApplyError, Result};

/// Options understood only by the MySQL driver DSN. External tools have no
/// use for these, so they are removed before interpolation, and they are
/// never sent to the server as session variables.
pub(crate) const DRIVER_ONLY_OPTIONS: &[&str] = &[
    "allowAllFiles",
    "allowCleartextPasswords",
    "allowFallbackToPlaintext",
    "allowNativePasswords",
    "allowOldPasswords",
    "charset",
    "checkConnLiveness",
    "clientFoundRows",
    "collation",
    "columnsWithAlias",
    "interpolateParams",
    "loc",
    "maxAllowedPacket",
    "multiStatements",
    "parseTime",
    "readTimeout",
    "rejectReadOnly",
    "serverPubKey",
    "timeout",
    "tls",
    "writeTimeout",
];

/// Parses a `connect-options` value into ordered `(name, value)` pairs.
///
/// Quoted values keep their quotes, so that the output can be passed through
/// to an external tool unchanged.
pub fn parse_connect_options(input: &str) -> Result<Vec<(String, String)>> {
    let mut options = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        let mut found_equals = false;
        for c in chars.by_ref() {
            if c == '=' {
                found_equals = true;
                break;
            }
            if c == ',' {
                break;
            }
            name.push(c);
        }
        let name = name.trim().to_string();
        if !found_equals {
            return Err(ApplyError::Config(format!(
                "Invalid connect-options \"{input}\": missing value for \"{name}\""
            )));
        }
        if name.is_empty() {
            return Err(ApplyError::Config(format!(
                "Invalid connect-options \"{input}\": option name is empty"
            )));
        }

        let mut value = String::new();
        let mut quote: Option<char> = None;
        while let Some(&c) = chars.peek() {
            match quote {
                Some(q) => {
                    value.push(c);
                    chars.next();
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    } else if c == q {
                        quote = None;
                    }
                }
                None if c == ',' => break,
                None => {
                    if c == '\'' || c == '"' || c == '`' {
                        quote = Some(c);
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }
        if let Some(q) = quote {
            return Err(ApplyError::Config(format!(
                "Invalid connect-options \"{input}\": unterminated {q} quote in value for \"{name}\""
            )));
        }
        options.push((name, value.trim().to_string()));
    }

    Ok(options)
}

/// Validates a `connect-options` value and returns it with driver-only
/// options removed, suitable for passing to an external command.
pub fn real_connect_options(input: &str) -> Result<String> {
    let kept: Vec<String> = parse_connect_options(input)?
        .into_iter()
        .filter(|(name, _)| !DRIVER_ONLY_OPTIONS.contains(&name.as_str()))
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    Ok(kept.join(","))
}

/// Converts a `connect-options` value into query-string connection params,
/// the form every connection to the instance is opened with. Quoted values
/// keep their quotes so they can be sent as-is in `SET SESSION`.
pub fn connect_options_to_params(input: &str) -> Result<String> {
    let params: BTreeMap<String, String> = parse_connect_options(input)?.into_iter().collect();
    Ok(encode_params(&params))
}

/// Parses a query-string param list. Later duplicates are ignored.
#[must_use]
pub fn parse_params(params: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for pair in params.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        map.entry(unescape(name)).or_insert_with(|| unescape(value));
    }
    map
}

/// Encodes params as a query string with keys in sorted order.
#[must_use]
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Combines two query-string param lists; `overrides` wins on conflicts.
#[must_use]
pub fn merge_param_strings(params: &str, overrides: &str) -> String {
    let mut merged = parse_params(params);
    merged.extend(parse_params(overrides));
    encode_params(&merged)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: Option<&u8>) -> Option<u8> {
    match *b? {
        c @ b'0'..=b'9' => Some(c - b'0'),
        c @ b'a'..=b'f' => Some(c - b'a' + 10),
        c @ b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_options() {
        let opts = parse_connect_options("wait_timeout=86400, sql_mode='STRICT_ALL_TABLES'").unwrap();
        assert_eq!(
            opts,
            vec![
                ("wait_timeout".to_string(), "86400".to_string()),
                ("sql_mode".to_string(), "'STRICT_ALL_TABLES'".to_string()),
            ]
        );
    }

    #[test]
    fn quoted_values_may_contain_commas() {
        let opts =
            parse_connect_options("sql_mode='ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES',lock_wait_timeout=60")
                .unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].1, "'ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES'");
        assert_eq!(opts[1].0, "lock_wait_timeout");
    }

    #[test]
    fn rejects_malformed_options() {
        assert!(parse_connect_options("foo").unwrap_err().is_config());
        assert!(parse_connect_options("=1").unwrap_err().is_config());
        assert!(parse_connect_options("sql_mode='abc").unwrap_err().is_config());
        assert!(parse_connect_options("").unwrap().is_empty());
    }

    #[test]
    fn strips_driver_only_options() {
        let real = real_connect_options("readTimeout=5s,wait_timeout=100,tls=true,innodb_lock_wait_timeout=5")
            .unwrap();
        assert_eq!(real, "wait_timeout=100,innodb_lock_wait_timeout=5");
        assert!(real_connect_options("bad").is_err());
    }

    #[test]
    fn connect_options_become_params() {
        let params = connect_options_to_params(
            "lock_wait_timeout=60, sql_mode='ANSI,STRICT_ALL_TABLES', readTimeout=20s",
        )
        .unwrap();
        assert_eq!(
            params,
            "lock_wait_timeout=60&readTimeout=20s&sql_mode=%27ANSI%2CSTRICT_ALL_TABLES%27"
        );
        let parsed = parse_params(&params);
        assert_eq!(parsed["sql_mode"], "'ANSI,STRICT_ALL_TABLES'");
        assert_eq!(connect_options_to_params("").unwrap(), "");
        assert!(connect_options_to_params("sql_mode").unwrap_err().is_config());
    }

    #[test]
    fn merges_params_with_overrides() {
        assert_eq!(
            merge_param_strings("readTimeout=20s&interpolateParams=true", "readTimeout=0"),
            "interpolateParams=true&readTimeout=0"
        );
        assert_eq!(merge_param_strings("", ""), "");
        assert_eq!(
            merge_param_strings("", "readTimeout=0&foreign_key_checks=1"),
            "foreign_key_checks=1&readTimeout=0"
        );
    }

    #[test]
    fn escapes_round_trip() {
        let params = parse_params("sql_mode=%27ANSI%27&x=a+b");
        assert_eq!(params["sql_mode"], "'ANSI'");
        assert_eq!(params["x"], "a b");
        assert_eq!(encode_params(&params), "sql_mode=%27ANSI%27&x=a+b");
    }
}
