//! Host alias table parsed from an OpenSSH client config file

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

use super::pattern::matches_pattern_list;

/// Connection overrides collected for one host.
///
/// Every field is optional; unset fields leave the caller's value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAlias {
    /// Real host name or address (`HostName`)
    pub hostname: Option<String>,
    /// Login name (`User`)
    pub username: Option<String>,
    /// SSH port (`Port`)
    pub port: Option<u16>,
    /// Private key (`IdentityFile`), tilde-expanded
    pub identity_file: Option<PathBuf>,
}

impl HostAlias {
    /// Returns true if the alias overrides nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.username.is_none()
            && self.port.is_none()
            && self.identity_file.is_none()
    }

    /// Fills every unset field from `other`; values already set win
    fn fill_from(&mut self, other: &Self) {
        if self.hostname.is_none() {
            self.hostname.clone_from(&other.hostname);
        }
        if self.username.is_none() {
            self.username.clone_from(&other.username);
        }
        if self.port.is_none() {
            self.port = other.port;
        }
        if self.identity_file.is_none() {
            self.identity_file.clone_from(&other.identity_file);
        }
    }
}

/// One `Host` block: its patterns and the options inside it
#[derive(Debug, Clone)]
struct AliasEntry {
    patterns: Vec<String>,
    alias: HostAlias,
}

/// Ordered list of `Host` blocks.
///
/// Lookup follows OpenSSH: every block whose patterns match contributes,
/// in file order, and the first value obtained for each option wins.
/// `Match` blocks are not evaluated and their options are ignored.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    source: Option<PathBuf>,
}

impl AliasTable {
    /// Creates an empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            source: None,
        }
    }

    /// Number of `Host` blocks (including the implicit leading one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no blocks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File the table was loaded from, after `~` expansion.
    ///
    /// `None` for parsed text or when the file did not exist.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Loads the table from an SSH config file.
    ///
    /// A leading `~` is expanded. A file that does not exist yields an empty
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read,
    /// or [`ConfigError::SshConfig`] if an option value is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let expanded = PathBuf::from(
            shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned(),
        );

        if !expanded.exists() {
            tracing::debug!(path = %expanded.display(), "SSH config not found, no aliases loaded");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(&expanded).map_err(|e| ConfigError::Read {
            path: expanded.clone(),
            reason: e.to_string(),
        })?;

        let mut table = Self::parse(&content)?;
        table.source = Some(expanded.clone());
        tracing::debug!(
            path = %expanded.display(),
            blocks = table.len(),
            "Loaded SSH host aliases"
        );
        Ok(table)
    }

    /// Parses SSH client config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SshConfig`] with the 1-based line number when a
    /// `Port` value is not a valid port or a `Host` line has no patterns.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut entries: Vec<AliasEntry> = Vec::new();
        let mut in_match_block = false;

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((keyword, value)) = split_option(line) else {
                continue;
            };
            let keyword = keyword.to_ascii_lowercase();

            match keyword.as_str() {
                "host" => {
                    let patterns: Vec<String> =
                        value.split_whitespace().map(|p| unquote(p).to_string()).collect();
                    if patterns.is_empty() {
                        return Err(ConfigError::SshConfig {
                            line: line_no,
                            reason: "Host requires at least one pattern".to_string(),
                        });
                    }
                    entries.push(AliasEntry {
                        patterns,
                        alias: HostAlias::default(),
                    });
                    in_match_block = false;
                    continue;
                }
                "match" => {
                    in_match_block = true;
                    continue;
                }
                _ if in_match_block => continue,
                _ => {}
            }

            // Options before the first Host line apply to every host
            if entries.is_empty() {
                entries.push(AliasEntry {
                    patterns: vec!["*".to_string()],
                    alias: HostAlias::default(),
                });
            }
            let Some(alias) = entries.last_mut().map(|e| &mut e.alias) else {
                continue;
            };
            let value = unquote(value);

            match keyword.as_str() {
                "hostname" if alias.hostname.is_none() => {
                    alias.hostname = Some(value.to_string());
                }
                "user" if alias.username.is_none() => {
                    alias.username = Some(value.to_string());
                }
                "port" if alias.port.is_none() => {
                    let port = value
                        .parse::<u16>()
                        .ok()
                        .filter(|p| *p != 0)
                        .ok_or_else(|| ConfigError::SshConfig {
                            line: line_no,
                            reason: format!("invalid port {value:?}"),
                        })?;
                    alias.port = Some(port);
                }
                "identityfile" if alias.identity_file.is_none() => {
                    alias.identity_file =
                        Some(PathBuf::from(shellexpand::tilde(value).into_owned()));
                }
                _ => {}
            }
        }

        Ok(Self {
            entries,
            source: None,
        })
    }

    /// Returns the merged overrides for `host`.
    ///
    /// `%h` in `HostName` expands to `host` and `%%` to a literal `%`.
    #[must_use]
    pub fn lookup(&self, host: &str) -> HostAlias {
        let mut merged = HostAlias::default();
        for entry in &self.entries {
            if matches_pattern_list(&entry.patterns, host) {
                merged.fill_from(&entry.alias);
            }
        }
        merged.hostname = merged.hostname.map(|h| expand_tokens(&h, host));
        merged
    }
}

/// Splits `Keyword value`, `Keyword=value` and `Keyword = value`
fn split_option(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    Some((keyword, rest))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Expands `%h` and `%%`; other tokens are kept verbatim
fn expand_tokens(value: &str, host: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str(host),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}
