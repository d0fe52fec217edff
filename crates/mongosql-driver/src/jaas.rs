//! JAAS-style login configuration parsing
//!
//! Kerberos setups describe their login through named contexts:
//!
//! ```text
//! mongodb.gssapi {
//!     com.sun.security.auth.module.Krb5LoginModule required
//!         useKeyTab=true
//!         keyTab="/etc/krb5.keytab"
//!         principal="reporting@EXAMPLE.COM";
//! };
//! ```
//!
//! Only the parts the connection needs are interpreted: the context name,
//! each module's class, control flag and `key=value` options.

use mongosql_core::MongoSqlError;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

static BLOCK_COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static CONTEXT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)([\w.\-]+)\s*\{(.*?)\}\s*;").expect("valid regex"));

static MODULE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*(\S+)\s+(\S+)(.*)$").expect("valid regex"));

static OPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w.\-]+)\s*=\s*(?:"([^"]*)"|(\S+))"#).expect("valid regex")
});

/// Error types for JAAS configuration
#[derive(Debug, thiserror::Error)]
pub enum JaasError {
    #[error("Failed to read JAAS config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JAAS config contains no login contexts")]
    Empty,

    #[error("Invalid login module entry in context '{context}': {entry}")]
    InvalidEntry { context: String, entry: String },

    #[error("Unknown control flag '{flag}' for login module {module}")]
    UnknownFlag { module: String, flag: String },

    #[error("Login context '{name}' not found in JAAS config (available: {available})")]
    ContextNotFound { name: String, available: String },
}

impl From<JaasError> for MongoSqlError {
    fn from(err: JaasError) -> Self {
        MongoSqlError::Configuration(err.to_string())
    }
}

/// How a login module's outcome affects the overall login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlag {
    Required,
    Requisite,
    Sufficient,
    Optional,
}

impl FromStr for ControlFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(ControlFlag::Required),
            "requisite" => Ok(ControlFlag::Requisite),
            "sufficient" => Ok(ControlFlag::Sufficient),
            "optional" => Ok(ControlFlag::Optional),
            _ => Err(()),
        }
    }
}

/// One login module line of a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginModule {
    pub class_name: String,
    pub flag: ControlFlag,
    pub options: BTreeMap<String, String>,
}

impl LoginModule {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }
}

/// A named login context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginContext {
    pub name: String,
    pub modules: Vec<LoginModule>,
}

impl LoginContext {
    /// The first `principal` option among the context's modules
    pub fn principal(&self) -> Option<&str> {
        self.modules.iter().find_map(|m| m.option("principal"))
    }
}

/// A parsed JAAS configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JaasConfig {
    contexts: Vec<LoginContext>,
}

impl JaasConfig {
    pub fn load(path: &Path) -> Result<Self, JaasError> {
        let contents = std::fs::read_to_string(path).map_err(|source| JaasError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "parsing JAAS config");
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, JaasError> {
        let stripped = strip_comments(contents);

        let mut contexts = Vec::new();
        for captures in CONTEXT_REGEX.captures_iter(&stripped) {
            let name = captures[1].to_string();
            let modules = captures[2]
                .split(';')
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| parse_module(&name, entry))
                .collect::<Result<Vec<_>, _>>()?;
            contexts.push(LoginContext { name, modules });
        }

        if contexts.is_empty() {
            return Err(JaasError::Empty);
        }
        Ok(Self { contexts })
    }

    pub fn contexts(&self) -> &[LoginContext] {
        &self.contexts
    }

    /// Look up a context by its exact name
    pub fn context(&self, name: &str) -> Result<&LoginContext, JaasError> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| JaasError::ContextNotFound {
                name: name.to_string(),
                available: self
                    .contexts
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

fn strip_comments(contents: &str) -> String {
    BLOCK_COMMENT_REGEX
        .replace_all(contents, "")
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with('#') && !trimmed.starts_with("//")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_module(context: &str, entry: &str) -> Result<LoginModule, JaasError> {
    let captures = MODULE_REGEX
        .captures(entry)
        .ok_or_else(|| JaasError::InvalidEntry {
            context: context.to_string(),
            entry: entry.trim().to_string(),
        })?;

    let class_name = captures[1].to_string();
    let flag = captures[2]
        .parse::<ControlFlag>()
        .map_err(|_| JaasError::UnknownFlag {
            module: class_name.clone(),
            flag: captures[2].to_string(),
        })?;

    let options = OPTION_REGEX
        .captures_iter(&captures[3])
        .map(|option| {
            let value = option
                .get(2)
                .or_else(|| option.get(3))
                .map_or("", |m| m.as_str());
            (option[1].to_string(), value.to_string())
        })
        .collect();

    Ok(LoginModule {
        class_name,
        flag,
        options,
    })
}
