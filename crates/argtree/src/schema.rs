//! Serializable description of a parser tree.
//!
//! [`ArgParser::schema`](crate::ArgParser::schema) exports one; the help
//! renderer and the `argtree` binary consume them. Keys are kebab-case.

use serde::{Deserialize, Serialize};

use crate::Nargs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArgSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default = "flag")]
    pub nargs: Nargs,
    #[serde(default)]
    pub positional: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metavar: Option<String>,
}

fn flag() -> Nargs {
    Nargs::FLAG
}

impl ArgSchema {
    /// `-c`, `--name` or the bare positional name.
    pub fn display_name(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = crate::arg::display_name(&self.name, self.positional, &mut out);
        out
    }

    /// Placeholder for the option's value in help output.
    pub fn value_name(&self) -> String {
        self.metavar
            .clone()
            .unwrap_or_else(|| self.name.to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    /// Program name at the top level, subcommand literal below it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Whether the builtin `-h`/`--help` option is installed.
    #[serde(default)]
    pub help: bool,
    /// Whether unresolved tokens go to a hook instead of failing the parse.
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandSchema>,
}

impl CommandSchema {
    pub fn subcommand(&self, name: &str) -> Option<&CommandSchema> {
        self.subcommands.iter().find(|sub| sub.name == name)
    }

    /// Walk down a subcommand path; an empty path is `self`.
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&CommandSchema> {
        path.iter()
            .try_fold(self, |schema, name| schema.subcommand(name.as_ref()))
    }
}
