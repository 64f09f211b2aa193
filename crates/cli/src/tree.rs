use std::cell::RefCell;

use anyhow::{Context, Result};
use argtree::{Arg, ArgParser, CommandSchema};
use indexmap::IndexMap;
use serde::Serialize;

/// Storage for what a spec-built parser matched, one node per command level.
///
/// Parsers built by [`MatchTree::parser`] borrow the tree; their callbacks
/// record into it through the per-level `RefCell`. Matches accumulate, so use
/// a fresh tree per parse.
#[derive(Debug, Default)]
pub struct MatchTree {
    name: String,
    matches: RefCell<LevelMatches>,
    children: IndexMap<String, MatchTree>,
}

#[derive(Debug, Default)]
struct LevelMatches {
    values: IndexMap<String, Vec<String>>,
    flags: IndexMap<String, usize>,
    unknown: Vec<String>,
}

/// JSON report of one level and, recursively, its selected subcommand.
#[derive(Debug, Serialize)]
pub struct LevelReport {
    pub name: String,
    pub values: IndexMap<String, Vec<String>>,
    pub flags: IndexMap<String, usize>,
    pub unknown: Vec<String>,
    pub subcommand: Option<Box<LevelReport>>,
}

impl MatchTree {
    pub fn new(schema: &CommandSchema) -> Self {
        Self {
            name: schema.name.clone(),
            matches: RefCell::default(),
            children: schema
                .subcommands
                .iter()
                .map(|sub| (sub.name.clone(), MatchTree::new(sub)))
                .collect(),
        }
    }

    /// Build the parser tree `schema` describes. Invalid registrations are
    /// returned as errors instead of panicking.
    pub fn parser(&self, schema: &CommandSchema) -> Result<ArgParser<'_>> {
        let parser = if schema.help {
            ArgParser::with_help(&schema.name)
        } else {
            ArgParser::named(&schema.name)
        };
        let mut parser = parser.description(&schema.description);
        self.register(&mut parser, schema, &schema.name)?;
        Ok(parser)
    }

    fn register<'t>(
        &'t self,
        parser: &mut ArgParser<'t>,
        schema: &CommandSchema,
        path: &str,
    ) -> Result<()> {
        for spec in &schema.args {
            let matches = &self.matches;
            let name = spec.name.clone();
            let takes_arguments = spec.nargs.takes_arguments();
            let mut arg = Arg::new(&spec.name, spec.nargs, move |_, args| {
                let mut matches = matches.borrow_mut();
                if takes_arguments {
                    matches
                        .values
                        .entry(name.clone())
                        .or_default()
                        .extend_from_slice(args);
                } else {
                    *matches.flags.entry(name.clone()).or_default() += 1;
                }
            })
            .help(&spec.help);
            if spec.positional {
                arg = arg.positional();
            }
            if spec.required {
                arg = arg.required();
            }
            if let Some(metavar) = &spec.metavar {
                arg = arg.metavar(metavar);
            }
            let aliases: Vec<&str> = spec.aliases.iter().map(String::as_str).collect();
            parser
                .try_add_option_with_alias(arg, &aliases)
                .with_context(|| format!("invalid option {:?} in {path}", spec.name))?;
        }

        if schema.allow_unknown {
            let matches = &self.matches;
            parser.on_unrecognized(move |_, token, err| {
                tracing::debug!(%token, %err, "recording unrecognized token");
                matches.borrow_mut().unknown.push(token.to_string());
            });
        }

        for sub in &schema.subcommands {
            let child_path = format!("{path} {}", sub.name);
            let tree = self
                .children
                .get(&sub.name)
                .with_context(|| format!("no match storage for {child_path}"))?;
            let child = if sub.help {
                ArgParser::with_help(&sub.name)
            } else {
                ArgParser::new()
            };
            let mut child = child.description(&sub.description);
            tree.register(&mut child, sub, &child_path)?;
            parser
                .try_add_subparser(&sub.name, child)
                .with_context(|| format!("invalid subcommand in {path}"))?;
        }
        Ok(())
    }

    /// Report this level and follow the parser's selected subcommand down.
    pub fn report(&self, parser: &ArgParser<'_>) -> LevelReport {
        let subcommand = parser.selected_name().and_then(|name| {
            let child = parser.selected()?;
            let tree = self.children.get(name)?;
            Some(Box::new(tree.report(child)))
        });

        let matches = self.matches.borrow();
        LevelReport {
            name: self.name.clone(),
            values: matches.values.clone(),
            flags: matches.flags.clone(),
            unknown: matches.unknown.clone(),
            subcommand,
        }
    }
}
