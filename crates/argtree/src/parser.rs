use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::arg::{Arg, ArgInfo, Callback, Nargs};
use crate::context::Context;
use crate::error::{ConfigError, ParseError, ParseResult};
use crate::help;
use crate::schema::{ArgSchema, CommandSchema};

/// Handler for tokens the parser cannot resolve: receives the context, the
/// token and the failure it would otherwise have reported.
pub type Hook<'a> = Box<dyn FnMut(&mut Context, &str, &ParseError) + 'a>;

const BUILTIN_HELP_NAME: &str = "h";
const BUILTIN_HELP_ALIAS: &str = "help";

pub(crate) struct Slot<'a> {
    pub(crate) info: ArgInfo,
    pub(crate) aliases: Vec<String>,
    pub(crate) callback: Callback<'a>,
    pub(crate) invoked: bool,
    pub(crate) builtin: bool,
}

/// A registry of options and subcommands, and the entry point for parsing.
///
/// The lifetime `'a` bounds every registered callback, so callbacks can hold
/// `&'a mut` borrows of the values they fill in.
pub struct ArgParser<'a> {
    prog: String,
    description: String,
    builtin_help: bool,
    pub(crate) slots: Vec<Slot<'a>>,
    pub(crate) named: HashMap<String, usize>,
    pub(crate) positionals: Vec<usize>,
    pub(crate) subcommands: IndexMap<String, ArgParser<'a>>,
    pub(crate) hook: Option<Hook<'a>>,
    selected: Option<String>,
    remaining: Vec<String>,
}

impl Default for ArgParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ArgParser<'a> {
    pub fn new() -> Self {
        Self {
            prog: String::new(),
            description: String::new(),
            builtin_help: false,
            slots: Vec::new(),
            named: HashMap::new(),
            positionals: Vec::new(),
            subcommands: IndexMap::new(),
            hook: None,
            selected: None,
            remaining: Vec::new(),
        }
    }

    /// A parser whose help output calls the program `prog`.
    pub fn named(prog: impl Into<String>) -> Self {
        let mut parser = Self::new();
        parser.set_prog(prog.into());
        parser
    }

    /// Like [`ArgParser::named`], with a builtin `-h`/`--help` option that
    /// makes [`ArgParser::parse`] return [`ParseError::HelpRequested`].
    pub fn with_help(prog: impl Into<String>) -> Self {
        let mut parser = Self::named(prog);
        parser.install_help();
        parser
    }

    /// A fresh parser for use as a subcommand of this one. It carries the
    /// builtin help option if this parser does.
    pub fn subparser(&self) -> ArgParser<'a> {
        let mut child = ArgParser::new();
        if self.builtin_help {
            child.install_help();
        }
        child
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn prog(&self) -> &str {
        &self.prog
    }

    fn install_help(&mut self) {
        let arg = Arg::new(BUILTIN_HELP_NAME, Nargs::FLAG, |ctx, _| ctx.request_help())
            .help("Show help information");
        let added = self.try_add_option_with_alias(arg, &[BUILTIN_HELP_ALIAS]);
        if added.is_ok() {
            self.builtin_help = true;
            if let Some(slot) = self.slots.last_mut() {
                slot.builtin = true;
            }
        }
    }

    fn set_prog(&mut self, prog: String) {
        for (literal, child) in self.subcommands.iter_mut() {
            child.set_prog(join_prog(&prog, literal));
        }
        self.prog = prog;
    }

    /// Register `arg`, panicking on a configuration error.
    ///
    /// Named options are looked up by name; positionals bind in registration
    /// order.
    #[track_caller]
    pub fn add_option(&mut self, arg: Arg<'a>) {
        if let Err(err) = self.try_add_option(arg) {
            panic!("invalid option: {err}");
        }
    }

    /// Register `arg` under its name and every alias, panicking on a
    /// configuration error.
    #[track_caller]
    pub fn add_option_with_alias(&mut self, arg: Arg<'a>, aliases: &[&str]) {
        if let Err(err) = self.try_add_option_with_alias(arg, aliases) {
            panic!("invalid option: {err}");
        }
    }

    /// Register a child parser that takes over when `name` appears as a bare
    /// token, panicking on a configuration error.
    #[track_caller]
    pub fn add_subparser(&mut self, name: impl Into<String>, child: ArgParser<'a>) {
        if let Err(err) = self.try_add_subparser(name, child) {
            panic!("invalid subcommand: {err}");
        }
    }

    pub fn try_add_option(&mut self, arg: Arg<'a>) -> Result<(), ConfigError> {
        self.try_add_option_with_alias(arg, &[])
    }

    pub fn try_add_option_with_alias(
        &mut self,
        arg: Arg<'a>,
        aliases: &[&str],
    ) -> Result<(), ConfigError> {
        let info = &arg.info;
        check_name(&info.name, info.positional)?;

        if info.positional {
            if !aliases.is_empty() {
                return Err(ConfigError::PositionalAlias(info.name.clone()));
            }
            if info.nargs == Nargs::FLAG {
                return Err(ConfigError::PositionalWithoutArguments(info.name.clone()));
            }
            if let Some(&last) = self.positionals.last() {
                let last = &self.slots[last].info;
                if last.nargs.is_variadic() {
                    return Err(ConfigError::VariadicNotLast {
                        variadic: last.name.clone(),
                        name: info.name.clone(),
                    });
                }
            }
            let taken = self
                .positionals
                .iter()
                .any(|&id| self.slots[id].info.name == info.name);
            if taken {
                return Err(ConfigError::DuplicateName(info.name.clone()));
            }

            self.positionals.push(self.slots.len());
        } else {
            if info.nargs == Nargs::Repeated {
                return Err(ConfigError::RepeatedNamedOption(info.name.clone()));
            }
            let mut names: Vec<&str> = Vec::with_capacity(aliases.len() + 1);
            for &name in std::iter::once(&info.name.as_str()).chain(aliases) {
                check_name(name, false)?;
                if self.named.contains_key(name) || names.contains(&name) {
                    return Err(ConfigError::DuplicateName(name.to_string()));
                }
                names.push(name);
            }

            let id = self.slots.len();
            for name in names {
                self.named.insert(name.to_string(), id);
            }
        }

        self.slots.push(Slot {
            info: arg.info,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            callback: arg.callback,
            invoked: false,
            builtin: false,
        });
        Ok(())
    }

    pub fn try_add_subparser(
        &mut self,
        name: impl Into<String>,
        mut child: ArgParser<'a>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.subcommands.contains_key(&name) {
            return Err(ConfigError::DuplicateSubcommand(name));
        }
        child.set_prog(join_prog(&self.prog, &name));
        self.subcommands.insert(name, child);
        Ok(())
    }

    /// Install the handler for tokens that resolve to nothing.
    ///
    /// Without a hook, the first such token ends the parse with its error.
    /// With one, the hook decides: it may ignore the token, record it, or
    /// abort (optionally with an error). It receives tokens as given, so a
    /// cluster with one unknown letter arrives whole and none of its flags fire.
    pub fn on_unrecognized<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Context, &str, &ParseError) + 'a,
    {
        self.hook = Some(Box::new(hook));
    }

    /// Parse `tokens` (without the program name).
    ///
    /// Callbacks fire in token order. On success every required option has
    /// fired; otherwise the first terminal error is returned.
    pub fn parse<I, S>(&mut self, tokens: I) -> ParseResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset();
        let mut ctx = Context::new(tokens.into_iter().map(Into::into).collect());
        let outcome = ctx.run(self);
        let help_requested = ctx.help_requested();
        self.remaining = ctx.into_remaining();
        outcome?;

        if help_requested {
            return Err(ParseError::HelpRequested(self.help()));
        }
        self.check_required()?;

        tracing::debug!(prog = %self.prog, subcommand = ?self.selected, "parse finished");
        Ok(())
    }

    /// Parse the process arguments, skipping the program name.
    pub fn parse_args(&mut self) -> ParseResult<()> {
        self.parse(std::env::args().skip(1))
    }

    pub(crate) fn delegate(&mut self, literal: String, tokens: Vec<String>) -> ParseResult<()> {
        let Some(child) = self.subcommands.get_mut(&literal) else {
            return Err(ParseError::UnexpectedOperand(literal));
        };
        let outcome = child.parse(tokens);
        self.selected = Some(literal);
        outcome
    }

    fn reset(&mut self) {
        self.selected = None;
        self.remaining.clear();
        for slot in &mut self.slots {
            slot.invoked = false;
        }
        for child in self.subcommands.values_mut() {
            child.reset();
        }
    }

    fn check_required(&self) -> ParseResult<()> {
        let missing: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| slot.info.required && !slot.invoked)
            .map(|slot| slot.info.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParseError::RequiredMissing(missing))
        }
    }

    pub(crate) fn short_takes_arguments(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        self.named
            .get(&*c.encode_utf8(&mut buf))
            .is_some_and(|&id| self.slots[id].info.nargs.takes_arguments())
    }

    /// Tokens the most recent parse left unconsumed at this level, in their
    /// original order. Empty once a subcommand took over; the selected child
    /// keeps its own.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// The subcommand literal chosen by the most recent parse.
    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The child parser chosen by the most recent parse.
    pub fn selected(&self) -> Option<&ArgParser<'a>> {
        self.selected
            .as_deref()
            .and_then(|name| self.subcommands.get(name))
    }

    pub fn selected_mut(&mut self) -> Option<&mut ArgParser<'a>> {
        let name = self.selected.as_deref()?;
        self.subcommands.get_mut(name)
    }

    pub fn subcommand(&self, name: &str) -> Option<&ArgParser<'a>> {
        self.subcommands.get(name)
    }

    /// Registered options in registration order, builtin help included.
    pub fn options(&self) -> impl Iterator<Item = &ArgInfo> {
        self.slots.iter().map(|slot| &slot.info)
    }

    /// Whether the option registered as `name` (or an alias of it, or a
    /// positional of that name) fired during the most recent parse.
    pub fn was_invoked(&self, name: &str) -> bool {
        let id = self.named.get(name).copied().or_else(|| {
            self.positionals
                .iter()
                .copied()
                .find(|&id| self.slots[id].info.name == name)
        });
        id.is_some_and(|id| self.slots[id].invoked)
    }

    /// Describe this parser and its subcommands.
    pub fn schema(&self) -> CommandSchema {
        CommandSchema {
            name: self.prog.clone(),
            description: self.description.clone(),
            help: self.builtin_help,
            allow_unknown: self.hook.is_some(),
            args: self
                .slots
                .iter()
                .filter(|slot| !slot.builtin)
                .map(|slot| ArgSchema {
                    name: slot.info.name.clone(),
                    aliases: slot.aliases.clone(),
                    nargs: slot.info.nargs,
                    positional: slot.info.positional,
                    required: slot.info.required,
                    help: slot.info.help.clone(),
                    metavar: slot.info.metavar.clone(),
                })
                .collect(),
            subcommands: self
                .subcommands
                .iter()
                .map(|(literal, child)| CommandSchema {
                    name: literal.clone(),
                    ..child.schema()
                })
                .collect(),
        }
    }

    /// The one-line (wrapped) usage summary.
    pub fn usage(&self) -> String {
        help::usage(&self.schema(), &self.prog)
    }

    /// The full help text: usage, description, arguments, options, commands.
    pub fn help(&self) -> String {
        help::help(&self.schema(), &self.prog)
    }
}

impl fmt::Debug for ArgParser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgParser")
            .field("prog", &self.prog)
            .field("options", &self.slots.iter().map(|s| &s.info).collect::<Vec<_>>())
            .field("subcommands", &self.subcommands.keys().collect::<Vec<_>>())
            .field("hook", &self.hook.is_some())
            .field("selected", &self.selected)
            .field("remaining", &self.remaining)
            .finish()
    }
}

fn check_name(name: &str, positional: bool) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyName);
    }
    if !positional && name.starts_with('-') && name.chars().count() != 1 {
        return Err(ConfigError::DashPrefixedName(name.to_string()));
    }
    Ok(())
}

fn join_prog(prog: &str, literal: &str) -> String {
    if prog.is_empty() {
        literal.to_string()
    } else {
        format!("{prog} {literal}")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::values;

    type Log = Vec<(String, Vec<String>)>;

    /// Parse `tokens` against flags `a b c`, `-s`/`--long` (one argument
    /// each) and `--two` (two arguments), returning every callback call.
    fn record(tokens: &[&str]) -> Result<Log, String> {
        let log = RefCell::new(Log::new());
        let mut parser = ArgParser::new();
        for (name, nargs) in [("a", 0), ("b", 0), ("c", 0), ("s", 1), ("long", 1), ("two", 2)] {
            let log = &log;
            parser.add_option(Arg::new(name, nargs, move |ctx, args| {
                let name = ctx.option().map(|o| o.name().to_string()).unwrap_or_default();
                log.borrow_mut().push((name, args.to_vec()));
            }));
        }
        let outcome = parser.parse(tokens.iter().copied()).map_err(|e| e.to_string());
        drop(parser);
        outcome.map(|()| log.into_inner())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mixed_named_positional_and_repeated() {
        let (mut short, mut long, mut pos) = (String::new(), String::new(), String::new());
        let (mut flag_s, mut flag_long) = (false, false);
        let mut two = Vec::new();
        let mut rest: Vec<String> = Vec::new();

        let mut parser = ArgParser::new();
        parser.add_option(values::string("s", &mut short));
        parser.add_option(values::string("long", &mut long));
        parser.add_option(values::flag("S", &mut flag_s));
        parser.add_option(values::flag("long-flag", &mut flag_long));
        parser.add_option(Arg::new("two", 2, |_, args: &[String]| two = args.to_vec()));
        parser.add_option(values::string("pos", &mut pos).positional().required());
        parser.add_option(values::append_positional("rest", &mut rest));

        parser
            .parse([
                "-s", "sval", "--long", "lval", "pos", "-S", "a", "--long-flag", "b", "--two",
                "foo", "bar", "c",
            ])
            .unwrap();
        drop(parser);

        assert_eq!(short, "sval");
        assert_eq!(long, "lval");
        assert!(flag_s);
        assert!(flag_long);
        assert_eq!(pos, "pos");
        assert_eq!(two, ["foo", "bar"]);
        assert_eq!(rest, ["a", "b", "c"]);
    }

    #[test]
    fn cluster_ending_in_option_with_argument() {
        let log = record(&["-abcs", "val"]).unwrap();
        assert_eq!(
            log,
            [
                ("a".to_string(), vec![]),
                ("b".to_string(), vec![]),
                ("c".to_string(), vec![]),
                ("s".to_string(), strings(&["val"])),
            ]
        );
    }

    #[test]
    fn option_with_argument_claims_rest_of_cluster() {
        let (mut a, mut b, mut c) = (false, false, false);
        let mut d = String::new();
        let mut parser = ArgParser::new();
        parser.add_option(values::flag("a", &mut a));
        parser.add_option(values::flag("b", &mut b));
        parser.add_option(values::flag("c", &mut c));
        parser.add_option(values::string("d", &mut d));
        parser.parse(["-dabc"]).unwrap();
        drop(parser);

        assert_eq!(d, "abc");
        assert!(!a && !b && !c);
    }

    #[test]
    fn clustering_law() {
        assert_eq!(record(&["-abc"]), record(&["-a", "-b", "-c"]));
    }

    #[test]
    fn attached_value_law() {
        assert_eq!(record(&["-sval"]), record(&["-s", "val"]));
        assert_eq!(record(&["-as-x"]), record(&["-a", "-s", "-x"]));
    }

    #[test]
    fn split_law() {
        assert_eq!(record(&["--long=value"]), record(&["--long", "value"]));
        assert_eq!(record(&["--two=x", "y"]), record(&["--two", "x", "y"]));
    }

    #[test]
    fn repeated_occurrences_fire_each_time() {
        let log = record(&["-s", "1", "-s2", "--long", "3", "--long=4"]).unwrap();
        let values: Vec<&str> = log.iter().map(|(_, args)| args[0].as_str()).collect();
        assert_eq!(values, ["1", "2", "3", "4"]);
    }

    #[test]
    fn single_character_name_is_short_only() {
        assert_eq!(
            record(&["--a"]).unwrap_err(),
            "unknown option \"--a\""
        );

        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("ab", 0, |_, _| {}));
        let err = parser.parse(["-ab"]).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOption(ref t) if t == "-a"));
    }

    #[test]
    fn unknown_option_without_hook_stops_immediately() {
        let mut seen = Vec::new();
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("a", 0, |ctx: &mut Context, _: &[String]| {
            seen.push(ctx.remaining().to_vec())
        }));
        let err = parser.parse(["-a", "-x", "-a"]).unwrap_err();
        drop(parser);

        assert!(matches!(err, ParseError::UnknownOption(ref t) if t == "-x"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn unexpected_operand_without_positional() {
        let mut parser = ArgParser::new();
        let err = parser.parse(["foo"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedOperand(ref t) if t == "foo"));
        assert_eq!(err.to_string(), "unexpected operand \"foo\"");
    }

    #[test]
    fn missing_arguments_is_fatal_even_with_hook() {
        let mut hook_calls = 0;
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("two", 2, |_, _| {}));
        parser.on_unrecognized(|_, _, _| hook_calls += 1);
        let err = parser.parse(["--two", "x"]).unwrap_err();
        drop(parser);

        assert_eq!(err.to_string(), "option --two requires 2 arguments");
        assert!(matches!(err, ParseError::MissingArguments { needed: 2, .. }));
        assert_eq!(hook_calls, 0);
    }

    #[test]
    fn required_missing_single_and_aggregate() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("name", 1, |_, _| {}).required());
        parser.add_option(Arg::new("q", 0, |_, _| {}));
        let err = parser.parse(["-q"]).unwrap_err();
        assert_eq!(err.to_string(), "option --name is required");

        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("a", 1, |_, _| {}).required());
        parser.add_option(Arg::new("pos", 1, |_, _| {}).positional().required());
        let err = parser.parse(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ParseError::RequiredMissing(ref names) if names == &["-a", "pos"]));
        assert_eq!(err.to_string(), "the following options are required: -a, pos");
    }

    #[test]
    fn alias_satisfies_required() {
        let mut output = String::new();
        let mut parser = ArgParser::new();
        parser.add_option_with_alias(values::string("output", &mut output).required(), &["o"]);
        parser.parse(["-o", "out"]).unwrap();
        assert!(parser.was_invoked("output"));
        assert!(parser.was_invoked("o"));
        drop(parser);
        assert_eq!(output, "out");
    }

    #[test]
    fn hook_abort_leaves_remainder_in_order() {
        let mut a = false;
        let mut remainder = Vec::new();
        let mut parser = ArgParser::new();
        parser.add_option(values::flag("a", &mut a));
        parser.on_unrecognized(|ctx, _, _| {
            remainder = ctx.remaining().to_vec();
            ctx.abort();
        });
        parser.parse(["-a", "-x", "-b", "-c"]).unwrap();
        drop(parser);

        assert!(a);
        assert_eq!(remainder, ["-x", "-b", "-c"]);
    }

    #[test]
    fn hook_can_swallow_and_continue() {
        let mut seen = Vec::new();
        let mut a = 0;
        let mut parser = ArgParser::new();
        parser.add_option(values::func("a", || a += 1));
        parser.on_unrecognized(|ctx, token, err| {
            assert!(ctx.option().is_none());
            let kind = match err {
                ParseError::UnknownOption(_) => "unknown",
                ParseError::UnexpectedOperand(_) => "operand",
                _ => "other",
            };
            seen.push((token.to_string(), kind));
        });
        parser.parse(["-x", "-a", "loose", "--long=v", "-ya"]).unwrap();
        drop(parser);

        assert_eq!(a, 1);
        assert_eq!(
            seen,
            [
                ("-x".to_string(), "unknown"),
                ("loose".to_string(), "operand"),
                ("--long=v".to_string(), "unknown"),
                ("-ya".to_string(), "unknown"),
            ]
        );
    }

    #[test]
    fn hook_abort_sees_raw_tokens_unmodified() {
        for input in [["-xab", "tail"], ["--nope=v", "tail"], ["-axb", "tail"]] {
            let (mut a, mut b) = (false, false);
            let mut seen = None;
            let mut parser = ArgParser::new();
            parser.add_option(values::flag("a", &mut a));
            parser.add_option(values::flag("b", &mut b));
            parser.on_unrecognized(|ctx, token, err| {
                seen = Some((token.to_string(), err.to_string(), ctx.remaining().to_vec()));
                ctx.abort();
            });
            parser.parse(input).unwrap();
            let remaining = parser.remaining().to_vec();
            drop(parser);

            let (token, err, in_hook) = seen.unwrap();
            assert_eq!(token, input[0]);
            assert!(err.starts_with("unknown option"), "{err}");
            assert_eq!(in_hook, input);
            assert_eq!(remaining, input);
            assert!(!a && !b, "no flag of {:?} may fire", input[0]);
        }
    }

    #[test]
    fn unknown_piece_of_cluster_is_named_without_hook() {
        let err = record(&["-axb"]).unwrap_err();
        assert_eq!(err, "unknown option \"-x\"");
        let err = record(&["--nope=v"]).unwrap_err();
        assert_eq!(err, "unknown option \"--nope\"");
        // The value claimed by `-s` is never looked up.
        let log = record(&["-asxyz"]).unwrap();
        assert_eq!(
            log,
            [
                ("a".to_string(), Vec::new()),
                ("s".to_string(), strings(&["xyz"])),
            ]
        );
    }

    #[test]
    fn remainder_is_kept_after_parse() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("stop", 0, |ctx: &mut Context, _: &[String]| ctx.abort()));
        parser.add_option(Arg::new("q", 0, |_, _| {}));
        parser.add_subparser("sub", ArgParser::new());

        parser.parse(["-q", "--stop", "-q", "x"]).unwrap();
        assert_eq!(parser.remaining(), ["-q", "x"]);

        parser.parse(["-q"]).unwrap();
        assert!(parser.remaining().is_empty());

        let err = parser.parse(["-q", "-z", "x"]).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOption(_)));
        assert_eq!(parser.remaining(), ["-z", "x"]);

        let err = parser.parse(["sub", "extra"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedOperand(_)));
        assert!(parser.remaining().is_empty());
        assert_eq!(parser.selected().unwrap().remaining(), ["extra"]);
    }

    #[test]
    fn hook_error_is_reported() {
        let mut parser = ArgParser::new();
        parser.on_unrecognized(|ctx, token, _| {
            ctx.abort_with_error(anyhow::anyhow!("rejected {token}"));
        });
        let err = parser.parse(["-x", "-y"]).unwrap_err();
        assert!(matches!(err, ParseError::Callback(_)));
        assert_eq!(err.to_string(), "rejected -x");
    }

    #[test]
    fn callback_error_bypasses_hook() {
        let mut hook_calls = 0;
        let mut after = false;
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("fail", 0, |ctx: &mut Context, _: &[String]| {
            ctx.abort_with_error(anyhow::anyhow!("boom"));
        }));
        parser.add_option(values::flag("after", &mut after));
        parser.on_unrecognized(|_, _, _| hook_calls += 1);
        let err = parser.parse(["--fail", "--after", "-x"]).unwrap_err();
        drop(parser);

        assert_eq!(err.to_string(), "boom");
        assert_eq!(hook_calls, 0);
        assert!(!after);
    }

    #[test]
    fn abort_without_error_still_validates_required() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("stop", 0, |ctx: &mut Context, _: &[String]| ctx.abort()));
        parser.add_option(Arg::new("need", 1, |_, _| {}).required());
        let err = parser.parse(["--stop", "--need", "x"]).unwrap_err();
        assert!(matches!(err, ParseError::RequiredMissing(_)));
    }

    #[test]
    fn callback_sees_its_descriptor_and_the_remainder() {
        let mut seen = None;
        let mut parser = ArgParser::new();
        parser.add_option(
            Arg::new("define", 2, |ctx: &mut Context, args: &[String]| {
                let info = ctx.option().cloned();
                seen = Some((info, args.to_vec(), ctx.remaining().to_vec()));
            })
            .metavar("KV"),
        );
        parser.add_option(Arg::new("q", 0, |_, _| {}));
        parser.parse(["--define", "k", "v", "-q"]).unwrap();
        drop(parser);

        let (info, args, remaining) = seen.unwrap();
        let info = info.unwrap();
        assert_eq!(info.name(), "define");
        assert_eq!(info.nargs(), Nargs::Exact(2));
        assert_eq!(info.metavar(), Some("KV"));
        assert_eq!(args, ["k", "v"]);
        assert_eq!(remaining, ["-q"]);
    }

    #[test]
    fn capture_rest_positional_takes_everything_without_hook() {
        let mut calls = Vec::new();
        let mut hook_calls = 0;
        let mut parser = ArgParser::new();
        parser.add_option(
            Arg::new("cmd", Nargs::CaptureRest, |_, args: &[String]| calls.push(args.to_vec()))
                .positional(),
        );
        parser.on_unrecognized(|_, _, _| hook_calls += 1);
        parser.parse(["ls", "-l", "--all", "dir"]).unwrap();
        drop(parser);

        assert_eq!(calls, [strings(&["ls", "-l", "--all", "dir"])]);
        assert_eq!(hook_calls, 0);
    }

    #[test]
    fn repeated_positional_leaves_dashes_to_resolution() {
        let mut calls = Vec::new();
        let mut unknown = Vec::new();
        let mut parser = ArgParser::new();
        parser.add_option(
            Arg::new("files", Nargs::Repeated, |_, args: &[String]| calls.push(args.to_vec()))
                .positional(),
        );
        parser.on_unrecognized(|_, token, _| unknown.push(token.to_string()));
        parser.parse(["a", "-x", "b", "--y", "c"]).unwrap();
        drop(parser);

        assert_eq!(calls, [strings(&["a"]), strings(&["b"]), strings(&["c"])]);
        assert_eq!(unknown, ["-x", "--y"]);
    }

    #[test]
    fn named_capture_rest_and_placeholder() {
        let mut exec = Vec::new();
        let mut passthrough = Vec::new();
        let mut a = false;
        let mut parser = ArgParser::new();
        parser.add_option(values::flag("a", &mut a));
        parser.add_option(values::rest("exec", &mut exec));
        parser.add_option(values::rest("-", &mut passthrough));
        parser.parse(["-a-x", "y"]).unwrap();
        parser.parse(["--exec", "--", "z"]).unwrap();
        drop(parser);

        assert!(a);
        assert_eq!(passthrough, ["x", "y"]);
        assert_eq!(exec, ["--", "z"]);
    }

    #[test]
    fn lone_dash_is_a_positional_value() {
        let mut input = String::new();
        let mut parser = ArgParser::new();
        parser.add_option(values::string("input", &mut input).positional());
        parser.parse(["-"]).unwrap();
        drop(parser);
        assert_eq!(input, "-");
    }

    #[test]
    fn subcommand_wins_over_positional() {
        let mut pos = String::new();
        let mut parser = ArgParser::new();
        parser.add_option(values::string("pos", &mut pos).positional());
        parser.add_subparser("run", ArgParser::new());
        parser.parse(["run"]).unwrap();
        assert_eq!(parser.selected_name(), Some("run"));
        parser.parse(["other"]).unwrap();
        assert_eq!(parser.selected_name(), None);
        drop(parser);
        assert_eq!(pos, "other");
    }

    #[test]
    fn nested_subcommands_are_terminal() {
        let mut verbose = false;
        let mut name = String::new();
        let mut url = String::new();

        let mut root = ArgParser::named("git");
        root.add_option(values::flag("v", &mut verbose));
        let mut remote = root.subparser();
        let mut add = remote.subparser();
        add.add_option(values::string("name", &mut name).positional());
        add.add_option(values::string("url", &mut url).positional());
        remote.add_subparser("add", add);
        root.add_subparser("remote", remote);

        root.parse(["remote", "add", "origin", "https://example.invalid/repo"])
            .unwrap();

        let remote = root.selected().unwrap();
        assert!(std::ptr::eq(remote, root.subcommand("remote").unwrap()));
        assert_eq!(remote.prog(), "git remote");
        let add = remote.selected().unwrap();
        assert!(std::ptr::eq(add, remote.subcommand("add").unwrap()));
        assert_eq!(add.prog(), "git remote add");
        assert!(add.selected().is_none());

        // `-v` after the boundary belongs to the child, which does not know it.
        let err = root.parse(["remote", "-v"]).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOption(ref t) if t == "-v"));
        assert_eq!(root.selected_name(), Some("remote"));
        assert!(!root.was_invoked("v"));
        drop(root);

        assert!(!verbose);
        assert_eq!(name, "origin");
        assert_eq!(url, "https://example.invalid/repo");
    }

    #[test]
    fn parent_validates_required_after_child() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("config", 1, |_, _| {}).required());
        let mut child = ArgParser::new();
        child.add_option(Arg::new("target", 1, |_, _| {}).required());
        parser.add_subparser("build", child);

        let err = parser.parse(["--config", "c", "build"]).unwrap_err();
        assert_eq!(err.to_string(), "option --target is required");

        let err = parser.parse(["build", "--target", "t"]).unwrap_err();
        assert_eq!(err.to_string(), "option --config is required");

        parser
            .parse(["--config", "c", "build", "--target", "t"])
            .unwrap();
    }

    #[test]
    fn invoked_flags_reset_between_parses() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("a", 0, |_, _| {}));
        let mut child = ArgParser::new();
        child.add_option(Arg::new("b", 0, |_, _| {}));
        parser.add_subparser("sub", child);

        parser.parse(["-a", "sub", "-b"]).unwrap();
        assert!(parser.was_invoked("a"));
        assert!(parser.selected().unwrap().was_invoked("b"));

        parser.parse(Vec::<String>::new()).unwrap();
        assert!(!parser.was_invoked("a"));
        assert!(parser.selected().is_none());
        assert!(!parser.subcommand("sub").unwrap().was_invoked("b"));
    }

    #[test]
    fn builtin_help_skips_required_validation() {
        let mut parser = ArgParser::with_help("tool");
        parser.add_option(Arg::new("name", 1, |_, _| {}).required());
        let mut child = parser.subparser();
        child.add_option(Arg::new("x", 0, |_, _| {}));
        parser.add_subparser("run", child);

        let err = parser.parse(["--help"]).unwrap_err();
        assert!(err.is_help());
        assert_eq!(err.to_string(), parser.help());

        let err = parser.parse(["run", "-h"]).unwrap_err();
        let text = match err {
            ParseError::HelpRequested(text) => text,
            other => panic!("expected help, got {other:?}"),
        };
        assert!(text.starts_with("usage: tool run [-h] [-x]"), "{text}");
    }

    #[test]
    fn registration_errors() {
        let mut parser = ArgParser::new();
        parser.add_option_with_alias(Arg::new("verbose", 0, |_, _| {}), &["v"]);
        parser.add_option(Arg::new("rest", Nargs::Repeated, |_, _| {}).positional());

        let cases: Vec<(Arg<'_>, Vec<&str>, ConfigError)> = vec![
            (Arg::new("", 0, |_, _| {}), vec![], ConfigError::EmptyName),
            (
                Arg::new("-x", 0, |_, _| {}),
                vec![],
                ConfigError::DashPrefixedName("-x".to_string()),
            ),
            (
                Arg::new("many", Nargs::Repeated, |_, _| {}),
                vec![],
                ConfigError::RepeatedNamedOption("many".to_string()),
            ),
            (
                Arg::new("v", 0, |_, _| {}),
                vec![],
                ConfigError::DuplicateName("v".to_string()),
            ),
            (
                Arg::new("quiet", 0, |_, _| {}),
                vec!["q", "q"],
                ConfigError::DuplicateName("q".to_string()),
            ),
            (
                Arg::new("after", 1, |_, _| {}).positional(),
                vec![],
                ConfigError::VariadicNotLast {
                    variadic: "rest".to_string(),
                    name: "after".to_string(),
                },
            ),
            (
                Arg::new("file", 1, |_, _| {}).positional(),
                vec!["f"],
                ConfigError::PositionalAlias("file".to_string()),
            ),
        ];
        for (arg, aliases, expected) in cases {
            assert_eq!(parser.try_add_option_with_alias(arg, &aliases), Err(expected));
        }

        // Nothing from the rejected `quiet` registration leaked in.
        assert!(parser.try_add_option(Arg::new("quiet", 0, |_, _| {})).is_ok());
        assert!(parser.try_add_option(Arg::new("q", 0, |_, _| {})).is_ok());
        assert_eq!(parser.options().count(), 4);

        assert!(parser.try_add_subparser("sub", ArgParser::new()).is_ok());
        assert_eq!(
            parser.try_add_subparser("sub", ArgParser::new()),
            Err(ConfigError::DuplicateSubcommand("sub".to_string()))
        );
        assert_eq!(
            parser.try_add_subparser("", ArgParser::new()),
            Err(ConfigError::EmptyName)
        );
    }

    #[test]
    #[should_panic(expected = "invalid option: positional \"p\" must take at least one argument")]
    fn positional_flag_panics() {
        let mut parser = ArgParser::new();
        parser.add_option(Arg::new("p", 0, |_, _| {}).positional());
    }

    #[test]
    #[should_panic(expected = "invalid subcommand: subcommand \"run\" is already registered")]
    fn duplicate_subcommand_panics() {
        let mut parser = ArgParser::new();
        parser.add_subparser("run", ArgParser::new());
        parser.add_subparser("run", ArgParser::new());
    }
}
