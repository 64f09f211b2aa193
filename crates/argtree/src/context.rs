use crate::{ArgInfo, ArgParser, Nargs, ParseError, ParseResult};

/// Per-level parse state handed to callbacks and the unrecognized-token hook.
///
/// One `Context` exists per [`ArgParser::parse`] call and per subcommand
/// level; it owns the token stream and the cursors, nothing else.
#[derive(Debug)]
pub struct Context {
    tokens: Vec<String>,
    index: usize,
    positional: usize,
    aborted: bool,
    help: bool,
    error: Option<ParseError>,
    current: Option<ArgInfo>,
}

/// What the head token resolved to.
enum Target {
    Slot(usize),
    Subcommand(String),
}

impl Context {
    pub(crate) fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            index: 0,
            positional: 0,
            aborted: false,
            help: false,
            error: None,
            current: None,
        }
    }

    /// Stop the parse after the current callback or hook returns.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Stop the parse and report `err` as its outcome.
    ///
    /// The error is sticky: it wins over anything else that happens later at
    /// this level, and the hook never sees it.
    pub fn abort_with_error(&mut self, err: impl Into<anyhow::Error>) {
        self.abort();
        self.error = Some(ParseError::Callback(err.into()));
    }

    /// Stop the parse and report the builtin help text instead of validating.
    pub fn request_help(&mut self) {
        self.abort();
        self.help = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Tokens not consumed yet, in their original order.
    ///
    /// Inside a callback this starts after the callback's own arguments;
    /// inside the hook it starts at the token the hook was called for.
    pub fn remaining(&self) -> &[String] {
        self.tokens.get(self.index..).unwrap_or_default()
    }

    /// The option whose callback is running, if any.
    pub fn option(&self) -> Option<&ArgInfo> {
        self.current.as_ref()
    }

    pub(crate) fn into_remaining(mut self) -> Vec<String> {
        let index = self.index.min(self.tokens.len());
        self.tokens.split_off(index)
    }

    pub(crate) fn help_requested(&self) -> bool {
        self.help
    }

    /// The dispatch loop. Returns when the tokens run out, the context is
    /// aborted, a subcommand took over, or something failed.
    pub(crate) fn run(&mut self, parser: &mut ArgParser<'_>) -> ParseResult<()> {
        while !self.aborted && self.index < self.tokens.len() {
            let raw = self.tokens[self.index].clone();
            let resolved = match self.expand_head(parser, &raw) {
                Ok(()) => {
                    let token = self.tokens[self.index].clone();
                    tracing::trace!(%token, index = self.index, "dispatching token");
                    self.resolve(parser, &token)
                }
                Err(err) => Err(err),
            };

            let id = match resolved {
                Ok(Target::Slot(id)) => id,
                Ok(Target::Subcommand(literal)) => {
                    self.index += 1;
                    let rest = self.tokens.split_off(self.index);
                    tracing::debug!(subcommand = %literal, remaining = rest.len(), "delegating to subcommand");
                    return parser.delegate(literal, rest);
                }
                Err(err) => {
                    let Some(hook) = parser.hook.as_mut() else {
                        return Err(err);
                    };
                    tracing::debug!(token = %raw, error = %err, "handing unresolved token to hook");
                    hook(self, &raw, &err);
                    self.index += 1;
                    if let Some(err) = self.error.take() {
                        return Err(err);
                    }
                    continue;
                }
            };

            let slot = &mut parser.slots[id];
            if !slot.info.positional {
                self.index += 1;
            }

            let available = self.tokens.len() - self.index;
            let needed = match slot.info.nargs {
                Nargs::Exact(n) => n,
                Nargs::Repeated => 1,
                Nargs::CaptureRest => available,
            };
            if available < needed {
                return Err(ParseError::MissingArguments {
                    option: slot.info.to_string(),
                    needed,
                });
            }

            let args = self.tokens[self.index..self.index + needed].to_vec();
            self.index += needed;
            slot.invoked = true;

            self.current = Some(slot.info.clone());
            (slot.callback)(self, &args);
            self.current = None;

            if let Some(err) = self.error.take() {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Split the head token in place once every option piece of the split
    /// resolves. Otherwise the raw token stays and fails as a whole.
    fn expand_head(&mut self, parser: &ArgParser<'_>, raw: &str) -> ParseResult<()> {
        let Some(pieces) = expand(raw, |c| parser.short_takes_arguments(c)) else {
            return Ok(());
        };

        let options = if raw.starts_with("--") {
            &pieces[..1]
        } else {
            &pieces[..]
        };
        for piece in options {
            let Some(found) = lookup(parser, piece) else {
                break;
            };
            let id = found?;
            // The piece after this one is its attached value.
            if piece == "--" || parser.slots[id].info.nargs.takes_arguments() {
                break;
            }
        }

        self.tokens.splice(self.index..=self.index, pieces);
        Ok(())
    }

    fn resolve(&mut self, parser: &ArgParser<'_>, token: &str) -> ParseResult<Target> {
        if let Some(found) = lookup(parser, token) {
            return found.map(Target::Slot);
        }

        if parser.subcommands.contains_key(token) {
            return Ok(Target::Subcommand(token.to_string()));
        }

        if let Some(&id) = parser.positionals.get(self.positional) {
            self.positional += 1;
            return Ok(Target::Slot(id));
        }

        if let Some(&id) = parser.positionals.last()
            && parser.slots[id].info.nargs.is_variadic()
        {
            return Ok(Target::Slot(id));
        }

        if token.starts_with('-') {
            Err(ParseError::UnknownOption(token.to_string()))
        } else {
            Err(ParseError::UnexpectedOperand(token.to_string()))
        }
    }
}

/// Look up a dash-prefixed token in the named table. `None` when the token
/// is not option-shaped.
fn lookup(parser: &ArgParser<'_>, token: &str) -> Option<ParseResult<usize>> {
    let unknown = || Err(ParseError::UnknownOption(token.to_string()));

    if let Some(name) = token.strip_prefix("--").filter(|name| !name.is_empty()) {
        // Single-character names are only reachable as `-c`.
        return Some(match parser.named.get(name) {
            Some(&id) if name.chars().count() > 1 => Ok(id),
            _ => unknown(),
        });
    }

    let name = token
        .strip_prefix('-')
        .filter(|name| name.chars().count() == 1)?;
    Some(parser.named.get(name).map_or_else(unknown, |&id| Ok(id)))
}

/// Split `--name=value` and short-flag clusters into one token per unit.
///
/// `takes_arguments` reports whether a short name has nonzero arity; such a
/// character (or the placeholder `-`) claims the rest of the cluster as a
/// separate value token. Returns `None` when the token stays as it is.
pub(crate) fn expand(token: &str, takes_arguments: impl Fn(char) -> bool) -> Option<Vec<String>> {
    if let Some(long) = token.strip_prefix("--") {
        if long.starts_with('=') {
            return None;
        }
        let (name, value) = long.split_once('=')?;
        return Some(vec![format!("--{name}"), value.to_string()]);
    }

    let cluster = token.strip_prefix('-')?;
    if cluster.chars().nth(1).is_none() {
        return None;
    }

    let mut out = Vec::new();
    for (i, c) in cluster.char_indices() {
        out.push(format!("-{c}"));
        let rest = &cluster[i + c.len_utf8()..];
        if !rest.is_empty() && (c == '-' || takes_arguments(c)) {
            out.push(rest.to_string());
            break;
        }
    }
    Some(out)
}
