use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Context;

/// Option callback: receives the parse context and exactly the tokens the
/// option's arity claimed.
pub type Callback<'a> = Box<dyn FnMut(&mut Context, &[String]) + 'a>;

/// How many trailing tokens an option consumes per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NargsRepr", into = "NargsRepr")]
pub enum Nargs {
    /// Exactly `n` tokens; `Exact(0)` is a pure flag.
    Exact(usize),
    /// Positional only: matches once per bare token, one value per match,
    /// for as long as bare tokens keep coming.
    Repeated,
    /// A single invocation receives every remaining token.
    CaptureRest,
}

impl Nargs {
    pub const FLAG: Nargs = Nargs::Exact(0);

    /// Whether the option consumes at least one token when it can.
    pub fn takes_arguments(self) -> bool {
        !matches!(self, Nargs::Exact(0))
    }

    pub fn is_variadic(self) -> bool {
        matches!(self, Nargs::Repeated | Nargs::CaptureRest)
    }
}

impl From<usize> for Nargs {
    fn from(n: usize) -> Self {
        Nargs::Exact(n)
    }
}

impl fmt::Display for Nargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nargs::Exact(n) => write!(f, "{n}"),
            Nargs::Repeated => f.write_str("repeated"),
            Nargs::CaptureRest => f.write_str("rest"),
        }
    }
}

// JSON shape: `1`, `"repeated"` or `"rest"`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NargsRepr {
    Count(usize),
    Keyword(NargsKeyword),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum NargsKeyword {
    Repeated,
    Rest,
}

impl From<NargsRepr> for Nargs {
    fn from(repr: NargsRepr) -> Self {
        match repr {
            NargsRepr::Count(n) => Nargs::Exact(n),
            NargsRepr::Keyword(NargsKeyword::Repeated) => Nargs::Repeated,
            NargsRepr::Keyword(NargsKeyword::Rest) => Nargs::CaptureRest,
        }
    }
}

impl From<Nargs> for NargsRepr {
    fn from(nargs: Nargs) -> Self {
        match nargs {
            Nargs::Exact(n) => NargsRepr::Count(n),
            Nargs::Repeated => NargsRepr::Keyword(NargsKeyword::Repeated),
            Nargs::CaptureRest => NargsRepr::Keyword(NargsKeyword::Rest),
        }
    }
}

/// Registered, read-only description of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo {
    pub(crate) name: String,
    pub(crate) nargs: Nargs,
    pub(crate) positional: bool,
    pub(crate) required: bool,
    pub(crate) help: String,
    pub(crate) metavar: Option<String>,
}

impl ArgInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nargs(&self) -> Nargs {
        self.nargs
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn metavar(&self) -> Option<&str> {
        self.metavar.as_deref()
    }
}

/// `-c` for single-character names, `--name` otherwise, and the bare name
/// for positionals.
impl fmt::Display for ArgInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_name(&self.name, self.positional, f)
    }
}

pub(crate) fn display_name(name: &str, positional: bool, f: &mut impl fmt::Write) -> fmt::Result {
    if positional {
        f.write_str(name)
    } else if name.chars().count() == 1 {
        write!(f, "-{name}")
    } else {
        write!(f, "--{name}")
    }
}

/// An option descriptor on its way into an [`ArgParser`](crate::ArgParser).
///
/// ```
/// use argtree::{Arg, Nargs};
///
/// let mut pairs = Vec::new();
/// let arg = Arg::new("define", 2, |_ctx, args: &[String]| {
///     pairs.push((args[0].clone(), args[1].clone()));
/// })
/// .help("Define KEY as VALUE")
/// .metavar("KEY");
/// assert_eq!(arg.info().nargs(), Nargs::Exact(2));
/// ```
pub struct Arg<'a> {
    pub(crate) info: ArgInfo,
    pub(crate) callback: Callback<'a>,
}

impl<'a> Arg<'a> {
    pub fn new<F>(name: impl Into<String>, nargs: impl Into<Nargs>, callback: F) -> Self
    where
        F: FnMut(&mut Context, &[String]) + 'a,
    {
        Self {
            info: ArgInfo {
                name: name.into(),
                nargs: nargs.into(),
                positional: false,
                required: false,
                help: String::new(),
                metavar: None,
            },
            callback: Box::new(callback),
        }
    }

    /// Match by position instead of by name.
    pub fn positional(mut self) -> Self {
        self.info.positional = true;
        self
    }

    /// Fail the parse if the option never fires.
    pub fn required(mut self) -> Self {
        self.info.required = true;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.info.help = help.into();
        self
    }

    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.info.metavar = Some(metavar.into());
        self
    }

    pub fn info(&self) -> &ArgInfo {
        &self.info
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
