use thiserror::Error;

/// Terminal outcome of a failed parse. A parse reports at most one of these.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A dash-prefixed token names no registered option.
    #[error("unknown option {0:?}")]
    UnknownOption(String),

    /// Fewer tokens remain than the option's arity.
    #[error("option {option} requires {needed} arguments")]
    MissingArguments { option: String, needed: usize },

    /// A bare token has no positional slot left and is not a subcommand.
    #[error("unexpected operand {0:?}")]
    UnexpectedOperand(String),

    /// A callback or hook aborted with an error.
    #[error(transparent)]
    Callback(anyhow::Error),

    /// Required options that never fired, in registration order.
    #[error("{}", required_message(.0))]
    RequiredMissing(Vec<String>),

    /// The builtin `-h`/`--help` option fired; carries the rendered help.
    #[error("{0}")]
    HelpRequested(String),
}

impl ParseError {
    pub fn is_help(&self) -> bool {
        matches!(self, Self::HelpRequested(_))
    }
}

fn required_message(missing: &[String]) -> String {
    match missing {
        [one] => format!("option {one} is required"),
        many => format!(
            "the following options are required: {}",
            many.join(", ")
        ),
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Registration-time invariant violation.
///
/// `ArgParser::add_*` panics with this; `ArgParser::try_add_*` returns it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("option name must not be empty")]
    EmptyName,

    #[error("option name {0:?} must not start with '-'")]
    DashPrefixedName(String),

    #[error("positional {0:?} must take at least one argument")]
    PositionalWithoutArguments(String),

    #[error("positional {name:?} follows variadic positional {variadic:?}")]
    VariadicNotLast { variadic: String, name: String },

    #[error("option {0:?} cannot repeat; only positionals take repeated values")]
    RepeatedNamedOption(String),

    #[error("positional {0:?} cannot have aliases")]
    PositionalAlias(String),

    #[error("option name {0:?} is already registered")]
    DuplicateName(String),

    #[error("subcommand {0:?} is already registered")]
    DuplicateSubcommand(String),
}
