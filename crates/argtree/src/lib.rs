//! Callback-driven command-line token parsing.
//!
//! An [`ArgParser`] is a registry of option descriptors ([`Arg`]) and child
//! parsers (subcommands). Parsing walks the token list once, in order, and
//! invokes each option's callback with exactly the tokens it declared:
//!
//! - `--name`, `--name=value`
//! - `-c`, clustered `-abc`, attached values `-cvalue`
//! - positionals, including a trailing variadic one
//! - subcommands, which take over the rest of the tokens
//!
//! Callbacks usually write into a caller-owned cell borrowed for the parser's
//! lifetime `'a`; drop the parser to get the borrow back.
//!
//! ```
//! use argtree::{ArgParser, values};
//!
//! let mut verbose = false;
//! let mut output = String::new();
//! let mut files: Vec<String> = Vec::new();
//!
//! let mut parser = ArgParser::named("tool");
//! parser.add_option_with_alias(values::flag("v", &mut verbose), &["verbose"]);
//! parser.add_option_with_alias(values::string("o", &mut output), &["output"]);
//! parser.add_option(values::append_positional("file", &mut files));
//! parser.parse(["-vo", "out.txt", "a", "b"]).unwrap();
//! drop(parser);
//!
//! assert!(verbose);
//! assert_eq!(output, "out.txt");
//! assert_eq!(files, ["a", "b"]);
//! ```

mod arg;
mod context;
mod error;
pub mod help;
mod parser;
pub mod schema;
pub mod values;

pub use arg::{Arg, ArgInfo, Callback, Nargs};
pub use context::Context;
pub use error::{ConfigError, ParseError, ParseResult};
pub use parser::{ArgParser, Hook};
pub use schema::{ArgSchema, CommandSchema};
pub use values::Value;

#[cfg(feature = "derive")]
pub use argtree_macros::Bind;

/// Register a struct's fields as options on a parser.
///
/// Usually derived with `#[derive(Bind)]`; each field is borrowed for the
/// parser's lifetime and written by the option's callback.
pub trait Bind<'a> {
    fn bind(&'a mut self, parser: &mut ArgParser<'a>);
}
