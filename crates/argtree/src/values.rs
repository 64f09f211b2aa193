//! Ready-made option constructors that store into caller-owned cells.
//!
//! Each function returns an [`Arg`] whose callback writes through the `&'a mut`
//! it was given. Register it, parse, then drop the parser to read the cell.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;

use crate::{Arg, Context, Nargs};

/// Rust types that know which option shape stores into them.
///
/// Used by `#[derive(Bind)]` to pick a constructor from a field's type.
pub trait Value<'a>: Sized {
    fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a>;

    fn positional(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        Self::option(name, cell).positional()
    }
}

impl<'a> Value<'a> for bool {
    fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        flag(name, cell)
    }
}

impl<'a> Value<'a> for String {
    fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        string(name, cell)
    }
}

impl<'a, T> Value<'a> for Option<T>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        optional(name, cell)
    }
}

impl<'a, T> Value<'a> for Vec<T>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        append(name, cell)
    }

    fn positional(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
        append_positional(name, cell)
    }
}

macro_rules! parsed_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'a> Value<'a> for $ty {
                fn option(name: impl Into<String>, cell: &'a mut Self) -> Arg<'a> {
                    parsed(name, cell)
                }
            }
        )*
    };
}

parsed_values!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, char, PathBuf,
);

/// Set `cell` to `true` when the option appears.
pub fn flag<'a>(name: impl Into<String>, cell: &'a mut bool) -> Arg<'a> {
    Arg::new(name, Nargs::FLAG, move |_, _| *cell = true)
}

/// Store the option's single argument; a later occurrence overwrites it.
pub fn string<'a>(name: impl Into<String>, cell: &'a mut String) -> Arg<'a> {
    Arg::new(name, 1, move |_, args| cell.clone_from(&args[0]))
}

pub fn optional<'a, T>(name: impl Into<String>, cell: &'a mut Option<T>) -> Arg<'a>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    Arg::new(name, 1, move |ctx, args| {
        if let Some(value) = convert(ctx, &args[0]) {
            *cell = Some(value);
        }
    })
}

/// Push one converted value per occurrence.
pub fn append<'a, T>(name: impl Into<String>, cell: &'a mut Vec<T>) -> Arg<'a>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    Arg::new(name, 1, move |ctx, args| {
        if let Some(value) = convert(ctx, &args[0]) {
            cell.push(value);
        }
    })
}

/// A trailing positional that collects every remaining bare token.
pub fn append_positional<'a, T>(name: impl Into<String>, cell: &'a mut Vec<T>) -> Arg<'a>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    Arg::new(name, Nargs::Repeated, move |ctx, args| {
        if let Some(value) = convert(ctx, &args[0]) {
            cell.push(value);
        }
    })
    .positional()
}

/// Store the argument converted with [`FromStr`]; a failed conversion aborts
/// the parse with an error naming the option and the raw token.
pub fn parsed<'a, T>(name: impl Into<String>, cell: &'a mut T) -> Arg<'a>
where
    T: FromStr + 'a,
    T::Err: Display,
{
    Arg::new(name, 1, move |ctx, args| {
        if let Some(value) = convert(ctx, &args[0]) {
            *cell = value;
        }
    })
}

/// A named option that swallows every token after it, dashes included.
///
/// Registered as `-`, this is the `--` passthrough.
pub fn rest<'a>(name: impl Into<String>, cell: &'a mut Vec<String>) -> Arg<'a> {
    Arg::new(name, Nargs::CaptureRest, move |_, args| {
        cell.extend_from_slice(args)
    })
    .metavar("ARGS")
}

/// A trailing positional that swallows everything from the first token it
/// matches, dashes included.
pub fn rest_positional<'a>(name: impl Into<String>, cell: &'a mut Vec<String>) -> Arg<'a> {
    Arg::new(name, Nargs::CaptureRest, move |_, args| {
        cell.extend_from_slice(args)
    })
    .positional()
}

/// A flag that runs `f` each time it appears.
pub fn func<'a, F>(name: impl Into<String>, mut f: F) -> Arg<'a>
where
    F: FnMut() + 'a,
{
    Arg::new(name, Nargs::FLAG, move |_, _| f())
}

fn convert<T>(ctx: &mut Context, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            let option = ctx.option().map(ToString::to_string).unwrap_or_default();
            ctx.abort_with_error(anyhow!("option {option} {raw:?} is invalid: {err}"));
            None
        }
    }
}
