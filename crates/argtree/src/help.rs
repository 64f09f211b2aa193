//! Plain-text usage and help rendering from a [`CommandSchema`].

use crate::Nargs;
use crate::schema::{ArgSchema, CommandSchema};

/// Column at which usage and help lines wrap.
pub const BREAK_LINE_THRESHOLD: usize = 80;

const HELP_ROW: (&str, &str) = ("-h, --help", "Show help information");

/// Render the usage line, wrapped so continuation lines align with the
/// first item.
pub fn usage(schema: &CommandSchema, prog: &str) -> String {
    let mut items: Vec<String> = Vec::new();
    if schema.help {
        items.push("[-h]".to_string());
    }
    let (positionals, named): (Vec<&ArgSchema>, Vec<&ArgSchema>) =
        schema.args.iter().partition(|arg| arg.positional);
    items.extend(named.into_iter().map(usage_item));
    items.extend(positionals.into_iter().map(usage_item));
    if !schema.subcommands.is_empty() {
        items.push("[<command>]".to_string());
    }

    let head = if prog.is_empty() {
        "usage:".to_string()
    } else {
        format!("usage: {prog}")
    };
    let indent = head.chars().count() + 1;
    fill(&head, indent, items.iter().map(String::as_str))
}

/// Render the full help text.
pub fn help(schema: &CommandSchema, prog: &str) -> String {
    let mut out = usage(schema, prog);

    for paragraph in schema.description.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&fill("", 0, paragraph.split_whitespace()));
    }

    let mut arguments = Vec::new();
    let mut options = Vec::new();
    if schema.help {
        options.push((HELP_ROW.0.to_string(), HELP_ROW.1.to_string()));
    }
    for arg in &schema.args {
        if arg.positional {
            arguments.push((positional_left(arg), arg.help.trim().to_string()));
        } else {
            options.push((option_left(arg), option_help(arg)));
        }
    }
    let commands: Vec<(String, String)> = schema
        .subcommands
        .iter()
        .map(|sub| {
            let summary = sub.description.lines().next().unwrap_or_default();
            (sub.name.clone(), summary.trim().to_string())
        })
        .collect();

    section(&mut out, "Arguments:", &arguments);
    section(&mut out, "Options:", &options);
    section(&mut out, "Commands:", &commands);
    out
}

fn usage_item(arg: &ArgSchema) -> String {
    let item = if arg.positional {
        positional_left(arg)
    } else {
        format!("{}{}", arg.display_name(), value_names(arg))
    };
    if arg.required {
        item
    } else {
        format!("[{item}]")
    }
}

fn positional_left(arg: &ArgSchema) -> String {
    if arg.nargs.is_variadic() {
        format!("{}...", arg.name)
    } else {
        arg.name.clone()
    }
}

/// ` NAME` once per argument, ` NAME...` for capture-rest, nothing for flags.
fn value_names(arg: &ArgSchema) -> String {
    let name = arg.value_name();
    match arg.nargs {
        Nargs::Exact(n) => format!(" {name}").repeat(n),
        Nargs::Repeated | Nargs::CaptureRest => format!(" {name}..."),
    }
}

fn option_left(arg: &ArgSchema) -> String {
    let display = |name: &str| {
        let mut out = String::new();
        let _ = crate::arg::display_name(name, false, &mut out);
        out
    };
    let (short, long): (Vec<&str>, Vec<&str>) = std::iter::once(arg.name.as_str())
        .chain(arg.aliases.iter().map(String::as_str))
        .partition(|name| name.chars().count() == 1);
    let names: Vec<String> = short.into_iter().chain(long).map(display).collect();
    format!("{}{}", names.join(", "), value_names(arg))
}

fn option_help(arg: &ArgSchema) -> String {
    let mut out = arg.help.trim().to_string();
    if arg.required {
        if out.is_empty() {
            out.push_str("required");
        } else {
            out.push_str(" (required)");
        }
    }
    out
}

fn section(out: &mut String, title: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(title);
    out.push('\n');

    let width = rows
        .iter()
        .map(|(left, _)| left.chars().count())
        .max()
        .unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            let head = format!("  {left:width$}  ");
            out.push_str(&fill(&head, width + 4, help.split_whitespace()));
        }
    }
}

/// Append `words` to `head` separated by spaces, starting a new line indented
/// by `indent` columns whenever the next word would pass the threshold.
/// A word never wraps onto a line of its own when it is the first one.
fn fill<'s>(head: &str, indent: usize, words: impl IntoIterator<Item = &'s str>) -> String {
    let mut out = String::new();
    let mut line = head.to_string();
    let mut has_words = false;

    for word in words {
        let sep = usize::from(!line.is_empty() && !line.ends_with(' '));
        let len = line.chars().count() + sep + word.chars().count();
        if has_words && len > BREAK_LINE_THRESHOLD {
            out.push_str(line.trim_end());
            out.push('\n');
            line = " ".repeat(indent);
        } else if sep == 1 {
            line.push(' ');
        }
        line.push_str(word);
        has_words = true;
    }

    out.push_str(line.trim_end());
    out.push('\n');
    out
}
