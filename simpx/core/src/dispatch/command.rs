//! Command registrations and command-line resolution

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::binding::{BoundArgs, Param};
use super::handler::CommandHandler;
use super::DispatchError;

/// Name of the value holding everything after the command name
pub const ARGS: &str = "args";

#[derive(Clone, Debug)]
enum Matcher {
    Exact,
    Pattern(String),
}

/// A command to register with the dispatcher
///
/// ```no_run
/// use simpx_core::dispatch::{BoundArgs, Command, Param};
///
/// let square = Command::exact("square", |args: BoundArgs| async move {
///     let n: i64 = args.get("args").unwrap_or("0").trim().parse()?;
///     if let (Some(bot), Some(chat)) = (args.bot(), args.chat_info()) {
///         bot.reply(chat, (n * n).to_string()).await?;
///     }
///     anyhow::Ok(())
/// })
/// .param(Param::Bot)
/// .param(Param::ChatInfo)
/// .param(Param::named_or("args", ""))
/// .help("Calculates the square of a number");
/// # let _ = square;
/// ```
pub struct Command {
    name: String,
    matcher: Matcher,
    help: Option<String>,
    params: Vec<Param>,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// Command matched by its name, case-insensitively
    ///
    /// The handler can declare `args` to receive the rest of the line.
    pub fn exact(name: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.into().to_lowercase(),
            matcher: Matcher::Exact,
            help: None,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Command matched by a regular expression anchored at the start of the
    /// line; named capture groups become named values
    ///
    /// `name` is only used for help and logging.
    pub fn pattern(
        name: impl Into<String>,
        pattern: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: Matcher::Pattern(pattern.into()),
            help: None,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Help text; the first sentence shows in the command list
    #[must_use]
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Declare one input
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Declare several inputs
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    /// Command name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// How a command line was resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// By command name
    Exact,
    /// By pattern
    Pattern,
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub name: String,
    pub params: Vec<Param>,
    pub handler: Arc<dyn CommandHandler>,
}

/// A resolved command line
pub(crate) struct Resolved<'r> {
    pub registration: &'r Registration,
    pub kind: MatchKind,
    pub values: BTreeMap<String, String>,
}

/// Immutable command table
#[derive(Default)]
pub(crate) struct CommandRegistry {
    exact: HashMap<String, Registration>,
    patterns: Vec<(Regex, Registration)>,
    help: BTreeMap<String, String>,
}

impl CommandRegistry {
    pub fn register(&mut self, command: Command) -> Result<(), DispatchError> {
        let Command {
            name,
            matcher,
            help,
            params,
            handler,
        } = command;

        if let Some(text) = help {
            self.help.insert(name.clone(), text);
        }
        let registration = Registration {
            name: name.clone(),
            params,
            handler,
        };
        match matcher {
            Matcher::Exact => {
                self.exact.insert(name, registration);
            }
            Matcher::Pattern(pattern) => {
                let regex = Regex::new(&format!("^(?:{pattern})"))
                    .map_err(|source| DispatchError::InvalidPattern { pattern, source })?;
                self.patterns.push((regex, registration));
            }
        }
        Ok(())
    }

    pub fn has_exact(&self, name: &str) -> bool {
        self.exact.contains_key(name)
    }

    pub fn help_texts(&self) -> &BTreeMap<String, String> {
        &self.help
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    /// Resolve the text after the prefix
    ///
    /// The exact table is consulted first; then patterns in registration
    /// order against the whole text.
    pub fn resolve(&self, text: &str) -> Option<Resolved<'_>> {
        let (name, rest) = split_command(text);
        if name.is_empty() {
            return None;
        }

        if let Some(registration) = self.exact.get(&name) {
            let mut values = BTreeMap::new();
            values.insert(ARGS.to_owned(), rest.to_owned());
            return Some(Resolved {
                registration,
                kind: MatchKind::Exact,
                values,
            });
        }

        let text = text.trim_start();
        self.patterns.iter().find_map(|(regex, registration)| {
            let caps = regex.captures(text)?;
            let values = regex
                .capture_names()
                .flatten()
                .filter_map(|group| Some((group.to_owned(), caps.name(group)?.as_str().to_owned())))
                .collect();
            Some(Resolved {
                registration,
                kind: MatchKind::Pattern,
                values,
            })
        })
    }
}

/// Split a command line into its lowercased name and the remainder
fn split_command(text: &str) -> (String, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim_start()),
        None => (text.to_lowercase(), ""),
    }
}

/// First sentence of a help text, with its full stop
fn summary(help: &str) -> String {
    let first = help.split('.').next().unwrap_or_default();
    format!("{first}.")
}

/// Built-in `help` command
pub(crate) struct HelpCommand {
    pub texts: BTreeMap<String, String>,
}

pub(crate) const HELP_TEXT: &str = "Shows this help message";

impl HelpCommand {
    /// Reply text for `help` followed by `args`
    pub fn render(&self, prefix: &str, args: &str) -> String {
        let wanted = args.trim();
        if !wanted.is_empty() {
            return match self.texts.get(wanted) {
                Some(help) => format!("**{prefix}{wanted}**\n{help}"),
                None => format!("No help available for command `{wanted}`"),
            };
        }
        if self.texts.is_empty() {
            return "No commands available.".to_owned();
        }
        let lines: Vec<String> = self
            .texts
            .iter()
            .map(|(name, help)| format!("**{prefix}{name}** - {}", summary(help)))
            .collect();
        format!("Available commands:\n{}", lines.join("\n"))
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn call(&self, args: BoundArgs) -> anyhow::Result<()> {
        let bot = args
            .bot()
            .ok_or_else(|| anyhow::anyhow!("help command needs the bot handle"))?;
        let chat_info = args
            .chat_info()
            .ok_or_else(|| anyhow::anyhow!("help command needs the chat"))?;
        let text = self.render(bot.prefix(), args.get(ARGS).unwrap_or_default());
        bot.reply(chat_info, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn noop(_: BoundArgs) -> anyhow::Result<()> {
        Ok(())
    }

    fn registry(commands: Vec<Command>) -> CommandRegistry {
        let mut registry = CommandRegistry::default();
        for command in commands {
            registry.register(command).unwrap();
        }
        registry
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("Echo  hello world"), ("echo".to_owned(), "hello world"));
        assert_eq!(split_command("  ping"), ("ping".to_owned(), ""));
        assert_eq!(split_command(""), (String::new(), ""));
    }

    #[test]
    fn test_exact_before_pattern() {
        let registry = registry(vec![
            Command::pattern("add", r"add (?P<a>\d+) (?P<b>\d+)", noop),
            Command::exact("add", noop),
        ]);
        let resolved = registry.resolve("add 2 3").unwrap();
        assert_eq!(resolved.kind, MatchKind::Exact);
        assert_eq!(resolved.values.get(ARGS).map(String::as_str), Some("2 3"));
    }

    #[test]
    fn test_pattern_binds_named_groups() {
        let registry = registry(vec![Command::pattern("add", r"add (?P<a>\d+) (?P<b>\d+)", noop)]);

        let resolved = registry.resolve("add 2 3").unwrap();
        assert_eq!(resolved.kind, MatchKind::Pattern);
        assert_eq!(resolved.registration.name, "add");
        assert_eq!(resolved.values.get("a").map(String::as_str), Some("2"));
        assert_eq!(resolved.values.get("b").map(String::as_str), Some("3"));

        assert!(registry.resolve("add foo bar").is_none());
        // Anchored at the start of the line
        assert!(registry.resolve("please add 2 3").is_none());
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let registry = registry(vec![
            Command::pattern("digits", r"(?P<n>\d+)", noop),
            Command::pattern("anything", r"(?P<s>.+)", noop),
        ]);
        assert_eq!(registry.resolve("42").unwrap().registration.name, "digits");
        assert_eq!(registry.resolve("hi").unwrap().registration.name, "anything");
    }

    #[test]
    fn test_exact_is_case_insensitive() {
        let registry = registry(vec![Command::exact("Echo", noop)]);
        assert!(registry.has_exact("echo"));
        assert_eq!(registry.resolve("ECHO hi").unwrap().kind, MatchKind::Exact);
    }

    #[test]
    fn test_unmatched_optional_group_is_absent() {
        let registry = registry(vec![Command::pattern("greet", r"greet(?: (?P<who>\w+))?", noop)]);
        let resolved = registry.resolve("greet").unwrap();
        assert!(resolved.values.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let mut registry = CommandRegistry::default();
        let err = registry
            .register(Command::pattern("bad", "(unclosed", noop))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_help_rendering() {
        let registry = registry(vec![
            Command::exact("square", noop).help("Calculates the square of a number. Integers only"),
            Command::exact("echo", noop).help("Echoes the text back"),
        ]);
        let help = HelpCommand {
            texts: registry.help_texts().clone(),
        };

        assert_eq!(
            help.render("!", ""),
            "Available commands:\n**!echo** - Echoes the text back.\n**!square** - Calculates the square of a number."
        );
        assert_eq!(
            help.render("!", " square "),
            "**!square**\nCalculates the square of a number. Integers only"
        );
        assert_eq!(help.render("!", "nope"), "No help available for command `nope`");

        let empty = HelpCommand {
            texts: BTreeMap::new(),
        };
        assert_eq!(empty.render("!", ""), "No commands available.");
    }
}
