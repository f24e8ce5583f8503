#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BotCommand {
    Start,
    Stop,
    Login,
    Logout,
    Watchlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TelegramCommandSpec {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommandDef {
    command: BotCommand,
    pattern: &'static str,
    telegram_spec: TelegramCommandSpec,
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        command: BotCommand::Start,
        pattern: "/start",
        telegram_spec: TelegramCommandSpec {
            command: "start",
            description: "Subscribe to dividend alerts",
        },
    },
    CommandDef {
        command: BotCommand::Stop,
        pattern: "/stop",
        telegram_spec: TelegramCommandSpec {
            command: "stop",
            description: "Unsubscribe from alerts",
        },
    },
    CommandDef {
        command: BotCommand::Login,
        pattern: "/login",
        telegram_spec: TelegramCommandSpec {
            command: "login",
            description: "Link your dashboard account with a YubiKey OTP",
        },
    },
    CommandDef {
        command: BotCommand::Logout,
        pattern: "/logout",
        telegram_spec: TelegramCommandSpec {
            command: "logout",
            description: "Unlink your dashboard account",
        },
    },
    CommandDef {
        command: BotCommand::Watchlist,
        pattern: "/watchlist",
        telegram_spec: TelegramCommandSpec {
            command: "watchlist",
            description: "Show dividend data for your tracked symbols",
        },
    },
];

pub(crate) fn telegram_command_specs() -> Vec<TelegramCommandSpec> {
    COMMAND_DEFS.iter().map(|def| def.telegram_spec).collect()
}

/// Parses `text` into a command and its whitespace-separated arguments.
///
/// The command word may carry a `@botname` suffix (group-chat addressing).
/// Non-command text yields `None` and is ignored by the caller.
pub(crate) fn parse_command(text: &str) -> Option<(BotCommand, Vec<&str>)> {
    let mut parts = text.trim().split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head);

    let command = COMMAND_DEFS
        .iter()
        .find(|def| def.pattern == name)?
        .command;
    Some((command, parts.collect()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{BotCommand, parse_command, telegram_command_specs};

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_command("/start"), Some((BotCommand::Start, vec![])));
        assert_eq!(parse_command(" /stop "), Some((BotCommand::Stop, vec![])));
        assert_eq!(
            parse_command("/watchlist"),
            Some((BotCommand::Watchlist, vec![]))
        );
    }

    #[test]
    fn parses_commands_with_bot_mention() {
        assert_eq!(
            parse_command("/start@divvy_bot"),
            Some((BotCommand::Start, vec![]))
        );
        assert_eq!(
            parse_command("/login@divvy_bot ccccccfhcbde"),
            Some((BotCommand::Login, vec!["ccccccfhcbde"]))
        );
    }

    #[test]
    fn splits_arguments_on_whitespace() {
        assert_eq!(
            parse_command("/login  abc   def"),
            Some((BotCommand::Login, vec!["abc", "def"]))
        );
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("/unknown"), None);
        // Prefixes of known commands are not commands.
        assert_eq!(parse_command("/star"), None);
    }

    #[test]
    fn telegram_command_specs_are_unique_and_non_empty() {
        let specs = telegram_command_specs();
        assert!(!specs.is_empty());

        let mut names = HashSet::new();
        for spec in specs {
            assert!(!spec.command.trim().is_empty());
            assert!(!spec.description.trim().is_empty());
            assert!(names.insert(spec.command));
        }
    }
}
