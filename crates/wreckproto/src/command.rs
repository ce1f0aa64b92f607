/// An economy/lifecycle command parsed from directive text.
///
/// The grammar is deliberately loose about what players actually type: a
/// leading `$` prefix is tolerated (some communities keep the bot-prefix
/// habit), verbs are case-insensitive, and ship names keep their original
/// casing for the catalog's case-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    Hangar,
    Balance,
    Buy { name: String },
    Select { name: String },
    Engage,
    Beg,
}

/// An in-battle action. Parsed separately because while a battle is live the
/// whole directive text belongs to that battle, not the command grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleAction {
    Attack,
    Defend,
    Flee,
}

impl BattleAction {
    pub fn parse(text: &str) -> Option<Self> {
        match strip_prefix(text).to_ascii_lowercase().as_str() {
            "attack" | "atk" => Some(BattleAction::Attack),
            "defend" | "def" => Some(BattleAction::Defend),
            "flee" | "run" => Some(BattleAction::Flee),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BattleAction::Attack => "attack",
            BattleAction::Defend => "defend",
            BattleAction::Flee => "flee",
        }
    }
}

fn strip_prefix(text: &str) -> &str {
    let t = text.trim();
    t.strip_prefix('$').unwrap_or(t).trim()
}

/// Parse one directive into a command. `None` means the text is not for us;
/// the core ignores it (help/usage rendering is the adapter's job).
pub fn parse_command(text: &str) -> Option<Command> {
    let t = strip_prefix(text);
    if t.is_empty() {
        return None;
    }

    let (verb, rest) = match t.split_once(char::is_whitespace) {
        Some((v, r)) => (v, r.trim()),
        None => (t, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "register" => Some(Command::Register),
        "hangar" | "ships" | "roster" => Some(Command::Hangar),
        "balance" | "credits" => Some(Command::Balance),
        "buy" if !rest.is_empty() => Some(Command::Buy {
            name: rest.to_string(),
        }),
        "select" if !rest.is_empty() => Some(Command::Select {
            name: rest.to_string(),
        }),
        "engage" | "challenge" => Some(Command::Engage),
        "beg" => Some(Command::Beg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_handles_prefix_case_and_padding() {
        assert_eq!(parse_command("register"), Some(Command::Register));
        assert_eq!(parse_command("$REGISTER"), Some(Command::Register));
        assert_eq!(parse_command("  $ engage  "), Some(Command::Engage));
        assert_eq!(parse_command("challenge"), Some(Command::Engage));
        assert_eq!(parse_command("ships"), Some(Command::Hangar));
        assert_eq!(parse_command("credits"), Some(Command::Balance));
        assert_eq!(parse_command("beg"), Some(Command::Beg));
    }

    #[test]
    fn parse_command_keeps_ship_name_casing() {
        assert_eq!(
            parse_command("buy Star Jumper"),
            Some(Command::Buy {
                name: "Star Jumper".to_string(),
            })
        );
        assert_eq!(
            parse_command("$select Titanic"),
            Some(Command::Select {
                name: "Titanic".to_string(),
            })
        );
    }

    #[test]
    fn parse_command_rejects_missing_args_and_noise() {
        assert_eq!(parse_command("buy"), None);
        assert_eq!(parse_command("buy   "), None);
        assert_eq!(parse_command("select"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("$"), None);
        assert_eq!(parse_command("hello everyone"), None);
    }

    #[test]
    fn battle_action_aliases() {
        assert_eq!(BattleAction::parse("attack"), Some(BattleAction::Attack));
        assert_eq!(BattleAction::parse(" ATK "), Some(BattleAction::Attack));
        assert_eq!(BattleAction::parse("$defend"), Some(BattleAction::Defend));
        assert_eq!(BattleAction::parse("def"), Some(BattleAction::Defend));
        assert_eq!(BattleAction::parse("run"), Some(BattleAction::Flee));
        assert_eq!(BattleAction::parse("dance"), None);
        assert_eq!(BattleAction::parse(""), None);
    }
}
