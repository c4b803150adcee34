use thiserror::Error;

use crate::model::structures::participant::ParticipantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: !{command} {usage}")]
    Usage { command: String, usage: &'static str },

    #[error("unknown command: {0}")]
    Unknown(String)
}

/// A chat command with its arguments parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Teams,
    Balance,
    /// Force the suggested switch.
    Do,
    Agree,
    /// `None` removes the alias.
    SetAliasFor {
        target: ParticipantId,
        alias: Option<String>
    },
    SetAlias {
        alias: String
    },
    GetAlias {
        target: Option<ParticipantId>
    },
    SetRating {
        target: ParticipantId,
        rating: i32
    },
    GetRating {
        target: Option<ParticipantId>
    },
    AllRatings,
    RemoveRating {
        target: Option<ParticipantId>
    },
    RatingInfo
}

impl Command {
    /// Every name a command answers to.
    pub const NAMES: &'static [&'static str] = &[
        "teams",
        "teens",
        "balance",
        "do",
        "agree",
        "a",
        "setnickfor",
        "ranknick",
        "oldnick",
        "nick",
        "iam",
        "qlnick",
        "getnick",
        "shownick",
        "whoami",
        "set_rating",
        "setelo",
        "setrating",
        "getrating",
        "getelo",
        "elo",
        "allelo",
        "selo",
        "elos",
        "remrating",
        "remelo",
        "ratinginfo"
    ];

    /// Parses `args`, where the first element is the command name with or without a leading `!`.
    pub fn parse(args: &[&str]) -> Result<Command, CommandError> {
        let Some(name) = args.first() else {
            return Err(CommandError::Unknown(String::new()));
        };

        let name = name.trim_start_matches('!').to_lowercase();
        let usage = |usage: &'static str| CommandError::Usage {
            command: name.clone(),
            usage
        };

        let command = match name.as_str() {
            "teams" | "teens" => Command::Teams,
            "balance" => Command::Balance,
            "do" => Command::Do,
            "agree" | "a" => Command::Agree,
            "setnickfor" => {
                const USAGE: &str = "<id> <nick> or <id> to delete";
                if !(2..=3).contains(&args.len()) {
                    return Err(usage(USAGE));
                }
                let target = parse_id(args[1]).ok_or_else(|| usage(USAGE))?;
                Command::SetAliasFor {
                    target,
                    alias: args.get(2).map(|alias| alias.to_string())
                }
            }
            "ranknick" | "oldnick" | "nick" | "iam" => {
                if args.len() != 2 {
                    return Err(usage("<nick>"));
                }
                Command::SetAlias {
                    alias: args[1].to_string()
                }
            }
            "qlnick" | "getnick" | "shownick" | "whoami" => Command::GetAlias {
                target: optional_target(args).map_err(|_| usage("[<id>]"))?
            },
            "set_rating" | "setelo" | "setrating" => {
                const USAGE: &str = "<id> <rating>";
                if args.len() != 3 {
                    return Err(usage(USAGE));
                }
                let target = parse_id(args[1]).ok_or_else(|| usage(USAGE))?;
                let rating = args[2].parse().map_err(|_| usage(USAGE))?;
                Command::SetRating { target, rating }
            }
            "getrating" | "getelo" | "elo" => Command::GetRating {
                target: optional_target(args).map_err(|_| usage("[<id>]"))?
            },
            "allelo" | "selo" | "elos" => Command::AllRatings,
            "remrating" | "remelo" => Command::RemoveRating {
                target: optional_target(args).map_err(|_| usage("[<id>]"))?
            },
            "ratinginfo" => Command::RatingInfo,
            _ => return Err(CommandError::Unknown(name.clone()))
        };

        Ok(command)
    }
}

fn parse_id(value: &str) -> Option<ParticipantId> {
    value.parse().ok().map(ParticipantId)
}

/// Zero or one id argument after the command name.
fn optional_target(args: &[&str]) -> Result<Option<ParticipantId>, ()> {
    match args.len() {
        1 => Ok(None),
        2 => parse_id(args[1]).map(Some).ok_or(()),
        _ => Err(())
    }
}
