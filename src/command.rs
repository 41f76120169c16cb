use crate::error::{Error, Result};

/// Where a `play`/`ls` argument points. `Member` is transient addressing
/// only; nothing composite is ever stored in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Entry(usize),
    Member(usize, usize),
}

/// One parsed input line, ready for an exhaustive dispatch match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Play(Address),
    Ls(Option<Address>),
    Add(Vec<String>),
    Remove(Vec<usize>),
    Volume(u16),
    Download { refs: Vec<String>, combine: bool },
    Exit,
}

/// Parsed command plus any flags the verb did not recognize. Unknown flags
/// are reported but never abort the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub command: Command,
    pub unknown_flags: Vec<String>,
}

const FLAG_COMBINE: &str = "--combine";

pub fn parse_line(line: &str) -> Result<ParsedLine> {
    let mut tokens = line.split_whitespace();
    let verb = tokens
        .next()
        .ok_or_else(|| Error::ParseFailure("empty command".to_string()))?;

    let (flags, args): (Vec<&str>, Vec<&str>) = tokens.partition(|t| t.starts_with("--"));
    let mut unknown_flags: Vec<String> = flags.iter().map(|f| f.to_string()).collect();

    let command = match verb {
        "help" => Command::Help,
        "exit" => Command::Exit,
        "play" => Command::Play(parse_address(one_arg(&args, "play")?)?),
        "ls" => match args.len() {
            0 => Command::Ls(None),
            1 => Command::Ls(Some(parse_address(args[0])?)),
            _ => {
                return Err(Error::ParseFailure(
                    "ls takes at most one track number".to_string(),
                ))
            }
        },
        "add" => {
            let refs = comma_list(&args);
            if refs.is_empty() {
                return Err(Error::ParseFailure("provide a URL after add".to_string()));
            }
            Command::Add(refs)
        }
        "remove" => {
            let ordinals = comma_list(&args)
                .iter()
                .map(|s| parse_positive(s))
                .collect::<Result<Vec<usize>>>()?;
            if ordinals.is_empty() {
                return Err(Error::ParseFailure(
                    "provide a track number after remove".to_string(),
                ));
            }
            Command::Remove(ordinals)
        }
        "volume" => {
            let arg = one_arg(&args, "volume")?;
            let volume = arg
                .parse::<u16>()
                .map_err(|_| Error::ParseFailure(format!("not a volume: {}", arg)))?;
            Command::Volume(volume)
        }
        "download" => {
            let combine = unknown_flags.iter().any(|f| f == FLAG_COMBINE);
            unknown_flags.retain(|f| f != FLAG_COMBINE);
            let refs = comma_list(&args);
            if refs.is_empty() {
                return Err(Error::ParseFailure(
                    "provide a URL after download".to_string(),
                ));
            }
            Command::Download { refs, combine }
        }
        other => {
            return Err(Error::ParseFailure(format!(
                "unrecognized command: {}",
                other
            )))
        }
    };

    Ok(ParsedLine {
        command,
        unknown_flags,
    })
}

/// `N` addresses catalog ordinal N; `N.M` addresses member M of the
/// collection at ordinal N. Both parts 1-based and positive.
pub fn parse_address(token: &str) -> Result<Address> {
    match token.split_once('.') {
        Some((parent, child)) => Ok(Address::Member(
            parse_positive(parent)?,
            parse_positive(child)?,
        )),
        None => Ok(Address::Entry(parse_positive(token)?)),
    }
}

fn parse_positive(token: &str) -> Result<usize> {
    token
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| Error::ParseFailure(format!("not a track number: {}", token)))
}

fn one_arg<'a>(args: &[&'a str], verb: &str) -> Result<&'a str> {
    match args {
        [only] => Ok(*only),
        [] => Err(Error::ParseFailure(format!(
            "provide an argument after {}",
            verb
        ))),
        _ => Err(Error::ParseFailure(format!(
            "{} takes a single argument",
            verb
        ))),
    }
}

/// Arguments may be comma-separated within one token or spread over
/// several; empty segments drop out.
fn comma_list(args: &[&str]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ParsedLine {
        parse_line(line).unwrap()
    }

    #[test]
    fn test_bare_verbs() {
        assert_eq!(parse("help").command, Command::Help);
        assert_eq!(parse("exit").command, Command::Exit);
        assert_eq!(parse("ls").command, Command::Ls(None));
    }

    #[test]
    fn test_play_addresses() {
        assert_eq!(parse("play 3").command, Command::Play(Address::Entry(3)));
        assert_eq!(
            parse("play 2.3").command,
            Command::Play(Address::Member(2, 3))
        );
    }

    #[test]
    fn test_malformed_addresses_fail() {
        assert!(parse_line("play").is_err());
        assert!(parse_line("play x").is_err());
        assert!(parse_line("play 0").is_err());
        assert!(parse_line("play 2.").is_err());
        assert!(parse_line("play .3").is_err());
        assert!(parse_line("play 2.0").is_err());
        assert!(parse_line("play 1 2").is_err());
    }

    #[test]
    fn test_ls_with_address() {
        assert_eq!(
            parse("ls 4").command,
            Command::Ls(Some(Address::Entry(4)))
        );
        assert_eq!(
            parse("ls 4.1").command,
            Command::Ls(Some(Address::Member(4, 1)))
        );
        assert!(parse_line("ls 1 2").is_err());
    }

    #[test]
    fn test_add_splits_comma_lists() {
        assert_eq!(
            parse("add https://a,https://b").command,
            Command::Add(vec!["https://a".to_string(), "https://b".to_string()])
        );
        assert_eq!(
            parse("add https://a, https://b").command,
            Command::Add(vec!["https://a".to_string(), "https://b".to_string()])
        );
        assert!(parse_line("add").is_err());
    }

    #[test]
    fn test_remove_parses_ordinals() {
        assert_eq!(
            parse("remove 3,1").command,
            Command::Remove(vec![3, 1])
        );
        assert!(parse_line("remove").is_err());
        assert!(parse_line("remove zero").is_err());
        assert!(parse_line("remove 0").is_err());
    }

    #[test]
    fn test_volume() {
        assert_eq!(parse("volume 150").command, Command::Volume(150));
        assert!(parse_line("volume").is_err());
        assert!(parse_line("volume loud").is_err());
        assert!(parse_line("volume -5").is_err());
    }

    #[test]
    fn test_download_combine_flag() {
        assert_eq!(
            parse("download https://a --combine").command,
            Command::Download {
                refs: vec!["https://a".to_string()],
                combine: true
            }
        );
        // Flag position does not matter
        assert_eq!(
            parse("download --combine https://a,https://b").command,
            Command::Download {
                refs: vec!["https://a".to_string(), "https://b".to_string()],
                combine: true
            }
        );
        assert!(parse_line("download --combine").is_err());
    }

    #[test]
    fn test_unknown_flags_reported_not_fatal() {
        let parsed = parse("download https://a --turbo --combine");
        assert_eq!(parsed.unknown_flags, vec!["--turbo".to_string()]);
        assert_eq!(
            parsed.command,
            Command::Download {
                refs: vec!["https://a".to_string()],
                combine: true
            }
        );

        let parsed = parse("ls --long");
        assert_eq!(parsed.unknown_flags, vec!["--long".to_string()]);
        assert_eq!(parsed.command, Command::Ls(None));
    }

    #[test]
    fn test_unrecognized_verb_fails() {
        assert!(matches!(
            parse_line("dance"),
            Err(Error::ParseFailure(_))
        ));
    }
}
