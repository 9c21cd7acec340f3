//! Parses typed commands into requests for the server.

use chess_shared::{Packet, SessionId, Square, SquareError};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  list                 show games waiting for an opponent
  create               open a new game and play white
  join <id>            join a waiting game as black
  move <from> <to>     e.g. `move e2 e4` (or just `e2 e4`)
  moves <square>       list destinations for your piece on a square
  board                redraw the board
  name <name>          change the name sent with create/join
  help                 show this text
  quit                 leave the server";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command `{0}`, type `help` for a list")]
    UnknownCommand(String),
    #[error("`{0}` needs {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("`{0}` is not a game id")]
    BadSessionId(String),
    #[error(transparent)]
    BadSquare(#[from] SquareError),
}

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Create,
    Join(SessionId),
    Move(Square, Square),
    Moves(Square),
    Board,
    Name(String),
    Help,
    Quit,
}

/// What the client loop should do after a line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Packet),
    ShowBoard,
    ShowHelp,
    Renamed(String),
    Quit,
    Nothing,
}

pub fn parse_command(line: &str) -> Result<Option<Command>, InputError> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };

    let command = match first.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "create" | "new" => Command::Create,
        "join" => {
            let id = words
                .next()
                .ok_or(InputError::MissingArgument("join", "a game id"))?;
            let id = id
                .parse()
                .map_err(|_| InputError::BadSessionId(id.to_string()))?;
            Command::Join(id)
        }
        "move" | "mv" => {
            let from = words
                .next()
                .ok_or(InputError::MissingArgument("move", "two squares"))?;
            let to = words
                .next()
                .ok_or(InputError::MissingArgument("move", "two squares"))?;
            Command::Move(from.parse()?, to.parse()?)
        }
        "moves" => {
            let square = words
                .next()
                .ok_or(InputError::MissingArgument("moves", "a square"))?;
            Command::Moves(square.parse()?)
        }
        "board" => Command::Board,
        "name" => {
            let rest: Vec<&str> = words.collect();
            if rest.is_empty() {
                return Err(InputError::MissingArgument("name", "a name"));
            }
            Command::Name(rest.join(" "))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => match (other.parse::<Square>(), words.next()) {
            // Bare `e2 e4` is shorthand for a move.
            (Ok(from), Some(to)) => Command::Move(from, to.parse()?),
            _ => return Err(InputError::UnknownCommand(other.to_string())),
        },
    };
    Ok(Some(command))
}

/// Turns commands into actions, filling in the player's name where the
/// protocol wants it.
pub struct InputManager {
    name: String,
}

impl InputManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle_line(&mut self, line: &str) -> Result<Action, InputError> {
        let Some(command) = parse_command(line)? else {
            return Ok(Action::Nothing);
        };
        Ok(match command {
            Command::List => Action::Send(Packet::ListGames),
            Command::Create => Action::Send(Packet::CreateGame {
                name: self.name.clone(),
            }),
            Command::Join(session_id) => Action::Send(Packet::JoinGame {
                session_id,
                name: self.name.clone(),
            }),
            Command::Move(from, to) => Action::Send(Packet::MoveRequest { from, to }),
            Command::Moves(square) => Action::Send(Packet::LegalMovesRequest { square }),
            Command::Board => Action::ShowBoard,
            Command::Name(name) => {
                self.name = name.clone();
                Action::Renamed(name)
            }
            Command::Help => Action::ShowHelp,
            Command::Quit => Action::Quit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("list").unwrap(), Some(Command::List));
        assert_eq!(parse_command("  JOIN 12 ").unwrap(), Some(Command::Join(12)));
        assert_eq!(
            parse_command("move e2 e4").unwrap(),
            Some(Command::Move(sq("e2"), sq("e4")))
        );
        assert_eq!(
            parse_command("g1 f3").unwrap(),
            Some(Command::Move(sq("g1"), sq("f3")))
        );
        assert_eq!(parse_command("moves b1").unwrap(), Some(Command::Moves(sq("b1"))));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_command("join"),
            Err(InputError::MissingArgument("join", "a game id"))
        );
        assert_eq!(
            parse_command("join abc"),
            Err(InputError::BadSessionId("abc".to_string()))
        );
        assert!(matches!(
            parse_command("move e2 e9"),
            Err(InputError::BadSquare(_))
        ));
        assert_eq!(
            parse_command("dance"),
            Err(InputError::UnknownCommand("dance".to_string()))
        );
    }

    #[test]
    fn test_name_used_for_create_and_join() {
        let mut input = InputManager::new("Alice");
        assert_eq!(
            input.handle_line("create").unwrap(),
            Action::Send(Packet::CreateGame {
                name: "Alice".to_string()
            })
        );
        assert_eq!(
            input.handle_line("name Alice Smith").unwrap(),
            Action::Renamed("Alice Smith".to_string())
        );
        assert_eq!(
            input.handle_line("join 4").unwrap(),
            Action::Send(Packet::JoinGame {
                session_id: 4,
                name: "Alice Smith".to_string()
            })
        );
    }

    #[test]
    fn test_local_actions() {
        let mut input = InputManager::new("Bob");
        assert_eq!(input.handle_line("board").unwrap(), Action::ShowBoard);
        assert_eq!(input.handle_line("help").unwrap(), Action::ShowHelp);
        assert_eq!(input.handle_line("quit").unwrap(), Action::Quit);
        assert_eq!(input.handle_line("").unwrap(), Action::Nothing);
    }
}
