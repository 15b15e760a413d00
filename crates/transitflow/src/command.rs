#![forbid(unsafe_code)]

//! Line commands.
//!
//! Every line the user enters is one command: a keyword, then the rest of
//! the line as its argument. Keywords are case-insensitive; list positions
//! are 1-based on input and 0-based once parsed.

use thiserror::Error;

use transitflow_core::{EventType, InputError, TripEdit, WeatherCondition};

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Change one trip field.
    Edit(TripEdit),
    /// Run a prediction now.
    Calculate,
    /// Pick a route alternative (0-based).
    SelectRoute(usize),
    /// Restore a past search (0-based, newest first).
    SelectHistory(usize),
    ClearHistory,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}; type 'help' for the list")]
    Unknown(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("'{command}' expects {expected}, got {value:?}")]
    InvalidArgument {
        command: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error(transparent)]
    Value(#[from] InputError),
}

/// `(usage, description)` rows for the help screen.
pub const HELP: &[(&str, &str)] = &[
    ("from <place>|-", "set the origin, '-' clears it"),
    ("to <place>|-", "set the destination, '-' clears it"),
    ("route <id>|none", "choose a catalog route"),
    ("weather <condition>", "Sunny, Clear, Cloudy, Rainy, Foggy, Snowy"),
    ("event <type>", "None, Normal, Holiday, Peak Hours, Festival, ..."),
    ("hour <0-23>", "departure hour"),
    ("day <0-6|mon..sun>", "day of week, 0 = Monday"),
    ("temp <c>", "pin the temperature"),
    ("precip <mm>", "pin the precipitation"),
    ("crowd <people>", "pin the event attendance"),
    ("calc", "predict now"),
    ("alt <n>", "show route alternative n"),
    ("history <n>", "restore recent search n"),
    ("clear-history", "forget recent searches"),
    ("help", "toggle this list"),
    ("quit", "exit"),
];

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Parse one line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "from" | "origin" => Command::Edit(TripEdit::Origin(place("from", rest)?)),
        "to" | "dest" | "destination" => Command::Edit(TripEdit::Destination(place("to", rest)?)),
        "route" => {
            let id = text("route", rest)?;
            if matches!(id.to_ascii_lowercase().as_str(), "none" | "-") {
                Command::Edit(TripEdit::Route(None))
            } else {
                Command::Edit(TripEdit::Route(Some(id)))
            }
        }
        "weather" => Command::Edit(TripEdit::Weather(
            text("weather", rest)?.parse::<WeatherCondition>()?,
        )),
        "event" => Command::Edit(TripEdit::Event(
            text("event", rest)?.parse::<EventType>()?,
        )),
        "hour" => Command::Edit(TripEdit::Hour(number("hour", "an hour 0-23", rest)?)),
        "day" => Command::Edit(TripEdit::DayOfWeek(day(rest)?)),
        "temp" | "temperature" => Command::Edit(TripEdit::Temperature(number(
            "temp",
            "degrees Celsius",
            rest,
        )?)),
        "precip" | "precipitation" => Command::Edit(TripEdit::Precipitation(number(
            "precip",
            "millimetres",
            rest,
        )?)),
        "crowd" | "attendance" => Command::Edit(TripEdit::EventAttendance(number(
            "crowd",
            "a head count",
            rest,
        )?)),
        "calc" | "calculate" | "go" => Command::Calculate,
        "alt" | "select-route" => Command::SelectRoute(position("alt", rest)?),
        "history" => Command::SelectHistory(position("history", rest)?),
        "clear-history" => Command::ClearHistory,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

fn text(command: &'static str, rest: &str) -> Result<String, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            expected: "a value",
        });
    }
    Ok(rest.to_string())
}

/// Place name; a lone `-` clears the field.
fn place(command: &'static str, rest: &str) -> Result<String, CommandError> {
    let value = text(command, rest)?;
    if value == "-" {
        return Ok(String::new());
    }
    Ok(value)
}

fn number<T: std::str::FromStr>(
    command: &'static str,
    expected: &'static str,
    rest: &str,
) -> Result<T, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument { command, expected });
    }
    rest.parse().map_err(|_| CommandError::InvalidArgument {
        command,
        expected,
        value: rest.to_string(),
    })
}

/// 1-based list position to 0-based index.
fn position(command: &'static str, rest: &str) -> Result<usize, CommandError> {
    const EXPECTED: &str = "a position starting at 1";
    let n: usize = number(command, EXPECTED, rest)?;
    n.checked_sub(1).ok_or_else(|| CommandError::InvalidArgument {
        command,
        expected: EXPECTED,
        value: rest.to_string(),
    })
}

fn day(rest: &str) -> Result<u8, CommandError> {
    let lowered = rest.to_ascii_lowercase();
    if let Some(i) = DAY_NAMES
        .iter()
        .position(|name| lowered.len() >= 3 && lowered.starts_with(name))
    {
        return Ok(i as u8);
    }
    number("day", "0-6 or a weekday name", rest)
}
