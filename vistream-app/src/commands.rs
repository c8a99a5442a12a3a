//! Parsing of the interactive command line.

use thiserror::Error;
use vistream_core::{CarouselInput, MediaEvent, NavKey};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("Unknown media event '{0}'")]
    UnknownMediaEvent(String),

    #[error("Unknown key '{0}'")]
    UnknownKey(String),
}

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Navigate through the loading-bar decorator
    Go { target: String, replace: bool },
    Back,
    Start,
    Progress(f64),
    Finish,
    /// Navigate to the watch page and load the video
    Watch(String),
    Media(MediaEvent),
    Retry,
    Volume(f64),
    Mute,
    Carousel(CarouselInput),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  go <path> [replace]          navigate with the loading bar
  back                         go back one history entry
  start | progress <n> | finish  drive the loading bar by hand
  watch <file>                 open the watch page and load a video
  media <event> [args]         loadstart, metadata, loadeddata, canplay,
                               playing, waiting, progress <end> <duration>,
                               error [code] [message]
  retry                        retry after a playback error
  volume <0..1> | mute         volume controls
  key <name>                   ArrowDown, PageDown, ArrowUp, PageUp, Home, Escape
  wheel <dy> <scroll_y> <height>  wheel input on the carousel
  slide <1..> | trailer <open|close>  carousel controls
  status | help | quit";

impl Command {
    /// Parse a trimmed input line. Returns `Ok(None)` for a blank line.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is unknown or its arguments are invalid.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name {
            "go" => Self::Go {
                target: required(&args, 0, "go", "a path")?.to_string(),
                replace: args.get(1).is_some_and(|flag| *flag == "replace"),
            },
            "back" => Self::Back,
            "start" => Self::Start,
            "progress" => Self::Progress(number(required(&args, 0, "progress", "a value")?)?),
            "finish" => Self::Finish,
            "watch" => {
                let file = args.join(" ");
                if file.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "watch",
                        argument: "a file name",
                    });
                }
                Self::Watch(file)
            }
            "media" => Self::Media(parse_media(&args)?),
            "retry" => Self::Retry,
            "volume" => Self::Volume(number(required(&args, 0, "volume", "a level")?)?),
            "mute" => Self::Mute,
            "key" => {
                let key = required(&args, 0, "key", "a key name")?;
                let key = NavKey::from_key_name(key)
                    .ok_or_else(|| CommandError::UnknownKey(key.to_string()))?;
                Self::Carousel(CarouselInput::Key(key))
            }
            "wheel" => Self::Carousel(CarouselInput::Wheel {
                delta_y: number(required(&args, 0, "wheel", "a delta")?)?,
                scroll_y: number(required(&args, 1, "wheel", "a scroll position")?)?,
                carousel_height: number(required(&args, 2, "wheel", "a carousel height")?)?,
            }),
            "slide" => {
                let raw = required(&args, 0, "slide", "a slide number")?;
                let number: usize = raw
                    .parse()
                    .map_err(|_| CommandError::InvalidNumber(raw.to_string()))?;
                // Slides are numbered from 1, as `status` prints them
                let index = number
                    .checked_sub(1)
                    .ok_or_else(|| CommandError::InvalidNumber(raw.to_string()))?;
                Self::Carousel(CarouselInput::SelectSlide(index))
            }
            "trailer" => match args.first().copied() {
                Some("open") => Self::Carousel(CarouselInput::OpenTrailer),
                Some("close") => Self::Carousel(CarouselInput::CloseTrailer),
                _ => {
                    return Err(CommandError::MissingArgument {
                        command: "trailer",
                        argument: "'open' or 'close'",
                    })
                }
            },
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn required<'a>(
    args: &[&'a str],
    index: usize,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .ok_or(CommandError::MissingArgument { command, argument })
}

fn number(raw: &str) -> Result<f64, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

fn parse_media(args: &[&str]) -> Result<MediaEvent, CommandError> {
    let name = required(args, 0, "media", "an event name")?;
    let event = match name {
        "loadstart" => MediaEvent::LoadStart,
        "metadata" | "loadedmetadata" => MediaEvent::LoadedMetadata,
        "loadeddata" => MediaEvent::LoadedData,
        "canplay" => MediaEvent::CanPlay,
        "playing" => MediaEvent::Playing,
        "waiting" => MediaEvent::Waiting,
        "progress" => MediaEvent::Progress {
            buffered_end: number(required(args, 1, "media progress", "a buffered end")?)?,
            duration: number(required(args, 2, "media progress", "a duration")?)?,
        },
        "error" => {
            let error_code = match args.get(1) {
                Some(raw) => Some(
                    raw.parse()
                        .map_err(|_| CommandError::InvalidNumber((*raw).to_string()))?,
                ),
                None => None,
            };
            let message = args
                .get(2..)
                .filter(|rest| !rest.is_empty())
                .map(|rest| rest.join(" "));
            MediaEvent::Error {
                code: error_code,
                message,
            }
        }
        other => return Err(CommandError::UnknownMediaEvent(other.to_string())),
    };
    Ok(event)
}
