//! Line command parsing
//!
//! Each line typed at the prompt becomes one [`Command`]. Values are parsed
//! but not range-checked here; out-of-range values are clamped by the mixer
//! state and the engine.

use std::path::PathBuf;
use std::str::FromStr;

use mixlogic_core::state::EqBand;
use mixlogic_core::DeckId;

/// A parsed line command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load { deck: DeckId, path: PathBuf },
    Unload(DeckId),
    Play(DeckId),
    Stop(DeckId),
    Volume { deck: DeckId, value: f32 },
    Eq { deck: DeckId, band: EqBand, value: f32 },
    Speed { deck: DeckId, value: f32 },
    /// Speed set from a pitch fader position (0-1)
    Pitch { deck: DeckId, position: f32 },
    Sync(DeckId),
    Crossfader(f32),
    Master(f32),
    Status,
    Explain,
    Devices,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  load a|b <path>             decode a file onto a deck
  unload a|b                  remove a deck's track
  play a|b / stop a|b         start or pause a deck
  vol a|b <0..1>              channel fader
  eq a|b low|mid|high <0..1>  EQ knob (0.5 = flat)
  speed a|b <0.92..1.08>      playback speed
  pitch a|b <0..1>            playback speed as a pitch fader position
  sync a|b                    copy the other deck's speed onto this deck
  xf <-1..1>                  crossfader (-1 = A, 1 = B)
  master <0..1>               master volume
  status                      show decks and signal flow
  explain                     describe the current mix
  devices                     list audio output devices
  quit";

fn deck_arg(word: Option<&str>) -> Result<DeckId, String> {
    let word = word.ok_or("missing deck (a or b)")?;
    DeckId::from_str(word).map_err(|_| format!("unknown deck '{}'", word))
}

fn value_arg(word: Option<&str>) -> Result<f32, String> {
    let word = word.ok_or("missing value")?;
    word.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{}' is not a number", word))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err("empty command".to_string());
        };

        let name = name.to_ascii_lowercase();
        let command = match name.as_str() {
            "load" => {
                let deck = deck_arg(words.next())?;
                // Paths may contain spaces; keep everything after the deck
                let path = words.by_ref().collect::<Vec<_>>().join(" ");
                if path.is_empty() {
                    return Err("missing file path".to_string());
                }
                Command::Load {
                    deck,
                    path: PathBuf::from(path),
                }
            }
            "unload" | "eject" => Command::Unload(deck_arg(words.next())?),
            "play" => Command::Play(deck_arg(words.next())?),
            "stop" | "pause" => Command::Stop(deck_arg(words.next())?),
            "vol" | "volume" => {
                let deck = deck_arg(words.next())?;
                Command::Volume {
                    deck,
                    value: value_arg(words.next())?,
                }
            }
            "eq" => {
                let deck = deck_arg(words.next())?;
                let band = words.next().ok_or("missing band (low, mid or high)")?;
                let band = EqBand::from_str(band)?;
                Command::Eq {
                    deck,
                    band,
                    value: value_arg(words.next())?,
                }
            }
            "speed" => {
                let deck = deck_arg(words.next())?;
                Command::Speed {
                    deck,
                    value: value_arg(words.next())?,
                }
            }
            "pitch" => {
                let deck = deck_arg(words.next())?;
                Command::Pitch {
                    deck,
                    position: value_arg(words.next())?,
                }
            }
            "sync" => Command::Sync(deck_arg(words.next())?),
            "xf" | "crossfader" => Command::Crossfader(value_arg(words.next())?),
            "master" => Command::Master(value_arg(words.next())?),
            "status" => Command::Status,
            "explain" => Command::Explain,
            "devices" => Command::Devices,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };

        if !matches!(command, Command::Load { .. }) && words.next().is_some() {
            return Err(format!("too many arguments for '{}'", name));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, String> {
        line.parse()
    }

    #[test]
    fn test_deck_commands() {
        assert_eq!(parse("play a"), Ok(Command::Play(DeckId::A)));
        assert_eq!(parse("STOP B"), Ok(Command::Stop(DeckId::B)));
        assert_eq!(parse("sync b"), Ok(Command::Sync(DeckId::B)));
        assert_eq!(
            parse("vol b 0.75"),
            Ok(Command::Volume {
                deck: DeckId::B,
                value: 0.75
            })
        );
        assert_eq!(
            parse("speed a 1.04"),
            Ok(Command::Speed {
                deck: DeckId::A,
                value: 1.04
            })
        );
    }

    #[test]
    fn test_eq_command() {
        assert_eq!(
            parse("eq a low 0"),
            Ok(Command::Eq {
                deck: DeckId::A,
                band: EqBand::Low,
                value: 0.0
            })
        );
        assert!(parse("eq a bass 0.5").is_err());
        assert!(parse("eq a high").is_err());
    }

    #[test]
    fn test_load_keeps_spaces_in_path() {
        assert_eq!(
            parse("load a /music/my track.mp3"),
            Ok(Command::Load {
                deck: DeckId::A,
                path: PathBuf::from("/music/my track.mp3")
            })
        );
        assert!(parse("load a").is_err());
        assert_eq!(parse("eject b"), Ok(Command::Unload(DeckId::B)));
        assert!(parse("unload a now").is_err());
    }

    #[test]
    fn test_pitch_command() {
        assert_eq!(
            parse("pitch b 0.25"),
            Ok(Command::Pitch {
                deck: DeckId::B,
                position: 0.25
            })
        );
        assert!(parse("pitch b").is_err());
    }

    #[test]
    fn test_mixer_commands() {
        assert_eq!(parse("xf -1"), Ok(Command::Crossfader(-1.0)));
        assert_eq!(parse("master 0.5"), Ok(Command::Master(0.5)));
        assert_eq!(parse("  status  "), Ok(Command::Status));
        assert_eq!(parse("devices"), Ok(Command::Devices));
        assert_eq!(parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse("").is_err());
        assert!(parse("dance").is_err());
        assert!(parse("play c").is_err());
        assert!(parse("play").is_err());
        assert!(parse("vol a loud").is_err());
        assert!(parse("vol a NaN").is_err());
        assert!(parse("xf 0 1").is_err());
    }
}
