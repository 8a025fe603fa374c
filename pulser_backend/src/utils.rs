//! Channel naming helpers shared by the host surface and the dump format.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::channel::ChannelId;
use crate::config::CHANNELS_PER_CARD;
use crate::error::{PulserError, Result};

static TRIGGER_OUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^TRIG(GER)?_?OUT$").expect("trigger-out pattern is valid"));
static CHANNEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([A-Z])(\d+)$").expect("channel pattern is valid"));

/// Card letter of a pulse channel (`A` for channels 1-4, `B` for 5-8, ...).
pub fn channel_letter(id: ChannelId) -> char {
    assert!(!id.is_trigger_out(), "the trigger-out channel has no card letter");
    (b'A' + ((id.index() - 1) / CHANNELS_PER_CARD) as u8) as char
}

/// Channel number within its card, starting at 1.
pub fn channel_number(id: ChannelId) -> usize {
    assert!(!id.is_trigger_out(), "the trigger-out channel has no channel number");
    (id.index() - 1) % CHANNELS_PER_CARD + 1
}

/// Parses a channel name of the form `<letter><number>` (e.g. `A1`, `c4`) or
/// `TRIG_OUT` / `TRIGGER_OUT` into a channel id, checking it against the number of
/// channels the instrument has.
///
/// ```
/// use pulser_backend::utils::parse_channel_name;
///
/// assert_eq!(parse_channel_name("B2", 16).unwrap().index(), 6);
/// assert!(parse_channel_name("trig_out", 16).unwrap().is_trigger_out());
/// assert!(parse_channel_name("E1", 16).is_err());
/// ```
pub fn parse_channel_name(name: &str, num_channels: usize) -> Result<ChannelId> {
    if TRIGGER_OUT_RE.is_match(name.trim()) {
        return Ok(ChannelId::TRIGGER_OUT);
    }
    let caps = CHANNEL_RE
        .captures(name.trim())
        .ok_or_else(|| PulserError::InvalidChannel(name.to_string()))?;
    let card = (caps[1].to_ascii_uppercase().as_bytes()[0] - b'A') as usize;
    let number: usize = caps[2]
        .parse()
        .map_err(|_| PulserError::InvalidChannel(name.to_string()))?;
    if number == 0 || number > CHANNELS_PER_CARD {
        return Err(PulserError::InvalidChannel(name.to_string()));
    }
    let index = card * CHANNELS_PER_CARD + number;
    if index > num_channels {
        return Err(PulserError::InvalidChannel(name.to_string()));
    }
    Ok(ChannelId::new(index))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn letters_and_numbers() {
        assert_eq!(channel_letter(ChannelId::new(1)), 'A');
        assert_eq!(channel_number(ChannelId::new(1)), 1);
        assert_eq!(channel_letter(ChannelId::new(4)), 'A');
        assert_eq!(channel_number(ChannelId::new(4)), 4);
        assert_eq!(channel_letter(ChannelId::new(5)), 'B');
        assert_eq!(channel_number(ChannelId::new(5)), 1);
        assert_eq!(channel_letter(ChannelId::new(16)), 'D');
    }

    #[test]
    fn parse_round_trip() {
        for index in 1..=16 {
            let id = ChannelId::new(index);
            let name = format!("{}{}", channel_letter(id), channel_number(id));
            assert_eq!(parse_channel_name(&name, 16).unwrap(), id);
        }
    }

    #[test]
    fn parse_rejects() {
        assert!(parse_channel_name("A0", 16).is_err());
        assert!(parse_channel_name("A5", 16).is_err());
        assert!(parse_channel_name("port0/line0", 16).is_err());
        assert!(parse_channel_name("D4", 12).is_err());
        assert!(parse_channel_name("TRIGGER_OUT", 4).unwrap().is_trigger_out());
    }

    #[test]
    fn patterns_are_compiled_once() {
        parse_channel_name("A1", 16).unwrap();
        let compiled = Lazy::get(&CHANNEL_RE).unwrap() as *const Regex;
        parse_channel_name("B3", 16).unwrap();
        assert_eq!(Lazy::get(&CHANNEL_RE).unwrap() as *const Regex, compiled);
        assert!(Lazy::get(&TRIGGER_OUT_RE).is_some());
    }
}
