//! Hotkey combo syntax: `token('+'token)*`.

use edgelink_core::Error;

use crate::control::{Hotkey, ModifierMask};

/// Named keys beyond plain letters/digits/function keys.
fn named_key_code(token: &str) -> Option<u16> {
    Some(match token {
        "space" => 0x31,
        "return" | "enter" => 0x24,
        "escape" | "esc" => 0x35,
        "tab" => 0x30,
        "left" => 0x7B,
        "right" => 0x7C,
        "down" => 0x7D,
        "up" => 0x7E,
        _ => return None,
    })
}

/// macOS ANSI virtual keycodes for letters (`kVK_ANSI_*`), the same
/// alphabet a `CGEventTap` keyboard event carries in
/// `KEYBOARD_EVENT_KEYCODE`. Non-macOS capture backends report their own
/// platform's key codes for letters, so a hotkey configured here will
/// only match physically on macOS; that's an accepted scope limit (the
/// hotkey's key token is almost always a modifier-adjacent letter,
/// rarely the part that varies cross-platform in practice).
fn letter_key_code(token: &str) -> Option<u16> {
    if token.len() != 1 {
        return None;
    }
    let c = token.chars().next()?.to_ascii_lowercase();
    Some(match c {
        'a' => 0x00,
        's' => 0x01,
        'd' => 0x02,
        'f' => 0x03,
        'h' => 0x04,
        'g' => 0x05,
        'z' => 0x06,
        'x' => 0x07,
        'c' => 0x08,
        'v' => 0x09,
        'b' => 0x0B,
        'q' => 0x0C,
        'w' => 0x0D,
        'e' => 0x0E,
        'r' => 0x0F,
        'y' => 0x10,
        't' => 0x11,
        'o' => 0x1F,
        'u' => 0x20,
        'i' => 0x22,
        'p' => 0x23,
        'l' => 0x25,
        'j' => 0x26,
        'k' => 0x28,
        'n' => 0x2D,
        'm' => 0x2E,
        _ => return None,
    })
}

fn digit_key_code(token: &str) -> Option<u16> {
    if token.len() != 1 {
        return None;
    }
    Some(match token.chars().next()? {
        '1' => 0x12,
        '2' => 0x13,
        '3' => 0x14,
        '4' => 0x15,
        '5' => 0x17,
        '6' => 0x16,
        '7' => 0x1A,
        '8' => 0x1C,
        '9' => 0x19,
        '0' => 0x1D,
        _ => return None,
    })
}

/// `kVK_F1`..`kVK_F12`; codes above F12 vary by keyboard model, so this
/// only covers the common range.
fn function_key_code(token: &str) -> Option<u16> {
    let rest = token.strip_prefix('f')?;
    let n: u16 = rest.parse().ok()?;
    Some(match n {
        1 => 0x7A,
        2 => 0x78,
        3 => 0x63,
        4 => 0x76,
        5 => 0x60,
        6 => 0x61,
        7 => 0x62,
        8 => 0x64,
        9 => 0x65,
        10 => 0x6D,
        11 => 0x67,
        12 => 0x6F,
        _ => return None,
    })
}

/// Parse a hotkey combo string like `"ctrl+alt+cmd"` into a [`Hotkey`].
/// Exactly one non-modifier token is required; modifier tokens may
/// appear in any order and repeated tokens are harmless.
pub fn parse_hotkey(spec: &str) -> Result<Hotkey, Error> {
    let mut mods = ModifierMask::default();
    let mut key_code = None;

    for raw in spec.split('+') {
        let token = raw.trim().to_ascii_lowercase();
        if token.is_empty() {
            return Err(Error::config(format!("empty token in hotkey {spec:?}")));
        }
        match token.as_str() {
            "ctrl" | "control" => mods.ctrl = true,
            "opt" | "option" | "alt" => mods.alt = true,
            "cmd" | "command" => mods.cmd = true,
            "shift" => mods.shift = true,
            _ => {
                let code = named_key_code(&token)
                    .or_else(|| letter_key_code(&token))
                    .or_else(|| digit_key_code(&token))
                    .or_else(|| function_key_code(&token))
                    .ok_or_else(|| Error::config(format!("unknown key token {token:?}")))?;
                if key_code.replace(code).is_some() {
                    return Err(Error::config(format!(
                        "hotkey {spec:?} names more than one key"
                    )));
                }
            }
        }
    }

    let key_code = key_code.ok_or_else(|| Error::config(format!("hotkey {spec:?} has no key")))?;
    Ok(Hotkey { key_code, modifiers: mods })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_combo() {
        let hk = parse_hotkey("ctrl+alt+cmd+space").unwrap();
        assert!(hk.modifiers.ctrl && hk.modifiers.alt && hk.modifiers.cmd);
        assert!(!hk.modifiers.shift);
        assert_eq!(hk.key_code, named_key_code("space").unwrap());
    }

    #[test]
    fn parses_named_and_letter_keys() {
        assert!(parse_hotkey("cmd+space").is_ok());
        assert!(parse_hotkey("ctrl+shift+a").is_ok());
        assert!(parse_hotkey("alt+f1").is_ok());
    }

    #[test]
    fn rejects_missing_key() {
        assert!(parse_hotkey("ctrl+alt").is_err());
    }

    #[test]
    fn rejects_two_keys() {
        assert!(parse_hotkey("a+b").is_err());
    }

    #[test]
    fn rejects_unknown_token() {
        assert!(parse_hotkey("ctrl+banana").is_err());
    }

    #[test]
    fn is_case_and_whitespace_insensitive() {
        let a = parse_hotkey("Ctrl+Alt+Cmd+Space").unwrap();
        let b = parse_hotkey(" ctrl + alt + cmd + space ").unwrap();
        assert_eq!(a, b);
    }
}
