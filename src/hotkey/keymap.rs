//! macOS virtual keycodes for bindable keys (ANSI layout)

use super::backend::LogicalKey;

const KEYMAP: &[(char, u16)] = &[
    ('A', 0x00),
    ('S', 0x01),
    ('D', 0x02),
    ('F', 0x03),
    ('H', 0x04),
    ('G', 0x05),
    ('Z', 0x06),
    ('X', 0x07),
    ('C', 0x08),
    ('V', 0x09),
    ('B', 0x0B),
    ('Q', 0x0C),
    ('W', 0x0D),
    ('E', 0x0E),
    ('R', 0x0F),
    ('Y', 0x10),
    ('T', 0x11),
    ('1', 0x12),
    ('2', 0x13),
    ('3', 0x14),
    ('4', 0x15),
    ('6', 0x16),
    ('5', 0x17),
    ('=', 0x18),
    ('9', 0x19),
    ('7', 0x1A),
    ('-', 0x1B),
    ('8', 0x1C),
    ('0', 0x1D),
    (']', 0x1E),
    ('O', 0x1F),
    ('U', 0x20),
    ('[', 0x21),
    ('I', 0x22),
    ('P', 0x23),
    ('L', 0x25),
    ('J', 0x26),
    ('\'', 0x27),
    ('K', 0x28),
    (';', 0x29),
    ('\\', 0x2A),
    (',', 0x2B),
    ('/', 0x2C),
    ('N', 0x2D),
    ('M', 0x2E),
    ('.', 0x2F),
    ('`', 0x32),
];

/// Virtual keycode for a logical key, if the layout has one
pub fn keycode_for(key: LogicalKey) -> Option<u16> {
    KEYMAP
        .iter()
        .find(|(c, _)| *c == key.as_char())
        .map(|(_, code)| *code)
}

/// Logical key produced by a virtual keycode
pub fn key_for_keycode(code: u16) -> Option<LogicalKey> {
    KEYMAP
        .iter()
        .find(|(_, c)| *c == code)
        .and_then(|(ch, _)| LogicalKey::new(*ch).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keymap_is_bijective() {
        for (ch, code) in KEYMAP {
            let key = LogicalKey::new(*ch).unwrap();
            assert_eq!(keycode_for(key), Some(*code));
            assert_eq!(key_for_keycode(*code), Some(key));
        }
    }

    #[test]
    fn test_unmapped_keycode() {
        // Return key
        assert_eq!(key_for_keycode(0x24), None);
    }
}
