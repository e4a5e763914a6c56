use std::{fmt::Display, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColourError {
    #[error("hex colour string can't be null")]
    NullInput,
    #[error(
        "can't convert string {0:?} to an argb or rgb colour, it needs to be 6 (rgb) or 8 (argb) hex characters long with an optional leading #"
    )]
    InvalidFormat(String),
}

/// A colour used for the foreground of a style run.
///
/// An alpha of `0xFF` is fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Colour {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Colour {
    pub const WHITE: Colour = Colour::from_rgb(0xFF, 0xFF, 0xFF);
    pub const RED: Colour = Colour::from_rgb(0xFF, 0x00, 0x00);
    pub const CYAN: Colour = Colour::from_rgb(0x00, 0xFF, 0xFF);
    pub const YELLOW: Colour = Colour::from_rgb(0xFF, 0xFF, 0x00);
    pub const ORANGE: Colour = Colour::from_rgb(0xFF, 0xA5, 0x00);
    pub const BLUE: Colour = Colour::from_rgb(0x00, 0x00, 0xFF);
    pub const BLACK: Colour = Colour::from_rgb(0x00, 0x00, 0x00);
    pub const BROWN: Colour = Colour::from_rgb(0xA5, 0x2A, 0x2A);
    pub const GREEN: Colour = Colour::from_rgb(0x00, 0x80, 0x00);
    pub const PINK: Colour = Colour::from_rgb(0xFF, 0xC0, 0xCB);

    /// An opaque colour.
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            alpha: 0xFF,
            red,
            green,
            blue,
        }
    }

    pub const fn from_argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self {
            alpha,
            red,
            green,
            blue,
        }
    }

    /// Parses `RRGGBB` or `AARRGGBB` with an optional leading `#`.
    ///
    /// Without an alpha component the colour is opaque.
    pub fn from_hex(s: Option<&str>) -> Result<Self, ColourError> {
        let s = s.ok_or(ColourError::NullInput)?;
        let digits = s.strip_prefix('#').unwrap_or(s);
        let invalid = || ColourError::InvalidFormat(s.to_owned());
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let num = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        let [a, r, g, b] = num.to_be_bytes();
        match digits.len() {
            6 => Ok(Self::from_rgb(r, g, b)),
            8 => Ok(Self::from_argb(a, r, g, b)),
            _ => Err(invalid()),
        }
    }

    /// Looks up one of the named caption colours, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMED: [(&str, Colour); 10] = [
            ("white", Colour::WHITE),
            ("red", Colour::RED),
            ("cyan", Colour::CYAN),
            ("yellow", Colour::YELLOW),
            ("orange", Colour::ORANGE),
            ("blue", Colour::BLUE),
            ("black", Colour::BLACK),
            ("brown", Colour::BROWN),
            ("green", Colour::GREEN),
            ("pink", Colour::PINK),
        ];

        NAMED
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, colour)| *colour)
    }

    /// Returns the colour as `#AARRGGBB`.
    pub fn to_hex(&self) -> String {
        format!(
            "#{:02X}{:02X}{:02X}{:02X}",
            self.alpha, self.red, self.green, self.blue
        )
    }

    /// The WCAG relative luminance of the colour, ignoring alpha.
    pub fn relative_luminance(&self) -> f32 {
        fn linear(channel: u8) -> f32 {
            let c = channel as f32 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }

        0.2126 * linear(self.red) + 0.7152 * linear(self.green) + 0.0722 * linear(self.blue)
    }

    /// Returns the colour packed as `0xAARRGGBB`.
    pub const fn to_argb(&self) -> u32 {
        u32::from_be_bytes([self.alpha, self.red, self.green, self.blue])
    }
}

impl FromStr for Colour {
    type Err = ColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(Some(s))
    }
}

impl Display for Colour {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let red = Colour::from_hex(Some("#ff0000")).unwrap();
        assert_eq!(red, Colour::RED);
        assert_eq!(red.to_argb(), 0xFFFF0000);

        let translucent = "#80ff0000".parse::<Colour>().unwrap();
        assert_eq!(translucent.alpha, 0x80);
        assert_eq!(translucent.red, 0xFF);
        assert_eq!(translucent.green, 0x00);

        assert_eq!(
            "00FF00".parse::<Colour>().unwrap(),
            Colour::from_rgb(0, 0xFF, 0)
        );
    }

    #[test]
    fn test_from_hex_errors() {
        assert_eq!(Colour::from_hex(None), Err(ColourError::NullInput));
        assert_eq!(
            "bogus".parse::<Colour>(),
            Err(ColourError::InvalidFormat("bogus".into()))
        );
        assert!("#fff".parse::<Colour>().is_err());
        assert!("#ff00000".parse::<Colour>().is_err());
        assert!("#gg0000".parse::<Colour>().is_err());
        assert!("#+f0000".parse::<Colour>().is_err());
        assert!("".parse::<Colour>().is_err());
        assert!("##ff0000".parse::<Colour>().is_err());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Colour::from_name("Yellow"), Some(Colour::YELLOW));
        assert_eq!(Colour::from_name("PINK"), Some(Colour::PINK));
        assert_eq!(Colour::from_name("magenta"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Colour::ORANGE.to_string(), "#FFFFA500");
    }

    #[test]
    fn test_relative_luminance() {
        assert_eq!(Colour::BLACK.relative_luminance(), 0.0);
        assert!((Colour::WHITE.relative_luminance() - 1.0).abs() < 1e-4);
        assert!(Colour::YELLOW.relative_luminance() > Colour::BLUE.relative_luminance());
    }
}
