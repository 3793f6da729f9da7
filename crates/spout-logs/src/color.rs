//! Terminal colours for multi-container output.

use std::collections::HashMap;

/// Number of distinct colour codes before assignments repeat.
const PALETTE_SIZE: usize = 14;

/// ANSI sequence resetting all attributes.
pub const COLOR_RESET: &str = "\x1b[0m";

/// Assigns a stable colour to each key on first sight.
///
/// Keys get the next of 14 rotating codes: seven foreground colours, each
/// either bright (even index) or dim (odd index). One colorizer is scoped to
/// a single response so no state is shared between clients.
#[derive(Debug, Default)]
pub struct Colorizer {
    assigned: HashMap<String, usize>,
}

impl Colorizer {
    /// Creates an empty colorizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the escape code assigned to `key`, assigning one if needed.
    pub fn get(&mut self, key: &str) -> String {
        let index = match self.assigned.get(key) {
            Some(index) => *index,
            None => {
                let index = self.assigned.len();
                self.assigned.insert(key.to_string(), index);
                index
            }
        };
        Self::code(index)
    }

    fn code(index: usize) -> String {
        let slot = index % PALETTE_SIZE;
        let bright = if slot % 2 == 0 { "1;" } else { "" };
        format!("\x1b[{bright}3{}m", 7 - (slot % 7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_key_gets_same_color() {
        let mut colors = Colorizer::new();
        let first = colors.get("web");
        colors.get("db");
        assert_eq!(colors.get("web"), first);
    }

    #[test]
    fn first_colors_alternate_brightness() {
        let mut colors = Colorizer::new();
        assert_eq!(colors.get("a"), "\x1b[1;37m");
        assert_eq!(colors.get("b"), "\x1b[36m");
        assert_eq!(colors.get("c"), "\x1b[1;35m");
    }

    #[test]
    fn fourteen_distinct_codes_then_repeat() {
        let mut colors = Colorizer::new();
        let codes: Vec<String> = (0..15).map(|i| colors.get(&format!("c{i}"))).collect();

        let distinct: HashSet<&String> = codes[..14].iter().collect();
        assert_eq!(distinct.len(), 14);
        assert_eq!(codes[14], codes[0]);
    }
}
