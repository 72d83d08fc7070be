//! Per-label colours

/// Category20: pairs of (dark, light) hues
const CATEGORY20: [[u8; 3]; 20] = [
    [0x1f, 0x77, 0xb4],
    [0xae, 0xc7, 0xe8],
    [0xff, 0x7f, 0x0e],
    [0xff, 0xbb, 0x78],
    [0x2c, 0xa0, 0x2c],
    [0x98, 0xdf, 0x8a],
    [0xd6, 0x27, 0x28],
    [0xff, 0x98, 0x96],
    [0x94, 0x67, 0xbd],
    [0xc5, 0xb0, 0xd5],
    [0x8c, 0x56, 0x4b],
    [0xc4, 0x9c, 0x94],
    [0xe3, 0x77, 0xc2],
    [0xf7, 0xb6, 0xd2],
    [0x7f, 0x7f, 0x7f],
    [0xc7, 0xc7, 0xc7],
    [0xbc, 0xbd, 0x22],
    [0xdb, 0xdb, 0x8d],
    [0x17, 0xbe, 0xcf],
    [0x9e, 0xda, 0xe5],
];

const BLACK: [u8; 3] = [0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelColors {
    /// Colour of the label's points in the cloud
    pub point: [u8; 3],
    /// Colour of the current-record marker and the label banner
    pub marker: [u8; 3],
}

/// Colours assigned to labels in order of first appearance, cycling the palette
#[derive(Debug, Clone)]
pub struct LabelPalette {
    labels: Vec<(String, LabelColors)>,
    colorize: bool,
}

impl LabelPalette {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a str>, colorize: bool) -> Self {
        let mut assigned: Vec<(String, LabelColors)> = Vec::new();
        for label in labels {
            if assigned.iter().any(|(known, _)| known == label) {
                continue;
            }
            let slot = assigned.len() % (CATEGORY20.len() / 2);
            let colors = if colorize {
                LabelColors {
                    point: CATEGORY20[2 * slot],
                    marker: CATEGORY20[2 * slot],
                }
            } else {
                LabelColors {
                    point: BLACK,
                    marker: BLACK,
                }
            };
            assigned.push((label.to_string(), colors));
        }

        Self {
            labels: assigned,
            colorize,
        }
    }

    /// Colours for a label; unknown labels fall back to grey / black
    pub fn colors(&self, label: &str) -> LabelColors {
        self.labels
            .iter()
            .find(|(known, _)| known == label)
            .map(|(_, colors)| *colors)
            .unwrap_or(LabelColors {
                point: if self.colorize { CATEGORY20[15] } else { BLACK },
                marker: if self.colorize { CATEGORY20[14] } else { BLACK },
            })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigned_in_first_appearance_order() {
        let palette = LabelPalette::new(["run_left", "drink_left", "run_left"], true);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.colors("run_left").point, [0x1f, 0x77, 0xb4]);
        assert_eq!(palette.colors("drink_left").point, [0xff, 0x7f, 0x0e]);
    }

    #[test]
    fn test_palette_cycles_after_ten_labels() {
        let names: Vec<String> = (0..11).map(|i| format!("state_{i}")).collect();
        let palette = LabelPalette::new(names.iter().map(String::as_str), true);
        assert_eq!(palette.colors("state_10"), palette.colors("state_0"));
        assert_ne!(palette.colors("state_9"), palette.colors("state_0"));
    }

    #[test]
    fn test_uncolored_is_black() {
        let palette = LabelPalette::new(["a", "b"], false);
        assert_eq!(palette.colors("a").point, BLACK);
        assert_eq!(palette.colors("b").marker, BLACK);
        assert_eq!(palette.colors("missing").marker, BLACK);
    }
}
