//! Sequential and diverging color palettes for choropleth classes.

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Fill for features without a positive measure.
pub const NO_DATA_COLOR: &str = "#e0e0e0";

/// Legend label of the no-data class.
pub const NO_DATA_LABEL: &str = "No Data";

/// A five-step color ramp.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ColorScheme {
    #[default]
    Reds,
    Blues,
    Greens,
    Oranges,
    Purples,
    #[strum(serialize = "YlOrRd")]
    YlOrRd,
    #[strum(serialize = "RdYlBu")]
    RdYlBu,
}

impl ColorScheme {
    /// The ramp's colors, lightest (or first) to darkest (or last).
    #[must_use]
    pub const fn colors(self) -> &'static [&'static str; 5] {
        match self {
            Self::Reds => &["#fee5d9", "#fcae91", "#fb6a4a", "#de2d26", "#a50f15"],
            Self::Blues => &["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"],
            Self::Greens => &["#edf8e9", "#bae4b3", "#74c476", "#31a354", "#006d2c"],
            Self::Oranges => &["#feedde", "#fdbe85", "#fd8d3c", "#e6550d", "#a63603"],
            Self::Purples => &["#f2f0f7", "#cbc9e2", "#9e9ac8", "#756bb1", "#54278f"],
            Self::YlOrRd => &["#ffffb2", "#fecc5c", "#fd8d3c", "#f03b20", "#bd0026"],
            Self::RdYlBu => &["#d7191c", "#fdae61", "#ffffbf", "#abd9e9", "#2c7bb6"],
        }
    }

    /// Color of `class` out of `class_count` classes.
    ///
    /// Classes are spread evenly over the ramp, so the first class always
    /// gets the first color and the last class the last color.
    #[must_use]
    pub fn color(self, class: usize, class_count: usize) -> &'static str {
        let colors = self.colors();
        let last = colors.len() - 1;
        if class_count <= 1 {
            return colors[last];
        }
        let class = class.min(class_count - 1);
        let index = (class * last + (class_count - 1) / 2) / (class_count - 1);
        colors[index.min(last)]
    }
}
