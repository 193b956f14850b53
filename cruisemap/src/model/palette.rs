//! Company marker colors.
//!
//! Companies with a corporate color always get it. Everyone else takes the
//! next unused palette entry in the order companies are ingested, and falls
//! back to gray once the palette runs out. Each engine owns its own
//! [`Palette`], so assignment order never leaks between engines.

/// Color used once the palette is exhausted.
pub const DEFAULT_COMPANY_COLOR: u32 = 0x7F7F7F;

/// Corporate colors by exact company name.
pub const BRAND_COLORS: &[(&str, u32)] = &[("АЗУРИТ", 0x31739D), ("Мостурфлот", 0xF8130D)];

/// Colors handed out to companies without a corporate color.
pub const PALETTE: &[u32] = &[
    0xE137C2, 0x8CE4CB, 0xFFC4A4, 0xFEBC43, 0xB9D252, 0x9F9CB9, 0x8CB7B5, 0xF5AAB4, 0xFFFF00,
    0x76AA74, 0x715E7C, 0xFFA79B, 0x59637F, 0xEE5C48, 0x25E6E3, 0xDCF4E6, 0xDEF5AF, 0xC84457,
    0x936A60,
];

/// Per-engine color allocator.
#[derive(Debug, Default, Clone)]
pub struct Palette {
    used: usize,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a color to a company named `name`.
    ///
    /// Brand lookups do not consume a palette entry.
    pub fn color_for(&mut self, name: &str) -> u32 {
        if let Some(&(_, color)) = BRAND_COLORS.iter().find(|(brand, _)| *brand == name) {
            return color;
        }
        let color = PALETTE.get(self.used).copied().unwrap_or(DEFAULT_COMPANY_COLOR);
        self.used += 1;
        color
    }

    /// Number of palette entries handed out so far.
    pub fn used(&self) -> usize {
        self.used.min(PALETTE.len())
    }
}
