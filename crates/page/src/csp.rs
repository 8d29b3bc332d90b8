//! Content Security Policy, reduced to what the injection ladder consults.

/// The page's effective script policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CspPolicy {
    /// Whether a `script-src` directive restricts script sources at all.
    pub has_script_src: bool,
    pub unsafe_inline: bool,
    pub unsafe_eval: bool,
}

impl Default for CspPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl CspPolicy {
    /// No `script-src` restriction.
    pub fn permissive() -> Self {
        Self {
            has_script_src: false,
            unsafe_inline: false,
            unsafe_eval: false,
        }
    }

    /// `script-src` locked down with neither escape hatch.
    pub fn strict() -> Self {
        Self {
            has_script_src: true,
            unsafe_inline: false,
            unsafe_eval: false,
        }
    }

    pub fn with_unsafe_inline() -> Self {
        Self {
            has_script_src: true,
            unsafe_inline: true,
            unsafe_eval: false,
        }
    }

    pub fn with_unsafe_eval() -> Self {
        Self {
            has_script_src: true,
            unsafe_inline: false,
            unsafe_eval: true,
        }
    }

    /// Inline `<script>` tags execute.
    pub fn permits_inline(&self) -> bool {
        !self.has_script_src || self.unsafe_inline
    }

    /// Dynamically-constructed functions execute in the main world.
    pub fn permits_eval(&self) -> bool {
        !self.has_script_src || self.unsafe_eval
    }
}
