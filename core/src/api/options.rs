//! Configuration options for the VFR compiler.

use uuid::Uuid;

use crate::table::DEFAULT_PACK;

/// Configuration options for one compilation.
///
/// # Example
///
/// ```
/// use vfr_core::api::CompileOptions;
///
/// let options = CompileOptions {
///     framework_compatible: true,
///     ..CompileOptions::default()
/// };
/// assert_eq!(options.default_pack, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Accept the Framework (pre-UEFI 2.1) conditional dialect, where a
    /// `suppressif`/`grayoutif` pair shares one `endif`.
    ///
    /// Default: false
    pub framework_compatible: bool,

    /// Pack value in effect before any `#pragma pack`.
    ///
    /// Default: 8
    pub default_pack: u32,

    /// Maximum nesting of parenthesized sub-expressions and built-in calls.
    ///
    /// Default: 64
    pub max_expression_depth: usize,

    /// Class GUID used for every formset instead of the declared ones.
    ///
    /// Default: None
    pub override_class_guid: Option<Uuid>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            framework_compatible: false,
            default_pack: DEFAULT_PACK,
            max_expression_depth: 64,
            override_class_guid: None,
        }
    }
}
