use core::fmt;
use core::panic::Location;

/// Where an allocate or deallocate call came from, only used in diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Site {
    /// Source file of the call
    pub file: &'static str,
    /// Line of the call
    pub line: u32,
}

impl Site {
    /// Create a site from a file name and line
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// The location of whoever called the function this is used in
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'static>> for Site {
    fn from(location: &Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Expands to the [`Site`] of the macro invocation
///
/// ```
/// use fixed_alloc::{site, Site};
///
/// let here: Site = site!();
/// assert_eq!(here.file, file!());
/// ```
#[macro_export]
macro_rules! site {
    () => {
        $crate::Site::new(file!(), line!())
    };
}
