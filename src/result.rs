use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by [`Registry::get_or_create`](crate::Registry::get_or_create)
/// or [`Registry::get_or_try_create`](crate::Registry::get_or_try_create).
#[derive(Debug)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn construction_failed(type_name: &'static str, source: BoxError) -> Self {
        Self {
            kind: Box::new(ErrorKind::ConstructionFailed { type_name, source }),
        }
    }

    pub(crate) fn recursive_construction(cycle: Vec<&'static str>) -> Self {
        Self {
            kind: Box::new(ErrorKind::RecursiveConstruction { cycle }),
        }
    }

    /// The builder for the type failed while it held the construction lock.
    /// The slot is left empty; a later call for the same type retries
    /// construction from scratch.
    pub fn is_construction_failed(&self) -> bool {
        matches!(&*self.kind, ErrorKind::ConstructionFailed { .. })
    }

    /// A builder re-entered the registry for a type whose construction is
    /// already in progress on the current thread.
    pub fn is_recursive_construction(&self) -> bool {
        matches!(&*self.kind, ErrorKind::RecursiveConstruction { .. })
    }

    /// The name of the type whose construction failed or re-entered itself.
    pub fn type_name(&self) -> &'static str {
        match &*self.kind {
            ErrorKind::ConstructionFailed { type_name, .. } => type_name,
            // The head of the cycle is the type that was requested twice.
            ErrorKind::RecursiveConstruction { cycle } => cycle[0],
        }
    }

    /// For recursive-construction errors, the type names participating in
    /// the cycle, in construction order, ending with the repeated head.
    pub fn cycle(&self) -> Option<&[&'static str]> {
        match &*self.kind {
            ErrorKind::RecursiveConstruction { cycle } => Some(cycle),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::ConstructionFailed { type_name, source } => {
                write!(f, "construction of `{type_name}` failed: {source}")
            }
            ErrorKind::RecursiveConstruction { cycle } => {
                write!(
                    f,
                    "recursive construction of `{}` detected: {}",
                    cycle[0],
                    cycle.join(" -> ")
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            ErrorKind::ConstructionFailed { source, .. } => Some(&**source),
            ErrorKind::RecursiveConstruction { .. } => None,
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    ConstructionFailed {
        type_name: &'static str,
        source: BoxError,
    },
    RecursiveConstruction {
        /// Participant type names in construction order. The first entry is
        /// the cycle head, repeated as the last entry.
        cycle: Vec<&'static str>,
    },
}
