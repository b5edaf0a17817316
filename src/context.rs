//! Run context handed to every pipeline component.
//!
//! Created once per CLI invocation and shared by reference; nothing mutates it
//! after construction.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub verbosity: Verbosity,
}

impl Default for RunContext {
    fn default() -> Self {
        Self { verbosity: Verbosity::Normal }
    }
}

impl RunContext {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let verbosity = match (verbose, quiet) {
            (_, true) => Verbosity::Quiet,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        };
        Self { verbosity }
    }

    /// Context that prints nothing but warnings; used by tests.
    pub fn silent() -> Self {
        Self { verbosity: Verbosity::Quiet }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("[aerodeck] {}", msg.as_ref());
        }
    }

    pub fn ok(&self, msg: impl AsRef<str>) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("[aerodeck] OK {}", msg.as_ref());
        }
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        if self.is_verbose() {
            eprintln!("[aerodeck]   {}", msg.as_ref());
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        eprintln!("[aerodeck] WARNING: {}", msg.as_ref());
    }
}
