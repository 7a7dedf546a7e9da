use crate::error::Error;

/// Where in the job lifecycle a callback is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    /// Submission client: the step launcher running in the user's shell.
    Local,
    /// Batch/allocation front-end.
    Allocator,
    /// Execution node, inside the step runtime.
    Remote,
}

impl Context {
    /// True for the contexts where the mount option may be registered.
    pub fn is_submission_side(self) -> bool {
        matches!(self, Context::Local | Context::Allocator)
    }
}

/// A command-line option the plug-in asks the host to expose.
#[derive(Clone, Copy, Debug)]
pub struct OptionSpec {
    pub name: &'static str,
    pub arginfo: &'static str,
    pub usage: &'static str,
}

/// The slice of the scheduler runtime the callbacks actually touch.
///
/// Keeping this a trait keeps the lifecycle logic testable without a
/// scheduler: tests drive the plug-in through an in-memory implementation,
/// exactly the way the original plug-in's harness stubbed its host.
pub trait Host {
    fn context(&self) -> Context;

    /// The job's `(uid, gid)`. Only meaningful on the execution side.
    fn job_user(&self) -> Result<(u32, u32), Error>;

    /// Read a variable from the job environment.
    fn getenv(&self, name: &str) -> Option<String>;

    /// Write a variable into the job environment, so the host propagates it
    /// to the execution nodes.
    fn setenv(&mut self, name: &str, value: &str) -> Result<(), Error>;

    /// Expose `opt` on the step submission command line.
    fn register_option(&mut self, opt: &OptionSpec) -> Result<(), Error>;
}

/// [`Host`] backed by the real process environment and identity.
///
/// This is what standalone tools (and single-process harnesses) use; a
/// scheduler embedding would substitute its own adapter.
pub struct ProcessHost {
    context: Context,
}

impl ProcessHost {
    pub fn new(context: Context) -> ProcessHost {
        ProcessHost { context }
    }
}

impl Host for ProcessHost {
    fn context(&self) -> Context {
        self.context
    }

    fn job_user(&self) -> Result<(u32, u32), Error> {
        Ok((
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
        ))
    }

    fn getenv(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn setenv(&mut self, name: &str, value: &str) -> Result<(), Error> {
        // The plug-in is single-threaded and callbacks are serialized by the
        // host, so mutating the process environment is sound here.
        unsafe { std::env::set_var(name, value) };
        Ok(())
    }

    fn register_option(&mut self, _opt: &OptionSpec) -> Result<(), Error> {
        // The process environment has no option table; submission-side
        // embeddings register with the scheduler's own parser.
        Ok(())
    }
}
