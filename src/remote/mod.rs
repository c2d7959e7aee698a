// Remote reachability and command execution

mod exec;
mod probe;
mod runner;

pub use exec::{
    AuthStrategy, DEFAULT_COMMAND_TIMEOUT, RemoteExecutor, RemoteTarget, SshInvocation,
};
pub use probe::{DEFAULT_PROBE_TIMEOUT, is_reachable, probe};
pub use runner::{CommandRunner, LocalRunner, RemoteRunner, shell_join};
