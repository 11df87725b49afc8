use std::process::ExitCode;

/// Entry point for the podident diagnostic tool.
///
/// Prints the cgroup layout detected on this host and resolves the
/// container id of each PID given on the command line.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug podident 1234 5678
/// ```
fn main() -> ExitCode {
    env_logger::init();

    let mut pids = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.parse::<u32>() {
            Ok(pid) => pids.push(pid),
            Err(_) => {
                eprintln!("not a pid: `{arg}`");
                return ExitCode::FAILURE;
            }
        }
    }

    podident::run(pids);
    ExitCode::SUCCESS
}
