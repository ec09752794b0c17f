use linkbot::bootstrap::run as BootstrapRun;

use std::process::ExitCode;

use tokio::runtime::Builder as RuntimeBuilder;

fn main() -> ExitCode {
    let runtime = match RuntimeBuilder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let code = runtime.block_on(BootstrapRun());
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
