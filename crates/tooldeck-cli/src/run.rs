//! `tooldeck run`: launch one tool and supervise it to completion

use std::io::Write;
use std::path::Path;

use regex::Regex;
use tooldeck_process::{
    LaunchEnv, LaunchRequest, LauncherSettings, ManagedProcess, PortAllocator, ProcessLauncher,
};
use tracing::{debug, info, warn};

use crate::args::{Cli, Commands, RunArgs};
use crate::error::{CliError, CliResult};
use crate::host::{substitute_port, LoopbackPortAllocator, NodeModulesResolver};

/// Dispatch a parsed command line
pub async fn execute(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Run(args) => run(args, cli.config.as_deref()).await,
    }
}

/// Launch the tool described by `args` and wait for it to finish
///
/// Ctrl-C kills the whole process tree and reports [`CliError::Interrupted`].
pub async fn run(args: RunArgs, config: Option<&Path>) -> CliResult<()> {
    let settings = LauncherSettings::load(config)?;
    let env = if args.extra_paths.is_empty() {
        LaunchEnv::inherit()
    } else {
        LaunchEnv::with_extra_paths(&args.extra_paths)?
    };
    let launcher = ProcessLauncher::new(NodeModulesResolver, env, settings);

    let ready = args.wait_for.as_deref().map(Regex::new).transpose()?;
    let reject = args.reject.as_deref().map(Regex::new).transpose()?;
    let request = build_request(&args)?;

    let echo = (!args.quiet).then(|| Regex::new(r"(?s).")).transpose()?;
    let process = launcher.launch_with(request, |process| {
        if let Some(any) = echo {
            let echoed = process.on(any, |text| {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
                    debug!(error = %e, "Failed to echo tool output");
                }
            });
            if let Err(e) = echoed {
                warn!(command = %process.name(), error = %e, "Tool output will not be echoed");
            }
        }
    })?;

    if let Some(ready) = ready {
        tokio::select! {
            result = process.wait_for(ready, reject) => match result {
                Ok(text) => info!(command = %process.name(), matched = %text.trim_end(), "Tool is ready"),
                Err(e) => {
                    process.kill().await;
                    return Err(e.into());
                }
            },
            _ = tokio::signal::ctrl_c() => return interrupt(&process).await,
        }
    }

    let outcome = tokio::select! {
        outcome = process.wait() => outcome,
        _ = tokio::signal::ctrl_c() => return interrupt(&process).await,
    };
    outcome.into_result()?;
    Ok(())
}

fn build_request(args: &RunArgs) -> CliResult<LaunchRequest> {
    let tool_args = if args.port {
        let port = LoopbackPortAllocator.allocate()?;
        info!(port, "Allocated port");
        substitute_port(&args.args, port)
    } else {
        args.args.clone()
    };

    let mut request =
        LaunchRequest::new(&args.package, &args.bin, &args.command).args(tool_args);
    if let Some(cwd) = &args.cwd {
        request = request.cwd(cwd);
    }
    if let Some(base_path) = &args.base_path {
        request = request.base_path(base_path);
    }
    Ok(request)
}

async fn interrupt(process: &ManagedProcess) -> CliResult<()> {
    warn!(command = %process.name(), "Interrupted, stopping tool");
    process.kill().await;
    Err(CliError::Interrupted)
}
