// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process entry point: parses the bootstrap CLI, wires up logging, and
//! dispatches to the `stream` subcommand's smoke-test surface over the
//! library (`model_streamer::application::describe_file`).

use model_streamer::application::describe_file;
use model_streamer::infrastructure::backends::BackendRouter;
use model_streamer::infrastructure::logging::init_logging;
use model_streamer_bootstrap::exit_code::result_to_exit_code;
use model_streamer_bootstrap::{bootstrap_cli, ValidatedCommand};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let validated = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("argument error: {e}");
            return std::process::ExitCode::from(64); // EX_USAGE
        }
    };

    init_logging(false);

    let result = run(validated.command).await;
    if let Err(ref e) = result {
        tracing::error!("{e}");
    }
    result_to_exit_code(result)
}

async fn run(command: ValidatedCommand) -> Result<(), model_streamer_domain::error::StreamerError> {
    match command {
        ValidatedCommand::Stream { file } => {
            let router = BackendRouter::new();
            let tensors = describe_file(&router, &file).await?;
            for t in tensors {
                println!("{}\t{}\t{:?}", t.name, t.dtype, t.shape);
            }
            Ok(())
        }
    }
}
