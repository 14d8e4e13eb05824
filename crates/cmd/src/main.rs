// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use courier_app::{App, Settings, store};
use courier_common_runtime::{block_on_network_io, init_global_runtimes};
use courier_delivery::{DeliveryOptions, QueueKind};
use snafu::{ResultExt, Whatever};

#[derive(Debug, Parser)]
#[clap(
name = "courier",
about = "Durable queueing and batched HTTP delivery of analytics events",
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Flush(FlushArgs),
    Enqueue(EnqueueArgs),
    Stats(StatsArgs),
    Clear(ClearArgs),
}

/// Where settings come from.
#[derive(Debug, Clone, Args)]
struct SettingsArgs {
    /// TOML settings file; `COURIER__*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SettingsArgs {
    fn load(&self) -> Result<Settings, Whatever> {
        Settings::load(self.config.as_deref()).whatever_context("failed to load settings")
    }
}

/// Settings plus a direct override of the queue directory.
#[derive(Debug, Clone, Args)]
struct StoreArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Directory holding the `track` and `engage` queues.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn delivery_options(&self) -> Result<DeliveryOptions, Whatever> {
        let mut options = self.settings.load()?.delivery;
        if let Some(dir) = &self.data_dir {
            options.data_dir.clone_from(dir);
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueueArg {
    Track,
    Engage,
}

impl From<QueueArg> for QueueKind {
    fn from(queue: QueueArg) -> Self {
        match queue {
            QueueArg::Track => QueueKind::Track,
            QueueArg::Engage => QueueKind::Engage,
        }
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Runs the delivery service until Ctrl-C or SIGTERM.
Examples:

courier run --config courier.toml

")]
struct RunArgs {
    #[command(flatten)]
    settings: SettingsArgs,
}

impl RunArgs {
    fn run(&self) -> Result<(), Whatever> {
        let settings = self.settings.load()?;
        init_global_runtimes(&settings.runtime).whatever_context("failed to start runtimes")?;
        block_on_network_io(App::new(settings).run())
            .whatever_context("failed to start runtimes")?
            .whatever_context("courier service failed")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Sends everything queued once, ignoring any retry backoff, then exits.
Examples:

courier flush --config courier.toml

")]
struct FlushArgs {
    #[command(flatten)]
    settings: SettingsArgs,
}

impl FlushArgs {
    fn run(&self) -> Result<(), Whatever> {
        let settings = self.settings.load()?;
        init_global_runtimes(&settings.runtime).whatever_context("failed to start runtimes")?;
        block_on_network_io(App::new(settings).flush_once())
            .whatever_context("failed to start runtimes")?
            .whatever_context("flush failed")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r#"

Durably appends one payload to a queue.
Examples:

courier enqueue --queue track '{"event":"signup"}'

"#)]
struct EnqueueArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[arg(short, long, value_enum, default_value = "track")]
    queue: QueueArg,

    payload: String,
}

impl EnqueueArgs {
    fn run(self) -> Result<(), Whatever> {
        let options = self.store.delivery_options()?;
        store::enqueue(&options, self.queue.into(), self.payload.into())
            .whatever_context("failed to enqueue payload")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Prints the number of stored entries per queue.
Examples:

courier stats --data-dir ./data

")]
struct StatsArgs {
    #[command(flatten)]
    store: StoreArgs,
}

impl StatsArgs {
    fn run(&self) -> Result<(), Whatever> {
        let options = self.store.delivery_options()?;
        let stats = store::stats(&options).whatever_context("failed to read queues")?;
        println!("{stats}");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Discards every stored entry on both queues.
Examples:

courier clear --data-dir ./data

")]
struct ClearArgs {
    #[command(flatten)]
    store: StoreArgs,
}

impl ClearArgs {
    fn run(&self) -> Result<(), Whatever> {
        let options = self.store.delivery_options()?;
        let dropped = store::clear(&options).whatever_context("failed to clear queues")?;
        println!("dropped {dropped} entries");
        Ok(())
    }
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Run(args) => args.run(),
        Commands::Flush(args) => args.run(),
        Commands::Enqueue(args) => args.run(),
        Commands::Stats(args) => args.run(),
        Commands::Clear(args) => args.run(),
    }
}
