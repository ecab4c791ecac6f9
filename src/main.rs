//! Binary entry point for the igor Cobbler CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use igor_cobbler::{
    Cobbler, CobblerConfig, ConfigError, HostsOrigin, Origin, PowerAction, Profile,
    ProfileOrigin, ProvisionError,
};

mod cli;

use cli::{AddProfileCommand, Cli, KargsCommand, PowerArg, PowerCommand};

const LOG_ENV: &str = "IGOR_LOG";
const DEFAULT_LOG_FILTER: &str = "igor_cobbler=info";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_writer(io::stderr))
        .with(env_filter)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = CobblerConfig::load_without_cli_args()?;
    let cobbler = Arc::new(Cobbler::connect(config.settings()?));
    let profiles = ProfileOrigin::new(Arc::clone(&cobbler), config.extra_kernel_options.clone());
    let hosts = HostsOrigin::new(
        Arc::clone(&cobbler),
        config.host_expression.clone(),
        config.host_whitelist()?,
    );
    let profile = |name: String| {
        Profile::new(
            name,
            config.extra_kernel_options.clone(),
            profiles.name(),
            Arc::clone(&cobbler),
        )
    };
    let mut stdout = io::stdout();

    match cli {
        Cli::Profiles => {
            for name in profiles.items().await?.keys() {
                writeln!(stdout, "{name}")?;
            }
        }
        Cli::Hosts => {
            for host in hosts.items().await?.values() {
                writeln!(stdout, "{}\t{}", host.fqdn(), host.mac_address())?;
            }
        }
        Cli::AddProfile(AddProfileCommand {
            name,
            kernel,
            initrd,
            kargs,
        }) => {
            let created = profiles.create_item(&name, &kernel, &initrd, &kargs)?;
            writeln!(stdout, "registered profile {}", created.name())?;
        }
        Cli::RemoveProfile(command) => {
            profile(command.name).delete().await?;
        }
        Cli::Kargs(KargsCommand { name, set }) => {
            let options = profile(name).kernel_options(set.as_deref()).await?;
            writeln!(stdout, "{options}")?;
        }
        Cli::Power(PowerCommand { host, action }) => {
            hosts.host(host).power(power_action(action)).await?;
        }
    }
    Ok(())
}

const fn power_action(arg: PowerArg) -> PowerAction {
    match arg {
        PowerArg::On => PowerAction::On,
        PowerArg::Off => PowerAction::Off,
        PowerArg::Reboot => PowerAction::Reboot,
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
