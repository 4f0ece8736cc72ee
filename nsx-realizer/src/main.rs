//! nsx-realizer: command-line front end for logical switch and port lifecycle.
//!
//! `switch create` submits the switch, waits for it to be realized on the
//! transport nodes and deletes it again if realization fails or times out.
//! Ctrl-C while waiting abandons the wait and still rolls back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nsx_realizer::model::{AdminState, ReplicationMode, Tag};
use nsx_realizer::{
    ControlPlaneClient, DeleteOptions, LogicalPort, LogicalPortResource, LogicalSwitch,
    LogicalSwitchResource, ManagedResource, NsxClient, NsxClientConfig, RealizationConfig,
    ResourceError, TransportErrorPolicy,
};

/// Logical switch and port lifecycle against an NSX manager
#[derive(Parser, Debug)]
#[command(name = "nsx-realizer", version, about)]
struct Cli {
    /// Manager base URL (e.g., https://nsx.example.com)
    #[arg(long, env = "NSX_MANAGER")]
    manager: String,

    /// Manager user
    #[arg(long, env = "NSX_USERNAME", default_value = "admin")]
    username: String,

    /// Manager password
    #[arg(long, env = "NSX_PASSWORD", hide_env_values = true)]
    password: String,

    /// Accept self-signed manager certificates
    #[arg(long)]
    insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Logical switch operations
    #[command(subcommand)]
    Switch(SwitchCommand),
    /// Logical port operations
    #[command(subcommand)]
    Port(PortCommand),
}

#[derive(Subcommand, Debug)]
enum SwitchCommand {
    /// Create a switch and wait for its realization
    Create {
        #[command(flatten)]
        switch: SwitchArgs,
        #[command(flatten)]
        realization: RealizationArgs,
    },
    /// Show a switch
    Get { id: String },
    /// Show the realization state of a switch
    State { id: String },
    /// Delete a switch
    Delete {
        id: String,
        /// Also delete attached ports
        #[arg(long)]
        cascade: bool,
        /// Force detach attachments
        #[arg(long)]
        detach: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PortCommand {
    /// Create a port on a switch
    Create {
        /// Switch the port belongs to
        #[arg(long)]
        logical_switch_id: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// UP or DOWN
        #[arg(long, default_value = "UP")]
        admin_state: AdminState,
        /// Tag as scope=tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<Tag>,
    },
    /// Show a port
    Get { id: String },
    /// Delete a port
    Delete {
        id: String,
        /// Force detach attachments
        #[arg(long)]
        detach: bool,
    },
}

#[derive(Args, Debug)]
struct SwitchArgs {
    /// Transport zone the switch belongs to
    #[arg(long)]
    transport_zone_id: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// UP or DOWN
    #[arg(long, default_value = "UP")]
    admin_state: AdminState,
    /// MTEP or SOURCE
    #[arg(long, default_value = "MTEP")]
    replication_mode: ReplicationMode,
    /// VLAN id for VLAN-backed switches
    #[arg(long)]
    vlan: Option<i64>,
    #[arg(long)]
    vni: Option<i32>,
    #[arg(long)]
    ip_pool_id: Option<String>,
    #[arg(long)]
    mac_pool_id: Option<String>,
    /// Tag as scope=tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<Tag>,
}

impl From<SwitchArgs> for LogicalSwitch {
    fn from(args: SwitchArgs) -> Self {
        LogicalSwitch {
            display_name: args.display_name,
            description: args.description,
            transport_zone_id: args.transport_zone_id,
            admin_state: args.admin_state,
            replication_mode: Some(args.replication_mode),
            vlan: args.vlan,
            vni: args.vni,
            ip_pool_id: args.ip_pool_id,
            mac_pool_id: args.mac_pool_id,
            tags: args.tags,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
struct RealizationArgs {
    /// Realization budget in seconds
    #[arg(long, default_value = "600")]
    create_timeout_secs: u64,

    /// Wait before the first state query, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_delay_ms: u64,

    /// Minimum interval between state queries, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Let the interval double up to this many milliseconds
    #[arg(long)]
    max_poll_interval_ms: Option<u64>,

    /// Consecutive state-query transport errors to ride out (0 aborts on the first)
    #[arg(long, default_value = "0")]
    tolerate_transport_errors: u32,

    /// Return as soon as the manager accepts the switch
    #[arg(long)]
    no_verify: bool,
}

impl TryFrom<&RealizationArgs> for RealizationConfig {
    type Error = anyhow::Error;

    fn try_from(args: &RealizationArgs) -> Result<Self> {
        let mut config = RealizationConfig::new(Duration::from_secs(args.create_timeout_secs))
            .with_initial_delay(Duration::from_millis(args.poll_delay_ms))
            .with_min_interval(Duration::from_millis(args.poll_interval_ms))
            .with_verify(!args.no_verify);
        if let Some(max) = args.max_poll_interval_ms {
            config = config.with_max_interval(Duration::from_millis(max));
        }
        if args.tolerate_transport_errors > 0 {
            config = config.with_transport_errors(TransportErrorPolicy::Tolerate {
                max_consecutive: args.tolerate_transport_errors,
            });
        }
        config.validate().context("Invalid realization settings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nsx_realizer=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!("Manager endpoint: {}", cli.manager);

    let mut client_config = NsxClientConfig::new(&cli.manager, &cli.username, &cli.password);
    client_config.insecure = cli.insecure;
    client_config.request_timeout = Duration::from_secs(cli.request_timeout_secs);
    let client: Arc<dyn ControlPlaneClient> =
        Arc::new(NsxClient::new(client_config).context("Failed to build manager client")?);

    match cli.command {
        Command::Switch(cmd) => run_switch(client, cmd).await,
        Command::Port(cmd) => run_port(client, cmd).await,
    }
}

async fn run_switch(client: Arc<dyn ControlPlaneClient>, cmd: SwitchCommand) -> Result<()> {
    match cmd {
        SwitchCommand::Create {
            switch,
            realization,
        } => {
            let config = RealizationConfig::try_from(&realization)?;
            let switches = LogicalSwitchResource::new(client, config);
            let spec = LogicalSwitch::from(switch);

            let interrupted = interrupt_signal().await;
            match switches.create_until(&spec, interrupted).await {
                Ok(created) => print_json(&created),
                Err(ResourceError::Realization(e)) if e.orphan_may_remain() => {
                    error!(
                        id = e.resource_id().unwrap_or("-"),
                        "Logical switch may be orphaned"
                    );
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        SwitchCommand::Get { id } => {
            let switches = lookup(client);
            match switches.read(&id).await? {
                Some(switch) => print_json(&switch),
                None => bail!("Logical switch {} not found", id),
            }
        }
        SwitchCommand::State { id } => {
            let switches = lookup(client);
            print_json(&switches.state(&id).await?)
        }
        SwitchCommand::Delete {
            id,
            cascade,
            detach,
        } => {
            let switches = lookup(client);
            switches
                .delete(&id, &DeleteOptions { cascade, detach })
                .await?;
            info!("Logical switch {} deleted", id);
            Ok(())
        }
    }
}

async fn run_port(client: Arc<dyn ControlPlaneClient>, cmd: PortCommand) -> Result<()> {
    let ports = LogicalPortResource::new(client);
    match cmd {
        PortCommand::Create {
            logical_switch_id,
            display_name,
            description,
            admin_state,
            tags,
        } => {
            let spec = LogicalPort {
                display_name,
                description,
                logical_switch_id,
                admin_state,
                tags,
                ..Default::default()
            };
            print_json(&ports.create(&spec).await?)
        }
        PortCommand::Get { id } => match ports.read(&id).await? {
            Some(port) => print_json(&port),
            None => bail!("Logical port {} not found", id),
        },
        PortCommand::Delete { id, detach } => {
            ports
                .delete(
                    &id,
                    &DeleteOptions {
                        cascade: false,
                        detach,
                    },
                )
                .await?;
            info!("Logical port {} deleted", id);
            Ok(())
        }
    }
}

/// Install the Ctrl-C handler before any request goes out and return a
/// future that resolves on the first interrupt.
async fn interrupt_signal() -> impl Future<Output = ()> + Send {
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    // First poll installs the handler.
    let early = tokio::select! {
        biased;
        result = &mut ctrl_c => Some(result),
        _ = std::future::ready(()) => None,
    };

    async move {
        let result = match early {
            Some(result) => result,
            None => ctrl_c.await,
        };
        match result {
            Ok(()) => info!("Interrupted, abandoning realization wait"),
            Err(e) => {
                warn!(error = %e, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await
            }
        }
    }
}

/// Switch handle for commands that never create, so realization settings are unused.
fn lookup(client: Arc<dyn ControlPlaneClient>) -> LogicalSwitchResource {
    LogicalSwitchResource::new(client, RealizationConfig::new(Duration::from_secs(600)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
