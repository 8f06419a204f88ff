use clap::Parser;
use ihc_gate::client::loopback::{LoopbackController, LoopbackFactory};
use ihc_gate::config::Config;
use ihc_gate::handler::IhcHandler;
use ihc_gate::homeassistant::{self, discovery, HomeAssistant, MqttHost};
use ihc_gate::types::Command;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config_path: String,

    // MQTT connection
    #[arg(long)]
    mqtt_host: String,
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,
    #[arg(long, default_value = "")]
    mqtt_username: String,
    #[arg(long, default_value = "")]
    mqtt_password: String,

    // Other
    #[arg(long, default_value = "ihc-gate")]
    device_name: String,
}

fn init_log() -> anyhow::Result<()> {
    let timer = fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string());

    // Configure a custom event formatter
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_source_location(true)
        .with_timer(timer)
        .compact();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()?
        .add_directive("rumqttc=info".parse()?);

    fmt().event_format(format).with_env_filter(filter).init();
    Ok(())
}

/// Announce the thing to HA and subscribe to its command topics.
async fn init_config(name: &str, config: &Config, ha: &HomeAssistant) -> anyhow::Result<()> {
    let message = discovery::new_device(name, config);

    for topic in message.command_topics() {
        ha.send(homeassistant::Outgoing::Subscribe(topic.to_string()))
            .await?;
    }

    // Send discovery message to register/update device in HA.
    ha.send(homeassistant::Outgoing::DiscoveryDevice(message))
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log()?;
    let args = Args::parse();

    let config = Config::from_file(&args.config_path)?;
    info!("Starting IHC Gate. Args: {:?} Config: {:?}", args, config);

    let ha_init = homeassistant::Initiator::new(
        "ihc-gate-mqtt",
        &args.mqtt_host,
        args.mqtt_port,
        &args.mqtt_username,
        &args.mqtt_password,
        &config.thing,
    )
    .await?;
    let ha = Arc::new(ha_init.start().await);
    ha.send(homeassistant::Outgoing::Initial).await?;
    init_config(&args.device_name, &config, &ha).await?;

    let controller = Arc::new(LoopbackController::new(config.resources.clone()));
    let factory = Arc::new(LoopbackFactory::new(controller));
    let host = Arc::new(MqttHost::new(ha.sender()));
    let handler = Arc::new(IhcHandler::new(&config, host, factory));
    handler.initialize();

    info!("ihc-gate initialized.");

    // MQTT -> controller
    let commands = handler.clone();
    let task_mqtt_to_controller = async move {
        while let Some(msg) = ha.recv().await {
            match msg {
                homeassistant::Incoming::Command { channel, payload } => {
                    let Some(kind) = commands.command_kind(&channel) else {
                        warn!("Command for unknown channel '{}'", channel);
                        continue;
                    };
                    match Command::parse(&payload, kind) {
                        Some(command) => commands.handle_command(&channel, command).await,
                        None => warn!("Invalid payload '{}' for channel '{}'", payload, channel),
                    }
                }
            }
        }
        info!("MQTT->controller task finishing");
    };

    tokio::select! {
        _ = task_mqtt_to_controller => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted, stopping");
        }
    }

    handler.dispose().await;
    Ok(())
}
