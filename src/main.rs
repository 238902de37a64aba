//! Demo service: routes sensor, command and log topics to handler methods.
//!
//! Environment (a `.env` file is honoured):
//! - `MQTT_BROKER` broker URL, default `mqtt://localhost:1883`
//! - `ROUTING_SETTINGS` optional JSON file overlaying routing settings
//! - `SITE` value for the `{{site}}` placeholder, default `lab`

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mqtt_topic_dispatch::prelude::*;
use mqtt_topic_dispatch::{BeforeHandle, Bytes, TransformError};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Deserialize, Debug)]
struct Reading {
	celsius: f64,
}

#[derive(Default)]
struct SiteMonitor {
	readings: AtomicU64,
}

#[mqtt_subscriptions]
impl SiteMonitor {
	#[subscribe("{{site}}/sensors/+/temperature", transform = "json", qos = 1)]
	async fn on_temperature(
		&self,
		#[payload] reading: Json<Reading>,
		#[params] ids: Vec<String>,
	) -> Result<(), HandlerError> {
		let total = self.readings.fetch_add(1, Ordering::Relaxed) + 1;
		info!(sensor = ?ids, celsius = reading.celsius, total, "Temperature");
		Ok(())
	}

	#[subscribe("{{site}}/commands/+", queue, transform = "upper")]
	async fn on_command(&self, #[payload] command: String, #[topic] topic: ArcStr) {
		info!(%topic, %command, "Command");
	}

	#[subscribe(topics = ["{{site}}/logs/#", "{{site}}/audit/#"], no_share)]
	async fn on_log(
		&self,
		#[params] tail: Vec<String>,
		#[payload(transform = "text")] line: String,
		#[packet] packet: PacketMeta,
	) {
		info!(tail = ?tail, retain = packet.retain, %line, "Log line");
	}
}

fn client_id(prefix: &str) -> String {
	let uuid = Uuid::new_v4().to_string();
	format!("{prefix}_{}", &uuid[.. 8])
}

fn build_config() -> Result<RouterConfig, Box<dyn std::error::Error>> {
	let broker = env::var("MQTT_BROKER")
		.unwrap_or_else(|_| "mqtt://localhost:1883".to_string());
	let separator = if broker.contains('?') { '&' } else { '?' };
	let url = format!("{broker}{separator}client_id={}", client_id("site_monitor"));

	let mut config = RouterConfig::from_url(&url)?;
	if let Ok(path) = env::var("ROUTING_SETTINGS") {
		config.load_settings_file(path)?;
	}
	let site = env::var("SITE").unwrap_or_else(|_| "lab".to_string());
	config.routing = config.routing.with_variable("site", site);
	config
		.register_transform(
			"upper",
			|payload: &Bytes| -> Result<PayloadValue, TransformError> {
				let text = std::str::from_utf8(payload)?;
				Ok(PayloadValue::Text(text.trim().to_uppercase()))
			},
		)
		.with_before_handle(BeforeHandle::new(|message| {
			if message.payload.is_empty() {
				return Err(HandlerError::from("empty payload"));
			}
			Ok(())
		}));
	Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenv::dotenv().ok();
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_target(true).compact())
		.init();

	let config = build_config()?;
	let monitor = Arc::new(SiteMonitor::default());
	let declarations = monitor.subscription_declarations()?;

	info!(declarations = declarations.len(), "Connecting");
	let (_router, connection) =
		MqttRouter::connect_with_config(config, declarations).await?;

	tokio::signal::ctrl_c().await?;
	info!(
		readings = monitor.readings.load(Ordering::Relaxed),
		"Shutting down"
	);
	if let Err(err) = connection.shutdown().await {
		warn!(error = %err, "Shutdown failed");
	}
	Ok(())
}
