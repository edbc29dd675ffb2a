use std::sync::Arc;

use pingora::services::listening::Service;
use pingora_core::listeners::tls::TlsSettings;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;

use oncogate::config::{Config, Tls};
use oncogate::gateway::PredictClient;
use oncogate::service::http::GatewayHttpApp;

fn main() {
    // Initialize logging
    env_logger::init();

    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // One shared client for every in-flight request
    log::info!(
        "Prediction service at {}{}",
        config.downstream.address,
        config.downstream.path
    );
    let client = Arc::new(PredictClient::new(config.downstream.clone()));

    log::info!("Building gateway service...");
    let mut gateway_service =
        Service::new("Gateway HTTP".to_string(), GatewayHttpApp::new(client));

    // Add listeners from configuration
    log::info!("Adding listeners...");
    for list_cfg in &config.listeners {
        match &list_cfg.tls {
            Some(Tls {
                cert_path,
                key_path,
            }) => {
                let mut settings = TlsSettings::intermediate(cert_path, key_path)
                    .expect("Adding TLS listener shouldn't fail");
                if list_cfg.offer_h2 {
                    settings.enable_h2();
                }
                gateway_service.add_tls_with_settings(&list_cfg.address.to_string(), None, settings);
            }
            None => {
                gateway_service.add_tcp(&list_cfg.address.to_string());
            }
        }
    }

    // Create Pingora server with optional configuration
    let mut gateway_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    gateway_server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    gateway_server.add_service(gateway_service);

    log::info!("Starting Server...");
    gateway_server.run_forever();
}
