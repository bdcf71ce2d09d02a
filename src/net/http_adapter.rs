use actix_files::Files;
use actix_htrewrite::Engine;
use actix_web::{App, HttpServer, web};

use crate::core::configuration::{Configuration, try_get_rules};

pub struct HttpAdapter<'a> {
    configuration: &'a Configuration,
}

impl<'a> HttpAdapter<'a> {
    pub fn new(configuration: &'a Configuration) -> Self {
        Self { configuration }
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        let conf = self.configuration.clone();

        let engine = build_engine(&conf)?;
        let port = conf
            .network
            .as_ref()
            .and_then(|network| network.port)
            .unwrap_or(8080);

        tracing::info!("running htserve on port:{port}");

        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(conf.clone()))
                .wrap(engine.clone().middleware())
                .configure(|cfg: &mut web::ServiceConfig| config(cfg, &conf))
        })
        .bind(format!("127.0.0.1:{port}"))?
        .run()
        .await
    }
}

fn build_engine(configuration: &Configuration) -> Result<Engine, std::io::Error> {
    let mut engine = Engine::new();
    if let Some(hub) = &configuration.hub {
        if let Some(on) = hub.engine {
            engine = engine.initial_state(on);
        }
        if let Some(root) = &hub.path {
            engine = engine.document_root(root.clone());
        }
        if let Some(server) = &hub.server_string {
            engine = engine.server_string(server.clone());
        }
    }
    if let Some(rules) = try_get_rules(configuration) {
        engine.add_rules(&rules).map_err(std::io::Error::other)?;
    }
    let rules_file = configuration
        .hub
        .as_ref()
        .and_then(|hub| hub.rules_file.as_ref());
    if let Some(path) = rules_file {
        engine.add_rules_file(path).map_err(std::io::Error::other)?;
    }
    Ok(engine)
}

fn config(cfg: &mut web::ServiceConfig, conf: &Configuration) {
    let path = conf
        .hub
        .clone()
        .and_then(|hub| hub.path)
        .unwrap_or_else(|| "/var/www/html/".to_string());

    cfg.service(
        Files::new("/", path)
            .index_file("index.html")
            .use_last_modified(true)
            .prefer_utf8(true),
    );
}
