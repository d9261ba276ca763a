use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use server::config::{load_env_file, Config};
use server::handlers::root;
use server::registry::SessionRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let env_file = load_env_file();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match env_file {
        Some(path) => log::info!("Loaded environment from {}", path.display()),
        None => log::debug!("No .env file found"),
    }

    let config = Config::from_env();
    let registry = web::Data::new(SessionRegistry::new());
    let config_data = web::Data::new(config.clone());

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(registry.clone())
            .app_data(config_data.clone())
            .configure(root)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
