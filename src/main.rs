use std::io;
use std::time::Duration;

use actix::prelude::*;
use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{App, HttpServer, middleware, web};
use log::info;

use stallingen_server::{AppData, cache_refresh};
use stallingen_server::config::Config;
use stallingen_server::web::api_service;

fn startup_error<E: std::fmt::Display>(error: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(startup_error)?;

    // create db connection pools
    let data = AppData::new(&config).map_err(startup_error)?;

    data.setup_root_password(config.root_default_password.clone(), config.root_password_override)
        .map_err(startup_error)?;

    match config.cache_refresh_interval_minutes {
        Some(minutes) if minutes > 0 => {
            let actor = cache_refresh::CacheRefreshActor {
                app_data: data.clone(),
                interval: Duration::from_secs(minutes * 60),
                window_days: config.cache_refresh_window_days,
            };
            actor.start();
        },
        _ => info!("Cache refresh disabled"),
    }

    let cookie_secret_key = config.cookie_secret_key.clone();
    let domain = config.domain.clone();

    // Start http server
    HttpServer::new(move || {
        App::new()
            .data(data.clone())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(cookie_secret_key.as_bytes())
                    .name("auth-cookie")
                    .domain(domain.as_str())
                    .secure(false)))
            // enable logger
            .wrap(middleware::Logger::default())
            // limit the maximum amount of data that server will accept
            .data(web::JsonConfig::default().limit(16384))
            .configure(api_service::config)
    })
        .bind(config.bind_address.as_str())?
        .run()
        .await
}
